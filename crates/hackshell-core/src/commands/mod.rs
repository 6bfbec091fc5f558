//! The standard domains every session starts with.

mod builtin;
mod chats;
mod scripts;

pub use chats::{Chats, CHATS_DOMAIN, MAX_JOINED};
pub use scripts::SCRIPTS_DOMAIN;

use crate::registry::Registry;

pub(crate) fn install(registry: &mut Registry) {
    builtin::install(registry);
    scripts::install(registry);
    chats::install(registry);
}
