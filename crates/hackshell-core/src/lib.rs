//! hackshell core
//!
//! The command registry and everything that runs against it:
//! - `registry`: domains, name resolution, the macro store and dispatch of
//!   input lines
//! - `command` / `schema`: validated, invocable commands
//! - `script`: commands compiled on demand from source text, with trust levels
//!   derived from the commands their bodies reference
//! - `commands`: the standard domains (`user`, `scripts.*`, `chats.*`)
//!
//! Parsing lives in `hackshell-dsl`; terminal I/O lives in `hackshell-cli`.

pub mod command;
pub mod commands;
pub mod config;
pub mod display;
pub mod domain;
pub mod error;
pub mod level;
pub mod macros;
pub mod output;
pub mod registry;
pub mod schema;
pub mod script;

mod dispatch;

pub use command::{Command, Context, Operation, TrustLevel, Usage};
pub use config::ShellConfig;
pub use error::{ConfigError, SchemaError, ShellError};
pub use level::{SecurityLevel, Visibility};
pub use output::OutputSink;
pub use registry::{CommandId, Registry, DEFAULT_DOMAIN, USER_DOMAIN};
pub use schema::{ArgumentSchema, ParamKey, Validator};
pub use script::{Fault, FaultKind, ScriptUnit};

pub use hackshell_dsl::{BoundReference, Object, Value};
