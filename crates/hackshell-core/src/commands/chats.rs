//! A simulated chat service: channels to create, join and leave, and messages
//! delivered through the deferred output sink.

use std::cell::RefCell;
use std::rc::Rc;

use chrono::Local;

use hackshell_dsl::{is_valid_identifier, Value};

use crate::command::{Command, Context};
use crate::error::{failure, success};
use crate::level::SecurityLevel;
use crate::registry::Registry;
use crate::schema::{ArgumentSchema, Validator};

pub const CHATS_DOMAIN: &str = "chats";

/// Most channels one session can be in at once.
pub const MAX_JOINED: usize = 5;

#[derive(Debug, Default)]
struct ChatState {
    channels: Vec<String>,
    joined: Vec<String>,
}

/// Channel state shared by every `chats.*` command.
#[derive(Debug, Default)]
pub struct Chats {
    state: RefCell<ChatState>,
}

/// Port channels are four upper-case hex digits and always exist.
fn is_port_channel(name: &str) -> bool {
    name.len() == 4 && name.bytes().all(|b| b.is_ascii_digit() || (b'A'..=b'F').contains(&b))
}

fn text_arg<'a>(args: Option<&'a Value>, key: &str) -> &'a str {
    args.and_then(|a| a.get(key))
        .and_then(Value::as_str)
        .unwrap_or_default()
}

fn not_joined(channel: &str) -> Value {
    failure(format!(
        "you aren't in {channel}. join channel with chats.join"
    ))
}

impl Chats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn channels(&self) -> Vec<String> {
        self.state.borrow().channels.clone()
    }

    pub fn joined(&self) -> Vec<String> {
        self.state.borrow().joined.clone()
    }

    pub fn channel_exists(&self, name: &str) -> bool {
        is_port_channel(name) || self.state.borrow().channels.iter().any(|c| c == name)
    }

    pub fn has_joined(&self, name: &str) -> bool {
        self.state.borrow().joined.iter().any(|c| c == name)
    }

    /// `<HHMM> <channel> <user> :::<text>:::`
    pub fn format_message(channel: &str, user: &str, text: &str) -> String {
        format!(
            "{} {channel} {user} :::{text}:::",
            Local::now().format("%H%M")
        )
    }

    fn dispatch(&self, registry: &Registry, channel: &str, user: &str, text: &str) {
        registry.output().send_after(
            registry.chat_delay(),
            Self::format_message(channel, user, text),
        );
    }

    fn create(&self, registry: &Registry, context: &Context, name: &str) -> Value {
        if self.state.borrow().joined.len() >= MAX_JOINED {
            return failure("you cannot create any more channels");
        }
        if self.channel_exists(name) {
            return failure(format!("channel {name} is taken"));
        }
        self.state.borrow_mut().channels.push(name.to_string());
        self.join(registry, context, name)
    }

    fn join(&self, registry: &Registry, context: &Context, channel: &str) -> Value {
        if self.has_joined(channel) {
            return failure("you cannot join this channel again");
        }
        if !self.channel_exists(channel) {
            return failure(format!("channel {channel} does not exist"));
        }
        self.state.borrow_mut().joined.push(channel.to_string());
        self.dispatch(registry, channel, &context.caller, "user joined channel");
        success()
    }

    fn leave(&self, channel: &str) -> Value {
        if !self.channel_exists(channel) {
            return failure(format!("channel {channel} does not exist"));
        }
        if !self.has_joined(channel) {
            return not_joined(channel);
        }
        let mut state = self.state.borrow_mut();
        state.joined.retain(|c| c != channel);
        if !is_port_channel(channel) {
            state.channels.retain(|c| c != channel);
        }
        success()
    }

    fn send(&self, registry: &Registry, context: &Context, channel: &str, msg: &str) -> Value {
        if !self.has_joined(channel) {
            return not_joined(channel);
        }
        self.dispatch(registry, channel, &context.caller, msg);
        Value::from("Msg Sent")
    }

    fn tell(&self, registry: &Registry, context: &Context, to: &str, msg: &str) -> Value {
        if to != context.caller {
            return failure(format!("User {to} does not exist."));
        }
        self.dispatch(registry, "from", to, msg);
        self.dispatch(registry, "to", to, msg);
        Value::from("Msg Sent")
    }

    fn users(&self, context: &Context, channel: &str) -> Value {
        if !self.has_joined(channel) {
            return failure(format!(
                "Can't list users for {channel} because you haven't joined it."
            ));
        }
        Value::from(vec![context.caller.as_str()])
    }

    /// Registers every `chats.*` command against this shared state.
    pub fn register(self: Rc<Self>, registry: &mut Registry) {
        let param = |name: &str| ArgumentSchema::named(name).validator(Validator::string());
        let domain = Some(CHATS_DOMAIN);

        let chats = Rc::clone(&self);
        registry.register(
            domain,
            Command::native("channels", move |_: &Registry, _: &Context, _: Option<&Value>| {
                Value::from(chats.joined())
            })
            .with_trust(SecurityLevel::MIDSEC),
        );

        let chats = Rc::clone(&self);
        registry.register(
            domain,
            Command::native("create", move |reg: &Registry, ctx: &Context, args: Option<&Value>| {
                chats.create(reg, ctx, text_arg(args, "name"))
            })
            .with_trust(SecurityLevel::FULLSEC)
            .with_usage(r#"chats.create { name:"<channel name>", password: "<optional password>" }"#)
            .with_params([param("name").required(), param("password")]),
        );

        let chats = Rc::clone(&self);
        registry.register(
            domain,
            Command::native("join", move |reg: &Registry, ctx: &Context, args: Option<&Value>| {
                chats.join(reg, ctx, text_arg(args, "channel"))
            })
            .with_trust(SecurityLevel::NULLSEC)
            .with_usage(r#"chats.join { channel:"<channel name>", password:"<optional password>" }"#)
            .with_params([param("channel").required(), param("password")]),
        );

        let chats = Rc::clone(&self);
        registry.register(
            domain,
            Command::native("leave", move |_: &Registry, _: &Context, args: Option<&Value>| {
                chats.leave(text_arg(args, "channel"))
            })
            .with_trust(SecurityLevel::NULLSEC)
            .with_usage(r#"chats.leave { channel:"<channel name>" }"#)
            .with_param(param("channel").required()),
        );

        let chats = Rc::clone(&self);
        registry.register(
            domain,
            Command::native("send", move |reg: &Registry, ctx: &Context, args: Option<&Value>| {
                chats.send(reg, ctx, text_arg(args, "channel"), text_arg(args, "msg"))
            })
            .with_trust(SecurityLevel::FULLSEC)
            .with_usage(r#"chats.send { channel:"<channel name>", msg:"<message (1000/10)>" }"#)
            .with_params([param("channel").required(), param("msg").required()]),
        );

        let chats = Rc::clone(&self);
        registry.register(
            domain,
            Command::native("tell", move |reg: &Registry, ctx: &Context, args: Option<&Value>| {
                chats.tell(reg, ctx, text_arg(args, "to"), text_arg(args, "msg"))
            })
            .with_trust(SecurityLevel::FULLSEC)
            .with_usage(r#"chats.tell { to:"<username>", msg:"<message (1000/10)>" }"#)
            .with_params([
                ArgumentSchema::named("to")
                    .validator(Validator::custom(|v| {
                        v.as_str().is_some_and(is_valid_identifier)
                    }))
                    .required(),
                param("msg").required(),
            ]),
        );

        let chats = self;
        registry.register(
            domain,
            Command::native("users", move |_: &Registry, ctx: &Context, args: Option<&Value>| {
                chats.users(ctx, text_arg(args, "channel"))
            })
            .with_trust(SecurityLevel::MIDSEC)
            .with_usage(r#"chats.users { channel:"<channel name>" }"#)
            .with_param(param("channel").required()),
        );
    }
}

pub(super) fn install(registry: &mut Registry) {
    Rc::new(Chats::new()).register(registry);
}
