use std::fmt;
use std::rc::Rc;

use hackshell_dsl::Value;

use crate::error::ShellError;
use crate::level::{SecurityLevel, Visibility};
use crate::registry::{CommandId, Registry};
use crate::schema::ArgumentSchema;
use crate::script::ScriptUnit;

/// Attribution passed to every operation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Context {
    /// Qualified name of the command being run.
    pub this_script: String,
    /// The active identity.
    pub caller: String,
    /// Qualified name of the script that issued the call, if any.
    pub calling_script: Option<String>,
}

impl Context {
    /// `{caller, this_script, calling_script}` as seen by script bodies.
    pub fn to_value(&self) -> Value {
        Value::object([
            ("caller", Value::from(self.caller.as_str())),
            ("this_script", Value::from(self.this_script.as_str())),
            (
                "calling_script",
                self.calling_script
                    .as_deref()
                    .map(Value::from)
                    .unwrap_or(Value::Null),
            ),
        ])
    }
}

/// The work a native command performs once its arguments have validated.
pub trait Operation {
    fn run(&self, registry: &Registry, context: &Context, args: Option<&Value>) -> Value;
}

impl<F> Operation for F
where
    F: Fn(&Registry, &Context, Option<&Value>) -> Value,
{
    fn run(&self, registry: &Registry, context: &Context, args: Option<&Value>) -> Value {
        self(registry, context, args)
    }
}

#[derive(Clone)]
pub enum TrustLevel {
    Fixed(SecurityLevel),
    Deferred(Rc<dyn Fn(&Registry) -> SecurityLevel>),
}

impl fmt::Debug for TrustLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrustLevel::Fixed(level) => f.debug_tuple("Fixed").field(level).finish(),
            TrustLevel::Deferred(_) => f.write_str("Deferred(..)"),
        }
    }
}

#[derive(Clone)]
pub enum Usage {
    Text(String),
    Producer(Rc<dyn Fn(&Registry) -> String>),
}

impl fmt::Debug for Usage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Usage::Text(text) => f.debug_tuple("Text").field(text).finish(),
            Usage::Producer(_) => f.write_str("Producer(..)"),
        }
    }
}

pub enum CommandBody {
    Native(Box<dyn Operation>),
    Script(ScriptUnit),
}

/// A named, validated, invocable unit.
pub struct Command {
    pub name: String,
    pub(crate) id: Option<CommandId>,
    pub(crate) domain: Option<String>,
    pub params: Vec<ArgumentSchema>,
    pub visibility: Visibility,
    pub trust: TrustLevel,
    pub usage: Usage,
    pub body: CommandBody,
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Command")
            .field("name", &self.name)
            .field("domain", &self.domain)
            .field("params", &self.params)
            .field("visibility", &self.visibility)
            .field("trust", &self.trust)
            .field("script", &matches!(self.body, CommandBody::Script(_)))
            .finish()
    }
}

impl Command {
    fn with_body(name: impl Into<String>, body: CommandBody) -> Self {
        Self {
            name: name.into(),
            id: None,
            domain: None,
            params: Vec::new(),
            visibility: Visibility::default(),
            trust: TrustLevel::Fixed(SecurityLevel::default()),
            usage: Usage::Text(String::new()),
            body,
        }
    }

    pub fn native<F>(name: impl Into<String>, run: F) -> Self
    where
        F: Fn(&Registry, &Context, Option<&Value>) -> Value + 'static,
    {
        Self::operation(name, run)
    }

    pub fn operation(name: impl Into<String>, operation: impl Operation + 'static) -> Self {
        Self::with_body(name, CommandBody::Native(Box::new(operation)))
    }

    pub fn script(name: impl Into<String>, unit: ScriptUnit) -> Self {
        Self::with_body(name, CommandBody::Script(unit))
    }

    pub fn with_param(mut self, param: ArgumentSchema) -> Self {
        self.params.push(param);
        self
    }

    pub fn with_params(mut self, params: impl IntoIterator<Item = ArgumentSchema>) -> Self {
        self.params.extend(params);
        self
    }

    pub fn with_visibility(mut self, visibility: Visibility) -> Self {
        self.visibility = visibility;
        self
    }

    pub fn with_trust(mut self, level: SecurityLevel) -> Self {
        self.trust = TrustLevel::Fixed(level);
        self
    }

    pub fn with_deferred_trust(
        mut self,
        compute: impl Fn(&Registry) -> SecurityLevel + 'static,
    ) -> Self {
        self.trust = TrustLevel::Deferred(Rc::new(compute));
        self
    }

    pub fn with_usage(mut self, usage: impl Into<String>) -> Self {
        self.usage = Usage::Text(usage.into());
        self
    }

    pub fn with_usage_producer(mut self, produce: impl Fn(&Registry) -> String + 'static) -> Self {
        self.usage = Usage::Producer(Rc::new(produce));
        self
    }

    /// Registry slot, once registered.
    pub fn id(&self) -> Option<CommandId> {
        self.id
    }

    /// Internal name of the owning domain, once registered.
    pub fn domain(&self) -> Option<&str> {
        self.domain.as_deref()
    }

    pub fn is_script(&self) -> bool {
        matches!(self.body, CommandBody::Script(_))
    }

    pub fn as_script(&self) -> Option<&ScriptUnit> {
        match &self.body {
            CommandBody::Script(unit) => Some(unit),
            CommandBody::Native(_) => None,
        }
    }

    pub fn usage_text(&self, registry: &Registry) -> String {
        match &self.usage {
            Usage::Text(text) => text.clone(),
            Usage::Producer(produce) => produce(registry),
        }
    }

    pub fn security_level(&self, registry: &Registry) -> SecurityLevel {
        match (&self.body, self.id) {
            (CommandBody::Script(unit), Some(id)) => unit.security_level(registry, id),
            _ => match &self.trust {
                TrustLevel::Fixed(level) => *level,
                TrustLevel::Deferred(compute) => compute(registry),
            },
        }
    }

    /// Validates `args` against the declared parameters, then runs the body.
    ///
    /// Validation failures come back as `{ok: false, msg}` values, and a
    /// missing argument object on a command with required parameters returns
    /// the usage text.
    pub fn execute(&self, registry: &Registry, mut context: Context, args: Option<&Value>) -> Value {
        let Some(args) = args else {
            if self.params.iter().any(|p| p.required) {
                return Value::String(self.usage_text(registry));
            }
            return self.invoke(registry, &context, None);
        };

        for param in &self.params {
            match param.lookup(args) {
                None if param.required => {
                    return ShellError::validation(self.usage_text(registry)).into_value();
                }
                None => continue,
                Some(value) if !param.check(value) => {
                    let message = param
                        .invalid_response
                        .clone()
                        .unwrap_or_else(|| self.usage_text(registry));
                    return ShellError::validation(message).into_value();
                }
                Some(_) => {}
            }
        }

        if context.this_script.is_empty() {
            context.this_script = match self.id {
                Some(id) => registry.qualified_name(id),
                None => self.name.clone(),
            };
        }

        self.invoke(registry, &context, Some(args))
    }

    fn invoke(&self, registry: &Registry, context: &Context, args: Option<&Value>) -> Value {
        match &self.body {
            CommandBody::Native(operation) => operation.run(registry, context, args),
            CommandBody::Script(unit) => match self.id {
                Some(id) => unit.execute(registry, id, context, args),
                None => ShellError::NoScript {
                    qualified: self.name.clone(),
                }
                .into_value(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ShellConfig;
    use crate::error::success;
    use crate::output::OutputSink;
    use crate::schema::Validator;

    const USAGE: &str = "test.com {req:<required number>, op:<optional string>}";

    fn com1() -> Command {
        Command::native("com1", |_: &Registry, _: &Context, args: Option<&Value>| {
            match args.and_then(|a| a.get("op")) {
                Some(op) => Value::object([("ok", Value::Bool(true)), ("msg", op.clone())]),
                None => success(),
            }
        })
        .with_trust(SecurityLevel::MIDSEC)
        .with_usage(USAGE)
        .with_param(
            ArgumentSchema::named("req")
                .validator(Validator::number())
                .required(),
        )
        .with_param(ArgumentSchema::named("op").validator(Validator::string()))
    }

    fn registry() -> Registry {
        Registry::bare(&ShellConfig::default(), OutputSink::discard())
    }

    fn args(json: serde_json::Value) -> Value {
        Value::from_json(json)
    }

    #[test]
    fn no_arguments_returns_usage_when_something_is_required() {
        let reg = registry();
        let out = com1().execute(&reg, Context::default(), None);
        assert_eq!(out, Value::from(USAGE));
    }

    #[test]
    fn missing_required_field_fails_with_usage() {
        let reg = registry();
        let out = com1().execute(
            &reg,
            Context::default(),
            Some(&args(serde_json::json!({"op": "optional string"}))),
        );
        assert_eq!(out, ShellError::validation(USAGE).into_value());
    }

    #[test]
    fn wrong_type_fails_with_invalid_response_or_usage() {
        let reg = registry();
        let bad = args(serde_json::json!({"req": "should be a number"}));
        assert_eq!(
            com1().execute(&reg, Context::default(), Some(&bad)),
            ShellError::validation(USAGE).into_value()
        );

        let mut custom = com1();
        custom.params[0].invalid_response = Some("req must be a number".into());
        assert_eq!(
            custom.execute(&reg, Context::default(), Some(&bad)),
            ShellError::validation("req must be a number").into_value()
        );
    }

    #[test]
    fn valid_arguments_reach_the_operation() {
        let reg = registry();
        let out = com1().execute(
            &reg,
            Context::default(),
            Some(&args(serde_json::json!({"req": 6}))),
        );
        assert_eq!(out, success());
    }

    #[test]
    fn optional_only_command_runs_without_arguments() {
        let reg = registry();
        let cmd = Command::native("ping", |_: &Registry, _: &Context, args: Option<&Value>| {
            Value::Bool(args.is_none())
        })
        .with_param(ArgumentSchema::named("x"));
        assert_eq!(cmd.execute(&reg, Context::default(), None), Value::Bool(true));
    }

    #[test]
    fn unregistered_command_fills_this_script_with_its_name() {
        let reg = registry();
        let cmd = Command::native("who", |_: &Registry, ctx: &Context, _: Option<&Value>| {
            Value::from(ctx.this_script.as_str())
        });
        let out = cmd.execute(&reg, Context::default(), Some(&Value::Object(Default::default())));
        assert_eq!(out, Value::from("who"));
    }

    #[test]
    fn deferred_trust_is_computed_on_access() {
        let reg = registry();
        let cmd = Command::native("x", |_: &Registry, _: &Context, _: Option<&Value>| Value::Null)
            .with_deferred_trust(|_| SecurityLevel::LOWSEC);
        assert_eq!(cmd.security_level(&reg), SecurityLevel::LOWSEC);
    }

    #[test]
    fn context_value_shape() {
        let ctx = Context {
            this_script: "bob.t".into(),
            caller: "bob".into(),
            calling_script: None,
        };
        let v = ctx.to_value();
        assert_eq!(v.get("calling_script"), Some(&Value::Null));
        assert_eq!(v.get("caller"), Some(&Value::from("bob")));
    }
}
