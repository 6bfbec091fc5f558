use hackshell_dsl::Value;

use crate::command::{Command, Context};
use crate::error::ShellError;
use crate::level::{SecurityLevel, Visibility};
use crate::registry::Registry;
use crate::schema::ArgumentSchema;

/// `user [name]`: show or switch the active identity.
fn user(registry: &Registry, _context: &Context, args: Option<&Value>) -> Value {
    let requested = args
        .and_then(|a| a.as_array())
        .and_then(|tokens| tokens.first())
        .and_then(Value::as_str);

    if let Some(name) = requested {
        if !registry.set_identity(name) {
            return ShellError::validation(format!("{name} is not a valid user name")).into_value();
        }
    }
    Value::String(format!("Active user: {}", registry.identity()))
}

pub(super) fn install(registry: &mut Registry) {
    registry.register(
        None,
        Command::native("user", user)
            .with_visibility(Visibility::Public)
            .with_trust(SecurityLevel::FULLSEC)
            .with_usage("user [name]")
            .with_param(ArgumentSchema::positional(0)),
    );
}

#[cfg(test)]
mod tests {
    use crate::config::ShellConfig;
    use crate::output::OutputSink;
    use crate::registry::Registry;
    use hackshell_dsl::Value;

    #[test]
    fn shows_and_switches_identity() {
        let mut reg = Registry::new(&ShellConfig::default(), OutputSink::discard());
        assert_eq!(reg.exec("user"), Value::from("Active user: anon"));
        assert_eq!(reg.exec("user bob"), Value::from("Active user: bob"));
        assert_eq!(reg.identity(), "bob");

        let out = reg.exec("user 9bad");
        assert_eq!(out.get("msg"), Some(&Value::from("9bad is not a valid user name")));
        assert_eq!(reg.identity(), "bob");
    }
}
