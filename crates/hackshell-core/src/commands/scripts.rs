use hackshell_dsl::Value;

use crate::command::{Command, Context};
use crate::error::{failure, ShellError};
use crate::level::{SecurityLevel, Visibility};
use crate::registry::{CommandId, Registry, DEFAULT_DOMAIN, USER_DOMAIN};
use crate::schema::{ArgumentSchema, Validator};

pub const SCRIPTS_DOMAIN: &str = "scripts";

fn name_param() -> ArgumentSchema {
    ArgumentSchema::named("name")
        .validator(Validator::string())
        .required()
}

/// Resolves the `name` argument, or the failure record naming it.
fn target(registry: &Registry, args: Option<&Value>) -> Result<CommandId, Value> {
    let name = args
        .and_then(|a| a.get("name"))
        .and_then(Value::as_str)
        .unwrap_or_default()
        .trim();
    registry.resolve_command_string(name).ok_or_else(|| {
        failure(
            ShellError::NoScript {
                qualified: name.to_string(),
            }
            .to_string(),
        )
    })
}

fn get_level(registry: &Registry, context: &Context, args: Option<&Value>) -> Value {
    let id = match target(registry, args) {
        Ok(id) => id,
        Err(failed) => return failed,
    };
    let Some(command) = registry.command(id) else {
        return Value::Null;
    };
    let level = command.security_level(registry);
    if context.calling_script.is_some() {
        Value::from(level.value())
    } else {
        Value::from(level.name())
    }
}

fn get_access_level(registry: &Registry, _context: &Context, args: Option<&Value>) -> Value {
    match target(registry, args) {
        Ok(id) => registry
            .command(id)
            .map(|c| Value::from(c.visibility.as_str()))
            .unwrap_or_default(),
        Err(failed) => failed,
    }
}

fn trust(registry: &Registry, _context: &Context, _args: Option<&Value>) -> Value {
    let names: Vec<String> = registry
        .domain_names()
        .filter(|domain| ![DEFAULT_DOMAIN, USER_DOMAIN].contains(domain))
        .flat_map(|domain| registry.domain_command_names(domain))
        .collect();
    Value::from(names)
}

fn user(registry: &Registry, _context: &Context, _args: Option<&Value>) -> Value {
    Value::from(registry.domain_command_names(USER_DOMAIN))
}

pub(super) fn install(registry: &mut Registry) {
    let domain = Some(SCRIPTS_DOMAIN);
    registry.register(
        domain,
        Command::native("get_level", get_level)
            .with_visibility(Visibility::Trust)
            .with_trust(SecurityLevel::FULLSEC)
            .with_usage(r#"Usage: scripts.get_level { name: "<scriptname>" }"#)
            .with_param(name_param()),
    );
    registry.register(
        domain,
        Command::native("get_access_level", get_access_level)
            .with_visibility(Visibility::Trust)
            .with_trust(SecurityLevel::FULLSEC)
            .with_usage(r#"Usage: scripts.get_access_level { name: "<scriptname>" }"#)
            .with_param(name_param()),
    );
    registry.register(
        domain,
        Command::native("trust", trust)
            .with_visibility(Visibility::Trust)
            .with_trust(SecurityLevel::FULLSEC),
    );
    registry.register(
        domain,
        Command::native("user", user)
            .with_visibility(Visibility::Trust)
            .with_trust(SecurityLevel::MIDSEC),
    );
}
