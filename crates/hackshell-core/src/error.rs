use std::path::PathBuf;

use thiserror::Error;

use hackshell_dsl::Value;

/// Everything a command line can fail with. None of these abort the session:
/// each converts into the value shown to the user.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ShellError {
    #[error("{name} is an invalid script name.")]
    BadName { name: String },

    #[error(":::TRUST COMMUNICATION::: PARSE ERROR {qualified}: script doesn't exist")]
    NoScript { qualified: String },

    #[error("Macro does not exist.")]
    NoMacro,

    /// Rendered as `{ok: false, msg}`.
    #[error("{message}")]
    Validation { message: String },

    #[error(
        "PARSE ERROR {qualified} (line {line}): code must be wrapped in a function \
         (must start with 'function (context, args) {{')"
    )]
    BadSignature { qualified: String, line: usize },

    #[error("PARSE ERROR {qualified}: SyntaxError: Line {line}: {detail}")]
    BadSyntax {
        qualified: String,
        line: usize,
        detail: String,
    },

    #[error(":::TRUST COMMUNICATION::: {kind}: {message}")]
    RuntimeFault { kind: String, message: String },

    #[error("Macro {name} expands into itself.")]
    MacroCycle { name: String },
}

impl ShellError {
    pub fn validation(message: impl Into<String>) -> Self {
        ShellError::Validation {
            message: message.into(),
        }
    }

    pub fn into_value(self) -> Value {
        match self {
            ShellError::Validation { message } => failure(message),
            other => Value::String(other.to_string()),
        }
    }
}

/// `{ok: false, msg}`
pub fn failure(message: impl Into<String>) -> Value {
    Value::object([
        ("ok", Value::Bool(false)),
        ("msg", Value::String(message.into())),
    ])
}

/// `{ok: true}`
pub fn success() -> Value {
    Value::object([("ok", Value::Bool(true))])
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid value for {var}: {value:?}")]
    Env { var: &'static str, value: String },

    #[error("{0} is not a valid user name")]
    Username(String),
}

/// Raised while building schemas, never while validating arguments.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    #[error("unknown validator {0:?}")]
    UnknownValidator(String),

    #[error("unknown {family} condition {name:?}")]
    UnknownCondition { family: &'static str, name: String },

    #[error("invalid parameter for {family} condition {name:?}: {reason}")]
    InvalidParameter {
        family: &'static str,
        name: String,
        reason: String,
    },

    #[error("invalid pattern: {0}")]
    Pattern(String),

    #[error("invalid validator spec: {0}")]
    InvalidSpec(String),

    #[error("invalid security level {0}: must be in 0..=4")]
    Level(i64),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_texts() {
        assert_eq!(
            ShellError::NoScript {
                qualified: "foo.bar".into()
            }
            .to_string(),
            ":::TRUST COMMUNICATION::: PARSE ERROR foo.bar: script doesn't exist"
        );
        assert_eq!(
            ShellError::BadSignature {
                qualified: "bob.t".into(),
                line: 1
            }
            .to_string(),
            "PARSE ERROR bob.t (line 1): code must be wrapped in a function (must start with 'function (context, args) {')"
        );
        assert_eq!(
            ShellError::RuntimeFault {
                kind: "TypeError".into(),
                message: "x is not a function".into()
            }
            .to_string(),
            ":::TRUST COMMUNICATION::: TypeError: x is not a function"
        );
    }

    #[test]
    fn validation_becomes_failure_record() {
        let value = ShellError::validation("nope").into_value();
        assert_eq!(value.get("ok"), Some(&Value::Bool(false)));
        assert_eq!(value.get("msg"), Some(&Value::from("nope")));
    }
}
