use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;

pub const USER_ENV: &str = "HACKSHELL_USER";
pub const CHAT_DELAY_ENV: &str = "HACKSHELL_CHAT_DELAY_MS";
pub const LOG_ENV: &str = "HACKSHELL_LOG";

/// Session settings. Sources, later overriding earlier: defaults, a JSON
/// file, the environment, then command-line flags (applied by the binary).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ShellConfig {
    pub username: String,
    pub chat_delay_ms: u64,
    pub max_call_depth: usize,
    /// `[name, input]` pairs preloaded into the macro store, in order.
    pub macros: Vec<(String, String)>,
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            username: "anon".to_string(),
            chat_delay_ms: 300,
            max_call_depth: 64,
            macros: Vec::new(),
        }
    }
}

impl ShellConfig {
    pub fn from_json_str(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_json_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn apply_env(self) -> Result<Self, ConfigError> {
        self.apply_env_from(|var| std::env::var(var).ok())
    }

    /// Environment overrides read through `lookup`, so tests need not touch
    /// the process environment.
    pub fn apply_env_from(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        if let Some(user) = lookup(USER_ENV).filter(|u| !u.is_empty()) {
            self.username = user;
        }
        if let Some(raw) = lookup(CHAT_DELAY_ENV).filter(|d| !d.is_empty()) {
            self.chat_delay_ms = raw.trim().parse().map_err(|_| ConfigError::Env {
                var: CHAT_DELAY_ENV,
                value: raw.clone(),
            })?;
        }
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !hackshell_dsl::is_valid_identifier(&self.username) {
            return Err(ConfigError::Username(self.username.clone()));
        }
        Ok(())
    }

    pub fn chat_delay(&self) -> Duration {
        Duration::from_millis(self.chat_delay_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_values_override_defaults() {
        let cfg = ShellConfig::from_json_str(
            r#"{"username": "bob", "macros": [["c", "chats.channels"]]}"#,
        )
        .unwrap();
        assert_eq!(cfg.username, "bob");
        assert_eq!(cfg.chat_delay_ms, 300);
        assert_eq!(cfg.macros, vec![("c".to_string(), "chats.channels".to_string())]);
    }

    #[test]
    fn unknown_fields_are_rejected() {
        assert!(ShellConfig::from_json_str(r#"{"usrname": "bob"}"#).is_err());
    }

    #[test]
    fn env_overrides() {
        let cfg = ShellConfig::default()
            .apply_env_from(|var| match var {
                USER_ENV => Some("alice".into()),
                CHAT_DELAY_ENV => Some("0".into()),
                _ => None,
            })
            .unwrap();
        assert_eq!(cfg.username, "alice");
        assert_eq!(cfg.chat_delay(), Duration::ZERO);

        let err = ShellConfig::default()
            .apply_env_from(|var| (var == CHAT_DELAY_ENV).then(|| "soon".to_string()))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Env { var: CHAT_DELAY_ENV, .. }));
    }

    #[test]
    fn invalid_username_is_rejected() {
        let err = ShellConfig::default()
            .apply_env_from(|var| (var == USER_ENV).then(|| "9lives".to_string()))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Username(_)));
    }

    #[test]
    fn load_reports_path() {
        let err = ShellConfig::load(Path::new("/nonexistent/hackshell.json")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/hackshell.json"));
    }
}
