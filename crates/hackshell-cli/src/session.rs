//! One interactive session: the registry plus the terminal-only built-ins and
//! the script directory it was started with.

use std::cell::Cell;
use std::path::PathBuf;
use std::rc::Rc;

use anyhow::Result;
use tracing::{debug, warn};

use hackshell_core::{
    Command, Context, OutputSink, Registry, SecurityLevel, ShellConfig, Value, Visibility,
};

use crate::scripts;

const CLEAR_SCREEN: &str = "\x1B[2J\x1B[1;1H";
pub const POWEROFF: &str = "-terminal poweroff-";

pub struct Session {
    registry: Registry,
    scripts_dir: Option<PathBuf>,
    ended: Rc<Cell<bool>>,
}

impl Session {
    pub fn new(
        config: &ShellConfig,
        output: OutputSink,
        scripts_dir: Option<PathBuf>,
    ) -> Result<Self> {
        let mut registry = Registry::new(config, output);
        let ended = Rc::new(Cell::new(false));
        install_builtins(&mut registry, Rc::clone(&ended));

        if let Some(dir) = &scripts_dir {
            let count = scripts::register_dir(&mut registry, dir)?;
            debug!(dir = %dir.display(), count, "loaded script directory");
        }

        Ok(Self {
            registry,
            scripts_dir,
            ended,
        })
    }

    /// Runs one input line. A change of identity reloads the user domain
    /// from the script directory.
    pub fn exec(&mut self, line: &str) -> Value {
        let before = self.registry.identity();
        let result = self.registry.exec(line);

        if let Some(dir) = &self.scripts_dir {
            if self.registry.identity() != before {
                if let Err(err) = scripts::reload_user_domain(&mut self.registry, dir) {
                    warn!(dir = %dir.display(), error = %err, "failed to reload user scripts");
                }
            }
        }
        result
    }

    /// Set once `shutdown` has run.
    pub fn is_ended(&self) -> bool {
        self.ended.get()
    }

    pub fn command_names(&self) -> Vec<String> {
        self.registry.command_names()
    }
}

fn install_builtins(registry: &mut Registry, ended: Rc<Cell<bool>>) {
    registry.register(
        None,
        Command::native("clear", |reg: &Registry, _: &Context, _: Option<&Value>| {
            reg.output().send(CLEAR_SCREEN);
            Value::Null
        })
        .with_visibility(Visibility::Public)
        .with_trust(SecurityLevel::FULLSEC),
    );
    registry.register(
        None,
        Command::native("shutdown", move |_: &Registry, _: &Context, _: Option<&Value>| {
            ended.set(true);
            Value::from(POWEROFF)
        })
        .with_visibility(Visibility::Public)
        .with_trust(SecurityLevel::FULLSEC),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::fs;
    use std::sync::Arc;

    fn quiet_config() -> ShellConfig {
        ShellConfig {
            chat_delay_ms: 0,
            ..ShellConfig::default()
        }
    }

    #[test]
    fn shutdown_ends_the_session() {
        let mut session = Session::new(&quiet_config(), OutputSink::discard(), None).unwrap();
        assert!(!session.is_ended());
        assert_eq!(session.exec("shutdown"), Value::from(POWEROFF));
        assert!(session.is_ended());
    }

    #[test]
    fn clear_writes_to_the_sink() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = {
            let seen = Arc::clone(&seen);
            OutputSink::new(move |m| seen.lock().push(m.to_string()))
        };
        let mut session = Session::new(&quiet_config(), sink, None).unwrap();
        assert_eq!(session.exec("clear"), Value::Null);
        assert_eq!(seen.lock().as_slice(), [CLEAR_SCREEN]);
    }

    #[test]
    fn builtins_are_completable() {
        let session = Session::new(&quiet_config(), OutputSink::discard(), None).unwrap();
        let names = session.command_names();
        for expected in ["clear", "shutdown", "user", "chats.join", "scripts.trust"] {
            assert!(names.iter().any(|n| n == expected), "missing {expected}");
        }
    }

    #[test]
    fn switching_user_reloads_scripts() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("whoami.js"), "function (c, a) { return c.caller }").unwrap();

        let mut session =
            Session::new(&quiet_config(), OutputSink::discard(), Some(dir.path().to_path_buf()))
                .unwrap();
        assert_eq!(session.exec("whoami"), Value::from("anon"));

        fs::write(dir.path().join("extra.js"), "function (c, a) { return 1 }").unwrap();
        session.exec("user bob");
        assert_eq!(session.exec("bob.whoami"), Value::from("bob"));
        assert_eq!(session.exec("extra"), Value::from(1.0));
        assert_eq!(session.exec("bob.extra"), Value::from(1.0));
    }
}
