//! Commands whose body is script source compiled on demand.
//!
//! A unit's trust level is derived from the commands its body references,
//! transitively through other scripts. Static source is scanned and compiled
//! once; dynamic source is re-read on every invocation, and its trust level is
//! recomputed on every access except while the unit is already running.

mod deps;
mod eval;

use std::cell::{Cell, RefCell};
use std::fmt;
use std::io;
use std::rc::Rc;

use tracing::{debug, warn};

use hackshell_dsl::script::{self as syntax, ScriptAst, ScriptSyntaxError};
use hackshell_dsl::Value;

use crate::command::Context;
use crate::error::ShellError;
use crate::level::SecurityLevel;
use crate::registry::{CommandId, Registry};

pub use deps::{calculate_dependencies, calculate_security_level, Dependencies};
pub use eval::{Fault, FaultKind};

pub enum ScriptSource {
    Static(String),
    /// Produces the current text on every call.
    Dynamic(Box<dyn Fn() -> io::Result<String>>),
}

impl fmt::Debug for ScriptSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScriptSource::Static(text) => f.debug_tuple("Static").field(&text.len()).finish(),
            ScriptSource::Dynamic(_) => f.write_str("Dynamic(..)"),
        }
    }
}

#[derive(Debug)]
pub struct ScriptUnit {
    source: ScriptSource,
    references: RefCell<Option<Vec<CommandId>>>,
    compiled: RefCell<Option<Rc<ScriptAst>>>,
    exec_locks: Cell<u32>,
    level: Cell<Option<SecurityLevel>>,
}

/// Marks a unit as mid-invocation for as long as it lives.
struct ExecLock<'a>(&'a Cell<u32>);

impl<'a> ExecLock<'a> {
    fn acquire(locks: &'a Cell<u32>) -> Self {
        locks.set(locks.get() + 1);
        Self(locks)
    }
}

impl Drop for ExecLock<'_> {
    fn drop(&mut self) {
        self.0.set(self.0.get().saturating_sub(1));
    }
}

impl ScriptUnit {
    fn with_source(source: ScriptSource) -> Self {
        Self {
            source,
            references: RefCell::new(None),
            compiled: RefCell::new(None),
            exec_locks: Cell::new(0),
            level: Cell::new(None),
        }
    }

    pub fn new_static(source: impl Into<String>) -> Self {
        Self::with_source(ScriptSource::Static(source.into()))
    }

    pub fn new_dynamic(load: impl Fn() -> io::Result<String> + 'static) -> Self {
        Self::with_source(ScriptSource::Dynamic(Box::new(load)))
    }

    pub fn is_static(&self) -> bool {
        matches!(self.source, ScriptSource::Static(_))
    }

    pub fn is_executing(&self) -> bool {
        self.exec_locks.get() > 0
    }

    pub fn load(&self) -> io::Result<String> {
        match &self.source {
            ScriptSource::Static(text) => Ok(text.clone()),
            ScriptSource::Dynamic(load) => load(),
        }
    }

    /// Commands this body names directly. Frozen after the first scan when
    /// the source is static.
    pub fn get_dependencies(&self, registry: &Registry) -> Vec<CommandId> {
        if let Some(frozen) = self.references.borrow().as_ref() {
            return frozen.clone();
        }

        let source = match self.load() {
            Ok(source) => source,
            Err(err) => {
                warn!(error = %err, "failed to load script source while scanning references");
                return Vec::new();
            }
        };

        let mut resolved = Vec::new();
        for path in syntax::references(&source) {
            match path
                .target()
                .and_then(|(domain, name)| registry.resolve(domain, name))
            {
                Some(id) if !resolved.contains(&id) => resolved.push(id),
                Some(_) => {}
                None => warn!(reference = %path, "skipping unresolved script reference"),
            }
        }

        if self.is_static() {
            *self.references.borrow_mut() = Some(resolved.clone());
        }
        resolved
    }

    /// Trust level of the unit registered at `id`.
    pub fn security_level(&self, registry: &Registry, id: CommandId) -> SecurityLevel {
        if let Some(level) = self.level.get() {
            if self.is_static() || self.is_executing() {
                return level;
            }
        }
        let level = calculate_security_level(registry, id);
        debug!(
            script = %registry.qualified_name(id),
            level = %level,
            "computed script trust level"
        );
        self.level.set(Some(level));
        level
    }

    /// The compiled body, reusing the cached one for static source or while
    /// the unit is already running.
    pub fn evaluate(&self, qualified: &str) -> Result<Rc<ScriptAst>, ShellError> {
        if let Some(ast) = self.compiled.borrow().as_ref() {
            if self.is_static() || self.is_executing() {
                return Ok(Rc::clone(ast));
            }
        }

        let source = self.load().map_err(|err| ShellError::RuntimeFault {
            kind: FaultKind::Error.to_string(),
            message: format!("failed to load {qualified}: {err}"),
        })?;

        let ast = syntax::compile(&source, qualified).map_err(|err| match err {
            ScriptSyntaxError::Signature { line } => ShellError::BadSignature {
                qualified: qualified.to_string(),
                line,
            },
            ScriptSyntaxError::Syntax { line, message } => ShellError::BadSyntax {
                qualified: qualified.to_string(),
                line,
                detail: message,
            },
        })?;
        debug!(script = qualified, "compiled script body");

        let ast = Rc::new(ast);
        *self.compiled.borrow_mut() = Some(Rc::clone(&ast));
        Ok(ast)
    }

    pub fn execute(
        &self,
        registry: &Registry,
        id: CommandId,
        context: &Context,
        args: Option<&Value>,
    ) -> Value {
        let qualified = registry.qualified_name(id);
        let ast = match self.evaluate(&qualified) {
            Ok(ast) => ast,
            Err(err) => return err.into_value(),
        };

        let _lock = ExecLock::acquire(&self.exec_locks);
        match eval::run(registry, &ast, context, args) {
            Ok(value) => value,
            Err(fault) => ShellError::from(fault).into_value(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::Command;
    use crate::config::ShellConfig;
    use crate::output::OutputSink;

    fn leaf(reg: &mut Registry, domain: &str, name: &str, level: SecurityLevel) {
        reg.register(
            Some(domain),
            Command::native(name, |_: &Registry, _: &Context, _: Option<&Value>| Value::Null)
                .with_trust(level),
        );
    }

    fn registry() -> Registry {
        Registry::bare(&ShellConfig::default(), OutputSink::discard())
    }

    #[test]
    fn static_references_freeze_after_first_scan() {
        let mut reg = registry();
        leaf(&mut reg, "a", "x", SecurityLevel::MIDSEC);
        let id = reg.register(
            Some("anon"),
            Command::script(
                "s",
                ScriptUnit::new_static("function (c, a) { #s.a.x(); #s.a.x(); #s.a.nope() }"),
            ),
        );
        let unit = reg.command(id).and_then(Command::as_script).unwrap();
        let first = unit.get_dependencies(&reg);
        assert_eq!(first.len(), 1);

        leaf(&mut reg, "a", "nope", SecurityLevel::NULLSEC);
        let unit = reg.command(id).and_then(Command::as_script).unwrap();
        assert_eq!(unit.get_dependencies(&reg), first);
    }

    #[test]
    fn load_failure_scans_as_empty() {
        let reg = registry();
        let unit = ScriptUnit::new_dynamic(|| Err(io::Error::new(io::ErrorKind::NotFound, "gone")));
        assert!(unit.get_dependencies(&reg).is_empty());
    }

    #[test]
    fn compile_errors_name_the_script() {
        let unit = ScriptUnit::new_static("return 1");
        assert_eq!(
            unit.evaluate("anon.t").unwrap_err(),
            ShellError::BadSignature {
                qualified: "anon.t".into(),
                line: 1
            }
        );

        let unit = ScriptUnit::new_static("function (c, a) {\n  return )\n}");
        let err = unit.evaluate("anon.t").unwrap_err();
        assert!(
            err.to_string().starts_with("PARSE ERROR anon.t: SyntaxError: Line 2:"),
            "{err}"
        );
    }

    #[test]
    fn exec_lock_is_released() {
        let locks = Cell::new(0);
        {
            let _a = ExecLock::acquire(&locks);
            let _b = ExecLock::acquire(&locks);
            assert_eq!(locks.get(), 2);
        }
        assert_eq!(locks.get(), 0);
    }
}
