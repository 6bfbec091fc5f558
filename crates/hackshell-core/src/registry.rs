//! The session registry: domains, the command arena, macros and the active
//! identity.

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::time::Duration;

use tracing::debug;

use hackshell_dsl::{is_valid_identifier, BoundReference, RefPath, Value};

use crate::command::{Command, Context};
use crate::commands;
use crate::config::ShellConfig;
use crate::domain::CommandDomain;
use crate::error::ShellError;
use crate::macros::MacroStore;
use crate::output::OutputSink;

/// Internal domain of domain-less built-ins.
pub const DEFAULT_DOMAIN: &str = "default";
/// Internal domain of the active identity's own commands.
pub const USER_DOMAIN: &str = "user";

/// Index of a command in the registry arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CommandId(pub(crate) usize);

impl CommandId {
    pub fn index(self) -> usize {
        self.0
    }
}

pub struct Registry {
    commands: Vec<Option<Command>>,
    domains: BTreeMap<String, CommandDomain>,
    pub(crate) macros: MacroStore,
    identity: RefCell<String>,
    output: OutputSink,
    chat_delay: Duration,
    max_call_depth: usize,
    call_depth: Cell<usize>,
}

/// Holds one level of nested command invocation; released on drop.
pub struct CallGuard<'a> {
    depth: &'a Cell<usize>,
}

impl Drop for CallGuard<'_> {
    fn drop(&mut self) {
        self.depth.set(self.depth.get().saturating_sub(1));
    }
}

impl Registry {
    /// A registry with the standard domains and the configured macros.
    pub fn new(config: &ShellConfig, output: OutputSink) -> Self {
        let mut registry = Self::bare(config, output);
        commands::install(&mut registry);
        for (name, input) in &config.macros {
            registry.macros.set(name.clone(), input.clone());
        }
        registry
    }

    /// A registry with no commands and no macros.
    pub fn bare(config: &ShellConfig, output: OutputSink) -> Self {
        Self {
            commands: Vec::new(),
            domains: BTreeMap::new(),
            macros: MacroStore::new(),
            identity: RefCell::new(config.username.clone()),
            output,
            chat_delay: config.chat_delay(),
            max_call_depth: config.max_call_depth,
            call_depth: Cell::new(0),
        }
    }

    pub fn identity(&self) -> String {
        self.identity.borrow().clone()
    }

    /// Switches the active identity. Returns false for an invalid name.
    pub fn set_identity(&self, name: &str) -> bool {
        if !is_valid_identifier(name) {
            return false;
        }
        debug!(user = name, "identity changed");
        *self.identity.borrow_mut() = name.to_string();
        true
    }

    pub fn output(&self) -> &OutputSink {
        &self.output
    }

    pub fn chat_delay(&self) -> Duration {
        self.chat_delay
    }

    pub fn macros(&self) -> &MacroStore {
        &self.macros
    }

    pub fn set_macro(&mut self, name: impl Into<String>, input: impl Into<String>) {
        self.macros.set(name, input);
    }

    // ========================================================================
    // Domain names
    // ========================================================================

    /// Internal domain name for a user-supplied one.
    pub fn normalize_domain(&self, domain: Option<&str>) -> String {
        match domain {
            None | Some("") => DEFAULT_DOMAIN.to_string(),
            Some(d) if *self.identity.borrow() == d => USER_DOMAIN.to_string(),
            Some(d) => d.to_string(),
        }
    }

    /// Display name for an internal domain name; `None` for built-ins.
    pub fn display_domain(&self, domain: &str) -> Option<String> {
        match domain {
            DEFAULT_DOMAIN => None,
            USER_DOMAIN => Some(self.identity()),
            other => Some(other.to_string()),
        }
    }

    fn display_name(&self, domain: &str, name: &str) -> String {
        match self.display_domain(domain) {
            Some(d) => format!("{d}.{name}"),
            None => name.to_string(),
        }
    }

    /// `domain.name` as shown to the user.
    pub fn qualified_name(&self, id: CommandId) -> String {
        match self.command(id) {
            Some(cmd) => self.display_name(cmd.domain().unwrap_or(DEFAULT_DOMAIN), &cmd.name),
            None => String::new(),
        }
    }

    // ========================================================================
    // Lookup
    // ========================================================================

    /// Finds a command. Without a domain, built-ins are searched first and
    /// then the active identity's own commands.
    pub fn resolve(&self, domain: Option<&str>, name: &str) -> Option<CommandId> {
        let normalized = self.normalize_domain(domain);
        let found = self.domains.get(&normalized).and_then(|d| d.get(name));
        match (found, domain) {
            (Some(id), _) => Some(id),
            (None, None) => self.domains.get(USER_DOMAIN).and_then(|d| d.get(name)),
            (None, Some(_)) => None,
        }
    }

    pub fn command(&self, id: CommandId) -> Option<&Command> {
        self.commands.get(id.0).and_then(Option::as_ref)
    }

    pub fn get(&self, domain: Option<&str>, name: &str) -> Option<&Command> {
        self.resolve(domain, name).and_then(|id| self.command(id))
    }

    /// Resolves `domain.command` or `command` as typed by a user.
    pub fn resolve_command_string(&self, text: &str) -> Option<CommandId> {
        let text = text.trim();
        match text.split_once('.') {
            Some((domain, name)) if is_valid_identifier(domain) && is_valid_identifier(name) => {
                self.resolve(Some(domain), name)
            }
            None if is_valid_identifier(text) => self.resolve(None, text),
            _ => None,
        }
    }

    pub fn domain(&self, name: &str) -> Option<&CommandDomain> {
        self.domains.get(name)
    }

    // ========================================================================
    // Registration
    // ========================================================================

    /// Registers `command` under a user-supplied domain name (normalized
    /// first). A command of the same name in that domain is replaced in
    /// place and keeps its id.
    pub fn register(&mut self, domain: Option<&str>, mut command: Command) -> CommandId {
        let domain = self.normalize_domain(domain);
        let entry = self
            .domains
            .entry(domain.clone())
            .or_insert_with(|| CommandDomain::new(domain.clone()));

        let id = entry
            .get(&command.name)
            .unwrap_or(CommandId(self.commands.len()));
        entry.insert(command.name.clone(), id);

        debug!(domain = %domain, command = %command.name, "registered command");
        command.id = Some(id);
        command.domain = Some(domain);
        if id.0 == self.commands.len() {
            self.commands.push(Some(command));
        } else {
            self.commands[id.0] = Some(command);
        }
        id
    }

    /// Drops an internal domain and every command in it.
    pub fn remove_domain(&mut self, domain: &str) {
        if let Some(removed) = self.domains.remove(domain) {
            for id in removed.ids() {
                if let Some(slot) = self.commands.get_mut(id.0) {
                    *slot = None;
                }
            }
        }
    }

    /// Every qualified command name, in display form.
    pub fn command_names(&self) -> Vec<String> {
        self.domains
            .values()
            .flat_map(|d| d.names().map(move |n| self.display_name(&d.name, n)))
            .collect()
    }

    /// Internal names of every domain.
    pub fn domain_names(&self) -> impl Iterator<Item = &str> {
        self.domains.keys().map(String::as_str)
    }

    /// Qualified names of the commands in one internal domain.
    pub fn domain_command_names(&self, domain: &str) -> Vec<String> {
        self.domains
            .get(domain)
            .map(|d| d.names().map(|n| self.display_name(domain, n)).collect())
            .unwrap_or_default()
    }

    // ========================================================================
    // Execution
    // ========================================================================

    /// Runs a command by name and returns its raw result.
    pub fn execute_command(
        &self,
        domain: Option<&str>,
        name: &str,
        args: Option<&Value>,
        calling_script: Option<&str>,
    ) -> Value {
        let Some(id) = self.resolve(domain, name) else {
            let domain = domain.map(str::to_string).unwrap_or_else(|| self.identity());
            return ShellError::NoScript {
                qualified: format!("{domain}.{name}"),
            }
            .into_value();
        };
        let Some(command) = self.command(id) else {
            return Value::Null;
        };

        let context = Context {
            this_script: self.qualified_name(id),
            caller: self.identity(),
            calling_script: calling_script.map(str::to_string),
        };
        debug!(
            command = %context.this_script,
            caller = %context.caller,
            calling_script = ?context.calling_script,
            "dispatching command"
        );
        command.execute(self, context, args)
    }

    /// Binds a reference token for `caller`; `null` when it names nothing.
    pub fn bind_reference(&self, path: &RefPath, caller: Option<&str>) -> Value {
        let Some((domain, command)) = path.target() else {
            return Value::Null;
        };
        match self.resolve(domain, command) {
            Some(id) => Value::Reference(BoundReference {
                domain: domain.map(str::to_string),
                command: command.to_string(),
                name: self.qualified_name(id),
                caller: caller.map(str::to_string),
            }),
            None => Value::Null,
        }
    }

    /// `reference.call(args)`
    pub fn call_reference(&self, reference: &BoundReference, args: Option<&Value>) -> Value {
        self.execute_command(
            reference.domain.as_deref(),
            &reference.command,
            args,
            reference.caller.as_deref(),
        )
    }

    /// Takes one level of call depth, or `None` past the configured limit.
    pub fn enter_call(&self) -> Option<CallGuard<'_>> {
        let depth = self.call_depth.get();
        if depth >= self.max_call_depth {
            return None;
        }
        self.call_depth.set(depth + 1);
        Some(CallGuard {
            depth: &self.call_depth,
        })
    }
}
