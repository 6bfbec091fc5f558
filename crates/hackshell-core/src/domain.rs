use std::collections::BTreeMap;

use crate::registry::CommandId;

/// A namespace of commands. Names are unique within a domain; the commands
/// themselves live in the registry arena.
#[derive(Debug, Clone, Default)]
pub struct CommandDomain {
    pub name: String,
    commands: BTreeMap<String, CommandId>,
}

impl CommandDomain {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            commands: BTreeMap::new(),
        }
    }

    pub fn get(&self, command: &str) -> Option<CommandId> {
        self.commands.get(command).copied()
    }

    pub fn contains(&self, command: &str) -> bool {
        self.commands.contains_key(command)
    }

    pub(crate) fn insert(&mut self, command: impl Into<String>, id: CommandId) -> Option<CommandId> {
        self.commands.insert(command.into(), id)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.commands.keys().map(String::as_str)
    }

    pub fn ids(&self) -> impl Iterator<Item = CommandId> + '_ {
        self.commands.values().copied()
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}
