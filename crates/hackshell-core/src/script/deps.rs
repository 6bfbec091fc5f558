use std::collections::{BTreeSet, HashMap, VecDeque};

use crate::level::SecurityLevel;
use crate::registry::{CommandId, Registry};

/// Result of a dependency walk: every script reached, with its reference
/// set, and the flattened set of non-script commands they name.
#[derive(Debug, Default)]
pub struct Dependencies {
    pub visited: HashMap<CommandId, Vec<CommandId>>,
    pub leaves: BTreeSet<CommandId>,
}

/// Breadth-first walk from `root` over script references. A script already
/// visited is never enqueued again, so cycles terminate.
pub fn calculate_dependencies(registry: &Registry, root: CommandId) -> Dependencies {
    let mut deps = Dependencies::default();
    let mut queue = VecDeque::from([root]);

    while let Some(id) = queue.pop_front() {
        if deps.visited.contains_key(&id) {
            continue;
        }
        let Some(unit) = registry.command(id).and_then(|c| c.as_script()) else {
            continue;
        };
        let references = unit.get_dependencies(registry);
        deps.visited.insert(id, references.clone());

        for dep in references {
            match registry.command(dep) {
                Some(cmd) if cmd.is_script() => {
                    if !deps.visited.contains_key(&dep) {
                        queue.push_back(dep);
                    }
                }
                Some(_) => {
                    deps.leaves.insert(dep);
                }
                None => {}
            }
        }
    }

    deps
}

/// Lowest trust level among the leaves reachable from `root`; `FULLSEC`
/// when there are none.
pub fn calculate_security_level(registry: &Registry, root: CommandId) -> SecurityLevel {
    let deps = calculate_dependencies(registry, root);
    let mut level = SecurityLevel::FULLSEC;
    for leaf in &deps.leaves {
        if let Some(cmd) = registry.command(*leaf) {
            level = level.min(cmd.security_level(registry));
        }
        if level == SecurityLevel::NULLSEC {
            break;
        }
    }
    level
}
