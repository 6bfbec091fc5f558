//! Script directory discovery: every `*.js` file directly inside the
//! directory becomes a user-domain command that re-reads its file on each use.

use std::ffi::OsStr;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::{debug, warn};
use walkdir::WalkDir;

use hackshell_core::{Command, Registry, ScriptUnit, USER_DOMAIN};
use hackshell_dsl::is_valid_identifier;

const SCRIPT_EXTENSION: &str = "js";

/// Registers the scripts found in `dir`. Returns how many were registered.
pub fn register_dir(registry: &mut Registry, dir: &Path) -> Result<usize> {
    let mut registered = 0;
    for entry in WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let entry =
            entry.with_context(|| format!("failed to read script directory {}", dir.display()))?;
        let path = entry.path();
        if !entry.file_type().is_file()
            || path.extension().and_then(OsStr::to_str) != Some(SCRIPT_EXTENSION)
        {
            continue;
        }
        let Some(name) = path.file_stem().and_then(OsStr::to_str) else {
            continue;
        };
        if !is_valid_identifier(name) {
            warn!(path = %path.display(), "skipping script with an invalid name");
            continue;
        }

        let source = path.to_path_buf();
        let unit = ScriptUnit::new_dynamic(move || fs::read_to_string(&source));
        registry.register(Some(USER_DOMAIN), Command::script(name, unit));
        debug!(script = name, path = %path.display(), "registered user script");
        registered += 1;
    }
    Ok(registered)
}

/// Drops the user domain and registers `dir` again.
pub fn reload_user_domain(registry: &mut Registry, dir: &Path) -> Result<usize> {
    registry.remove_domain(USER_DOMAIN);
    register_dir(registry, dir)
}
