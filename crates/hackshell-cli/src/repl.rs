//! The interactive loop and the non-interactive `run` mode.
//!
//! By default we use `rustyline` for line editing, history and tab completion
//! of command names. A stdin-based fallback exists behind
//! `--no-default-features`.

use std::fs;
use std::io::{self, Read};
#[cfg(not(feature = "repl-rustyline"))]
use std::io::Write;
use std::path::Path;

use anyhow::{anyhow, Result};
use colored::Colorize;

use crate::render;
use crate::session::Session;

const PROMPT: &str = "hackshell> ";

enum ReplControl {
    Continue,
    Exit,
}

/// Handles loop-level words, then hands everything else to the session.
fn dispatch_line(session: &mut Session, line: &str) -> (ReplControl, bool) {
    if matches!(line, "exit" | "quit") {
        return (ReplControl::Exit, false);
    }
    let failed = render::print_result(session.exec(line));
    let control = if session.is_ended() {
        ReplControl::Exit
    } else {
        ReplControl::Continue
    };
    (control, failed)
}

pub fn cmd_repl(session: Session) -> Result<()> {
    #[cfg(feature = "repl-rustyline")]
    {
        return cmd_repl_rustyline(session);
    }
    #[cfg(not(feature = "repl-rustyline"))]
    {
        return cmd_repl_simple(session);
    }
}

/// Lines from `script` (a path, or `-` for stdin) followed by `commands`.
pub fn collect_lines(script: Option<&Path>, commands: &[String]) -> Result<Vec<String>> {
    let mut lines = Vec::new();
    if let Some(path) = script {
        let text = if path.as_os_str() == "-" {
            let mut buf = String::new();
            io::stdin().read_to_string(&mut buf)?;
            buf
        } else {
            fs::read_to_string(path)
                .map_err(|e| anyhow!("failed to read {}: {e}", path.display()))?
        };
        lines.extend(text.lines().map(str::to_string));
    }
    lines.extend(commands.iter().cloned());
    Ok(lines)
}

pub fn cmd_run(
    mut session: Session,
    script: Option<&Path>,
    commands: &[String],
    continue_on_error: bool,
    quiet: bool,
) -> Result<()> {
    let lines = collect_lines(script, commands)?;

    for (idx, raw_line) in lines.iter().enumerate() {
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with("//") {
            continue;
        }
        if !quiet {
            println!("{PROMPT}{line}");
        }

        match dispatch_line(&mut session, line) {
            (ReplControl::Exit, _) => break,
            (ReplControl::Continue, true) if !continue_on_error => {
                return Err(anyhow!("script failed at line {}: {line}", idx + 1));
            }
            (ReplControl::Continue, _) => {}
        }
    }

    Ok(())
}

fn banner() {
    println!("{}", "hackshell".green().bold());
}

#[cfg(not(feature = "repl-rustyline"))]
fn cmd_repl_simple(mut session: Session) -> Result<()> {
    banner();
    println!("Type `exit` to quit.\n");

    let stdin = io::stdin();
    loop {
        print!("{}", PROMPT.cyan().bold());
        io::stdout().flush()?;

        let mut line = String::new();
        if stdin.read_line(&mut line)? == 0 {
            break;
        }
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if let (ReplControl::Exit, _) = dispatch_line(&mut session, line) {
            break;
        }
    }

    Ok(())
}

#[cfg(feature = "repl-rustyline")]
fn cmd_repl_rustyline(mut session: Session) -> Result<()> {
    use rustyline::error::ReadlineError;
    use rustyline::Editor;

    banner();
    println!("Tab-completion enabled. Type `exit` to quit.\n");

    let mut rl: Editor<ReplLineHelper, rustyline::history::DefaultHistory> =
        Editor::new().map_err(|e| anyhow!("failed to init rustyline: {e}"))?;
    rl.set_helper(Some(ReplLineHelper::default()));

    loop {
        // Script directories and user switches change the name set.
        if let Some(helper) = rl.helper_mut() {
            helper.commands = session.command_names();
        }

        let line = match rl.readline(PROMPT) {
            Ok(l) => l,
            Err(ReadlineError::Eof) => break,
            Err(ReadlineError::Interrupted) => continue,
            Err(e) => return Err(anyhow!("readline error: {e}")),
        };

        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if let Err(e) = rl.add_history_entry(line) {
            eprintln!("{} failed to record history: {e}", "error:".red().bold());
        }

        if let (ReplControl::Exit, _) = dispatch_line(&mut session, line) {
            break;
        }
    }

    Ok(())
}

// =============================================================================
// Tab completion (rustyline)
// =============================================================================

#[cfg(feature = "repl-rustyline")]
#[derive(Default)]
struct ReplLineHelper {
    commands: Vec<String>,
}

#[cfg(feature = "repl-rustyline")]
impl ReplLineHelper {
    fn candidates(&self, prefix: &str) -> Vec<rustyline::completion::Pair> {
        self.commands
            .iter()
            .filter(|name| name.starts_with(prefix))
            .map(|name| rustyline::completion::Pair {
                display: name.clone(),
                replacement: name.clone(),
            })
            .collect()
    }
}

#[cfg(feature = "repl-rustyline")]
impl rustyline::Helper for ReplLineHelper {}

#[cfg(feature = "repl-rustyline")]
impl rustyline::highlight::Highlighter for ReplLineHelper {}

#[cfg(feature = "repl-rustyline")]
impl rustyline::hint::Hinter for ReplLineHelper {
    type Hint = String;
}

#[cfg(feature = "repl-rustyline")]
impl rustyline::validate::Validator for ReplLineHelper {}

#[cfg(feature = "repl-rustyline")]
impl rustyline::completion::Completer for ReplLineHelper {
    type Candidate = rustyline::completion::Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &rustyline::Context<'_>,
    ) -> rustyline::Result<(usize, Vec<Self::Candidate>)> {
        let head = &line[..pos];
        // Only the command name itself completes.
        if head.trim_start().contains(char::is_whitespace) || head.trim_start().starts_with('/') {
            return Ok((pos, Vec::new()));
        }
        let start = head.len() - head.trim_start().len();
        Ok((start, self.candidates(&head[start..])))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hackshell_core::{OutputSink, ShellConfig};
    use std::io::Write as _;

    fn session() -> Session {
        let config = ShellConfig {
            chat_delay_ms: 0,
            ..ShellConfig::default()
        };
        Session::new(&config, OutputSink::discard(), None).unwrap()
    }

    #[test]
    fn script_lines_come_before_inline_commands() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "user\n\n// comment\nchats.channels").unwrap();
        let lines = collect_lines(Some(file.path()), &["scripts.user".to_string()]).unwrap();
        assert_eq!(lines, vec!["user", "", "// comment", "chats.channels", "scripts.user"]);
    }

    #[test]
    fn run_stops_on_the_first_failure() {
        let commands = vec![
            "user".to_string(),
            r#"chats.send {channel: "0000", msg: "hi"}"#.to_string(),
            "user bob".to_string(),
        ];
        let err = cmd_run(session(), None, &commands, false, true).unwrap_err();
        assert!(err.to_string().contains("line 2"), "{err}");

        assert!(cmd_run(session(), None, &commands, true, true).is_ok());
    }

    #[test]
    fn run_ends_at_shutdown_or_exit() {
        let commands = vec!["shutdown".to_string(), "nope.nope".to_string()];
        assert!(cmd_run(session(), None, &commands, false, true).is_ok());

        let commands = vec!["exit".to_string(), "nope.nope".to_string()];
        assert!(cmd_run(session(), None, &commands, false, true).is_ok());
    }

    #[cfg(feature = "repl-rustyline")]
    #[test]
    fn completes_command_names() {
        let helper = ReplLineHelper {
            commands: vec!["chats.join".into(), "chats.send".into(), "user".into()],
        };
        let names: Vec<String> = helper
            .candidates("chats.")
            .into_iter()
            .map(|p| p.replacement)
            .collect();
        assert_eq!(names, vec!["chats.join", "chats.send"]);
    }
}
