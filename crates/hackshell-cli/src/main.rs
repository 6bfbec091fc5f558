//! hackshell CLI
//!
//! Interactive and scripted front end for the hackshell command interpreter:
//! - `repl` (the default) reads lines with editing, history and completion
//! - `run` executes lines from a file, stdin or `-e` arguments

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use tracing_subscriber::EnvFilter;

use hackshell_core::config::LOG_ENV;
use hackshell_core::{OutputSink, ShellConfig};

mod render;
mod repl;
mod scripts;
mod session;

use session::Session;

#[derive(Parser)]
#[command(name = "hackshell")]
#[command(author, version, about = "hackshell: a scriptable command shell")]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Args, Debug, Default)]
struct GlobalArgs {
    /// JSON config file (username, chat_delay_ms, max_call_depth, macros).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Active user name; overrides the config file and environment.
    #[arg(long, global = true)]
    user: Option<String>,

    /// Delay before chat messages are delivered.
    #[arg(long, global = true)]
    chat_delay_ms: Option<u64>,

    /// Directory of `*.js` user scripts.
    #[arg(long, global = true)]
    scripts: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Interactive shell (default).
    Repl,

    /// Execute lines non-interactively, echoing each one.
    Run {
        /// File of lines to run, or `-` for stdin.
        script: Option<PathBuf>,

        /// A line to run after the file; repeatable.
        #[arg(short = 'e', long = "exec")]
        commands: Vec<String>,

        /// Keep going after a line fails.
        #[arg(long)]
        continue_on_error: bool,

        /// Do not echo lines before running them.
        #[arg(long)]
        quiet: bool,
    },
}

/// Logs go to stderr so they never interleave with command output.
fn init_logging() -> Result<()> {
    let filter = EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_new("warn"))
        .context("failed to create log filter")?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();

    Ok(())
}

/// Defaults, then the config file, then the environment, then flags.
fn build_config(args: &GlobalArgs) -> Result<ShellConfig> {
    let config = match &args.config {
        Some(path) => ShellConfig::load(path)?,
        None => ShellConfig::default(),
    };
    let config = config.apply_env()?;
    apply_flags(config, args)
}

fn apply_flags(mut config: ShellConfig, args: &GlobalArgs) -> Result<ShellConfig> {
    if let Some(user) = &args.user {
        config.username = user.clone();
    }
    if let Some(delay) = args.chat_delay_ms {
        config.chat_delay_ms = delay;
    }
    config.validate()?;
    Ok(config)
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging()?;

    let config = build_config(&cli.global)?;
    let session = Session::new(&config, OutputSink::stdout(), cli.global.scripts.clone())?;

    let result = match cli.command.unwrap_or(Commands::Repl) {
        Commands::Repl => repl::cmd_repl(session),
        Commands::Run {
            script,
            commands,
            continue_on_error,
            quiet,
        } => repl::cmd_run(
            session,
            script.as_deref(),
            &commands,
            continue_on_error,
            quiet,
        ),
    };

    if let Err(e) = &result {
        eprintln!("{} {e:#}", "error:".red().bold());
        std::process::exit(1);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn flags_override_the_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hackshell.json");
        fs::write(&path, r#"{"username": "fromfile", "chat_delay_ms": 5}"#).unwrap();

        let file = ShellConfig::load(&path).unwrap();
        let args = GlobalArgs {
            user: Some("flagged".into()),
            ..GlobalArgs::default()
        };
        let config = apply_flags(file, &args).unwrap();
        assert_eq!(config.username, "flagged");
        assert_eq!(config.chat_delay_ms, 5);
    }

    #[test]
    fn invalid_flag_user_is_rejected() {
        let args = GlobalArgs {
            user: Some("9lives".into()),
            ..GlobalArgs::default()
        };
        assert!(apply_flags(ShellConfig::default(), &args).is_err());
    }

    #[test]
    fn cli_parses_run_mode() {
        let cli = Cli::try_parse_from([
            "hackshell",
            "--user",
            "bob",
            "run",
            "-e",
            "user",
            "-e",
            "chats.channels",
            "--quiet",
        ])
        .unwrap();
        assert_eq!(cli.global.user.as_deref(), Some("bob"));
        match cli.command {
            Some(Commands::Run {
                script,
                commands,
                quiet,
                continue_on_error,
            }) => {
                assert!(script.is_none());
                assert_eq!(commands, vec!["user", "chats.channels"]);
                assert!(quiet);
                assert!(!continue_on_error);
            }
            _ => panic!("expected run"),
        }
    }
}
