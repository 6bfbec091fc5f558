//! Terminal rendering of command results.

use colored::Colorize;

use hackshell_core::display::{self, is_failure_line, SUCCESS};
use hackshell_core::Value;

/// Lines to print for a raw command result.
pub fn lines(result: Value) -> Vec<String> {
    display::render_lines(&display::present(result))
}

fn paint(line: &str) -> String {
    if is_failure_line(line) {
        line.red().to_string()
    } else if line == SUCCESS {
        line.green().to_string()
    } else {
        line.to_string()
    }
}

/// Prints a result and reports whether any line was a failure.
pub fn print_result(result: Value) -> bool {
    let mut failed = false;
    for line in lines(result) {
        failed |= is_failure_line(&line);
        println!("{}", paint(&line));
    }
    failed
}

#[cfg(test)]
mod tests {
    use super::*;
    use hackshell_core::error::{failure, success};

    #[test]
    fn records_render_as_verdicts() {
        assert_eq!(lines(success()), vec!["Success"]);
        assert_eq!(lines(failure("no")), vec!["Failure", "no"]);
        assert_eq!(lines(Value::Null), Vec::<String>::new());
    }

    #[test]
    fn macro_failures_are_reported() {
        use hackshell_core::{OutputSink, Registry, ShellConfig};

        let config = ShellConfig {
            chat_delay_ms: 0,
            ..ShellConfig::default()
        };
        let mut reg = Registry::new(&config, OutputSink::discard());
        reg.exec(r#"/m = chats.create {name: "b"}"#);

        assert_eq!(lines(reg.exec("/m")), vec![r#"chats.create {name: "b"}"#, "Success"]);
        let again = lines(reg.exec("/m"));
        assert_eq!(again[1], "Failure");
        assert!(again.iter().any(|l| is_failure_line(l)));
    }

    #[test]
    fn painting_keeps_plain_lines() {
        colored::control::set_override(false);
        assert_eq!(paint("Active user: anon"), "Active user: anon");
        assert_eq!(paint("Failure"), "Failure");
    }
}
