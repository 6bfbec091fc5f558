use tracing::debug;

use hackshell_dsl::{parse_input, CommandLine, Directive, InputError, Invocation, Value};

use crate::display::present;
use crate::error::ShellError;
use crate::registry::{Registry, DEFAULT_DOMAIN};

impl From<InputError> for ShellError {
    fn from(err: InputError) -> Self {
        match err {
            InputError::BadName { name } => ShellError::BadName { name },
            InputError::NoMacro { .. } => ShellError::NoMacro,
        }
    }
}

impl Registry {
    /// Interprets one input line and returns its raw result.
    ///
    /// Every failure comes back as a value; nothing here aborts the session.
    pub fn exec(&mut self, line: &str) -> Value {
        let mut expanding = Vec::new();
        self.exec_line(line, &mut expanding)
    }

    fn exec_line(&mut self, line: &str, expanding: &mut Vec<String>) -> Value {
        debug!(line, "exec");
        match parse_input(line) {
            Ok(Invocation::Directive(directive)) => self.run_directive(directive, expanding),
            Ok(Invocation::Command(command)) => self.run_command_line(&command),
            Err(err) => ShellError::from(err).into_value(),
        }
    }

    fn run_directive(&mut self, directive: Directive, expanding: &mut Vec<String>) -> Value {
        match directive {
            Directive::List => Value::from(self.macros.listing()),
            Directive::Define { name, input } => {
                let message = format!("Macro created: {name} = {input}");
                self.macros.set(name, input);
                Value::String(message)
            }
            Directive::Run { name } => {
                let Some(stored) = self.macros.get(&name).map(str::to_string) else {
                    return ShellError::NoMacro.into_value();
                };
                if expanding.contains(&name) {
                    return ShellError::MacroCycle { name }.into_value();
                }
                self.output().send(&stored);
                expanding.push(name);
                let result = self.exec_line(&stored, expanding);
                expanding.pop();
                // The expanded line is shown like a typed one.
                Value::Array(vec![Value::String(stored), present(result)])
            }
        }
    }

    fn run_command_line(&self, line: &CommandLine) -> Value {
        let domain = line.domain.as_deref();
        let builtin = domain.is_none()
            && self
                .domain(DEFAULT_DOMAIN)
                .is_some_and(|d| d.contains(&line.command));

        if builtin {
            let tokens = line.positional_tokens();
            let args = (!tokens.is_empty()).then(|| Value::from(tokens));
            return self.execute_command(None, &line.command, args.as_ref(), None);
        }

        let typed = match domain {
            Some(d) => format!("{d}.{}", line.command),
            None => line.command.clone(),
        };
        let block = match line.argument_block() {
            Ok(block) => block,
            Err(err) => return self.bad_block(&typed, err),
        };
        let args = match block {
            None => None,
            Some(raw) => {
                let parsed = hackshell_dsl::parse_argument_object(raw, |path| {
                    self.bind_reference(path, Some(&typed))
                });
                match parsed {
                    Ok(object) => Some(Value::Object(object)),
                    Err(err) => return self.bad_block(&typed, err),
                }
            }
        };
        self.execute_command(domain, &line.command, args.as_ref(), None)
    }

    fn bad_block(&self, typed: &str, err: hackshell_dsl::ArgumentError) -> Value {
        let line = err.line();
        let detail = match &err {
            hackshell_dsl::ArgumentError::Unterminated { .. } => {
                "Unterminated argument block".to_string()
            }
            hackshell_dsl::ArgumentError::Syntax { message, .. } => message.clone(),
        };
        ShellError::BadSyntax {
            qualified: typed.to_string(),
            line,
            detail,
        }
        .into_value()
    }
}
