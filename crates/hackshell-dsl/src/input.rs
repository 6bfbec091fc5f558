//! Input-line grammar.
//!
//! A line is either a macro directive:
//!
//! ```text
//! /                 list macros
//! /name = tail      define (or overwrite) a macro
//! /name             run a macro
//! ```
//!
//! or a command invocation `[domain.]command` followed by an argument block
//! `{ ... }` or, for built-ins, whitespace-separated positional tokens.

use nom::{
    bytes::complete::take_while,
    character::complete::{char as pchar, multispace0},
    combinator::{opt, rest},
    sequence::{delimited, pair, preceded},
    IResult,
};
use thiserror::Error;

use crate::args::ArgumentError;
use crate::lexical::{is_valid_identifier, is_word};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InputError {
    #[error("{name} is an invalid script name.")]
    BadName { name: String },

    #[error("Macro does not exist.")]
    NoMacro { name: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive {
    List,
    Define { name: String, input: String },
    Run { name: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine {
    /// Domain exactly as typed (not normalized).
    pub domain: Option<String>,
    pub command: String,
    /// Everything after the command name.
    pub rest: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Invocation {
    Directive(Directive),
    Command(CommandLine),
}

pub fn parse_input(line: &str) -> Result<Invocation, InputError> {
    let line = line.trim();
    let (rest, head) = command_head(line).unwrap_or((line, ""));

    if head.is_empty() {
        return parse_directive(line).map(Invocation::Directive);
    }

    let (domain, command) = match head.split_once('.') {
        Some((domain, command)) => (Some(domain), command),
        None => (None, head),
    };

    let well_formed =
        domain.map_or(true, is_valid_identifier) && is_valid_identifier(command);
    if !well_formed {
        return Err(InputError::BadName {
            name: head.to_string(),
        });
    }

    Ok(Invocation::Command(CommandLine {
        domain: domain.map(str::to_string),
        command: command.to_string(),
        rest: rest.to_string(),
    }))
}

fn command_head(input: &str) -> IResult<&str, &str> {
    take_while(|c: char| is_word(c) || c == '.')(input)
}

fn directive(input: &str) -> IResult<&str, (&str, Option<&str>)> {
    preceded(
        pchar('/'),
        pair(
            take_while(is_word),
            opt(preceded(delimited(multispace0, pchar('='), multispace0), rest)),
        ),
    )(input)
}

fn parse_directive(line: &str) -> Result<Directive, InputError> {
    let Ok((leftover, (name, tail))) = directive(line) else {
        return Err(InputError::BadName {
            name: String::new(),
        });
    };

    if !leftover.trim().is_empty() {
        // `/ name` and `/name junk` never name a stored macro.
        return Err(InputError::NoMacro {
            name: line[1..].trim().to_string(),
        });
    }

    let tail = tail.map(str::trim).unwrap_or_default();
    match (name.is_empty(), tail.is_empty()) {
        (true, true) if line == "/" => Ok(Directive::List),
        (true, false) => Err(InputError::BadName {
            name: String::new(),
        }),
        (_, false) => Ok(Directive::Define {
            name: name.to_string(),
            input: tail.to_string(),
        }),
        (_, true) => Ok(Directive::Run {
            name: name.to_string(),
        }),
    }
}

impl CommandLine {
    /// Remainder of the line as whitespace-separated tokens.
    pub fn positional_tokens(&self) -> Vec<String> {
        self.rest.split_whitespace().map(str::to_string).collect()
    }

    /// The first balanced `{ ... }` block of the remainder, braces included.
    ///
    /// Braces inside string literals do not count toward the balance.
    pub fn argument_block(&self) -> Result<Option<&str>, ArgumentError> {
        let Some(start) = self.rest.find('{') else {
            return Ok(None);
        };
        let text = &self.rest[start..];

        let mut depth = 0usize;
        let mut quote: Option<char> = None;
        let mut escaped = false;
        for (i, c) in text.char_indices() {
            if let Some(q) = quote {
                if escaped {
                    escaped = false;
                } else if c == '\\' {
                    escaped = true;
                } else if c == q {
                    quote = None;
                }
                continue;
            }
            match c {
                '"' | '\'' => quote = Some(c),
                '{' => depth += 1,
                '}' => {
                    depth -= 1;
                    if depth == 0 {
                        return Ok(Some(&text[..=i]));
                    }
                }
                _ => {}
            }
        }

        Err(ArgumentError::Unterminated { line: 1 })
    }
}
