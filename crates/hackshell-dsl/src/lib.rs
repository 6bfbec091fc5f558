//! hackshell surface syntaxes
//!
//! This crate holds every parser the shell needs and nothing that executes:
//! - `input`: one raw input line → macro directive or `domain.command` invocation
//! - `args`: the relaxed argument-object grammar (bare keys, `#reference` tokens)
//! - `script`: comment stripping, tokenizing, reference rewriting and parsing of
//!   script bodies into a typed AST
//! - `value`: the dynamic value model shared by arguments, results and scripts
//!
//! Resolution against a registry and evaluation live in `hackshell-core`.

pub mod args;
pub mod input;
mod lexical;
pub mod script;
pub mod value;

pub use args::{normalize, parse_argument_object, ArgumentError, Normalized};
pub use input::{parse_input, CommandLine, Directive, InputError, Invocation};
pub use lexical::is_valid_identifier;
pub use value::{BoundReference, Object, RefPath, Value};
