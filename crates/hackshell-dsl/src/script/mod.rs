//! Script bodies.
//!
//! Pipeline: [`strip_comments`] → [`tokenize`] → [`rewrite_references`] →
//! [`parse_script`]. [`compile`] runs all four; [`references`] runs the scan
//! used for dependency discovery.

pub mod ast;
mod comments;
mod lexer;
mod parser;
mod rewrite;

use thiserror::Error;

pub use ast::{AssignOp, BinaryOp, Expr, Literal, LogicalOp, ScriptAst, Stmt, UnaryOp};
pub use comments::strip_comments;
pub use lexer::{scan_references, tokenize, Spanned, Token};
pub use parser::parse_script;
pub use rewrite::{rewrite_references, CallSite};

use crate::value::RefPath;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScriptSyntaxError {
    #[error("code must be wrapped in a function (line {line})")]
    Signature { line: usize },

    #[error("Line {line}: {message}")]
    Syntax { line: usize, message: String },
}

/// Compiles script source for the script qualified as `calling_script`.
pub fn compile(source: &str, calling_script: &str) -> Result<ScriptAst, ScriptSyntaxError> {
    let stripped = strip_comments(source);
    let tokens = tokenize(&stripped)?;
    let tokens = rewrite_references(tokens, calling_script)?;
    parse_script(&tokens)
}

/// Reference tokens named by `source`, ignoring comments and strings.
pub fn references(source: &str) -> Vec<RefPath> {
    scan_references(&strip_comments(source))
}
