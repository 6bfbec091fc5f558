//! Argument-object grammar.
//!
//! Strict JSON object notation, relaxed in two ways:
//! - keys may be bare words (`{name: "x"}`)
//! - values may be unquoted reference tokens (`{target: #s.chats.send}`)
//!
//! Parsing runs in two passes. [`normalize`] rewrites the text into strict
//! JSON (quoting bare keys, swapping each reference for a placeholder
//! string); [`parse_argument_object`] then parses strictly and swaps the
//! placeholders back for bound values.

use std::collections::HashMap;

use nom::{
    branch::alt,
    bytes::complete::take_while1,
    character::complete::{anychar, char as pchar, multispace0},
    combinator::{map, peek, recognize, rest},
    sequence::{pair, terminated},
    IResult,
};
use thiserror::Error;

use crate::lexical::{is_word, reference_token};
use crate::value::{Object, RefPath, Value};

const PLACEHOLDER_PREFIX: &str = "#SID#_";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ArgumentError {
    #[error("Line {line}: Unterminated argument block")]
    Unterminated { line: usize },

    #[error("Line {line}: {message}")]
    Syntax {
        line: usize,
        message: String,
    },
}

impl ArgumentError {
    pub fn line(&self) -> usize {
        match self {
            ArgumentError::Unterminated { line } | ArgumentError::Syntax { line, .. } => *line,
        }
    }
}

/// Pass-one output: strict JSON text plus the placeholder table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Normalized {
    pub text: String,
    pub references: HashMap<String, RefPath>,
}

enum Piece<'a> {
    Verbatim(&'a str),
    BareKey(&'a str),
    Reference(Vec<&'a str>),
}

/// A double-quoted JSON string, escapes included. An unterminated string
/// swallows the rest of the input so the strict pass reports it.
fn string_literal(input: &str) -> IResult<&str, &str> {
    let mut chars = input.char_indices();
    if !matches!(chars.next(), Some((_, '"'))) {
        return Err(nom::Err::Error(nom::error::Error::new(
            input,
            nom::error::ErrorKind::Char,
        )));
    }

    let mut escaped = false;
    for (i, c) in chars {
        if escaped {
            escaped = false;
        } else if c == '\\' {
            escaped = true;
        } else if c == '"' {
            return Ok((&input[i + 1..], &input[..=i]));
        }
    }
    recognize(pair(pchar('"'), rest))(input)
}

fn bare_key(input: &str) -> IResult<&str, &str> {
    terminated(
        take_while1(is_word),
        peek(pair(multispace0, pchar(':'))),
    )(input)
}

fn piece(input: &str) -> IResult<&str, Piece<'_>> {
    alt((
        map(string_literal, Piece::Verbatim),
        map(reference_token, Piece::Reference),
        map(bare_key, Piece::BareKey),
        map(take_while1(is_word), Piece::Verbatim),
        map(recognize(anychar), Piece::Verbatim),
    ))(input)
}

/// Rewrites relaxed argument text into strict JSON.
///
/// String literals are copied untouched. Placeholders are unique within the
/// input: a candidate that already occurs in the raw text is skipped.
pub fn normalize(raw: &str) -> Normalized {
    let mut text = String::with_capacity(raw.len() + 16);
    let mut references = HashMap::new();
    let mut next_id = 0usize;

    let mut input = raw;
    while !input.is_empty() {
        let Ok((remaining, next)) = piece(input) else {
            break;
        };
        match next {
            Piece::Verbatim(s) => text.push_str(s),
            Piece::BareKey(key) => {
                text.push('"');
                text.push_str(key);
                text.push('"');
            }
            Piece::Reference(segments) => {
                let mut placeholder = format!("{PLACEHOLDER_PREFIX}{next_id}");
                next_id += 1;
                while raw.contains(&placeholder) {
                    placeholder = format!("{PLACEHOLDER_PREFIX}{next_id}");
                    next_id += 1;
                }
                text.push('"');
                text.push_str(&placeholder);
                text.push('"');
                references.insert(placeholder, RefPath::from_segments(segments));
            }
        }
        input = remaining;
    }

    Normalized { text, references }
}

/// Parses an argument block (braces included) into an object, binding each
/// reference token through `bind`.
pub fn parse_argument_object<F>(raw: &str, mut bind: F) -> Result<Object, ArgumentError>
where
    F: FnMut(&RefPath) -> Value,
{
    let normalized = normalize(raw);
    let json: serde_json::Value =
        serde_json::from_str(&normalized.text).map_err(|e| ArgumentError::Syntax {
            line: e.line(),
            message: json_error_message(&e),
        })?;

    match substitute(json, &normalized.references, &mut bind) {
        Value::Object(map) => Ok(map),
        other => Err(ArgumentError::Syntax {
            line: 1,
            message: format!("expected an object, found {}", other.type_name()),
        }),
    }
}

fn substitute<F>(json: serde_json::Value, references: &HashMap<String, RefPath>, bind: &mut F) -> Value
where
    F: FnMut(&RefPath) -> Value,
{
    match json {
        serde_json::Value::String(s) => match references.get(&s) {
            Some(path) => bind(path),
            None => Value::String(s),
        },
        serde_json::Value::Array(items) => Value::Array(
            items
                .into_iter()
                .map(|item| substitute(item, references, bind))
                .collect(),
        ),
        serde_json::Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(k, v)| (k, substitute(v, references, bind)))
                .collect(),
        ),
        other => Value::from_json(other),
    }
}

/// serde_json appends " at line L column C"; the location is reported
/// separately.
fn json_error_message(e: &serde_json::Error) -> String {
    let text = e.to_string();
    match text.rfind(" at line ") {
        Some(idx) => text[..idx].to_string(),
        None => text,
    }
}
