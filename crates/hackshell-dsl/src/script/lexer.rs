use nom::{
    branch::alt,
    bytes::complete::take_while,
    character::complete::{char as pchar, digit1, one_of, satisfy},
    combinator::{map, opt, recognize},
    sequence::{pair, tuple},
    IResult,
};

use super::rewrite::CallSite;
use super::ScriptSyntaxError;
use crate::lexical::{is_word, reference_token};
use crate::value::RefPath;

/// Longest spellings first so `===` wins over `==` and `=`.
const PUNCTUATION: &[&str] = &[
    "===", "!==", "==", "!=", "<=", ">=", "&&", "||", "+=", "-=", "++", "--", "=", "<", ">",
    "+", "-", "*", "/", "%", "!", "?", ":", ".", ",", ";", "(", ")", "[", "]", "{", "}",
];

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Ident(String),
    Number(f64),
    Str(String),
    Reference(RefPath),
    Punct(&'static str),
    CallSite(CallSite),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Spanned {
    pub token: Token,
    pub line: usize,
}

impl Token {
    pub fn is_punct(&self, p: &str) -> bool {
        matches!(self, Token::Punct(q) if *q == p)
    }

    pub fn is_keyword(&self, word: &str) -> bool {
        matches!(self, Token::Ident(w) if w == word)
    }

    pub fn describe(&self) -> String {
        match self {
            Token::Ident(w) => w.clone(),
            Token::Number(n) => crate::value::format_number(*n),
            Token::Str(_) => "string".to_string(),
            Token::Reference(r) => r.raw().to_string(),
            Token::Punct(p) => (*p).to_string(),
            Token::CallSite(site) => site.qualified(),
        }
    }
}

fn identifier(input: &str) -> IResult<&str, &str> {
    recognize(pair(
        satisfy(|c| c.is_ascii_alphabetic() || c == '_' || c == '$'),
        take_while(|c: char| is_word(c) || c == '$'),
    ))(input)
}

fn number(input: &str) -> IResult<&str, f64> {
    let (rest, text) = recognize(tuple((
        digit1,
        opt(pair(pchar('.'), digit1)),
        opt(tuple((one_of("eE"), opt(one_of("+-")), digit1))),
    )))(input)?;
    let value = text.parse::<f64>().unwrap_or(f64::NAN);
    Ok((rest, value))
}

fn punct(input: &str) -> IResult<&str, &'static str> {
    match PUNCTUATION.iter().find(|p| input.starts_with(**p)) {
        Some(p) => Ok((&input[p.len()..], *p)),
        None => Err(nom::Err::Error(nom::error::Error::new(
            input,
            nom::error::ErrorKind::OneOf,
        ))),
    }
}

/// Reads a quoted string, decoding escapes. `None` when unterminated.
fn string_body(input: &str) -> Option<(&str, String)> {
    let mut chars = input.char_indices();
    let (_, quote) = chars.next()?;
    let mut out = String::new();

    while let Some((i, c)) = chars.next() {
        match c {
            '\n' => return None,
            '\\' => {
                let (_, esc) = chars.next()?;
                match esc {
                    'n' => out.push('\n'),
                    't' => out.push('\t'),
                    'r' => out.push('\r'),
                    '0' => out.push('\0'),
                    'u' => {
                        let start = i + 2;
                        let hex = input.get(start..start + 4)?;
                        let code = u32::from_str_radix(hex, 16).ok()?;
                        out.push(char::from_u32(code)?);
                        for _ in 0..4 {
                            chars.next();
                        }
                    }
                    other => out.push(other),
                }
            }
            c if c == quote => return Some((&input[i + 1..], out)),
            c => out.push(c),
        }
    }
    None
}

/// Splits comment-free script text into tokens.
pub fn tokenize(source: &str) -> Result<Vec<Spanned>, ScriptSyntaxError> {
    let mut tokens = Vec::new();
    let mut line = 1usize;
    let mut input = source;

    loop {
        let trimmed = input.trim_start();
        line += input[..input.len() - trimmed.len()].matches('\n').count();
        input = trimmed;

        let Some(first) = input.chars().next() else {
            break;
        };

        if first == '"' || first == '\'' {
            let Some((rest, text)) = string_body(input) else {
                return Err(ScriptSyntaxError::Syntax {
                    line,
                    message: "Invalid or unexpected token".to_string(),
                });
            };
            tokens.push(Spanned {
                token: Token::Str(text),
                line,
            });
            input = rest;
            continue;
        }

        let lexed: IResult<&str, Token> = alt((
            map(reference_token, |segments| {
                Token::Reference(RefPath::from_segments(segments))
            }),
            map(number, Token::Number),
            map(identifier, |w: &str| Token::Ident(w.to_string())),
            map(punct, Token::Punct),
        ))(input);

        match lexed {
            Ok((rest, token)) => {
                // Reject run-ons such as `12abc`.
                if rest.starts_with(is_word) && matches!(token, Token::Number(_)) {
                    return Err(ScriptSyntaxError::Syntax {
                        line,
                        message: "Invalid or unexpected token".to_string(),
                    });
                }
                tokens.push(Spanned { token, line });
                input = rest;
            }
            Err(_) => {
                let message = if first == '#' {
                    "Invalid reference".to_string()
                } else {
                    format!("Invalid or unexpected token '{first}'")
                };
                return Err(ScriptSyntaxError::Syntax { line, message });
            }
        }
    }

    Ok(tokens)
}

/// Every reference token outside string literals, deduplicated by raw text,
/// in order of first appearance. Expects comment-free text.
pub fn scan_references(source: &str) -> Vec<RefPath> {
    let mut found: Vec<RefPath> = Vec::new();
    let mut input = source;

    while let Some(first) = input.chars().next() {
        if first == '"' || first == '\'' {
            input = match string_body(input) {
                Some((rest, _)) => rest,
                None => &input[1..],
            };
            continue;
        }
        if first == '#' {
            if let Ok((rest, segments)) = reference_token(input) {
                let path = RefPath::from_segments(segments);
                if !found.iter().any(|p| p.raw() == path.raw()) {
                    found.push(path);
                }
                input = rest;
                continue;
            }
        }
        input = &input[first.len_utf8()..];
    }

    found
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<Token> {
        tokenize(source)
            .unwrap()
            .into_iter()
            .map(|s| s.token)
            .collect()
    }

    #[test]
    fn longest_punctuation_wins() {
        assert_eq!(
            kinds("a === b"),
            vec![
                Token::Ident("a".into()),
                Token::Punct("==="),
                Token::Ident("b".into())
            ]
        );
    }

    #[test]
    fn numbers_do_not_swallow_signs() {
        assert_eq!(
            kinds("a-1.5e2"),
            vec![
                Token::Ident("a".into()),
                Token::Punct("-"),
                Token::Number(150.0)
            ]
        );
    }

    #[test]
    fn strings_decode_escapes() {
        assert_eq!(
            kinds(r#"'it\'s' "a\nb""#),
            vec![Token::Str("it's".into()), Token::Str("a\nb".into())]
        );
    }

    #[test]
    fn tracks_lines() {
        let tokens = tokenize("a\n\nb").unwrap();
        assert_eq!(tokens[0].line, 1);
        assert_eq!(tokens[1].line, 3);
    }

    #[test]
    fn unterminated_string_is_an_error() {
        let err = tokenize("let a = 'oops\n").unwrap_err();
        assert_eq!(
            err,
            ScriptSyntaxError::Syntax {
                line: 1,
                message: "Invalid or unexpected token".into()
            }
        );
    }

    #[test]
    fn scan_skips_strings_and_deduplicates() {
        let refs = scan_references(r##"#s.a.b(); "#s.c.d"; #s.a.b; #e.f"##);
        let raws: Vec<&str> = refs.iter().map(RefPath::raw).collect();
        assert_eq!(raws, vec!["#s.a.b", "#e.f"]);
    }
}
