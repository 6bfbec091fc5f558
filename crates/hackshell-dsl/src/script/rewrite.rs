use super::lexer::{Spanned, Token};
use super::ScriptSyntaxError;

/// A reference token bound to the script it appears in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallSite {
    pub domain: Option<String>,
    pub command: String,
    /// Qualified name of the enclosing script.
    pub caller: String,
}

impl CallSite {
    pub fn qualified(&self) -> String {
        match &self.domain {
            Some(domain) => format!("{domain}.{}", self.command),
            None => self.command.clone(),
        }
    }
}

/// Keywords that expect an expression to follow.
const PREFIX_KEYWORDS: &[&str] = &["return", "typeof", "of", "else", "in", "case", "throw", "do"];

fn ends_expression(token: &Token, closes_header: bool) -> bool {
    match token {
        Token::Ident(word) => !PREFIX_KEYWORDS.contains(&word.as_str()),
        Token::Number(_) | Token::Str(_) | Token::CallSite(_) | Token::Reference(_) => true,
        Token::Punct(")") => !closes_header,
        Token::Punct(p) => matches!(*p, "]" | "}" | "++" | "--"),
    }
}

/// Replaces every reference token with a [`CallSite`] bound to
/// `calling_script`.
///
/// A `;` is inserted in front of a call site that directly follows a complete
/// expression, so a missing terminator on the previous statement does not
/// turn the call into a continuation of it.
pub fn rewrite_references(
    tokens: Vec<Spanned>,
    calling_script: &str,
) -> Result<Vec<Spanned>, ScriptSyntaxError> {
    let mut out: Vec<Spanned> = Vec::with_capacity(tokens.len());
    // One entry per open paren: does it open an `if`/`while`/`for` header?
    let mut parens: Vec<bool> = Vec::new();
    let mut last_close_was_header = false;

    for spanned in tokens {
        let Spanned { token, line } = spanned;
        let token = match token {
            Token::Reference(path) => {
                let Some((domain, command)) = path.target() else {
                    return Err(ScriptSyntaxError::Syntax {
                        line,
                        message: format!("Invalid reference {}", path.raw()),
                    });
                };
                if let Some(prev) = out.last() {
                    if ends_expression(&prev.token, last_close_was_header) {
                        out.push(Spanned {
                            token: Token::Punct(";"),
                            line,
                        });
                    }
                }
                Token::CallSite(CallSite {
                    domain: domain.map(str::to_string),
                    command: command.to_string(),
                    caller: calling_script.to_string(),
                })
            }
            Token::Punct("(") => {
                let header = out.last().is_some_and(|prev| {
                    ["if", "while", "for"]
                        .iter()
                        .any(|kw| prev.token.is_keyword(kw))
                });
                parens.push(header);
                Token::Punct("(")
            }
            Token::Punct(")") => {
                last_close_was_header = parens.pop().unwrap_or(false);
                Token::Punct(")")
            }
            other => other,
        };
        out.push(Spanned { token, line });
    }

    Ok(out)
}
