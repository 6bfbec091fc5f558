//! Lexical pieces shared by every surface syntax.

use nom::{
    bytes::complete::take_while,
    character::complete::{char as pchar, satisfy},
    combinator::recognize,
    multi::separated_list1,
    sequence::{pair, preceded},
    IResult,
};

/// `\w` in the shell's grammar: ASCII letters, digits and underscore.
pub(crate) fn is_word(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// A command/domain identifier: `[A-Za-z]\w*`.
pub(crate) fn identifier(input: &str) -> IResult<&str, &str> {
    recognize(pair(satisfy(|c| c.is_ascii_alphabetic()), take_while(is_word)))(input)
}

/// A reference token: `#identifier(.identifier)*`, returning its segments.
pub(crate) fn reference_token(input: &str) -> IResult<&str, Vec<&str>> {
    preceded(pchar('#'), separated_list1(pchar('.'), identifier))(input)
}

/// Whether `text` is exactly one identifier.
pub fn is_valid_identifier(text: &str) -> bool {
    matches!(identifier(text), Ok(("", _)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identifiers_must_start_with_a_letter() {
        assert!(is_valid_identifier("abc_1"));
        assert!(is_valid_identifier("Z"));
        assert!(!is_valid_identifier("_abc"));
        assert!(!is_valid_identifier("1abc"));
        assert!(!is_valid_identifier("ab-c"));
    }

    #[test]
    fn reference_token_stops_at_trailing_dot() {
        let (rest, segments) = reference_token("#s.chats.send.").unwrap();
        assert_eq!(segments, vec!["s", "chats", "send"]);
        assert_eq!(rest, ".");
    }
}
