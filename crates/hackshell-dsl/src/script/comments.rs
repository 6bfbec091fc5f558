/// Removes `//` line comments and `/* */` block comments.
///
/// String literals (`"`, `'`, `` ` ``) are copied untouched. Newlines inside
/// block comments are kept so line numbers survive.
pub fn strip_comments(source: &str) -> String {
    let mut out = String::with_capacity(source.len());
    let mut chars = source.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' | '\'' | '`' => {
                out.push(c);
                let mut escaped = false;
                for inner in chars.by_ref() {
                    out.push(inner);
                    if escaped {
                        escaped = false;
                    } else if inner == '\\' {
                        escaped = true;
                    } else if inner == c || (inner == '\n' && c != '`') {
                        break;
                    }
                }
            }
            '/' if chars.peek() == Some(&'/') => {
                while let Some(&next) = chars.peek() {
                    if next == '\n' {
                        break;
                    }
                    chars.next();
                }
            }
            '/' if chars.peek() == Some(&'*') => {
                chars.next();
                let mut prev = '\0';
                for inner in chars.by_ref() {
                    if prev == '*' && inner == '/' {
                        break;
                    }
                    if inner == '\n' {
                        out.push('\n');
                    }
                    prev = inner;
                }
                out.push(' ');
            }
            _ => out.push(c),
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_line_and_block_comments() {
        let src = "let a = 1 // one\n/* two\nthree */ let b = 2";
        assert_eq!(strip_comments(src), "let a = 1 \n\n  let b = 2");
    }

    #[test]
    fn keeps_comment_lookalikes_in_strings() {
        let src = r#"let url = "http://x/*y*/"; let s = '//'"#;
        assert_eq!(strip_comments(src), src);
    }

    #[test]
    fn unterminated_block_comment_runs_to_end() {
        assert_eq!(strip_comments("a /* b\nc"), "a \n ");
    }
}
