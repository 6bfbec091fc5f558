//! The top-level display convention applied to results before they are shown.

use hackshell_dsl::Value;

pub const SUCCESS: &str = "Success";
pub const FAILURE: &str = "Failure";

/// Collapses result records for display: a bare `{ok}` becomes
/// `Success`/`Failure` and `{ok, msg}` becomes `[Success|Failure, msg]`.
/// Every other value passes through.
pub fn present(value: Value) -> Value {
    let Value::Object(map) = &value else {
        return value;
    };
    let Some(ok) = map.get("ok") else {
        return value;
    };
    let verdict = Value::from(if ok.is_truthy() { SUCCESS } else { FAILURE });
    match (map.len(), map.get("msg")) {
        (1, None) => verdict,
        (2, Some(msg)) => Value::Array(vec![verdict, msg.clone()]),
        _ => value,
    }
}

/// Lines to print for a value: nothing for `null`, one line per element for
/// sequences (nested sequences included), otherwise the value's display form.
pub fn render_lines(value: &Value) -> Vec<String> {
    let mut lines = Vec::new();
    match value {
        Value::Null => {}
        Value::Array(items) => push_items(items, &mut lines),
        other => lines.push(other.to_string()),
    }
    lines
}

fn push_items(items: &[Value], lines: &mut Vec<String>) {
    for item in items {
        match item {
            Value::Array(inner) => push_items(inner, lines),
            other => lines.push(other.to_string()),
        }
    }
}

/// Whether a rendered line reports a failure or fault.
pub fn is_failure_line(line: &str) -> bool {
    line == FAILURE || line.starts_with(":::TRUST COMMUNICATION:::") || line.starts_with("PARSE ERROR")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_collapse() {
        assert_eq!(
            present(Value::object([("ok", Value::Bool(true))])),
            Value::from("Success")
        );
        assert_eq!(
            present(Value::object([
                ("ok", Value::Bool(false)),
                ("msg", Value::from("nope"))
            ])),
            Value::from(vec!["Failure", "nope"])
        );
        let other = Value::object([("ok", Value::Bool(true)), ("args", Value::Null)]);
        assert_eq!(present(other.clone()), other);
    }

    #[test]
    fn sequences_render_one_line_each() {
        let lines = render_lines(&Value::from(vec!["a", "b"]));
        assert_eq!(lines, vec!["a", "b"]);
        assert!(render_lines(&Value::Null).is_empty());
        assert!(is_failure_line("Failure"));
        assert!(!is_failure_line("Success"));
    }

    #[test]
    fn nested_sequences_render_flat() {
        let value = Value::Array(vec![
            Value::from("chats.create {name: \"b\"}"),
            Value::from(vec!["Failure", "channel b is taken"]),
        ]);
        assert_eq!(
            render_lines(&value),
            vec!["chats.create {name: \"b\"}", "Failure", "channel b is taken"]
        );
    }
}
