use hackshell_dsl::script::strip_comments;
use hackshell_dsl::{normalize, parse_argument_object, RefPath, Value};
use proptest::prelude::*;

fn ident() -> impl Strategy<Value = String> {
    proptest::string::string_regex("[A-Za-z][A-Za-z0-9_]{0,10}").unwrap()
}

/// String-literal contents full of comment, brace and reference lookalikes.
fn tricky_text() -> impl Strategy<Value = String> {
    proptest::string::string_regex("[a-z0-9 :#{}/*.,_]{0,24}").unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn comment_stripping_preserves_string_literals(
        text in tricky_text(),
        comment in tricky_text(),
        single in any::<bool>(),
    ) {
        let quote = if single { '\'' } else { '"' };
        let literal = format!("{quote}{text}{quote}");
        let comment = comment.replace('*', "");
        let source = format!("let s = {literal}; // {comment}\n/* {comment} */ return s");

        let stripped = strip_comments(&source);
        prop_assert!(stripped.contains(&literal), "lost literal in {stripped:?}");
        prop_assert!(stripped.ends_with("return s"));
    }

    #[test]
    fn normalization_preserves_string_literals(key in ident(), text in tricky_text()) {
        let raw = format!("{{{key}: \"{text}\"}}");
        let normalized = normalize(&raw);
        let expected = format!("\"{text}\"");
        prop_assert!(normalized.text.contains(&expected));

        let obj = parse_argument_object(&raw, |_| Value::Null).unwrap();
        prop_assert_eq!(obj.get(&key), Some(&Value::String(text)));
    }

    #[test]
    fn bare_keys_parse_like_quoted_keys(
        fields in proptest::collection::btree_map(ident(), -1000i64..1000, 0..6),
    ) {
        let bare = fields
            .iter()
            .map(|(k, v)| format!("{k}: {v}"))
            .collect::<Vec<_>>()
            .join(", ");
        let quoted = fields
            .iter()
            .map(|(k, v)| format!("\"{k}\": {v}"))
            .collect::<Vec<_>>()
            .join(", ");

        let from_bare = parse_argument_object(&format!("{{{bare}}}"), |_| Value::Null).unwrap();
        let from_quoted = parse_argument_object(&format!("{{{quoted}}}"), |_| Value::Null).unwrap();
        prop_assert_eq!(&from_bare, &from_quoted);
        prop_assert_eq!(from_bare.len(), fields.len());
    }

    #[test]
    fn every_reference_is_bound(domains in proptest::collection::vec((ident(), ident()), 1..5)) {
        let items = domains
            .iter()
            .map(|(d, c)| format!("#{d}.{c}"))
            .collect::<Vec<_>>()
            .join(", ");
        let obj = parse_argument_object(&format!("{{list: [{items}]}}"), |path: &RefPath| {
            Value::from(path.raw())
        })
        .unwrap();

        let expected: Vec<Value> = domains
            .iter()
            .map(|(d, c)| Value::from(format!("#{d}.{c}")))
            .collect();
        prop_assert_eq!(obj.get("list"), Some(&Value::Array(expected)));
    }
}
