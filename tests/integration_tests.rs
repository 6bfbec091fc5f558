//! Integration tests for the complete hackshell pipeline
//!
//! These tests drive input lines through parsing, dispatch, validation,
//! script compilation and the chat domain, across crates.
//!
//! Run with: cargo test --test integration_tests

use std::sync::mpsc;
use std::sync::Arc;
use std::time::Duration;

use hackshell_core::display::present;
use hackshell_core::error::{failure, success};
use hackshell_core::{Command, OutputSink, Registry, ScriptUnit, ShellConfig, Value};
use hackshell_dsl::{parse_argument_object, parse_input, Directive, Invocation, RefPath};
use parking_lot::Mutex;

fn config(chat_delay_ms: u64) -> ShellConfig {
    ShellConfig {
        chat_delay_ms,
        max_call_depth: 16,
        ..ShellConfig::default()
    }
}

fn capture() -> (OutputSink, Arc<Mutex<Vec<String>>>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = {
        let seen = Arc::clone(&seen);
        OutputSink::new(move |m| seen.lock().push(m.to_string()))
    };
    (sink, seen)
}

fn add_script(reg: &mut Registry, name: &str, source: &str) {
    reg.register(
        Some("anon"),
        Command::script(name, ScriptUnit::new_static(source)),
    );
}

// ============================================================================
// Input parsing meets the registry
// ============================================================================

#[test]
fn test_parsed_directives_match_exec_behaviour() {
    assert_eq!(
        parse_input(" /greet = user "),
        Ok(Invocation::Directive(Directive::Define {
            name: "greet".into(),
            input: "user".into()
        }))
    );

    let mut reg = Registry::new(&config(0), OutputSink::discard());
    assert_eq!(
        reg.exec(" /greet = user "),
        Value::from("Macro created: greet = user")
    );
    assert_eq!(
        reg.exec("/greet"),
        Value::from(vec!["user", "Active user: anon"])
    );
}

#[test]
fn test_configured_macros_are_preloaded_in_order() {
    let cfg = ShellConfig::from_json_str(
        r#"{"macros": [["b", "chats.channels"], ["a", "user"]], "chat_delay_ms": 0}"#,
    )
    .unwrap();
    let mut reg = Registry::new(&cfg, OutputSink::discard());
    assert_eq!(
        reg.exec("/"),
        Value::from(vec!["b = chats.channels", "a = user"])
    );
    assert_eq!(
        reg.exec("/b"),
        Value::Array(vec![Value::from("chats.channels"), Value::Array(vec![])])
    );
}

#[test]
fn test_argument_objects_bind_references_through_the_registry() {
    let reg = Registry::new(&config(0), OutputSink::discard());
    let object = parse_argument_object(
        r##"{target: #chats.users, fallback: #nope, list: [#user, "#user"]}"##,
        |path: &RefPath| reg.bind_reference(path, Some("anon.caller")),
    )
    .unwrap();

    let Some(Value::Reference(target)) = object.get("target") else {
        panic!("expected a reference, got {:?}", object.get("target"));
    };
    assert_eq!(target.name, "chats.users");
    assert_eq!(target.caller.as_deref(), Some("anon.caller"));
    assert_eq!(object.get("fallback"), Some(&Value::Null));

    let Some(Value::Array(list)) = object.get("list") else {
        panic!("expected a list");
    };
    assert!(matches!(&list[0], Value::Reference(r) if r.name == "user"));
    assert_eq!(list[1], Value::from("#user"));
}

#[test]
fn test_unterminated_argument_block_names_the_command() {
    let mut reg = Registry::new(&config(0), OutputSink::discard());
    let out = reg.exec(r#"chats.join {channel: "0000""#);
    let text = out.as_str().unwrap_or_default().to_string();
    assert!(text.starts_with("PARSE ERROR chats.join"), "{text}");
}

// ============================================================================
// Scripts
// ============================================================================

#[test]
fn test_script_pipeline_end_to_end() {
    let (sink, seen) = capture();
    let mut reg = Registry::new(&config(0), sink);
    add_script(
        &mut reg,
        "broadcast",
        r#"function (context, args) {
            // join every channel we are told about, then greet each one
            let sent = []
            for (let ch of args.channels) {
                #s.chats.join({ channel: ch })
                let r = #s.chats.send({ channel: ch, msg: args.msg })
                if (r == "Msg Sent") { sent.push(ch) }
            }
            return { ok: sent.length > 0, msg: sent.join(",") }
        }"#,
    );

    let result = reg.exec(r#"broadcast {channels: ["0001", "0002"], msg: "hey"}"#);
    assert_eq!(
        present(result),
        Value::from(vec!["Success", "0001,0002"])
    );

    let seen = seen.lock();
    assert_eq!(seen.len(), 4);
    assert!(seen[3].ends_with(" 0002 anon :::hey:::"), "{}", seen[3]);
}

#[test]
fn test_script_trust_is_reported_through_scripts_get_level() {
    let mut reg = Registry::new(&config(0), OutputSink::discard());
    add_script(
        &mut reg,
        "lister",
        "function (c, a) { return #s.chats.users({ channel: a.channel }) }",
    );
    add_script(&mut reg, "wrapper", "function (c, a) { return #s.anon.lister(a) }");
    add_script(
        &mut reg,
        "joiner",
        "function (c, a) { #s.anon.wrapper(a); return #s.chats.join(a) }",
    );

    assert_eq!(
        reg.exec(r#"scripts.get_level { name: "anon.wrapper" }"#),
        Value::from("MIDSEC")
    );
    assert_eq!(
        reg.exec(r#"scripts.get_level { name: "joiner" }"#),
        Value::from("NULLSEC")
    );
}

#[test]
fn test_script_faults_are_values_not_panics() {
    let mut reg = Registry::new(&config(0), OutputSink::discard());
    add_script(&mut reg, "broken", "function (c, a) { return a.missing.field }");
    add_script(&mut reg, "unwrapped", "return 1");
    let deep = format!(
        "function (c, a) {{ return {}1{} }}",
        "(".repeat(3000),
        ")".repeat(3000)
    );
    add_script(&mut reg, "deep", &deep);

    assert_eq!(
        reg.exec("broken {}"),
        Value::from(
            ":::TRUST COMMUNICATION::: TypeError: Cannot read properties of null (reading 'field')"
        )
    );
    let out = reg.exec("unwrapped");
    let text = out.as_str().unwrap_or_default();
    assert!(text.starts_with("PARSE ERROR anon.unwrapped (line 1)"), "{text}");

    let out = reg.exec("deep");
    let text = out.as_str().unwrap_or_default();
    assert!(text.contains("Maximum nesting depth exceeded"), "{text}");

    // The session keeps working afterwards.
    assert_eq!(reg.exec("user"), Value::from("Active user: anon"));
}

// ============================================================================
// Deferred output
// ============================================================================

#[test]
fn test_chat_delivery_is_deferred() {
    let (tx, rx) = mpsc::channel();
    let tx = Mutex::new(tx);
    let sink = OutputSink::new(move |m| {
        let _ = tx.lock().send(m.to_string());
    });
    let mut reg = Registry::new(&config(50), sink);

    assert_eq!(reg.exec(r#"chats.create {name: "lobby"}"#), success());
    let message = rx.recv_timeout(Duration::from_secs(5)).unwrap();
    assert!(
        message.ends_with(" lobby anon :::user joined channel:::"),
        "{message}"
    );

    assert_eq!(
        reg.exec(r#"chats.join {channel: "lobby"}"#),
        failure("you cannot join this channel again")
    );
}
