//! Script execution through the context API
//!
//! Covers completion values, uncaught errors with their positions and
//! stack traces, syntax errors and the call depth limit.

use tether_engine::{EngineOptions, NativeError, ScriptEngine};
use tether_sdk::{TaggedValue, ValueTag};

fn engine() -> ScriptEngine {
    ScriptEngine::default()
}

#[test]
fn test_completion_value_of_last_expression() {
    let engine = engine();
    let cx = engine.create_context();
    assert_eq!(cx.execute("var x = 1; x + 2", None), TaggedValue::Integer(3));
    assert_eq!(cx.execute("1.5", None), TaggedValue::Number(1.5));
    assert_eq!(cx.execute("'a' + 'b'", None).to_string_lossy().as_deref(), Some("ab"));
    assert_eq!(cx.execute("var y = 4;", None), TaggedValue::Undefined);
    assert_eq!(cx.execute("null", None), TaggedValue::Null);
    assert_eq!(cx.execute("1 < 2", None), TaggedValue::Boolean(true));
}

#[test]
fn test_globals_persist_between_executions() {
    let engine = engine();
    let cx = engine.create_context();
    cx.execute("var counter = 10; function bump() { counter++; return counter; }", None);
    assert_eq!(cx.execute("bump()", None), TaggedValue::Integer(11));
    assert_eq!(cx.get_variable("counter"), TaggedValue::Integer(11));

    cx.set_variable("counter", TaggedValue::Integer(40)).unwrap();
    assert_eq!(cx.execute("bump() + 1", None), TaggedValue::Integer(42));
    assert_eq!(cx.get_variable("missing"), TaggedValue::Undefined);
}

#[test]
fn test_negative_zero_and_large_numbers_stay_numbers() {
    let engine = engine();
    let cx = engine.create_context();
    assert_eq!(cx.execute("2147483647 + 1", None), TaggedValue::Number(2147483648.0));
    assert_eq!(cx.execute("-2147483648", None), TaggedValue::Integer(i32::MIN));
    match cx.execute("-0", None) {
        TaggedValue::Number(n) => assert!(n == 0.0 && n.is_sign_negative()),
        other => panic!("expected -0, got {:?}", other),
    }
}

#[test]
fn test_dates_cross_as_timestamps() {
    let engine = engine();
    let cx = engine.create_context();
    assert_eq!(cx.execute("new Date(1500)", None), TaggedValue::Date(1500.0));
    cx.set_variable("when", TaggedValue::Date(86_400_000.0)).unwrap();
    assert_eq!(cx.execute("when.getTime()", None), TaggedValue::Integer(86_400_000));
}

#[test]
fn test_uncaught_error_reports_position_and_stack() {
    let engine = engine();
    let cx = engine.create_context();
    let source = "function alpha() {\n    throw new TypeError(\"Uh oh\");\n}\nfunction beta() {\n    alpha();\n}\nfunction gamma() {\n    beta();\n}\n\ngamma();\n";
    let info = cx
        .execute(source, None)
        .into_engine_error()
        .expect("engine error");

    assert_eq!(info.name.as_deref(), Some("TypeError"));
    assert_eq!(info.message.as_deref(), Some("Uh oh"));
    assert_eq!(info.text, "TypeError: Uh oh");
    assert_eq!(info.resource, "<Unnamed Script>");
    assert_eq!(info.line, 2);
    assert_eq!(info.column, 4);
    assert_eq!(
        info.stack.as_deref(),
        Some(
            "TypeError: Uh oh\n    at alpha (<Unnamed Script>:2:11)\n    at beta (<Unnamed Script>:5:5)\n    at gamma (<Unnamed Script>:8:5)\n    at <Unnamed Script>:11:1"
        )
    );
    assert_eq!(info.frames.len(), 4);
    assert_eq!(info.frames[0].function.as_deref(), Some("alpha"));
    assert_eq!(info.frames[3].function, None);
    assert_eq!(info.error.tag(), ValueTag::Object);
}

#[test]
fn test_thrown_primitive_is_reported_as_text() {
    let engine = engine();
    let cx = engine.create_context();
    let info = cx
        .execute("\nthrow 'plain';", Some("prim.js"))
        .into_engine_error()
        .expect("engine error");
    assert_eq!(info.name, None);
    assert_eq!(info.text, "plain");
    assert_eq!(info.resource, "prim.js");
    assert_eq!(info.line, 2);
    assert_eq!(info.column, 0);
    assert_eq!(info.error.to_string_lossy().as_deref(), Some("plain"));
}

#[test]
fn test_caught_errors_do_not_escape() {
    let engine = engine();
    let cx = engine.create_context();
    let result = cx.execute(
        "var seen; try { null.x; } catch (e) { seen = e.name; } finally { seen += '!'; } seen",
        None,
    );
    assert_eq!(result.to_string_lossy().as_deref(), Some("TypeError!"));
}

#[test]
fn test_syntax_error() {
    let engine = engine();
    let cx = engine.create_context();
    let info = cx
        .execute("var = ;", Some("bad.js"))
        .into_engine_error()
        .expect("syntax error");
    assert!(info.is_syntax_error());
    assert_eq!(info.resource, "bad.js");
    assert_eq!(info.line, 1);
    assert!(info.text.starts_with("SyntaxError: "));

    let err = cx.compile("function (", None).unwrap_err();
    assert!(err.is_syntax_error());
    assert_eq!(err.resource, "<Unnamed Script>");
}

#[test]
fn test_compiled_scripts_run_repeatedly() {
    let engine = engine();
    let cx = engine.create_context();
    cx.execute("var runs = 0;", None);
    let script = cx.compile("runs += 1; runs", Some("counter.js")).unwrap();
    assert_eq!(cx.execute_script(script).unwrap(), TaggedValue::Integer(1));
    assert_eq!(cx.execute_script(script).unwrap(), TaggedValue::Integer(2));
    assert_eq!(cx.stats().scripts, 1);

    assert!(cx.dispose_script(script));
    assert!(!cx.dispose_script(script));
    assert_eq!(cx.execute_script(script), Err(NativeError::UnknownScript(script)));
}

#[test]
fn test_call_depth_limit() {
    let engine = ScriptEngine::new(EngineOptions::default().with_max_call_depth(16));
    let cx = engine.create_context();
    let info = cx
        .execute("function f() { return f(); } f();", None)
        .into_engine_error()
        .expect("range error");
    assert_eq!(info.name.as_deref(), Some("RangeError"));
    assert_eq!(info.message.as_deref(), Some("Maximum call stack size exceeded"));

    // The context stays usable afterwards
    assert_eq!(cx.execute("1 + 1", None), TaggedValue::Integer(2));
}

#[test]
fn test_contexts_are_isolated() {
    let engine = engine();
    let a = engine.create_context();
    let b = engine.create_context();
    assert_ne!(a.id(), b.id());
    a.execute("var shared = 1;", None);
    assert_eq!(b.execute("typeof shared", None).to_string_lossy().as_deref(), Some("undefined"));
}
