//! Script errors, host errors and the error filter

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use tether_runtime::{
    ContextConfig, Error, FilterDecision, HostErrorInfo, HostException, JsContext, JsEngine, Value,
};

#[derive(Debug, thiserror::Error)]
#[error("disk full")]
struct DiskFull;

fn failing(cx: &JsContext, exception: &HostException) {
    let exception = exception.clone();
    cx.set_function("fail", move |_, _| Err(exception.clone())).unwrap();
}

#[test]
fn test_script_errors_carry_location() {
    let engine = JsEngine::default();
    let cx = engine.create_context().unwrap();

    let err = cx
        .execute("var x = 1;\nthrow new TypeError('bad thing');", Some("check.js"))
        .unwrap_err();
    let script = match &err {
        Error::Script(script) => script,
        other => panic!("expected a script error, got {:?}", other),
    };
    assert_eq!(script.name.as_deref(), Some("TypeError"));
    assert_eq!(script.message.as_deref(), Some("bad thing"));
    assert_eq!(script.text, "TypeError: bad thing");
    assert_eq!(script.resource, "check.js");
    assert_eq!(script.line, 2);
    assert!(script.value.as_object().is_some());
    assert!(err.host_exception().is_none());
}

#[test]
fn test_thrown_primitives() {
    let engine = JsEngine::default();
    let cx = engine.create_context().unwrap();

    let err = cx.execute("throw 42", None).unwrap_err();
    let script = err.script_error().unwrap();
    assert_eq!(script.value, Value::Integer(42));
    assert_eq!(script.text, "42");
    assert!(script.name.is_none());
}

#[test]
fn test_syntax_errors() {
    let engine = JsEngine::default();
    let cx = engine.create_context().unwrap();

    let err = cx.execute("var = ;", Some("broken.js")).unwrap_err();
    let script = match &err {
        Error::Syntax(script) => script,
        other => panic!("expected a syntax error, got {:?}", other),
    };
    assert_eq!(script.name.as_deref(), Some("SyntaxError"));
    assert_eq!(script.resource, "broken.js");
    assert!(script.value.is_undefined());

    assert!(matches!(cx.compile("function (", None), Err(Error::Syntax(_))));
}

#[test]
fn test_host_errors_are_catchable() {
    let engine = JsEngine::default();
    let cx = engine.create_context().unwrap();
    failing(&cx, &HostException::new(DiskFull));

    assert_eq!(
        cx.execute("try { fail(); 'missed' } catch (e) { String(e) }", None)
            .unwrap(),
        Value::from("Error: disk full")
    );
    assert_eq!(
        cx.execute("try { fail() } catch (e) { e.name + ': ' + e.message }", None)
            .unwrap(),
        Value::from("Error: disk full")
    );
}

#[test]
fn test_uncaught_host_errors_keep_identity() {
    let engine = JsEngine::default();
    let cx = engine.create_context().unwrap();
    let exception = HostException::new(DiskFull);
    failing(&cx, &exception);

    let err = cx.execute("fail()", None).unwrap_err();
    assert!(matches!(err, Error::Script(_)));
    let carried = err.host_exception().unwrap();
    assert!(carried.ptr_eq(&exception));
    assert!(carried.downcast_ref::<DiskFull>().is_some());
    assert_eq!(err.script_error().unwrap().text, "Error: disk full");
}

#[test]
fn test_custom_error_properties() {
    let engine = JsEngine::default();
    let cx = engine.create_context().unwrap();
    cx.set_function("validate", |_, _| {
        Err(HostErrorInfo::new("bad input")
            .with_name("ValidationError")
            .with_property("field", "email")
            .into())
    })
    .unwrap();

    assert_eq!(
        cx.execute(
            "try { validate() } catch (e) { e.name + '|' + e.message + '|' + e.field }",
            None
        )
        .unwrap(),
        Value::from("ValidationError|bad input|email")
    );
    assert_eq!(
        cx.execute("try { validate() } catch (e) { Object.keys(e).join(',') }", None)
            .unwrap(),
        Value::from("name,message,field")
    );

    let err = cx.execute("validate()", None).unwrap_err();
    let info = err.script_error().unwrap().host_error().unwrap();
    assert_eq!(info.name, "ValidationError");
    assert_eq!(info.property("field"), Some(&Value::from("email")));
}

#[test]
fn test_suppressed_errors_bypass_script_handlers() {
    let engine = JsEngine::default();
    let decisions = Arc::new(AtomicUsize::new(0));
    let counted = decisions.clone();
    let cx = engine
        .create_context_with(ContextConfig::new().with_error_filter(move |info| {
            counted.fetch_add(1, Ordering::SeqCst);
            assert_eq!(info.message, "disk full");
            FilterDecision::Suppress
        }))
        .unwrap();
    let exception = HostException::new(DiskFull);
    failing(&cx, &exception);

    let err = cx
        .execute(
            "var caught = 0;\n\
             for (var i = 0; i < 3; i++) { try { fail() } catch (e) { caught++ } }\n\
             caught",
            None,
        )
        .unwrap_err();
    match &err {
        Error::Host(raised) => assert!(raised.ptr_eq(&exception)),
        other => panic!("expected the host exception, got {:?}", other),
    }
    assert_eq!(decisions.load(Ordering::SeqCst), 1);
    assert_eq!(cx.get_variable("caught").unwrap(), Value::Integer(0));

    // The next execution starts clean
    assert_eq!(cx.execute("caught + 1", None).unwrap(), Value::Integer(1));
}

#[test]
fn test_filter_can_choose_per_error() {
    let engine = JsEngine::default();
    let cx = engine
        .create_context_with(
            ContextConfig::new()
                .with_error_filter(|info| FilterDecision::from(info.name != "Fatal")),
        )
        .unwrap();
    cx.set_function("soft", |_, _| Err(HostErrorInfo::new("soft").into()))
        .unwrap();
    cx.set_function("fatal", |_, _| {
        Err(HostErrorInfo::new("hard").with_name("Fatal").into())
    })
    .unwrap();

    assert_eq!(
        cx.execute("try { soft() } catch (e) { e.message }", None).unwrap(),
        Value::from("soft")
    );
    let err = cx.execute("try { fatal() } catch (e) { e.message }", None).unwrap_err();
    let exception = err.host_exception().unwrap();
    assert_eq!(
        exception.downcast_ref::<HostErrorInfo>().map(|info| info.name.as_str()),
        Some("Fatal")
    );
}

#[test]
fn test_panicking_filter_suppresses() {
    let engine = JsEngine::default();
    let cx = engine
        .create_context_with(
            ContextConfig::new().with_error_filter(|_| -> FilterDecision { panic!("filter broke") }),
        )
        .unwrap();
    failing(&cx, &HostException::msg("first"));

    let err = cx.execute("try { fail() } catch (e) { 'caught' }", None).unwrap_err();
    assert!(matches!(err, Error::Host(_)));
    assert_eq!(cx.execute("'alive'", None).unwrap(), Value::from("alive"));
}

#[test]
fn test_explicit_termination() {
    let engine = JsEngine::default();
    let cx = engine.create_context().unwrap();

    let stopper = engine.clone();
    let handle = thread::spawn(move || {
        thread::sleep(Duration::from_millis(50));
        stopper.terminate_execution();
    });
    let err = cx.execute("while (true) {}", None).unwrap_err();
    handle.join().unwrap();
    assert!(matches!(err, Error::Terminated));

    assert_eq!(cx.execute("3", None).unwrap(), Value::Integer(3));
}

#[test]
fn test_errors_raised_in_nested_calls_unwind_to_the_host() {
    let engine = JsEngine::default();
    let cx = engine.create_context().unwrap();
    cx.set_function("run", |cx, args| {
        let source = args.first().and_then(Value::as_str).unwrap_or("");
        Ok(cx.execute(source, None)?)
    })
    .unwrap();

    // A script error inside the nested run surfaces as a host error in the
    // outer script and can be caught there
    assert_eq!(
        cx.execute("try { run('throw 1') } catch (e) { 'outer' }", None)
            .unwrap(),
        Value::from("outer")
    );
}
