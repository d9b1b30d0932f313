//! Execution deadlines

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use tether_runtime::{Error, JsEngine, Value};

#[test]
fn test_runaway_script_times_out() {
    let engine = JsEngine::default();
    let cx = engine.create_context().unwrap();

    let started = Instant::now();
    let err = cx
        .execute_with_timeout("while (true) {}", None, Duration::from_millis(100))
        .unwrap_err();
    assert!(matches!(err, Error::Timeout));
    assert!(started.elapsed() >= Duration::from_millis(100));

    // Later executions are not affected by the spent deadline
    assert_eq!(cx.execute("'after'", None).unwrap(), Value::from("after"));
}

#[test]
fn test_fast_script_finishes_within_deadline() {
    let engine = JsEngine::default();
    let cx = engine.create_context().unwrap();

    let value = cx
        .execute_with_timeout(
            "var total = 0; for (var i = 0; i < 10; i++) { total += i; } total",
            None,
            Duration::from_secs(5),
        )
        .unwrap();
    assert_eq!(value, Value::Integer(45));
}

#[test]
fn test_compiled_script_times_out() {
    let engine = JsEngine::default();
    let cx = engine.create_context().unwrap();
    let script = cx.compile("while (1) {}", Some("spin.js")).unwrap();

    assert!(matches!(
        script.execute_with_timeout(Duration::from_millis(50)),
        Err(Error::Timeout)
    ));
    assert!(matches!(
        script.execute_with_timeout(Duration::from_millis(50)),
        Err(Error::Timeout)
    ));
}

#[test]
fn test_timeout_is_not_catchable() {
    let engine = JsEngine::default();
    let cx = engine.create_context().unwrap();

    let err = cx
        .execute_with_timeout(
            "var reached = false;\n\
             try { while (true) {} } catch (e) { reached = true } finally { reached = true }",
            None,
            Duration::from_millis(50),
        )
        .unwrap_err();
    assert!(matches!(err, Error::Timeout));
    assert_eq!(cx.get_variable("reached").unwrap(), Value::Boolean(false));
}

#[test]
fn test_timeout_inside_host_callback_chain() {
    let engine = JsEngine::default();
    let cx = engine.create_context().unwrap();
    cx.set_function("spin", |cx, _| Ok(cx.execute("while (true) {}", None)?))
        .unwrap();
    let slots = cx.stats().unwrap().keepalive_slots;

    let err = cx
        .execute_with_timeout("spin(); 'unreachable'", None, Duration::from_millis(50))
        .unwrap_err();
    assert!(matches!(err, Error::Timeout));
    // The error record built for the interrupted callback is not kept
    assert_eq!(cx.stats().unwrap().keepalive_slots, slots);
    assert_eq!(cx.execute("1", None).unwrap(), Value::Integer(1));
}

#[test]
fn test_sibling_context_does_not_withdraw_a_deadline() {
    let engine = JsEngine::default();
    let cx = engine.create_context().unwrap();
    let sibling = engine.create_context().unwrap();
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let other = sibling.clone();
    cx.set_function("work", move |_, _| {
        thread::sleep(Duration::from_millis(80));
        other.execute("1", None)?;
        Ok(Value::from(counter.fetch_add(1, Ordering::SeqCst) as i32 + 1))
    })
    .unwrap();

    let err = cx
        .execute_with_timeout(
            "var n = 0; while (work() < 5) { n++ } 'finished'",
            None,
            Duration::from_millis(30),
        )
        .unwrap_err();
    assert!(matches!(err, Error::Timeout));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(sibling.execute("2", None).unwrap(), Value::Integer(2));
}

#[test]
fn test_deadline_survives_sibling_running_on_another_thread() {
    let engine = JsEngine::default();
    let cx = engine.create_context().unwrap();
    let sibling = engine.create_context().unwrap();

    let busy = thread::spawn(move || {
        let started = Instant::now();
        let mut runs = 0;
        while started.elapsed() < Duration::from_millis(300) {
            sibling.execute("1 + 1", None).unwrap();
            runs += 1;
        }
        runs
    });
    let err = cx
        .execute_with_timeout("while (true) {}", None, Duration::from_millis(50))
        .unwrap_err();
    assert!(matches!(err, Error::Timeout));
    assert!(busy.join().unwrap() > 0);
}

#[test]
fn test_terminating_an_idle_engine_has_no_effect() {
    let engine = JsEngine::default();
    let cx = engine.create_context().unwrap();
    engine.terminate_execution();
    assert_eq!(cx.execute("'still here'", None).unwrap(), Value::from("still here"));
}
