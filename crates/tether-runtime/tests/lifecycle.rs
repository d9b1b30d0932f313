//! Disposal of engines, contexts, scripts and handles

use std::sync::Arc;

use tether_runtime::{Error, HostObject, JsEngine, Value};

struct Resource;

#[test]
fn test_engine_dispose_cascades_to_contexts() {
    let engine = JsEngine::default();
    let first = engine.create_context().unwrap();
    let second = engine.create_context().unwrap();
    let object = first.create_object().unwrap();

    engine.dispose();
    engine.dispose();

    assert!(engine.is_disposed());
    assert!(first.is_disposed() && second.is_disposed());
    assert!(object.is_disposed());
    assert!(matches!(
        first.execute("1", None),
        Err(Error::Disposed { resource: "engine" })
    ));
    assert!(matches!(
        engine.create_context(),
        Err(Error::Disposed { resource: "engine" })
    ));
    assert!(matches!(object.get("x"), Err(Error::Disposed { .. })));
}

#[test]
fn test_context_dispose_releases_host_objects() {
    let engine = JsEngine::default();
    let cx = engine.create_context().unwrap();
    let resource = Arc::new(Resource);
    cx.set_variable("r", HostObject::from_arc(resource.clone())).unwrap();
    assert_eq!(Arc::strong_count(&resource), 2);

    cx.dispose();
    cx.dispose();
    assert_eq!(Arc::strong_count(&resource), 1);
    assert!(matches!(
        cx.execute("r", None),
        Err(Error::Disposed { resource: "context" })
    ));
    assert!(matches!(cx.stats(), Err(Error::Disposed { .. })));

    // Other contexts of the engine are unaffected
    let other = engine.create_context().unwrap();
    assert_eq!(other.execute("'fine'", None).unwrap(), Value::from("fine"));
}

#[test]
fn test_script_dispose() {
    let engine = JsEngine::default();
    let cx = engine.create_context().unwrap();
    let script = cx.compile("6 * 7", Some("answer.js")).unwrap();
    assert_eq!(script.resource(), "answer.js");
    assert_eq!(cx.stats().unwrap().scripts, 1);
    assert_eq!(script.execute().unwrap(), Value::Integer(42));
    assert_eq!(script.execute().unwrap(), Value::Integer(42));

    script.dispose();
    script.dispose();
    assert!(script.is_disposed());
    assert_eq!(cx.stats().unwrap().scripts, 0);
    assert!(matches!(
        script.execute(),
        Err(Error::Disposed { resource: "script" })
    ));

    let dropped = cx.compile("1", None).unwrap();
    assert_eq!(cx.stats().unwrap().scripts, 1);
    drop(dropped);
    assert_eq!(cx.stats().unwrap().scripts, 0);
}

#[test]
fn test_scripts_of_a_disposed_context() {
    let engine = JsEngine::default();
    let cx = engine.create_context().unwrap();
    let script = cx.compile("1", None).unwrap();

    cx.dispose();
    assert!(matches!(
        script.execute(),
        Err(Error::Disposed { resource: "context" })
    ));
    script.dispose();
}

#[test]
fn test_dispose_from_inside_a_handler() {
    let engine = JsEngine::default();
    let cx = engine.create_context().unwrap();
    cx.set_function("quit", |cx, _| {
        cx.dispose();
        Ok(Value::Undefined)
    })
    .unwrap();

    assert!(matches!(
        cx.execute("quit(); 1", None),
        Err(Error::Disposed { resource: "context" })
    ));
    assert!(cx.is_disposed());
    assert!(matches!(
        cx.execute("1", None),
        Err(Error::Disposed { resource: "context" })
    ));
}

#[test]
fn test_contexts_outlive_dropped_engine_handles() {
    let cx = {
        let engine = JsEngine::default();
        engine.create_context().unwrap()
    };
    assert_eq!(cx.execute("1 + 2", None).unwrap(), Value::Integer(3));
    assert!(!cx.engine().is_disposed());
}

#[test]
fn test_context_identity() {
    let engine = JsEngine::default();
    let cx = engine.create_context().unwrap();
    let other = engine.create_context().unwrap();
    let clone = cx.clone();

    assert!(cx.ptr_eq(&clone));
    assert_eq!(cx, clone);
    assert_ne!(cx, other);
    assert_ne!(cx.id(), other.id());

    let object = cx.create_object().unwrap();
    assert!(object.context().ptr_eq(&cx));
}
