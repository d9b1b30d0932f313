//! Host proxy dispatch, pinned handles and collection

use std::sync::{Arc, Mutex};

use tether_engine::{NativeError, ScriptEngine};
use tether_sdk::{HostCallbacks, TaggedValue, TemplateId};

fn host(slot: i32, template: TemplateId) -> TaggedValue {
    TaggedValue::HostValue { slot, template }
}

fn noop() -> HostCallbacks {
    HostCallbacks::new(|_, _| {})
}

#[test]
fn test_invoke_sums_arguments() {
    let engine = ScriptEngine::default();
    let cx = engine.create_context();
    let sum = cx.add_template(noop().with_invoke(|_, _, args| {
        TaggedValue::Integer(args.iter().filter_map(TaggedValue::as_i32).sum())
    }));
    cx.set_variable("f", host(1, sum)).unwrap();

    assert_eq!(cx.execute("f(1, 2, 3)", None), TaggedValue::Integer(6));
    assert_eq!(cx.execute("f()", None), TaggedValue::Integer(0));
    assert_eq!(cx.execute("typeof f", None).to_string_lossy().as_deref(), Some("function"));
}

#[test]
fn test_proxy_without_invoke_is_not_callable() {
    let engine = ScriptEngine::default();
    let cx = engine.create_context();
    let plain = cx.add_template(noop());
    cx.set_variable("o", host(1, plain)).unwrap();

    assert_eq!(cx.execute("typeof o", None).to_string_lossy().as_deref(), Some("object"));
    let info = cx.execute("o()", None).into_engine_error().unwrap();
    assert_eq!(info.name.as_deref(), Some("TypeError"));
}

#[test]
fn test_unhandled_properties_fall_through_to_storage() {
    let engine = ScriptEngine::default();
    let cx = engine.create_context();
    let template = cx.add_template(noop().with_get_property(|_, _, name| match name {
        "answer" => TaggedValue::Integer(42),
        _ => TaggedValue::Empty,
    }));
    cx.set_variable("h", host(3, template)).unwrap();

    assert_eq!(cx.execute("h.answer", None), TaggedValue::Integer(42));
    assert_eq!(cx.execute("h.extra", None), TaggedValue::Undefined);
    assert_eq!(cx.execute("h.extra = 'kept'; h.extra", None).to_string_lossy().as_deref(), Some("kept"));
    assert_eq!(cx.execute("delete h.extra; h.extra", None), TaggedValue::Undefined);
}

#[test]
fn test_set_and_delete_callbacks_receive_values() {
    let engine = ScriptEngine::default();
    let cx = engine.create_context();
    let writes = Arc::new(Mutex::new(Vec::new()));
    let seen = writes.clone();
    let template = cx.add_template(
        noop()
            .with_set_property(move |_, slot, name, value| {
                seen.lock().unwrap().push((slot, name.to_string(), value.as_i32()));
                TaggedValue::Undefined
            })
            .with_delete_property(|_, _, name| TaggedValue::Boolean(name == "gone")),
    );
    cx.set_variable("h", host(9, template)).unwrap();

    cx.execute("h.size = 12;", None);
    assert_eq!(*writes.lock().unwrap(), vec![(9, "size".to_string(), Some(12))]);
    // Handled writes never reach the property bag
    assert_eq!(cx.execute("h.size", None), TaggedValue::Undefined);

    assert_eq!(cx.execute("delete h.gone", None), TaggedValue::Boolean(true));
    assert_eq!(cx.execute("delete h.other", None), TaggedValue::Boolean(false));
}

#[test]
fn test_enumeration_lists_storage_then_callback_names() {
    let engine = ScriptEngine::default();
    let cx = engine.create_context();
    let template = cx.add_template(
        noop().with_enumerate_properties(|_, _| TaggedValue::from_names(["width", "height"])),
    );
    cx.set_variable("h", host(1, template)).unwrap();

    let keys = cx.execute(
        "h.local = 1; h.width = 2; var keys = []; for (var k in h) { keys.push(k); } keys.join(',')",
        None,
    );
    assert_eq!(keys.to_string_lossy().as_deref(), Some("local,width,height"));
}

#[test]
fn test_value_of_and_to_string_callbacks() {
    let engine = ScriptEngine::default();
    let cx = engine.create_context();
    let template = cx.add_template(
        noop()
            .with_value_of(|_, slot| TaggedValue::Integer(slot * 10))
            .with_to_string(|_, slot| TaggedValue::string(&format!("host#{}", slot))),
    );
    cx.set_variable("h", host(4, template)).unwrap();

    assert_eq!(cx.execute("h + 1", None), TaggedValue::Integer(41));
    assert_eq!(cx.execute("String(h)", None).to_string_lossy().as_deref(), Some("host#4"));
    // Installed methods are not enumerable
    assert_eq!(cx.execute("var n = 0; for (var k in h) { n++; } n", None), TaggedValue::Integer(0));
}

#[test]
fn test_same_slot_yields_same_proxy() {
    let engine = ScriptEngine::default();
    let cx = engine.create_context();
    let template = cx.add_template(noop());
    cx.set_variable("a", host(5, template)).unwrap();
    cx.set_variable("b", host(5, template)).unwrap();
    assert_eq!(cx.execute("a === b", None), TaggedValue::Boolean(true));
    assert_eq!(cx.stats().host_proxies, 1);
    assert_eq!(cx.get_variable("a"), host(5, template));
}

#[test]
fn test_slot_shared_by_templates_is_removed_after_its_last_proxy() {
    let engine = ScriptEngine::default();
    let cx = engine.create_context();
    let removed = Arc::new(Mutex::new(Vec::new()));
    let sink = removed.clone();
    let plain = cx.add_template(HostCallbacks::new(move |_, slot| {
        sink.lock().unwrap().push(slot);
    }));
    let sink = removed.clone();
    let named = cx.add_template(
        HostCallbacks::new(move |_, slot| sink.lock().unwrap().push(slot))
            .with_get_property(|_, _, _| TaggedValue::string("named")),
    );

    cx.set_variable("a", host(3, plain)).unwrap();
    cx.set_variable("b", host(3, named)).unwrap();
    assert_eq!(cx.execute("b.anything", None).to_string_lossy().as_deref(), Some("named"));
    assert_eq!(cx.stats().host_proxies, 2);

    cx.set_variable("a", TaggedValue::Null).unwrap();
    cx.collect_garbage();
    assert!(removed.lock().unwrap().is_empty());
    assert_eq!(cx.stats().host_proxies, 1);
    assert_eq!(cx.execute("b.anything", None).to_string_lossy().as_deref(), Some("named"));

    cx.set_variable("b", TaggedValue::Null).unwrap();
    cx.collect_garbage();
    assert_eq!(*removed.lock().unwrap(), vec![3]);
    assert_eq!(cx.stats().host_proxies, 0);
}

#[test]
fn test_proxies_swept_together_release_their_slot_once() {
    let engine = ScriptEngine::default();
    let cx = engine.create_context();
    let removed = Arc::new(Mutex::new(Vec::new()));
    let sink = removed.clone();
    let first = cx.add_template(HostCallbacks::new(move |_, slot| {
        sink.lock().unwrap().push(slot);
    }));
    let sink = removed.clone();
    let second = cx.add_template(HostCallbacks::new(move |_, slot| {
        sink.lock().unwrap().push(slot);
    }));

    cx.set_variable("a", host(8, first)).unwrap();
    cx.set_variable("b", host(8, second)).unwrap();
    cx.execute("a = null; b = null", None);
    cx.collect_garbage();
    assert_eq!(*removed.lock().unwrap(), vec![8]);
}

#[test]
fn test_host_error_results_are_thrown() {
    let engine = ScriptEngine::default();
    let cx = engine.create_context();
    let errors = cx.add_template(noop());
    let template = cx.add_template(noop().with_get_property(move |_, _, name| match name {
        "boom" => TaggedValue::HostError { slot: 77, template: errors },
        _ => TaggedValue::Empty,
    }));
    cx.set_variable("h", host(1, template)).unwrap();

    let info = cx.execute("h.boom", None).into_engine_error().unwrap();
    assert_eq!(info.error, host(77, errors));

    let caught = cx.execute("var c; try { h.boom; } catch (e) { c = e; } c", None);
    assert_eq!(caught, host(77, errors));
}

#[test]
fn test_unknown_template_is_rejected() {
    let engine = ScriptEngine::default();
    let cx = engine.create_context();
    assert_eq!(
        cx.set_variable("h", host(1, TemplateId(12))),
        Err(NativeError::UnknownTemplate(TemplateId(12)))
    );
}

#[test]
fn test_termination_requested_from_callback_skips_catch_and_finally() {
    let engine = ScriptEngine::default();
    let cx = engine.create_context();
    let handle = engine.terminate_handle();
    let stop = cx.add_template(noop().with_invoke(move |_, _, _| {
        handle.terminate();
        TaggedValue::Undefined
    }));
    cx.set_variable("stop", host(1, stop)).unwrap();

    let result = cx.execute(
        "var n = 0; while (true) { try { stop(); } catch (e) { n++; } finally { n++; } }",
        None,
    );
    assert!(result.is_termination());
    assert_eq!(cx.get_variable("n"), TaggedValue::Integer(0));
    assert!(!engine.terminate_handle().is_requested());
    assert_eq!(cx.execute("1 + 1", None), TaggedValue::Integer(2));
}

#[test]
fn test_termination_from_another_thread() {
    let engine = ScriptEngine::default();
    let cx = engine.create_context();
    let handle = engine.terminate_handle();
    let stopper = std::thread::spawn(move || {
        std::thread::sleep(std::time::Duration::from_millis(50));
        handle.terminate();
    });
    let result = cx.execute("for (;;) {}", None);
    stopper.join().unwrap();
    assert!(result.is_termination());
}

#[test]
fn test_termination_requests_belong_to_one_context() {
    let engine = ScriptEngine::default();
    let first = engine.create_context();
    let second = engine.create_context();

    first.terminate_handle().terminate();
    // Another context finishing does not withdraw the request
    assert_eq!(second.execute("1 + 1", None), TaggedValue::Integer(2));
    assert!(first.terminate_handle().is_requested());
    assert!(!second.terminate_handle().is_requested());

    assert!(first.execute("1", None).is_termination());
    assert!(!first.terminate_handle().is_requested());
    assert_eq!(first.execute("2", None), TaggedValue::Integer(2));
}

#[test]
fn test_engine_termination_skips_idle_contexts() {
    let engine = ScriptEngine::default();
    let cx = engine.create_context();
    engine.terminate_execution();
    assert!(!engine.terminate_handle().is_requested());
    assert_eq!(cx.execute("3", None), TaggedValue::Integer(3));
}

#[test]
fn test_collected_proxies_call_remove() {
    let engine = ScriptEngine::default();
    let cx = engine.create_context();
    let removed = Arc::new(Mutex::new(Vec::new()));
    let sink = removed.clone();
    let template = cx.add_template(HostCallbacks::new(move |_, slot| {
        sink.lock().unwrap().push(slot);
    }));
    cx.set_variable("keep", host(1, template)).unwrap();
    cx.set_variable("drop", host(2, template)).unwrap();
    cx.set_variable("drop", TaggedValue::Null).unwrap();

    cx.collect_garbage();
    assert_eq!(*removed.lock().unwrap(), vec![2]);
    assert_eq!(cx.stats().host_proxies, 1);

    // Re-exposing a collected slot creates a fresh proxy
    cx.set_variable("drop", host(2, template)).unwrap();
    assert_eq!(cx.stats().host_proxies, 2);
}

#[test]
fn test_results_dropped_by_termination_release_their_slots() {
    let engine = ScriptEngine::default();
    let cx = engine.create_context();
    let removed = Arc::new(Mutex::new(Vec::new()));
    let sink = removed.clone();
    let errors = cx.add_template(HostCallbacks::new(move |_, slot| {
        sink.lock().unwrap().push(slot);
    }));
    let handle = cx.terminate_handle();
    let stop = cx.add_template(noop().with_invoke(move |_, _, args| {
        handle.terminate();
        match args.first().and_then(TaggedValue::as_i32) {
            Some(slot) => TaggedValue::HostError { slot, template: errors },
            None => TaggedValue::Empty,
        }
    }));
    cx.set_variable("stop", host(1, stop)).unwrap();
    cx.set_variable("held", host(4, errors)).unwrap();

    assert!(cx.execute("stop(7)", None).is_termination());
    assert_eq!(*removed.lock().unwrap(), vec![7]);

    // A slot that still has a proxy is left for collection
    assert!(cx.execute("stop(4)", None).is_termination());
    assert_eq!(*removed.lock().unwrap(), vec![7]);
    assert_eq!(cx.execute("typeof held", None).to_string_lossy().as_deref(), Some("object"));
}

#[test]
fn test_pinned_handles_survive_collection_until_released() {
    let engine = ScriptEngine::default();
    let cx = engine.create_context();
    let object = cx.new_object();
    let handle = object.object_handle().unwrap();
    cx.set_property(handle, "x", TaggedValue::Integer(3)).unwrap();

    cx.collect_garbage();
    assert_eq!(cx.get_property(handle, "x").unwrap(), TaggedValue::Integer(3));
    assert_eq!(cx.stats().pinned_handles, 1);

    assert!(cx.release_object(handle));
    assert!(!cx.release_object(handle));
    cx.collect_garbage();
    assert_eq!(cx.get_property(handle, "x"), Err(NativeError::InvalidHandle(handle)));
}

#[test]
fn test_object_and_array_access_by_handle() {
    let engine = ScriptEngine::default();
    let cx = engine.create_context();
    let array = cx
        .new_array(vec![TaggedValue::Integer(1), TaggedValue::string("two")])
        .unwrap();
    let handle = array.object_handle().unwrap();
    assert_eq!(cx.array_length(handle).unwrap(), 2);
    cx.set_index(handle, 2, TaggedValue::Boolean(true)).unwrap();
    assert_eq!(cx.get_index(handle, 2).unwrap(), TaggedValue::Boolean(true));
    assert_eq!(cx.array_length(handle).unwrap(), 3);

    let function = cx.execute("function mul(a, b) { return a * b; } mul", None);
    let mul = function.object_handle().unwrap();
    assert_eq!(
        cx.invoke_function(mul, TaggedValue::Undefined, vec![TaggedValue::Integer(6), TaggedValue::Integer(7)])
            .unwrap(),
        TaggedValue::Integer(42)
    );
    assert_eq!(cx.array_length(mul), Err(NativeError::NotAnArray(mul)));

    let object = cx.execute("var o = { a: 1, b: 'x' }; o.sum = function (n) { return this.a + n; }; o", None);
    let o = object.object_handle().unwrap();
    let names = cx.property_names(o).unwrap().into_values().unwrap();
    let names: Vec<String> = names.into_iter().filter_map(TaggedValue::into_string).collect();
    assert_eq!(names, vec!["a", "b", "sum"]);
    assert_eq!(
        cx.invoke_property(o, "sum", vec![TaggedValue::Integer(2)]).unwrap(),
        TaggedValue::Integer(3)
    );
    assert_eq!(cx.delete_property(o, "b").unwrap(), TaggedValue::Boolean(true));
    assert_eq!(cx.get_property(o, "b").unwrap(), TaggedValue::Undefined);
}
