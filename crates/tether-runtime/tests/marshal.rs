//! Value conversion between host and script code

use chrono::{TimeZone, Utc};
use tether_runtime::{codec, Error, HostObject, JsContext, JsEngine, Value};
use tether_sdk::TaggedValue;

fn context() -> (JsEngine, JsContext) {
    let engine = JsEngine::default();
    let cx = engine.create_context().unwrap();
    (engine, cx)
}

struct Marker;

#[test]
fn test_scalars_round_trip() {
    let (_engine, cx) = context();
    let cases = [
        Value::Integer(5),
        Value::Number(2.5),
        Value::Boolean(true),
        Value::Null,
        Value::Undefined,
        Value::from("plain"),
    ];
    for value in cases {
        cx.set_variable("x", value.clone()).unwrap();
        assert_eq!(cx.get_variable("x").unwrap(), value);
    }
}

#[test]
fn test_indexes_become_script_numbers() {
    let (_engine, cx) = context();
    cx.set_variable("i", 7_u32).unwrap();
    assert_eq!(cx.execute("typeof i", None).unwrap(), Value::from("number"));
    assert_eq!(cx.get_variable("i").unwrap(), Value::Integer(7));
}

#[test]
fn test_integral_results_are_integers() {
    let (_engine, cx) = context();
    assert_eq!(cx.execute("2 * 3", None).unwrap(), Value::Integer(6));
    assert_eq!(cx.execute("0.5 + 0.25", None).unwrap(), Value::Number(0.75));
    assert_eq!(cx.execute("2147483648", None).unwrap(), Value::Number(2147483648.0));
    match cx.execute("-0", None).unwrap() {
        Value::Number(n) => assert!(n == 0.0 && n.is_sign_negative()),
        other => panic!("expected -0, got {:?}", other),
    }
}

#[test]
fn test_wide_integers_lose_precision() {
    let (_engine, cx) = context();
    cx.set_variable("big", 9_007_199_254_740_993_i64).unwrap();
    assert_eq!(cx.get_variable("big").unwrap(), Value::Number(9_007_199_254_740_992.0));
    assert_eq!(cx.execute("big === 9007199254740992", None).unwrap(), Value::Boolean(true));
}

#[test]
fn test_strings_keep_unicode() {
    let (_engine, cx) = context();
    let text = "héllo ✓ 😀";
    cx.set_variable("s", text).unwrap();
    assert_eq!(cx.get_variable("s").unwrap(), Value::from(text));
    // The emoji is a surrogate pair
    assert_eq!(cx.execute("s.length", None).unwrap(), Value::Integer(10));
}

#[test]
fn test_dates_truncate_to_milliseconds() {
    let (_engine, cx) = context();
    let date = Utc.timestamp_opt(1_500_000_000, 123_456_789).unwrap();
    cx.set_variable("d", date).unwrap();
    assert_eq!(
        cx.execute("d.getTime()", None).unwrap(),
        Value::Number(1_500_000_000_123.0)
    );

    let back = cx.get_variable("d").unwrap().as_date().unwrap();
    assert_eq!(back.timestamp_millis(), 1_500_000_000_123);
    assert_eq!(back.timestamp_subsec_nanos(), 123_000_000);
}

#[test]
fn test_invalid_dates_decode_as_numbers() {
    let (_engine, cx) = context();
    match cx.execute("new Date(NaN)", None).unwrap() {
        Value::Number(n) => assert!(n.is_nan()),
        other => panic!("expected NaN, got {:?}", other),
    }
}

#[test]
fn test_host_objects_keep_identity() {
    let (_engine, cx) = context();
    let object = HostObject::new(Marker);
    cx.set_variable("a", object.clone()).unwrap();
    cx.set_variable("b", object.clone()).unwrap();

    assert_eq!(cx.execute("a === b", None).unwrap(), Value::Boolean(true));
    let back = cx.get_variable("a").unwrap();
    assert!(back.as_host_object().unwrap().ptr_eq(&object));
    assert!(back.as_host::<Marker>().is_some());
    assert_eq!(cx.stats().unwrap().keepalive_slots, 1);

    cx.set_variable("c", Value::host(Marker)).unwrap();
    assert_eq!(cx.execute("a === c", None).unwrap(), Value::Boolean(false));
    assert_eq!(cx.stats().unwrap().keepalive_slots, 2);
}

#[test]
fn test_arrays() {
    let (_engine, cx) = context();
    let array = match cx.execute("[1, 'two', [3]]", None).unwrap() {
        Value::Array(array) => array,
        other => panic!("expected an array, got {:?}", other),
    };
    assert_eq!(array.len().unwrap(), 3);
    assert_eq!(array.get(1).unwrap(), Value::from("two"));
    let items = array.to_vec().unwrap();
    assert!(matches!(items[2], Value::Array(_)));

    array.set(0, "one").unwrap();
    cx.set_variable("arr", array).unwrap();
    assert_eq!(cx.execute("arr[0]", None).unwrap(), Value::from("one"));

    let created = cx.create_array(vec![Value::from(1), Value::from("x")]).unwrap();
    cx.set_variable("made", created.clone()).unwrap();
    assert_eq!(cx.execute("made.join('-')", None).unwrap(), Value::from("1-x"));
    assert_eq!(created.len().unwrap(), 2);
}

#[test]
fn test_objects() {
    let (_engine, cx) = context();
    let object = match cx.execute("var o = { a: 1, b: 'x' }; o", None).unwrap() {
        Value::Object(object) => object,
        other => panic!("expected an object, got {:?}", other),
    };
    assert_eq!(object.get("a").unwrap(), Value::Integer(1));
    assert_eq!(object.property_names().unwrap(), vec!["a", "b"]);

    object.set("c", true).unwrap();
    assert_eq!(cx.execute("o.c", None).unwrap(), Value::Boolean(true));
    assert!(object.delete("a").unwrap());
    assert_eq!(cx.execute("o.a", None).unwrap(), Value::Undefined);

    let calc = cx
        .execute("var calc = { add: function (x, y) { return x + y; } }; calc", None)
        .unwrap();
    let sum = calc
        .as_object()
        .unwrap()
        .invoke_method("add", &[Value::from(2), Value::from(3)])
        .unwrap();
    assert_eq!(sum, Value::Integer(5));
}

#[test]
fn test_functions_called_from_host() {
    let (_engine, cx) = context();
    let function = match cx
        .execute("var f = function (x) { return this.base + x; }; f", None)
        .unwrap()
    {
        Value::Function(function) => function,
        other => panic!("expected a function, got {:?}", other),
    };
    let receiver = cx.create_object().unwrap();
    receiver.set("base", 10).unwrap();
    assert_eq!(
        function.call(receiver, &[Value::from(5)]).unwrap(),
        Value::Integer(15)
    );
}

#[test]
fn test_objects_from_another_context_are_rejected() {
    let engine = JsEngine::default();
    let first = engine.create_context().unwrap();
    let second = engine.create_context().unwrap();
    let object = first.create_object().unwrap();
    assert!(matches!(
        second.set_variable("o", object),
        Err(Error::Resolution(_))
    ));
}

#[test]
fn test_dropping_a_handle_releases_its_pin() {
    let (_engine, cx) = context();
    let base = cx.stats().unwrap().pinned_handles;
    let object = cx.create_object().unwrap();
    let clone = object.clone();
    assert_eq!(cx.stats().unwrap().pinned_handles, base + 1);
    drop(object);
    assert_eq!(cx.stats().unwrap().pinned_handles, base + 1);
    drop(clone);
    assert_eq!(cx.stats().unwrap().pinned_handles, base);

    let disposed = cx.create_object().unwrap();
    disposed.dispose();
    disposed.dispose();
    assert_eq!(cx.stats().unwrap().pinned_handles, base);
    assert!(matches!(
        disposed.get("x"),
        Err(Error::Disposed { resource: "object" })
    ));
}

#[test]
fn test_stray_boundary_shapes_are_internal_errors() {
    let (_engine, cx) = context();
    let run = TaggedValue::from_values(vec![TaggedValue::Integer(1)]);
    assert!(matches!(codec::extract(run, &cx), Err(Error::Internal(_))));
    assert!(matches!(
        codec::extract(TaggedValue::Termination, &cx),
        Err(Error::Internal(_))
    ));
    assert_eq!(codec::extract(TaggedValue::Empty, &cx).unwrap(), Value::Undefined);
    assert_eq!(
        codec::encode(&Value::Index(3), &cx).unwrap(),
        TaggedValue::Index(3)
    );
}
