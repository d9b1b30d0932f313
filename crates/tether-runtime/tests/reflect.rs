//! Reflection-driven exposure of host types, instances and functions

use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;

use tether_runtime::{
    ContextConfig, Error, Exposure, HostDictionary, HostFunction, HostObject, HostType, JsContext,
    JsEngine, MissingMemberPolicy, ReflectionConfig, TypeCatalog, TypeDescriptor, Value,
};

struct Point {
    x: AtomicI32,
    y: AtomicI32,
}

impl Point {
    fn new(x: i32, y: i32) -> Self {
        Self {
            x: AtomicI32::new(x),
            y: AtomicI32::new(y),
        }
    }
}

fn arg(args: &[Value], index: usize) -> i32 {
    args.get(index).and_then(Value::as_i32).unwrap_or(0)
}

fn point_type() -> Arc<TypeDescriptor> {
    TypeDescriptor::builder::<Point>("Point")
        .property_mut(
            "x",
            |p: &Point| p.x.load(Ordering::SeqCst),
            |p: &Point, v: Value| {
                p.x.store(v.as_i32().unwrap_or(0), Ordering::SeqCst);
                Ok(())
            },
        )
        .property("y", |p: &Point| p.y.load(Ordering::SeqCst))
        .method("move", |_: &JsContext, p: &Point, args: &[Value]| {
            p.x.fetch_add(arg(args, 0), Ordering::SeqCst);
            p.y.fetch_add(arg(args, 1), Ordering::SeqCst);
            Ok(Value::Undefined)
        })
        .static_property("dimensions", || 2)
        .static_method("sum", |_: &JsContext, args: &[Value]| {
            Ok(Value::from(args.iter().filter_map(Value::as_i32).sum::<i32>()))
        })
        .constructor(|_: &JsContext, args: &[Value]| Ok(Point::new(arg(args, 0), arg(args, 1))))
        .display(|p: &Point| {
            format!("Point({}, {})", p.x.load(Ordering::SeqCst), p.y.load(Ordering::SeqCst))
        })
        .build()
}

fn reflecting(engine: &JsEngine, reflection: impl FnOnce(ReflectionConfig) -> ReflectionConfig) -> JsContext {
    let catalog = Arc::new(TypeCatalog::new());
    catalog.register(point_type());
    let config = reflection(ReflectionConfig::default().with_catalog(catalog));
    engine
        .create_context_with(ContextConfig::new().with_reflection(config))
        .unwrap()
}

fn message(cx: &JsContext, source: &str) -> Value {
    let wrapped = format!("try {{ {} }} catch (e) {{ e.name + ': ' + e.message }}", source);
    cx.execute(&wrapped, None).unwrap()
}

#[test]
fn test_instance_properties() {
    let engine = JsEngine::default();
    let cx = reflecting(&engine, |config| config);
    let point = HostObject::new(Point::new(1, 2));
    cx.set_variable("p", point.clone()).unwrap();

    assert_eq!(cx.execute("p.x + p.y", None).unwrap(), Value::Integer(3));
    cx.execute("p.x = 10", None).unwrap();
    assert_eq!(point.downcast_ref::<Point>().unwrap().x.load(Ordering::SeqCst), 10);

    assert_eq!(
        message(&cx, "p.y = 5"),
        Value::from("TypeError: Point.y is read-only")
    );
    assert_eq!(
        message(&cx, "p.move = 5"),
        Value::from("TypeError: Point.move is read-only")
    );
}

#[test]
fn test_instance_methods_and_display() {
    let engine = JsEngine::default();
    let cx = reflecting(&engine, |config| config);
    cx.set_variable("p", Value::host(Point::new(1, 2))).unwrap();

    cx.execute("p.move(2, 3)", None).unwrap();
    assert_eq!(cx.execute("String(p)", None).unwrap(), Value::from("Point(3, 5)"));
    assert_eq!(cx.execute("typeof p.move", None).unwrap(), Value::from("function"));
    assert_eq!(
        cx.execute("String(p.move)", None).unwrap(),
        Value::from("function move() { [native code] }")
    );
    assert_eq!(
        cx.execute("var m = p.move; m(1, 1); p.x", None).unwrap(),
        Value::Integer(4)
    );
}

#[test]
fn test_instance_keys_and_delete() {
    let engine = JsEngine::default();
    let cx = reflecting(&engine, |config| config);
    cx.set_variable("p", Value::host(Point::new(0, 0))).unwrap();

    assert_eq!(
        cx.execute("Object.keys(p).join(',')", None).unwrap(),
        Value::from("x,y,move")
    );
    assert_eq!(cx.execute("delete p.x", None).unwrap(), Value::Boolean(false));
    assert_eq!(cx.execute("p.x", None).unwrap(), Value::Integer(0));
}

#[test]
fn test_missing_members_fall_through_by_default() {
    let engine = JsEngine::default();
    let cx = reflecting(&engine, |config| config);
    cx.set_variable("p", Value::host(Point::new(0, 0))).unwrap();

    assert_eq!(cx.execute("p.extra", None).unwrap(), Value::Undefined);
    assert_eq!(cx.execute("p.extra = 7; p.extra", None).unwrap(), Value::Integer(7));
}

#[test]
fn test_missing_members_can_throw() {
    let engine = JsEngine::default();
    let cx = reflecting(&engine, |config| {
        config.with_missing_members(MissingMemberPolicy::Throw)
    });
    cx.set_variable("p", Value::host(Point::new(0, 0))).unwrap();

    assert_eq!(
        message(&cx, "p.extra"),
        Value::from("TypeError: Point has no member 'extra'")
    );
    assert_eq!(
        message(&cx, "p.extra = 1"),
        Value::from("TypeError: Point has no member 'extra'")
    );
    // Inherited conversions keep working
    assert_eq!(cx.execute("String(p)", None).unwrap(), Value::from("Point(0, 0)"));
}

#[test]
fn test_host_types() {
    let engine = JsEngine::default();
    let cx = reflecting(&engine, |config| config);
    cx.set_variable("Point", Value::host(HostType::new(point_type()))).unwrap();

    assert_eq!(cx.execute("typeof Point", None).unwrap(), Value::from("function"));
    assert_eq!(cx.execute("Point.dimensions", None).unwrap(), Value::Integer(2));
    assert_eq!(cx.execute("Point.sum(1, 2, 3)", None).unwrap(), Value::Integer(6));
    assert_eq!(
        cx.execute("var q = new Point(3, 4); q.x * q.y", None).unwrap(),
        Value::Integer(12)
    );
    assert_eq!(cx.execute("String(Point(1, 1))", None).unwrap(), Value::from("Point(1, 1)"));
    assert_eq!(
        cx.execute("String(Point)", None).unwrap(),
        Value::from("function Point() { [native code] }")
    );
    assert_eq!(
        message(&cx, "Point.dimensions = 3"),
        Value::from("TypeError: Point.dimensions is read-only")
    );

    let q = cx.get_variable("q").unwrap();
    assert_eq!(q.as_host::<Point>().map(|p| p.y.load(Ordering::SeqCst)), Some(4));
}

#[test]
fn test_types_without_constructor() {
    let engine = JsEngine::default();
    let cx = reflecting(&engine, |config| config);
    let bare = TypeDescriptor::builder::<Point>("Bare").build();
    cx.set_variable("Bare", Value::host(HostType::new(bare))).unwrap();

    assert_eq!(
        message(&cx, "new Bare()"),
        Value::from("TypeError: Bare has no constructor")
    );
}

#[test]
fn test_host_functions() {
    let engine = JsEngine::default();
    let cx = reflecting(&engine, |config| config);
    let greet = HostFunction::new(|_, args| {
        let name = args.first().and_then(Value::as_str).unwrap_or("nobody");
        Ok(Value::from(format!("hello {}", name)))
    })
    .with_name("greet");
    cx.set_variable("greet", Value::host(greet)).unwrap();

    assert_eq!(cx.execute("greet('bob')", None).unwrap(), Value::from("hello bob"));
    assert_eq!(cx.execute("greet()", None).unwrap(), Value::from("hello nobody"));
    assert_eq!(
        cx.execute("String(greet)", None).unwrap(),
        Value::from("function greet() { [native code] }")
    );
}

#[test]
fn test_disabled_functions_are_plain_objects() {
    let engine = JsEngine::default();
    let cx = reflecting(&engine, |config| config.with_functions(Exposure::disabled()));
    cx.set_function("f", |_, _| Ok(Value::Integer(1))).unwrap();

    assert_eq!(cx.execute("typeof f", None).unwrap(), Value::from("object"));
    let err = cx.execute("f()", None).unwrap_err();
    assert_eq!(err.script_error().unwrap().name.as_deref(), Some("TypeError"));
    assert!(matches!(err, Error::Script(_)));
}

#[test]
fn test_exposure_filters() {
    let engine = JsEngine::default();
    let cx = reflecting(&engine, |config| {
        config.with_objects(Exposure::enabled().with_filter(|object| {
            object
                .downcast_ref::<Point>()
                .map_or(false, |p| p.x.load(Ordering::SeqCst) >= 0)
        }))
    });
    cx.set_variable("visible", Value::host(Point::new(1, 1))).unwrap();
    cx.set_variable("hidden", Value::host(Point::new(-1, 1))).unwrap();

    assert_eq!(cx.execute("visible.x", None).unwrap(), Value::Integer(1));
    assert_eq!(cx.execute("hidden.x", None).unwrap(), Value::Undefined);
}

#[test]
fn test_dictionaries_read_and_write_through() {
    let engine = JsEngine::default();
    let cx = reflecting(&engine, |config| config);
    let settings: HostDictionary = [("name", Value::from("tether")), ("port", Value::from(80))]
        .into_iter()
        .collect();
    let object = HostObject::new(settings);
    cx.set_variable("d", object.clone()).unwrap();

    assert_eq!(cx.execute("d.name + ':' + d.port", None).unwrap(), Value::from("tether:80"));
    cx.execute("d.port = 8080; d['mode'] = 'fast'", None).unwrap();
    let dictionary = object.downcast_ref::<HostDictionary>().unwrap();
    assert_eq!(dictionary.get("port"), Some(Value::Integer(8080)));
    assert_eq!(dictionary.get("mode"), Some(Value::from("fast")));

    assert_eq!(
        cx.execute("Object.keys(d).join(',')", None).unwrap(),
        Value::from("mode,name,port")
    );
    assert_eq!(cx.execute("delete d.mode", None).unwrap(), Value::Boolean(true));
    assert_eq!(cx.execute("delete d.mode", None).unwrap(), Value::Boolean(false));
    assert!(!dictionary.contains_key("mode"));

    // Host-side changes are visible without re-exposing the object
    dictionary.insert("added", true);
    assert_eq!(cx.execute("d.added", None).unwrap(), Value::Boolean(true));
}

#[test]
fn test_dictionary_missing_keys_follow_policy() {
    let engine = JsEngine::default();
    let lenient = reflecting(&engine, |config| config);
    lenient.set_variable("d", Value::host(HostDictionary::new())).unwrap();
    assert_eq!(lenient.execute("d.absent", None).unwrap(), Value::Undefined);

    let strict = reflecting(&engine, |config| {
        config.with_missing_members(MissingMemberPolicy::Throw)
    });
    strict.set_variable("d", Value::host(HostDictionary::new())).unwrap();
    assert_eq!(
        message(&strict, "d.absent"),
        Value::from("TypeError: dictionary has no member 'absent'")
    );
    // Assignment always inserts
    assert_eq!(strict.execute("d.absent = 1; d.absent", None).unwrap(), Value::Integer(1));
    assert_eq!(strict.execute("typeof d.toString", None).unwrap(), Value::from("function"));
}

#[test]
fn test_disabled_dictionaries_are_plain_objects() {
    let engine = JsEngine::default();
    let cx = reflecting(&engine, |config| config.with_dictionaries(Exposure::disabled()));
    let dictionary: HostDictionary = [("key", 1)].into_iter().collect();
    cx.set_variable("d", Value::host(dictionary)).unwrap();
    assert_eq!(cx.execute("d.key", None).unwrap(), Value::Undefined);
}
