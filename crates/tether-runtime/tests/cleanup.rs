//! Native resource accounting
//!
//! Allocation counters are process-wide, so this binary holds a single test.

use tether_runtime::{HostObjectTemplate, JsEngine, Value};

struct Token;

#[test]
fn test_engine_dispose_releases_everything() {
    assert!(JsEngine::allocation_stats().is_empty());

    let engine = JsEngine::default();
    engine
        .register_template(HostObjectTemplate::for_type::<Token>())
        .unwrap();
    let cx = engine.create_context().unwrap();
    let other = engine.create_context().unwrap();

    cx.set_variable("t", Value::host(Token)).unwrap();
    let script = cx.compile("t.n = 1; t", None).unwrap();
    script.execute().unwrap();
    let object = cx.create_object().unwrap();
    let array = other.create_array(vec![Value::from(1)]).unwrap();

    let live = JsEngine::allocation_stats();
    assert_eq!(live.engines, 1);
    assert_eq!(live.contexts, 2);
    assert_eq!(live.scripts, 1);
    assert_eq!(live.host_proxies, 1);
    assert_eq!(live.object_handles, 2);

    engine.dispose();
    let released = JsEngine::allocation_stats();
    assert!(released.is_empty(), "still allocated: {}", released);

    drop((object, array, script, cx, other, engine));
    assert!(JsEngine::allocation_stats().is_empty());
}
