use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use tether_runtime::{DispatchResult, HostObjectTemplate, JsEngine, Value};

struct Counter;

fn bench_variables(c: &mut Criterion) {
    let engine = JsEngine::default();
    let cx = engine.create_context().unwrap();
    let mut group = c.benchmark_group("variables");

    let values = [
        ("integer", Value::Integer(42)),
        ("number", Value::Number(2.5)),
        ("string", Value::from("the quick brown fox")),
        ("host", Value::host(Counter)),
    ];
    for (name, value) in values {
        group.bench_with_input(BenchmarkId::new("set_get", name), &value, |b, value| {
            b.iter(|| {
                cx.set_variable("x", black_box(value.clone())).unwrap();
                cx.get_variable("x").unwrap()
            });
        });
    }

    group.finish();
}

fn bench_dispatch(c: &mut Criterion) {
    let engine = JsEngine::default();
    engine
        .register_template(
            HostObjectTemplate::for_type::<Counter>()
                .on_get_property(|_, _, name| match name {
                    "value" => DispatchResult::Handled(Value::Integer(7)),
                    _ => DispatchResult::NotHandled,
                }),
        )
        .unwrap();
    let cx = engine.create_context().unwrap();
    cx.set_variable("counter", Value::host(Counter)).unwrap();
    cx.set_function("sum", |_, args| {
        Ok(Value::from(args.iter().filter_map(Value::as_i32).sum::<i32>()))
    })
    .unwrap();

    c.bench_function("invoke_host_function", |b| {
        b.iter(|| cx.execute(black_box("sum(1, 2, 3)"), None).unwrap());
    });

    c.bench_function("get_host_property", |b| {
        b.iter(|| cx.execute(black_box("counter.value"), None).unwrap());
    });

    let script = cx
        .compile("var total = 0; for (var i = 0; i < 100; i++) { total += sum(i, 1); } total", None)
        .unwrap();
    c.bench_function("invoke_in_loop", |b| {
        b.iter(|| script.execute().unwrap());
    });
}

criterion_group!(benches, bench_variables, bench_dispatch);
criterion_main!(benches);
