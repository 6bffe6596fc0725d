//! Micro-benchmark of a hot loop, matching `ouros`'s own
//! `arithmetic_non_foldable.rs` benchmark shape (warm up once outside the
//! timed section, then re-run the same call inside `bench.iter`).

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use emberscript::{Engine, HostValue};

const COUNTER_LOOP: &str = r#"
int run() {
    int total = 0;
    for (int i = 0; i < 10000; i = i + 1) {
        total = total + i;
    }
    return total;
}
"#;

fn run_counter_loop(engine: &mut Engine) -> i64 {
    match engine.call("run", vec![]).unwrap() {
        HostValue::Int(n) => n,
        other => panic!("expected Int, got {other:?}"),
    }
}

fn bench_counter_loop(c: &mut Criterion) {
    let mut engine = Engine::new();
    engine.load(COUNTER_LOOP).unwrap();
    assert_eq!(run_counter_loop(&mut engine), 49_995_000);

    c.bench_function("for_loop_counter", |b| {
        b.iter(|| black_box(run_counter_loop(&mut engine)));
    });
}

criterion_group!(benches, bench_counter_loop);
criterion_main!(benches);
