use checkengine_sdk::{
    check_levels, get_rate, CheckPluginName, Levels, OnOverflow, ValueStoreManager,
};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

/// Benchmark a level check with a metric (hot path of most plugins)
fn bench_check_levels(c: &mut Criterion) {
    c.bench_function("check_levels_fixed", |b| {
        b.iter(|| {
            check_levels(black_box(85.0))
                .upper(Levels::fixed(80.0, 90.0))
                .metric("mem_used_percent")
                .label("Used")
                .evaluate()
        });
    });
}

/// Benchmark predictive levels in both directions
fn bench_check_levels_predictive(c: &mut Criterion) {
    c.bench_function("check_levels_predictive", |b| {
        b.iter(|| {
            check_levels(black_box(9.0))
                .upper(Levels::predictive("load1", Some(4.0), Some((6.0, 8.0))))
                .lower(Levels::predictive("load1", Some(4.0), Some((2.0, 1.0))))
                .metric("load1")
                .evaluate()
        });
    });
}

/// Benchmark get_rate on an established counter
fn bench_get_rate(c: &mut Criterion) {
    let manager = ValueStoreManager::new();
    let plugin = CheckPluginName::new("interfaces").unwrap();
    let store = manager.scope("bench-host", &plugin, Some("eth0"));
    let mut now = 0.0;

    c.bench_function("get_rate", |b| {
        b.iter(|| {
            now += 60.0;
            let _ = get_rate(&store, black_box("in_octets"), now, now * 1000.0, OnOverflow::Raise);
        });
    });
}

/// Benchmark scope lookup with a growing number of services
fn bench_scope_lookup(c: &mut Criterion) {
    let mut group = c.benchmark_group("scope_lookup");
    let plugin = CheckPluginName::new("interfaces").unwrap();

    for count in [10usize, 100, 1000].iter() {
        let manager = ValueStoreManager::new();
        for i in 0..*count {
            manager.scope("bench-host", &plugin, Some(&i.to_string()));
        }
        group.bench_with_input(BenchmarkId::from_parameter(count), count, |b, _| {
            b.iter(|| manager.scope(black_box("bench-host"), &plugin, Some("5")));
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_check_levels,
    bench_check_levels_predictive,
    bench_get_rate,
    bench_scope_lookup
);
criterion_main!(benches);
