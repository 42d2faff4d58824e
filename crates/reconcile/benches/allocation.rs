use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};

use chrono::{Duration, Utc};
use rust_decimal::Decimal;

use finflow_core::{AggregateId, Money};
use finflow_reconcile::{AllocationStrategy, AllocationTarget, ManualAllocation};

fn targets(n: usize) -> Vec<AllocationTarget> {
    let now = Utc::now();
    (0..n)
        .map(|i| AllocationTarget {
            id: AggregateId::new(),
            number: format!("AR-{i:06}"),
            outstanding: Money::new(Decimal::new(100_00 + i as i64, 2)),
            due_date: Some(now + Duration::days((i % 90) as i64)),
            created_at: now - Duration::days(i as i64),
        })
        .collect()
}

fn bench_fifo(c: &mut Criterion) {
    let mut group = c.benchmark_group("fifo_allocate");
    for size in [10usize, 100, 1000] {
        let ts = targets(size);
        // Enough cash to walk roughly half the list.
        let amount = Money::new(Decimal::new(50_00 * size as i64, 2));
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &ts, |b, ts| {
            b.iter(|| {
                AllocationStrategy::Fifo
                    .allocate(black_box(amount), black_box(ts))
                    .unwrap()
            })
        });
    }
    group.finish();
}

fn bench_manual(c: &mut Criterion) {
    let ts = targets(100);
    let requests: Vec<ManualAllocation> = ts
        .iter()
        .rev()
        .map(|t| ManualAllocation {
            target_id: t.id,
            amount: Money::ZERO,
        })
        .collect();
    let amount = Money::new(Decimal::new(500_000_00, 2));
    let strategy = AllocationStrategy::manual(requests);

    c.bench_function("manual_allocate_100", |b| {
        b.iter(|| strategy.allocate(black_box(amount), black_box(&ts)).unwrap())
    });
}

criterion_group!(benches, bench_fifo, bench_manual);
criterion_main!(benches);
