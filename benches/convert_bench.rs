//! End-to-end conversion benchmark: a generated mixed table streamed through
//! the facade into the in-memory column store.

use criterion::{criterion_group, criterion_main, BatchSize, Criterion, Throughput};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use rowpivot::source::MemoryTable;
use rowpivot::target::ColumnStore;
use rowpivot::{Converter, PivotConfig};

const ROWS: usize = 100_000;
const MAX_SEQ_LEN: usize = 16;

fn generated_table(rows: usize) -> MemoryTable {
    let mut rng = StdRng::seed_from_u64(42);

    let energy: Vec<f64> = (0..rows).map(|_| rng.random_range(0.0..1000.0)).collect();
    let pos: Vec<f32> = (0..rows * 3).map(|_| rng.random::<f32>()).collect();
    let hits: Vec<Vec<f64>> = (0..rows)
        .map(|_| {
            let len = rng.random_range(0..=MAX_SEQ_LEN);
            (0..len).map(|_| rng.random::<f64>()).collect()
        })
        .collect();
    let counts: Vec<i32> = hits.iter().map(|h| h.len() as i32).collect();

    MemoryTable::builder("bench")
        .scalar::<f64>("energy", &energy)
        .fixed::<f32>("pos", 3, &pos)
        .scalar::<i32>("n_hits", &counts)
        .variable::<f64>("hits", "n_hits", &hits)
        .build()
        .unwrap()
}

fn bench_convert(c: &mut Criterion) {
    let mut group = c.benchmark_group("convert");
    group.throughput(Throughput::Elements(ROWS as u64));
    group.sample_size(10);

    group.bench_function("mixed_100k_rows", |b| {
        b.iter_batched(
            || generated_table(ROWS),
            |mut table| {
                let mut store = ColumnStore::new();
                let mut conversion = Converter::new(PivotConfig::default()).unwrap();
                conversion.convert(&mut table, &mut store).unwrap();
                store
            },
            BatchSize::LargeInput,
        )
    });

    group.finish();
}

criterion_group!(benches, bench_convert);
criterion_main!(benches);
