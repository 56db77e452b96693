use brimming::encoder::{BatchEncoder, EncodingPolicy};
use brimming::row::{RowGenerator, DEFAULT_STRING_LENGTH};
use brimming::spec::TableRef;
use criterion::{black_box, criterion_group, criterion_main, Criterion};

fn batch_benchmark(c: &mut Criterion) {
    let table = TableRef {
        database: "brim".into(),
        name: "brim1".into(),
    };
    let mut group = c.benchmark_group("BATCH");
    group.sample_size(10);

    group.bench_function("generate/1000_rows", |b| {
        let mut rows = RowGenerator::new(Some(64), DEFAULT_STRING_LENGTH);
        b.iter(|| black_box(rows.rows(1000)))
    });

    for policy in [EncodingPolicy::Bound, EncodingPolicy::Literal] {
        group.bench_function(format!("encode/{:?}/1000_rows", policy), |b| {
            let mut rows = RowGenerator::new(Some(64), DEFAULT_STRING_LENGTH);
            let mut encoder = BatchEncoder::new(policy);
            b.iter(|| black_box(encoder.encode(&table, rows.rows(1000))))
        });
    }

    group.finish();
}

criterion_group!(benches, batch_benchmark);
criterion_main!(benches);
