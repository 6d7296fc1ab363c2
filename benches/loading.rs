//! Loading benchmarks: end-to-end file loads, raw batch appends and schema inference.

use std::fs;

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};

use csv_db_loader::ingestion::infer::infer_schema;
use csv_db_loader::ingestion::{LoadOptions, load};
use csv_db_loader::storage::SqliteDestination;

fn generate_rows(n: usize) -> Vec<Vec<String>> {
    (0..n)
        .map(|i| {
            vec![
                i.to_string(),
                format!("name-{i}"),
                format!("{}.25", i % 1000),
                (i % 2 == 0).to_string(),
            ]
        })
        .collect()
}

fn headers() -> Vec<String> {
    ["id", "name", "score", "active"].iter().map(|s| s.to_string()).collect()
}

fn generate_csv(n: usize) -> String {
    let mut out = headers().join(",");
    out.push('\n');
    for row in generate_rows(n) {
        out.push_str(&row.join(","));
        out.push('\n');
    }
    out
}

fn file_load_benchmarks(c: &mut Criterion) {
    let mut group = c.benchmark_group("file_load");
    group.sample_size(10);

    for rows in [1_000, 50_000] {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("bench.csv");
        fs::write(&source, generate_csv(rows)).unwrap();

        for batch_size in [1_000, 10_000] {
            let opts = LoadOptions {
                batch_size,
                ..Default::default()
            };
            group.throughput(Throughput::Elements(rows as u64));
            group.bench_with_input(
                BenchmarkId::new(format!("batch_{batch_size}"), rows),
                &source,
                |b, source| {
                    b.iter(|| {
                        let db = dir.path().join("bench.db");
                        let _ = fs::remove_file(&db);
                        load(source, &db, &opts).unwrap()
                    });
                },
            );
        }
    }

    group.finish();
}

fn append_benchmarks(c: &mut Criterion) {
    let mut group = c.benchmark_group("append_batch");

    for size in [1_000, 10_000] {
        let rows = generate_rows(size);
        let schema = infer_schema(&headers(), &rows).unwrap();

        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::new("in_memory", size), &rows, |b, rows| {
            b.iter(|| {
                let mut dest = SqliteDestination::in_memory().unwrap();
                dest.ensure_table("bench", &schema).unwrap();
                dest.append_batch("bench", &schema, rows).unwrap()
            });
        });
    }

    group.finish();
}

fn inference_benchmarks(c: &mut Criterion) {
    let mut group = c.benchmark_group("schema_inference");

    for size in [1_000, 10_000] {
        let rows = generate_rows(size);
        let headers = headers();
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &rows, |b, rows| {
            b.iter(|| infer_schema(&headers, rows).unwrap());
        });
    }

    group.finish();
}

criterion_group!(benches, file_load_benchmarks, append_benchmarks, inference_benchmarks);
criterion_main!(benches);
