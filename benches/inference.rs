//! Benchmarks for discovery-time schema inference.
//!
//! Run with: cargo bench --bench inference

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use serde_json::json;

use tap_airtable::config::TypeMerge;
use tap_airtable::schema::infer_stream_schema;
use tap_airtable::sync::flatten_row;
use tap_airtable::types::Row;

fn make_row(i: usize) -> Row {
    let estimate = if i % 3 == 0 { json!("1.5") } else { json!(i % 8) };
    let owner = if i % 5 == 0 { "" } else { "ada@example.com" };
    let fields = json!({
        "Task Name": format!("task {i}"),
        "Estimate (h)": estimate,
        "Owner": owner,
        "Done": i % 2 == 0,
        "Tags": ["a", "b"],
        "Due Date": "2024-01-01",
    });
    Row::new(
        format!("rec{i:08}"),
        Some("2024-01-01T00:00:00.000Z".to_string()),
        fields.as_object().cloned().unwrap_or_default(),
    )
}

fn bench_inference(c: &mut Criterion) {
    let mut group = c.benchmark_group("infer_stream_schema");
    for n in [100usize, 1_000, 10_000] {
        let rows: Vec<Row> = (0..n).map(make_row).collect();
        group.throughput(Throughput::Elements(n as u64));
        for merge in [TypeMerge::Widen, TypeMerge::LastWins] {
            group.bench_with_input(BenchmarkId::new(format!("{merge:?}"), n), &rows, |b, rows| {
                b.iter(|| infer_stream_schema("Tasks", black_box(rows), merge))
            });
        }
    }
    group.finish();
}

fn bench_flatten(c: &mut Criterion) {
    let rows: Vec<Row> = (0..1_000).map(make_row).collect();
    let mut group = c.benchmark_group("flatten_row");
    group.throughput(Throughput::Elements(rows.len() as u64));
    for normalize in [false, true] {
        group.bench_with_input(BenchmarkId::from_parameter(normalize), &rows, |b, rows| {
            b.iter(|| {
                for row in rows {
                    black_box(flatten_row(row, normalize));
                }
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_inference, bench_flatten);
criterion_main!(benches);
