//! Benchmark cv_parser::parse() on small and large sidecar documents.

use criterion::{black_box, criterion_group, criterion_main, Criterion};

fn large_document() -> Vec<u8> {
    // Real sidecars carry long format lists that the parser must skip over.
    let formats: Vec<serde_json::Value> = (0..200)
        .map(|i| {
            serde_json::json!({
                "format_id": format!("f{i}"),
                "url": format!("https://cdn.example.com/{i}.mp4"),
                "width": 1080,
                "height": 1920,
                "tbr": 1234.5,
            })
        })
        .collect();
    serde_json::to_vec(&serde_json::json!({
        "id": "7301234567890",
        "fulltitle": "A fairly long title with #hashtags #and #more",
        "description": "x".repeat(2048),
        "uploader": "someone",
        "duration": 31.4,
        "width": 1080,
        "height": 1920,
        "timestamp": 1_700_000_000,
        "epoch": 1_700_000_500,
        "tags": ["cats", "funny", "pets", "viral"],
        "formats": formats,
    }))
    .unwrap_or_default()
}

fn bench_parser(c: &mut Criterion) {
    let small = br#"{"id": "abc", "title": "Sunset", "duration": 12.5, "tags": ["sky"]}"#.to_vec();
    let large = large_document();

    let mut group = c.benchmark_group("sidecar");
    group.bench_function("small", |b| {
        b.iter(|| cv_parser::parse(black_box(&small)));
    });
    group.bench_function("large_with_formats", |b| {
        b.iter(|| cv_parser::parse(black_box(&large)));
    });
    group.finish();
}

criterion_group!(benches, bench_parser);
criterion_main!(benches);
