//! Throughput benchmarks for line reassembly and progress classification

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use crawlwatch::classify::Classifier;
use crawlwatch::live::MemoryLiveSink;
use crawlwatch::progress::ProgressPipeline;
use crawlwatch::subprocess::streaming::LineReassembler;
use std::hint::black_box;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Runtime;

/// Crawler output for `units` ids, a third of them failing
fn crawl_output(units: usize) -> String {
    let mut out = format!("[步骤1] 开始爬取课程，共{}个课程ID\n", units);
    for id in 1..=units {
        out.push_str(&format!("正在处理 id:{}\n", id));
        if id % 3 == 0 {
            out.push_str(&format!("\x1b[31m[{}]:课程{} 提取视频链接失败\x1b[0m\n", id, id));
        } else {
            out.push_str(&format!("[{}]:课程{} 提取视频链接成功\n", id, id));
        }
    }
    out.push_str("数据已导出到: ./courses.xlsx\n");
    out
}

fn bench_reassembly(c: &mut Criterion) {
    let mut group = c.benchmark_group("reassembly");
    group.warm_up_time(Duration::from_secs(1));

    for chunk_size in [16usize, 512, 8192].iter() {
        let output = crawl_output(1000);
        group.throughput(Throughput::Bytes(output.len() as u64));
        group.bench_with_input(
            BenchmarkId::new("chunk_size", chunk_size),
            chunk_size,
            |b, &chunk_size| {
                b.iter(|| {
                    let mut reassembler = LineReassembler::new();
                    let mut lines = 0;
                    for piece in output.as_bytes().chunks(chunk_size) {
                        lines += reassembler.push(black_box(piece)).lines.len();
                    }
                    lines += reassembler.finish().lines.len();
                    black_box(lines)
                });
            },
        );
    }
    group.finish();
}

fn bench_classification(c: &mut Criterion) {
    let classifier = Classifier::default();
    let output = crawl_output(1000);
    let lines: Vec<&str> = output.lines().collect();

    let mut group = c.benchmark_group("classification");
    group.throughput(Throughput::Elements(lines.len() as u64));
    group.bench_function("classify_lines", |b| {
        b.iter(|| {
            let mut events = 0;
            for line in &lines {
                events += classifier.classify(black_box(line)).len();
            }
            black_box(events)
        });
    });
    group.finish();
}

fn bench_pipeline(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let classifier = Arc::new(Classifier::default());

    let mut group = c.benchmark_group("pipeline");
    for units in [100usize, 1000].iter() {
        let output = crawl_output(*units);
        group.throughput(Throughput::Elements(*units as u64));
        group.bench_with_input(BenchmarkId::new("units", units), units, |b, _| {
            b.to_async(&rt).iter(|| {
                let classifier = classifier.clone();
                let output = output.clone();
                async move {
                    let mut pipeline =
                        ProgressPipeline::new(classifier, Arc::new(MemoryLiveSink::new()));
                    for line in output.lines() {
                        pipeline.process_line(line).await;
                    }
                    black_box(pipeline.finish().await.counters)
                }
            });
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_reassembly,
    bench_classification,
    bench_pipeline
);
criterion_main!(benches);
