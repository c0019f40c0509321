//! Benchmarks for pipeline execution.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use edgeflow::context::ExecutionContext;
use edgeflow::core::{Event, Reading};
use edgeflow::pipeline::PipelineRuntime;
use edgeflow::stages::{DeviceNameFilter, JsonTransform};
use std::sync::Arc;

fn pipeline_benchmark(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().expect("runtime");
    let pipeline = PipelineRuntime::new(vec![
        Arc::new(DeviceNameFilter::new(vec!["bench-device".to_string()])),
        Arc::new(JsonTransform::new()),
    ]);
    let event = Event::new("bench-device")
        .with_id("e-bench")
        .with_reading(Reading::new("Float32", "1.2"));

    c.bench_function("filter_encode", |b| {
        b.iter(|| {
            rt.block_on(async {
                let ctx = ExecutionContext::new("bench");
                pipeline.run(&ctx, black_box(event.clone())).await;
                black_box(ctx.output())
            })
        });
    });
}

criterion_group!(benches, pipeline_benchmark);
criterion_main!(benches);
