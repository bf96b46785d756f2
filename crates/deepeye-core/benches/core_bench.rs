//! Criterion benchmarks for the deepeye-core render path
//!
//! Run with: cargo bench -p deepeye-core
#![allow(missing_docs)]

use std::sync::Arc;

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use deepeye_core::{
    AudioFormat, ChainStages, EqControls, FilterCell, GainCell, LimiterPolicy, PlanarBlock,
    RingBuffer, SignalGraph, map_filter,
};

const SAMPLE_RATE: f32 = 48000.0;
const BLOCK_SIZES: &[usize] = &[64, 256, 512, 1024];

fn generate_test_signal(size: usize) -> Vec<f32> {
    (0..size)
        .map(|i| {
            let t = i as f32 / SAMPLE_RATE;
            (2.0 * std::f32::consts::PI * 440.0 * t).sin() * 0.5
        })
        .collect()
}

fn bench_ring(c: &mut Criterion) {
    let mut group = c.benchmark_group("RingBuffer");

    for &block_size in BLOCK_SIZES {
        let signal = generate_test_signal(block_size);
        let planes = [signal.clone(), signal];

        group.bench_with_input(BenchmarkId::new("write", block_size), &block_size, |b, &n| {
            let ring = RingBuffer::new(2, 512 * 2048);
            let mut t = 0_i64;
            b.iter(|| {
                ring.write(black_box(&planes), t, t + n as i64).unwrap();
                t += n as i64;
            });
        });

        group.bench_with_input(BenchmarkId::new("read_channel", block_size), &block_size, |b, &n| {
            let ring = RingBuffer::new(2, 8192);
            ring.write(&[vec![0.1; 8192], vec![0.2; 8192]], 0, 8192).unwrap();
            let mut out = vec![0.0; n];
            b.iter(|| {
                ring.read_channel(0, 8192 - n as i64, 8192, black_box(&mut out)).unwrap();
            });
        });
    }

    group.finish();
}

fn bench_chain(c: &mut Criterion) {
    let mut group = c.benchmark_group("SignalGraph");

    for &block_size in BLOCK_SIZES {
        let signal = generate_test_signal(block_size);

        group.bench_with_input(BenchmarkId::new("process", block_size), &block_size, |b, &n| {
            let filter = Arc::new(FilterCell::default());
            filter.set_knob(0.25);
            let stages = ChainStages::standard(
                Arc::new(EqControls::new()),
                filter,
                Arc::new(GainCell::unbounded(-6.0)),
                LimiterPolicy::brickwall(),
            );
            let mut graph = SignalGraph::new(AudioFormat::new(SAMPLE_RATE, 2, n), stages);
            graph.connect_chain().unwrap();
            let mut block = PlanarBlock::from_planes(vec![signal.clone(), signal.clone()]);
            b.iter(|| {
                block.set_frames(n);
                graph.process(black_box(&mut block));
            });
        });
    }

    group.bench_function("map_filter", |b| {
        let mut v = 0.0_f32;
        b.iter(|| {
            v = (v + 0.013) % 1.0;
            black_box(map_filter(black_box(v), 0.0))
        });
    });

    group.finish();
}

criterion_group!(benches, bench_ring, bench_chain);

criterion_main!(benches);
