//! Benchmark for the credit simulator event loop.

use cbshaper_core::{LinkConfig, StreamRequirement, TrafficType, derive_parameters};
use cbshaper_sim::{CreditSimulator, Frame, QueueSetup, TrafficProfile};
use criterion::{Criterion, criterion_group, criterion_main};
use std::hint::black_box;

fn arrival_sequence() -> Vec<Frame> {
    TrafficProfile::Poisson {
        mean_rate_bps: 80_000_000.0,
        max_frame_size: 1500,
    }
    .generate(10.0, 42, "bench")
    .unwrap()
}

fn bench_queue_replay(c: &mut Criterion) {
    let requirement = StreamRequirement::builder("bench")
        .traffic_type(TrafficType::Video4k)
        .bitrate_mbps(100.0)
        .priority(6)
        .max_latency_ms(20.0)
        .max_jitter_ms(3.0)
        .build()
        .unwrap();
    let config = LinkConfig::default();
    let params = derive_parameters(&requirement, &config).unwrap();
    let frames = arrival_sequence();

    c.bench_function("replay_10s_poisson_queue", |b| {
        b.iter(|| {
            let simulator =
                CreditSimulator::new(QueueSetup::new(params.clone(), config.link_rate_bps))
                    .unwrap();
            black_box(simulator.run(black_box(frames.clone())))
        })
    });
}

criterion_group!(benches, bench_queue_replay);
criterion_main!(benches);
