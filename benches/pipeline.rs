use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use antifraud_liveness::tracking::{frame_difference, MotionScorer};
use antifraud_liveness::{Deadline, Frame, LivenessConfig, LivenessEngine, NoFaceExtractor};

fn noise_frame(width: u32, height: u32, seed: u64) -> Frame {
    let mut state = seed.wrapping_mul(6364136223846793005).wrapping_add(1);
    let pixels = (0..width * height * 3)
        .map(|_| {
            state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            (state >> 56) as u8
        })
        .collect();
    Frame::rgb(pixels, width, height, seed)
}

fn bench_frame_difference(c: &mut Criterion) {
    let mut group = c.benchmark_group("frame_difference");
    for (width, height) in [(320, 240), (640, 480), (1280, 720)] {
        let a = noise_frame(width, height, 1);
        let b = noise_frame(width, height, 2);
        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{width}x{height}")),
            &(a, b),
            |bench, (a, b)| bench.iter(|| frame_difference(black_box(a), black_box(b))),
        );
    }
    group.finish();
}

fn bench_motion_scorer(c: &mut Criterion) {
    let frames: Vec<Frame> = (0..30).map(|i| noise_frame(320, 240, i)).collect();
    c.bench_function("motion_scorer_30_frames", |bench| {
        bench.iter(|| {
            let mut scorer = MotionScorer::new();
            for frame in frames.iter().cloned() {
                scorer.observe(frame);
            }
            black_box(scorer.mean_motion())
        })
    });
}

fn bench_engine(c: &mut Criterion) {
    let engine = LivenessEngine::new(LivenessConfig::default(), NoFaceExtractor);
    let frames: Vec<Frame> = (0..30).map(|i| noise_frame(320, 240, i)).collect();
    c.bench_function("engine_30_frames", |bench| {
        bench.iter(|| {
            let input = frames.iter().cloned().map(Ok);
            black_box(engine.analyze_frames(input, &Deadline::none()))
        })
    });
}

criterion_group!(benches, bench_frame_difference, bench_motion_scorer, bench_engine);
criterion_main!(benches);
