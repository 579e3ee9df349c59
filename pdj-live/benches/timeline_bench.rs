//! Output Timeline Performance Benchmark
//!
//! Measures the per-block cost of the output path: decoding a streamed chunk
//! and rendering overlapping voices through gain automation.
//!
//! **Goal:** render a 10 ms stereo block at 48 kHz far below real time
//! **Target:** <100 µs per block with 4 active voices and a capture tap

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use pdj_live::audio::decode::encode_pcm16;
use pdj_live::audio::{AudioSegment, GainStage, Pcm16Decoder, SegmentDecoder, Timeline};
use std::sync::Arc;

const SAMPLE_RATE: u32 = 48_000;
const CHANNELS: u16 = 2;
const BLOCK_FRAMES: usize = 480;

/// Timeline with `voices` back-to-back 2 s segments and a fade-in on the stage
fn timeline_with_voices(voices: usize, tapped: bool) -> Timeline {
    let mut timeline = Timeline::new(SAMPLE_RATE, CHANNELS);
    let stage = Arc::new(GainStage::new());
    stage.fade(0.0, 1.0, 0.0, 0.1);
    for i in 0..voices {
        let segment = AudioSegment::new(
            vec![0.25; 2 * SAMPLE_RATE as usize * CHANNELS as usize],
            SAMPLE_RATE,
            CHANNELS,
        );
        // Overlap by half a segment so every block mixes several voices
        timeline.schedule(segment, i as f64, Arc::clone(&stage));
    }
    if tapped {
        // Receiver dropped: the tap detaches after its first block
        let _ = timeline.attach_tap(stage.id());
    }
    timeline
}

fn bench_render(c: &mut Criterion) {
    let mut group = c.benchmark_group("timeline_render");

    for voices in [1usize, 4, 16] {
        group.bench_with_input(BenchmarkId::new("block", voices), &voices, |b, &voices| {
            let mut timeline = timeline_with_voices(voices, false);
            let mut out = vec![0.0f32; BLOCK_FRAMES * CHANNELS as usize];
            b.iter(|| {
                if timeline.voice_count() == 0 {
                    timeline = timeline_with_voices(voices, false);
                }
                timeline.render(black_box(&mut out));
            });
        });
    }

    group.bench_function("block_tapped", |b| {
        let mut timeline = timeline_with_voices(4, true);
        let mut out = vec![0.0f32; BLOCK_FRAMES * CHANNELS as usize];
        b.iter(|| {
            if timeline.voice_count() == 0 {
                timeline = timeline_with_voices(4, true);
            }
            timeline.render(black_box(&mut out));
        });
    });

    group.finish();
}

fn bench_decode(c: &mut Criterion) {
    // One second of stereo audio, as the service would stream it
    let payload = encode_pcm16(&vec![0.1; SAMPLE_RATE as usize * CHANNELS as usize]);
    let decoder = Pcm16Decoder::new(SAMPLE_RATE, CHANNELS);

    c.bench_function("decode_one_second_chunk", |b| {
        b.iter(|| decoder.decode_segment(black_box(&payload)))
    });
}

fn bench_gain_curve(c: &mut Criterion) {
    let stage = GainStage::new();
    stage.fade(0.0, 1.0, 0.0, 0.1);
    stage.fade(1.0, 0.0, 5.0, 0.1);

    c.bench_function("gain_value_at", |b| {
        b.iter(|| {
            let mut sum = 0.0f32;
            for i in 0..1000 {
                sum += stage.value_at(black_box(i as f64 * 0.01));
            }
            sum
        })
    });
}

criterion_group!(benches, bench_render, bench_decode, bench_gain_curve);
criterion_main!(benches);
