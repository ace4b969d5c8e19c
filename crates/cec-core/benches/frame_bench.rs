//! Criterion benchmarks for the bus frame codec.
//!
//! Frames are tiny (2-16 bytes), but the codec sits on the hot path of every
//! dispatched bus message, so encode and decode should stay well under a
//! microsecond.
//!
//! Run with:
//! ```bash
//! cargo bench --package cec-core --bench frame_bench
//! ```

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use cec_core::{
    decode_frame, encode_frame, AbortReason, AudioFormat, CecFrame, DeviceType, LogicalAddress,
    Opcode, PhysicalAddress, CANDIDATE_FORMATS,
};

fn addr(n: u8) -> LogicalAddress {
    LogicalAddress::new(n).expect("fixture address in range")
}

// ── Frame fixtures ────────────────────────────────────────────────────────────

fn fixtures() -> Vec<(&'static str, CecFrame)> {
    vec![
        (
            "GivePhysicalAddress",
            CecFrame::give_physical_address(addr(0), addr(4)),
        ),
        (
            "ReportPhysicalAddress",
            CecFrame::report_physical_address(
                addr(4),
                PhysicalAddress::new(0x1000),
                DeviceType::Playback,
            ),
        ),
        (
            "SetOsdName",
            CecFrame::set_osd_name(addr(4), addr(0), "Blu-ray Player").expect("fits in a frame"),
        ),
        (
            "DeviceVendorId",
            CecFrame::device_vendor_id(addr(4), 0x001234),
        ),
        (
            "FeatureAbort",
            CecFrame::feature_abort(
                addr(5),
                addr(0),
                Opcode::RequestShortAudioDescriptor,
                AbortReason::Refused,
            ),
        ),
        (
            "RequestShortAudioDescriptor",
            CecFrame::request_short_audio_descriptor(addr(0), addr(5), &CANDIDATE_FORMATS)
                .expect("four candidates fit"),
        ),
        (
            "ReportShortAudioDescriptor",
            CecFrame::report_short_audio_descriptor(
                addr(5),
                addr(0),
                cec_core::encode_descriptor(AudioFormat::Lpcm, 2, 0x07, 0x01).to_vec(),
            )
            .expect("one descriptor fits"),
        ),
    ]
}

// ── Benchmark groups ──────────────────────────────────────────────────────────

fn bench_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("encode_frame");
    for (name, frame) in fixtures() {
        group.bench_with_input(BenchmarkId::new("frame", name), &frame, |b, frame| {
            b.iter(|| encode_frame(black_box(frame)))
        });
    }
    group.finish();
}

fn bench_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode_frame");
    for (name, frame) in fixtures() {
        let bytes = encode_frame(&frame);
        group.bench_with_input(BenchmarkId::new("frame", name), &bytes, |b, bytes| {
            b.iter(|| decode_frame(black_box(bytes)).expect("decode must succeed"))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_encode, bench_decode);
criterion_main!(benches);
