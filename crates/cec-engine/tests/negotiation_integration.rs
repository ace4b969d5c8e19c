//! Integration tests for the audio capability negotiation.
//!
//! # Purpose
//!
//! These tests drive the `AudioCapabilityAction` through the scheduler's
//! public API and verify:
//!
//! - The happy path: a descriptor reply becomes a per-candidate support
//!   table, is persisted, and is memoised so the next run needs no bus
//!   traffic.
//! - The fallback paths: rejection, empty reply, transport nack, and
//!   timeout all resolve to the baseline LPCM-only table.
//! - That exactly one request is sent per run: this negotiation has no
//!   retries.
//!
//! # The candidate list on the wire
//!
//! Every request carries the same four format codes, priority order:
//!
//! ```text
//! RequestShortAudioDescriptor [01 02 07 06]   (LPCM, AC-3, DTS, AAC)
//! ```

use cec_core::{
    encode_descriptor, AbortReason, AudioFormat, CecFrame, LogicalAddress, Opcode, PhysicalAddress,
};
use tokio::sync::mpsc;

use cec_engine::application::{
    ActionKind, ActionScheduler, AudioCapabilityAction, AudioCapabilityResult, EngineEvent,
    SendResult, TimerToken,
};
use cec_engine::infrastructure::{
    ManualTimerService, MemoryCapabilityStore, ScriptedBus, StaticTopology,
};

const BASELINE_FLATTENED: &str = "1:1:2:7:1;2:0:0:0:0;7:0:0:0:0;6:0:0:0:0";

// ── Test harness ──────────────────────────────────────────────────────────────

struct Harness {
    scheduler: ActionScheduler,
    events: mpsc::Receiver<EngineEvent>,
    bus: ScriptedBus,
    timers: ManualTimerService,
    store: MemoryCapabilityStore,
}

impl Harness {
    fn new() -> Self {
        let bus = ScriptedBus::new();
        let timers = ManualTimerService::new();
        let store = MemoryCapabilityStore::new();
        let (scheduler, events) = ActionScheduler::new(
            LogicalAddress::TV,
            Box::new(bus.clone()),
            Box::new(StaticTopology::new(vec![(2, PhysicalAddress::new(0x3000))])),
            Box::new(timers.clone()),
            Box::new(store.clone()),
        );
        Harness {
            scheduler,
            events,
            bus,
            timers,
            store,
        }
    }

    fn start_negotiation(&mut self) {
        self.scheduler.start(Box::new(AudioCapabilityAction::new(
            LogicalAddress::AUDIO_SYSTEM,
        )));
    }

    fn negotiation_result(&mut self) -> Option<AudioCapabilityResult> {
        while let Ok(event) = self.events.try_recv() {
            if let EngineEvent::AudioCapabilityNegotiated(result) = event {
                return Some(result);
            }
        }
        None
    }
}

fn audio_system() -> LogicalAddress {
    LogicalAddress::AUDIO_SYSTEM
}

fn rejection() -> CecFrame {
    CecFrame::feature_abort(
        audio_system(),
        LogicalAddress::TV,
        Opcode::RequestShortAudioDescriptor,
        AbortReason::Refused,
    )
}

fn descriptor_reply(descriptors: Vec<u8>) -> CecFrame {
    CecFrame::report_short_audio_descriptor(audio_system(), LogicalAddress::TV, descriptors)
        .expect("descriptor block fits a frame")
}

/// LPCM 2ch plus AC-3 6ch, the soundbar profile used throughout.
fn soundbar_descriptors() -> Vec<u8> {
    let mut block = Vec::new();
    block.extend_from_slice(&encode_descriptor(AudioFormat::Lpcm, 2, 0x07, 0x01));
    block.extend_from_slice(&encode_descriptor(AudioFormat::Ac3, 6, 0x07, 0x50));
    block
}

// ── Request shape ─────────────────────────────────────────────────────────────

#[test]
fn test_request_carries_the_fixed_candidate_list() {
    let mut harness = Harness::new();
    harness.start_negotiation();

    let sent = harness.bus.take_sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].opcode(), Opcode::RequestShortAudioDescriptor);
    assert_eq!(sent[0].destination(), audio_system());
    assert_eq!(sent[0].params(), &[1, 2, 7, 6]);
}

// ── Happy path and memoisation ────────────────────────────────────────────────

#[test]
fn test_descriptor_reply_builds_the_support_table() {
    let mut harness = Harness::new();
    harness.start_negotiation();
    harness.bus.take_sent();

    assert!(harness.scheduler.dispatch(&descriptor_reply(soundbar_descriptors())));

    let result = harness.negotiation_result().expect("negotiation finished");
    assert_eq!(result.raw_descriptors, soundbar_descriptors());
    assert_eq!(result.codecs.len(), 4);

    let lpcm = result.codecs.iter().find(|c| c.format == AudioFormat::Lpcm).expect("LPCM entry");
    assert!(lpcm.supported);
    assert_eq!(lpcm.max_channels, 2);

    let ac3 = result.codecs.iter().find(|c| c.format == AudioFormat::Ac3).expect("AC-3 entry");
    assert!(ac3.supported);
    assert_eq!(ac3.max_channels, 6);
    assert_eq!(ac3.bitrate_byte, 0x50);

    for absent in [AudioFormat::Dts, AudioFormat::Aac] {
        let entry = result.codecs.iter().find(|c| c.format == absent).expect("entry");
        assert!(!entry.supported);
    }

    assert_eq!(
        harness.store.last_persisted().as_deref(),
        Some("1:1:2:7:1;2:1:6:7:80;7:0:0:0:0;6:0:0:0:0")
    );
    assert!(!harness.scheduler.is_running(ActionKind::AudioCapability));
}

#[test]
fn test_second_run_reuses_the_memo_without_bus_traffic() {
    let mut harness = Harness::new();
    harness.start_negotiation();
    harness.bus.take_sent();
    harness.scheduler.dispatch(&descriptor_reply(soundbar_descriptors()));
    harness.negotiation_result().expect("first run finished");

    harness.start_negotiation();

    // The memo answered: nothing was sent, no timer armed, and the same
    // table came out again.
    assert_eq!(harness.bus.sent_count(), 0);
    assert!(harness.timers.armed_tokens().is_empty());
    let result = harness.negotiation_result().expect("memoised run finished");
    assert_eq!(result.raw_descriptors, soundbar_descriptors());
    assert!(!harness.scheduler.is_running(ActionKind::AudioCapability));
}

// ── Fallback paths ────────────────────────────────────────────────────────────

#[test]
fn test_rejection_resolves_to_the_baseline_profile() {
    let mut harness = Harness::new();
    harness.start_negotiation();

    assert!(harness.scheduler.dispatch(&rejection()));

    let result = harness.negotiation_result().expect("negotiation finished");
    assert!(result.raw_descriptors.is_empty());
    let supported: Vec<AudioFormat> = result
        .codecs
        .iter()
        .filter(|c| c.supported)
        .map(|c| c.format)
        .collect();
    assert_eq!(supported, vec![AudioFormat::Lpcm]);
    assert_eq!(harness.store.last_persisted().as_deref(), Some(BASELINE_FLATTENED));

    // Exactly one request went out: rejection is terminal, not retried.
    assert_eq!(harness.bus.take_sent().len(), 1);
}

#[test]
fn test_empty_reply_is_a_rejection_and_is_not_memoised() {
    let mut harness = Harness::new();
    harness.start_negotiation();
    harness.bus.take_sent();

    assert!(harness.scheduler.dispatch(&descriptor_reply(Vec::new())));
    let result = harness.negotiation_result().expect("negotiation finished");
    assert!(result.codecs.iter().filter(|c| c.supported).count() == 1);

    // No memo was cached: the next run asks the bus again.
    harness.start_negotiation();
    assert_eq!(harness.bus.take_sent().len(), 1);
}

#[test]
fn test_timeout_resolves_to_the_baseline_profile() {
    let mut harness = Harness::new();
    harness.start_negotiation();
    harness.bus.take_sent();

    harness.scheduler.dispatch_timer(TimerToken {
        kind: ActionKind::AudioCapability,
        stage: 0,
        peer: audio_system(),
    });

    let result = harness.negotiation_result().expect("negotiation finished");
    assert!(result.raw_descriptors.is_empty());
    assert_eq!(harness.store.last_persisted().as_deref(), Some(BASELINE_FLATTENED));
    // No retry followed the timeout.
    assert_eq!(harness.bus.sent_count(), 0);
    assert!(!harness.scheduler.is_running(ActionKind::AudioCapability));
}

#[test]
fn test_transport_nack_terminates_the_negotiation() {
    let mut harness = Harness::new();
    harness.start_negotiation();
    harness.bus.take_sent();

    harness
        .scheduler
        .on_send_result(Opcode::RequestShortAudioDescriptor, SendResult::Nack);

    let result = harness.negotiation_result().expect("negotiation finished");
    assert_eq!(harness.store.last_persisted().as_deref(), Some(BASELINE_FLATTENED));
    assert!(result.codecs.iter().any(|c| c.format == AudioFormat::Lpcm && c.supported));
    // The armed reply timer was released.
    assert!(harness.timers.armed_tokens().is_empty());
}

#[test]
fn test_busy_send_result_is_ignored() {
    let mut harness = Harness::new();
    harness.start_negotiation();
    harness.bus.take_sent();

    harness
        .scheduler
        .on_send_result(Opcode::RequestShortAudioDescriptor, SendResult::Busy);

    // Transient outcome: the negotiation keeps waiting for the reply timer.
    assert!(harness.negotiation_result().is_none());
    assert!(harness.scheduler.is_running(ActionKind::AudioCapability));
}

#[test]
fn test_reply_from_the_wrong_peer_is_not_claimed() {
    let mut harness = Harness::new();
    harness.start_negotiation();
    harness.bus.take_sent();

    let stray = CecFrame::report_short_audio_descriptor(
        LogicalAddress::new(4).expect("test address"),
        LogicalAddress::TV,
        soundbar_descriptors(),
    )
    .expect("descriptor block fits a frame");
    assert!(!harness.scheduler.dispatch(&stray));
    assert!(harness.scheduler.is_running(ActionKind::AudioCapability));
}
