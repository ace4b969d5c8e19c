//! CEC feature-negotiation engine entry point.
//!
//! Wires the scheduler to its collaborators and runs a scripted
//! demonstration: two simulated peers (a playback device and an audio
//! system) answer the discovery queries and the audio capability request,
//! and every resulting engine event is logged.
//!
//! # Architecture
//!
//! ```text
//! main()
//!  └─ load_config()             -- TOML config, defaults on first run
//!  └─ ActionScheduler::new()    -- owns actions + collaborators
//!       ├─ ScriptedBus          -- recording transport (demo peers)
//!       ├─ TokioTimerService    -- sleep tasks feeding dispatch_timer
//!       ├─ StaticTopology       -- port map for discovered addresses
//!       └─ TomlCapabilityStore  -- restart continuity for audio caps
//! ```

use cec_core::{
    encode_descriptor, AudioFormat, CecFrame, DeviceType, LogicalAddress, Opcode, PhysicalAddress,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use cec_engine::application::action::CapabilityStore;
use cec_engine::application::{
    ActionScheduler, AudioCapabilityAction, DeviceDiscoveryAction, DiscoveryPolicy,
};
use cec_engine::infrastructure::storage::config::load_config;
use cec_engine::infrastructure::{
    MemoryCapabilityStore, ScriptedBus, StaticTopology, TokioTimerService, TomlCapabilityStore,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = load_config().unwrap_or_else(|e| {
        eprintln!("config not loaded, using defaults: {e}");
        Default::default()
    });

    // Initialise structured logging.  Level is overridden by `RUST_LOG`.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.engine.log_level.clone())),
        )
        .init();

    info!("CEC feature-negotiation engine starting");

    let local = LogicalAddress::TV;
    let bus = ScriptedBus::new();
    let (timers, mut timer_rx) = TokioTimerService::new();
    let topology = StaticTopology::new(vec![
        (1, PhysicalAddress::new(0x1000)),
        (2, PhysicalAddress::new(0x3000)),
    ]);
    let store: Box<dyn CapabilityStore> = match TomlCapabilityStore::at_platform_path() {
        Ok(store) => Box::new(store),
        Err(e) => {
            warn!("config path unavailable, capabilities kept in memory: {e}");
            Box::new(MemoryCapabilityStore::new())
        }
    };

    let (mut scheduler, mut events) = ActionScheduler::new(
        local,
        Box::new(bus.clone()),
        Box::new(topology),
        Box::new(timers),
        store,
    );

    // ── Device discovery against the scripted peers ───────────────────────────
    let policy = DiscoveryPolicy {
        poll_order: config.engine.parsed_poll_order(),
        ..DiscoveryPolicy::default()
    };
    scheduler.start(Box::new(DeviceDiscoveryAction::new(policy)));

    // The scripted peers 4 and 5 acknowledge the poll.
    let acknowledged: Vec<LogicalAddress> = bus
        .take_polls()
        .into_iter()
        .flat_map(|(_, addresses, _)| addresses)
        .filter(|a| matches!(a.raw(), 4 | 5))
        .collect();
    if let Some(token) = bus.last_poll_token() {
        scheduler.on_poll_result(token, &acknowledged);
    }
    pump_scripted_peers(&bus, &mut scheduler);

    // ── Audio capability negotiation with the audio system ────────────────────
    let audio_system = LogicalAddress::AUDIO_SYSTEM;
    scheduler.start(Box::new(AudioCapabilityAction::new(audio_system)));
    pump_scripted_peers(&bus, &mut scheduler);

    // Nothing scripted left; deliver any timer that slipped through.
    while let Ok(token) = timer_rx.try_recv() {
        scheduler.dispatch_timer(token);
    }

    while let Ok(event) = events.try_recv() {
        info!("engine event: {event:?}");
    }

    info!("CEC feature-negotiation engine stopped");
    Ok(())
}

/// Answers engine queries on behalf of the scripted peers until the bus
/// falls silent.
fn pump_scripted_peers(bus: &ScriptedBus, scheduler: &mut ActionScheduler) {
    loop {
        let sent = bus.take_sent();
        if sent.is_empty() {
            return;
        }
        for query in sent {
            if let Some(reply) = scripted_reply(&query) {
                scheduler.dispatch(&reply);
            }
        }
    }
}

/// The scripted peers' protocol side: peer 4 is a playback device on port 1,
/// peer 5 an audio system on port 2 supporting LPCM and AC-3.
fn scripted_reply(query: &CecFrame) -> Option<CecFrame> {
    let local = LogicalAddress::TV;
    let peer = query.destination();
    match (peer.raw(), query.opcode()) {
        (4, Opcode::GivePhysicalAddress) => Some(CecFrame::report_physical_address(
            peer,
            PhysicalAddress::new(0x1000),
            DeviceType::Playback,
        )),
        (4, Opcode::GiveOsdName) => CecFrame::set_osd_name(peer, local, "BluRay").ok(),
        (4, Opcode::GiveDeviceVendorId) => Some(CecFrame::device_vendor_id(peer, 0x00_1234)),
        (5, Opcode::GivePhysicalAddress) => Some(CecFrame::report_physical_address(
            peer,
            PhysicalAddress::new(0x3000),
            DeviceType::AudioSystem,
        )),
        (5, Opcode::GiveOsdName) => CecFrame::set_osd_name(peer, local, "Soundbar").ok(),
        (5, Opcode::GiveDeviceVendorId) => Some(CecFrame::device_vendor_id(peer, 0x00_5678)),
        (5, Opcode::RequestShortAudioDescriptor) => {
            let mut descriptors = Vec::new();
            descriptors.extend_from_slice(&encode_descriptor(AudioFormat::Lpcm, 2, 0x07, 0x01));
            descriptors.extend_from_slice(&encode_descriptor(AudioFormat::Ac3, 6, 0x07, 0x50));
            CecFrame::report_short_audio_descriptor(peer, local, descriptors).ok()
        }
        _ => None,
    }
}
