//! DeviceDiscoveryAction: walks the peer address space and negotiates the
//! identity of every device that acknowledges a poll.
//!
//! The run has two phases.  First an address-range poll collects the set of
//! live peers.  Then each peer is driven independently through three ordered
//! stages (physical address, display name, vendor id) with a per-stage
//! timer and a bounded retry budget.  Peers that exhaust the budget are
//! dropped from the result set; explicit rejections and malformed replies
//! resolve to documented fallback values and still advance the peer.
//!
//! Stage sequencing differences between device variants are a
//! [`DiscoveryPolicy`] (poll order, skipped stages) injected at construction,
//! not a subclass.

use std::time::Duration;

use cec_core::{
    protocol::codec::{read_osd_name, read_physical_address, read_vendor_id},
    CecFrame, DeviceSnapshot, DeviceType, LogicalAddress, Opcode, PhysicalAddress, PortId,
    VENDOR_ID_UNKNOWN,
};
use tracing::{debug, info, warn};

use crate::application::action::{
    ActionContext, ActionKind, ActionStatus, Consumed, FeatureAction, PollToken, TimerToken,
};
use crate::application::scheduler::EngineEvent;

/// How many times a stage query is retried after its first timeout before the
/// peer is dropped from the run.
pub const RETRY_BUDGET: u8 = 5;

/// How long each stage waits for a matching reply.
pub const STAGE_TIMEOUT: Duration = Duration::from_millis(2000);

/// Link-layer retries per polled address.
const POLL_RETRIES: u8 = 1;

// ── Policy ────────────────────────────────────────────────────────────────────

/// Iteration order of the address-range poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PollOrder {
    Ascending,
    /// The default: high addresses answer first, matching the source device's
    /// reverse-order walk.
    #[default]
    Descending,
}

/// Injected per-variant behaviour of a discovery run.
#[derive(Debug, Clone, Default)]
pub struct DiscoveryPolicy {
    pub poll_order: PollOrder,
    /// Stages to advance through without any bus traffic.
    pub skip_stages: Vec<ProbeStage>,
}

// ── Per-peer stage machine ────────────────────────────────────────────────────

/// One sub-negotiation step for a single peer, strictly ordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeStage {
    /// Waiting for the physical-address report.
    Address,
    /// Waiting for the display-name reply.
    Name,
    /// Waiting for the vendor-id report.
    VendorId,
}

impl ProbeStage {
    fn next(self) -> Option<ProbeStage> {
        match self {
            ProbeStage::Address => Some(ProbeStage::Name),
            ProbeStage::Name => Some(ProbeStage::VendorId),
            ProbeStage::VendorId => None,
        }
    }

    /// The query opcode this stage sends.
    fn request_opcode(self) -> Opcode {
        match self {
            ProbeStage::Address => Opcode::GivePhysicalAddress,
            ProbeStage::Name => Opcode::GiveOsdName,
            ProbeStage::VendorId => Opcode::GiveDeviceVendorId,
        }
    }

    /// The reply opcode this stage waits for.
    fn expected_reply(self) -> Opcode {
        match self {
            ProbeStage::Address => Opcode::ReportPhysicalAddress,
            ProbeStage::Name => Opcode::SetOsdName,
            ProbeStage::VendorId => Opcode::DeviceVendorId,
        }
    }

    fn query(self, local: LogicalAddress, peer: LogicalAddress) -> CecFrame {
        match self {
            ProbeStage::Address => CecFrame::give_physical_address(local, peer),
            ProbeStage::Name => CecFrame::give_osd_name(local, peer),
            ProbeStage::VendorId => CecFrame::give_device_vendor_id(local, peer),
        }
    }

    /// State tag carried inside this stage's [`TimerToken`].
    fn token_stage(self) -> u8 {
        match self {
            ProbeStage::Address => 0,
            ProbeStage::Name => 1,
            ProbeStage::VendorId => 2,
        }
    }
}

/// Overall run state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RunState {
    NotStarted,
    Polling,
    DeviceNegotiation,
    Done,
}

/// Mutable per-peer record accumulated during the run.
///
/// Records live in an arena keyed by logical address; removal is expressed by
/// the `dropped` mark, never by structural mutation mid-iteration.
#[derive(Debug)]
struct DeviceProbe {
    address: LogicalAddress,
    physical_address: PhysicalAddress,
    port_id: Option<PortId>,
    device_type: Option<DeviceType>,
    vendor_id: u32,
    osd_name: Option<String>,
    stage: ProbeStage,
    /// The current stage's answer has been received (or synthesised).
    processed: bool,
    retries: u8,
    dropped: bool,
    finished: bool,
}

impl DeviceProbe {
    fn new(address: LogicalAddress) -> Self {
        DeviceProbe {
            address,
            physical_address: PhysicalAddress::INVALID,
            port_id: None,
            device_type: None,
            vendor_id: VENDOR_ID_UNKNOWN,
            osd_name: None,
            stage: ProbeStage::Address,
            processed: false,
            retries: 0,
            dropped: false,
            finished: false,
        }
    }

    fn active(&self) -> bool {
        !self.dropped && !self.finished
    }

    fn timer_token(&self) -> TimerToken {
        TimerToken {
            kind: ActionKind::DeviceDiscovery,
            stage: self.stage.token_stage(),
            peer: self.address,
        }
    }

    /// Fallback display name used on rejection or undecodable payload:
    /// derived from the device type when known, else from the address.
    fn fallback_name(&self) -> String {
        match self.device_type {
            Some(ty) => ty.default_osd_name().to_string(),
            None => format!("Device {}", self.address),
        }
    }

    fn snapshot(&self) -> DeviceSnapshot {
        DeviceSnapshot {
            logical_address: self.address,
            physical_address: self.physical_address,
            port_id: self.port_id,
            device_type: self.device_type,
            vendor_id: self.vendor_id,
            osd_name: self.osd_name.clone().unwrap_or_else(|| self.fallback_name()),
        }
    }
}

// ── The action ────────────────────────────────────────────────────────────────

/// Walks the whole peer address space; see the module docs for the shape of
/// a run.
pub struct DeviceDiscoveryAction {
    state: RunState,
    policy: DiscoveryPolicy,
    probes: Vec<DeviceProbe>,
}

impl DeviceDiscoveryAction {
    pub fn new(policy: DiscoveryPolicy) -> Self {
        DeviceDiscoveryAction {
            state: RunState::NotStarted,
            policy,
            probes: Vec::new(),
        }
    }

    fn probe_index(&self, peer: LogicalAddress) -> Option<usize> {
        self.probes
            .iter()
            .position(|p| p.address == peer && p.active())
    }

    /// Drives one probe forward until it blocks on a bus query, finishes,
    /// or is dropped.
    fn drive_probe(&mut self, cx: &mut ActionContext<'_>, idx: usize) {
        loop {
            if !self.probes[idx].active() {
                return;
            }

            if self.probes[idx].processed {
                // Current stage complete: advance or finish.
                let probe = &mut self.probes[idx];
                match probe.stage.next() {
                    Some(next) => {
                        probe.stage = next;
                        probe.processed = false;
                        probe.retries = 0;
                        continue;
                    }
                    None => {
                        probe.finished = true;
                        let snapshot = probe.snapshot();
                        info!("discovered device: {snapshot}");
                        cx.emit(EngineEvent::DeviceDiscovered(snapshot));
                        return;
                    }
                }
            }

            let stage = self.probes[idx].stage;
            let peer = self.probes[idx].address;

            // Structurally invalid target or policy-skipped stage: no query,
            // no timer, just advance.
            if peer == cx.local_address || !peer.is_device() {
                debug!("skipping {stage:?} stage for invalid target {peer}");
                self.probes[idx].processed = true;
                continue;
            }
            if self.policy.skip_stages.contains(&stage) {
                debug!("policy skips {stage:?} stage for {peer}");
                self.probes[idx].processed = true;
                continue;
            }

            // A reply the peer already volunteered short-circuits the stage.
            if let Some(cached) = cx.cache.take(peer, stage.expected_reply()) {
                debug!("cache hit for {stage:?} stage of {peer}");
                self.apply_reply(cx, idx, &cached);
                self.probes[idx].processed = true;
                continue;
            }

            // Otherwise query the peer and wait.
            let token = self.probes[idx].timer_token();
            cx.transport.send(stage.query(cx.local_address, peer));
            cx.timers.arm(token, STAGE_TIMEOUT);
            return;
        }
    }

    /// Extracts the current stage's field from `frame` into the probe.
    /// Rejections and malformed payloads resolve to the stage's fallback.
    fn apply_reply(&mut self, cx: &mut ActionContext<'_>, idx: usize, frame: &CecFrame) {
        let probe = &mut self.probes[idx];
        let rejected = frame.is_feature_abort_for(probe.stage.request_opcode());
        match probe.stage {
            ProbeStage::Address => {
                if !rejected {
                    match read_physical_address(frame.params()) {
                        Ok((pa, ty)) => {
                            probe.physical_address = pa;
                            probe.device_type = Some(ty);
                            probe.port_id = cx.topology.port_for(pa);
                        }
                        Err(e) => {
                            debug!("bad physical address report from {}: {e}", probe.address);
                        }
                    }
                }
            }
            ProbeStage::Name => {
                probe.osd_name = Some(if rejected {
                    probe.fallback_name()
                } else {
                    read_osd_name(frame.params()).unwrap_or_else(|e| {
                        debug!("undecodable name from {}: {e}", probe.address);
                        probe.fallback_name()
                    })
                });
            }
            ProbeStage::VendorId => {
                if !rejected {
                    match read_vendor_id(frame.params()) {
                        Ok(vendor) => probe.vendor_id = vendor,
                        Err(e) => debug!("bad vendor id from {}: {e}", probe.address),
                    }
                }
            }
        }
    }

    /// Completes the run once every probe is finished or dropped.
    fn finish_if_done(&mut self, cx: &mut ActionContext<'_>) -> ActionStatus {
        if self.state != RunState::DeviceNegotiation {
            return ActionStatus::Running;
        }
        if self.probes.iter().any(|p| p.active()) {
            return ActionStatus::Running;
        }
        let devices = self.probes.iter().filter(|p| p.finished).count();
        info!("device discovery complete: {devices} device(s)");
        self.state = RunState::Done;
        cx.emit(EngineEvent::DiscoveryComplete { devices });
        ActionStatus::Finished
    }
}

impl FeatureAction for DeviceDiscoveryAction {
    fn kind(&self) -> ActionKind {
        ActionKind::DeviceDiscovery
    }

    fn start(&mut self, cx: &mut ActionContext<'_>) -> ActionStatus {
        debug_assert_eq!(self.state, RunState::NotStarted);
        self.state = RunState::Polling;

        let addresses: Vec<LogicalAddress> = match self.policy.poll_order {
            PollOrder::Ascending => LogicalAddress::device_range()
                .filter(|a| *a != cx.local_address)
                .collect(),
            PollOrder::Descending => LogicalAddress::device_range()
                .rev()
                .filter(|a| *a != cx.local_address)
                .collect(),
        };
        debug!("polling {} addresses", addresses.len());
        let token = PollToken {
            kind: ActionKind::DeviceDiscovery,
            run: cx.run,
        };
        cx.transport.poll(token, addresses, POLL_RETRIES);
        ActionStatus::Running
    }

    fn on_poll_result(
        &mut self,
        cx: &mut ActionContext<'_>,
        acknowledged: &[LogicalAddress],
    ) -> ActionStatus {
        if self.state != RunState::Polling {
            return ActionStatus::Running;
        }
        if acknowledged.is_empty() {
            info!("no devices acknowledged the poll");
            self.state = RunState::Done;
            cx.emit(EngineEvent::DiscoveryComplete { devices: 0 });
            return ActionStatus::Finished;
        }

        self.state = RunState::DeviceNegotiation;
        for addr in acknowledged {
            // One record per distinct acknowledged address.
            if self.probes.iter().all(|p| p.address != *addr) {
                self.probes.push(DeviceProbe::new(*addr));
            }
        }
        for idx in 0..self.probes.len() {
            self.drive_probe(cx, idx);
        }
        self.finish_if_done(cx)
    }

    fn process_frame(
        &mut self,
        cx: &mut ActionContext<'_>,
        frame: &CecFrame,
    ) -> (Consumed, ActionStatus) {
        if self.state != RunState::DeviceNegotiation {
            return (Consumed::No, ActionStatus::Running);
        }
        // Accept only correctly-addressed traffic: directed at us, or broadcast
        // (address and vendor reports are broadcast by convention).
        if frame.destination() != cx.local_address && !frame.destination().is_broadcast() {
            return (Consumed::No, ActionStatus::Running);
        }
        let Some(idx) = self.probe_index(frame.source()) else {
            return (Consumed::No, ActionStatus::Running);
        };

        let probe = &self.probes[idx];
        let stage = probe.stage;
        let matches = frame.opcode() == stage.expected_reply()
            || frame.is_feature_abort_for(stage.request_opcode());
        if probe.processed || !matches {
            return (Consumed::No, ActionStatus::Running);
        }

        cx.timers.cancel(&probe.timer_token());
        self.apply_reply(cx, idx, frame);
        let probe = &mut self.probes[idx];
        probe.processed = true;
        probe.retries = 0;
        self.drive_probe(cx, idx);
        (Consumed::Yes, self.finish_if_done(cx))
    }

    fn handle_timer(&mut self, cx: &mut ActionContext<'_>, token: &TimerToken) -> ActionStatus {
        if self.state != RunState::DeviceNegotiation {
            return ActionStatus::Running;
        }
        let Some(idx) = self.probe_index(token.peer) else {
            return ActionStatus::Running;
        };
        let probe = &mut self.probes[idx];
        // A token armed for a superseded stage is stale: ignore it.
        if probe.stage.token_stage() != token.stage || probe.processed {
            debug!("ignoring stale timer {token:?}");
            return ActionStatus::Running;
        }

        probe.retries += 1;
        if probe.retries < RETRY_BUDGET {
            debug!(
                "{:?} stage timeout for {}, retry {}/{}",
                probe.stage, probe.address, probe.retries, RETRY_BUDGET
            );
            let query = probe.stage.query(cx.local_address, probe.address);
            let token = probe.timer_token();
            cx.transport.send(query);
            cx.timers.arm(token, STAGE_TIMEOUT);
        } else {
            warn!(
                "dropping {} after {} timeouts in {:?} stage",
                probe.address, probe.retries, probe.stage
            );
            probe.dropped = true;
        }
        self.finish_if_done(cx)
    }

    fn cancel(&mut self, cx: &mut ActionContext<'_>) {
        for probe in self.probes.iter().filter(|p| p.active()) {
            cx.timers.cancel(&probe.timer_token());
        }
        self.state = RunState::Done;
        debug!("device discovery cancelled");
    }
}
