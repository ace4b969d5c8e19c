//! The Action abstraction: one in-flight protocol exchange with its own
//! state machine, plus the collaborator traits every action works against.
//!
//! # Architecture
//!
//! An action never blocks.  Suspension is expressed as "arm a timer and
//! return"; everything the action needs to touch the outside world (bus
//! transport, timers, topology, persistence, the outward event channel) is
//! handed in per call as an [`ActionContext`], so actions own no collaborator
//! and there is no process-wide registry.  All methods run on the owning
//! device's single service loop.

use std::time::Duration;

use cec_core::{CecFrame, LogicalAddress, Opcode, PhysicalAddress, PortId};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::warn;

use crate::application::cache::ResponseCache;
use crate::application::scheduler::EngineEvent;

/// Identity of an action kind: at most one instance of each kind is live per
/// owning device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionKind {
    DeviceDiscovery,
    AudioCapability,
}

/// Whether an action wants to keep receiving events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionStatus {
    Running,
    Finished,
}

/// Whether an action claimed an incoming frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Consumed {
    Yes,
    No,
}

/// Key of a single-shot timer: the arming action's kind, a state tag, and the
/// peer the timer guards.  A fired token whose state tag no longer matches
/// the action's current state is stale and must be ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerToken {
    pub kind: ActionKind,
    pub stage: u8,
    pub peer: LogicalAddress,
}

/// Key of an address-range poll: the issuing action's kind plus its run id.
/// The transport echoes this token with the acknowledged set, so a result
/// arriving after the issuing run was superseded is recognisable as stale
/// and dropped, like a stale [`TimerToken`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PollToken {
    pub kind: ActionKind,
    pub run: u64,
}

/// Transport-level outcome of a send, reported asynchronously.
///
/// `Busy` and `Fail` are transient: the protocol-level timeout/retry policy
/// is authoritative, so actions ignore them.  `Nack` is the one exception:
/// an explicit nack of a capability request terminates that negotiation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendResult {
    Success,
    Busy,
    Fail,
    Nack,
}

/// Error type for the capability persistence collaborator.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("capability persist failed: {0}")]
    Persist(String),
}

// ── Collaborator traits ───────────────────────────────────────────────────────

/// The link-layer transport the engine sends frames through.
///
/// Both operations are fire-and-forget: send outcomes arrive later as
/// [`SendResult`]s on the service loop, and the acknowledged set of a poll
/// arrives via `ActionScheduler::on_poll_result`.
pub trait BusTransport {
    /// Queues one frame for transmission.
    fn send(&mut self, frame: CecFrame);

    /// Polls `addresses` (in the given order) for presence, retrying each
    /// up to `retries` times at the link layer.  `token` identifies the
    /// issuing run and must be echoed with the acknowledged set.
    fn poll(&mut self, token: PollToken, addresses: Vec<LogicalAddress>, retries: u8);
}

/// Read-only view of the owning device's port topology.
pub trait Topology {
    /// Maps a reported physical address to the input port it hangs off, if any.
    fn port_for(&self, address: PhysicalAddress) -> Option<PortId>;

    /// Reverse lookup used by routing consumers.
    fn physical_address_of_port(&self, port: PortId) -> Option<PhysicalAddress>;
}

/// Single-shot timer facility.  Arming an already-armed token replaces it.
pub trait TimerService {
    fn arm(&mut self, token: TimerToken, delay: Duration);
    fn cancel(&mut self, token: &TimerToken);
}

/// Persists the flattened negotiated audio capability for restart continuity.
/// Stored values are applied verbatim on restart, never re-validated.
pub trait CapabilityStore {
    fn persist_audio_capability(&mut self, flattened: &str) -> Result<(), StoreError>;
}

// ── Per-call context ──────────────────────────────────────────────────────────

/// Everything an action may touch while handling one event.
///
/// Borrowed from the scheduler for the duration of a single dispatch; actions
/// never retain any of these references.
pub struct ActionContext<'a> {
    /// The owning device's own bus address.
    pub local_address: LogicalAddress,
    /// Scheduler-assigned id of the owning action's run, carried in the
    /// [`PollToken`] of any poll this action issues.
    pub run: u64,
    pub transport: &'a mut dyn BusTransport,
    pub topology: &'a dyn Topology,
    pub timers: &'a mut dyn TimerService,
    pub cache: &'a mut ResponseCache,
    pub store: &'a mut dyn CapabilityStore,
    /// Process-global memo of the last raw negotiated capability payload.
    /// Outlives individual negotiation runs.
    pub negotiated_audio: &'a mut Option<Vec<u8>>,
    pub events: &'a mpsc::Sender<EngineEvent>,
}

impl ActionContext<'_> {
    /// Emits an event to the owner.  A full or closed channel is non-fatal;
    /// the engine never blocks on its consumer.
    pub fn emit(&self, event: EngineEvent) {
        if let Err(e) = self.events.try_send(event) {
            warn!("engine event dropped: {e}");
        }
    }
}

// ── The action trait ──────────────────────────────────────────────────────────

/// One protocol exchange's state machine.
///
/// Implementations resolve every anomaly (timeout, rejection, malformed
/// payload) into a state transition or a dropped record; nothing escapes an
/// action as an error.  Returning [`ActionStatus::Finished`] removes the
/// action from the scheduler.
pub trait FeatureAction {
    fn kind(&self) -> ActionKind;

    /// Entry point, called once when the scheduler registers the action.
    fn start(&mut self, cx: &mut ActionContext<'_>) -> ActionStatus;

    /// Offers an incoming frame.  Returns whether the frame was claimed and
    /// whether the action is still running.
    fn process_frame(
        &mut self,
        cx: &mut ActionContext<'_>,
        frame: &CecFrame,
    ) -> (Consumed, ActionStatus);

    /// Delivers a fired timer that was armed by this action.  Stale tokens
    /// (state tag mismatch) must be ignored, not re-applied.
    fn handle_timer(&mut self, cx: &mut ActionContext<'_>, token: &TimerToken) -> ActionStatus;

    /// Delivers the acknowledged address set of a previously issued poll.
    fn on_poll_result(
        &mut self,
        _cx: &mut ActionContext<'_>,
        _acknowledged: &[LogicalAddress],
    ) -> ActionStatus {
        ActionStatus::Running
    }

    /// Delivers a transport-level send outcome for `opcode`.
    fn on_send_result(
        &mut self,
        _cx: &mut ActionContext<'_>,
        _opcode: Opcode,
        _result: SendResult,
    ) -> ActionStatus {
        ActionStatus::Running
    }

    /// Cooperative cancellation: release timers, emit nothing.
    fn cancel(&mut self, cx: &mut ActionContext<'_>);
}
