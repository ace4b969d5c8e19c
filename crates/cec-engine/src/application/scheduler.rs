//! ActionScheduler: owns the live actions and every shared collaborator,
//! and routes bus traffic, timer expiries and transport outcomes to them.
//!
//! The scheduler runs entirely on the owning device's service loop.  For
//! each dispatch it lifts the target action out of the registry, lends the
//! collaborators to it as an [`ActionContext`], and re-registers the action
//! only if it reported [`ActionStatus::Running`].

use std::collections::HashMap;

use cec_core::{CecFrame, DeviceSnapshot, LogicalAddress, Opcode};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::application::action::{
    ActionContext, ActionKind, ActionStatus, BusTransport, CapabilityStore, Consumed,
    FeatureAction, PollToken, SendResult, TimerService, TimerToken, Topology,
};
use crate::application::audio_negotiation::AudioCapabilityResult;
use crate::application::cache::ResponseCache;

/// Capacity of the outward event channel.
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Everything the engine reports to its owner.
#[derive(Debug, Clone)]
pub enum EngineEvent {
    /// One peer finished all discovery stages.
    DeviceDiscovered(DeviceSnapshot),
    /// A discovery run ended; `devices` peers survived it.
    DiscoveryComplete { devices: usize },
    /// An audio negotiation resolved to a support table.
    AudioCapabilityNegotiated(AudioCapabilityResult),
    /// A frame no action claimed, surfaced for protocol-level handling.
    UnhandledFrame(CecFrame),
}

// Builds an `ActionContext` from the scheduler's fields.  Expanded inline so
// the borrows stay disjoint from the action registry.
macro_rules! context {
    ($sched:expr, $run:expr) => {
        ActionContext {
            local_address: $sched.local_address,
            run: $run,
            transport: $sched.transport.as_mut(),
            topology: $sched.topology.as_ref(),
            timers: $sched.timers.as_mut(),
            cache: &mut $sched.cache,
            store: $sched.store.as_mut(),
            negotiated_audio: &mut $sched.negotiated_audio,
            events: &$sched.event_tx,
        }
    };
}

/// See the module docs.
pub struct ActionScheduler {
    local_address: LogicalAddress,
    /// Live actions keyed by kind, each stamped with the run id assigned
    /// when it was registered.
    actions: HashMap<ActionKind, (u64, Box<dyn FeatureAction>)>,
    /// Monotonic source of run ids; a replacement run never reuses its
    /// predecessor's id, so stale poll results are distinguishable.
    next_run: u64,
    transport: Box<dyn BusTransport>,
    topology: Box<dyn Topology>,
    timers: Box<dyn TimerService>,
    store: Box<dyn CapabilityStore>,
    cache: ResponseCache,
    /// Last raw negotiated audio payload, survives individual runs.
    negotiated_audio: Option<Vec<u8>>,
    event_tx: mpsc::Sender<EngineEvent>,
}

impl ActionScheduler {
    /// Creates the scheduler and the channel its events arrive on.
    pub fn new(
        local_address: LogicalAddress,
        transport: Box<dyn BusTransport>,
        topology: Box<dyn Topology>,
        timers: Box<dyn TimerService>,
        store: Box<dyn CapabilityStore>,
    ) -> (Self, mpsc::Receiver<EngineEvent>) {
        let (event_tx, event_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let scheduler = ActionScheduler {
            local_address,
            actions: HashMap::new(),
            next_run: 0,
            transport,
            topology,
            timers,
            store,
            cache: ResponseCache::default(),
            negotiated_audio: None,
            event_tx,
        };
        (scheduler, event_rx)
    }

    pub fn local_address(&self) -> LogicalAddress {
        self.local_address
    }

    /// Whether an action of `kind` is currently registered.
    pub fn is_running(&self, kind: ActionKind) -> bool {
        self.actions.contains_key(&kind)
    }

    /// Registers and starts `action`.  A live action of the same kind is
    /// cancelled and replaced; an action that finishes synchronously in
    /// `start` is never registered.
    pub fn start(&mut self, mut action: Box<dyn FeatureAction>) {
        let kind = action.kind();
        if let Some((previous_run, mut previous)) = self.actions.remove(&kind) {
            debug!("replacing running {kind:?} action (run {previous_run})");
            let mut cx = context!(self, previous_run);
            previous.cancel(&mut cx);
        }
        let run = self.next_run;
        self.next_run += 1;
        let status = {
            let mut cx = context!(self, run);
            action.start(&mut cx)
        };
        if status == ActionStatus::Running {
            self.actions.insert(kind, (run, action));
        }
    }

    /// Offers an incoming frame to the live actions, cacheable replies are
    /// memoised first.  Returns `true` if some action claimed the frame;
    /// otherwise the frame is surfaced as [`EngineEvent::UnhandledFrame`].
    pub fn dispatch(&mut self, frame: &CecFrame) -> bool {
        self.cache.put(frame);

        let kinds: Vec<ActionKind> = self.actions.keys().copied().collect();
        for kind in kinds {
            let Some((run, mut action)) = self.actions.remove(&kind) else {
                continue;
            };
            let (consumed, status) = {
                let mut cx = context!(self, run);
                action.process_frame(&mut cx, frame)
            };
            if status == ActionStatus::Running {
                self.actions.insert(kind, (run, action));
            }
            if consumed == Consumed::Yes {
                return true;
            }
        }

        debug!("no action claimed {frame}");
        self.emit(EngineEvent::UnhandledFrame(frame.clone()));
        false
    }

    /// Delivers a fired timer to the action that armed it.  Tokens of
    /// departed actions are ignored.
    pub fn dispatch_timer(&mut self, token: TimerToken) {
        let Some((run, mut action)) = self.actions.remove(&token.kind) else {
            debug!("timer {token:?} fired for a departed action");
            return;
        };
        let status = {
            let mut cx = context!(self, run);
            action.handle_timer(&mut cx, &token)
        };
        if status == ActionStatus::Running {
            self.actions.insert(token.kind, (run, action));
        }
    }

    /// Delivers the acknowledged set of an address-range poll.  The token is
    /// the one the transport was handed when the poll was issued; results
    /// from a superseded run are dropped here.
    pub fn on_poll_result(&mut self, token: PollToken, acknowledged: &[LogicalAddress]) {
        let Some((run, mut action)) = self.actions.remove(&token.kind) else {
            debug!("poll result {token:?} for a departed action");
            return;
        };
        if run != token.run {
            debug!("poll result {token:?} from a superseded run, current is {run}");
            self.actions.insert(token.kind, (run, action));
            return;
        }
        let status = {
            let mut cx = context!(self, run);
            action.on_poll_result(&mut cx, acknowledged)
        };
        if status == ActionStatus::Running {
            self.actions.insert(token.kind, (run, action));
        }
    }

    /// Delivers a transport-level send outcome to every live action.
    pub fn on_send_result(&mut self, opcode: Opcode, result: SendResult) {
        let kinds: Vec<ActionKind> = self.actions.keys().copied().collect();
        for kind in kinds {
            let Some((run, mut action)) = self.actions.remove(&kind) else {
                continue;
            };
            let status = {
                let mut cx = context!(self, run);
                action.on_send_result(&mut cx, opcode, result)
            };
            if status == ActionStatus::Running {
                self.actions.insert(kind, (run, action));
            }
        }
    }

    /// Cancels every live action without emitting completion events.
    pub fn cancel_all(&mut self) {
        let kinds: Vec<ActionKind> = self.actions.keys().copied().collect();
        for kind in kinds {
            if let Some((run, mut action)) = self.actions.remove(&kind) {
                let mut cx = context!(self, run);
                action.cancel(&mut cx);
            }
        }
    }

    fn emit(&self, event: EngineEvent) {
        if let Err(e) = self.event_tx.try_send(event) {
            warn!("engine event dropped: {e}");
        }
    }
}
