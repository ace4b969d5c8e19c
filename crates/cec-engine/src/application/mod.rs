//! Application layer: the feature-negotiation actions and the scheduler
//! that drives them.

pub mod action;
pub mod audio_negotiation;
pub mod cache;
pub mod discovery;
pub mod scheduler;

pub use action::{
    ActionContext, ActionKind, ActionStatus, BusTransport, CapabilityStore, Consumed,
    FeatureAction, PollToken, SendResult, StoreError, TimerService, TimerToken, Topology,
};
pub use audio_negotiation::{AudioCapabilityAction, AudioCapabilityResult};
pub use cache::ResponseCache;
pub use discovery::{DeviceDiscoveryAction, DiscoveryPolicy, PollOrder, ProbeStage};
pub use scheduler::{ActionScheduler, EngineEvent};
