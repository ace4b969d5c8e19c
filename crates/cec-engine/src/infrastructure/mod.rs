//! Infrastructure layer for the engine.
//!
//! Contains the outward-facing adapters: bus transport doubles, the Tokio
//! timer facility, the static port topology, and file-system storage.
//!
//! **Dependency rule**: this layer may depend on `application` and `cec_core`,
//! but MUST NOT be imported by the `application` or domain layers.

pub mod bus;
pub mod storage;
pub mod timer;
pub mod topology;

pub use bus::ScriptedBus;
pub use storage::{MemoryCapabilityStore, TomlCapabilityStore};
pub use timer::{ManualTimerService, TokioTimerService};
pub use topology::StaticTopology;
