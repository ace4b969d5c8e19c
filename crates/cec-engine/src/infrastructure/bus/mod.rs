//! Bus transport adapters.
//!
//! The real link layer lives behind the [`BusTransport`] trait in the
//! application layer; this module provides the scripted double used by the
//! tests and the demo binary.
//!
//! [`BusTransport`]: crate::application::action::BusTransport

pub mod scripted;

pub use scripted::ScriptedBus;
