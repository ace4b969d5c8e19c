//! Scripted bus transport for tests and the demo binary.
//!
//! Records every frame and poll the engine issues, so a test can play the
//! peers' side of a negotiation by inspecting the recorded traffic and
//! feeding replies back through the scheduler.

use std::sync::{Arc, Mutex};

use cec_core::{CecFrame, LogicalAddress};

use crate::application::action::{BusTransport, PollToken};

#[derive(Default)]
struct Inner {
    sent: Vec<CecFrame>,
    polls: Vec<(PollToken, Vec<LogicalAddress>, u8)>,
    last_token: Option<PollToken>,
}

/// A recording [`BusTransport`].  Clones share the recorded traffic, so a
/// test keeps one handle while the scheduler owns another.
#[derive(Clone, Default)]
pub struct ScriptedBus {
    inner: Arc<Mutex<Inner>>,
}

impl ScriptedBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drains and returns the frames sent since the last call.
    pub fn take_sent(&self) -> Vec<CecFrame> {
        std::mem::take(&mut self.inner.lock().expect("lock poisoned").sent)
    }

    /// Drains and returns the polls issued since the last call.
    pub fn take_polls(&self) -> Vec<(PollToken, Vec<LogicalAddress>, u8)> {
        std::mem::take(&mut self.inner.lock().expect("lock poisoned").polls)
    }

    /// Token of the most recent poll, kept across `take_polls` so replies
    /// can be routed back with it.
    pub fn last_poll_token(&self) -> Option<PollToken> {
        self.inner.lock().expect("lock poisoned").last_token
    }

    /// Number of frames sent and not yet drained.
    pub fn sent_count(&self) -> usize {
        self.inner.lock().expect("lock poisoned").sent.len()
    }
}

impl BusTransport for ScriptedBus {
    fn send(&mut self, frame: CecFrame) {
        self.inner.lock().expect("lock poisoned").sent.push(frame);
    }

    fn poll(&mut self, token: PollToken, addresses: Vec<LogicalAddress>, retries: u8) {
        let mut inner = self.inner.lock().expect("lock poisoned");
        inner.last_token = Some(token);
        inner.polls.push((token, addresses, retries));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_recorded_traffic() {
        let bus = ScriptedBus::new();
        let mut handle = bus.clone();
        handle.send(CecFrame::give_osd_name(
            LogicalAddress::new(0).unwrap(),
            LogicalAddress::new(4).unwrap(),
        ));
        assert_eq!(bus.sent_count(), 1);
        assert_eq!(bus.take_sent().len(), 1);
        assert_eq!(bus.sent_count(), 0);
    }
}
