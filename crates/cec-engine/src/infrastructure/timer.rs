//! Timer facility adapters.
//!
//! [`TokioTimerService`] is the production implementation: every armed token
//! becomes a spawned sleep task that delivers the token back to the service
//! loop over a channel.  [`ManualTimerService`] is the test double: it only
//! records what is armed, and the test fires tokens by hand.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::application::action::{TimerService, TimerToken};

/// Capacity of the fired-token channel.
const TIMER_CHANNEL_CAPACITY: usize = 32;

/// Tokio-backed single-shot timers.  Re-arming a token replaces the pending
/// task; cancelling aborts it.  Fired tokens arrive on the receiver handed
/// out by [`TokioTimerService::new`] and must be routed to
/// `ActionScheduler::dispatch_timer` by the service loop.
pub struct TokioTimerService {
    tx: mpsc::Sender<TimerToken>,
    tasks: HashMap<TimerToken, JoinHandle<()>>,
}

impl TokioTimerService {
    /// Creates the service and the channel fired tokens arrive on.
    pub fn new() -> (Self, mpsc::Receiver<TimerToken>) {
        let (tx, rx) = mpsc::channel(TIMER_CHANNEL_CAPACITY);
        (
            TokioTimerService {
                tx,
                tasks: HashMap::new(),
            },
            rx,
        )
    }
}

impl TimerService for TokioTimerService {
    fn arm(&mut self, token: TimerToken, delay: Duration) {
        // Drop handles of timers that already fired.
        self.tasks.retain(|_, handle| !handle.is_finished());

        let tx = self.tx.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if tx.send(token).await.is_err() {
                debug!("timer {token:?} fired after the service loop ended");
            }
        });
        if let Some(previous) = self.tasks.insert(token, handle) {
            previous.abort();
        }
    }

    fn cancel(&mut self, token: &TimerToken) {
        if let Some(handle) = self.tasks.remove(token) {
            handle.abort();
        }
    }
}

impl Drop for TokioTimerService {
    fn drop(&mut self) {
        for handle in self.tasks.values() {
            handle.abort();
        }
    }
}

/// Recording [`TimerService`] for tests.  Clones share the armed set.
#[derive(Clone, Default)]
pub struct ManualTimerService {
    armed: Arc<Mutex<Vec<(TimerToken, Duration)>>>,
}

impl ManualTimerService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tokens currently armed, in arming order.
    pub fn armed_tokens(&self) -> Vec<TimerToken> {
        self.armed
            .lock()
            .expect("lock poisoned")
            .iter()
            .map(|(token, _)| *token)
            .collect()
    }

    pub fn is_armed(&self, token: &TimerToken) -> bool {
        self.armed
            .lock()
            .expect("lock poisoned")
            .iter()
            .any(|(t, _)| t == token)
    }

    /// Drains the armed set, returning it.
    pub fn take_armed(&self) -> Vec<(TimerToken, Duration)> {
        std::mem::take(&mut *self.armed.lock().expect("lock poisoned"))
    }
}

impl TimerService for ManualTimerService {
    fn arm(&mut self, token: TimerToken, delay: Duration) {
        let mut armed = self.armed.lock().expect("lock poisoned");
        armed.retain(|(t, _)| *t != token);
        armed.push((token, delay));
    }

    fn cancel(&mut self, token: &TimerToken) {
        self.armed
            .lock()
            .expect("lock poisoned")
            .retain(|(t, _)| t != token);
    }
}
