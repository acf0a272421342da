//! Scripted transfer double for tests.
//!
//! [`MockTransfer`] records every fetch the orchestrator asks for and lets
//! the test decide each attempt's outcome, from whichever thread it likes.
//! Outcomes are delivered through the recorded sink exactly the way a real
//! backend would deliver them.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use super::{Artifact, FetchEvents, FetchHandle, Transfer};

struct Attempt {
    uri: String,
    // Taken on delivery so each attempt reports at most one terminal.
    events: Option<Arc<dyn FetchEvents>>,
    cancelled: Arc<AtomicBool>,
}

/// A [`Transfer`] whose outcomes are driven by the test.
#[derive(Default)]
pub struct MockTransfer {
    attempts: Mutex<Vec<Attempt>>,
}

impl MockTransfer {
    /// Creates an idle mock.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Every URI fetched so far, in request order.
    pub fn requested_uris(&self) -> Vec<String> {
        self.attempts
            .lock()
            .unwrap()
            .iter()
            .map(|attempt| attempt.uri.clone())
            .collect()
    }

    /// Number of attempts whose outcome has not been delivered yet.
    pub fn in_flight(&self) -> usize {
        self.attempts
            .lock()
            .unwrap()
            .iter()
            .filter(|attempt| attempt.events.is_some())
            .count()
    }

    /// Whether the attempt for `uri` received a cancel on its handle.
    pub fn was_cancelled(&self, uri: &str) -> bool {
        self.attempts
            .lock()
            .unwrap()
            .iter()
            .any(|attempt| attempt.uri == uri && attempt.cancelled.load(Ordering::SeqCst))
    }

    /// Completes the most recent undelivered attempt successfully.
    ///
    /// Panics if nothing is in flight.
    pub fn succeed_current(&self, artifact: Artifact) {
        let events = self.take_current_events();
        events.on_success(artifact);
    }

    /// Fails the most recent undelivered attempt.
    ///
    /// Panics if nothing is in flight.
    pub fn fail_current(&self, message: &str) {
        let events = self.take_current_events();
        events.on_failure(message.to_string());
    }

    /// Reports progress on the most recent undelivered attempt.
    pub fn progress_current(&self, current: u64, total: u64) {
        let events = {
            let attempts = self.attempts.lock().unwrap();
            attempts
                .iter()
                .rev()
                .find_map(|attempt| attempt.events.clone())
                .expect("no attempt in flight")
        };
        events.on_progress(current, total);
    }

    // The sink is invoked with the mock's own lock released: a failure
    // makes the orchestrator fetch the next candidate re-entrantly.
    fn take_current_events(&self) -> Arc<dyn FetchEvents> {
        let mut attempts = self.attempts.lock().unwrap();
        attempts
            .iter_mut()
            .rev()
            .find_map(|attempt| attempt.events.take())
            .expect("no attempt in flight")
    }
}

impl Transfer for MockTransfer {
    fn fetch(
        &self,
        uri: &str,
        _description: &str,
        events: Arc<dyn FetchEvents>,
    ) -> Arc<dyn FetchHandle> {
        let cancelled = Arc::new(AtomicBool::new(false));
        self.attempts.lock().unwrap().push(Attempt {
            uri: uri.to_string(),
            events: Some(events),
            cancelled: Arc::clone(&cancelled),
        });
        Arc::new(FlagHandle { cancelled })
    }
}

struct FlagHandle {
    cancelled: Arc<AtomicBool>,
}

impl FetchHandle for FlagHandle {
    fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }
}
