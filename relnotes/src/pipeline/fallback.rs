//! Ordered-fallback fetch orchestration.
//!
//! A [`FallbackFetch`] owns the candidate queue for one request and drives
//! the transfer boundary through it: one fetch in flight at a time, next
//! candidate on failure, final failure on exhaustion. It is the sink for
//! the transfer's callbacks (which may arrive from any thread) and
//! marshals every parent-facing callback onto the control thread through
//! the dispatcher.
//!
//! State discipline: the candidate queue, the in-flight handle and the
//! `started`/`finished` flags live behind one mutex. The parent sink, the
//! transfer and the dispatcher are immutable after construction and are
//! read without the lock. The lock is released before anything is posted
//! toward the parent, so a parent callback may re-enter this object
//! without deadlocking.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, Weak};
use tracing::{debug, error, info, trace, warn};

use crate::dispatch::Dispatcher;
use crate::transfer::{Artifact, FetchEvents, FetchHandle, Transfer};

struct FetchState {
    candidates: VecDeque<String>,
    current: Option<Arc<dyn FetchHandle>>,
    started: bool,
    finished: bool,
}

/// Fallback state machine for one release-notes request.
///
/// Externally observable states: idle, started, and exactly one of
/// succeeded / failed / cancelled. Once finished, every further call is a
/// logged no-op; the parent sink sees at most one terminal callback, ever.
///
/// The submitter and the in-flight fetch registration both hold `Arc`
/// references; the object lives until the last one is released.
pub struct FallbackFetch {
    parent: Arc<dyn FetchEvents>,
    transfer: Arc<dyn Transfer>,
    dispatcher: Dispatcher,
    description: String,
    state: Mutex<FetchState>,
    // Handed to the transfer as the sink of each fetch; upgradable for as
    // long as any caller can reach us.
    weak_self: Weak<FallbackFetch>,
}

impl FallbackFetch {
    pub(crate) fn new(
        parent: Arc<dyn FetchEvents>,
        transfer: Arc<dyn Transfer>,
        dispatcher: Dispatcher,
        description: String,
    ) -> Arc<Self> {
        Arc::new_cyclic(|weak_self| Self {
            parent,
            transfer,
            dispatcher,
            description,
            state: Mutex::new(FetchState {
                candidates: VecDeque::new(),
                current: None,
                started: false,
                finished: false,
            }),
            weak_self: weak_self.clone(),
        })
    }

    /// Short human-readable label for this request.
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Whether a terminal state has been reached.
    pub fn is_finished(&self) -> bool {
        self.state.lock().unwrap().finished
    }

    /// Appends a candidate URI to the back of the queue.
    ///
    /// Ignored (and logged) once the fetch has finished.
    pub fn push_candidate(&self, uri: impl Into<String>) {
        let uri = uri.into();
        let mut state = self.state.lock().unwrap();

        if state.finished {
            warn!(
                uri = %uri,
                fetch = %self.description,
                "not adding candidate: the fetch is no longer active"
            );
        } else {
            info!(uri = %uri, fetch = %self.description, "adding candidate");
            state.candidates.push_back(uri);
        }
    }

    /// Starts fetching the first candidate. Idempotent; a no-op once
    /// started or finished.
    pub fn start(&self) {
        let mut state = self.state.lock().unwrap();

        if state.started {
            trace!(fetch = %self.description, "not starting: already started");
            return;
        }
        if state.finished {
            trace!(fetch = %self.description, "not starting: already finished");
            return;
        }

        // Discovery always appends the synthesized remote URI, so an empty
        // queue here means discovery never ran to completion; finalize as
        // an exhaustion failure rather than panicking.
        let Some(uri) = state.candidates.pop_front() else {
            error!(fetch = %self.description, "no candidate locations to try");
            state.finished = true;
            drop(state);
            self.deliver_failure("no candidate locations to try".to_string());
            return;
        };

        info!(uri = %uri, fetch = %self.description, "fetching the first candidate");
        state.started = true;
        state.current = Some(self.transfer.fetch(&uri, &self.description, self.sink()));
    }

    /// Cancels the request: the in-flight fetch (if any) is cancelled and
    /// no outcome is ever delivered to the parent. Safe from any thread;
    /// a no-op once finished.
    pub fn cancel(&self) {
        let mut state = self.state.lock().unwrap();

        if state.finished {
            trace!(fetch = %self.description, "not cancelling: the fetch is no longer active");
            return;
        }

        info!(fetch = %self.description, "cancelling");
        if let Some(handle) = state.current.take() {
            handle.cancel();
        }
        state.finished = true;
    }

    /// Delivers a failure through the control thread, as if the current
    /// candidate had failed.
    ///
    /// Used by discovery to report preparation errors from the worker
    /// thread; routing through the normal failure path lets any candidates
    /// that were pushed before the error still be tried.
    pub(crate) fn fail_deferred(&self, message: String) {
        let Some(this) = self.weak_self.upgrade() else {
            return;
        };
        self.dispatcher
            .post(Box::new(move || this.handle_failure(message)));
    }

    fn handle_success(&self, artifact: Artifact) {
        let mut state = self.state.lock().unwrap();

        if state.finished {
            trace!(
                fetch = %self.description,
                "not signaling success: the fetch is no longer active"
            );
            return;
        }

        debug!(fetch = %self.description, artifact = ?artifact.path(), "fetch succeeded");
        state.current = None;
        state.finished = true;
        drop(state);

        self.deliver_success(artifact);
    }

    fn handle_failure(&self, message: String) {
        let mut state = self.state.lock().unwrap();

        if state.finished {
            trace!(
                fetch = %self.description,
                "not signaling failure: the fetch is no longer active"
            );
            return;
        }

        match state.candidates.pop_front() {
            None => {
                error!(
                    fetch = %self.description,
                    error = %message,
                    "all candidates exhausted"
                );
                state.current = None;
                state.finished = true;
                drop(state);

                self.deliver_failure(message);
            }
            Some(uri) => {
                // Recovered locally; only the last candidate's message can
                // ever reach the parent.
                debug!(
                    fetch = %self.description,
                    error = %message,
                    "candidate failed"
                );
                info!(uri = %uri, fetch = %self.description, "falling back to the next candidate");
                state.current = Some(self.transfer.fetch(&uri, &self.description, self.sink()));
            }
        }
    }

    fn handle_progress(&self, current: u64, total: u64) {
        {
            let state = self.state.lock().unwrap();
            if state.finished {
                trace!(
                    fetch = %self.description,
                    "dropping progress: the fetch is no longer active"
                );
                return;
            }
        }
        self.deliver_progress(current, total);
    }

    fn sink(&self) -> Arc<dyn FetchEvents> {
        self.weak_self
            .upgrade()
            .expect("sink requested on a live FallbackFetch")
    }

    fn deliver_success(&self, artifact: Artifact) {
        let parent = Arc::clone(&self.parent);
        self.dispatcher
            .post(Box::new(move || parent.on_success(artifact)));
    }

    fn deliver_failure(&self, message: String) {
        let parent = Arc::clone(&self.parent);
        self.dispatcher
            .post(Box::new(move || parent.on_failure(message)));
    }

    fn deliver_progress(&self, current: u64, total: u64) {
        let parent = Arc::clone(&self.parent);
        self.dispatcher
            .post(Box::new(move || parent.on_progress(current, total)));
    }
}

impl FetchEvents for FallbackFetch {
    fn on_success(&self, artifact: Artifact) {
        self.handle_success(artifact);
    }

    fn on_failure(&self, message: String) {
        self.handle_failure(message);
    }

    fn on_progress(&self, current: u64, total: u64) {
        self.handle_progress(current, total);
    }
}

impl FetchHandle for FallbackFetch {
    fn cancel(&self) {
        FallbackFetch::cancel(self);
    }
}

impl std::fmt::Debug for FallbackFetch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock().unwrap();
        f.debug_struct("FallbackFetch")
            .field("description", &self.description)
            .field("started", &state.started)
            .field("finished", &state.finished)
            .field("candidates", &state.candidates.len())
            .finish()
    }
}
