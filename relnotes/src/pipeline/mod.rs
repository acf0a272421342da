//! The release-notes fetch pipeline.
//!
//! # Architecture
//!
//! ```text
//! control thread                worker thread            transfer threads
//! ──────────────                ─────────────            ────────────────
//! NotesPipeline::submit ──PrepJob──► discovery
//!                                    probe local copies
//!                                    push candidates ──► FallbackFetch
//!                                    fetch.start() ─────► Transfer::fetch
//!                                                            │ success /
//!                                                            ▼ failure
//! ControlQueue::drain ◄────────── Dispatcher::post ◄── FallbackFetch
//! parent FetchEvents run here
//! ```
//!
//! Submissions happen on the control thread; preparation runs on the
//! worker thread; transfer callbacks arrive from wherever the backend
//! pleases; every parent-facing callback is marshalled back onto the
//! control thread.

mod discovery;
mod fallback;

pub use fallback::FallbackFetch;

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tracing::debug;

use crate::config::PipelineConfig;
use crate::dispatch::Dispatcher;
use crate::request::NotesRequest;
use crate::store::{LocalProbe, MetadataStore, StoreLifecycle};
use crate::transfer::{Artifact, FetchEvents, Transfer};
use crate::worker::JobWorker;

/// Collaborators shared between submission and the worker.
pub(crate) struct PipelineContext {
    pub(crate) store: Arc<dyn MetadataStore>,
    pub(crate) probe: Arc<dyn LocalProbe>,
    pub(crate) transfer: Arc<dyn Transfer>,
    pub(crate) config: PipelineConfig,
}

/// One unit of background preparation: a request identity paired with the
/// fallback fetch it feeds.
pub struct PrepJob {
    pub(crate) request: NotesRequest,
    pub(crate) fetch: Arc<FallbackFetch>,
}

impl fmt::Display for PrepJob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "prepare(source_package = {}, source_version = {}, section = {}, display_name = {})",
            self.request.source_package(),
            self.request.source_version(),
            self.request.section(),
            self.request.display_name(),
        )
    }
}

/// Entry point for release-notes retrieval.
///
/// Owns the preparation worker and wires the collaborators together. One
/// pipeline serves any number of concurrent requests; each request gets
/// its own [`FallbackFetch`] handle.
pub struct NotesPipeline {
    worker: Arc<JobWorker<PrepJob>>,
    dispatcher: Dispatcher,
    ctx: Arc<PipelineContext>,
    lifecycle_attached: AtomicBool,
}

impl NotesPipeline {
    /// Wires a pipeline together. The worker is not started; call
    /// [`attach_lifecycle`] (preferred) or [`start`] explicitly.
    ///
    /// [`attach_lifecycle`]: NotesPipeline::attach_lifecycle
    /// [`start`]: NotesPipeline::start
    pub fn new(
        config: PipelineConfig,
        store: Arc<dyn MetadataStore>,
        probe: Arc<dyn LocalProbe>,
        transfer: Arc<dyn Transfer>,
        dispatcher: Dispatcher,
    ) -> Self {
        let ctx = Arc::new(PipelineContext {
            store,
            probe,
            transfer,
            config,
        });
        let runner = Arc::new(discovery::PrepRunner::new(Arc::clone(&ctx)));
        let worker = Arc::new(JobWorker::new("relnotes-prep", runner));

        Self {
            worker,
            dispatcher,
            ctx,
            lifecycle_attached: AtomicBool::new(false),
        }
    }

    /// Subscribes the preparation worker to the data-source lifecycle:
    /// started on `source_available`, stopped on `source_unavailable`.
    ///
    /// Attaching more than once is a no-op; preparation must not end up
    /// subscribed twice.
    pub fn attach_lifecycle(&self, lifecycle: &StoreLifecycle) {
        if self.lifecycle_attached.swap(true, Ordering::SeqCst) {
            debug!("pipeline already attached to a data-source lifecycle");
            return;
        }

        let start_worker = Arc::clone(&self.worker);
        let stop_worker = Arc::clone(&self.worker);
        lifecycle.subscribe(
            move || start_worker.start(),
            move || stop_worker.stop(),
        );
    }

    /// Starts the preparation worker directly.
    pub fn start(&self) {
        self.worker.start();
    }

    /// Stops the preparation worker directly.
    pub fn stop(&self) {
        self.worker.stop();
    }

    /// Whether the preparation worker is running.
    pub fn is_running(&self) -> bool {
        self.worker.is_running()
    }

    /// Submits a request for background preparation and fetching.
    ///
    /// Must be called on the control thread: discovery reads store state
    /// whose consistency is only guaranteed while the control thread is
    /// not reconfiguring the data source.
    ///
    /// `events` receives the outcome (and progress) on the control thread.
    /// The returned handle cancels the request from any thread; keeping it
    /// is optional, the fetch proceeds regardless.
    pub fn submit(&self, request: NotesRequest, events: Arc<dyn FetchEvents>) -> Arc<FallbackFetch> {
        debug_assert!(
            self.dispatcher.on_control_thread(),
            "submit must be called on the control thread"
        );

        let description = format!("release notes of {}", request.display_name());
        let fetch = FallbackFetch::new(
            events,
            Arc::clone(&self.ctx.transfer),
            self.dispatcher.clone(),
            description,
        );

        self.worker.submit(PrepJob {
            request,
            fetch: Arc::clone(&fetch),
        });

        fetch
    }

    /// Closure-flavored [`submit`]: the callbacks run on the control
    /// thread when the request reaches a terminal outcome.
    ///
    /// [`submit`]: NotesPipeline::submit
    pub fn submit_with(
        &self,
        request: NotesRequest,
        on_success: impl FnOnce(Artifact) + Send + 'static,
        on_failure: impl FnOnce(String) + Send + 'static,
    ) -> Arc<FallbackFetch> {
        self.submit(request, Arc::new(FnEvents::new(on_success, on_failure)))
    }
}

impl fmt::Debug for NotesPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NotesPipeline")
            .field("worker", &self.worker)
            .finish_non_exhaustive()
    }
}

/// Adapts a pair of closures to the [`FetchEvents`] interface.
struct FnEvents<S, F> {
    on_success: Mutex<Option<S>>,
    on_failure: Mutex<Option<F>>,
}

impl<S, F> FnEvents<S, F> {
    fn new(on_success: S, on_failure: F) -> Self {
        Self {
            on_success: Mutex::new(Some(on_success)),
            on_failure: Mutex::new(Some(on_failure)),
        }
    }
}

impl<S, F> FetchEvents for FnEvents<S, F>
where
    S: FnOnce(Artifact) + Send + 'static,
    F: FnOnce(String) + Send + 'static,
{
    fn on_success(&self, artifact: Artifact) {
        if let Some(callback) = self.on_success.lock().unwrap().take() {
            callback(artifact);
        }
    }

    fn on_failure(&self, message: String) {
        if let Some(callback) = self.on_failure.lock().unwrap().take() {
            callback(message);
        }
    }
}
