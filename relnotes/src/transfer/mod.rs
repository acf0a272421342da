//! Single-fetch transfer boundary.
//!
//! The pipeline core never moves bytes itself. It hands one URI at a time
//! to a [`Transfer`] implementation together with a [`FetchEvents`] sink
//! and gets back a cancellable [`FetchHandle`]. Everything else (protocol,
//! concurrency, retry-free single attempts) is the backend's business.
//!
//! # Contract
//!
//! - `fetch` begins an asynchronous attempt and returns the handle
//!   immediately. It must **not** invoke the sink from inside the call:
//!   the orchestrator issues fetches while holding its own state lock.
//! - Sink methods may be invoked from any thread.
//! - At most one terminal call (`on_success` or `on_failure`) is made per
//!   `fetch`, and none after a `cancel` on the handle has been observed.
//!
//! The bundled [`FileTransfer`] serves `file://` and `gzip://` URIs; it is
//! the "last mile" glue for locally discovered candidates and for tests.
//! Network schemes are deliberately left to the embedding application.

mod artifact;
mod file;
pub mod mock;

pub use artifact::Artifact;
pub use file::{FileTransfer, DEFAULT_CHUNK_SIZE};
pub use mock::MockTransfer;

use std::sync::Arc;
use thiserror::Error;

/// Errors raised by a single transfer attempt.
///
/// The orchestrator only ever sees these stringified through
/// [`FetchEvents::on_failure`]; the enum exists so backends and tests can
/// match on causes.
#[derive(Debug, Error)]
pub enum TransferError {
    /// The URI scheme is not handled by this backend.
    #[error("unsupported URI scheme in {0}")]
    UnsupportedScheme(String),

    /// Reading the source or writing the artifact failed.
    #[error("transfer I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// The attempt was cancelled before completion.
    #[error("transfer cancelled")]
    Cancelled,
}

/// Callbacks invoked in response to events on one fetch.
///
/// Implemented both by callers (the parent sink handed to submission,
/// where every method runs on the control thread) and by the orchestrator
/// itself (as the sink of the underlying transfer, where calls may arrive
/// from any thread).
pub trait FetchEvents: Send + Sync + 'static {
    /// The fetch completed; `artifact` holds the retrieved bytes.
    fn on_success(&self, artifact: Artifact);

    /// The fetch failed. The default implementation does nothing.
    fn on_failure(&self, _message: String) {}

    /// Some bytes arrived. The default implementation does nothing.
    fn on_progress(&self, _current: u64, _total: u64) {}
}

/// Handle to one in-flight fetch.
pub trait FetchHandle: Send + Sync + 'static {
    /// Cancels the fetch. Safe to call from any thread, any number of
    /// times; the attempt may still complete internally, but no sink
    /// callback is delivered once the cancellation has been observed.
    fn cancel(&self);
}

/// Starts single-URI fetch attempts.
pub trait Transfer: Send + Sync + 'static {
    /// Begins fetching `uri`, reporting to `events`.
    ///
    /// `description` is a short human-readable label used for logging.
    fn fetch(
        &self,
        uri: &str,
        description: &str,
        events: Arc<dyn FetchEvents>,
    ) -> Arc<dyn FetchHandle>;
}
