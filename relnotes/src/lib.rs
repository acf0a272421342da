//! relnotes - multi-source release-notes retrieval for package archives
//!
//! This library fetches the release notes (changelog) of a package by
//! trying an ordered list of candidate locations until one succeeds:
//! copies already installed on the system first, a deterministic remote
//! archive URI last. Preparation runs on a background worker, fetching is
//! delegated to a pluggable transfer backend, and every completion
//! callback is delivered safely back onto the submitting thread.
//!
//! # High-Level API
//!
//! ```ignore
//! use relnotes::config::PipelineConfig;
//! use relnotes::dispatch::ControlQueue;
//! use relnotes::pipeline::NotesPipeline;
//! use relnotes::request::NotesRequest;
//! use relnotes::store::{FsProbe, StoreLifecycle, TableStore};
//! use relnotes::transfer::FileTransfer;
//! use std::sync::Arc;
//!
//! let (mut queue, dispatcher) = ControlQueue::new();
//! let pipeline = NotesPipeline::new(
//!     PipelineConfig::default(),
//!     Arc::new(TableStore::new()),
//!     Arc::new(FsProbe),
//!     Arc::new(FileTransfer::new()?),
//!     dispatcher,
//! );
//!
//! let lifecycle = StoreLifecycle::new();
//! pipeline.attach_lifecycle(&lifecycle);
//! lifecycle.source_available();
//!
//! let request = NotesRequest::new("hello", "2.10-2", "devel", "hello");
//! let handle = pipeline.submit_with(
//!     request,
//!     |artifact| println!("fetched: {}", artifact.path().display()),
//!     |message| eprintln!("failed: {message}"),
//! );
//!
//! // The callbacks run while the control thread drains its queue.
//! while queue.run_one() { /* until done */ }
//! ```

pub mod config;
pub mod dispatch;
pub mod logging;
pub mod pipeline;
pub mod request;
pub mod store;
pub mod transfer;
pub mod worker;

pub use config::PipelineConfig;
pub use pipeline::{FallbackFetch, NotesPipeline};
pub use request::NotesRequest;
pub use transfer::{Artifact, FetchEvents, FetchHandle, Transfer};

/// Version of the relnotes library and CLI.
///
/// Synchronized across the workspace; injected from `Cargo.toml` at
/// compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
