//! Candidate discovery.
//!
//! Turns a request identity into the ordered candidate queue of its
//! fallback fetch: zero or more local URIs (cheap existence probes, no
//! network) followed by exactly one deterministic remote URI. Runs on the
//! worker thread; every store error is converted into a failure outcome
//! for the affected request and never escapes.

use std::sync::Arc;
use tracing::{debug, error, trace};

use super::{FallbackFetch, PipelineContext, PrepJob};
use crate::config::PipelineConfig;
use crate::request::NotesRequest;
use crate::store::StoreError;
use crate::worker::JobRunner;

/// The worker-side processor for preparation jobs.
pub(crate) struct PrepRunner {
    ctx: Arc<PipelineContext>,
}

impl PrepRunner {
    pub(crate) fn new(ctx: Arc<PipelineContext>) -> Self {
        Self { ctx }
    }
}

impl JobRunner<PrepJob> for PrepRunner {
    fn run(&self, job: PrepJob) {
        let PrepJob { request, fetch } = job;

        match discover(&self.ctx, &request, &fetch) {
            Ok(()) => {
                trace!(fetch = %fetch.description(), "discovery complete; starting the fetch");
                fetch.start();
            }
            Err(err) => {
                error!(
                    request = %request,
                    error = %err,
                    "failed to prepare the release-notes fetch"
                );
                fetch.fail_deferred(format!("failed to prepare the fetch: {err}"));
            }
        }
    }
}

/// Probes local storage and synthesizes the remote URI, appending
/// candidates in preference order.
fn discover(
    ctx: &PipelineContext,
    request: &NotesRequest,
    fetch: &FallbackFetch,
) -> Result<(), StoreError> {
    if ctx.store.has_source_records()? {
        push_local_candidates(ctx, request, fetch)?;
    } else {
        trace!(
            request = %request,
            "skipping local probes: the store has no source records"
        );
    }

    // The remote URI is appended even when local copies were found, so the
    // queue is never empty after a successful discovery.
    let uri = remote_uri(&ctx.config, request);
    trace!(uri = %uri, request = %request, "synthesized remote candidate");
    fetch.push_candidate(uri);

    Ok(())
}

/// Checks each binary built from the request's source package: if it is
/// installed from the archive at exactly the requested source version, the
/// release notes it shipped with are valid candidates. The plain file is
/// preferred over the compressed variant.
fn push_local_candidates(
    ctx: &PipelineContext,
    request: &NotesRequest,
    fetch: &FallbackFetch,
) -> Result<(), StoreError> {
    let Some(record) = ctx.store.source_record(request.source_package())? else {
        trace!(request = %request, "no source record; relying on the remote candidate");
        return Ok(());
    };

    for binary in &record.binaries {
        let Some(installed) = ctx.store.installed(binary)? else {
            continue;
        };
        if !installed.from_archive {
            continue;
        }
        if installed.source_package != request.source_package()
            || installed.source_version != request.source_version()
        {
            continue;
        }

        // The installed copy could still disagree with what the archive
        // would serve if the package changed underneath us mid-probe;
        // that corner is accepted rather than re-verified here.
        let plain = ctx.config.doc_root.join(binary).join("changelog.Debian");
        if ctx.probe.exists(&plain) {
            debug!(path = %plain.display(), request = %request, "found local release notes");
            fetch.push_candidate(format!("file://{}", plain.display()));
        }

        let compressed = ctx
            .config
            .doc_root
            .join(binary)
            .join("changelog.Debian.gz");
        if ctx.probe.exists(&compressed) {
            debug!(path = %compressed.display(), request = %request, "found compressed local release notes");
            fetch.push_candidate(format!("gzip://{}", compressed.display()));
        }
    }

    Ok(())
}

/// Builds the deterministic remote URI for a request.
///
/// Layout: `{server}/{archive}/{prefix}/{source}/{source}_{version}_changelog`,
/// where `archive` is the part of the section before the first `/` (or
/// `main` for unqualified sections), `prefix` is the pool prefix of the
/// source name (`libfoo` → `libf`, otherwise the first character), and
/// any epoch is stripped from the version.
pub(crate) fn remote_uri(config: &PipelineConfig, request: &NotesRequest) -> String {
    let section = request.section();
    let archive = match section.split_once('/') {
        Some((archive, _)) => archive,
        None => "main",
    };

    let source = request.source_package();
    let prefix: String = if source.len() > 3 && source.starts_with("lib") {
        source.chars().take(4).collect()
    } else {
        source.chars().take(1).collect()
    };

    let version = request.source_version();
    let version = match version.split_once(':') {
        Some((_, rest)) => rest,
        None => version,
    };

    format!(
        "{}/{}/{}/{}/{}_{}_changelog",
        config.server_root, archive, prefix, source, source, version
    )
}
