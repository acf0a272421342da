//! relnotes CLI - fetch the release notes of one package.
//!
//! Builds a pipeline with the bundled local-file transfer backend, submits
//! a single request, drives the control queue until the request reaches a
//! terminal outcome, and writes the fetched notes to stdout or a file.

use clap::Parser;
use relnotes::config::PipelineConfig;
use relnotes::dispatch::ControlQueue;
use relnotes::pipeline::NotesPipeline;
use relnotes::request::NotesRequest;
use relnotes::store::{FsProbe, StoreLifecycle, TableStore};
use relnotes::transfer::{Artifact, FileTransfer};
use std::path::PathBuf;
use std::process;
use std::sync::{Arc, Mutex};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "relnotes")]
#[command(version = relnotes::VERSION)]
#[command(about = "Fetch the release notes of a package", long_about = None)]
struct Args {
    /// Source package name
    source_package: String,

    /// Source version (an epoch prefix is allowed and stripped)
    source_version: String,

    /// Archive section the package belongs to
    #[arg(long, default_value = "main")]
    section: String,

    /// Name to show in log messages (defaults to the source package)
    #[arg(long)]
    display_name: Option<String>,

    /// Root URL of the remote release-notes archive
    #[arg(long)]
    server: Option<String>,

    /// Directory probed for locally installed release notes
    #[arg(long)]
    doc_root: Option<PathBuf>,

    /// Write the notes here instead of stdout
    #[arg(long)]
    output: Option<PathBuf>,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    tracing::debug!(version = relnotes::VERSION, "starting the relnotes CLI");

    let mut config = PipelineConfig::default();
    if let Some(server) = args.server {
        config = config.with_server_root(server);
    }
    if let Some(doc_root) = args.doc_root {
        config = config.with_doc_root(doc_root);
    }

    let transfer = match FileTransfer::new() {
        Ok(transfer) => transfer,
        Err(err) => {
            eprintln!("Error creating the transfer backend: {}", err);
            process::exit(1);
        }
    };

    let (mut queue, dispatcher) = ControlQueue::new();
    let pipeline = NotesPipeline::new(
        config,
        Arc::new(TableStore::new()),
        Arc::new(FsProbe),
        Arc::new(transfer),
        dispatcher,
    );

    let lifecycle = StoreLifecycle::new();
    pipeline.attach_lifecycle(&lifecycle);
    lifecycle.source_available();

    let display_name = args
        .display_name
        .unwrap_or_else(|| args.source_package.clone());
    let request = NotesRequest::new(
        args.source_package,
        args.source_version,
        args.section,
        display_name,
    );

    let outcome: Arc<Mutex<Option<Result<Artifact, String>>>> = Arc::new(Mutex::new(None));
    let success_slot = Arc::clone(&outcome);
    let failure_slot = Arc::clone(&outcome);

    let _handle = pipeline.submit_with(
        request,
        move |artifact| {
            *success_slot.lock().unwrap() = Some(Ok(artifact));
        },
        move |message| {
            *failure_slot.lock().unwrap() = Some(Err(message));
        },
    );

    // Drive the control thread until the terminal callback has run.
    while outcome.lock().unwrap().is_none() {
        if !queue.run_one() {
            break;
        }
    }

    lifecycle.source_unavailable();

    let outcome = outcome.lock().unwrap().take();
    match outcome {
        Some(Ok(artifact)) => {
            if artifact.is_compressed() {
                eprintln!("Note: the notes are gzip-compressed; writing raw bytes");
            }
            if let Err(err) = write_artifact(&artifact, args.output.as_deref()) {
                eprintln!("Error writing the fetched notes: {}", err);
                process::exit(1);
            }
        }
        Some(Err(message)) => {
            eprintln!("Error fetching the release notes: {}", message);
            process::exit(1);
        }
        None => {
            eprintln!("Error: the pipeline shut down before completing the request");
            process::exit(1);
        }
    }
}

fn write_artifact(artifact: &Artifact, output: Option<&std::path::Path>) -> std::io::Result<()> {
    match output {
        Some(path) => {
            std::fs::copy(artifact.path(), path)?;
        }
        None => {
            let mut file = std::fs::File::open(artifact.path())?;
            std::io::copy(&mut file, &mut std::io::stdout().lock())?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_parse_minimal_invocation() {
        let args = Args::parse_from(["relnotes", "hello", "2.10-2"]);
        assert_eq!(args.source_package, "hello");
        assert_eq!(args.source_version, "2.10-2");
        assert_eq!(args.section, "main");
        assert!(args.display_name.is_none());
    }
}
