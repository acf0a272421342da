//! Local-file transfer backend.
//!
//! Serves `file://` (plain) and `gzip://` (compressed, delivered raw) URIs
//! by streaming the file into a temporary artifact on a small private
//! tokio runtime, reporting progress along the way. Any other scheme fails
//! the attempt, which is exactly what drives the orchestrator's fallback
//! when no network-capable backend has been plugged in.

use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use super::{Artifact, FetchEvents, FetchHandle, Transfer, TransferError};

/// Default read/write chunk size for streaming a file into its artifact.
pub const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

/// [`Transfer`] implementation for locally reachable URIs.
pub struct FileTransfer {
    runtime: tokio::runtime::Runtime,
    chunk_size: usize,
}

impl FileTransfer {
    /// Creates the backend with its own two-thread runtime.
    pub fn new() -> io::Result<Self> {
        Self::with_chunk_size(DEFAULT_CHUNK_SIZE)
    }

    /// Creates the backend with a custom streaming chunk size.
    pub fn with_chunk_size(chunk_size: usize) -> io::Result<Self> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .thread_name("relnotes-transfer")
            .enable_all()
            .build()?;
        Ok(Self {
            runtime,
            chunk_size,
        })
    }
}

impl Transfer for FileTransfer {
    fn fetch(
        &self,
        uri: &str,
        description: &str,
        events: Arc<dyn FetchEvents>,
    ) -> Arc<dyn FetchHandle> {
        let token = CancellationToken::new();
        let handle = Arc::new(TokenHandle {
            token: token.clone(),
            uri: uri.to_string(),
        });

        let uri = uri.to_string();
        let description = description.to_string();
        let chunk_size = self.chunk_size;

        self.runtime.spawn(async move {
            let outcome = run_attempt(&uri, chunk_size, &*events, &token).await;

            // A cancelled attempt delivers nothing: the handle's owner has
            // already moved on.
            if token.is_cancelled() {
                trace!(uri = %uri, fetch = %description, "attempt cancelled; suppressing callbacks");
                return;
            }

            match outcome {
                Ok(artifact) => {
                    debug!(uri = %uri, fetch = %description, "local transfer complete");
                    events.on_success(artifact);
                }
                Err(err) => {
                    debug!(uri = %uri, fetch = %description, error = %err, "local transfer failed");
                    events.on_failure(err.to_string());
                }
            }
        });

        handle
    }
}

impl std::fmt::Debug for FileTransfer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileTransfer")
            .field("chunk_size", &self.chunk_size)
            .finish()
    }
}

/// Splits a candidate URI into the on-disk path and its compression hint.
fn parse_uri(uri: &str) -> Result<(PathBuf, bool), TransferError> {
    if let Some(path) = uri.strip_prefix("file://") {
        Ok((PathBuf::from(path), false))
    } else if let Some(path) = uri.strip_prefix("gzip://") {
        Ok((PathBuf::from(path), true))
    } else {
        Err(TransferError::UnsupportedScheme(uri.to_string()))
    }
}

async fn run_attempt(
    uri: &str,
    chunk_size: usize,
    events: &dyn FetchEvents,
    token: &CancellationToken,
) -> Result<Artifact, TransferError> {
    let (path, compressed) = parse_uri(uri)?;

    let mut source = tokio::fs::File::open(&path).await?;
    let total = source.metadata().await?.len();

    let temp = tempfile::NamedTempFile::new()?;
    let mut destination = tokio::fs::File::create(temp.path()).await?;

    let mut transferred: u64 = 0;
    let mut buffer = vec![0u8; chunk_size.max(1)];
    loop {
        if token.is_cancelled() {
            return Err(TransferError::Cancelled);
        }
        let read = source.read(&mut buffer).await?;
        if read == 0 {
            break;
        }
        destination.write_all(&buffer[..read]).await?;
        transferred += read as u64;
        events.on_progress(transferred, total);
    }
    destination.flush().await?;

    Ok(Artifact::from_temp(temp.into_temp_path()).with_compressed(compressed))
}

struct TokenHandle {
    token: CancellationToken,
    uri: String,
}

impl FetchHandle for TokenHandle {
    fn cancel(&self) {
        trace!(uri = %self.uri, "cancelling local transfer");
        self.token.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::mpsc;
    use std::sync::Mutex;
    use std::time::Duration;

    enum Event {
        Success(Artifact),
        Failure(String),
        Progress(u64, u64),
    }

    struct ChannelEvents {
        tx: Mutex<mpsc::Sender<Event>>,
    }

    impl ChannelEvents {
        fn new() -> (Arc<Self>, mpsc::Receiver<Event>) {
            let (tx, rx) = mpsc::channel();
            (Arc::new(Self { tx: Mutex::new(tx) }), rx)
        }
    }

    impl FetchEvents for ChannelEvents {
        fn on_success(&self, artifact: Artifact) {
            let _ = self.tx.lock().unwrap().send(Event::Success(artifact));
        }

        fn on_failure(&self, message: String) {
            let _ = self.tx.lock().unwrap().send(Event::Failure(message));
        }

        fn on_progress(&self, current: u64, total: u64) {
            let _ = self.tx.lock().unwrap().send(Event::Progress(current, total));
        }
    }

    fn wait_terminal(rx: &mpsc::Receiver<Event>) -> Result<(Artifact, Vec<(u64, u64)>), String> {
        let mut progress = Vec::new();
        loop {
            match rx.recv_timeout(Duration::from_secs(5)).expect("event") {
                Event::Success(artifact) => return Ok((artifact, progress)),
                Event::Failure(message) => return Err(message),
                Event::Progress(current, total) => progress.push((current, total)),
            }
        }
    }

    #[test]
    fn test_parse_uri_schemes() {
        assert_eq!(
            parse_uri("file:///usr/share/doc/hello/changelog.Debian").unwrap(),
            (
                PathBuf::from("/usr/share/doc/hello/changelog.Debian"),
                false
            )
        );
        assert_eq!(
            parse_uri("gzip:///usr/share/doc/hello/changelog.Debian.gz").unwrap(),
            (
                PathBuf::from("/usr/share/doc/hello/changelog.Debian.gz"),
                true
            )
        );
        assert!(matches!(
            parse_uri("http://example.org/changelog"),
            Err(TransferError::UnsupportedScheme(_))
        ));
    }

    #[test]
    fn test_fetch_streams_file_with_progress() {
        let mut source = tempfile::NamedTempFile::new().unwrap();
        source.write_all(b"release notes body").unwrap();

        let transfer = FileTransfer::with_chunk_size(4).unwrap();
        let (events, rx) = ChannelEvents::new();
        let uri = format!("file://{}", source.path().display());
        let _handle = transfer.fetch(&uri, "notes of hello", events);

        let (artifact, progress) = wait_terminal(&rx).unwrap();
        assert!(!artifact.is_compressed());
        assert_eq!(
            std::fs::read(artifact.path()).unwrap(),
            b"release notes body"
        );
        let (last_current, last_total) = *progress.last().unwrap();
        assert_eq!(last_current, 18);
        assert_eq!(last_total, 18);
    }

    #[test]
    fn test_fetch_missing_file_fails() {
        let transfer = FileTransfer::new().unwrap();
        let (events, rx) = ChannelEvents::new();
        let _handle = transfer.fetch("file:///nonexistent/notes", "notes", events);

        let err = wait_terminal(&rx).unwrap_err();
        assert!(err.contains("transfer I/O failed"), "unexpected: {err}");
    }

    #[test]
    fn test_fetch_unsupported_scheme_fails() {
        let transfer = FileTransfer::new().unwrap();
        let (events, rx) = ChannelEvents::new();
        let _handle = transfer.fetch("http://example.org/notes", "notes", events);

        let err = wait_terminal(&rx).unwrap_err();
        assert!(err.contains("unsupported URI scheme"), "unexpected: {err}");
    }

    #[test]
    fn test_gzip_uri_marks_artifact_compressed() {
        let mut source = tempfile::NamedTempFile::new().unwrap();
        source.write_all(&[0x1f, 0x8b, 0x08]).unwrap();

        let transfer = FileTransfer::new().unwrap();
        let (events, rx) = ChannelEvents::new();
        let uri = format!("gzip://{}", source.path().display());
        let _handle = transfer.fetch(&uri, "notes", events);

        let (artifact, _) = wait_terminal(&rx).unwrap();
        assert!(artifact.is_compressed());
    }

    #[test]
    fn test_cancelled_attempt_stays_silent() {
        let mut source = tempfile::NamedTempFile::new().unwrap();
        source.write_all(&vec![7u8; 1 << 22]).unwrap();

        let transfer = FileTransfer::with_chunk_size(1024).unwrap();
        let (events, rx) = ChannelEvents::new();
        let uri = format!("file://{}", source.path().display());
        let handle = transfer.fetch(&uri, "notes", events);
        handle.cancel();

        // Progress may race the cancel, but no terminal event may arrive.
        let deadline = std::time::Instant::now() + Duration::from_millis(300);
        while std::time::Instant::now() < deadline {
            match rx.try_recv() {
                Ok(Event::Progress(..)) | Err(mpsc::TryRecvError::Empty) => {
                    std::thread::sleep(Duration::from_millis(10));
                }
                Ok(Event::Success(_)) => panic!("success delivered after cancel"),
                Ok(Event::Failure(_)) => panic!("failure delivered after cancel"),
                Err(mpsc::TryRecvError::Disconnected) => break,
            }
        }
    }
}
