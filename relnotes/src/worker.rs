//! Persistent background job queue.
//!
//! A [`JobWorker`] owns one long-lived thread that pulls jobs off a FIFO
//! queue and hands them to a [`JobRunner`], one at a time. The thread
//! blocks on a condvar while the queue is empty and exits only when asked
//! to stop; the stop request is honored between jobs, never mid-job.
//!
//! The worker exists so that preparation work (metadata queries, local
//! filesystem probes) stays off the control thread. Its lifecycle is
//! driven externally: the pipeline starts it when the data source becomes
//! available and stops it when the source goes away.

use std::collections::VecDeque;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;
use tracing::{debug, error, info, trace, warn};

/// Processes jobs pulled off a [`JobWorker`]'s queue, one at a time, on
/// the worker thread.
pub trait JobRunner<J>: Send + Sync + 'static {
    /// Runs a single job to completion.
    fn run(&self, job: J);
}

struct WorkerState<J> {
    jobs: VecDeque<J>,
    stopping: bool,
    thread: Option<JoinHandle<()>>,
}

struct Shared<J> {
    state: Mutex<WorkerState<J>>,
    wake: Condvar,
}

/// A single persistent background thread consuming a FIFO job queue.
pub struct JobWorker<J> {
    shared: Arc<Shared<J>>,
    runner: Arc<dyn JobRunner<J>>,
    name: &'static str,
}

impl<J: Send + fmt::Display + 'static> JobWorker<J> {
    /// Creates a stopped worker; no thread is spawned until [`start`].
    ///
    /// `name` labels the thread and every log line it produces.
    ///
    /// [`start`]: JobWorker::start
    pub fn new(name: &'static str, runner: Arc<dyn JobRunner<J>>) -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(WorkerState {
                    jobs: VecDeque::new(),
                    stopping: false,
                    thread: None,
                }),
                wake: Condvar::new(),
            }),
            runner,
            name,
        }
    }

    /// Starts the worker thread. No-op if it is already running.
    pub fn start(&self) {
        let mut state = self.shared.state.lock().unwrap();
        state.stopping = false;

        if state.thread.is_some() {
            trace!(worker = self.name, "not starting the worker: it is already running");
            return;
        }

        info!(worker = self.name, "starting the background worker");
        let shared = Arc::clone(&self.shared);
        let runner = Arc::clone(&self.runner);
        let name = self.name;
        match std::thread::Builder::new()
            .name(name.to_string())
            .spawn(move || run_loop(shared, runner, name))
        {
            Ok(handle) => state.thread = Some(handle),
            Err(err) => error!(worker = self.name, error = %err, "failed to spawn the worker thread"),
        }
    }

    /// Asks the worker thread to exit after its current job and waits for
    /// it. No-op if the worker is not running.
    ///
    /// Jobs still queued are kept and will be processed after the next
    /// [`start`]; only *new* submissions are refused while stopped.
    ///
    /// [`start`]: JobWorker::start
    pub fn stop(&self) {
        let handle = {
            let mut state = self.shared.state.lock().unwrap();
            state.stopping = true;
            self.shared.wake.notify_all();
            state.thread.take()
        };

        match handle {
            Some(handle) => {
                info!(worker = self.name, "stopping the background worker");
                if handle.join().is_err() {
                    error!(worker = self.name, "worker thread terminated abnormally");
                }
            }
            None => trace!(worker = self.name, "not stopping the worker: it is not running"),
        }
    }

    /// Enqueues a job and wakes the worker if it is idle.
    ///
    /// Best-effort: while the worker is stopped the job is logged and
    /// dropped rather than surfaced as an error to the caller.
    pub fn submit(&self, job: J) {
        let mut state = self.shared.state.lock().unwrap();

        if state.stopping {
            warn!(worker = self.name, job = %job, "dropping job: the worker is stopped");
            return;
        }

        debug!(worker = self.name, job = %job, "queueing job");
        state.jobs.push_back(job);
        self.shared.wake.notify_one();
    }

    /// Whether the worker thread is currently running.
    pub fn is_running(&self) -> bool {
        self.shared.state.lock().unwrap().thread.is_some()
    }

    /// Number of jobs waiting to be processed.
    pub fn pending(&self) -> usize {
        self.shared.state.lock().unwrap().jobs.len()
    }
}

impl<J> Drop for JobWorker<J> {
    fn drop(&mut self) {
        let handle = {
            let mut state = self.shared.state.lock().unwrap();
            state.stopping = true;
            self.shared.wake.notify_all();
            state.thread.take()
        };
        if let Some(handle) = handle {
            let _ = handle.join();
        }
    }
}

impl<J> fmt::Debug for JobWorker<J> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.shared.state.lock().unwrap();
        f.debug_struct("JobWorker")
            .field("name", &self.name)
            .field("running", &state.thread.is_some())
            .field("pending", &state.jobs.len())
            .finish()
    }
}

fn run_loop<J: Send + fmt::Display + 'static>(
    shared: Arc<Shared<J>>,
    runner: Arc<dyn JobRunner<J>>,
    name: &'static str,
) {
    let mut state = shared.state.lock().unwrap();
    loop {
        while state.jobs.is_empty() && !state.stopping {
            state = shared.wake.wait(state).unwrap();
        }
        if state.stopping {
            break;
        }

        let Some(job) = state.jobs.pop_front() else {
            continue;
        };
        drop(state);

        debug!(worker = name, job = %job, "processing job");
        // A panicking job must not take the worker down with it.
        if panic::catch_unwind(AssertUnwindSafe(|| runner.run(job))).is_err() {
            error!(worker = name, "job panicked; the worker continues");
        }

        state = shared.state.lock().unwrap();
    }
    info!(worker = name, "background worker exited");
}
