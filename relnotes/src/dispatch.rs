//! Cross-thread completion dispatch onto the control thread.
//!
//! Fetch outcomes are decided on worker or transfer threads, but callers
//! are promised that every callback runs on the control thread. The
//! [`Dispatcher`] is the sending half of that promise: any thread may
//! `post` a deferred action, and the [`ControlQueue`] drains them in FIFO
//! order on the thread that created it.
//!
//! A posted action owns `Arc` clones of everything it will touch, so the
//! referenced objects stay alive until the action has run even when every
//! other holder has lost interest in the meantime.

use std::thread::{self, ThreadId};
use tokio::sync::mpsc;
use tracing::warn;

/// A deferred zero-argument action.
pub type Thunk = Box<dyn FnOnce() + Send + 'static>;

/// Sending half: posts deferred actions to the control thread.
///
/// Cheap to clone; safe to use from any thread.
#[derive(Clone, Debug)]
pub struct Dispatcher {
    tx: mpsc::UnboundedSender<Thunk>,
    control: ThreadId,
}

impl Dispatcher {
    /// Posts an action to run later on the control thread.
    ///
    /// Actions run exactly once, strictly sequentially, in post order. If
    /// the control queue has been dropped the action is discarded with a
    /// warning; there is nobody left to deliver to.
    pub fn post(&self, thunk: Thunk) {
        if self.tx.send(thunk).is_err() {
            warn!("control queue is gone; dropping a posted completion");
        }
    }

    /// Whether the calling thread is the control thread.
    pub fn on_control_thread(&self) -> bool {
        thread::current().id() == self.control
    }
}

/// Receiving half: drains posted actions on the control thread.
pub struct ControlQueue {
    rx: mpsc::UnboundedReceiver<Thunk>,
}

impl ControlQueue {
    /// Creates the queue on the calling thread, which becomes the control
    /// thread, and returns it with a connected [`Dispatcher`].
    pub fn new() -> (Self, Dispatcher) {
        let (tx, rx) = mpsc::unbounded_channel();
        let dispatcher = Dispatcher {
            tx,
            control: thread::current().id(),
        };
        (Self { rx }, dispatcher)
    }

    /// Runs every action that is already queued; returns how many ran.
    pub fn drain(&mut self) -> usize {
        let mut ran = 0;
        while let Ok(thunk) = self.rx.try_recv() {
            thunk();
            ran += 1;
        }
        ran
    }

    /// Blocks for the next action and runs it.
    ///
    /// Returns `false` once every dispatcher clone has been dropped and
    /// the queue is empty.
    pub fn run_one(&mut self) -> bool {
        match self.rx.blocking_recv() {
            Some(thunk) => {
                thunk();
                true
            }
            None => false,
        }
    }
}

impl std::fmt::Debug for ControlQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ControlQueue").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_drain_runs_in_post_order() {
        let (mut queue, dispatcher) = ControlQueue::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        for i in 0..4 {
            let order = Arc::clone(&order);
            dispatcher.post(Box::new(move || order.lock().unwrap().push(i)));
        }

        assert_eq!(queue.drain(), 4);
        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_drain_with_nothing_queued() {
        let (mut queue, _dispatcher) = ControlQueue::new();
        assert_eq!(queue.drain(), 0);
    }

    #[test]
    fn test_post_from_another_thread() {
        let (mut queue, dispatcher) = ControlQueue::new();
        let ran = Arc::new(AtomicUsize::new(0));

        let ran_clone = Arc::clone(&ran);
        let handle = std::thread::spawn(move || {
            assert!(!dispatcher.on_control_thread());
            dispatcher.post(Box::new(move || {
                ran_clone.fetch_add(1, Ordering::SeqCst);
            }));
        });
        handle.join().unwrap();

        assert!(queue.run_one());
        assert_eq!(ran.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_on_control_thread() {
        let (_queue, dispatcher) = ControlQueue::new();
        assert!(dispatcher.on_control_thread());
    }

    #[test]
    fn test_captured_arc_outlives_other_holders() {
        let (mut queue, dispatcher) = ControlQueue::new();
        let ran = Arc::new(AtomicUsize::new(0));
        let target = Arc::new(());

        {
            let ran = Arc::clone(&ran);
            let target = Arc::clone(&target);
            dispatcher.post(Box::new(move || {
                let _keepalive = &target;
                ran.fetch_add(1, Ordering::SeqCst);
            }));
        }

        // The queued thunk is now the only holder besides ours; dropping
        // ours must not invalidate the posted action.
        let weak = Arc::downgrade(&target);
        drop(target);
        assert!(weak.upgrade().is_some());

        queue.drain();
        assert_eq!(ran.load(Ordering::SeqCst), 1);
        assert!(weak.upgrade().is_none());
    }

    #[test]
    fn test_run_one_reports_closed_queue() {
        let (mut queue, dispatcher) = ControlQueue::new();
        drop(dispatcher);
        assert!(!queue.run_one());
    }
}
