//! Data-source lifecycle signals.

use std::sync::Mutex;
use tracing::debug;

type LifecycleFn = Box<dyn Fn() + Send + Sync>;

struct Subscriber {
    on_available: LifecycleFn,
    on_unavailable: LifecycleFn,
}

/// Hub for the two lifecycle signals of the external data source.
///
/// The owner of the data source raises [`source_available`] after opening
/// it and [`source_unavailable`] before closing or reconfiguring it.
/// Subscribers (the pipeline's preparation worker) are notified in
/// subscription order. Both signals are safe to raise repeatedly; the
/// worker's start/stop guards make the transitions idempotent.
///
/// [`source_available`]: StoreLifecycle::source_available
/// [`source_unavailable`]: StoreLifecycle::source_unavailable
#[derive(Default)]
pub struct StoreLifecycle {
    subscribers: Mutex<Vec<Subscriber>>,
}

impl StoreLifecycle {
    /// Creates a hub with no subscribers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a pair of callbacks for the two signals.
    pub fn subscribe(
        &self,
        on_available: impl Fn() + Send + Sync + 'static,
        on_unavailable: impl Fn() + Send + Sync + 'static,
    ) {
        let mut subscribers = self.subscribers.lock().unwrap();
        subscribers.push(Subscriber {
            on_available: Box::new(on_available),
            on_unavailable: Box::new(on_unavailable),
        });
    }

    /// Signals that the data source has become available.
    pub fn source_available(&self) {
        debug!("data source available");
        let subscribers = self.subscribers.lock().unwrap();
        for subscriber in subscribers.iter() {
            (subscriber.on_available)();
        }
    }

    /// Signals that the data source is about to become unavailable.
    pub fn source_unavailable(&self) {
        debug!("data source unavailable");
        let subscribers = self.subscribers.lock().unwrap();
        for subscriber in subscribers.iter() {
            (subscriber.on_unavailable)();
        }
    }
}

impl std::fmt::Debug for StoreLifecycle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let count = self.subscribers.lock().unwrap().len();
        f.debug_struct("StoreLifecycle")
            .field("subscribers", &count)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_signals_reach_all_subscribers() {
        let lifecycle = StoreLifecycle::new();
        let opened = Arc::new(AtomicUsize::new(0));
        let closed = Arc::new(AtomicUsize::new(0));

        for _ in 0..2 {
            let opened = Arc::clone(&opened);
            let closed = Arc::clone(&closed);
            lifecycle.subscribe(
                move || {
                    opened.fetch_add(1, Ordering::SeqCst);
                },
                move || {
                    closed.fetch_add(1, Ordering::SeqCst);
                },
            );
        }

        lifecycle.source_available();
        assert_eq!(opened.load(Ordering::SeqCst), 2);
        assert_eq!(closed.load(Ordering::SeqCst), 0);

        lifecycle.source_unavailable();
        assert_eq!(closed.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_signals_with_no_subscribers() {
        let lifecycle = StoreLifecycle::new();
        lifecycle.source_available();
        lifecycle.source_unavailable();
    }
}
