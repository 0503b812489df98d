//! Serialized async processing queue.
//!
//! Accepts asynchronous entries in arrival order and hands their values to
//! a single downstream processor strictly in that order, one at a time —
//! even when the entry futures themselves complete out of order. A failure
//! while awaiting or processing one entry is reported to the error sink and
//! does not stop the queue from draining subsequent entries.
//!
//! A dedicated drain task is spawned at construction, so there is exactly
//! one active consumer by construction.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use tokio::sync::mpsc;
use tracing::warn;

use crate::error::{Error, Result};

// ============================================================================
// Types
// ============================================================================

/// A queued entry: a future producing the value to process.
type EntryFuture<T> = BoxFuture<'static, Result<T>>;

/// Downstream processor invoked for each entry value, in arrival order.
type Processor<T> = Box<dyn FnMut(T) -> BoxFuture<'static, Result<()>> + Send>;

/// Sink receiving errors from failed entries or processor invocations.
type ErrorSink = Box<dyn Fn(&Error) + Send>;

// ============================================================================
// ProcessingQueue
// ============================================================================

/// A queue that serializes asynchronous results into in-order processing.
pub struct ProcessingQueue<T> {
    entry_tx: mpsc::UnboundedSender<EntryFuture<T>>,
}

impl<T> fmt::Debug for ProcessingQueue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessingQueue").finish_non_exhaustive()
    }
}

impl<T: Send + 'static> ProcessingQueue<T> {
    /// Creates a queue draining into `processor`.
    ///
    /// Failures are logged but otherwise dropped.
    #[must_use]
    pub fn new<P>(processor: P) -> Self
    where
        P: FnMut(T) -> BoxFuture<'static, Result<()>> + Send + 'static,
    {
        Self::with_error_sink(processor, |_| {})
    }

    /// Creates a queue draining into `processor`, reporting failures to
    /// `on_error` in addition to logging them.
    #[must_use]
    pub fn with_error_sink<P, E>(processor: P, on_error: E) -> Self
    where
        P: FnMut(T) -> BoxFuture<'static, Result<()>> + Send + 'static,
        E: Fn(&Error) + Send + 'static,
    {
        let (entry_tx, entry_rx) = mpsc::unbounded_channel();

        tokio::spawn(Self::drain(
            entry_rx,
            Box::new(processor),
            Box::new(on_error),
        ));

        Self { entry_tx }
    }

    /// Enqueues an entry.
    ///
    /// The entry's value is handed to the processor after every previously
    /// added entry, regardless of completion order.
    pub fn add<F>(&self, entry: F)
    where
        F: Future<Output = Result<T>> + Send + 'static,
    {
        // Send only fails after the drain task is gone, i.e. at shutdown.
        let _ = self.entry_tx.send(entry.boxed());
    }

    /// Drain loop: the single active consumer.
    async fn drain(
        mut entry_rx: mpsc::UnboundedReceiver<EntryFuture<T>>,
        mut processor: Processor<T>,
        on_error: ErrorSink,
    ) {
        while let Some(entry) = entry_rx.recv().await {
            match entry.await {
                Ok(value) => {
                    if let Err(e) = processor(value).await {
                        warn!(error = %e, "Entry was not processed");
                        on_error(&e);
                    }
                }
                Err(e) => {
                    warn!(error = %e, "Entry failed before processing");
                    on_error(&e);
                }
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Arc;
    use std::time::Duration;

    use parking_lot::Mutex;
    use tokio::sync::mpsc as tokio_mpsc;

    fn collecting_queue() -> (ProcessingQueue<u32>, Arc<Mutex<Vec<u32>>>) {
        let processed: Arc<Mutex<Vec<u32>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&processed);
        let queue = ProcessingQueue::new(move |value| {
            let sink = Arc::clone(&sink);
            async move {
                sink.lock().push(value);
                Ok(())
            }
            .boxed()
        });
        (queue, processed)
    }

    #[tokio::test]
    async fn test_preserves_arrival_order_despite_completion_order() {
        let (queue, processed) = collecting_queue();

        // First entry completes long after the second one.
        queue.add(async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            Ok(1)
        });
        queue.add(async { Ok(2) });
        queue.add(async { Ok(3) });

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(*processed.lock(), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_failed_entry_does_not_stop_drain() {
        let (queue, processed) = collecting_queue();

        queue.add(async { Ok(1) });
        queue.add(async { Err(Error::Disconnected) });
        queue.add(async { Ok(3) });

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(*processed.lock(), vec![1, 3]);
    }

    #[tokio::test]
    async fn test_processor_failure_reported_to_error_sink() {
        let (error_tx, mut error_rx) = tokio_mpsc::unbounded_channel();
        let processed: Arc<Mutex<Vec<u32>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&processed);

        let queue = ProcessingQueue::with_error_sink(
            move |value: u32| {
                let sink = Arc::clone(&sink);
                async move {
                    if value == 2 {
                        return Err(Error::navigation_failed("entry 2"));
                    }
                    sink.lock().push(value);
                    Ok(())
                }
                .boxed()
            },
            move |error| {
                let _ = error_tx.send(error.to_string());
            },
        );

        queue.add(async { Ok(1) });
        queue.add(async { Ok(2) });
        queue.add(async { Ok(3) });

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(*processed.lock(), vec![1, 3]);
        let reported = error_rx.recv().await.expect("error reported");
        assert!(reported.contains("entry 2"));
    }
}
