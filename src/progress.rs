//! Progress-callback trait for per-item batch events.
//!
//! Inject an [`Arc<dyn BatchProgressCallback>`] via
//! [`crate::config::PreviewConfigBuilder::progress_callback`] to receive
//! events as the controller works through the pending list. The CLI uses it
//! to drive a terminal progress bar; a service could forward the events to
//! a metrics sink instead.
//!
//! # Example
//!
//! ```rust
//! use preview_processor::{BatchProgressCallback, PreviewConfig, ProcessingOutcome};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct FailureCounter {
//!     failed: AtomicUsize,
//! }
//!
//! impl BatchProgressCallback for FailureCounter {
//!     fn on_item_complete(&self, id: &str, _index: usize, _total: usize, outcome: &ProcessingOutcome) {
//!         if outcome.is_failure() {
//!             self.failed.fetch_add(1, Ordering::SeqCst);
//!             eprintln!("{id} failed");
//!         }
//!     }
//! }
//!
//! let counter = Arc::new(FailureCounter { failed: AtomicUsize::new(0) });
//!
//! let config = PreviewConfig::builder()
//!     .progress_callback(counter as Arc<dyn BatchProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use crate::output::{BatchReport, ProcessingOutcome};
use std::sync::Arc;

/// Called by the controller as it processes each item.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. Items are processed sequentially, so calls never
/// overlap, but implementations must still be `Send + Sync` to live inside
/// the shared configuration.
pub trait BatchProgressCallback: Send + Sync {
    /// Called once the pending list is known, before any item is touched.
    fn on_batch_start(&self, total_items: usize) {
        let _ = total_items;
    }

    /// Called before an item's metadata is fetched.
    ///
    /// `index` is 0-based.
    fn on_item_start(&self, id: &str, index: usize, total_items: usize) {
        let _ = (id, index, total_items);
    }

    /// Called after the item has been finalised in the repository.
    fn on_item_complete(&self, id: &str, index: usize, total_items: usize, outcome: &ProcessingOutcome) {
        let _ = (id, index, total_items, outcome);
    }

    /// Called once after every item has been attempted and staging is gone.
    fn on_batch_complete(&self, report: &BatchReport) {
        let _ = report;
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl BatchProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::PreviewConfig`].
pub type ProgressCallback = Arc<dyn BatchProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::{FailureReason, SkipReason};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct TrackingCallback {
        total: AtomicUsize,
        started: Mutex<Vec<String>>,
        failures: AtomicUsize,
    }

    impl BatchProgressCallback for TrackingCallback {
        fn on_batch_start(&self, total_items: usize) {
            self.total.store(total_items, Ordering::SeqCst);
        }

        fn on_item_start(&self, id: &str, _index: usize, _total_items: usize) {
            self.started.lock().unwrap().push(id.to_string());
        }

        fn on_item_complete(&self, _id: &str, _index: usize, _total: usize, outcome: &ProcessingOutcome) {
            if outcome.is_failure() {
                self.failures.fetch_add(1, Ordering::SeqCst);
            }
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_batch_start(2);
        cb.on_item_start("a", 0, 2);
        cb.on_item_complete("a", 0, 2, &ProcessingOutcome::Succeeded { page_count: 1 });
        cb.on_batch_complete(&BatchReport::default());
    }

    #[test]
    fn tracking_callback_receives_events() {
        let tracker = TrackingCallback::default();
        tracker.on_batch_start(3);
        tracker.on_item_start("a", 0, 3);
        tracker.on_item_complete("a", 0, 3, &ProcessingOutcome::Succeeded { page_count: 2 });
        tracker.on_item_start("b", 1, 3);
        tracker.on_item_complete(
            "b",
            1,
            3,
            &ProcessingOutcome::Skipped {
                reason: SkipReason::NoPages,
            },
        );
        tracker.on_item_start("c", 2, 3);
        tracker.on_item_complete(
            "c",
            2,
            3,
            &ProcessingOutcome::Failed {
                reason: FailureReason::MetadataFetch,
                message: "HTTP 500".into(),
            },
        );

        assert_eq!(tracker.total.load(Ordering::SeqCst), 3);
        assert_eq!(*tracker.started.lock().unwrap(), vec!["a", "b", "c"]);
        assert_eq!(tracker.failures.load(Ordering::SeqCst), 1);
    }
}
