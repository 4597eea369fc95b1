// src/pipeline/lookahead.rs
//
// Bounded look-ahead between a frame producer and the session thread.
//
// The producer runs on its own thread and decodes ahead into a bounded
// channel; the consumer pulls synchronously. Frame order is preserved. The
// shared cancel flag is checked by the producer before each item, and by
// the consumer between frames.

use crossbeam_channel::{bounded, Receiver};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::debug;

pub struct LookaheadSource<T: Send + 'static> {
    rx: Option<Receiver<T>>,
    handle: Option<JoinHandle<()>>,
    cancel: Arc<AtomicBool>,
}

impl<T: Send + 'static> LookaheadSource<T> {
    /// Spawn a producer draining `items` into a queue of at most `depth`
    /// entries (minimum 1).
    pub fn spawn<I>(items: I, depth: usize, cancel: Arc<AtomicBool>) -> Self
    where
        I: IntoIterator<Item = T>,
        I::IntoIter: Send + 'static,
    {
        let (tx, rx) = bounded(depth.max(1));
        let producer_cancel = Arc::clone(&cancel);
        let iter = items.into_iter();

        let handle = thread::spawn(move || {
            for item in iter {
                if producer_cancel.load(Ordering::Relaxed) {
                    debug!("look-ahead producer cancelled");
                    break;
                }
                if tx.send(item).is_err() {
                    // consumer went away
                    break;
                }
            }
        });

        Self {
            rx: Some(rx),
            handle: Some(handle),
            cancel,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::Relaxed)
    }

    /// Next item in order, or `None` once the producer is exhausted or the
    /// run was cancelled.
    pub fn next_item(&self) -> Option<T> {
        if self.is_cancelled() {
            return None;
        }
        self.rx.as_ref()?.recv().ok()
    }
}

impl<T: Send + 'static> Iterator for LookaheadSource<T> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        self.next_item()
    }
}

impl<T: Send + 'static> Drop for LookaheadSource<T> {
    fn drop(&mut self) {
        // Dropping the receiver unblocks a producer stuck on a full queue.
        drop(self.rx.take());
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}
