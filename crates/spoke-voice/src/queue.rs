//! Bounded sentence queue between producers and the playback worker.
//!
//! Producers never block: [`WorkQueue::try_enqueue`] hands a rejected
//! sentence straight back when the queue is full. The worker blocks in
//! [`WorkQueue::dequeue`] until a sentence arrives or the queue is closed.

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::Serialize;

use crate::segment::Sentence;

/// Default number of pending sentences.
pub const DEFAULT_QUEUE_CAPACITY: usize = 10;

/// Outcome of enqueueing a batch of sentences.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EnqueueReport {
    #[serde(rename = "acceptedSentenceCount")]
    pub accepted: usize,
    #[serde(rename = "droppedSentenceCount")]
    pub dropped: usize,
}

impl EnqueueReport {
    pub const fn total(&self) -> usize {
        self.accepted + self.dropped
    }
}

#[derive(Debug, Default)]
struct Inner {
    items: VecDeque<Sentence>,
    /// Dequeued but not yet reported done by the worker.
    in_flight: usize,
    closed: bool,
}

impl Inner {
    fn is_idle(&self) -> bool {
        self.items.is_empty() && self.in_flight == 0
    }
}

/// FIFO buffer of sentences with a fixed capacity and drop-on-full policy.
#[derive(Debug)]
pub struct WorkQueue {
    inner: Mutex<Inner>,
    available: Condvar,
    idle: Condvar,
    capacity: usize,
}

impl WorkQueue {
    /// Create a queue holding at most `capacity` sentences (minimum 1).
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            available: Condvar::new(),
            idle: Condvar::new(),
            capacity: capacity.max(1),
        }
    }

    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of pending (not yet dequeued) sentences.
    pub fn len(&self) -> usize {
        self.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().items.is_empty()
    }

    /// Enqueue without blocking. A full or closed queue returns the sentence.
    pub fn try_enqueue(&self, sentence: Sentence) -> Result<(), Sentence> {
        let mut inner = self.lock();
        if inner.closed || inner.items.len() >= self.capacity {
            return Err(sentence);
        }
        inner.items.push_back(sentence);
        drop(inner);

        self.available.notify_one();
        Ok(())
    }

    /// Enqueue sentences one at a time, stopping at the first rejection.
    ///
    /// Everything from the rejected sentence onwards counts as dropped, so
    /// `accepted + dropped` always equals the batch length.
    pub fn enqueue_batch<I>(&self, sentences: I) -> EnqueueReport
    where
        I: IntoIterator<Item = Sentence>,
    {
        let mut report = EnqueueReport::default();
        let mut sentences = sentences.into_iter();

        for sentence in sentences.by_ref() {
            if self.try_enqueue(sentence).is_err() {
                report.dropped = 1;
                break;
            }
            report.accepted += 1;
        }
        report.dropped += sentences.count();

        if report.dropped > 0 {
            tracing::warn!(
                accepted = report.accepted,
                dropped = report.dropped,
                capacity = self.capacity,
                "Speech queue full, dropping sentences"
            );
        }
        report
    }

    /// Block until a sentence is available. Returns `None` once closed.
    ///
    /// Every `Some` must be followed by [`task_done`](Self::task_done).
    pub fn dequeue(&self) -> Option<Sentence> {
        let mut inner = self.lock();
        loop {
            if inner.closed {
                return None;
            }
            if let Some(sentence) = inner.items.pop_front() {
                inner.in_flight += 1;
                return Some(sentence);
            }
            inner = self
                .available
                .wait(inner)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Mark a dequeued sentence as fully handled.
    pub fn task_done(&self) {
        let mut inner = self.lock();
        inner.in_flight = inner.in_flight.saturating_sub(1);
        if inner.is_idle() {
            self.idle.notify_all();
        }
    }

    /// Drop every pending sentence, returning how many were removed.
    ///
    /// A sentence already taken by the worker is unaffected.
    pub fn clear(&self) -> usize {
        let mut inner = self.lock();
        let cleared = inner.items.len();
        inner.items.clear();
        if inner.is_idle() {
            self.idle.notify_all();
        }
        cleared
    }

    /// Close the queue: pending sentences are discarded, producers are
    /// rejected and the worker's next `dequeue` returns `None`.
    pub fn close(&self) {
        let mut inner = self.lock();
        inner.closed = true;
        inner.items.clear();
        drop(inner);

        self.available.notify_all();
        self.idle.notify_all();
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// Wait until nothing is pending or in flight. Returns `false` on timeout.
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        let inner = self.lock();
        let (inner, _) = self
            .idle
            .wait_timeout_while(inner, timeout, |inner| !inner.closed && !inner.is_idle())
            .unwrap_or_else(PoisonError::into_inner);
        inner.closed || inner.is_idle()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for WorkQueue {
    fn default() -> Self {
        Self::new(DEFAULT_QUEUE_CAPACITY)
    }
}
