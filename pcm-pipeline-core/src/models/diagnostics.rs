use std::sync::atomic::{AtomicU64, Ordering};

/// Snapshot of engine activity, for debugging stalled or short sessions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineDiagnostics {
    /// Completion callbacks delivered by the hardware.
    pub callback_count: u64,
    /// Samples appended (capture) or submitted (playback).
    pub samples_transferred: u64,
    /// Buffers accepted by the hardware queue.
    pub buffers_enqueued: u64,
    /// Submissions the hardware queue refused.
    pub enqueue_failures: u64,
}

/// Counters updated from the callback thread without locking.
#[derive(Debug, Default)]
pub(crate) struct DiagnosticCounters {
    callbacks: AtomicU64,
    samples: AtomicU64,
    enqueued: AtomicU64,
    enqueue_failures: AtomicU64,
}

impl DiagnosticCounters {
    pub(crate) fn record_callback(&self) {
        self.callbacks.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_samples(&self, count: usize) {
        self.samples.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_enqueue(&self, accepted: bool) {
        if accepted {
            self.enqueued.fetch_add(1, Ordering::Relaxed);
        } else {
            self.enqueue_failures.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub(crate) fn reset(&self) {
        self.callbacks.store(0, Ordering::Relaxed);
        self.samples.store(0, Ordering::Relaxed);
        self.enqueued.store(0, Ordering::Relaxed);
        self.enqueue_failures.store(0, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> EngineDiagnostics {
        EngineDiagnostics {
            callback_count: self.callbacks.load(Ordering::Relaxed),
            samples_transferred: self.samples.load(Ordering::Relaxed),
            buffers_enqueued: self.enqueued.load(Ordering::Relaxed),
            enqueue_failures: self.enqueue_failures.load(Ordering::Relaxed),
        }
    }
}
