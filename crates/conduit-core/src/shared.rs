//! State shared between the audio thread and the control thread.
//!
//! Counters are plain atomics. The last-error message sits behind a
//! `parking_lot::Mutex`; the audio thread only ever `try_lock`s it and drops
//! the message if the control side holds it.

use core::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use parking_lot::Mutex;

use crate::error::ErrorBuffer;

/// Cross-thread host state.
#[derive(Debug, Default)]
pub struct SharedState {
    audio_iteration: AtomicU64,
    skipped_blocks: AtomicU64,
    error_count: AtomicU64,
    done: AtomicBool,
    last_error: Mutex<ErrorBuffer>,
}

impl SharedState {
    /// Creates fresh state: iteration 0, not done, no error.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of graph passes the audio thread has completed.
    #[inline]
    pub fn audio_iteration(&self) -> u64 {
        self.audio_iteration.load(Ordering::Acquire)
    }

    /// Bumps the pass counter. Audio thread only. Returns the new value.
    #[inline]
    pub fn advance_iteration(&self) -> u64 {
        self.audio_iteration.fetch_add(1, Ordering::Release) + 1
    }

    /// Counts a block rendered as silence because the graph was busy.
    #[inline]
    pub fn record_skipped_block(&self) {
        self.skipped_blocks.fetch_add(1, Ordering::Relaxed);
    }

    /// Blocks rendered as silence so far.
    pub fn skipped_blocks(&self) -> u64 {
        self.skipped_blocks.load(Ordering::Relaxed)
    }

    /// True once shutdown has been requested.
    #[inline]
    pub fn is_done(&self) -> bool {
        self.done.load(Ordering::Acquire)
    }

    /// Asks the tick loop and stream owner to stop.
    pub fn request_shutdown(&self) {
        self.done.store(true, Ordering::Release);
    }

    /// Records an error message, waiting for the lock. Control thread.
    pub fn report_error(&self, msg: &dyn fmt::Display) {
        self.error_count.fetch_add(1, Ordering::Relaxed);
        self.last_error.lock().set(msg);
    }

    /// Records an error message if the lock is free. Audio thread.
    ///
    /// Returns false if the message was dropped. The error count is bumped
    /// either way.
    pub fn try_report_error(&self, msg: &dyn fmt::Display) -> bool {
        self.error_count.fetch_add(1, Ordering::Relaxed);
        match self.last_error.try_lock() {
            Some(mut buf) => {
                buf.set(msg);
                true
            }
            None => false,
        }
    }

    /// Copy of the last recorded error message, empty if none.
    pub fn last_error(&self) -> String {
        self.last_error.lock().as_str().to_owned()
    }

    /// Total errors reported.
    pub fn error_count(&self) -> u64 {
        self.error_count.load(Ordering::Relaxed)
    }
}
