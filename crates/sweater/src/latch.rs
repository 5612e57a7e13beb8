//! Countdown Latch
//!
//! Joins the chunks of a `spread_the_sweat` call.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Condvar, Mutex, PoisonError};
use std::time::Duration;

/// Latch released once `count` arrivals have been recorded
#[derive(Debug)]
pub struct Latch {
    remaining: AtomicUsize,
    mutex: Mutex<()>,
    condvar: Condvar,
}

impl Latch {
    /// Create a latch expecting `count` arrivals
    pub fn new(count: usize) -> Self {
        Self {
            remaining: AtomicUsize::new(count),
            mutex: Mutex::new(()),
            condvar: Condvar::new(),
        }
    }

    /// Record one arrival
    pub fn count_down(&self) {
        let previous = self.remaining.fetch_sub(1, Ordering::AcqRel);
        debug_assert!(previous > 0, "latch counted down past zero");
        if previous == 1 {
            // Taking the lock orders the release against a waiter that has
            // checked `remaining` but not yet started waiting.
            let _guard = self.mutex.lock().unwrap_or_else(PoisonError::into_inner);
            self.condvar.notify_all();
        }
    }

    /// Whether every arrival has been recorded
    pub fn is_released(&self) -> bool {
        self.remaining.load(Ordering::Acquire) == 0
    }

    /// Block until released
    pub fn wait(&self) {
        let mut guard = self.mutex.lock().unwrap_or_else(PoisonError::into_inner);
        while !self.is_released() {
            guard = self
                .condvar
                .wait(guard)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Block until released or `timeout` elapses. Returns whether released.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let guard = self.mutex.lock().unwrap_or_else(PoisonError::into_inner);
        if self.is_released() {
            return true;
        }
        let _ = self
            .condvar
            .wait_timeout(guard, timeout)
            .unwrap_or_else(PoisonError::into_inner);
        self.is_released()
    }
}
