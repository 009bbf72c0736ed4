//! Adaptive sampling: only every `window`-th request pays for a memory read.

use std::sync::atomic::{AtomicU64, Ordering};

/// True exactly when `processed > 0` and `processed` is a multiple of `window`.
#[inline]
pub fn should_check(processed: u64, window: u64) -> bool {
    processed > 0 && window > 0 && processed % window == 0
}

/// Next window: about a fifth of the traffic seen since the last reclamation,
/// clamped so checks are neither too sparse nor too frequent.
#[inline]
pub fn next_window(processed: u64, min: u64, max: u64) -> u64 {
    (processed / 5).clamp(min, max)
}

/// Request counter and window shared by every request-handling thread.
///
/// Plain relaxed atomics: the hot path is a load plus an increment, and the only
/// cross-request ordering that matters is enforced by the interceptor's lock.
pub struct SamplingController {
    processed: AtomicU64,
    window: AtomicU64,
    min: u64,
    max: u64,
}

impl SamplingController {
    /// Starts at the lower bound.
    pub fn new(min: u64, max: u64) -> Self {
        Self { processed: AtomicU64::new(0), window: AtomicU64::new(min), min, max }
    }

    pub fn check_due(&self) -> bool {
        should_check(self.processed(), self.window())
    }

    #[inline]
    pub fn mark_processed(&self) {
        self.processed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn processed(&self) -> u64 {
        self.processed.load(Ordering::Relaxed)
    }

    pub fn window(&self) -> u64 {
        self.window.load(Ordering::Relaxed)
    }

    /// Recompute the window from the traffic since the last reclamation and start counting again.
    pub fn rewindow(&self) -> u64 {
        let seen = self.processed.swap(0, Ordering::Relaxed);
        let w = next_window(seen, self.min, self.max);
        self.window.store(w, Ordering::Relaxed);
        w
    }
}
