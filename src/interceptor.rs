//! The interceptor: per-request shed/allow decisions in `before`, deliberate
//! reclamation in `after`.
//!
//! Flow for one request:
//! 1. `before` bumps the request counter unless this request falls on the sampling
//!    window, in which case memory pressure is read under the state lock.
//! 2. Pressure above the threshold claims the (single) reclamation slot and returns a
//!    `RejectResponse` carrying the predicted unavailability; the caller answers 503.
//! 3. `after` on that same request runs the reclamation, records how long it took,
//!    recomputes the window and commits the new memory baseline.
//!
//! The shed decision lives in the caller's `RequestContext`, never in the interceptor,
//! so concurrent requests cannot see each other's decisions.

use crate::config::GciOptions;
use crate::error::GciResult;
use crate::history::HistoryTracker;
use crate::mem::{default_reader, MemoryReader};
use crate::monitor::HeapMonitor;
use crate::reclaim::{platform_policy, Clock, ReclamationPolicy, SystemClock};
use crate::sampling::SamplingController;
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Outcome of `before` for one request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RequestState {
    /// Not a check request (or a reclamation is already claimed); counter bumped, no memory read.
    Admitted,
    /// Memory was read and pressure is acceptable.
    CheckedAllowed,
    /// Memory was read, pressure too high: rejected, reclamation due in `after`.
    CheckedShed,
}

#[derive(Debug, PartialEq)]
pub struct ShedDecision {
    pub should_shed: bool,
    pub retry_after: Duration,
}

/// What the framework must answer instead of running the handler.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RejectResponse {
    pub retry_after: Duration,
}

impl RejectResponse {
    pub const STATUS: u16 = 503;

    /// Whole seconds for the `Retry-After` header, rounded up and never 0.
    pub fn retry_after_secs(&self) -> u64 {
        let secs = self.retry_after.as_secs();
        let secs = if self.retry_after.subsec_nanos() > 0 { secs.saturating_add(1) } else { secs };
        secs.max(1)
    }
}

/// Per-request handle threaded from `before` to `after`.
#[derive(Debug, Default)]
pub struct RequestContext {
    state: Option<RequestState>,
    decision: Option<ShedDecision>,
}

impl RequestContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// `None` until `before` has completed for this request.
    pub fn state(&self) -> Option<RequestState> {
        self.state
    }

    /// The decision made by a check request; taken (and cleared) by `after`.
    pub fn decision(&self) -> Option<&ShedDecision> {
        self.decision.as_ref()
    }

    pub fn is_shed(&self) -> bool {
        self.state == Some(RequestState::CheckedShed)
    }
}

/// Point-in-time view of the interceptor, for diagnostics endpoints and tests.
#[derive(Clone, Debug, Serialize)]
pub struct GciStats {
    pub processed: u64,
    pub window: u64,
    pub baseline_bytes: Option<u64>,
    /// Reclamation durations, newest first, in milliseconds.
    pub history_ms: Vec<f64>,
    pub predicted_unavailability_ms: f64,
    pub checks: u64,
    pub sheds: u64,
    pub reclamations: u64,
    pub reclamation_failures: u64,
    pub reclamation_pending: bool,
}

struct Shared {
    monitor: HeapMonitor,
    history: HistoryTracker,
    // Set by the shedding `before`, cleared by its `after`. At most one reclamation in flight.
    reclaim_claimed: bool,
}

#[derive(Default)]
struct Counters {
    checks: AtomicU64,
    sheds: AtomicU64,
    reclamations: AtomicU64,
    failures: AtomicU64,
}

pub struct Interceptor {
    opts: GciOptions,
    policy: Arc<dyn ReclamationPolicy>,
    clock: Arc<dyn Clock>,
    sampling: SamplingController,
    shared: Mutex<Shared>,
    counters: Counters,
}

impl Interceptor {
    /// Platform defaults: statm/sysinfo reader, allocator policy, system clock.
    pub fn new(opts: GciOptions) -> GciResult<Self> {
        GciBuilder::new().options(opts).build()
    }

    pub fn builder() -> GciBuilder {
        GciBuilder::new()
    }

    fn from_parts(
        opts: GciOptions,
        reader: Arc<dyn MemoryReader>,
        policy: Arc<dyn ReclamationPolicy>,
        clock: Arc<dyn Clock>,
    ) -> GciResult<Self> {
        opts.validate()?;
        match policy.disable_automatic() {
            Ok(()) => tracing::info!("GCI active; automatic reclamation disabled"),
            Err(e) => tracing::warn!(error = %e, "GCI active but automatic reclamation stays enabled"),
        }
        let monitor = HeapMonitor::new(reader);
        Ok(Self {
            sampling: SamplingController::new(opts.min_window, opts.max_window),
            shared: Mutex::new(Shared {
                monitor,
                history: HistoryTracker::new(opts.history_size, opts.default_unavailability),
                reclaim_claimed: false,
            }),
            counters: Counters::default(),
            opts,
            policy,
            clock,
        })
    }

    pub fn options(&self) -> &GciOptions {
        &self.opts
    }

    /// Call before the handler. `Some` means: skip the handler and answer 503 with
    /// `Retry-After`. A failed memory read never sheds.
    pub fn before(&self, ctx: &mut RequestContext) -> Option<RejectResponse> {
        if !self.sampling.check_due() {
            return self.admit(ctx);
        }

        let mut shared = self.shared.lock();
        // Another thread may have checked (and moved the counter) while we waited,
        // or already claimed the reclamation.
        if shared.reclaim_claimed || !self.sampling.check_due() {
            drop(shared);
            return self.admit(ctx);
        }

        self.counters.checks.fetch_add(1, Ordering::Relaxed);
        let ratio = match shared.monitor.usage_ratio() {
            Ok(r) => r,
            Err(e) => {
                tracing::debug!(error = %e, "memory check failed; admitting");
                0.0
            }
        };

        if ratio > self.opts.shedding_threshold {
            shared.reclaim_claimed = true;
            let retry_after = shared.history.predict_duration();
            drop(shared);
            self.counters.sheds.fetch_add(1, Ordering::Relaxed);
            tracing::info!(
                ratio,
                retry_after_ms = retry_after.as_millis() as u64,
                processed = self.sampling.processed(),
                "memory pressure over threshold; shedding and scheduling reclamation"
            );
            ctx.state = Some(RequestState::CheckedShed);
            ctx.decision = Some(ShedDecision { should_shed: true, retry_after });
            return Some(RejectResponse { retry_after });
        }

        self.sampling.mark_processed();
        drop(shared);
        tracing::trace!(ratio, "memory check passed");
        ctx.state = Some(RequestState::CheckedAllowed);
        ctx.decision = Some(ShedDecision { should_shed: false, retry_after: Duration::ZERO });
        None
    }

    fn admit(&self, ctx: &mut RequestContext) -> Option<RejectResponse> {
        self.sampling.mark_processed();
        ctx.state = Some(RequestState::Admitted);
        None
    }

    /// Call after the handler ran, failed, or was skipped. Safe to call for any
    /// context, any number of times: only the first call on a shed context reclaims.
    /// Blocks for the duration of the reclamation.
    pub fn after(&self, ctx: &mut RequestContext) {
        match ctx.decision.take() {
            Some(d) if d.should_shed => self.reclaim(),
            _ => {}
        }
    }

    fn reclaim(&self) {
        let started = self.clock.now();
        let outcome = self.policy.collect_now();
        let elapsed = self.clock.now().saturating_duration_since(started);

        let mut shared = self.shared.lock();
        match outcome {
            Ok(()) => {
                shared.history.record(elapsed);
                if let Err(e) = shared.monitor.commit_baseline() {
                    tracing::warn!(error = %e, "could not refresh memory baseline after reclamation");
                }
                self.counters.reclamations.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => {
                self.counters.failures.fetch_add(1, Ordering::Relaxed);
                tracing::error!(error = %e, "reclamation failed; keeping previous unavailability estimate");
            }
        }
        let window = self.sampling.rewindow();
        shared.reclaim_claimed = false;
        drop(shared);
        tracing::info!(elapsed_ms = elapsed.as_millis() as u64, window, "reclamation pass finished");
    }

    pub fn stats(&self) -> GciStats {
        let shared = self.shared.lock();
        GciStats {
            processed: self.sampling.processed(),
            window: self.sampling.window(),
            baseline_bytes: shared.monitor.baseline(),
            history_ms: shared.history.iter().map(|d| d.as_secs_f64() * 1000.0).collect(),
            predicted_unavailability_ms: shared.history.predict_duration().as_secs_f64() * 1000.0,
            checks: self.counters.checks.load(Ordering::Relaxed),
            sheds: self.counters.sheds.load(Ordering::Relaxed),
            reclamations: self.counters.reclamations.load(Ordering::Relaxed),
            reclamation_failures: self.counters.failures.load(Ordering::Relaxed),
            reclamation_pending: shared.reclaim_claimed,
        }
    }
}

/// Builder front-end: options plus the capabilities to substitute in tests or embedders.
#[derive(Default)]
pub struct GciBuilder {
    opts: GciOptions,
    reader: Option<Arc<dyn MemoryReader>>,
    policy: Option<Arc<dyn ReclamationPolicy>>,
    clock: Option<Arc<dyn Clock>>,
}

impl GciBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn options(mut self, opts: GciOptions) -> Self { self.opts = opts; self }
    pub fn threshold(mut self, t: f64) -> Self { self.opts = self.opts.with_shedding_threshold(t); self }
    pub fn default_unavailability(mut self, d: Duration) -> Self { self.opts = self.opts.with_default_unavailability(d); self }
    pub fn window_bounds(mut self, min: u64, max: u64) -> Self { self.opts = self.opts.with_window_bounds(min, max); self }
    pub fn history_size(mut self, n: usize) -> Self { self.opts = self.opts.with_history_size(n); self }
    pub fn reader(mut self, r: Arc<dyn MemoryReader>) -> Self { self.reader = Some(r); self }
    pub fn policy(mut self, p: Arc<dyn ReclamationPolicy>) -> Self { self.policy = Some(p); self }
    pub fn clock(mut self, c: Arc<dyn Clock>) -> Self { self.clock = Some(c); self }

    /// Validates the options (fail fast) and wires missing capabilities with platform defaults.
    pub fn build(self) -> GciResult<Interceptor> {
        self.opts.validate()?;
        let reader = match self.reader {
            Some(r) => r,
            None => default_reader()?,
        };
        let policy = self.policy.unwrap_or_else(platform_policy);
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        Interceptor::from_parts(self.opts, reader, policy, clock)
    }
}
