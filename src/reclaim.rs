//! Capabilities the interceptor drives: the host's reclamation control and a clock.
//!
//! Rust has no collector to pause, so the stock policy targets the allocator: on
//! glibc, automatic trimming of freed heap back to the OS is switched off and
//! `malloc_trim` is run deliberately instead. Whether anything can be disabled at
//! all is a platform capability, not a guarantee.

use crate::error::{GciError, GciResult};
use std::sync::Arc;
use std::time::Instant;

pub trait ReclamationPolicy: Send + Sync {
    /// Stop the runtime from reclaiming on its own heuristics. Called once at construction.
    fn disable_automatic(&self) -> GciResult<()>;

    /// Run a full, synchronous reclamation pass.
    fn collect_now(&self) -> GciResult<()>;
}

pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// glibc allocator control: `M_TRIM_THRESHOLD` pinned high, `malloc_trim(0)` on demand.
#[cfg(all(target_os = "linux", target_env = "gnu"))]
#[derive(Clone, Copy, Debug, Default)]
pub struct MallocTrim;

#[cfg(all(target_os = "linux", target_env = "gnu"))]
impl ReclamationPolicy for MallocTrim {
    fn disable_automatic(&self) -> GciResult<()> {
        // SAFETY: mallopt only adjusts allocator tunables.
        let ok = unsafe { libc::mallopt(libc::M_TRIM_THRESHOLD, libc::c_int::MAX) };
        if ok == 1 {
            Ok(())
        } else {
            Err(GciError::reclamation("mallopt(M_TRIM_THRESHOLD) was rejected"))
        }
    }

    fn collect_now(&self) -> GciResult<()> {
        // SAFETY: malloc_trim walks allocator arenas; it does not touch live allocations.
        let released = unsafe { libc::malloc_trim(0) };
        tracing::trace!(released = released == 1, "malloc_trim done");
        Ok(())
    }
}

/// For platforms without allocator control: nothing to disable, nothing to collect.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopPolicy;

impl ReclamationPolicy for NoopPolicy {
    fn disable_automatic(&self) -> GciResult<()> {
        Err(GciError::reclamation("automatic reclamation cannot be disabled on this platform"))
    }

    fn collect_now(&self) -> GciResult<()> {
        Ok(())
    }
}

/// Host-supplied reclamation, e.g. dropping caches or resetting arenas.
/// Automatic reclamation is assumed to be the host's business.
pub struct ReclaimFn<F>(pub F);

impl<F> ReclamationPolicy for ReclaimFn<F>
where
    F: Fn() -> GciResult<()> + Send + Sync,
{
    fn disable_automatic(&self) -> GciResult<()> {
        Ok(())
    }

    fn collect_now(&self) -> GciResult<()> {
        (self.0)()
    }
}

/// Best policy the current target offers.
pub fn platform_policy() -> Arc<dyn ReclamationPolicy> {
    #[cfg(all(target_os = "linux", target_env = "gnu"))]
    {
        Arc::new(MallocTrim)
    }
    #[cfg(not(all(target_os = "linux", target_env = "gnu")))]
    {
        Arc::new(NoopPolicy)
    }
}
