#![allow(dead_code)]

use gci::{Clock, GciError, GciResult, Interceptor, MemoryReader, MemorySample, ReclamationPolicy, RequestContext};
use parking_lot::Mutex;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

pub const PAGE: u64 = 4096;
pub const TOTAL_PAGES: u64 = 10_000;

/// Scripted memory accounting: resident pages settable from the test, optional
/// growth on every read, and a switch to make reads fail.
pub struct FakeMemory {
    resident_pages: AtomicU64,
    grow_pages_per_read: AtomicU64,
    failing: AtomicBool,
    reads: AtomicU64,
}

impl FakeMemory {
    pub fn new(resident_pages: u64) -> Arc<Self> {
        Arc::new(Self {
            resident_pages: AtomicU64::new(resident_pages),
            grow_pages_per_read: AtomicU64::new(0),
            failing: AtomicBool::new(false),
            reads: AtomicU64::new(0),
        })
    }
    pub fn set_resident_pages(&self, pages: u64) {
        self.resident_pages.store(pages, Ordering::SeqCst);
    }
    pub fn grow_on_read(&self, pages: u64) {
        self.grow_pages_per_read.store(pages, Ordering::SeqCst);
    }
    pub fn set_failing(&self, yes: bool) {
        self.failing.store(yes, Ordering::SeqCst);
    }
    pub fn reads(&self) -> u64 {
        self.reads.load(Ordering::SeqCst)
    }
}

impl MemoryReader for FakeMemory {
    fn read(&self) -> GciResult<MemorySample> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(GciError::MemoryUnavailable("scripted failure".into()));
        }
        let grow = self.grow_pages_per_read.load(Ordering::SeqCst);
        let pages = self.resident_pages.fetch_add(grow, Ordering::SeqCst);
        Ok(MemorySample { resident_bytes: pages * PAGE, virtual_bytes: pages * PAGE * 2 })
    }

    fn total_bytes(&self) -> u64 {
        TOTAL_PAGES * PAGE
    }
}

/// Clock that only moves when told to.
pub struct ManualClock {
    origin: Instant,
    offset: Mutex<Duration>,
}

impl ManualClock {
    pub fn new() -> Arc<Self> {
        Arc::new(Self { origin: Instant::now(), offset: Mutex::new(Duration::ZERO) })
    }
    pub fn advance(&self, d: Duration) {
        *self.offset.lock() += d;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.origin + *self.offset.lock()
    }
}

/// Reclamation fake: each pass advances the manual clock by the next scripted
/// duration (or sleeps for real when no clock is attached) and records overlap.
pub struct CountingReclaimer {
    clock: Option<Arc<ManualClock>>,
    script: Mutex<Vec<Duration>>,
    real_pause: Duration,
    pub calls: AtomicUsize,
    pub disabled: AtomicUsize,
    in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
    fail: AtomicBool,
}

impl CountingReclaimer {
    /// Durations are consumed front to back; the last one repeats.
    pub fn scripted(clock: Arc<ManualClock>, durations: &[Duration]) -> Arc<Self> {
        Arc::new(Self::build(Some(clock), durations.to_vec(), Duration::ZERO))
    }
    pub fn sleeping(pause: Duration) -> Arc<Self> {
        Arc::new(Self::build(None, Vec::new(), pause))
    }
    fn build(clock: Option<Arc<ManualClock>>, script: Vec<Duration>, real_pause: Duration) -> Self {
        Self {
            clock,
            script: Mutex::new(script),
            real_pause,
            calls: AtomicUsize::new(0),
            disabled: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            fail: AtomicBool::new(false),
        }
    }
    pub fn set_failing(&self, yes: bool) {
        self.fail.store(yes, Ordering::SeqCst);
    }
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ReclamationPolicy for CountingReclaimer {
    fn disable_automatic(&self) -> GciResult<()> {
        self.disabled.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn collect_now(&self) -> GciResult<()> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        self.calls.fetch_add(1, Ordering::SeqCst);

        if let Some(clock) = &self.clock {
            let mut script = self.script.lock();
            let d = if script.len() > 1 { script.remove(0) } else { script.first().copied().unwrap_or_default() };
            clock.advance(d);
        } else {
            std::thread::sleep(self.real_pause);
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(GciError::ReclamationFailed("scripted failure".into()));
        }
        Ok(())
    }
}

/// Run `n` plain before/after cycles and assert none of them was shed.
pub fn run_cycles_unshed(gci: &Interceptor, n: usize) {
    for _ in 0..n {
        let mut ctx = RequestContext::new();
        assert!(gci.before(&mut ctx).is_none(), "unexpected shed");
        gci.after(&mut ctx);
    }
}

/// Write a statm-formatted file (`size resident shared text lib data dt`) into a fresh temp dir.
pub fn write_statm(size_pages: u64, resident_pages: u64) -> PathBuf {
    let dir = tempfile::tempdir().unwrap().into_path();
    let p = dir.join("statm");
    rewrite_statm(&p, size_pages, resident_pages);
    p
}

pub fn rewrite_statm(path: &Path, size_pages: u64, resident_pages: u64) {
    fs::write(path, format!("{size_pages} {resident_pages} 120 4 0 900 0\n")).unwrap();
}
