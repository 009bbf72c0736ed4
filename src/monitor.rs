//! Memory pressure relative to the footprint right after the last reclamation.
//!
//! Resident size alone is noisy: the kernel steals pages from a process whenever the
//! whole machine is under pressure. Measuring growth since the last deliberate
//! reclamation (and lowering the baseline whenever RSS shrinks on its own) keeps the
//! ratio about what this process allocated, not about its neighbours.

use crate::error::{GciError, GciResult};
use crate::mem::{MemoryReader, MemorySample};
use std::sync::Arc;

pub struct HeapMonitor {
    reader: Arc<dyn MemoryReader>,
    baseline: Option<u64>,
    last: Option<MemorySample>,
}

impl HeapMonitor {
    /// Takes a first sample to seed the baseline; if that read fails the baseline is
    /// seeded by the first successful `usage_ratio` instead.
    pub fn new(reader: Arc<dyn MemoryReader>) -> Self {
        let mut m = Self { reader, baseline: None, last: None };
        if let Ok(s) = m.reader.read() {
            m.baseline = Some(s.resident_bytes);
            m.last = Some(s);
        }
        m
    }

    /// `(resident - baseline) / total`, lowering the baseline first if resident dropped below it.
    pub fn usage_ratio(&mut self) -> GciResult<f64> {
        let total = self.reader.total_bytes();
        if total == 0 {
            return Err(GciError::memory("total memory reported as zero"));
        }
        let sample = self.reader.read()?;
        self.last = Some(sample);
        let resident = sample.resident_bytes;
        let baseline = match self.baseline {
            Some(b) if b <= resident => b,
            _ => {
                self.baseline = Some(resident);
                resident
            }
        };
        Ok((resident - baseline) as f64 / total as f64)
    }

    /// Establish the post-reclamation reference point from a fresh sample. Falls back to
    /// the last sample seen when the read fails.
    pub fn commit_baseline(&mut self) -> GciResult<u64> {
        let sample = match self.reader.read() {
            Ok(s) => s,
            Err(e) => {
                let s = self.last.ok_or(e)?;
                tracing::debug!(resident = s.resident_bytes, "fresh sample unavailable; committing last known resident size");
                s
            }
        };
        self.last = Some(sample);
        self.baseline = Some(sample.resident_bytes);
        Ok(sample.resident_bytes)
    }

    pub fn baseline(&self) -> Option<u64> {
        self.baseline
    }

    pub fn last_sample(&self) -> Option<MemorySample> {
        self.last
    }
}
