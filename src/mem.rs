//! Process memory accounting: a `MemoryReader` capability plus the Linux
//! `/proc/<pid>/statm` reader and a portable `sysinfo` fallback.

use crate::error::{GciError, GciResult};
use parking_lot::Mutex;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};
use sysinfo::{Pid, ProcessExt, System, SystemExt};

const FALLBACK_PAGE_SIZE: u64 = 4096;

/// One fresh reading of the process footprint, in bytes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MemorySample {
    pub resident_bytes: u64,
    pub virtual_bytes: u64,
}

/// Source of process memory accounting.
pub trait MemoryReader: Send + Sync {
    fn read(&self) -> GciResult<MemorySample>;

    /// Denominator for the pressure ratio (physical memory available to the process).
    fn total_bytes(&self) -> u64;
}

static PAGE_SIZE: OnceLock<u64> = OnceLock::new();
static TOTAL_MEMORY: OnceLock<u64> = OnceLock::new();

/// System page size, read once per process.
pub fn page_size() -> u64 {
    *PAGE_SIZE.get_or_init(|| {
        #[cfg(unix)]
        {
            // SAFETY: sysconf only reads a system constant.
            let raw = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
            if raw > 0 {
                return raw as u64;
            }
        }
        FALLBACK_PAGE_SIZE
    })
}

/// Total physical memory in bytes, read once per process.
pub fn total_memory_bytes() -> u64 {
    *TOTAL_MEMORY.get_or_init(|| {
        let mut s = System::new();
        s.refresh_memory();
        s.total_memory()
    })
}

/// Reads `statm` (whitespace separated page counts: size, resident, shared, ...).
pub struct StatmReader {
    path: PathBuf,
    page_size: u64,
    total_bytes: u64,
}

impl StatmReader {
    /// `/proc/self/statm` with the cached page size and physical memory total.
    pub fn current_process() -> Self {
        Self {
            path: PathBuf::from("/proc/self/statm"),
            page_size: page_size(),
            total_bytes: total_memory_bytes(),
        }
    }

    /// Read an arbitrary statm-formatted file; used to replay recorded samples.
    pub fn with_path(path: impl AsRef<Path>, page_size: u64, total_bytes: u64) -> Self {
        Self { path: path.as_ref().to_path_buf(), page_size, total_bytes }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl MemoryReader for StatmReader {
    fn read(&self) -> GciResult<MemorySample> {
        let raw = fs::read_to_string(&self.path)
            .map_err(|e| GciError::memory(format!("reading {}: {e}", self.path.display())))?;
        parse_statm(&raw, self.page_size)
    }

    fn total_bytes(&self) -> u64 {
        self.total_bytes
    }
}

/// Parse the first two statm fields and scale them by `page_size`.
pub fn parse_statm(raw: &str, page_size: u64) -> GciResult<MemorySample> {
    let mut fields = raw.split_whitespace();
    let mut next_pages = |name: &str| -> GciResult<u64> {
        let f = fields
            .next()
            .ok_or_else(|| GciError::memory(format!("statm is missing the {name} field")))?;
        f.parse::<u64>()
            .map_err(|_| GciError::memory(format!("statm {name} field is not numeric: {f:?}")))
    };
    let size = next_pages("size")?;
    let resident = next_pages("resident")?;
    Ok(MemorySample {
        resident_bytes: resident.saturating_mul(page_size),
        virtual_bytes: size.saturating_mul(page_size),
    })
}

/// Portable reader backed by `sysinfo` process accounting.
pub struct SysinfoReader {
    sys: Mutex<System>,
    pid: Pid,
    total_bytes: u64,
}

impl SysinfoReader {
    pub fn current_process() -> GciResult<Self> {
        let pid = sysinfo::get_current_pid().map_err(|e| GciError::memory(e.to_string()))?;
        Ok(Self { sys: Mutex::new(System::new()), pid, total_bytes: total_memory_bytes() })
    }
}

impl MemoryReader for SysinfoReader {
    fn read(&self) -> GciResult<MemorySample> {
        let mut sys = self.sys.lock();
        if !sys.refresh_process(self.pid) {
            return Err(GciError::memory(format!("process {} not visible to sysinfo", self.pid)));
        }
        let p = sys
            .process(self.pid)
            .ok_or_else(|| GciError::memory(format!("process {} not visible to sysinfo", self.pid)))?;
        Ok(MemorySample { resident_bytes: p.memory(), virtual_bytes: p.virtual_memory() })
    }

    fn total_bytes(&self) -> u64 {
        self.total_bytes
    }
}

/// statm on Linux, sysinfo elsewhere.
pub fn default_reader() -> GciResult<Arc<dyn MemoryReader>> {
    if cfg!(target_os = "linux") {
        Ok(Arc::new(StatmReader::current_process()))
    } else {
        Ok(Arc::new(SysinfoReader::current_process()?))
    }
}
