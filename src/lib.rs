mod config;
mod error;
mod history;
mod interceptor;
mod mem;
mod monitor;
mod reclaim;
mod sampling;
mod util;

#[cfg(feature = "http")]
mod http;

pub use crate::config::{
    GciOptions, DEFAULT_HISTORY_SIZE, DEFAULT_MAX_WINDOW, DEFAULT_MIN_WINDOW, DEFAULT_SHEDDING_THRESHOLD,
    DEFAULT_UNAVAILABILITY_SECONDS,
};
pub use crate::error::{GciError, GciResult};

// Interceptor front-end and the per-request handle threaded through both hooks.
pub use crate::interceptor::{
    GciBuilder, GciStats, Interceptor, RejectResponse, RequestContext, RequestState, ShedDecision,
};

// Building blocks, exposed for embedders that drive them directly.
pub use crate::history::{sample_std_dev, HistoryTracker};
pub use crate::monitor::HeapMonitor;
pub use crate::sampling::{next_window, should_check, SamplingController};

// Capabilities: memory accounting, reclamation control, time.
pub use crate::mem::{
    default_reader, page_size, parse_statm, total_memory_bytes, MemoryReader, MemorySample, StatmReader,
    SysinfoReader,
};
#[cfg(all(target_os = "linux", target_env = "gnu"))]
pub use crate::reclaim::MallocTrim;
pub use crate::reclaim::{platform_policy, Clock, NoopPolicy, ReclaimFn, ReclamationPolicy, SystemClock};

pub use crate::util::init_tracing_once;

#[cfg(feature = "http")]
pub use crate::http::{gci_middleware, with_gci};
