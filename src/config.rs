use crate::error::{GciError, GciResult};
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_SHEDDING_THRESHOLD: f64 = 0.2;
pub const DEFAULT_UNAVAILABILITY_SECONDS: u64 = 1;
pub const DEFAULT_MIN_WINDOW: u64 = 40;
pub const DEFAULT_MAX_WINDOW: u64 = 400;
pub const DEFAULT_HISTORY_SIZE: usize = 5;

/// Interceptor tuning knobs with the stock defaults and builder chaining.
#[derive(Clone, Debug, PartialEq)]
pub struct GciOptions {
    /// Shed when memory growth since the last reclamation exceeds this fraction of total memory.
    pub shedding_threshold: f64,
    /// Seed for the reclamation history, so a Retry-After estimate exists before the first pass.
    pub default_unavailability: Duration,
    pub min_window: u64,
    pub max_window: u64,
    pub history_size: usize,
}

impl Default for GciOptions {
    fn default() -> Self {
        Self {
            shedding_threshold: DEFAULT_SHEDDING_THRESHOLD,
            default_unavailability: Duration::from_secs(DEFAULT_UNAVAILABILITY_SECONDS),
            min_window: DEFAULT_MIN_WINDOW,
            max_window: DEFAULT_MAX_WINDOW,
            history_size: DEFAULT_HISTORY_SIZE,
        }
    }
}

impl GciOptions {
    pub fn with_shedding_threshold(mut self, threshold: f64) -> Self {
        self.shedding_threshold = threshold;
        self
    }
    pub fn with_default_unavailability(mut self, d: Duration) -> Self {
        self.default_unavailability = d;
        self
    }
    pub fn with_window_bounds(mut self, min: u64, max: u64) -> Self {
        self.min_window = min;
        self.max_window = max;
        self
    }
    pub fn with_history_size(mut self, n: usize) -> Self {
        self.history_size = n;
        self
    }

    /// Defaults overlaid with any `GCI_*` environment variables that are set:
    /// - GCI_SHEDDING_THRESHOLD: fraction, e.g. `0.25`
    /// - GCI_DEFAULT_UNAVAILABILITY_SECS: seconds, fractional allowed
    /// - GCI_MIN_WINDOW / GCI_MAX_WINDOW: requests between checks
    /// - GCI_HISTORY_SIZE: number of reclamation durations kept
    pub fn from_env() -> GciResult<Self> {
        let mut o = Self::default();
        if let Some(v) = env_parse::<f64>("GCI_SHEDDING_THRESHOLD")? {
            o.shedding_threshold = v;
        }
        if let Some(v) = env_parse::<f64>("GCI_DEFAULT_UNAVAILABILITY_SECS")? {
            o.default_unavailability = Duration::try_from_secs_f64(v)
                .map_err(|_| GciError::config(format!("GCI_DEFAULT_UNAVAILABILITY_SECS out of range: {v}")))?;
        }
        if let Some(v) = env_parse::<u64>("GCI_MIN_WINDOW")? {
            o.min_window = v;
        }
        if let Some(v) = env_parse::<u64>("GCI_MAX_WINDOW")? {
            o.max_window = v;
        }
        if let Some(v) = env_parse::<usize>("GCI_HISTORY_SIZE")? {
            o.history_size = v;
        }
        Ok(o)
    }

    /// Reject settings the interceptor cannot run with. Called before any traffic is admitted.
    pub fn validate(&self) -> GciResult<()> {
        let t = self.shedding_threshold;
        if !t.is_finite() || t <= 0.0 || t > 1.0 {
            return Err(GciError::config(format!("shedding threshold must be in (0, 1], got {t}")));
        }
        if self.min_window == 0 {
            return Err(GciError::config("min window must be at least 1"));
        }
        if self.min_window > self.max_window {
            return Err(GciError::config(format!(
                "min window {} exceeds max window {}",
                self.min_window, self.max_window
            )));
        }
        if self.history_size == 0 {
            return Err(GciError::config("history size must be at least 1"));
        }
        Ok(())
    }
}

fn env_parse<T: FromStr>(key: &str) -> GciResult<Option<T>> {
    match std::env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| GciError::config(format!("{key} is set but not parsable: {raw:?}"))),
        _ => Ok(None),
    }
}
