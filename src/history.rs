//! Rolling record of reclamation durations and the Retry-After estimate built on it.

use std::time::Duration;

/// Fixed-capacity ring of the most recent reclamation durations.
pub struct HistoryTracker {
    slots: Box<[Duration]>,
    cursor: usize, // next write position
    len: usize,
}

impl HistoryTracker {
    /// Pre-seeded with `seed` so a prediction exists before any real reclamation.
    pub fn new(capacity: usize, seed: Duration) -> Self {
        let capacity = capacity.max(1);
        let mut h = Self { slots: vec![Duration::ZERO; capacity].into_boxed_slice(), cursor: 0, len: 0 };
        h.record(seed);
        h
    }

    /// Push a duration as the newest entry, evicting the oldest once full.
    pub fn record(&mut self, d: Duration) {
        let cap = self.slots.len();
        self.slots[self.cursor] = d;
        self.cursor = (self.cursor + 1) % cap;
        self.len = (self.len + 1).min(cap);
    }

    pub fn newest(&self) -> Duration {
        let cap = self.slots.len();
        self.slots[(self.cursor + cap - 1) % cap]
    }

    /// Entries newest first.
    pub fn iter(&self) -> impl Iterator<Item = Duration> + '_ {
        let cap = self.slots.len();
        (1..=self.len).map(move |i| self.slots[(self.cursor + cap - i) % cap])
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Newest duration plus the spread of recent ones, so callers are not told to
    /// come back too early when pauses are erratic.
    pub fn predict_duration(&self) -> Duration {
        let secs: Vec<f64> = self.iter().map(|d| d.as_secs_f64()).collect();
        let predicted = self.newest().as_secs_f64() + sample_std_dev(&secs);
        Duration::try_from_secs_f64(predicted).unwrap_or(Duration::MAX)
    }
}

/// Sample standard deviation (n - 1 denominator); 0 with fewer than two values.
pub fn sample_std_dev(values: &[f64]) -> f64 {
    let n = values.len();
    if n < 2 {
        return 0.0;
    }
    let mean = values.iter().sum::<f64>() / n as f64;
    let var = values.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (n - 1) as f64;
    var.sqrt()
}
