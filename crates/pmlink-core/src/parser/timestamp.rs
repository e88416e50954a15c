// ── Wrapping timestamp reconstruction ──

use crate::profile::DEFAULT_MAX_TIMESTAMP;

/// Turns the device's wrapping millisecond counter into a logical,
/// non-decreasing timestamp.
///
/// A raw value smaller than the previous one counts as one wrap. Two wraps
/// between consecutive samples cannot be told apart from one.
#[derive(Debug, Clone)]
pub struct TimestampReconstructor {
    max_timestamp: u64,
    overflows: u64,
    last_raw: Option<u64>,
}

impl TimestampReconstructor {
    pub fn new(max_timestamp: u64) -> Self {
        Self {
            max_timestamp,
            overflows: 0,
            last_raw: None,
        }
    }

    /// Observe a raw device timestamp and return its logical value.
    pub fn logical(&mut self, raw: u64) -> u64 {
        if self.last_raw.is_some_and(|last| raw < last) {
            self.overflows += 1;
            tracing::debug!(raw, overflows = self.overflows, "device timestamp wrapped");
        }
        self.last_raw = Some(raw);
        raw.saturating_add(self.max_timestamp.saturating_mul(self.overflows))
    }

    pub fn overflows(&self) -> u64 {
        self.overflows
    }
}

impl Default for TimestampReconstructor {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_TIMESTAMP)
    }
}
