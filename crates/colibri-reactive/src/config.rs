//! Per-thread runtime configuration.

/// Default upper bound on queue generations processed by one flush.
pub const DEFAULT_MAX_FLUSH_CYCLES: usize = 100;

/// Tunables for the reactive runtime.
///
/// Installed per thread with [`configure`](crate::configure).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReactiveConfig {
    /// Maximum number of queue generations one [`flush`](crate::flush) may
    /// process. An effect that keeps re-triggering itself produces a new
    /// generation each time; once the budget is spent the remaining work stays
    /// queued for the next flush.
    pub max_flush_cycles: usize,
}

impl Default for ReactiveConfig {
    fn default() -> Self {
        Self {
            max_flush_cycles: DEFAULT_MAX_FLUSH_CYCLES,
        }
    }
}

impl ReactiveConfig {
    /// Set the flush cycle budget (clamped to at least 1).
    #[must_use]
    pub fn with_max_flush_cycles(mut self, cycles: usize) -> Self {
        self.max_flush_cycles = cycles.max(1);
        self
    }
}
