//! Point-in-time snapshot of heap statistics.

use std::fmt;

/// A snapshot of the statistics maintained by a tracking strategy.
///
/// All values are observed at a single quiescent point; under concurrent
/// allocation the individual fields are each accurate but may not describe
/// one single instant.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct HeapStats {
    /// Allocation events observed. Mirrors [`allocation_count`](Self::allocation_count);
    /// the strategies do not maintain a separate cumulative byte total.
    pub total_allocated: u64,

    /// Deallocation events observed. Mirrors [`deallocation_count`](Self::deallocation_count).
    pub total_freed: u64,

    /// Bytes currently outstanding (allocated and not yet freed).
    pub current_usage: u64,

    /// Historical maximum of [`current_usage`](Self::current_usage).
    pub peak_usage: u64,

    /// Number of allocation events.
    pub allocation_count: u64,

    /// Number of deallocation events.
    pub deallocation_count: u64,

    /// Number of reallocation events, counted regardless of whether the
    /// allocation grew or shrank.
    pub reallocation_count: u64,
}

impl fmt::Display for HeapStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "current: {} bytes, peak: {} bytes, allocs: {}, frees: {}, reallocs: {}",
            self.current_usage,
            self.peak_usage,
            self.allocation_count,
            self.deallocation_count,
            self.reallocation_count
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_all_zero() {
        let stats = HeapStats::default();
        assert_eq!(stats, HeapStats {
            total_allocated: 0,
            total_freed: 0,
            current_usage: 0,
            peak_usage: 0,
            allocation_count: 0,
            deallocation_count: 0,
            reallocation_count: 0,
        });
    }

    #[test]
    fn display_mentions_every_counter() {
        let stats = HeapStats {
            total_allocated: 3,
            total_freed: 2,
            current_usage: 100,
            peak_usage: 250,
            allocation_count: 3,
            deallocation_count: 2,
            reallocation_count: 1,
        };

        let text = stats.to_string();
        assert!(text.contains("current: 100"));
        assert!(text.contains("peak: 250"));
        assert!(text.contains("allocs: 3"));
        assert!(text.contains("frees: 2"));
        assert!(text.contains("reallocs: 1"));
    }

    static_assertions::assert_impl_all!(HeapStats: Send, Sync);
}
