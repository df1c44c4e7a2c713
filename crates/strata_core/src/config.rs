//! Store configuration.

use std::time::Duration;

/// Configuration for opening a [`crate::Store`].
#[derive(Debug, Clone)]
pub struct Config {
    /// Whether to create the store directory if it doesn't exist.
    pub create_if_missing: bool,

    /// Maximum size of the active segment before it is sealed and a
    /// fresh one takes its place.
    pub max_segment_size: u64,

    /// Whether to fsync the active segment after every write.
    ///
    /// The append itself is the durability point of the contract; this
    /// trades throughput for crash safety against OS-level loss.
    pub sync_on_write: bool,

    /// Segment count at which the compactor merges sealed segments.
    pub compaction_threshold: usize,

    /// How often the compactor wakes to check the segment count.
    ///
    /// `Duration::ZERO` disables background compaction entirely.
    pub compaction_interval: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            create_if_missing: true,
            max_segment_size: 256 * 1024 * 1024, // 256 MB
            sync_on_write: false,
            compaction_threshold: 3,
            compaction_interval: Duration::from_millis(500),
        }
    }
}

impl Config {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether to create the store directory if missing.
    #[must_use]
    pub const fn create_if_missing(mut self, value: bool) -> Self {
        self.create_if_missing = value;
        self
    }

    /// Sets the maximum active-segment size.
    #[must_use]
    pub const fn max_segment_size(mut self, size: u64) -> Self {
        self.max_segment_size = size;
        self
    }

    /// Sets whether to fsync after every write.
    #[must_use]
    pub const fn sync_on_write(mut self, value: bool) -> Self {
        self.sync_on_write = value;
        self
    }

    /// Sets the segment count that triggers compaction.
    #[must_use]
    pub const fn compaction_threshold(mut self, count: usize) -> Self {
        self.compaction_threshold = count;
        self
    }

    /// Sets the compactor wake interval.
    #[must_use]
    pub const fn compaction_interval(mut self, interval: Duration) -> Self {
        self.compaction_interval = interval;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = Config::default();
        assert!(config.create_if_missing);
        assert!(!config.sync_on_write);
        assert_eq!(config.compaction_threshold, 3);
        assert_eq!(config.compaction_interval, Duration::from_millis(500));
    }

    #[test]
    fn builder_pattern() {
        let config = Config::new()
            .create_if_missing(false)
            .max_segment_size(1024)
            .compaction_interval(Duration::ZERO);

        assert!(!config.create_if_missing);
        assert_eq!(config.max_segment_size, 1024);
        assert!(config.compaction_interval.is_zero());
    }
}
