use std::time::Instant;

/// Caller-facing timestamp in nanoseconds. Zero and negative values are never
/// valid times.
pub type XrTime = i64;

/// Default distance between the monotonic clock origin and caller time, so
/// that every caller-facing timestamp is strictly positive.
const DEFAULT_EPOCH_OFFSET_NS: i64 = 1_000_000_000;

/// Correlates the device/monotonic clock domain with caller time.
#[derive(Debug, Clone)]
pub struct TimeKeeper {
    origin: Instant,
    offset_ns: i64,
}

impl Default for TimeKeeper {
    fn default() -> Self {
        Self::new(DEFAULT_EPOCH_OFFSET_NS)
    }
}

impl TimeKeeper {
    pub fn new(offset_ns: i64) -> Self {
        Self {
            origin: Instant::now(),
            offset_ns: offset_ns.max(1),
        }
    }

    /// Nanoseconds on the monotonic clock since this keeper was created.
    pub fn monotonic_now_ns(&self) -> u64 {
        u64::try_from(self.origin.elapsed().as_nanos()).unwrap_or(u64::MAX)
    }

    pub fn now(&self) -> XrTime {
        self.monotonic_to_ts(self.monotonic_now_ns())
    }

    pub fn ts_to_monotonic_ns(&self, time: XrTime) -> u64 {
        u64::try_from(time.saturating_sub(self.offset_ns)).unwrap_or(0)
    }

    pub fn monotonic_to_ts(&self, monotonic_ns: u64) -> XrTime {
        i64::try_from(monotonic_ns)
            .unwrap_or(i64::MAX)
            .saturating_add(self.offset_ns)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conversions_are_inverse() {
        let keeper = TimeKeeper::new(5_000);
        assert_eq!(keeper.monotonic_to_ts(100), 5_100);
        assert_eq!(keeper.ts_to_monotonic_ns(5_100), 100);
    }

    #[test]
    fn caller_time_is_always_positive() {
        let keeper = TimeKeeper::default();
        assert!(keeper.now() > 0);
        assert!(keeper.monotonic_to_ts(0) > 0);
    }

    #[test]
    fn times_before_origin_clamp_to_zero() {
        let keeper = TimeKeeper::new(1_000);
        assert_eq!(keeper.ts_to_monotonic_ns(10), 0);
    }
}
