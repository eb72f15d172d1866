//! Exponentially widening retention windows
//!
//! Bucket 0 is a short "hot" window; every later bucket doubles the base
//! interval: `bucket[k] = base * 2^(k-1)`. With a quota of N buckets at most
//! N snapshots survive a rotation, while the covered history grows
//! geometrically.

use crate::error::RotationError;
use chrono::Duration;

/// Default number of buckets
pub const DEFAULT_QUOTA: usize = 12;

/// Default hot window (bucket 0)
pub const DEFAULT_HOT_WINDOW: std::time::Duration = std::time::Duration::from_secs(5 * 60);

/// Default base interval (bucket 1)
pub const DEFAULT_BASE_INTERVAL: std::time::Duration = std::time::Duration::from_secs(60 * 60);

/// Ordered age thresholds, one per bucket
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeSeries {
    thresholds: Vec<Duration>,
}

impl TimeSeries {
    /// Build a series of `quota` buckets
    ///
    /// Fails if the quota or either window is zero, if the hot window is
    /// wider than the base interval, or if a bucket width overflows.
    pub fn new(
        quota: usize,
        hot_window: std::time::Duration,
        base_interval: std::time::Duration,
    ) -> Result<Self, RotationError> {
        if quota == 0 {
            return Err(RotationError::ZeroQuota);
        }
        if hot_window.is_zero() || base_interval.is_zero() {
            return Err(RotationError::ZeroInterval);
        }
        if quota > 1 && hot_window > base_interval {
            return Err(RotationError::HotWindowExceedsBase {
                hot_window,
                base_interval,
            });
        }

        let mut thresholds = Vec::with_capacity(quota);
        thresholds.push(to_threshold(hot_window, 0)?);

        for index in 1..quota {
            let width = u32::try_from(index - 1)
                .ok()
                .and_then(|shift| 1u32.checked_shl(shift))
                .and_then(|factor| base_interval.checked_mul(factor))
                .ok_or(RotationError::SeriesOverflow { index })?;
            thresholds.push(to_threshold(width, index)?);
        }

        Ok(Self { thresholds })
    }

    /// Series built from the default quota and windows
    pub fn standard() -> Result<Self, RotationError> {
        Self::new(DEFAULT_QUOTA, DEFAULT_HOT_WINDOW, DEFAULT_BASE_INTERVAL)
    }

    /// Number of buckets
    pub fn quota(&self) -> usize {
        self.thresholds.len()
    }

    /// Age thresholds in bucket order
    pub fn thresholds(&self) -> &[Duration] {
        &self.thresholds
    }

    /// Threshold of a single bucket
    pub fn threshold(&self, index: usize) -> Option<Duration> {
        self.thresholds.get(index).copied()
    }

    /// Threshold of the widest (last) bucket
    pub fn widest(&self) -> Duration {
        // Non-empty by construction
        self.thresholds[self.thresholds.len() - 1]
    }
}

fn to_threshold(width: std::time::Duration, index: usize) -> Result<Duration, RotationError> {
    Duration::from_std(width).map_err(|_| RotationError::SeriesOverflow { index })
}
