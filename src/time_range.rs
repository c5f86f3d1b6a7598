use serde::{Deserialize, Serialize};
use std::fmt;

use crate::constants::Ns;

/// Inclusive time interval over which a trajectory parametrization is valid.
///
/// Units: nanoseconds, on the same timeline as the trajectory `t0`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeRange {
    pub low: Ns,
    pub high: Ns,
}

impl TimeRange {
    pub fn new(low: Ns, high: Ns) -> Self {
        Self { low, high }
    }

    /// Unbounded range, for trajectories with no native validity limit.
    pub fn infinite() -> Self {
        Self {
            low: f64::NEG_INFINITY,
            high: f64::INFINITY,
        }
    }

    pub fn contains(&self, time: Ns) -> bool {
        time >= self.low && time <= self.high
    }

    /// Duration of the interval.
    pub fn range(&self) -> Ns {
        self.high - self.low
    }

    pub fn overlaps(&self, other: &TimeRange) -> bool {
        self.low <= other.high && other.low <= self.high
    }

    /// Shrink this range to its intersection with `other`.
    pub fn restrict(&mut self, other: &TimeRange) {
        self.low = self.low.max(other.low);
        self.high = self.high.min(other.high);
    }
}

impl Default for TimeRange {
    fn default() -> Self {
        Self::infinite()
    }
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{} ns, {} ns]", self.low, self.high)
    }
}
