//! Caller-side guard against combination explosion.
//!
//! [`crate::generate`] never caps its output. Editors check the expected count here
//! before recomputing or materializing.

use serde::{Deserialize, Serialize};

/// Thresholds for a single product's combination count.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CombinationLimits {
    /// Counts above this produce a warning.
    pub warn_at: usize,
    /// Counts above this refuse materialization.
    pub max: usize,
}

impl Default for CombinationLimits {
    fn default() -> Self {
        Self {
            warn_at: 250,
            max: 5_000,
        }
    }
}

/// Outcome of [`CombinationLimits::check`].
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum LimitCheck {
    Within,
    Warn { count: usize, warn_at: usize },
    Exceeded { count: usize, max: usize },
}

impl CombinationLimits {
    pub fn new(warn_at: usize, max: usize) -> Self {
        Self { warn_at, max }
    }

    pub fn check(&self, count: usize) -> LimitCheck {
        if count > self.max {
            LimitCheck::Exceeded {
                count,
                max: self.max,
            }
        } else if count > self.warn_at {
            LimitCheck::Warn {
                count,
                warn_at: self.warn_at,
            }
        } else {
            LimitCheck::Within
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn check_classifies_counts() {
        let limits = CombinationLimits::new(10, 100);
        assert_eq!(limits.check(0), LimitCheck::Within);
        assert_eq!(limits.check(10), LimitCheck::Within);
        assert_eq!(limits.check(11), LimitCheck::Warn { count: 11, warn_at: 10 });
        assert_eq!(limits.check(100), LimitCheck::Warn { count: 100, warn_at: 10 });
        assert_eq!(limits.check(101), LimitCheck::Exceeded { count: 101, max: 100 });
    }
}
