//! Windowed execution of sketch-based top-n methods
//!
//! A [`MethodRunner`] owns the per-partition sketches of one processing window
//! and knows how to merge them at window close. The [`WindowRunner`]
//! orchestrates a whole stream of windows over any `MethodRunner`, so the
//! static and adaptive variants share all routing and evaluation code.

mod adaptive_runner;
mod static_runner;
mod window;

pub use adaptive_runner::AdaptiveRunner;
pub use static_runner::StaticRunner;
pub use window::{WindowOutcome, WindowReport, WindowRunner, WindowTruth, WindowedStream};

use crate::common::validation::{
    validate_partition_count, validate_ratio, validate_unit_interval,
};
use crate::common::{Result, SketchError};
use crate::control::CapacityRule;
use crate::sketch::{StreamSummary, Telemetry};
use std::hash::Hash;

/// Contract shared by all windowed top-n methods
///
/// One window runs as `initialize_sketches`, a sequence of `insert_item`
/// calls, then `finalize_window`. Implementations own their sketches; callers
/// never touch partition state directly.
pub trait MethodRunner<T> {
    /// Allocates fresh per-partition sketches for the given window
    ///
    /// # Errors
    ///
    /// Returns `InvalidParameter` if sketch allocation fails.
    fn initialize_sketches(&mut self, window_id: u64) -> Result<()>;

    /// Routes one item into the sketch of `partition_id`
    ///
    /// # Errors
    ///
    /// Returns `EmptySketch` before `initialize_sketches`, or
    /// `InvalidParameter` for an out-of-range partition.
    fn insert_item(&mut self, partition_id: usize, item: T) -> Result<()>;

    /// Merges the window's sketches and publishes the top-n estimate
    ///
    /// # Errors
    ///
    /// Returns `EmptySketch` before `initialize_sketches`; aggregation errors
    /// propagate.
    fn finalize_window(&mut self, window_id: u64) -> Result<WindowResult<T>>;
}

/// One published heavy-hitter estimate
#[derive(Debug, Clone, PartialEq)]
pub struct Estimate<T> {
    /// The estimated item
    pub item: T,
    /// Estimated global count from the merged sketch
    pub count: u64,
    /// Estimated relative frequency (`count / N`)
    pub frequency: f64,
}

/// Result of one finalized window
#[derive(Debug, Clone)]
pub struct WindowResult<T> {
    /// The window this result belongs to
    pub window_id: u64,
    /// Items with estimated frequency above `1/n`, at most `n`, descending
    pub estimates: Vec<Estimate<T>>,
    /// Full aggregation telemetry for the window
    pub telemetry: Telemetry<T>,
    /// Per-partition sketch capacity used in this window
    pub capacity_used: usize,
    /// Capacity chosen for the next window (equal to `capacity_used` for
    /// static methods)
    pub capacity_next: usize,
}

/// Configuration shared by the windowed runners
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Number of worker partitions `m`
    pub m: usize,
    /// Target top-n size; defines the heavy-hitter line `1/n`
    pub n: usize,
    /// Lower clamp on adaptive capacity (defaults to `n`)
    pub q_min: usize,
    /// Optional upper clamp on adaptive capacity
    pub q_max: Option<usize>,
    /// Temporal-divergence smoothing factor (defaults to 0.5)
    pub alpha: f64,
    /// When set, the adaptive runner uses the coverage capacity rule with
    /// this tuning ratio in `(0, 1]`
    pub coverage_ratio: Option<f64>,
    /// When set, windows whose estimated distribution exceeds this normalised
    /// entropy are reported as skipped
    pub entropy_threshold: Option<f64>,
}

impl RunnerConfig {
    /// Creates a configuration with `m` partitions, target top-`n`, and
    /// defaults for everything else
    pub fn new(m: usize, n: usize) -> Self {
        Self {
            m,
            n,
            q_min: n,
            q_max: None,
            alpha: 0.5,
            coverage_ratio: None,
            entropy_threshold: None,
        }
    }

    /// Validates all option ranges
    ///
    /// # Errors
    ///
    /// Returns `InvalidParameter` naming the first offending option.
    pub fn validate(&self) -> Result<()> {
        validate_partition_count(self.m)?;
        if self.n == 0 {
            return Err(SketchError::InvalidParameter {
                param: "n".to_string(),
                value: self.n.to_string(),
                constraint: "must be greater than 0".to_string(),
            });
        }
        if self.q_min < self.n {
            return Err(SketchError::InvalidParameter {
                param: "q_min".to_string(),
                value: self.q_min.to_string(),
                constraint: format!("must be at least n = {}", self.n),
            });
        }
        if let Some(q_max) = self.q_max {
            if q_max < self.q_min {
                return Err(SketchError::InvalidParameter {
                    param: "q_max".to_string(),
                    value: q_max.to_string(),
                    constraint: format!("must be at least q_min = {}", self.q_min),
                });
            }
        }
        validate_unit_interval(self.alpha, "alpha")?;
        if let Some(r) = self.coverage_ratio {
            validate_ratio(r, "coverage_ratio")?;
        }
        if let Some(threshold) = self.entropy_threshold {
            validate_unit_interval(threshold, "entropy_threshold")?;
        }
        Ok(())
    }

    /// Returns the capacity rule implied by this configuration
    pub fn capacity_rule(&self) -> CapacityRule {
        match self.coverage_ratio {
            Some(r) => CapacityRule::Coverage { r },
            None => CapacityRule::Divergence,
        }
    }
}

/// Builds the published estimate list from a merged sketch
///
/// Keeps items whose estimated frequency clears `1/n`, at most `n` of them,
/// sorted by descending count with ties in item order.
fn publish_estimates<T>(merged: &StreamSummary<T>, n: usize) -> Vec<Estimate<T>>
where
    T: Hash + Eq + Ord + Clone,
{
    let total = merged.total_count();
    if total == 0 {
        return Vec::new();
    }
    let threshold = 1.0 / n as f64;
    let mut estimates: Vec<Estimate<T>> = merged
        .iter()
        .map(|(item, count, _)| Estimate {
            item: item.clone(),
            count,
            frequency: count as f64 / total as f64,
        })
        .filter(|estimate| estimate.frequency > threshold)
        .collect();
    estimates.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.item.cmp(&b.item)));
    estimates.truncate(n);
    estimates
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = RunnerConfig::new(4, 10);
        assert_eq!(config.m, 4);
        assert_eq!(config.n, 10);
        assert_eq!(config.q_min, 10);
        assert_eq!(config.alpha, 0.5);
        assert!(config.q_max.is_none());
        assert!(config.validate().is_ok());
        assert_eq!(config.capacity_rule(), CapacityRule::Divergence);
    }

    #[test]
    fn test_config_validation() {
        assert!(RunnerConfig::new(0, 10).validate().is_err());
        assert!(RunnerConfig::new(4, 0).validate().is_err());

        let mut config = RunnerConfig::new(4, 10);
        config.q_min = 5;
        assert!(config.validate().is_err());

        let mut config = RunnerConfig::new(4, 10);
        config.q_max = Some(5);
        assert!(config.validate().is_err());

        let mut config = RunnerConfig::new(4, 10);
        config.alpha = 1.5;
        assert!(config.validate().is_err());

        let mut config = RunnerConfig::new(4, 10);
        config.coverage_ratio = Some(0.0);
        assert!(config.validate().is_err());
        config.coverage_ratio = Some(0.15);
        assert!(config.validate().is_ok());
        assert_eq!(
            config.capacity_rule(),
            CapacityRule::Coverage { r: 0.15 }
        );
    }

    #[test]
    fn test_publish_estimates() {
        let mut merged: StreamSummary<&str> = StreamSummary::new(8).unwrap();
        for item in ["a", "a", "a", "a", "a", "b", "b", "c"] {
            merged.insert(item);
        }
        // N = 8, n = 2, threshold 0.5: only "a" clears it.
        let estimates = publish_estimates(&merged, 2);
        assert_eq!(estimates.len(), 1);
        assert_eq!(estimates[0].item, "a");
        assert_eq!(estimates[0].count, 5);
        assert!((estimates[0].frequency - 0.625).abs() < 1e-12);

        // n = 4, threshold 0.25: "b" sits exactly on the line and is excluded.
        let estimates = publish_estimates(&merged, 4);
        let items: Vec<_> = estimates.iter().map(|e| e.item).collect();
        assert_eq!(items, vec!["a"]);

        // n = 8, threshold 0.125: "b" clears it, "c" sits on the line.
        let estimates = publish_estimates(&merged, 8);
        let items: Vec<_> = estimates.iter().map(|e| e.item).collect();
        assert_eq!(items, vec!["a", "b"]);
    }

    #[test]
    fn test_publish_estimates_empty() {
        let merged: StreamSummary<&str> = StreamSummary::new(4).unwrap();
        assert!(publish_estimates(&merged, 3).is_empty());
    }
}
