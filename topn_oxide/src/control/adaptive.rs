//! Adaptive capacity control for per-window sketch sizing
//!
//! The controller chooses the next window's sketch capacity `q` so that the
//! per-partition sketches hold enough mass to cover every likely heavy hitter
//! despite skew across workers (spatial) and drift across windows (temporal).
//!
//! # Capacity rules
//!
//! Two rules are supported; a runner picks one at construction:
//!
//! - **Divergence** (default): `q = ceil(n * (1 + L + L_t))` where `L` is the
//!   maximum Jensen-Shannon divergence between any worker's local distribution
//!   and the merged global one, and `L_t` is an exponentially smoothed
//!   divergence between consecutive window distributions.
//! - **Coverage**: `q = ceil((n / r) * (2 - omega_min))` for a tuning ratio
//!   `r` in `(0, 1]`, driven by the minimum candidate coverage reported by the
//!   aggregator.
//!
//! Both rules clamp the result into `[q_min, q_max]`, with `q_min >= n` so the
//! sketch can always hold a full top-n. On a stationary, evenly partitioned
//! stream both divergences decay and the divergence rule settles at `q = n`.

use crate::common::validation::{validate_ratio, validate_unit_interval};
use crate::common::{Result, SketchError};
use crate::metrics::{spatial_divergence, temporal_divergence};
use crate::sketch::{StreamSummary, Telemetry};
use std::collections::HashMap;
use std::hash::Hash;

/// Rule used to derive the next window's capacity from telemetry
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CapacityRule {
    /// Size by spatial and temporal Jensen-Shannon divergence
    Divergence,
    /// Size by minimum candidate coverage, scaled by the tuning ratio `r`
    Coverage {
        /// Tuning ratio in `(0, 1]`; smaller values provision more capacity
        r: f64,
    },
}

/// Per-window state machine that emits the next sketch capacity
///
/// The controller is the only component carrying state across windows: the
/// previous global distribution, the smoothed temporal divergence, and the
/// current capacity. It is updated once per window, after aggregation, on the
/// orchestrator thread.
#[derive(Debug, Clone)]
pub struct AdaptiveController<T> {
    /// Target top-n size; also the capacity floor
    n: usize,
    /// Temporal smoothing factor in `[0, 1]`
    alpha: f64,
    /// Lower capacity clamp (at least `n`)
    q_min: usize,
    /// Optional upper capacity clamp
    q_max: Option<usize>,
    /// Capacity rule in effect
    rule: CapacityRule,
    /// Capacity for the upcoming window
    q: usize,
    /// Global distribution of the previous window
    prev_freqs: HashMap<T, f64>,
    /// Spatial divergence observed in the last update
    spatial: f64,
    /// Smoothed temporal divergence
    temporal: f64,
}

impl<T: Hash + Eq + Clone> AdaptiveController<T> {
    /// Creates a controller with the divergence rule and default bounds
    ///
    /// # Arguments
    ///
    /// * `n` - Target top-n size (must be >= 1)
    /// * `alpha` - Temporal smoothing factor in `[0, 1]`
    ///
    /// # Errors
    ///
    /// Returns `InvalidParameter` if `n` is 0 or `alpha` is out of range.
    ///
    /// # Examples
    ///
    /// ```
    /// use topn_oxide::control::AdaptiveController;
    ///
    /// let controller: AdaptiveController<u64> = AdaptiveController::new(10, 0.5).unwrap();
    /// assert_eq!(controller.capacity(), 10);
    /// ```
    pub fn new(n: usize, alpha: f64) -> Result<Self> {
        Self::configured(n, alpha, n, None, CapacityRule::Divergence)
    }

    /// Creates a fully configured controller
    ///
    /// # Errors
    ///
    /// Returns `InvalidParameter` if `n` is 0, `alpha` is outside `[0, 1]`,
    /// `q_min < n`, `q_max < q_min`, or a coverage ratio is outside `(0, 1]`.
    pub fn configured(
        n: usize,
        alpha: f64,
        q_min: usize,
        q_max: Option<usize>,
        rule: CapacityRule,
    ) -> Result<Self> {
        if n == 0 {
            return Err(SketchError::InvalidParameter {
                param: "n".to_string(),
                value: n.to_string(),
                constraint: "must be greater than 0".to_string(),
            });
        }
        validate_unit_interval(alpha, "alpha")?;
        if q_min < n {
            return Err(SketchError::InvalidParameter {
                param: "q_min".to_string(),
                value: q_min.to_string(),
                constraint: format!("must be at least n = {}", n),
            });
        }
        if let Some(q_max) = q_max {
            if q_max < q_min {
                return Err(SketchError::InvalidParameter {
                    param: "q_max".to_string(),
                    value: q_max.to_string(),
                    constraint: format!("must be at least q_min = {}", q_min),
                });
            }
        }
        if let CapacityRule::Coverage { r } = rule {
            validate_ratio(r, "r")?;
        }
        Ok(Self {
            n,
            alpha,
            q_min,
            q_max,
            rule,
            q: q_min,
            prev_freqs: HashMap::new(),
            spatial: 0.0,
            temporal: 0.0,
        })
    }

    /// Returns the capacity to use for the upcoming window
    pub fn capacity(&self) -> usize {
        self.q
    }

    /// Returns the spatial divergence observed in the last update
    pub fn spatial(&self) -> f64 {
        self.spatial
    }

    /// Returns the smoothed temporal divergence
    pub fn temporal(&self) -> f64 {
        self.temporal
    }

    /// Updates the controller with a finished window and returns the next capacity
    ///
    /// `summaries` are the window's worker sketches and `telemetry` the
    /// aggregation output for the same window. A degenerate window
    /// (`telemetry.total == 0`) resets the divergence state and returns the
    /// capacity floor.
    pub fn observe_window(
        &mut self,
        summaries: &[StreamSummary<T>],
        telemetry: &Telemetry<T>,
    ) -> usize {
        if telemetry.total == 0 {
            self.spatial = 0.0;
            self.temporal = 0.0;
            self.prev_freqs.clear();
            self.q = self.q_min;
            return self.q;
        }

        let global = telemetry.global_frequencies();
        self.spatial = spatial_divergence(summaries, &global);
        self.temporal = if self.prev_freqs.is_empty() {
            0.0
        } else {
            temporal_divergence(&self.prev_freqs, &global, self.alpha, self.temporal)
        };

        let raw = match self.rule {
            CapacityRule::Divergence => {
                (self.n as f64 * (1.0 + self.spatial + self.temporal)).ceil()
            }
            CapacityRule::Coverage { r } => {
                ((self.n as f64 / r) * (2.0 - telemetry.omega_min)).ceil()
            }
        };

        let mut q = (raw as usize).max(self.q_min);
        if let Some(q_max) = self.q_max {
            q = q.min(q_max);
        }
        self.prev_freqs = global;
        self.q = q;
        q
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sketch::aggregate_summaries;

    fn window(worker_streams: &[&[&'static str]], q: usize) -> Vec<StreamSummary<&'static str>> {
        worker_streams
            .iter()
            .map(|stream| {
                let mut sketch = StreamSummary::new(q).unwrap();
                for item in *stream {
                    sketch.insert(*item);
                }
                sketch
            })
            .collect()
    }

    #[test]
    fn test_construction_validation() {
        assert!(AdaptiveController::<u32>::new(0, 0.5).is_err());
        assert!(AdaptiveController::<u32>::new(5, -0.1).is_err());
        assert!(AdaptiveController::<u32>::new(5, 1.1).is_err());
        assert!(AdaptiveController::<u32>::configured(5, 0.5, 3, None, CapacityRule::Divergence)
            .is_err());
        assert!(
            AdaptiveController::<u32>::configured(5, 0.5, 8, Some(6), CapacityRule::Divergence)
                .is_err()
        );
        assert!(AdaptiveController::<u32>::configured(
            5,
            0.5,
            5,
            None,
            CapacityRule::Coverage { r: 0.0 }
        )
        .is_err());
        assert!(AdaptiveController::<u32>::new(5, 0.0).is_ok());
        assert!(AdaptiveController::<u32>::new(5, 1.0).is_ok());
    }

    #[test]
    fn test_stationary_stream_converges_to_n() {
        // Both workers see the same distribution in every window; spatial and
        // temporal divergence stay at zero and q stays at the floor.
        let mut controller: AdaptiveController<&str> = AdaptiveController::new(4, 0.5).unwrap();
        for _ in 0..3 {
            let q = controller.capacity();
            let summaries = window(&[&["a", "a", "b", "c"], &["a", "a", "b", "c"]], q);
            let (_, telemetry) = aggregate_summaries(&summaries, q * 2, 4).unwrap();
            let next = controller.observe_window(&summaries, &telemetry);
            assert_eq!(next, 4);
        }
        assert_eq!(controller.spatial(), 0.0);
        assert_eq!(controller.temporal(), 0.0);
    }

    #[test]
    fn test_skewed_partitions_grow_capacity() {
        let mut controller: AdaptiveController<&str> = AdaptiveController::new(2, 0.5).unwrap();
        let q = controller.capacity();
        // Workers see disjoint keys: strong spatial divergence.
        let summaries = window(&[&["a", "a", "a"], &["b", "b", "b"]], q);
        let (_, telemetry) = aggregate_summaries(&summaries, q * 2, 2).unwrap();
        let next = controller.observe_window(&summaries, &telemetry);
        assert!(next > 2, "expected capacity above the floor, got {}", next);
        assert!(controller.spatial() > 0.0);
    }

    #[test]
    fn test_temporal_drift_is_smoothed() {
        let mut controller: AdaptiveController<&str> = AdaptiveController::new(2, 0.5).unwrap();

        let first = window(&[&["a", "a", "b"]], 4);
        let (_, telemetry) = aggregate_summaries(&first, 4, 2).unwrap();
        controller.observe_window(&first, &telemetry);
        assert_eq!(controller.temporal(), 0.0);

        // The distribution flips completely; the EMA takes half of the jump.
        let second = window(&[&["c", "c", "d"]], 4);
        let (_, telemetry) = aggregate_summaries(&second, 4, 2).unwrap();
        controller.observe_window(&second, &telemetry);
        assert!(controller.temporal() > 0.0);
        assert!(controller.temporal() <= 0.5 + 1e-12);
    }

    #[test]
    fn test_degenerate_window_resets() {
        let mut controller: AdaptiveController<&str> = AdaptiveController::new(3, 0.5).unwrap();
        let busy = window(&[&["a", "b", "a"]], 3);
        let (_, telemetry) = aggregate_summaries(&busy, 3, 3).unwrap();
        controller.observe_window(&busy, &telemetry);

        let idle = window(&[&[]], 3);
        let (_, telemetry) = aggregate_summaries(&idle, 3, 3).unwrap();
        let next = controller.observe_window(&idle, &telemetry);
        assert_eq!(next, 3);
        assert_eq!(controller.spatial(), 0.0);
        assert_eq!(controller.temporal(), 0.0);
    }

    #[test]
    fn test_q_max_clamps() {
        let mut controller: AdaptiveController<&str> =
            AdaptiveController::configured(2, 0.5, 2, Some(3), CapacityRule::Divergence).unwrap();
        let summaries = window(&[&["a", "a", "a"], &["b", "b", "b"]], 2);
        let (_, telemetry) = aggregate_summaries(&summaries, 4, 2).unwrap();
        let next = controller.observe_window(&summaries, &telemetry);
        assert!(next <= 3);
        assert!(next >= 2);
    }

    #[test]
    fn test_coverage_rule() {
        let mut controller: AdaptiveController<&str> = AdaptiveController::configured(
            2,
            0.5,
            2,
            None,
            CapacityRule::Coverage { r: 0.5 },
        )
        .unwrap();
        // Disjoint workers: candidates are covered by half the mass each, so
        // omega_min = 0.5 and q = ceil((2 / 0.5) * 1.5) = 6.
        let summaries = window(&[&["a", "a"], &["b", "b"]], 2);
        let (_, telemetry) = aggregate_summaries(&summaries, 4, 2).unwrap();
        let next = controller.observe_window(&summaries, &telemetry);
        assert_eq!(next, 6);
    }
}
