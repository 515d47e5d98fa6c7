//! Adaptive Space-Saving runner with divergence-driven capacity

use crate::common::{Result, SketchError};
use crate::control::AdaptiveController;
use crate::runner::{publish_estimates, MethodRunner, RunnerConfig, WindowResult};
use crate::sketch::{aggregate_summaries, StreamSummary};
use std::hash::Hash;

/// Windowed top-n method whose per-partition capacity tracks the stream
///
/// Each window runs at the capacity the [`AdaptiveController`] chose after the
/// previous window: spatially skewed partitions or drifting distributions
/// grow the sketches, stationary streams let them shrink back to `n`. The
/// merged sketch is sized at `q * m`, the union bound over all worker
/// sketches, so merging never needs to evict.
///
/// The capacity rule (divergence or coverage) comes from the configuration;
/// see [`RunnerConfig::capacity_rule`].
///
/// # Examples
///
/// ```
/// use topn_oxide::runner::{AdaptiveRunner, MethodRunner, RunnerConfig};
///
/// let mut runner = AdaptiveRunner::new(&RunnerConfig::new(2, 2)).unwrap();
/// runner.initialize_sketches(0).unwrap();
/// for item in ["a", "a", "b"] {
///     runner.insert_item(0, item).unwrap();
/// }
/// for item in ["c", "c", "d"] {
///     runner.insert_item(1, item).unwrap();
/// }
/// let result = runner.finalize_window(0).unwrap();
/// // Disjoint partitions: the controller provisions above the floor.
/// assert!(result.capacity_next > 2);
/// ```
#[derive(Debug, Clone)]
pub struct AdaptiveRunner<T> {
    m: usize,
    n: usize,
    q: usize,
    controller: AdaptiveController<T>,
    summaries: Vec<StreamSummary<T>>,
}

impl<T: Hash + Eq + Ord + Clone> AdaptiveRunner<T> {
    /// Creates an adaptive runner from a validated configuration
    ///
    /// # Errors
    ///
    /// Returns `InvalidParameter` if the configuration is invalid.
    pub fn new(config: &RunnerConfig) -> Result<Self> {
        config.validate()?;
        let controller = AdaptiveController::configured(
            config.n,
            config.alpha,
            config.q_min,
            config.q_max,
            config.capacity_rule(),
        )?;
        let q = controller.capacity();
        Ok(Self {
            m: config.m,
            n: config.n,
            q,
            controller,
            summaries: Vec::new(),
        })
    }

    /// Returns the per-partition capacity of the current window
    pub fn capacity(&self) -> usize {
        self.q
    }

    /// Returns the controller driving this runner
    pub fn controller(&self) -> &AdaptiveController<T> {
        &self.controller
    }
}

impl<T: Hash + Eq + Ord + Clone> MethodRunner<T> for AdaptiveRunner<T> {
    fn initialize_sketches(&mut self, _window_id: u64) -> Result<()> {
        self.summaries = (0..self.m)
            .map(|_| StreamSummary::new(self.q))
            .collect::<Result<Vec<_>>>()?;
        Ok(())
    }

    fn insert_item(&mut self, partition_id: usize, item: T) -> Result<()> {
        if self.summaries.is_empty() {
            return Err(SketchError::EmptySketch {
                operation: "insert_item".to_string(),
            });
        }
        let Some(summary) = self.summaries.get_mut(partition_id) else {
            return Err(SketchError::InvalidParameter {
                param: "partition_id".to_string(),
                value: partition_id.to_string(),
                constraint: format!("must be less than m = {}", self.m),
            });
        };
        summary.insert(item);
        Ok(())
    }

    fn finalize_window(&mut self, window_id: u64) -> Result<WindowResult<T>> {
        if self.summaries.is_empty() {
            return Err(SketchError::EmptySketch {
                operation: "finalize_window".to_string(),
            });
        }
        let (merged, telemetry) =
            aggregate_summaries(&self.summaries, self.q * self.m, self.n)?;
        let estimates = publish_estimates(&merged, self.n);
        let capacity_next = self.controller.observe_window(&self.summaries, &telemetry);
        let result = WindowResult {
            window_id,
            estimates,
            telemetry,
            capacity_used: self.q,
            capacity_next,
        };
        self.q = capacity_next;
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run_window(
        runner: &mut AdaptiveRunner<&'static str>,
        window_id: u64,
        partitions: &[&[&'static str]],
    ) -> WindowResult<&'static str> {
        runner.initialize_sketches(window_id).unwrap();
        for (partition_id, items) in partitions.iter().enumerate() {
            for item in *items {
                runner.insert_item(partition_id, item).unwrap();
            }
        }
        runner.finalize_window(window_id).unwrap()
    }

    #[test]
    fn test_capacity_follows_controller() {
        let mut runner: AdaptiveRunner<&str> =
            AdaptiveRunner::new(&RunnerConfig::new(2, 2)).unwrap();
        assert_eq!(runner.capacity(), 2);

        // Disjoint partitions force spatial divergence and a larger q.
        let result = run_window(&mut runner, 0, &[&["a", "a", "a"], &["b", "b", "b"]]);
        assert_eq!(result.capacity_used, 2);
        assert!(result.capacity_next > 2);
        assert_eq!(runner.capacity(), result.capacity_next);
    }

    #[test]
    fn test_stationary_stream_returns_to_floor() {
        let mut runner: AdaptiveRunner<&str> =
            AdaptiveRunner::new(&RunnerConfig::new(2, 3)).unwrap();
        let partitions: &[&[&str]] = &[&["a", "a", "b", "c"], &["a", "a", "b", "c"]];
        let mut last = 0;
        for window in 0..4 {
            let result = run_window(&mut runner, window, partitions);
            last = result.capacity_next;
        }
        assert_eq!(last, 3);
        assert_eq!(runner.controller().temporal(), 0.0);
    }

    #[test]
    fn test_lifecycle_errors() {
        let mut runner: AdaptiveRunner<&str> =
            AdaptiveRunner::new(&RunnerConfig::new(2, 2)).unwrap();
        assert!(matches!(
            runner.insert_item(0, "a"),
            Err(SketchError::EmptySketch { .. })
        ));
        runner.initialize_sketches(0).unwrap();
        assert!(matches!(
            runner.insert_item(5, "a"),
            Err(SketchError::InvalidParameter { .. })
        ));
    }

    #[test]
    fn test_empty_window_resets_capacity() {
        let mut runner: AdaptiveRunner<&str> =
            AdaptiveRunner::new(&RunnerConfig::new(2, 2)).unwrap();
        run_window(&mut runner, 0, &[&["a", "a", "a"], &["b", "b", "b"]]);
        assert!(runner.capacity() > 2);

        let result = run_window(&mut runner, 1, &[&[], &[]]);
        assert_eq!(result.capacity_next, 2);
        assert!(result.estimates.is_empty());
        assert_eq!(runner.capacity(), 2);
    }

    #[test]
    fn test_coverage_rule_runner() {
        let mut config = RunnerConfig::new(2, 2);
        config.coverage_ratio = Some(0.5);
        let mut runner: AdaptiveRunner<&str> = AdaptiveRunner::new(&config).unwrap();

        let result = run_window(&mut runner, 0, &[&["a", "a"], &["b", "b"]]);
        // omega_min = 0.5 over the candidates: q = ceil((2 / 0.5) * 1.5) = 6.
        assert_eq!(result.capacity_next, 6);
    }
}
