//! Static Space-Saving runner with a fixed per-partition capacity

use crate::common::{Result, SketchError};
use crate::runner::{publish_estimates, MethodRunner, RunnerConfig, WindowResult};
use crate::sketch::{aggregate_summaries, StreamSummary};
use std::hash::Hash;

/// Windowed top-n method with a fixed capacity `q = n`
///
/// The baseline variant: every window allocates `m` sketches of capacity `n`
/// regardless of how the distribution behaves. Useful as a comparison point
/// for the adaptive runner and as the cheapest configuration when the stream
/// is known to be stable.
///
/// # Examples
///
/// ```
/// use topn_oxide::runner::{MethodRunner, RunnerConfig, StaticRunner};
///
/// let mut runner = StaticRunner::new(&RunnerConfig::new(2, 3)).unwrap();
/// runner.initialize_sketches(0).unwrap();
/// for item in ["a", "a", "b"] {
///     runner.insert_item(0, item).unwrap();
/// }
/// runner.insert_item(1, "a").unwrap();
/// let result = runner.finalize_window(0).unwrap();
/// assert_eq!(result.estimates[0].item, "a");
/// ```
#[derive(Debug, Clone)]
pub struct StaticRunner<T> {
    m: usize,
    n: usize,
    q: usize,
    summaries: Vec<StreamSummary<T>>,
}

impl<T: Hash + Eq + Ord + Clone> StaticRunner<T> {
    /// Creates a static runner from a validated configuration
    ///
    /// Only `m` and `n` are consulted; the adaptive options are ignored.
    ///
    /// # Errors
    ///
    /// Returns `InvalidParameter` if the configuration is invalid.
    pub fn new(config: &RunnerConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            m: config.m,
            n: config.n,
            q: config.n,
            summaries: Vec::new(),
        })
    }

    /// Returns the fixed per-partition capacity
    pub fn capacity(&self) -> usize {
        self.q
    }
}

impl<T: Hash + Eq + Ord + Clone> MethodRunner<T> for StaticRunner<T> {
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
        Ok(WindowResult {
            window_id,
            estimates,
            telemetry,
            capacity_used: self.q,
            capacity_next: self.q,
        })
    }
}
