//! Stream-of-windows orchestration and evaluation
//!
//! The [`WindowRunner`] drives any [`MethodRunner`] over a windowed stream
//! descriptor: it allocates sketches, routes every item to its partition,
//! finalizes, and turns downstream errors into per-window failure reports so
//! one bad window never stops the stream. When ground truth is available it
//! also scores each window's estimate; when an entropy threshold is set,
//! near-uniform windows are reported as skipped instead of scored.

use crate::common::validation::validate_unit_interval;
use crate::common::{Result, SketchError};
use crate::metrics::{normalized_entropy, shannon_entropy, topn_accuracy, AccuracyReport};
use crate::runner::{MethodRunner, WindowResult};
use std::collections::{BTreeMap, HashMap};
use std::hash::Hash;

/// A windowed stream descriptor: window id -> partition id -> ordered items
pub type WindowedStream<T> = BTreeMap<u64, BTreeMap<usize, Vec<T>>>;

/// Ground truth for one window, used only for evaluation
#[derive(Debug, Clone)]
pub struct WindowTruth<T> {
    /// Label of the distribution the window was drawn from
    pub distribution: String,
    /// True per-item counts
    pub counts: HashMap<T, u64>,
    /// The top-n size the truth was prepared for
    pub n_hint: usize,
}

/// Outcome of one orchestrated window
#[derive(Debug, Clone)]
pub enum WindowOutcome<T> {
    /// The window finalized; accuracy is present when ground truth was given
    Completed {
        /// The method's published result
        result: WindowResult<T>,
        /// Accuracy against ground truth, if available
        accuracy: Option<AccuracyReport>,
    },
    /// The window finalized but its estimate was near-uniform, so it was not
    /// scored
    Skipped {
        /// The method's published result
        result: WindowResult<T>,
        /// The normalised entropy that tripped the threshold
        norm_entropy: f64,
    },
    /// A downstream operation failed; the stream continues with the next
    /// window
    Failed {
        /// The error that ended the window
        error: SketchError,
    },
}

/// One entry of the orchestration report
#[derive(Debug, Clone)]
pub struct WindowReport<T> {
    /// The window this entry belongs to
    pub window_id: u64,
    /// What happened to the window
    pub outcome: WindowOutcome<T>,
}

/// Orchestrates a `MethodRunner` over a stream of windows
///
/// # Examples
///
/// ```
/// use std::collections::BTreeMap;
/// use topn_oxide::runner::{
///     AdaptiveRunner, RunnerConfig, WindowOutcome, WindowRunner, WindowedStream,
/// };
///
/// let mut runner = AdaptiveRunner::new(&RunnerConfig::new(2, 2)).unwrap();
/// let mut stream: WindowedStream<&str> = BTreeMap::new();
/// stream.insert(
///     0,
///     BTreeMap::from([(0, vec!["a", "a", "b"]), (1, vec!["a", "c", "c"])]),
/// );
///
/// let reports = WindowRunner::new().run(&mut runner, &stream, None);
/// assert_eq!(reports.len(), 1);
/// assert!(matches!(reports[0].outcome, WindowOutcome::Completed { .. }));
/// ```
#[derive(Debug, Clone, Default)]
pub struct WindowRunner {
    entropy_threshold: Option<f64>,
}

impl WindowRunner {
    /// Creates a runner that scores every completed window
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a runner that skips scoring windows whose estimated
    /// distribution has normalised entropy above `threshold`
    ///
    /// # Errors
    ///
    /// Returns `InvalidParameter` if `threshold` is outside `[0, 1]`.
    pub fn with_entropy_threshold(threshold: f64) -> Result<Self> {
        validate_unit_interval(threshold, "entropy_threshold")?;
        Ok(Self {
            entropy_threshold: Some(threshold),
        })
    }

    /// Runs every window of `stream` through `runner`
    ///
    /// Windows are processed in ascending id order. A failing window is
    /// reported as [`WindowOutcome::Failed`] and the run continues.
    pub fn run<T, R>(
        &self,
        runner: &mut R,
        stream: &WindowedStream<T>,
        truth: Option<&BTreeMap<u64, WindowTruth<T>>>,
    ) -> Vec<WindowReport<T>>
    where
        T: Hash + Eq + Ord + Clone,
        R: MethodRunner<T>,
    {
        stream
            .iter()
            .map(|(&window_id, partitions)| {
                let window_truth = truth.and_then(|t| t.get(&window_id));
                let outcome = match self.run_window(runner, window_id, partitions, window_truth)
                {
                    Ok(outcome) => outcome,
                    Err(error) => WindowOutcome::Failed { error },
                };
                WindowReport { window_id, outcome }
            })
            .collect()
    }

    fn run_window<T, R>(
        &self,
        runner: &mut R,
        window_id: u64,
        partitions: &BTreeMap<usize, Vec<T>>,
        truth: Option<&WindowTruth<T>>,
    ) -> Result<WindowOutcome<T>>
    where
        T: Hash + Eq + Ord + Clone,
        R: MethodRunner<T>,
    {
        runner.initialize_sketches(window_id)?;
        for (&partition_id, items) in partitions {
            for item in items {
                runner.insert_item(partition_id, item.clone())?;
            }
        }
        let result = runner.finalize_window(window_id)?;

        if let Some(threshold) = self.entropy_threshold {
            let freqs: HashMap<T, f64> = result
                .estimates
                .iter()
                .map(|estimate| (estimate.item.clone(), estimate.frequency))
                .collect();
            let norm_entropy = normalized_entropy(shannon_entropy(&freqs), freqs.len());
            if norm_entropy > threshold {
                return Ok(WindowOutcome::Skipped {
                    result,
                    norm_entropy,
                });
            }
        }

        let accuracy = truth.and_then(|truth| score_window(&result, truth));
        Ok(WindowOutcome::Completed { result, accuracy })
    }
}

/// Scores one window's estimate against ground truth
///
/// The true heavy hitters are the items whose true frequency clears
/// `1 / n_hint`, capped at `n_hint` by descending count. Returns `None` for
/// unusable truth (`n_hint` of 0 or an empty window).
fn score_window<T: Hash + Eq + Ord + Clone>(
    result: &WindowResult<T>,
    truth: &WindowTruth<T>,
) -> Option<AccuracyReport> {
    if truth.n_hint == 0 {
        return None;
    }
    let total: u64 = truth.counts.values().sum();
    if total == 0 {
        return None;
    }

    let threshold = 1.0 / truth.n_hint as f64;
    let mut actual: Vec<(T, u64, f64)> = truth
        .counts
        .iter()
        .map(|(item, &count)| (item.clone(), count, count as f64 / total as f64))
        .filter(|(_, _, frequency)| *frequency > threshold)
        .collect();
    actual.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    actual.truncate(truth.n_hint);

    let estimated: Vec<(T, u64, f64)> = result
        .estimates
        .iter()
        .map(|estimate| (estimate.item.clone(), estimate.count, estimate.frequency))
        .collect();
    Some(topn_accuracy(&actual, &estimated))
}
