//! Merging of per-partition sketches and global confidence telemetry
//!
//! At the end of a window every partition holds a [`StreamSummary`] built from
//! its share of the stream. [`aggregate_summaries`] folds those sketches into
//! one global sketch and, in the same pass, derives the per-item confidence
//! telemetry the adaptive controller feeds on:
//!
//! - `p_hat` — point estimate of an item's global frequency,
//! - `p_floor` / `p_ceil` — lower/upper probability bounds from the summed
//!   overestimations and the mass of workers that did not track the item,
//! - `omega` — coverage: the share of total mass contributed by workers that
//!   did track the item,
//! - the candidate set (top-n plus every challenger whose `p_ceil` clears the
//!   heavy-hitter line `1/n`), its minimum coverage, and the 95th percentile
//!   of residual coverage across it.
//!
//! Merging uses [`StreamSummary::merge_element`] and therefore never evicts;
//! the caller sizes the merged sketch (the sum of worker capacities is always
//! sufficient), and a target too small for the union of tracked items is
//! rejected as incompatible. A mid-merge eviction would break the
//! overestimation bound, so capacity pressure is handled by sizing, not by
//! replacement.

use crate::common::validation::validate_capacity;
use crate::common::{Result, SketchError};
use crate::sketch::StreamSummary;
use std::collections::{BTreeSet, HashMap};
use std::hash::Hash;

/// Quantile of the residual-coverage distribution reported as `tau_sp`
const RESIDUAL_QUANTILE: f64 = 0.95;

/// Per-item telemetry derived during aggregation
#[derive(Debug, Clone, PartialEq)]
pub struct ItemStats<T> {
    /// The tracked item
    pub item: T,
    /// Summed estimated count across all workers that tracked the item
    pub frequency: u64,
    /// Point estimate of the item's global frequency (`frequency / N`)
    pub p_hat: f64,
    /// Lower probability bound (`p_hat` minus the summed overestimation share)
    pub p_floor: f64,
    /// Upper probability bound (`p_hat` plus the untracked-worker mass share)
    pub p_ceil: f64,
    /// Coverage: fraction of global mass from workers that tracked the item
    pub omega: f64,
}

/// Global telemetry for one aggregated window
#[derive(Debug, Clone)]
pub struct Telemetry<T> {
    /// Global total count `N` across all workers
    pub total: u64,
    /// Stats for every item tracked by at least one worker, sorted by
    /// descending `p_hat` (ties broken by item order)
    pub item_stats: Vec<ItemStats<T>>,
    /// Item -> indices of the workers that reported it
    pub reporters: HashMap<T, BTreeSet<usize>>,
    /// The `n` items with the largest `p_hat`
    pub top_n: Vec<ItemStats<T>>,
    /// Candidate set: top-n plus items outside it whose `p_ceil` exceeds `1/n`
    pub candidates: Vec<ItemStats<T>>,
    /// Minimum coverage over the candidate set (0 if empty)
    pub omega_min: f64,
    /// 95th percentile of residual coverage `1 - omega` over the candidate set
    pub tau_sp: f64,
}

impl<T: Hash + Eq + PartialEq + Clone> PartialEq for Telemetry<T> {
    fn eq(&self, other: &Self) -> bool {
        self.total == other.total
            && self.item_stats == other.item_stats
            && self.reporters == other.reporters
            && self.top_n == other.top_n
            && self.candidates == other.candidates
            && self.omega_min == other.omega_min
            && self.tau_sp == other.tau_sp
    }
}

impl<T: Hash + Eq + Clone> Telemetry<T> {
    fn empty() -> Self {
        Self {
            total: 0,
            item_stats: Vec::new(),
            reporters: HashMap::new(),
            top_n: Vec::new(),
            candidates: Vec::new(),
            omega_min: 0.0,
            tau_sp: 0.0,
        }
    }

    /// Returns the global distribution as an item -> `p_hat` map
    pub fn global_frequencies(&self) -> HashMap<T, f64> {
        self.item_stats
            .iter()
            .map(|stats| (stats.item.clone(), stats.p_hat))
            .collect()
    }
}

/// Merges per-partition sketches and computes global telemetry
///
/// # Arguments
///
/// * `summaries` - The worker sketches of one window, read-only
/// * `capacity` - Capacity of the merged sketch; must cover the union of
///   tracked items (the sum of worker capacities is a safe bound)
/// * `n` - Number of top items that define the heavy-hitter line `1/n`
///
/// # Errors
///
/// Returns `InvalidParameter` if `capacity` is 0 or `n` is 0, and
/// `IncompatibleSketches` if `capacity` is smaller than the union of tracked
/// items — merging never evicts, so an undersized target cannot represent the
/// inputs. An empty `summaries` slice is not an error: it yields an empty
/// merged sketch and all-zero telemetry.
///
/// # Determinism
///
/// The result does not depend on the order of `summaries` (merging is
/// commutative), and all rankings tie-break on the item's `Ord` order.
///
/// # Examples
///
/// ```
/// use topn_oxide::sketch::{aggregate_summaries, StreamSummary};
///
/// let mut a = StreamSummary::new(4).unwrap();
/// for item in ["x", "x", "y"] {
///     a.insert(item);
/// }
/// let mut b = StreamSummary::new(4).unwrap();
/// for item in ["x", "z", "z"] {
///     b.insert(item);
/// }
///
/// let (merged, telemetry) = aggregate_summaries(&[a, b], 8, 2).unwrap();
/// assert_eq!(merged.count(&"x"), Some(3));
/// assert_eq!(telemetry.total, 6);
/// assert_eq!(telemetry.top_n[0].item, "x");
/// ```
pub fn aggregate_summaries<T>(
    summaries: &[StreamSummary<T>],
    capacity: usize,
    n: usize,
) -> Result<(StreamSummary<T>, Telemetry<T>)>
where
    T: Hash + Eq + Ord + Clone,
{
    validate_capacity(capacity as u64)?;
    if n == 0 {
        return Err(SketchError::InvalidParameter {
            param: "n".to_string(),
            value: n.to_string(),
            constraint: "must be greater than 0".to_string(),
        });
    }

    let mut merged = StreamSummary::new(capacity)?;
    if summaries.is_empty() {
        return Ok((merged, Telemetry::empty()));
    }

    let total: u64 = summaries.iter().map(StreamSummary::total_count).sum();

    // One pass over all worker elements: accumulate per-item
    // (frequency, covered mass, overestimation) and the reporter sets.
    let mut stats_map: HashMap<T, (u64, u64, u64)> = HashMap::new();
    let mut reporters: HashMap<T, BTreeSet<usize>> = HashMap::new();
    for (worker, summary) in summaries.iter().enumerate() {
        let worker_total = summary.total_count();
        for (item, count, overestimation) in summary.iter() {
            let entry = stats_map.entry(item.clone()).or_insert((0, 0, 0));
            entry.0 += count;
            entry.1 += worker_total;
            entry.2 += overestimation;
            reporters.entry(item.clone()).or_default().insert(worker);
        }
    }

    let tracked_union = reporters.len();
    if tracked_union > capacity {
        return Err(SketchError::IncompatibleSketches {
            reason: format!(
                "merge capacity {} cannot hold the union of {} tracked items",
                capacity, tracked_union
            ),
        });
    }

    let mut item_stats: Vec<ItemStats<T>> = stats_map
        .into_iter()
        .map(|(item, (frequency, covered, overestimation))| {
            if total == 0 {
                return ItemStats {
                    item,
                    frequency,
                    p_hat: 0.0,
                    p_floor: 0.0,
                    p_ceil: 0.0,
                    omega: 0.0,
                };
            }
            let total_f = total as f64;
            let p_hat = frequency as f64 / total_f;
            let omega = covered as f64 / total_f;
            let p_floor = (p_hat - overestimation as f64 / total_f).max(0.0);
            let p_ceil = (p_hat + (total - covered) as f64 / total_f).min(1.0);
            ItemStats {
                item,
                frequency,
                p_hat,
                p_floor,
                p_ceil,
                omega,
            }
        })
        .collect();
    item_stats.sort_by(|a, b| {
        b.p_hat
            .total_cmp(&a.p_hat)
            .then_with(|| a.item.cmp(&b.item))
    });

    let top_n: Vec<ItemStats<T>> = item_stats.iter().take(n).cloned().collect();
    let threshold = 1.0 / n as f64;
    let mut candidates = top_n.clone();
    candidates.extend(
        item_stats
            .iter()
            .skip(n)
            .filter(|stats| stats.p_ceil > threshold)
            .cloned(),
    );

    let omega_min = candidates
        .iter()
        .map(|stats| stats.omega)
        .fold(f64::INFINITY, f64::min);
    let omega_min = if omega_min.is_finite() { omega_min } else { 0.0 };

    let tau_sp = if candidates.is_empty() {
        0.0
    } else {
        let mut residuals: Vec<f64> = candidates.iter().map(|stats| 1.0 - stats.omega).collect();
        residuals.sort_by(f64::total_cmp);
        let index = (residuals.len() as f64 * RESIDUAL_QUANTILE) as usize;
        residuals[index.min(residuals.len() - 1)]
    };

    for summary in summaries {
        for (item, count, overestimation) in summary.iter() {
            merged.merge_element(item.clone(), count, overestimation)?;
        }
    }

    let telemetry = Telemetry {
        total,
        item_stats,
        reporters,
        top_n,
        candidates,
        omega_min,
        tau_sp,
    };
    Ok((merged, telemetry))
}
