//! Jensen-Shannon divergence over sparse discrete distributions
//!
//! The divergence kernel drives both adaptivity signals: spatial divergence
//! compares each worker's local distribution against the merged global one,
//! and temporal divergence compares consecutive window distributions under an
//! exponential moving average.
//!
//! Distributions are sparse maps from opaque keys to non-negative weights.
//! Each side is normalised over the union support before comparison, so raw
//! counts and relative frequencies are equally acceptable inputs. With base-2
//! logarithms the divergence lies in `[0, 1]`.

use crate::sketch::StreamSummary;
use std::collections::{HashMap, HashSet};
use std::hash::Hash;

/// Computes the Jensen-Shannon divergence between two sparse distributions
///
/// This is the divergence itself (the squared Jensen-Shannon distance),
/// computed with base-2 logarithms and the convention `0 * log(0 / x) = 0`.
/// Missing keys are treated as zero weight, each side is normalised when its
/// weight sum is positive, and the result is clamped into `[0, 1]` to absorb
/// floating-point noise. Two empty distributions have divergence 0.
///
/// # Examples
///
/// ```
/// use std::collections::HashMap;
/// use topn_oxide::metrics::jensen_shannon_divergence;
///
/// let p = HashMap::from([("a", 1.0)]);
/// let q = HashMap::from([("b", 1.0)]);
/// assert_eq!(jensen_shannon_divergence(&p, &p), 0.0);
/// assert_eq!(jensen_shannon_divergence(&p, &q), 1.0);
/// ```
pub fn jensen_shannon_divergence<T: Hash + Eq>(
    p: &HashMap<T, f64>,
    q: &HashMap<T, f64>,
) -> f64 {
    let support: HashSet<&T> = p.keys().chain(q.keys()).collect();
    if support.is_empty() {
        return 0.0;
    }

    let mut p_vec = Vec::with_capacity(support.len());
    let mut q_vec = Vec::with_capacity(support.len());
    for &key in &support {
        p_vec.push(p.get(key).copied().unwrap_or(0.0));
        q_vec.push(q.get(key).copied().unwrap_or(0.0));
    }

    let p_sum: f64 = p_vec.iter().sum();
    let q_sum: f64 = q_vec.iter().sum();
    if p_sum > 0.0 {
        for weight in &mut p_vec {
            *weight /= p_sum;
        }
    }
    if q_sum > 0.0 {
        for weight in &mut q_vec {
            *weight /= q_sum;
        }
    }

    let mut divergence = 0.0;
    for (&pi, &qi) in p_vec.iter().zip(&q_vec) {
        let mid = 0.5 * (pi + qi);
        if pi > 0.0 {
            divergence += 0.5 * pi * (pi / mid).log2();
        }
        if qi > 0.0 {
            divergence += 0.5 * qi * (qi / mid).log2();
        }
    }
    divergence.clamp(0.0, 1.0)
}

/// Maximum divergence between any worker's local distribution and the global one
///
/// Workers with zero total contribute 0. Returns 0 for an empty worker slice.
pub fn spatial_divergence<T: Hash + Eq + Clone>(
    summaries: &[StreamSummary<T>],
    global: &HashMap<T, f64>,
) -> f64 {
    summaries
        .iter()
        .map(|summary| {
            let total = summary.total_count();
            if total == 0 {
                return 0.0;
            }
            let local: HashMap<T, f64> = summary
                .iter()
                .map(|(item, count, _)| (item.clone(), count as f64 / total as f64))
                .collect();
            jensen_shannon_divergence(&local, global)
        })
        .fold(0.0, f64::max)
}

/// Divergence between consecutive window distributions, smoothed with an
/// exponential moving average
///
/// `alpha` weights the previous smoothed value; `1 - alpha` weights the fresh
/// divergence between `previous` and `current`.
pub fn temporal_divergence<T: Hash + Eq>(
    previous: &HashMap<T, f64>,
    current: &HashMap<T, f64>,
    alpha: f64,
    previous_smoothed: f64,
) -> f64 {
    alpha * previous_smoothed + (1.0 - alpha) * jensen_shannon_divergence(previous, current)
}
