//! Accuracy metrics against known ground truth
//!
//! Evaluation glue for experiments: given the true per-window frequencies and
//! the estimated top-n, compute set-quality metrics (precision, recall, F1)
//! and frequency-error metrics (mean absolute, mean relative, RMSE).

use std::collections::{HashMap, HashSet};
use std::hash::Hash;

/// Combined accuracy metrics for one window's top-n estimate
#[derive(Debug, Clone, PartialEq)]
pub struct AccuracyReport {
    /// Fraction of estimated heavy hitters that are true heavy hitters
    pub precision: f64,
    /// Fraction of true heavy hitters that were estimated
    pub recall: f64,
    /// Harmonic mean of precision and recall
    pub f1: f64,
    /// Mean absolute frequency error over the true heavy hitters
    pub avg_absolute_error: f64,
    /// Mean relative frequency error over true heavy hitters that were found
    pub avg_relative_error: f64,
    /// Root-mean-square frequency error over the common items
    pub rmse: f64,
}

/// Computes precision, recall, and F1 between two heavy-hitter sets
pub fn precision_recall_f1<T: Hash + Eq>(
    actual: &HashSet<T>,
    estimated: &HashSet<T>,
) -> (f64, f64, f64) {
    let true_positives = actual.intersection(estimated).count() as f64;
    let false_positives = estimated.difference(actual).count() as f64;
    let false_negatives = actual.difference(estimated).count() as f64;

    let precision = if true_positives + false_positives > 0.0 {
        true_positives / (true_positives + false_positives)
    } else {
        0.0
    };
    let recall = if true_positives + false_negatives > 0.0 {
        true_positives / (true_positives + false_negatives)
    } else {
        0.0
    };
    let f1 = if precision + recall > 0.0 {
        2.0 * precision * recall / (precision + recall)
    } else {
        0.0
    };
    (precision, recall, f1)
}

/// Mean absolute error over the keys of `actual`, with missing estimates as 0
pub fn average_absolute_error<T: Hash + Eq>(
    actual: &HashMap<T, f64>,
    estimated: &HashMap<T, f64>,
) -> f64 {
    if actual.is_empty() {
        return 0.0;
    }
    let sum: f64 = actual
        .iter()
        .map(|(key, &value)| (estimated.get(key).copied().unwrap_or(0.0) - value).abs())
        .sum();
    sum / actual.len() as f64
}

/// Mean relative error over actual keys that were estimated and are non-zero
pub fn average_relative_error<T: Hash + Eq>(
    actual: &HashMap<T, f64>,
    estimated: &HashMap<T, f64>,
) -> f64 {
    let errors: Vec<f64> = actual
        .iter()
        .filter(|(_, &value)| value > 0.0)
        .filter_map(|(key, &value)| {
            estimated
                .get(key)
                .map(|&estimate| (estimate - value).abs() / value)
        })
        .collect();
    if errors.is_empty() {
        return 0.0;
    }
    errors.iter().sum::<f64>() / errors.len() as f64
}

/// Root-mean-square error over the keys present in both maps
pub fn rmse<T: Hash + Eq>(actual: &HashMap<T, f64>, estimated: &HashMap<T, f64>) -> f64 {
    let squared: Vec<f64> = actual
        .iter()
        .filter_map(|(key, &value)| {
            estimated
                .get(key)
                .map(|&estimate| (estimate - value) * (estimate - value))
        })
        .collect();
    if squared.is_empty() {
        return 0.0;
    }
    (squared.iter().sum::<f64>() / squared.len() as f64).sqrt()
}

/// Computes the combined accuracy report for one window
///
/// Both inputs are `(item, count, frequency)` triples: the true heavy hitters
/// and the estimated top-n. Frequency errors are computed over the relative
/// frequencies.
pub fn topn_accuracy<T: Hash + Eq + Clone>(
    actual_top_n: &[(T, u64, f64)],
    estimated_top_n: &[(T, u64, f64)],
) -> AccuracyReport {
    let actual_freqs: HashMap<T, f64> = actual_top_n
        .iter()
        .map(|(item, _, freq)| (item.clone(), *freq))
        .collect();
    let estimated_freqs: HashMap<T, f64> = estimated_top_n
        .iter()
        .map(|(item, _, freq)| (item.clone(), *freq))
        .collect();

    let actual_set: HashSet<T> = actual_freqs.keys().cloned().collect();
    let estimated_set: HashSet<T> = estimated_freqs.keys().cloned().collect();
    let (precision, recall, f1) = precision_recall_f1(&actual_set, &estimated_set);

    AccuracyReport {
        precision,
        recall,
        f1,
        avg_absolute_error: average_absolute_error(&actual_freqs, &estimated_freqs),
        avg_relative_error: average_relative_error(&actual_freqs, &estimated_freqs),
        rmse: rmse(&actual_freqs, &estimated_freqs),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_perfect_estimate() {
        let truth = vec![("a", 10, 0.5), ("b", 6, 0.3)];
        let report = topn_accuracy(&truth, &truth);
        assert_eq!(report.precision, 1.0);
        assert_eq!(report.recall, 1.0);
        assert_eq!(report.f1, 1.0);
        assert_eq!(report.avg_absolute_error, 0.0);
        assert_eq!(report.avg_relative_error, 0.0);
        assert_eq!(report.rmse, 0.0);
    }

    #[test]
    fn test_partial_overlap() {
        let actual = vec![("a", 10, 0.5), ("b", 6, 0.3)];
        let estimated = vec![("a", 9, 0.45), ("c", 5, 0.25)];
        let report = topn_accuracy(&actual, &estimated);
        assert!((report.precision - 0.5).abs() < 1e-12);
        assert!((report.recall - 0.5).abs() < 1e-12);
        assert!((report.f1 - 0.5).abs() < 1e-12);
        // |0.45 - 0.5| and the fully missed 0.3, averaged.
        assert!((report.avg_absolute_error - (0.05 + 0.3) / 2.0).abs() < 1e-12);
        // Relative error only over found items: 0.05 / 0.5.
        assert!((report.avg_relative_error - 0.1).abs() < 1e-12);
        assert!((report.rmse - 0.05).abs() < 1e-12);
    }

    #[test]
    fn test_empty_sets() {
        let empty: Vec<(&str, u64, f64)> = Vec::new();
        let report = topn_accuracy(&empty, &empty);
        assert_eq!(report.precision, 0.0);
        assert_eq!(report.recall, 0.0);
        assert_eq!(report.f1, 0.0);
        assert_eq!(report.rmse, 0.0);
    }

    #[test]
    fn test_disjoint_sets() {
        let actual = vec![("a", 4, 0.8)];
        let estimated = vec![("b", 4, 0.8)];
        let report = topn_accuracy(&actual, &estimated);
        assert_eq!(report.precision, 0.0);
        assert_eq!(report.recall, 0.0);
        assert_eq!(report.f1, 0.0);
        assert!((report.avg_absolute_error - 0.8).abs() < 1e-12);
        assert_eq!(report.avg_relative_error, 0.0);
        assert_eq!(report.rmse, 0.0);
    }
}
