//! Shannon entropy of sparse distributions
//!
//! Used by the window runner to recognise near-uniform windows: when the
//! normalised entropy of the estimated distribution approaches 1 there are no
//! meaningful heavy hitters to report.

use std::collections::HashMap;
use std::hash::Hash;

/// Computes the Shannon entropy (base 2) of a probability distribution
///
/// Zero and negative weights contribute nothing.
pub fn shannon_entropy<T: Hash + Eq>(freqs: &HashMap<T, f64>) -> f64 {
    -freqs
        .values()
        .filter(|&&p| p > 0.0)
        .map(|&p| p * p.log2())
        .sum::<f64>()
}

/// Normalises an entropy value by the maximum for `num_elements` outcomes
///
/// Maximum entropy is `log2(num_elements)`; distributions over one or zero
/// elements normalise to 0. The result lies in `[0, 1]` for probability
/// inputs.
pub fn normalized_entropy(entropy: f64, num_elements: usize) -> f64 {
    if num_elements <= 1 {
        return 0.0;
    }
    entropy / (num_elements as f64).log2()
}
