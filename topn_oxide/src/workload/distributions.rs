//! Synthetic key distributions for windowed workloads
//!
//! Generators produce exact per-window frequency tables (for ground truth)
//! and sample single keys (for item-at-a-time streams). Keys are dense `u64`
//! ranks; callers that need drifting identities remap them with
//! [`permute_keys`] between windows.

use crate::common::{Result, SketchError};
use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::HashMap;

/// A synthetic distribution over dense integer keys
pub trait KeyDistribution {
    /// Short label naming the distribution family, used in ground truth
    fn label(&self) -> &'static str;

    /// Number of distinct keys in the distribution's support
    fn num_keys(&self) -> usize;

    /// Samples one key
    fn sample<R: Rng>(&self, rng: &mut R) -> u64;

    /// Returns an exact frequency table whose counts sum to `total_items`
    ///
    /// Counts are the rounded expected frequencies, with the rounding
    /// remainder assigned to the most frequent key so the sum is exact. Keys
    /// with a rounded count of 0 are omitted.
    fn frequency_table(&self, total_items: u64) -> HashMap<u64, u64>;
}

/// Zipfian (rank-frequency) distribution: weight of rank `k` is `1 / k^s`
#[derive(Debug, Clone)]
pub struct ZipfianGenerator {
    num_keys: usize,
    exponent: f64,
    /// Cumulative weights for inverse-CDF sampling
    cumulative: Vec<f64>,
}

impl ZipfianGenerator {
    /// Creates a Zipfian generator over `num_keys` ranks with exponent `s`
    ///
    /// # Errors
    ///
    /// Returns `InvalidParameter` if `num_keys` is 0 or `exponent` is not a
    /// positive finite number.
    pub fn new(num_keys: usize, exponent: f64) -> Result<Self> {
        if num_keys == 0 {
            return Err(SketchError::InvalidParameter {
                param: "num_keys".to_string(),
                value: num_keys.to_string(),
                constraint: "must be greater than 0".to_string(),
            });
        }
        if !(exponent > 0.0 && exponent.is_finite()) {
            return Err(SketchError::InvalidParameter {
                param: "exponent".to_string(),
                value: exponent.to_string(),
                constraint: "must be positive and finite".to_string(),
            });
        }
        let mut cumulative = Vec::with_capacity(num_keys);
        let mut running = 0.0;
        for rank in 1..=num_keys {
            running += 1.0 / (rank as f64).powf(exponent);
            cumulative.push(running);
        }
        Ok(Self {
            num_keys,
            exponent,
            cumulative,
        })
    }

    /// Returns the configured exponent
    pub fn exponent(&self) -> f64 {
        self.exponent
    }

    fn weight(&self, rank: usize) -> f64 {
        1.0 / (rank as f64).powf(self.exponent)
    }

    fn total_weight(&self) -> f64 {
        self.cumulative[self.num_keys - 1]
    }
}

impl KeyDistribution for ZipfianGenerator {
    fn label(&self) -> &'static str {
        "zipfian"
    }

    fn num_keys(&self) -> usize {
        self.num_keys
    }

    fn sample<R: Rng>(&self, rng: &mut R) -> u64 {
        let point = rng.random::<f64>() * self.total_weight();
        self.cumulative.partition_point(|&c| c < point) as u64
    }

    fn frequency_table(&self, total_items: u64) -> HashMap<u64, u64> {
        let total_weight = self.total_weight();
        let mut table = HashMap::new();
        let mut assigned = 0u64;
        for rank in 1..=self.num_keys {
            let count =
                (total_items as f64 * self.weight(rank) / total_weight).round() as u64;
            let count = count.min(total_items - assigned);
            if count > 0 {
                table.insert((rank - 1) as u64, count);
                assigned += count;
            }
        }
        if assigned < total_items {
            *table.entry(0).or_insert(0) += total_items - assigned;
        }
        table
    }
}

/// Uniform distribution over `num_keys` keys
#[derive(Debug, Clone)]
pub struct UniformGenerator {
    num_keys: usize,
}

impl UniformGenerator {
    /// Creates a uniform generator over `num_keys` keys
    ///
    /// # Errors
    ///
    /// Returns `InvalidParameter` if `num_keys` is 0.
    pub fn new(num_keys: usize) -> Result<Self> {
        if num_keys == 0 {
            return Err(SketchError::InvalidParameter {
                param: "num_keys".to_string(),
                value: num_keys.to_string(),
                constraint: "must be greater than 0".to_string(),
            });
        }
        Ok(Self { num_keys })
    }
}

impl KeyDistribution for UniformGenerator {
    fn label(&self) -> &'static str {
        "uniform"
    }

    fn num_keys(&self) -> usize {
        self.num_keys
    }

    fn sample<R: Rng>(&self, rng: &mut R) -> u64 {
        rng.random_range(0..self.num_keys as u64)
    }

    fn frequency_table(&self, total_items: u64) -> HashMap<u64, u64> {
        let base = total_items / self.num_keys as u64;
        let remainder = total_items % self.num_keys as u64;
        (0..self.num_keys as u64)
            .filter_map(|key| {
                let count = base + u64::from(key < remainder);
                (count > 0).then_some((key, count))
            })
            .collect()
    }
}

/// Randomly remaps the key identities of a frequency table
///
/// Counts are preserved; only which key carries which count changes. Used to
/// simulate temporal drift between windows.
pub fn permute_keys<R: Rng>(table: &HashMap<u64, u64>, rng: &mut R) -> HashMap<u64, u64> {
    let mut keys: Vec<u64> = table.keys().copied().collect();
    keys.sort_unstable();
    let mut shuffled = keys.clone();
    shuffled.shuffle(rng);
    keys.iter()
        .zip(&shuffled)
        .map(|(&old, &new)| (new, table[&old]))
        .collect()
}
