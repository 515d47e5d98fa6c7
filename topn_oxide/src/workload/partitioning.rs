//! Partition assignment for synthetic windowed workloads
//!
//! Splits a window's frequency table across `m` partitions. Top keys are
//! either split uniformly or skewed: a θ-share of the key's mass lands on a
//! small random subset of partitions with the rest diffused over the others.
//! This reproduces the spatial skew that makes distributed heavy-hitter
//! estimation hard, and is what the adaptive controller reacts to.

use crate::common::validation::{validate_partition_count, validate_unit_interval};
use crate::common::Result;
use crate::runner::{WindowTruth, WindowedStream};
use crate::workload::KeyDistribution;
use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::{BTreeMap, HashMap};
use std::hash::{Hash, Hasher};
use twox_hash::XxHash64;

/// Seed of the value-routing hash, fixed so routing is stable across runs
const ROUTER_SEED: u64 = 0x746f_706e;

/// Options controlling how top keys are split across partitions
#[derive(Debug, Clone)]
pub struct PartitionOptions {
    /// Number of most frequent keys eligible for skewed placement
    pub top_keys: usize,
    /// Probability that a top key is skewed rather than split uniformly
    pub skewed_fraction: f64,
    /// Central θ: share of a skewed key's mass on the skewed partition subset
    pub skew_ratio: f64,
    /// Uniform jitter applied around `skew_ratio`
    pub skew_jitter: f64,
}

impl Default for PartitionOptions {
    fn default() -> Self {
        Self {
            top_keys: 100,
            skewed_fraction: 0.5,
            skew_ratio: 0.75,
            skew_jitter: 0.15,
        }
    }
}

impl PartitionOptions {
    fn validate(&self) -> Result<()> {
        validate_unit_interval(self.skewed_fraction, "skewed_fraction")?;
        validate_unit_interval(self.skew_ratio, "skew_ratio")?;
        validate_unit_interval(self.skew_jitter, "skew_jitter")?;
        Ok(())
    }
}

/// Splits a frequency table across `num_partitions` partitions
///
/// Top keys (by count) are skewed with probability `skewed_fraction`: a
/// jittered θ-share of their mass goes to a random subset of roughly
/// `m/6..m/3` partitions and the remainder is scattered over the rest. All
/// other keys, and non-skewed top keys, are split as evenly as possible.
/// Per-partition counts sum exactly to the input counts.
///
/// # Errors
///
/// Returns `InvalidParameter` for a zero partition count or out-of-range
/// options.
pub fn assign_partitions<R: Rng>(
    freq_dist: &HashMap<u64, u64>,
    num_partitions: usize,
    options: &PartitionOptions,
    rng: &mut R,
) -> Result<Vec<HashMap<u64, u64>>> {
    validate_partition_count(num_partitions)?;
    options.validate()?;

    let mut keys_sorted: Vec<(u64, u64)> = freq_dist.iter().map(|(&k, &c)| (k, c)).collect();
    keys_sorted.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

    let mut partitioned = vec![HashMap::new(); num_partitions];
    for (rank, &(key, freq)) in keys_sorted.iter().enumerate() {
        let is_top = rank < options.top_keys;
        if is_top && rng.random::<f64>() < options.skewed_fraction {
            assign_skewed(&mut partitioned, key, freq, options, rng);
        } else {
            assign_uniform(&mut partitioned, key, freq);
        }
    }
    Ok(partitioned)
}

fn assign_skewed<R: Rng>(
    partitioned: &mut [HashMap<u64, u64>],
    key: u64,
    freq: u64,
    options: &PartitionOptions,
    rng: &mut R,
) {
    let num_partitions = partitioned.len();
    let lo = num_partitions.div_ceil(6).max(1);
    let hi = (num_partitions / 3).max(lo);
    let subset_size = rng.random_range(lo..=hi);

    let mut ids: Vec<usize> = (0..num_partitions).collect();
    ids.shuffle(rng);
    let (skewed, rest) = ids.split_at(subset_size);

    let theta = rng
        .random_range(options.skew_ratio - options.skew_jitter..=options.skew_ratio + options.skew_jitter)
        .clamp(0.0, 1.0);
    let skew_mass = ((freq as f64 * theta).round() as u64).min(freq);
    let rest_mass = freq - skew_mass;

    // Skewed mass spreads near-evenly over the chosen subset.
    let base = skew_mass / subset_size as u64;
    let remainder = skew_mass % subset_size as u64;
    for (i, &partition) in skewed.iter().enumerate() {
        let share = base + u64::from((i as u64) < remainder);
        if share > 0 {
            *partitioned[partition].entry(key).or_insert(0) += share;
        }
    }

    // The rest lands one item at a time on random other partitions.
    let targets = if rest.is_empty() { skewed } else { rest };
    for _ in 0..rest_mass {
        let partition = targets[rng.random_range(0..targets.len())];
        *partitioned[partition].entry(key).or_insert(0) += 1;
    }
}

fn assign_uniform(partitioned: &mut [HashMap<u64, u64>], key: u64, freq: u64) {
    let num_partitions = partitioned.len() as u64;
    let base = freq / num_partitions;
    let remainder = freq % num_partitions;
    for (i, partition) in partitioned.iter_mut().enumerate() {
        let share = base + u64::from((i as u64) < remainder);
        if share > 0 {
            *partition.entry(key).or_insert(0) += share;
        }
    }
}

/// Expands a partition's frequency table into a shuffled item sequence
pub fn expand_partition<R: Rng>(counts: &HashMap<u64, u64>, rng: &mut R) -> Vec<u64> {
    let mut keys: Vec<u64> = counts.keys().copied().collect();
    keys.sort_unstable();
    let mut items = Vec::with_capacity(counts.values().sum::<u64>() as usize);
    for key in keys {
        items.extend(std::iter::repeat(key).take(counts[&key] as usize));
    }
    items.shuffle(rng);
    items
}

/// Routes an item to a partition by hash
///
/// Uses `XxHash64` with a fixed seed, so the same item always lands on the
/// same partition for a given partition count.
///
/// # Errors
///
/// Returns `InvalidParameter` for a zero partition count.
pub fn hash_partition<T: Hash>(item: &T, num_partitions: usize) -> Result<usize> {
    validate_partition_count(num_partitions)?;
    let mut hasher = XxHash64::with_seed(ROUTER_SEED);
    item.hash(&mut hasher);
    Ok((hasher.finish() % num_partitions as u64) as usize)
}

/// Builds a multi-window stream with per-window ground truth
///
/// Every window draws an exact frequency table of `window_size` items from
/// `distribution`, splits it with [`assign_partitions`], and expands each
/// partition into a shuffled item sequence. The returned truth maps carry the
/// exact counts for evaluation.
///
/// # Errors
///
/// Returns `InvalidParameter` for a zero partition count or out-of-range
/// options.
pub fn build_windowed_stream<D, R>(
    distribution: &D,
    windows: u64,
    window_size: u64,
    num_partitions: usize,
    options: &PartitionOptions,
    n_hint: usize,
    rng: &mut R,
) -> Result<(WindowedStream<u64>, BTreeMap<u64, WindowTruth<u64>>)>
where
    D: KeyDistribution,
    R: Rng,
{
    let mut stream = BTreeMap::new();
    let mut truth = BTreeMap::new();
    for window_id in 0..windows {
        let table = distribution.frequency_table(window_size);
        let partitions = assign_partitions(&table, num_partitions, options, rng)?;
        let window: BTreeMap<usize, Vec<u64>> = partitions
            .iter()
            .enumerate()
            .map(|(partition_id, counts)| (partition_id, expand_partition(counts, rng)))
            .collect();
        stream.insert(window_id, window);
        truth.insert(
            window_id,
            WindowTruth {
                distribution: distribution.label().to_string(),
                counts: table,
                n_hint,
            },
        );
    }
    Ok((stream, truth))
}
