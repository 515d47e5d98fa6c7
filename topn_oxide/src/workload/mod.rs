//! Synthetic workload generation for tests, benches, and experiments

mod distributions;
mod partitioning;

pub use distributions::{permute_keys, KeyDistribution, UniformGenerator, ZipfianGenerator};
pub use partitioning::{
    assign_partitions, build_windowed_stream, expand_partition, hash_partition, PartitionOptions,
};
