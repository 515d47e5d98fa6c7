//! topn_oxide: Adaptive Space-Saving Top-N for Partitioned Windowed Streams
//!
//! Estimates the heavy hitters (top-n most frequent items) of a data stream
//! that is processed in windows and split across `m` worker partitions. Each
//! partition feeds a bounded Space-Saving sketch; at window close the worker
//! sketches are merged into one global sketch with per-item confidence
//! telemetry, and an adaptive controller resizes the sketches for the next
//! window from the spatial and temporal Jensen-Shannon divergence of the
//! distribution.
//!
//! # Components
//!
//! - [`sketch::StreamSummary`] — the Space-Saving sketch with explicit
//!   per-item overestimation, built on the classic bucket-list layout
//! - [`sketch::aggregate_summaries`] — merges worker sketches and derives the
//!   window telemetry (probability floors/ceilings, coverage, candidate set)
//! - [`control::AdaptiveController`] — sizes the next window's capacity from
//!   divergence or coverage
//! - [`runner`] — the [`runner::MethodRunner`] contract with static and
//!   adaptive implementations, plus the [`runner::WindowRunner`] orchestrator
//! - [`metrics`] — Jensen-Shannon divergence, entropy, and accuracy scoring
//! - [`workload`] — seeded synthetic workloads (Zipfian/uniform keys, skewed
//!   partition assignment) for tests and benchmarks
//!
//! # Examples
//!
//! ```
//! use std::collections::BTreeMap;
//! use topn_oxide::runner::{AdaptiveRunner, RunnerConfig, WindowOutcome, WindowRunner};
//!
//! // Two partitions, top-2 target.
//! let mut runner = AdaptiveRunner::new(&RunnerConfig::new(2, 2)).unwrap();
//!
//! let mut stream = BTreeMap::new();
//! stream.insert(
//!     0u64,
//!     BTreeMap::from([
//!         (0usize, vec!["a", "a", "a", "b"]),
//!         (1usize, vec!["a", "a", "c", "d"]),
//!     ]),
//! );
//!
//! let reports = WindowRunner::new().run(&mut runner, &stream, None);
//! let WindowOutcome::Completed { result, .. } = &reports[0].outcome else {
//!     panic!("window failed");
//! };
//! assert_eq!(result.estimates[0].item, "a");
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod common;
pub mod control;
pub mod metrics;
pub mod runner;
pub mod sketch;
pub mod workload;

// Re-export core types for convenience
pub use common::{Result, SketchError};
pub use control::{AdaptiveController, CapacityRule};
pub use runner::{
    AdaptiveRunner, Estimate, MethodRunner, RunnerConfig, StaticRunner, WindowOutcome,
    WindowReport, WindowResult, WindowRunner, WindowTruth, WindowedStream,
};
pub use sketch::{aggregate_summaries, ItemStats, StreamSummary, Telemetry};

/// Error types and result aliases for sketch operations
pub mod error {
    pub use crate::common::{Result, SketchError};
}
