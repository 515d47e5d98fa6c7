//! Space-Saving sketches and window aggregation

mod aggregate;
mod stream_summary;

pub use aggregate::{aggregate_summaries, ItemStats, Telemetry};
pub use stream_summary::{DescendingIter, StreamSummary};
