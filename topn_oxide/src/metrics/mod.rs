//! Divergence, entropy, and accuracy metrics

mod accuracy;
mod divergence;
mod entropy;

pub use accuracy::{
    average_absolute_error, average_relative_error, precision_recall_f1, rmse, topn_accuracy,
    AccuracyReport,
};
pub use divergence::{jensen_shannon_divergence, spatial_divergence, temporal_divergence};
pub use entropy::{normalized_entropy, shannon_entropy};
