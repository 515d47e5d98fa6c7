//! Adaptive capacity control

mod adaptive;

pub use adaptive::{AdaptiveController, CapacityRule};
