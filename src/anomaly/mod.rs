//! Adaptive-baseline anomaly detection.
//!
//! Holds a bounded rolling history per monitored entity, maintains an
//! exponentially-weighted baseline, evaluates a registry of pattern checks
//! against each new sample, and emits debounced alerts with per-pattern
//! cooldowns.
//!
//! # Components
//!
//! - **Baseline**: per-entity EMA baseline and rolling sample history
//! - **Patterns**: built-in and custom pattern checks with debouncing metadata
//! - **Detector**: the sample-processing pipeline and alert emission

pub mod baseline;
pub mod detector;
pub mod patterns;

pub use baseline::*;
pub use detector::*;
pub use patterns::*;
