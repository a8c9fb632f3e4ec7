//! Bridge risk assessment.
//!
//! Computes a weighted composite score per bridge from four sub-scores
//! (safety, liquidity, reliability, security), applies incident and audit
//! adjustments, and caches results with explicit invalidation.
//!
//! # Components
//!
//! - **Scoring**: deterministic sub-score math and the assessment model
//! - **Assessor**: cached assessment registry with incident/audit write paths

pub mod assessor;
pub mod scoring;

pub use assessor::*;
pub use scoring::*;
