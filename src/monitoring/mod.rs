//! Fleet monitoring and alert fan-out.
//!
//! The orchestrator drives a fixed-interval cycle: per-bridge health checks
//! through an injected prober, snapshot fetches from the risk assessor,
//! anomaly evaluation, and alert delivery to subscribers. A failure
//! processing one bridge never prevents the other bridges in the same cycle
//! from completing.
//!
//! # Components
//!
//! - **Probe**: endpoint prober abstraction and the HTTP implementation
//! - **Metrics**: per-bridge EMA uptime/error-rate/latency tracking
//! - **Orchestrator**: lifecycle, cycle loop, queries, and subscriptions

pub mod metrics;
pub mod orchestrator;
pub mod probe;

pub use metrics::*;
pub use orchestrator::*;
pub use probe::*;
