//! # bridgewatch
//!
//! A monitoring engine for cross-chain bridges: multi-factor risk scoring,
//! adaptive anomaly detection, and orchestrated periodic health checks over a
//! configured bridge fleet.
//!
//! ## Architecture
//!
//! The engine consists of three core components:
//!
//! - **Risk**: cached multi-factor risk assessment (safety, liquidity,
//!   reliability, security) fed by an injected telemetry source
//! - **Anomaly**: adaptive EMA baselines per bridge with debounced,
//!   cooldown-gated pattern matching
//! - **Monitoring**: the orchestrator running fixed-interval concurrent
//!   health-check cycles and fanning alerts out to subscribers
//!
//! ## Design Principles
//!
//! - **Contained failures**: one bridge failing never stops the cycle, one
//!   subscriber panicking never stops delivery
//! - **Deterministic scoring**: assessments are pure functions of recorded
//!   state; repeated reads within the cache TTL return the identical value
//! - **Injected edges**: telemetry and endpoint probing are traits, so the
//!   core carries no protocol assumptions
//!
//! ## Example
//!
//! ```rust,ignore
//! use bridgewatch::prelude::*;
//!
//! let risk = Arc::new(RiskAssessor::new(config.risk.clone(), bridges, telemetry));
//! let detector = Arc::new(AnomalyDetector::new(config.anomaly.clone()));
//! let prober = Arc::new(HttpProber::new()?);
//!
//! let orchestrator = MonitoringOrchestrator::new(config, risk, detector, prober)?;
//! orchestrator.subscribe_to_alerts(|alert| println!("{}: {}", alert.entity_id, alert.description));
//! orchestrator.start().await?;
//! ```

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    rust_2018_idioms,
    trivial_casts,
    unused_lifetimes,
    unused_qualifications
)]

pub mod anomaly;
pub mod config;
pub mod error;
pub mod monitoring;
pub mod risk;
pub mod types;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::anomaly::{
        baseline::{EntityBaseline, EntityPhase, MetricSample},
        detector::{AnomalyDetector, DetectionStats},
        patterns::AnomalyPattern,
    };
    pub use crate::config::{AnomalyConfig, MonitorConfig, RiskConfig, ScoringWeights};
    pub use crate::error::{Error, Result};
    pub use crate::monitoring::{
        metrics::BridgeMetrics,
        orchestrator::{
            BridgeDetails, MonitoringOrchestrator, MonitoringStatus, OrchestratorPhase,
            SubscriptionId,
        },
        probe::{EndpointProber, HealthCheckResult, HttpProber},
    };
    pub use crate::risk::{
        assessor::{BridgeObservation, BridgeTelemetry, RiskAssessor, StaticTelemetry},
        scoring::{PerformanceSummary, RiskAssessment, RiskFactor},
    };
    pub use crate::types::{
        AlertSeverity, AlertStatus, AlertType, AnomalyAlert, BridgeConfig, BridgeEndpoint,
        BridgeType, Incident, IncidentKind, IncidentSeverity, MonitoringSnapshot, SecurityAudit,
    };
}

/// Engine version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Engine name
pub const ENGINE_NAME: &str = "bridgewatch";
