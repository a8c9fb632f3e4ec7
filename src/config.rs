//! Engine configuration.
//!
//! The orchestrator treats its configuration as injected and already
//! validated; the checks here are defensive only (non-positive interval,
//! degenerate weights).

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::types::BridgeConfig;

// ═══════════════════════════════════════════════════════════════════════════════
// SCORING WEIGHTS
// ═══════════════════════════════════════════════════════════════════════════════

/// Weights for combining the four risk sub-scores.
///
/// Configurable per deployment but fixed at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoringWeights {
    /// Weight of the incident-derived safety score
    pub safety: f64,
    /// Weight of the TVL/volume-derived liquidity score
    pub liquidity: f64,
    /// Weight of the uptime-derived reliability score
    pub reliability: f64,
    /// Weight of the audit-derived security score
    pub security: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            safety: 0.30,
            liquidity: 0.25,
            reliability: 0.25,
            security: 0.20,
        }
    }
}

impl ScoringWeights {
    /// Sum of all weights
    pub fn total(&self) -> f64 {
        self.safety + self.liquidity + self.reliability + self.security
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// RISK CONFIGURATION
// ═══════════════════════════════════════════════════════════════════════════════

/// Configuration for the risk assessor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskConfig {
    /// How long a cached assessment stays fresh, in seconds
    pub cache_ttl_secs: u64,
    /// Sub-score weights
    pub weights: ScoringWeights,
    /// Half-life of incident penalties in days
    pub incident_half_life_days: f64,
    /// Security sub-score assigned when no audit is on record
    pub no_audit_security_floor: f64,
    /// Pending-queue length that raises a rate alert on the snapshot
    pub pending_queue_alert_threshold: u64,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            cache_ttl_secs: 300,
            weights: ScoringWeights::default(),
            incident_half_life_days: 30.0,
            no_audit_security_floor: 50.0,
            pending_queue_alert_threshold: 500,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// ANOMALY CONFIGURATION
// ═══════════════════════════════════════════════════════════════════════════════

/// Configuration for the anomaly detector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalyConfig {
    /// Samples required before an entity leaves the learning phase
    pub min_learning_samples: usize,
    /// Rolling history window per entity (drop-oldest beyond this)
    pub history_window: usize,
    /// EMA smoothing factor for baseline updates
    pub ema_alpha: f64,
    /// Suppression window for repeated firings of the same pattern, in seconds
    pub alert_cooldown_secs: u64,
    /// Absolute floor below which response-time deviations are ignored, in ms
    pub response_time_floor_ms: f64,
}

impl Default for AnomalyConfig {
    fn default() -> Self {
        Self {
            min_learning_samples: 10,
            history_window: 100,
            ema_alpha: 0.1,
            alert_cooldown_secs: 300,
            response_time_floor_ms: 500.0,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// MONITOR CONFIGURATION
// ═══════════════════════════════════════════════════════════════════════════════

/// Top-level configuration for the monitoring orchestrator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Monitoring cycle interval in seconds
    pub update_interval_secs: u64,
    /// Bridges to monitor
    pub bridges: Vec<BridgeConfig>,
    /// Risk assessor configuration
    pub risk: RiskConfig,
    /// Anomaly detector configuration
    pub anomaly: AnomalyConfig,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            update_interval_secs: 30,
            bridges: Vec::new(),
            risk: RiskConfig::default(),
            anomaly: AnomalyConfig::default(),
        }
    }
}

impl MonitorConfig {
    /// Configuration for tight monitoring of a small fleet
    pub fn high_frequency() -> Self {
        Self {
            update_interval_secs: 10,
            anomaly: AnomalyConfig {
                alert_cooldown_secs: 120,
                ..AnomalyConfig::default()
            },
            ..Default::default()
        }
    }

    /// Configuration for low-churn, long-TTL monitoring
    pub fn conservative() -> Self {
        Self {
            update_interval_secs: 120,
            risk: RiskConfig {
                cache_ttl_secs: 900,
                ..RiskConfig::default()
            },
            anomaly: AnomalyConfig {
                min_learning_samples: 20,
                alert_cooldown_secs: 600,
                ..AnomalyConfig::default()
            },
            ..Default::default()
        }
    }

    /// Defensive validation of injected configuration
    pub fn validate(&self) -> Result<()> {
        if self.update_interval_secs == 0 {
            return Err(Error::InvalidConfig(
                "update_interval_secs must be positive".into(),
            ));
        }
        if self.risk.weights.total() <= 0.0 {
            return Err(Error::InvalidConfig(
                "scoring weights must sum to a positive value".into(),
            ));
        }
        if self.anomaly.history_window == 0 {
            return Err(Error::InvalidConfig(
                "history_window must be positive".into(),
            ));
        }
        Ok(())
    }
}
