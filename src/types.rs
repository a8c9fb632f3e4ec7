//! Core data model for the bridgewatch engine.
//!
//! Bridge configuration, per-cycle monitoring snapshots, incidents, security
//! audits, and anomaly alerts. Snapshots are immutable once produced and are
//! superseded (never mutated) by the next cycle's snapshot.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// ═══════════════════════════════════════════════════════════════════════════════
// BRIDGE CONFIGURATION
// ═══════════════════════════════════════════════════════════════════════════════

/// Mechanism a bridge uses to move value between chains
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BridgeType {
    /// Assets locked on the source chain, wrapped tokens minted on the target
    LockAndMint,
    /// Wrapped tokens burned on the source chain, native assets released
    BurnAndMint,
    /// Liquidity pools on both sides, no wrapping
    LiquidityNetwork,
    /// Optimistic verification with a challenge window
    Optimistic,
}

impl BridgeType {
    /// Get display name
    pub fn as_str(&self) -> &'static str {
        match self {
            BridgeType::LockAndMint => "lock_and_mint",
            BridgeType::BurnAndMint => "burn_and_mint",
            BridgeType::LiquidityNetwork => "liquidity_network",
            BridgeType::Optimistic => "optimistic",
        }
    }
}

/// Fee structure charged by a bridge
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeeStructure {
    /// Base fee as a percentage of transfer value
    pub base_fee_pct: f64,
    /// Minimum fee in USD
    pub min_fee_usd: f64,
    /// Maximum fee in USD
    pub max_fee_usd: f64,
}

impl Default for FeeStructure {
    fn default() -> Self {
        Self {
            base_fee_pct: 0.1,
            min_fee_usd: 1.0,
            max_fee_usd: 500.0,
        }
    }
}

/// Protocol flavor of a probe endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndpointKind {
    /// JSON-RPC node endpoint
    Rpc,
    /// REST status endpoint
    Rest,
    /// GraphQL indexer endpoint
    Graphql,
}

/// A probeable endpoint belonging to a bridge
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BridgeEndpoint {
    /// Endpoint URL
    pub url: String,
    /// Endpoint protocol flavor
    pub kind: EndpointKind,
    /// Per-probe timeout in milliseconds
    pub timeout_ms: u64,
    /// Retry attempts before the probe counts as failed
    pub retry_attempts: u32,
}

impl BridgeEndpoint {
    /// Create an RPC endpoint with default timeout/retry policy
    pub fn rpc(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            kind: EndpointKind::Rpc,
            timeout_ms: 5_000,
            retry_attempts: 2,
        }
    }
}

/// Static configuration for a monitored bridge.
///
/// Loaded at startup and immutable during a process lifetime unless replaced
/// through `MonitoringOrchestrator::update_config`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// Unique bridge identifier
    pub id: String,
    /// Display name
    pub name: String,
    /// Bridge mechanism
    pub bridge_type: BridgeType,
    /// Chains the bridge connects
    pub supported_chains: Vec<String>,
    /// Operator-assigned trust level (0-100)
    pub trust_level: u8,
    /// Expected average processing time in seconds
    pub avg_processing_time_secs: u64,
    /// Fee structure
    pub fees: FeeStructure,
    /// Per-chain contract addresses
    pub contract_addresses: HashMap<String, String>,
    /// Probeable endpoints
    pub endpoints: Vec<BridgeEndpoint>,
}

// ═══════════════════════════════════════════════════════════════════════════════
// MONITORING SNAPSHOT
// ═══════════════════════════════════════════════════════════════════════════════

/// Point-in-time view of a bridge, regenerated every monitoring cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitoringSnapshot {
    /// Bridge identifier
    pub bridge_id: String,
    /// Whether the bridge is currently operational
    pub is_operational: bool,
    /// Current total value locked in USD
    pub tvl_usd: f64,
    /// Volume over the last 24h in USD
    pub daily_volume_usd: f64,
    /// Current effective fee rate as a percentage
    pub fee_rate_pct: f64,
    /// Observed average processing time in seconds
    pub avg_processing_time_secs: u64,
    /// Length of the pending transaction queue
    pub pending_transactions: u64,
    /// Timestamp of the last observed transaction
    pub last_transaction_at: Option<DateTime<Utc>>,
    /// Alerts produced for this bridge during this cycle
    pub alerts: Vec<AnomalyAlert>,
    /// When this snapshot was generated
    pub generated_at: DateTime<Utc>,
}

// ═══════════════════════════════════════════════════════════════════════════════
// INCIDENTS
// ═══════════════════════════════════════════════════════════════════════════════

/// Category of a recorded incident
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IncidentKind {
    /// Funds stolen or at direct risk
    Exploit,
    /// Functional defect without direct fund loss
    Bug,
    /// Bridge unavailable or halted
    Downtime,
    /// Contentious or risky governance action
    Governance,
}

/// Severity of a recorded incident
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IncidentSeverity {
    /// Minor, informational
    Low,
    /// Noticeable impact, contained
    Medium,
    /// Significant impact
    High,
    /// Funds lost or bridge compromised
    Critical,
}

impl IncidentSeverity {
    /// Score penalty applied while the incident is fresh
    pub fn penalty(&self) -> f64 {
        match self {
            IncidentSeverity::Low => 3.0,
            IncidentSeverity::Medium => 8.0,
            IncidentSeverity::High => 15.0,
            IncidentSeverity::Critical => 25.0,
        }
    }
}

/// Append-only incident log entry.
///
/// Incidents never mutate after creation except the `resolved` flag; they
/// lower the owning bridge's cached score until aged out by decay or
/// compensated by a later audit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Incident {
    /// Bridge the incident belongs to
    pub bridge_id: String,
    /// Incident category
    pub kind: IncidentKind,
    /// Incident severity
    pub severity: IncidentSeverity,
    /// Value affected in USD
    pub affected_amount_usd: f64,
    /// Free-text description
    pub description: String,
    /// When the incident occurred
    pub occurred_at: DateTime<Utc>,
    /// Whether the incident has been resolved
    pub resolved: bool,
}

impl Incident {
    /// Create a new unresolved incident timestamped now
    pub fn new(
        bridge_id: impl Into<String>,
        kind: IncidentKind,
        severity: IncidentSeverity,
        affected_amount_usd: f64,
        description: impl Into<String>,
    ) -> Self {
        Self {
            bridge_id: bridge_id.into(),
            kind,
            severity,
            affected_amount_usd,
            description: description.into(),
            occurred_at: Utc::now(),
            resolved: false,
        }
    }

    /// Mark the incident resolved
    pub fn resolve(&mut self) {
        self.resolved = true;
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// SECURITY AUDITS
// ═══════════════════════════════════════════════════════════════════════════════

/// Risk level assigned by an auditor
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditRiskLevel {
    /// No significant concerns
    Low,
    /// Some concerns, mitigations recommended
    Medium,
    /// Serious concerns
    High,
    /// Bridge should not be trusted with significant value
    Critical,
}

impl AuditRiskLevel {
    /// Score penalty applied on top of the auditor's numeric score
    pub fn penalty(&self) -> f64 {
        match self {
            AuditRiskLevel::Low => 0.0,
            AuditRiskLevel::Medium => 5.0,
            AuditRiskLevel::High => 15.0,
            AuditRiskLevel::Critical => 30.0,
        }
    }
}

/// Current security audit for a bridge.
///
/// One current record per bridge, superseded by the next audit rather than
/// accumulated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecurityAudit {
    /// Auditing firm or researcher
    pub auditor: String,
    /// When the audit was performed
    pub audit_date: DateTime<Utc>,
    /// Auditor-assigned risk level
    pub risk_level: AuditRiskLevel,
    /// Findings noted by the auditor
    pub findings: Vec<String>,
    /// Numeric audit score (0-100)
    pub score: f64,
}

// ═══════════════════════════════════════════════════════════════════════════════
// ANOMALY ALERTS
// ═══════════════════════════════════════════════════════════════════════════════

/// Fixed taxonomy of anomaly alert types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertType {
    /// Request/transaction rate outside normal range
    RateAnomaly,
    /// Volume far above baseline
    VolumeSpike,
    /// Response time far above baseline
    ResponseTimeAnomaly,
    /// Gas consumption outside normal range
    GasAnomaly,
    /// Behavior consistent with an attack or exploit
    SecurityIncident,
    /// TVL drained or liquidity critically low
    LowLiquidity,
}

impl AlertType {
    /// Get wire name (matches the serde representation)
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertType::RateAnomaly => "rate_anomaly",
            AlertType::VolumeSpike => "volume_spike",
            AlertType::ResponseTimeAnomaly => "response_time_anomaly",
            AlertType::GasAnomaly => "gas_anomaly",
            AlertType::SecurityIncident => "security_incident",
            AlertType::LowLiquidity => "low_liquidity",
        }
    }
}

/// Severity of an anomaly alert
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertSeverity {
    /// Informational deviation
    Low,
    /// Deviation worth watching
    Medium,
    /// Deviation requiring attention
    High,
    /// Immediate action required
    Critical,
}

impl AlertSeverity {
    /// Get display name
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertSeverity::Low => "low",
            AlertSeverity::Medium => "medium",
            AlertSeverity::High => "high",
            AlertSeverity::Critical => "critical",
        }
    }

    /// Map an absolute deviation magnitude to a severity tier.
    ///
    /// `deviation` is `(current - baseline) / baseline`; callers pass the
    /// absolute value.
    pub fn from_deviation(deviation: f64) -> Self {
        if deviation >= 1.0 {
            AlertSeverity::Critical
        } else if deviation >= 0.5 {
            AlertSeverity::High
        } else if deviation >= 0.25 {
            AlertSeverity::Medium
        } else {
            AlertSeverity::Low
        }
    }
}

/// Lifecycle status of an anomaly alert
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertStatus {
    /// Newly raised
    Open,
    /// Under investigation
    Investigating,
    /// Condition cleared
    Resolved,
    /// Determined to be noise
    FalsePositive,
}

/// Metric context attached to an alert
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AlertMetrics {
    /// Baseline (expected-normal) value at detection time
    pub baseline: f64,
    /// Observed value that triggered the alert
    pub current: f64,
    /// Threshold that was crossed
    pub threshold: f64,
    /// Relative deviation `(current - baseline) / baseline`
    pub deviation: f64,
}

/// A single anomaly alert instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalyAlert {
    /// Alert identifier, unique within a process lifetime
    pub id: String,
    /// Alert type
    pub alert_type: AlertType,
    /// Severity level
    pub severity: AlertSeverity,
    /// Human-readable description
    pub description: String,
    /// Entity (bridge) the alert belongs to
    pub entity_id: String,
    /// When the anomaly was detected
    pub detected_at: DateTime<Utc>,
    /// Metric context
    pub metrics: AlertMetrics,
    /// Supporting evidence lines
    pub evidence: Vec<String>,
    /// Lifecycle status
    pub status: AlertStatus,
}

impl AnomalyAlert {
    /// Create a new open alert timestamped now
    pub fn new(
        id: impl Into<String>,
        alert_type: AlertType,
        severity: AlertSeverity,
        description: impl Into<String>,
        entity_id: impl Into<String>,
        metrics: AlertMetrics,
        evidence: Vec<String>,
    ) -> Self {
        Self {
            id: id.into(),
            alert_type,
            severity,
            description: description.into(),
            entity_id: entity_id.into(),
            detected_at: Utc::now(),
            metrics,
            evidence,
            status: AlertStatus::Open,
        }
    }
}
