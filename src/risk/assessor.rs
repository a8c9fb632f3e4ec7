//! Cached risk assessor.
//!
//! Owns the incident log, the current audit per bridge, and a TTL cache of
//! assessments. Recomputation happens only when an assessment is stale (new
//! incident, new audit, or TTL elapsed); repeated reads within the TTL return
//! the identical assessment. Recomputation requires a live telemetry
//! observation; when that fails and a previous cached assessment exists, the
//! cached assessment is retained instead of being discarded.

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::config::RiskConfig;
use crate::error::{Error, Result};
use crate::risk::scoring::{
    self, PerformanceSummary, RiskAssessment, RiskFactor,
};
use crate::types::{
    AlertMetrics, AlertSeverity, AlertType, AnomalyAlert, BridgeConfig, Incident,
    MonitoringSnapshot, SecurityAudit,
};

// ═══════════════════════════════════════════════════════════════════════════════
// TELEMETRY SOURCE
// ═══════════════════════════════════════════════════════════════════════════════

/// One observation of a bridge's live financial/operational state.
#[derive(Debug, Clone, PartialEq)]
pub struct BridgeObservation {
    /// Whether the bridge is processing transfers
    pub is_operational: bool,
    /// Current total value locked in USD
    pub tvl_usd: f64,
    /// Volume over the last 24h in USD
    pub daily_volume_usd: f64,
    /// Current effective fee rate as a percentage
    pub fee_rate_pct: f64,
    /// Observed average processing time in seconds
    pub avg_processing_time_secs: u64,
    /// Pending transaction queue length
    pub pending_transactions: u64,
    /// Timestamp of the last observed transaction
    pub last_transaction_at: Option<DateTime<Utc>>,
}

/// Injected source of live bridge state.
///
/// Production implementations wrap indexers or on-chain readers; tests supply
/// deterministic stubs. This replaces any randomized stand-in scoring: the
/// assessor itself never fabricates data.
pub trait BridgeTelemetry: Send + Sync {
    /// Observe the current state of `bridge`
    fn observe(&self, bridge: &BridgeConfig) -> Result<BridgeObservation>;
}

/// Telemetry source backed by a settable in-memory table.
///
/// Useful for tests and for deployments that push observations from an
/// external collector instead of pulling them.
#[derive(Debug, Default)]
pub struct StaticTelemetry {
    observations: std::sync::RwLock<HashMap<String, BridgeObservation>>,
}

impl StaticTelemetry {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the observation returned for `bridge_id`
    pub fn set(&self, bridge_id: impl Into<String>, observation: BridgeObservation) {
        if let Ok(mut map) = self.observations.write() {
            map.insert(bridge_id.into(), observation);
        }
    }

    /// Drop the observation for `bridge_id`; subsequent observes fail
    pub fn remove(&self, bridge_id: &str) {
        if let Ok(mut map) = self.observations.write() {
            map.remove(bridge_id);
        }
    }
}

impl BridgeTelemetry for StaticTelemetry {
    fn observe(&self, bridge: &BridgeConfig) -> Result<BridgeObservation> {
        self.observations
            .read()
            .map_err(|_| Error::Internal("telemetry table lock poisoned".into()))?
            .get(&bridge.id)
            .cloned()
            .ok_or_else(|| Error::AssessmentFailed {
                bridge_id: bridge.id.clone(),
                reason: "no telemetry recorded for bridge".into(),
            })
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// RISK ASSESSOR
// ═══════════════════════════════════════════════════════════════════════════════

/// Multi-factor risk assessor with a TTL cache.
pub struct RiskAssessor {
    config: RiskConfig,
    telemetry: Arc<dyn BridgeTelemetry>,
    bridges: RwLock<HashMap<String, BridgeConfig>>,
    incidents: RwLock<HashMap<String, Vec<Incident>>>,
    audits: RwLock<HashMap<String, SecurityAudit>>,
    cache: RwLock<HashMap<String, RiskAssessment>>,
    performance: RwLock<HashMap<String, PerformanceSummary>>,
    alert_seq: AtomicU64,
}

impl RiskAssessor {
    /// Create an assessor for the given bridge fleet
    pub fn new(
        config: RiskConfig,
        bridges: Vec<BridgeConfig>,
        telemetry: Arc<dyn BridgeTelemetry>,
    ) -> Self {
        let bridges = bridges.into_iter().map(|b| (b.id.clone(), b)).collect();
        Self {
            config,
            telemetry,
            bridges: RwLock::new(bridges),
            incidents: RwLock::new(HashMap::new()),
            audits: RwLock::new(HashMap::new()),
            cache: RwLock::new(HashMap::new()),
            performance: RwLock::new(HashMap::new()),
            alert_seq: AtomicU64::new(1),
        }
    }

    /// Replace the bridge table (used by `update_config`).
    ///
    /// Incident logs, audits, and performance history for surviving bridges
    /// are untouched.
    pub async fn update_bridges(&self, bridges: Vec<BridgeConfig>) {
        let mut table = self.bridges.write().await;
        *table = bridges.into_iter().map(|b| (b.id.clone(), b)).collect();
    }

    /// Fetch the current monitoring snapshot for a bridge.
    ///
    /// Fails with [`Error::BridgeNotFound`] for unconfigured ids. Each
    /// successful observation also feeds the bridge's performance history
    /// used by the liquidity sub-score.
    pub async fn get_status(&self, bridge_id: &str) -> Result<MonitoringSnapshot> {
        let bridge = self
            .bridges
            .read()
            .await
            .get(bridge_id)
            .cloned()
            .ok_or_else(|| Error::BridgeNotFound(bridge_id.to_string()))?;

        let observation = self.telemetry.observe(&bridge)?;

        {
            let mut perf = self.performance.write().await;
            perf.entry(bridge.id.clone())
                .or_default()
                .record(observation.tvl_usd, observation.daily_volume_usd);
        }

        let mut alerts = Vec::new();
        if !observation.is_operational {
            alerts.push(self.snapshot_alert(
                &bridge.id,
                AlertType::SecurityIncident,
                AlertSeverity::High,
                format!("bridge {} is not operational", bridge.id),
                AlertMetrics {
                    baseline: 1.0,
                    current: 0.0,
                    threshold: 1.0,
                    deviation: -1.0,
                },
                vec!["operational flag reported false by telemetry".into()],
            ));
        }
        if observation.pending_transactions > self.config.pending_queue_alert_threshold {
            alerts.push(self.snapshot_alert(
                &bridge.id,
                AlertType::RateAnomaly,
                AlertSeverity::Medium,
                format!(
                    "pending queue length {} exceeds threshold {}",
                    observation.pending_transactions, self.config.pending_queue_alert_threshold
                ),
                AlertMetrics {
                    baseline: self.config.pending_queue_alert_threshold as f64,
                    current: observation.pending_transactions as f64,
                    threshold: self.config.pending_queue_alert_threshold as f64,
                    deviation: observation.pending_transactions as f64
                        / self.config.pending_queue_alert_threshold.max(1) as f64
                        - 1.0,
                },
                vec![format!(
                    "pending_transactions={}",
                    observation.pending_transactions
                )],
            ));
        }

        Ok(MonitoringSnapshot {
            bridge_id: bridge.id,
            is_operational: observation.is_operational,
            tvl_usd: observation.tvl_usd,
            daily_volume_usd: observation.daily_volume_usd,
            fee_rate_pct: observation.fee_rate_pct,
            avg_processing_time_secs: observation.avg_processing_time_secs,
            pending_transactions: observation.pending_transactions,
            last_transaction_at: observation.last_transaction_at,
            alerts,
            generated_at: Utc::now(),
        })
    }

    /// Get the risk assessment for a bridge, recomputing only when stale.
    ///
    /// A repeated read within the cache TTL returns the identical assessment
    /// (same `last_updated`). If recomputation fails and a previous cached
    /// assessment exists, that assessment is retained and returned.
    pub async fn get_risk_assessment(&self, bridge_id: &str) -> Result<RiskAssessment> {
        let ttl = Duration::seconds(self.config.cache_ttl_secs as i64);

        if let Some(cached) = self.cache.read().await.get(bridge_id) {
            if Utc::now() - cached.last_updated < ttl {
                return Ok(cached.clone());
            }
        }

        let bridge = self
            .bridges
            .read()
            .await
            .get(bridge_id)
            .cloned()
            .ok_or_else(|| Error::BridgeNotFound(bridge_id.to_string()))?;

        // Recompute under the write lock so concurrent readers never see a
        // torn assessment; the check is repeated in case another caller won
        // the race.
        let mut cache = self.cache.write().await;
        if let Some(cached) = cache.get(bridge_id) {
            if Utc::now() - cached.last_updated < ttl {
                return Ok(cached.clone());
            }
        }

        match self.compute_assessment(&bridge).await {
            Ok(assessment) => {
                cache.insert(bridge_id.to_string(), assessment.clone());
                Ok(assessment)
            }
            Err(err) => {
                if let Some(stale) = cache.get(bridge_id) {
                    tracing::warn!(
                        bridge_id,
                        error = %err,
                        "assessment recompute failed, retaining previous cached value"
                    );
                    Ok(stale.clone())
                } else {
                    Err(err)
                }
            }
        }
    }

    /// Append an incident to the bridge's log and invalidate its cached
    /// assessment. The next `get_risk_assessment` call reflects a lower
    /// overall score.
    pub async fn record_incident(&self, incident: Incident) -> Result<()> {
        if !self.bridges.read().await.contains_key(&incident.bridge_id) {
            return Err(Error::BridgeNotFound(incident.bridge_id.clone()));
        }

        tracing::info!(
            bridge_id = %incident.bridge_id,
            kind = ?incident.kind,
            severity = ?incident.severity,
            "incident recorded"
        );

        let bridge_id = incident.bridge_id.clone();
        self.incidents
            .write()
            .await
            .entry(bridge_id.clone())
            .or_default()
            .push(incident);
        self.cache.write().await.remove(&bridge_id);
        Ok(())
    }

    /// Replace the bridge's current audit and invalidate the cache.
    pub async fn update_security_audit(
        &self,
        bridge_id: &str,
        audit: SecurityAudit,
    ) -> Result<()> {
        if !self.bridges.read().await.contains_key(bridge_id) {
            return Err(Error::BridgeNotFound(bridge_id.to_string()));
        }

        tracing::info!(
            bridge_id,
            auditor = %audit.auditor,
            score = audit.score,
            "security audit updated"
        );

        self.audits
            .write()
            .await
            .insert(bridge_id.to_string(), audit);
        self.cache.write().await.remove(bridge_id);
        Ok(())
    }

    /// Current assessments for every configured bridge.
    ///
    /// Bridges whose assessment cannot be computed yet are skipped.
    pub async fn get_all_assessments(&self) -> HashMap<String, RiskAssessment> {
        let ids: Vec<String> = self.bridges.read().await.keys().cloned().collect();
        let mut out = HashMap::with_capacity(ids.len());
        for id in ids {
            match self.get_risk_assessment(&id).await {
                Ok(assessment) => {
                    out.insert(id, assessment);
                }
                Err(err) => {
                    tracing::debug!(bridge_id = %id, error = %err, "skipping assessment");
                }
            }
        }
        out
    }

    /// Incident log for a bridge (most recent last)
    pub async fn incidents_for(&self, bridge_id: &str) -> Vec<Incident> {
        self.incidents
            .read()
            .await
            .get(bridge_id)
            .cloned()
            .unwrap_or_default()
    }

    async fn compute_assessment(&self, bridge: &BridgeConfig) -> Result<RiskAssessment> {
        if self.config.weights.total() <= 0.0 {
            return Err(Error::AssessmentFailed {
                bridge_id: bridge.id.clone(),
                reason: "scoring weights sum to zero".into(),
            });
        }

        // The liquidity sub-score needs a live observation; a dead feed makes
        // the whole recompute fail (callers fall back to the cached value).
        let observation = self.telemetry.observe(bridge).map_err(|err| match err {
            failed @ Error::AssessmentFailed { .. } => failed,
            other => Error::AssessmentFailed {
                bridge_id: bridge.id.clone(),
                reason: other.to_string(),
            },
        })?;

        let now = Utc::now();
        let incidents = self.incidents_for(&bridge.id).await;
        let audit = self.audits.read().await.get(&bridge.id).cloned();
        let performance = self
            .performance
            .read()
            .await
            .get(&bridge.id)
            .copied()
            .unwrap_or_default();

        let half_life = self.config.incident_half_life_days;
        let safety = scoring::safety_score(bridge.trust_level, &incidents, now, half_life);
        let reliability = scoring::reliability_score(&incidents, now, half_life);
        let security =
            scoring::security_score(audit.as_ref(), self.config.no_audit_security_floor);
        let liquidity = scoring::liquidity_score(
            observation.tvl_usd,
            observation.daily_volume_usd,
            &performance,
        );

        let mut overall = scoring::weighted_overall(
            &self.config.weights,
            safety,
            liquidity,
            reliability,
            security,
        );

        let has_unresolved = incidents.iter().any(|i| !i.resolved);
        if has_unresolved {
            // A bridge with open incidents can never read as perfectly safe.
            overall = overall.min(99.0);
        }

        let mut risk_factors = Vec::new();
        for incident in incidents.iter().filter(|i| !i.resolved) {
            risk_factors.push(RiskFactor {
                description: format!(
                    "unresolved {:?} incident: {}",
                    incident.kind, incident.description
                ),
                weight: incident.severity.penalty(),
            });
        }
        if audit.is_none() {
            risk_factors.push(RiskFactor {
                description: "no security audit on record".into(),
                weight: 10.0,
            });
        }
        if !observation.is_operational {
            risk_factors.push(RiskFactor {
                description: "bridge currently not operational".into(),
                weight: 20.0,
            });
        }
        risk_factors.sort_by(|a, b| b.weight.total_cmp(&a.weight));

        Ok(RiskAssessment {
            bridge_id: bridge.id.clone(),
            overall_score: overall,
            safety_score: safety,
            liquidity_score: liquidity,
            reliability_score: reliability,
            security_score: security,
            risk_factors,
            performance,
            last_updated: now,
        })
    }

    fn snapshot_alert(
        &self,
        bridge_id: &str,
        alert_type: AlertType,
        severity: AlertSeverity,
        description: String,
        metrics: AlertMetrics,
        evidence: Vec<String>,
    ) -> AnomalyAlert {
        let seq = self.alert_seq.fetch_add(1, Ordering::Relaxed);
        AnomalyAlert::new(
            format!("{}-{}-{}", bridge_id, alert_type.as_str(), seq),
            alert_type,
            severity,
            description,
            bridge_id,
            metrics,
            evidence,
        )
    }
}
