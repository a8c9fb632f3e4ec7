//! Monitoring orchestrator.
//!
//! Runs the fixed-interval monitoring cycle: per-bridge health checks,
//! snapshot fetches from the risk assessor, anomaly evaluation, and alert
//! fan-out to subscribers. Per-bridge work is dispatched onto independent
//! tasks so one bridge's failure never aborts its siblings.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{interval, timeout};

use crate::anomaly::{AnomalyDetector, DetectionStats, MetricSample};
use crate::config::MonitorConfig;
use crate::error::{Error, Result};
use crate::risk::{RiskAssessment, RiskAssessor};
use crate::types::{
    AlertMetrics, AlertSeverity, AlertType, AnomalyAlert, BridgeConfig, BridgeEndpoint, Incident,
    IncidentKind, IncidentSeverity, MonitoringSnapshot,
};

use super::metrics::BridgeMetrics;
use super::probe::{EndpointProber, HealthCheckResult, ProbeOutcome};

/// Extra slack on top of an endpoint's own timeout before the orchestrator
/// gives up on a probe
const PROBE_TIMEOUT_SLACK_MS: u64 = 1_000;

// ═══════════════════════════════════════════════════════════════════════════════
// LIFECYCLE & STATUS TYPES
// ═══════════════════════════════════════════════════════════════════════════════

/// Lifecycle state of the orchestrator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrchestratorPhase {
    /// Not monitoring
    Stopped,
    /// Metrics primed, cycle timer not yet running
    Initializing,
    /// Cycle timer active
    Running,
}

/// Handle returned by `subscribe_to_alerts`, used to unsubscribe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubscriptionId(u64);

/// Alert delivery callback
pub type AlertCallback = Arc<dyn Fn(&AnomalyAlert) + Send + Sync>;

#[derive(Clone)]
struct Subscriber {
    id: u64,
    callback: AlertCallback,
}

/// Aggregate view over the whole fleet
#[derive(Debug, Clone, Serialize)]
pub struct MonitoringStatus {
    /// Orchestrator lifecycle state
    pub phase: OrchestratorPhase,
    /// Latest snapshot per bridge
    pub bridges: HashMap<String, MonitoringSnapshot>,
    /// Current assessment per bridge
    pub assessments: HashMap<String, RiskAssessment>,
    /// Alerts delivered to subscribers since startup
    pub total_alerts: u64,
    /// Monitoring cycles completed since startup
    pub cycles_completed: u64,
    /// When the last cycle finished
    pub last_cycle_at: Option<DateTime<Utc>>,
}

/// Composed detail view for one bridge
#[derive(Debug, Clone, Serialize)]
pub struct BridgeDetails {
    /// Static bridge configuration
    pub config: BridgeConfig,
    /// Latest monitoring snapshot, if a cycle has run
    pub snapshot: Option<MonitoringSnapshot>,
    /// Current risk assessment, if computable
    pub assessment: Option<RiskAssessment>,
    /// Rolling health metrics
    pub metrics: BridgeMetrics,
    /// Configured probe endpoints
    pub endpoints: Vec<BridgeEndpoint>,
}

/// Orchestrator counters
#[derive(Debug, Clone, Copy, Serialize)]
pub struct OrchestratorStats {
    /// Lifecycle state
    pub phase: OrchestratorPhase,
    /// Monitoring cycles completed since startup
    pub cycles_completed: u64,
    /// Alerts delivered to subscribers since startup
    pub alerts_dispatched: u64,
    /// Active subscriber count
    pub subscribers: usize,
    /// When the last cycle finished
    pub last_cycle_at: Option<DateTime<Utc>>,
}

// ═══════════════════════════════════════════════════════════════════════════════
// ORCHESTRATOR
// ═══════════════════════════════════════════════════════════════════════════════

/// Periodic fleet monitor tying the risk assessor and anomaly detector
/// together.
#[derive(Clone)]
pub struct MonitoringOrchestrator {
    inner: Arc<Inner>,
}

struct Inner {
    config: RwLock<MonitorConfig>,
    risk: Arc<RiskAssessor>,
    detector: Arc<AnomalyDetector>,
    prober: Arc<dyn EndpointProber>,
    metrics: RwLock<HashMap<String, BridgeMetrics>>,
    snapshots: RwLock<HashMap<String, MonitoringSnapshot>>,
    subscribers: std::sync::RwLock<Vec<Subscriber>>,
    phase: RwLock<OrchestratorPhase>,
    cycle_task: Mutex<Option<JoinHandle<()>>>,
    shutdown: RwLock<bool>,
    last_cycle_at: RwLock<Option<DateTime<Utc>>>,
    cycles_completed: AtomicU64,
    alerts_dispatched: AtomicU64,
    next_subscription: AtomicU64,
}

impl MonitoringOrchestrator {
    /// Create an orchestrator over injected collaborators
    pub fn new(
        config: MonitorConfig,
        risk: Arc<RiskAssessor>,
        detector: Arc<AnomalyDetector>,
        prober: Arc<dyn EndpointProber>,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            inner: Arc::new(Inner {
                config: RwLock::new(config),
                risk,
                detector,
                prober,
                metrics: RwLock::new(HashMap::new()),
                snapshots: RwLock::new(HashMap::new()),
                subscribers: std::sync::RwLock::new(Vec::new()),
                phase: RwLock::new(OrchestratorPhase::Stopped),
                cycle_task: Mutex::new(None),
                shutdown: RwLock::new(false),
                last_cycle_at: RwLock::new(None),
                cycles_completed: AtomicU64::new(0),
                alerts_dispatched: AtomicU64::new(0),
                next_subscription: AtomicU64::new(1),
            }),
        })
    }

    /// Prime per-bridge metrics (uptime 100%, zero error rate) ahead of the
    /// first cycle.
    pub async fn initialize(&self) -> Result<()> {
        let bridges: Vec<String> = self
            .inner
            .config
            .read()
            .await
            .bridges
            .iter()
            .map(|b| b.id.clone())
            .collect();

        let mut metrics = self.inner.metrics.write().await;
        for id in &bridges {
            metrics.entry(id.clone()).or_insert_with(BridgeMetrics::new);
        }
        drop(metrics);

        *self.inner.phase.write().await = OrchestratorPhase::Initializing;
        tracing::info!(bridges = bridges.len(), "monitoring initialized");
        Ok(())
    }

    /// Start the periodic cycle timer. No-op if already running.
    pub async fn start(&self) -> Result<()> {
        {
            let phase = self.inner.phase.read().await;
            if *phase == OrchestratorPhase::Running {
                return Ok(());
            }
            if *phase == OrchestratorPhase::Stopped {
                drop(phase);
                self.initialize().await?;
            }
        }

        *self.inner.shutdown.write().await = false;

        let interval_secs = self.inner.config.read().await.update_interval_secs;
        let inner = Arc::clone(&self.inner);
        let handle = tokio::spawn(async move {
            let mut ticker = interval(Duration::from_secs(interval_secs));
            loop {
                ticker.tick().await;
                if *inner.shutdown.read().await {
                    break;
                }
                Inner::run_cycle(Arc::clone(&inner)).await;
            }
        });

        *self.inner.cycle_task.lock().await = Some(handle);
        *self.inner.phase.write().await = OrchestratorPhase::Running;
        tracing::info!(interval_secs, "monitoring started");
        Ok(())
    }

    /// Cancel the cycle timer. Per-bridge work already dispatched runs to
    /// completion on its own tasks; no new cycle starts after this returns.
    /// No-op if already stopped.
    pub async fn stop(&self) {
        {
            let phase = self.inner.phase.read().await;
            if *phase == OrchestratorPhase::Stopped {
                return;
            }
        }

        *self.inner.shutdown.write().await = true;
        if let Some(handle) = self.inner.cycle_task.lock().await.take() {
            handle.abort();
        }
        *self.inner.phase.write().await = OrchestratorPhase::Stopped;
        tracing::info!("monitoring stopped");
    }

    /// Run one monitoring cycle immediately (also driven by the timer).
    pub async fn perform_monitoring_cycle(&self) {
        Inner::run_cycle(Arc::clone(&self.inner)).await;
    }

    /// Probe every endpoint of a bridge and fold the result into its
    /// metrics. Fails only for unconfigured ids.
    pub async fn perform_health_check(&self, bridge_id: &str) -> Result<HealthCheckResult> {
        let bridge = self
            .inner
            .config
            .read()
            .await
            .bridges
            .iter()
            .find(|b| b.id == bridge_id)
            .cloned()
            .ok_or_else(|| Error::BridgeNotFound(bridge_id.to_string()))?;
        Ok(Inner::health_check(&self.inner, &bridge).await)
    }

    /// Aggregate snapshot of all bridges plus assessments and alert counters
    pub async fn get_monitoring_status(&self) -> MonitoringStatus {
        MonitoringStatus {
            phase: *self.inner.phase.read().await,
            bridges: self.inner.snapshots.read().await.clone(),
            assessments: self.inner.risk.get_all_assessments().await,
            total_alerts: self.inner.alerts_dispatched.load(Ordering::Relaxed),
            cycles_completed: self.inner.cycles_completed.load(Ordering::Relaxed),
            last_cycle_at: *self.inner.last_cycle_at.read().await,
        }
    }

    /// Composed monitoring + assessment + metrics view for one bridge
    pub async fn get_bridge_details(&self, bridge_id: &str) -> Result<BridgeDetails> {
        let config = self
            .inner
            .config
            .read()
            .await
            .bridges
            .iter()
            .find(|b| b.id == bridge_id)
            .cloned()
            .ok_or_else(|| Error::BridgeNotFound(bridge_id.to_string()))?;

        let snapshot = self.inner.snapshots.read().await.get(bridge_id).cloned();
        let assessment = self.inner.risk.get_risk_assessment(bridge_id).await.ok();
        let metrics = self
            .inner
            .metrics
            .read()
            .await
            .get(bridge_id)
            .copied()
            .unwrap_or_default();
        let endpoints = config.endpoints.clone();

        Ok(BridgeDetails {
            config,
            snapshot,
            assessment,
            metrics,
            endpoints,
        })
    }

    /// Record an incident on the risk assessor and push an immediate alert
    /// to subscribers.
    pub async fn record_incident(&self, incident: Incident) -> Result<()> {
        self.inner.risk.record_incident(incident.clone()).await?;

        let severity = match incident.severity {
            IncidentSeverity::Low => AlertSeverity::Low,
            IncidentSeverity::Medium => AlertSeverity::Medium,
            IncidentSeverity::High => AlertSeverity::High,
            IncidentSeverity::Critical => AlertSeverity::Critical,
        };
        let alert = AnomalyAlert::new(
            format!(
                "{}-incident-{}",
                incident.bridge_id,
                incident.occurred_at.timestamp_millis()
            ),
            AlertType::SecurityIncident,
            severity,
            format!(
                "incident reported ({:?}): {}",
                incident.kind, incident.description
            ),
            incident.bridge_id.clone(),
            AlertMetrics {
                baseline: 0.0,
                current: incident.affected_amount_usd,
                threshold: 0.0,
                deviation: 0.0,
            },
            vec![format!(
                "affected_amount_usd={:.2}",
                incident.affected_amount_usd
            )],
        );
        Inner::dispatch_alert(&self.inner, &alert);
        Ok(())
    }

    /// Forward an audit update to the risk assessor
    pub async fn update_security_audit(
        &self,
        bridge_id: &str,
        audit: crate::types::SecurityAudit,
    ) -> Result<()> {
        self.inner.risk.update_security_audit(bridge_id, audit).await
    }

    /// Register an alert subscriber; the returned id unsubscribes it
    pub fn subscribe_to_alerts(
        &self,
        callback: impl Fn(&AnomalyAlert) + Send + Sync + 'static,
    ) -> SubscriptionId {
        let id = self.inner.next_subscription.fetch_add(1, Ordering::Relaxed);
        if let Ok(mut subscribers) = self.inner.subscribers.write() {
            subscribers.push(Subscriber {
                id,
                callback: Arc::new(callback),
            });
        }
        SubscriptionId(id)
    }

    /// Remove a subscriber. Returns true if it was registered.
    pub fn unsubscribe_from_alerts(&self, id: SubscriptionId) -> bool {
        match self.inner.subscribers.write() {
            Ok(mut subscribers) => {
                let before = subscribers.len();
                subscribers.retain(|s| s.id != id.0);
                subscribers.len() != before
            }
            Err(_) => false,
        }
    }

    /// Replace the bridge fleet configuration.
    ///
    /// Metrics are initialized for newly added bridges and surviving
    /// bridges keep their metrics, incident logs, and baselines; metrics and
    /// snapshots of bridges dropped from the fleet are pruned.
    pub async fn update_config(&self, new_config: MonitorConfig) -> Result<()> {
        new_config.validate()?;

        self.inner
            .risk
            .update_bridges(new_config.bridges.clone())
            .await;

        {
            let keep: HashSet<&str> = new_config.bridges.iter().map(|b| b.id.as_str()).collect();
            let mut metrics = self.inner.metrics.write().await;
            metrics.retain(|id, _| keep.contains(id.as_str()));
            for bridge in &new_config.bridges {
                metrics
                    .entry(bridge.id.clone())
                    .or_insert_with(BridgeMetrics::new);
            }
            drop(metrics);
            let mut snapshots = self.inner.snapshots.write().await;
            snapshots.retain(|id, _| keep.contains(id.as_str()));
        }

        let bridge_count = new_config.bridges.len();
        *self.inner.config.write().await = new_config;
        tracing::info!(bridges = bridge_count, "monitoring configuration replaced");
        Ok(())
    }

    /// Orchestrator counters
    pub async fn stats(&self) -> OrchestratorStats {
        OrchestratorStats {
            phase: *self.inner.phase.read().await,
            cycles_completed: self.inner.cycles_completed.load(Ordering::Relaxed),
            alerts_dispatched: self.inner.alerts_dispatched.load(Ordering::Relaxed),
            subscribers: self
                .inner
                .subscribers
                .read()
                .map(|s| s.len())
                .unwrap_or(0),
            last_cycle_at: *self.inner.last_cycle_at.read().await,
        }
    }

    /// Anomaly detector statistics (pure read)
    pub fn get_anomaly_stats(&self) -> DetectionStats {
        self.inner.detector.detection_stats()
    }
}

impl Inner {
    /// One full monitoring cycle: fan out per-bridge tasks, wait for all to
    /// settle, log failures without letting them cancel siblings.
    async fn run_cycle(inner: Arc<Inner>) {
        let bridges = inner.config.read().await.bridges.clone();

        let mut handles = Vec::with_capacity(bridges.len());
        for bridge in bridges {
            let task_inner = Arc::clone(&inner);
            let bridge_id = bridge.id.clone();
            handles.push((
                bridge_id,
                tokio::spawn(Inner::process_bridge(task_inner, bridge)),
            ));
        }

        for (bridge_id, handle) in handles {
            match handle.await {
                Ok(Ok(())) => {}
                Ok(Err(err)) => {
                    tracing::warn!(bridge_id = %bridge_id, error = %err, "bridge cycle failed");
                }
                Err(err) => {
                    tracing::warn!(bridge_id = %bridge_id, error = %err, "bridge task panicked");
                }
            }
        }

        inner.cycles_completed.fetch_add(1, Ordering::Relaxed);
        *inner.last_cycle_at.write().await = Some(Utc::now());
        tracing::debug!("monitoring cycle complete");
    }

    /// Per-bridge cycle step: health check, snapshot fetch, anomaly feed,
    /// alert union, subscriber dispatch — in that order.
    async fn process_bridge(inner: Arc<Inner>, bridge: BridgeConfig) -> Result<()> {
        let health = Inner::health_check(&inner, &bridge).await;

        let metrics = inner
            .metrics
            .read()
            .await
            .get(&bridge.id)
            .copied()
            .unwrap_or_default();

        let snapshot = match inner.risk.get_status(&bridge.id).await {
            Ok(snapshot) => snapshot,
            Err(err) => {
                tracing::warn!(bridge_id = %bridge.id, error = %err, "status fetch failed");
                // Absence of data is itself a signal: publish a degraded
                // snapshot instead of dropping the bridge from view.
                MonitoringSnapshot {
                    bridge_id: bridge.id.clone(),
                    is_operational: false,
                    tvl_usd: 0.0,
                    daily_volume_usd: 0.0,
                    fee_rate_pct: 0.0,
                    avg_processing_time_secs: 0,
                    pending_transactions: 0,
                    last_transaction_at: None,
                    alerts: Vec::new(),
                    generated_at: Utc::now(),
                }
            }
        };

        let response_time_ms = health
            .avg_latency_ms()
            .map(|l| l as f64)
            .unwrap_or(metrics.avg_latency_ms);
        let sample = MetricSample::new(
            snapshot.tvl_usd,
            snapshot.daily_volume_usd,
            metrics.error_rate,
            response_time_ms,
        );
        let anomalies = inner.detector.process_sample(&bridge.id, sample);

        for alert in &anomalies {
            if alert.severity == AlertSeverity::Critical {
                Inner::escalate_to_incident(&inner, alert).await;
            }
        }

        let mut merged = snapshot.alerts.clone();
        merged.extend(anomalies);
        // One alert per type; the most severe instance wins when the snapshot
        // and the detector both raise the same type.
        merged.sort_by(|a, b| b.severity.cmp(&a.severity));
        let mut seen: HashSet<AlertType> = HashSet::new();
        merged.retain(|a| seen.insert(a.alert_type));

        let final_snapshot = MonitoringSnapshot {
            is_operational: snapshot.is_operational && health.healthy,
            alerts: merged.clone(),
            ..snapshot
        };
        inner
            .snapshots
            .write()
            .await
            .insert(bridge.id.clone(), final_snapshot);

        for alert in &merged {
            Inner::dispatch_alert(&inner, alert);
        }

        Ok(())
    }

    /// Probe every endpoint of a bridge, each bounded by its own timeout,
    /// and fold the aggregate into the bridge's metrics.
    async fn health_check(inner: &Inner, bridge: &BridgeConfig) -> HealthCheckResult {
        let mut outcomes = Vec::with_capacity(bridge.endpoints.len());
        let mut errors = Vec::new();

        for endpoint in &bridge.endpoints {
            let bound = Duration::from_millis(
                endpoint.timeout_ms.saturating_mul(endpoint.retry_attempts.max(1) as u64)
                    + PROBE_TIMEOUT_SLACK_MS,
            );
            match timeout(bound, inner.prober.probe(endpoint)).await {
                Ok(Ok(outcome)) => {
                    if !outcome.healthy {
                        if let Some(err) = &outcome.error {
                            errors.push(format!("{}: {}", endpoint.url, err));
                        }
                    }
                    outcomes.push(outcome);
                }
                Ok(Err(err)) => {
                    errors.push(err.to_string());
                    outcomes.push(ProbeOutcome {
                        url: endpoint.url.clone(),
                        latency_ms: endpoint.timeout_ms,
                        healthy: false,
                        error: Some(err.to_string()),
                    });
                }
                Err(_) => {
                    let reason = "probe exceeded its timeout bound".to_string();
                    errors.push(format!("{}: {}", endpoint.url, reason));
                    outcomes.push(ProbeOutcome {
                        url: endpoint.url.clone(),
                        latency_ms: endpoint.timeout_ms,
                        healthy: false,
                        error: Some(reason),
                    });
                }
            }
        }

        let healthy = outcomes.iter().all(|o| o.healthy);
        let result = HealthCheckResult {
            bridge_id: bridge.id.clone(),
            healthy,
            endpoints: outcomes,
            errors,
            checked_at: Utc::now(),
        };

        let mut metrics = inner.metrics.write().await;
        let entry = metrics
            .entry(bridge.id.clone())
            .or_insert_with(BridgeMetrics::new);
        if healthy {
            entry.record_success(result.avg_latency_ms().unwrap_or(0));
        } else {
            entry.record_failure();
        }

        result
    }

    /// Auto-escalate a critical anomaly into an incident on the assessor.
    async fn escalate_to_incident(inner: &Inner, alert: &AnomalyAlert) {
        let kind = match alert.alert_type {
            AlertType::SecurityIncident => IncidentKind::Exploit,
            AlertType::LowLiquidity => IncidentKind::Downtime,
            _ => return,
        };
        let incident = Incident::new(
            alert.entity_id.clone(),
            kind,
            IncidentSeverity::High,
            0.0,
            format!("auto-escalated from anomaly: {}", alert.description),
        );
        if let Err(err) = inner.risk.record_incident(incident).await {
            tracing::warn!(
                bridge_id = %alert.entity_id,
                error = %err,
                "incident escalation failed"
            );
        }
    }

    /// Deliver one alert to every subscriber. A panicking subscriber is
    /// contained and logged; delivery continues to the rest. With no
    /// subscribers registered nothing is delivered and nothing is counted.
    fn dispatch_alert(inner: &Inner, alert: &AnomalyAlert) {
        let subscribers: Vec<Subscriber> = match inner.subscribers.read() {
            Ok(subscribers) => subscribers.clone(),
            Err(_) => return,
        };
        if subscribers.is_empty() {
            return;
        }

        for subscriber in &subscribers {
            let callback = Arc::clone(&subscriber.callback);
            if catch_unwind(AssertUnwindSafe(|| callback(alert))).is_err() {
                let err = Error::Subscriber(format!(
                    "subscriber {} panicked delivering alert {}",
                    subscriber.id, alert.id
                ));
                tracing::error!(error = %err, "alert delivery failure");
            }
        }

        inner.alerts_dispatched.fetch_add(1, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::anomaly::AnomalyDetector;
    use crate::config::{AnomalyConfig, RiskConfig};
    use crate::risk::{BridgeObservation, StaticTelemetry};
    use crate::types::{BridgeType, FeeStructure};

    fn test_bridge(id: &str) -> BridgeConfig {
        BridgeConfig {
            id: id.into(),
            name: format!("{id} bridge"),
            bridge_type: BridgeType::LiquidityNetwork,
            supported_chains: vec!["ethereum".into(), "arbitrum".into()],
            trust_level: 80,
            avg_processing_time_secs: 90,
            fees: FeeStructure::default(),
            contract_addresses: HashMap::new(),
            endpoints: vec![],
        }
    }

    struct AlwaysUpProber;

    impl EndpointProber for AlwaysUpProber {
        fn probe<'a>(
            &'a self,
            endpoint: &'a BridgeEndpoint,
        ) -> crate::monitoring::probe::ProbeFuture<'a> {
            Box::pin(async move {
                Ok(ProbeOutcome {
                    url: endpoint.url.clone(),
                    latency_ms: 50,
                    healthy: true,
                    error: None,
                })
            })
        }
    }

    fn orchestrator_with(bridges: Vec<BridgeConfig>) -> MonitoringOrchestrator {
        let telemetry = Arc::new(StaticTelemetry::new());
        for bridge in &bridges {
            telemetry.set(
                bridge.id.clone(),
                BridgeObservation {
                    is_operational: true,
                    tvl_usd: 1_000_000.0,
                    daily_volume_usd: 50_000.0,
                    fee_rate_pct: 0.1,
                    avg_processing_time_secs: 90,
                    pending_transactions: 5,
                    last_transaction_at: Some(Utc::now()),
                },
            );
        }
        let config = MonitorConfig {
            bridges: bridges.clone(),
            ..Default::default()
        };
        let risk = Arc::new(RiskAssessor::new(
            RiskConfig::default(),
            bridges,
            telemetry,
        ));
        let detector = Arc::new(AnomalyDetector::new(AnomalyConfig::default()));
        MonitoringOrchestrator::new(config, risk, detector, Arc::new(AlwaysUpProber))
            .expect("valid config")
    }

    #[tokio::test]
    async fn test_lifecycle_idempotency() {
        let orchestrator = orchestrator_with(vec![test_bridge("b1")]);
        let stats = orchestrator.stats().await;
        assert_eq!(stats.phase, OrchestratorPhase::Stopped);

        orchestrator.start().await.unwrap();
        orchestrator.start().await.unwrap();
        assert_eq!(orchestrator.stats().await.phase, OrchestratorPhase::Running);

        orchestrator.stop().await;
        orchestrator.stop().await;
        assert_eq!(orchestrator.stats().await.phase, OrchestratorPhase::Stopped);
    }

    #[tokio::test]
    async fn test_initialize_primes_metrics() {
        let orchestrator = orchestrator_with(vec![test_bridge("b1"), test_bridge("b2")]);
        orchestrator.initialize().await.unwrap();

        let details = orchestrator.get_bridge_details("b1").await.unwrap();
        assert_eq!(details.metrics.uptime_pct, 100.0);
        assert_eq!(details.metrics.error_rate, 0.0);
        assert_eq!(details.metrics.consecutive_failures, 0);
    }

    #[tokio::test]
    async fn test_unknown_bridge_details() {
        let orchestrator = orchestrator_with(vec![test_bridge("b1")]);
        assert!(matches!(
            orchestrator.get_bridge_details("non-existent").await,
            Err(Error::BridgeNotFound(_))
        ));
        assert!(matches!(
            orchestrator.perform_health_check("non-existent").await,
            Err(Error::BridgeNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_cycle_populates_snapshots() {
        let orchestrator = orchestrator_with(vec![test_bridge("b1"), test_bridge("b2")]);
        orchestrator.initialize().await.unwrap();
        orchestrator.perform_monitoring_cycle().await;

        let status = orchestrator.get_monitoring_status().await;
        assert_eq!(status.bridges.len(), 2);
        assert_eq!(status.cycles_completed, 1);
        assert!(status.bridges.values().all(|s| s.is_operational));
        assert!(status.last_cycle_at.is_some());
    }

    #[tokio::test]
    async fn test_subscribe_unsubscribe() {
        let orchestrator = orchestrator_with(vec![test_bridge("b1")]);
        let received = Arc::new(AtomicU64::new(0));

        let counter = Arc::clone(&received);
        let id = orchestrator.subscribe_to_alerts(move |_alert| {
            counter.fetch_add(1, Ordering::Relaxed);
        });
        assert_eq!(orchestrator.stats().await.subscribers, 1);

        orchestrator
            .record_incident(Incident::new(
                "b1",
                IncidentKind::Downtime,
                IncidentSeverity::Medium,
                0.0,
                "relayers offline",
            ))
            .await
            .unwrap();
        assert_eq!(received.load(Ordering::Relaxed), 1);

        assert!(orchestrator.unsubscribe_from_alerts(id));
        assert!(!orchestrator.unsubscribe_from_alerts(id));
        assert_eq!(orchestrator.stats().await.subscribers, 0);
    }

    #[tokio::test]
    async fn test_panicking_subscriber_is_contained() {
        let orchestrator = orchestrator_with(vec![test_bridge("b1")]);
        let received = Arc::new(AtomicU64::new(0));

        orchestrator.subscribe_to_alerts(|_alert| panic!("subscriber bug"));
        let counter = Arc::clone(&received);
        orchestrator.subscribe_to_alerts(move |_alert| {
            counter.fetch_add(1, Ordering::Relaxed);
        });

        orchestrator
            .record_incident(Incident::new(
                "b1",
                IncidentKind::Bug,
                IncidentSeverity::Low,
                0.0,
                "stuck nonce",
            ))
            .await
            .unwrap();

        // Delivery reached the second subscriber despite the first panicking.
        assert_eq!(received.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn test_update_config_adds_new_bridge_metrics() {
        let orchestrator = orchestrator_with(vec![test_bridge("b1")]);
        orchestrator.initialize().await.unwrap();

        let new_config = MonitorConfig {
            bridges: vec![test_bridge("b1"), test_bridge("b3")],
            ..Default::default()
        };
        orchestrator.update_config(new_config).await.unwrap();

        let details = orchestrator.get_bridge_details("b3").await.unwrap();
        assert_eq!(details.metrics.uptime_pct, 100.0);
    }

    #[tokio::test]
    async fn test_update_config_prunes_removed_bridges() {
        let orchestrator = orchestrator_with(vec![test_bridge("b1"), test_bridge("b2")]);
        orchestrator.initialize().await.unwrap();
        orchestrator.perform_monitoring_cycle().await;
        assert_eq!(
            orchestrator.get_monitoring_status().await.bridges.len(),
            2
        );

        let new_config = MonitorConfig {
            bridges: vec![test_bridge("b1")],
            ..Default::default()
        };
        orchestrator.update_config(new_config).await.unwrap();

        let status = orchestrator.get_monitoring_status().await;
        assert_eq!(status.bridges.len(), 1);
        assert!(status.bridges.contains_key("b1"));
        assert!(matches!(
            orchestrator.get_bridge_details("b2").await,
            Err(Error::BridgeNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_dedup_keeps_highest_severity_per_type() {
        use crate::anomaly::AnomalyPattern;

        let telemetry = Arc::new(StaticTelemetry::new());
        // Offline bridge: every snapshot carries a high security_incident.
        telemetry.set(
            "b1",
            BridgeObservation {
                is_operational: false,
                tvl_usd: 1_000_000.0,
                daily_volume_usd: 50_000.0,
                fee_rate_pct: 0.1,
                avg_processing_time_secs: 90,
                pending_transactions: 5,
                last_transaction_at: Some(Utc::now()),
            },
        );
        let bridges = vec![test_bridge("b1")];
        let config = MonitorConfig {
            bridges: bridges.clone(),
            anomaly: AnomalyConfig {
                min_learning_samples: 1,
                ema_alpha: 0.0,
                ..AnomalyConfig::default()
            },
            ..Default::default()
        };
        let risk = Arc::new(RiskAssessor::new(
            RiskConfig::default(),
            bridges,
            telemetry,
        ));
        let detector = Arc::new(AnomalyDetector::new(config.anomaly.clone()));
        detector.add_custom_pattern(AnomalyPattern::custom(
            "exploit_signature",
            AlertType::SecurityIncident,
            AlertSeverity::Critical,
            1,
            "traffic matches a known exploit signature",
            |_sample, _history| true,
        ));
        let orchestrator =
            MonitoringOrchestrator::new(config, risk, detector, Arc::new(AlwaysUpProber))
                .expect("valid config");

        orchestrator.initialize().await.unwrap();
        orchestrator.perform_monitoring_cycle().await; // seeds the baseline
        orchestrator.perform_monitoring_cycle().await; // pattern fires

        let status = orchestrator.get_monitoring_status().await;
        let incidents: Vec<&AnomalyAlert> = status.bridges["b1"]
            .alerts
            .iter()
            .filter(|a| a.alert_type == AlertType::SecurityIncident)
            .collect();
        assert_eq!(incidents.len(), 1);
        // The detector's critical alert wins over the snapshot's high one.
        assert_eq!(incidents[0].severity, AlertSeverity::Critical);
    }

    #[tokio::test]
    async fn test_alert_counter_requires_subscribers() {
        let orchestrator = orchestrator_with(vec![test_bridge("b1")]);
        let incident = || {
            Incident::new(
                "b1",
                IncidentKind::Bug,
                IncidentSeverity::Low,
                0.0,
                "stuck relayer",
            )
        };

        orchestrator.record_incident(incident()).await.unwrap();
        assert_eq!(orchestrator.stats().await.alerts_dispatched, 0);

        orchestrator.subscribe_to_alerts(|_alert| {});
        orchestrator.record_incident(incident()).await.unwrap();
        assert_eq!(orchestrator.stats().await.alerts_dispatched, 1);
    }

    #[tokio::test]
    async fn test_record_incident_unknown_bridge() {
        let orchestrator = orchestrator_with(vec![test_bridge("b1")]);
        let result = orchestrator
            .record_incident(Incident::new(
                "ghost",
                IncidentKind::Exploit,
                IncidentSeverity::High,
                0.0,
                "n/a",
            ))
            .await;
        assert!(matches!(result, Err(Error::BridgeNotFound(_))));
    }
}
