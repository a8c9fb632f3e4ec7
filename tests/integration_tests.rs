//! Integration tests for the bridgewatch engine.
//!
//! These tests drive full monitoring cycles through the orchestrator with
//! stub telemetry and probers, and verify the assessor's caching behavior
//! end to end.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use chrono::Utc;
use tokio_test::assert_ok;

use bridgewatch::anomaly::{AnomalyDetector, EntityPhase, MetricSample};
use bridgewatch::config::{AnomalyConfig, MonitorConfig, RiskConfig};
use bridgewatch::error::Error;
use bridgewatch::monitoring::{
    EndpointProber, MonitoringOrchestrator, OrchestratorPhase, ProbeFuture, ProbeOutcome,
};
use bridgewatch::risk::{BridgeObservation, RiskAssessor, StaticTelemetry};
use bridgewatch::types::{
    AlertSeverity, AlertType, AnomalyAlert, AuditRiskLevel, BridgeConfig, BridgeEndpoint,
    BridgeType, FeeStructure, Incident, IncidentKind, IncidentSeverity, SecurityAudit,
};

// ═══════════════════════════════════════════════════════════════════════════════
// TEST HELPERS
// ═══════════════════════════════════════════════════════════════════════════════

/// Install a subscriber once so `RUST_LOG=bridgewatch=debug cargo test`
/// shows the engine's tracing output.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn bridge(id: &str) -> BridgeConfig {
    BridgeConfig {
        id: id.into(),
        name: format!("{id} bridge"),
        bridge_type: BridgeType::LockAndMint,
        supported_chains: vec!["ethereum".into(), "optimism".into()],
        trust_level: 85,
        avg_processing_time_secs: 120,
        fees: FeeStructure::default(),
        contract_addresses: HashMap::new(),
        endpoints: vec![BridgeEndpoint::rpc(format!("https://{id}.rpc.example"))],
    }
}

fn observation(tvl_usd: f64, volume_usd: f64) -> BridgeObservation {
    BridgeObservation {
        is_operational: true,
        tvl_usd,
        daily_volume_usd: volume_usd,
        fee_rate_pct: 0.1,
        avg_processing_time_secs: 110,
        pending_transactions: 10,
        last_transaction_at: Some(Utc::now()),
    }
}

/// Prober that fails every endpoint whose URL contains one of the configured
/// substrings and answers everything else instantly.
struct SelectiveProber {
    failing: Vec<String>,
}

impl EndpointProber for SelectiveProber {
    fn probe<'a>(&'a self, endpoint: &'a BridgeEndpoint) -> ProbeFuture<'a> {
        let fails = self.failing.iter().any(|f| endpoint.url.contains(f));
        Box::pin(async move {
            if fails {
                Err(Error::EndpointUnreachable {
                    url: endpoint.url.clone(),
                    reason: "connection refused".into(),
                })
            } else {
                Ok(ProbeOutcome {
                    url: endpoint.url.clone(),
                    latency_ms: 40,
                    healthy: true,
                    error: None,
                })
            }
        })
    }
}

struct Fixture {
    telemetry: Arc<StaticTelemetry>,
    orchestrator: MonitoringOrchestrator,
}

fn fixture(bridges: Vec<BridgeConfig>, anomaly: AnomalyConfig, failing: Vec<String>) -> Fixture {
    init_tracing();
    let telemetry = Arc::new(StaticTelemetry::new());
    for b in &bridges {
        telemetry.set(b.id.clone(), observation(1_000_000.0, 50_000.0));
    }
    let config = MonitorConfig {
        bridges: bridges.clone(),
        anomaly: anomaly.clone(),
        ..Default::default()
    };
    let risk = Arc::new(RiskAssessor::new(
        RiskConfig::default(),
        bridges,
        telemetry.clone(),
    ));
    let detector = Arc::new(AnomalyDetector::new(anomaly));
    let orchestrator = MonitoringOrchestrator::new(
        config,
        risk,
        detector,
        Arc::new(SelectiveProber { failing }),
    )
    .unwrap();
    Fixture {
        telemetry,
        orchestrator,
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// RISK ASSESSMENT CACHING
// ═══════════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_assessment_cache_and_invalidation() {
    let telemetry = Arc::new(StaticTelemetry::new());
    telemetry.set("hop", observation(5_000_000.0, 250_000.0));
    let assessor = RiskAssessor::new(RiskConfig::default(), vec![bridge("hop")], telemetry);

    // Warm the performance history before the first assessment.
    assessor.get_status("hop").await.unwrap();

    let first = assessor.get_risk_assessment("hop").await.unwrap();
    let second = assessor.get_risk_assessment("hop").await.unwrap();
    assert_eq!(first.last_updated, second.last_updated);

    assessor
        .record_incident(Incident::new(
            "hop",
            IncidentKind::Exploit,
            IncidentSeverity::Critical,
            3_000_000.0,
            "bonder key compromised",
        ))
        .await
        .unwrap();

    let after_incident = assessor.get_risk_assessment("hop").await.unwrap();
    assert!(after_incident.last_updated > first.last_updated);
    assert!(after_incident.overall_score < first.overall_score);
    assert!(after_incident.overall_score < 100.0);

    assessor
        .update_security_audit(
            "hop",
            SecurityAudit {
                auditor: "Sigma Zero".into(),
                audit_date: Utc::now(),
                risk_level: AuditRiskLevel::Low,
                findings: vec![],
                score: 95.0,
            },
        )
        .await
        .unwrap();

    let after_audit = assessor.get_risk_assessment("hop").await.unwrap();
    assert!(after_audit.last_updated > after_incident.last_updated);
    assert!(after_audit.security_score > after_incident.security_score);
}

#[tokio::test]
async fn test_unknown_bridge_queries_fail() {
    let f = fixture(vec![bridge("across")], AnomalyConfig::default(), vec![]);
    assert!(matches!(
        f.orchestrator.get_bridge_details("non-existent").await,
        Err(Error::BridgeNotFound(_))
    ));
    assert!(matches!(
        f.orchestrator.perform_health_check("non-existent").await,
        Err(Error::BridgeNotFound(_))
    ));
}

// ═══════════════════════════════════════════════════════════════════════════════
// ANOMALY DETECTION THROUGH THE ORCHESTRATOR
// ═══════════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_learning_phase_stays_silent() {
    let anomaly = AnomalyConfig {
        min_learning_samples: 5,
        ..AnomalyConfig::default()
    };
    let f = fixture(vec![bridge("wormhole")], anomaly, vec![]);
    let fired = Arc::new(AtomicU64::new(0));
    let counter = Arc::clone(&fired);
    f.orchestrator.subscribe_to_alerts(move |_| {
        counter.fetch_add(1, Ordering::Relaxed);
    });

    f.orchestrator.initialize().await.unwrap();
    for _ in 0..3 {
        f.orchestrator.perform_monitoring_cycle().await;
    }
    // A huge move during learning still produces nothing.
    f.telemetry.set("wormhole", observation(10.0, 50_000.0));
    f.orchestrator.perform_monitoring_cycle().await;

    assert_eq!(fired.load(Ordering::Relaxed), 0);
}

#[tokio::test]
async fn test_tvl_drop_fires_once_then_cools_down() {
    // alpha 0 pins the baseline so a repeated drop is still a pattern match
    // and only the cooldown can suppress it.
    let anomaly = AnomalyConfig {
        min_learning_samples: 1,
        ema_alpha: 0.0,
        ..AnomalyConfig::default()
    };
    let f = fixture(vec![bridge("ronin")], anomaly, vec![]);
    let received: Arc<Mutex<Vec<AnomalyAlert>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&received);
    f.orchestrator.subscribe_to_alerts(move |alert| {
        sink.lock().unwrap().push(alert.clone());
    });

    f.orchestrator.initialize().await.unwrap();
    f.orchestrator.perform_monitoring_cycle().await; // seeds the baseline

    f.telemetry.set("ronin", observation(500_000.0, 50_000.0));
    f.orchestrator.perform_monitoring_cycle().await;

    let after_drop: Vec<AnomalyAlert> = received.lock().unwrap().clone();
    let liquidity: Vec<&AnomalyAlert> = after_drop
        .iter()
        .filter(|a| a.alert_type == AlertType::LowLiquidity)
        .collect();
    assert_eq!(liquidity.len(), 1);
    assert_eq!(liquidity[0].severity, AlertSeverity::Critical);
    assert_eq!(liquidity[0].entity_id, "ronin");
    assert!((liquidity[0].metrics.baseline - 1_000_000.0).abs() < 1.0);
    assert!((liquidity[0].metrics.current - 500_000.0).abs() < 1.0);

    // Same depressed TVL on the next cycle: cooldown suppresses a refire.
    f.orchestrator.perform_monitoring_cycle().await;
    let after_second: Vec<AnomalyAlert> = received.lock().unwrap().clone();
    let liquidity_count = after_second
        .iter()
        .filter(|a| a.alert_type == AlertType::LowLiquidity)
        .count();
    assert_eq!(liquidity_count, 1);
}

#[tokio::test]
async fn test_critical_anomaly_escalates_to_incident() {
    let anomaly = AnomalyConfig {
        min_learning_samples: 1,
        ema_alpha: 0.0,
        ..AnomalyConfig::default()
    };
    let f = fixture(vec![bridge("nomad")], anomaly, vec![]);
    f.orchestrator.initialize().await.unwrap();
    f.orchestrator.perform_monitoring_cycle().await;

    let before = f
        .orchestrator
        .get_bridge_details("nomad")
        .await
        .unwrap()
        .assessment
        .unwrap();

    f.telemetry.set("nomad", observation(100_000.0, 50_000.0));
    f.orchestrator.perform_monitoring_cycle().await;

    // The critical liquidity drain was escalated into an incident, which
    // invalidated the cached assessment and dragged the score down.
    let after = f
        .orchestrator
        .get_bridge_details("nomad")
        .await
        .unwrap()
        .assessment
        .unwrap();
    assert!(after.last_updated > before.last_updated);
    assert!(after.overall_score < before.overall_score);
}

// ═══════════════════════════════════════════════════════════════════════════════
// CYCLE ISOLATION & HEALTH CHECKS
// ═══════════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_failing_bridge_does_not_stop_siblings() {
    let f = fixture(
        vec![bridge("alpha"), bridge("beta"), bridge("gamma")],
        AnomalyConfig::default(),
        vec!["beta".into()],
    );
    f.orchestrator.initialize().await.unwrap();
    f.orchestrator.perform_monitoring_cycle().await;

    let status = f.orchestrator.get_monitoring_status().await;
    assert_eq!(status.bridges.len(), 3);
    assert_eq!(status.cycles_completed, 1);

    assert!(status.bridges["alpha"].is_operational);
    assert!(!status.bridges["beta"].is_operational);
    assert!(status.bridges["gamma"].is_operational);

    let beta = f.orchestrator.get_bridge_details("beta").await.unwrap();
    assert_eq!(beta.metrics.failed_checks, 1);
    assert_eq!(beta.metrics.consecutive_failures, 1);
    assert!(beta.metrics.uptime_pct < 100.0);

    let alpha = f.orchestrator.get_bridge_details("alpha").await.unwrap();
    assert_eq!(alpha.metrics.failed_checks, 0);
    assert_eq!(alpha.metrics.uptime_pct, 100.0);
}

#[tokio::test]
async fn test_health_check_reports_endpoint_errors() {
    let f = fixture(
        vec![bridge("stargate")],
        AnomalyConfig::default(),
        vec!["stargate".into()],
    );
    let result = f.orchestrator.perform_health_check("stargate").await.unwrap();
    assert!(!result.healthy);
    assert_eq!(result.endpoints.len(), 1);
    assert!(!result.errors.is_empty());
    assert_eq!(result.avg_latency_ms(), None);
}

// ═══════════════════════════════════════════════════════════════════════════════
// SUBSCRIBERS & LIFECYCLE
// ═══════════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_panicking_subscriber_does_not_block_delivery() {
    let f = fixture(vec![bridge("celer")], AnomalyConfig::default(), vec![]);
    let delivered = Arc::new(AtomicU64::new(0));

    f.orchestrator.subscribe_to_alerts(|_| panic!("broken webhook"));
    let counter = Arc::clone(&delivered);
    f.orchestrator.subscribe_to_alerts(move |_| {
        counter.fetch_add(1, Ordering::Relaxed);
    });

    f.orchestrator
        .record_incident(Incident::new(
            "celer",
            IncidentKind::Downtime,
            IncidentSeverity::Medium,
            0.0,
            "relayer outage",
        ))
        .await
        .unwrap();

    assert_eq!(delivered.load(Ordering::Relaxed), 1);
}

#[tokio::test]
async fn test_unsubscribe_stops_delivery() {
    let f = fixture(vec![bridge("celer")], AnomalyConfig::default(), vec![]);
    let delivered = Arc::new(AtomicU64::new(0));
    let counter = Arc::clone(&delivered);
    let id = f.orchestrator.subscribe_to_alerts(move |_| {
        counter.fetch_add(1, Ordering::Relaxed);
    });

    let incident = |desc: &str| {
        Incident::new(
            "celer",
            IncidentKind::Bug,
            IncidentSeverity::Low,
            0.0,
            desc,
        )
    };
    f.orchestrator.record_incident(incident("first")).await.unwrap();
    assert!(f.orchestrator.unsubscribe_from_alerts(id));
    f.orchestrator.record_incident(incident("second")).await.unwrap();

    assert_eq!(delivered.load(Ordering::Relaxed), 1);
}

#[tokio::test]
async fn test_start_stop_lifecycle() {
    let f = fixture(vec![bridge("hop")], AnomalyConfig::default(), vec![]);

    assert_eq!(
        f.orchestrator.stats().await.phase,
        OrchestratorPhase::Stopped
    );

    assert_ok!(f.orchestrator.start().await);
    assert_ok!(f.orchestrator.start().await); // idempotent
    assert_eq!(
        f.orchestrator.stats().await.phase,
        OrchestratorPhase::Running
    );

    f.orchestrator.stop().await;
    f.orchestrator.stop().await; // idempotent
    assert_eq!(
        f.orchestrator.stats().await.phase,
        OrchestratorPhase::Stopped
    );
}

#[tokio::test]
async fn test_update_config_preserves_existing_state() {
    let anomaly = AnomalyConfig {
        min_learning_samples: 1,
        ..AnomalyConfig::default()
    };
    let f = fixture(vec![bridge("hop")], anomaly, vec![]);
    f.orchestrator.initialize().await.unwrap();
    f.orchestrator.perform_monitoring_cycle().await;

    let new_config = MonitorConfig {
        bridges: vec![bridge("hop"), bridge("across")],
        ..Default::default()
    };
    f.telemetry.set("across", observation(2_000_000.0, 80_000.0));
    f.orchestrator.update_config(new_config).await.unwrap();

    // Newly added bridge starts with pristine metrics.
    let across = f.orchestrator.get_bridge_details("across").await.unwrap();
    assert_eq!(across.metrics.total_checks, 0);
    assert_eq!(across.metrics.uptime_pct, 100.0);

    // Existing bridge kept its accumulated checks.
    let hop = f.orchestrator.get_bridge_details("hop").await.unwrap();
    assert_eq!(hop.metrics.total_checks, 1);

    f.orchestrator.perform_monitoring_cycle().await;
    let status = f.orchestrator.get_monitoring_status().await;
    assert_eq!(status.bridges.len(), 2);
}

// ═══════════════════════════════════════════════════════════════════════════════
// DETECTOR STATE MACHINE
// ═══════════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_entity_phase_progression() {
    let detector = AnomalyDetector::new(AnomalyConfig {
        min_learning_samples: 3,
        ..AnomalyConfig::default()
    });
    assert_eq!(detector.entity_phase("b"), EntityPhase::Unseen);

    let sample = MetricSample::new(1_000_000.0, 50_000.0, 0.0, 100.0);
    detector.process_sample("b", sample);
    assert_eq!(detector.entity_phase("b"), EntityPhase::Learning);
    detector.process_sample("b", sample);
    detector.process_sample("b", sample);
    assert_eq!(detector.entity_phase("b"), EntityPhase::Baselined);

    assert!(detector.reset_entity("b"));
    assert_eq!(detector.entity_phase("b"), EntityPhase::Unseen);
}
