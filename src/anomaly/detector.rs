//! Anomaly detector.
//!
//! `process_sample` is the single write path for per-entity state: it appends
//! the sample to the rolling history, updates the EMA baseline, evaluates the
//! pattern registry, and returns the alerts that fired. Patterns are
//! evaluated against the baseline as it stood before the new sample is folded
//! in, so a sudden move is judged against the learned normal rather than a
//! baseline it has already contaminated.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, RwLock};

use chrono::{Duration, Utc};

use crate::config::AnomalyConfig;
use crate::types::{AlertSeverity, AnomalyAlert};

use super::baseline::{EntityPhase, EntityState, MetricSample};
use super::patterns::AnomalyPattern;

/// Summary statistics for the detector
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DetectionStats {
    /// Registered patterns (built-in plus custom)
    pub total_patterns: usize,
    /// Entities currently tracked
    pub active_monitoring: usize,
    /// Alerts emitted since startup
    pub total_alerts: u64,
    /// Mean rolling-history length across entities
    pub avg_history_size: f64,
}

/// Adaptive-baseline anomaly detector
pub struct AnomalyDetector {
    config: AnomalyConfig,
    patterns: RwLock<Vec<AnomalyPattern>>,
    entities: Mutex<HashMap<String, EntityState>>,
    total_alerts: AtomicU64,
    alert_seq: AtomicU64,
}

impl AnomalyDetector {
    /// Create a detector with the built-in pattern set
    pub fn new(config: AnomalyConfig) -> Self {
        let patterns = AnomalyPattern::builtin_set(&config);
        Self {
            config,
            patterns: RwLock::new(patterns),
            entities: Mutex::new(HashMap::new()),
            total_alerts: AtomicU64::new(0),
            alert_seq: AtomicU64::new(1),
        }
    }

    /// Register an additional pattern
    pub fn add_custom_pattern(&self, pattern: AnomalyPattern) {
        if let Ok(mut patterns) = self.patterns.write() {
            patterns.push(pattern);
        }
    }

    /// Process one sample for an entity and return newly fired alerts.
    ///
    /// Returns an empty list while the entity is still learning. A pattern
    /// fires only after matching `consecutive_required` samples in a row,
    /// and not again for the same (entity, pattern) pair until the alert
    /// cooldown has elapsed.
    pub fn process_sample(&self, entity_id: &str, sample: MetricSample) -> Vec<AnomalyAlert> {
        let patterns = match self.patterns.read() {
            Ok(p) => p,
            Err(_) => return Vec::new(),
        };
        let mut entities = match self.entities.lock() {
            Ok(e) => e,
            Err(_) => return Vec::new(),
        };

        let state = match entities.get_mut(entity_id) {
            Some(state) => state,
            None => {
                // First sample for an unseen entity seeds the baseline.
                entities.insert(
                    entity_id.to_string(),
                    EntityState::new(sample, self.config.history_window),
                );
                return Vec::new();
            }
        };

        let mut alerts = Vec::new();
        if state.phase(self.config.min_learning_samples) == EntityPhase::Baselined {
            let cooldown = Duration::seconds(self.config.alert_cooldown_secs as i64);
            let now = Utc::now();

            for pattern in patterns.iter() {
                match pattern.evaluate(&sample, &state.baseline, &state.history) {
                    Some(metrics) => {
                        let streak = state
                            .streaks
                            .entry(pattern.id.clone())
                            .and_modify(|s| *s += 1)
                            .or_insert(1);

                        if *streak < pattern.consecutive_required {
                            continue;
                        }

                        let cooled_down = state
                            .last_fired
                            .get(&pattern.id)
                            .map_or(true, |last| now - *last >= cooldown);
                        if !cooled_down {
                            continue;
                        }

                        let severity = pattern
                            .base_severity
                            .max(AlertSeverity::from_deviation(metrics.deviation.abs()));
                        let seq = self.alert_seq.fetch_add(1, Ordering::Relaxed);
                        let alert = AnomalyAlert::new(
                            format!("{}-{}-{}", entity_id, pattern.id, seq),
                            pattern.alert_type,
                            severity,
                            format!("{}: {}", entity_id, pattern.description),
                            entity_id,
                            metrics,
                            vec![
                                format!("baseline={:.2}", metrics.baseline),
                                format!("current={:.2}", metrics.current),
                                format!("deviation={:+.2}%", metrics.deviation * 100.0),
                            ],
                        );

                        tracing::warn!(
                            entity_id,
                            pattern = %pattern.id,
                            severity = %severity.as_str(),
                            deviation = metrics.deviation,
                            "anomaly detected"
                        );

                        state.last_fired.insert(pattern.id.clone(), now);
                        state.streaks.insert(pattern.id.clone(), 0);
                        self.total_alerts.fetch_add(1, Ordering::Relaxed);
                        alerts.push(alert);
                    }
                    None => {
                        state.streaks.insert(pattern.id.clone(), 0);
                    }
                }
            }
        }

        state.absorb(
            sample,
            self.config.history_window,
            self.config.ema_alpha,
        );
        alerts
    }

    /// Learning phase of an entity
    pub fn entity_phase(&self, entity_id: &str) -> EntityPhase {
        self.entities
            .lock()
            .ok()
            .and_then(|entities| {
                entities
                    .get(entity_id)
                    .map(|s| s.phase(self.config.min_learning_samples))
            })
            .unwrap_or(EntityPhase::Unseen)
    }

    /// Drop all state for an entity. Returns true if the entity existed.
    ///
    /// This is the only way a baseline is ever deleted.
    pub fn reset_entity(&self, entity_id: &str) -> bool {
        self.entities
            .lock()
            .map(|mut entities| entities.remove(entity_id).is_some())
            .unwrap_or(false)
    }

    /// Summary statistics
    pub fn detection_stats(&self) -> DetectionStats {
        let (active, avg_history) = self
            .entities
            .lock()
            .map(|entities| {
                let active = entities.len();
                let avg = if active == 0 {
                    0.0
                } else {
                    entities.values().map(|s| s.history.len()).sum::<usize>() as f64
                        / active as f64
                };
                (active, avg)
            })
            .unwrap_or((0, 0.0));

        DetectionStats {
            total_patterns: self.patterns.read().map(|p| p.len()).unwrap_or(0),
            active_monitoring: active,
            total_alerts: self.total_alerts.load(Ordering::Relaxed),
            avg_history_size: avg_history,
        }
    }
}
