//! Anomaly pattern registry.
//!
//! A pattern pairs a check over (sample, baseline, history) with an alert
//! type, a base severity, and a consecutive-occurrence threshold. The
//! detector escalates the base severity when the observed deviation is large.

use std::collections::VecDeque;

use crate::config::AnomalyConfig;
use crate::types::{AlertMetrics, AlertSeverity, AlertType};

use super::baseline::{EntityBaseline, MetricSample};

/// Check evaluated against every new sample once an entity is baselined.
///
/// Returns the metric context of the match, or `None` when the pattern does
/// not apply.
pub type PatternCheck = Box<
    dyn Fn(&MetricSample, &EntityBaseline, &VecDeque<MetricSample>) -> Option<AlertMetrics>
        + Send
        + Sync,
>;

/// A registered anomaly pattern
pub struct AnomalyPattern {
    /// Stable pattern identifier (used for debounce/cooldown bookkeeping)
    pub id: String,
    /// Alert type raised when the pattern fires
    pub alert_type: AlertType,
    /// Severity floor; escalated by deviation magnitude
    pub base_severity: AlertSeverity,
    /// Consecutive matching samples required before the pattern fires
    pub consecutive_required: u32,
    /// Human-readable condition description
    pub description: String,
    check: PatternCheck,
}

impl std::fmt::Debug for AnomalyPattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnomalyPattern")
            .field("id", &self.id)
            .field("alert_type", &self.alert_type)
            .field("base_severity", &self.base_severity)
            .field("consecutive_required", &self.consecutive_required)
            .finish_non_exhaustive()
    }
}

impl AnomalyPattern {
    /// Register a pattern with a full metric-producing check
    pub fn new(
        id: impl Into<String>,
        alert_type: AlertType,
        base_severity: AlertSeverity,
        consecutive_required: u32,
        description: impl Into<String>,
        check: impl Fn(&MetricSample, &EntityBaseline, &VecDeque<MetricSample>) -> Option<AlertMetrics>
            + Send
            + Sync
            + 'static,
    ) -> Self {
        Self {
            id: id.into(),
            alert_type,
            base_severity,
            consecutive_required: consecutive_required.max(1),
            description: description.into(),
            check: Box::new(check),
        }
    }

    /// Register a custom boolean predicate over (current, history).
    ///
    /// The metric context is derived from the TVL axis since a bare predicate
    /// carries no metric of its own.
    pub fn custom(
        id: impl Into<String>,
        alert_type: AlertType,
        base_severity: AlertSeverity,
        consecutive_required: u32,
        description: impl Into<String>,
        predicate: impl Fn(&MetricSample, &VecDeque<MetricSample>) -> bool + Send + Sync + 'static,
    ) -> Self {
        Self::new(
            id,
            alert_type,
            base_severity,
            consecutive_required,
            description,
            move |sample, baseline, history| {
                if predicate(sample, history) {
                    let deviation = if baseline.tvl_usd != 0.0 {
                        (sample.tvl_usd - baseline.tvl_usd) / baseline.tvl_usd
                    } else {
                        0.0
                    };
                    Some(AlertMetrics {
                        baseline: baseline.tvl_usd,
                        current: sample.tvl_usd,
                        threshold: 0.0,
                        deviation,
                    })
                } else {
                    None
                }
            },
        )
    }

    /// Evaluate the pattern against a sample
    pub fn evaluate(
        &self,
        sample: &MetricSample,
        baseline: &EntityBaseline,
        history: &VecDeque<MetricSample>,
    ) -> Option<AlertMetrics> {
        (self.check)(sample, baseline, history)
    }

    // ───────────────────────────────────────────────────────────────────────
    // Built-in patterns
    // ───────────────────────────────────────────────────────────────────────

    /// TVL dropped by at least `fraction` of the baseline
    pub fn tvl_drop(fraction: f64) -> Self {
        Self::new(
            "tvl_drop",
            AlertType::LowLiquidity,
            AlertSeverity::Critical,
            1,
            format!("TVL dropped by {:.0}% or more of baseline", fraction * 100.0),
            move |sample, baseline, _history| {
                if baseline.tvl_usd <= 0.0 {
                    return None;
                }
                let threshold = baseline.tvl_usd * (1.0 - fraction);
                if sample.tvl_usd <= threshold {
                    Some(AlertMetrics {
                        baseline: baseline.tvl_usd,
                        current: sample.tvl_usd,
                        threshold,
                        deviation: (sample.tvl_usd - baseline.tvl_usd) / baseline.tvl_usd,
                    })
                } else {
                    None
                }
            },
        )
    }

    /// Volume at or above `multiplier` times the baseline, sustained
    pub fn volume_spike(multiplier: f64, consecutive_required: u32) -> Self {
        Self::new(
            "volume_spike",
            AlertType::VolumeSpike,
            AlertSeverity::High,
            consecutive_required,
            format!("volume at {multiplier}x baseline or more"),
            move |sample, baseline, _history| {
                if baseline.volume_usd <= 0.0 {
                    return None;
                }
                let threshold = baseline.volume_usd * multiplier;
                if sample.volume_usd >= threshold {
                    Some(AlertMetrics {
                        baseline: baseline.volume_usd,
                        current: sample.volume_usd,
                        threshold,
                        deviation: (sample.volume_usd - baseline.volume_usd) / baseline.volume_usd,
                    })
                } else {
                    None
                }
            },
        )
    }

    /// Response time at or above `multiplier` times the baseline, beyond an
    /// absolute floor
    pub fn response_time(multiplier: f64, floor_ms: f64) -> Self {
        Self::new(
            "response_time",
            AlertType::ResponseTimeAnomaly,
            AlertSeverity::Medium,
            2,
            format!("response time at {multiplier}x baseline beyond {floor_ms}ms"),
            move |sample, baseline, _history| {
                if baseline.response_time_ms <= 0.0 || sample.response_time_ms < floor_ms {
                    return None;
                }
                let threshold = baseline.response_time_ms * multiplier;
                if sample.response_time_ms >= threshold {
                    Some(AlertMetrics {
                        baseline: baseline.response_time_ms,
                        current: sample.response_time_ms,
                        threshold,
                        deviation: (sample.response_time_ms - baseline.response_time_ms)
                            / baseline.response_time_ms,
                    })
                } else {
                    None
                }
            },
        )
    }

    /// The default production pattern set
    pub fn builtin_set(config: &AnomalyConfig) -> Vec<Self> {
        vec![
            Self::tvl_drop(0.5),
            Self::volume_spike(10.0, 2),
            Self::response_time(2.0, config.response_time_floor_ms),
        ]
    }
}
