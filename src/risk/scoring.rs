//! Risk scoring math.
//!
//! All sub-scores are 0-100. The overall score is a clamped weighted average
//! of the four sub-scores; incident penalties decay exponentially with age
//! and resolved incidents count at a fraction of their original weight.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::ScoringWeights;
use crate::types::{Incident, IncidentKind, SecurityAudit};

/// Fraction of the penalty a resolved incident retains
const RESOLVED_PENALTY_FACTOR: f64 = 0.3;

// ═══════════════════════════════════════════════════════════════════════════════
// ASSESSMENT MODEL
// ═══════════════════════════════════════════════════════════════════════════════

/// A named factor contributing to the risk picture
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskFactor {
    /// Free-text description of the factor
    pub description: String,
    /// Relative weight of the factor in the overall picture
    pub weight: f64,
}

/// Historical performance summary for a bridge, fed on every status fetch
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct PerformanceSummary {
    /// Lowest TVL seen
    pub min_tvl_usd: f64,
    /// Highest TVL seen
    pub max_tvl_usd: f64,
    /// Average TVL over all observations
    pub avg_tvl_usd: f64,
    /// Average daily volume over all observations
    pub avg_daily_volume_usd: f64,
    /// Number of observations recorded
    pub samples: u64,
}

impl PerformanceSummary {
    /// Fold one observation into the summary
    pub fn record(&mut self, tvl_usd: f64, daily_volume_usd: f64) {
        if self.samples == 0 {
            self.min_tvl_usd = tvl_usd;
            self.max_tvl_usd = tvl_usd;
            self.avg_tvl_usd = tvl_usd;
            self.avg_daily_volume_usd = daily_volume_usd;
        } else {
            self.min_tvl_usd = self.min_tvl_usd.min(tvl_usd);
            self.max_tvl_usd = self.max_tvl_usd.max(tvl_usd);
            let n = self.samples as f64;
            self.avg_tvl_usd = (self.avg_tvl_usd * n + tvl_usd) / (n + 1.0);
            self.avg_daily_volume_usd =
                (self.avg_daily_volume_usd * n + daily_volume_usd) / (n + 1.0);
        }
        self.samples += 1;
    }
}

/// Cached multi-factor risk assessment for one bridge.
///
/// `overall_score` is a deterministic weighted function of the four
/// sub-scores; repeated reads within the cache TTL return the identical
/// object (same `last_updated`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskAssessment {
    /// Bridge identifier
    pub bridge_id: String,
    /// Overall score (0-100), derived
    pub overall_score: f64,
    /// Incident-history-derived safety score (0-100)
    pub safety_score: f64,
    /// TVL/volume-derived liquidity score (0-100)
    pub liquidity_score: f64,
    /// Uptime/downtime-derived reliability score (0-100)
    pub reliability_score: f64,
    /// Audit-derived security score (0-100)
    pub security_score: f64,
    /// Active risk factors, most significant first
    pub risk_factors: Vec<RiskFactor>,
    /// Historical performance summary at assessment time
    pub performance: PerformanceSummary,
    /// When this assessment was computed
    pub last_updated: DateTime<Utc>,
}

// ═══════════════════════════════════════════════════════════════════════════════
// SUB-SCORE FUNCTIONS
// ═══════════════════════════════════════════════════════════════════════════════

/// Clamp a score to the 0-100 range
pub fn clamp_score(score: f64) -> f64 {
    score.clamp(0.0, 100.0)
}

/// Weighted average of the four sub-scores, clamped to 0-100
pub fn weighted_overall(
    weights: &ScoringWeights,
    safety: f64,
    liquidity: f64,
    reliability: f64,
    security: f64,
) -> f64 {
    let total = weights.total();
    if total <= 0.0 {
        return 0.0;
    }
    let sum = safety * weights.safety
        + liquidity * weights.liquidity
        + reliability * weights.reliability
        + security * weights.security;
    clamp_score(sum / total)
}

/// Penalty contributed by one incident at time `now`.
///
/// Penalties halve every `half_life_days`; resolved incidents retain only a
/// fraction of their weight.
pub fn incident_penalty(incident: &Incident, now: DateTime<Utc>, half_life_days: f64) -> f64 {
    let age_days = (now - incident.occurred_at).num_seconds().max(0) as f64 / 86_400.0;
    let decay = if half_life_days > 0.0 {
        0.5_f64.powf(age_days / half_life_days)
    } else {
        1.0
    };
    let resolved_factor = if incident.resolved {
        RESOLVED_PENALTY_FACTOR
    } else {
        1.0
    };
    incident.severity.penalty() * decay * resolved_factor
}

/// Safety sub-score: configured trust level minus decayed incident penalties
pub fn safety_score(
    trust_level: u8,
    incidents: &[Incident],
    now: DateTime<Utc>,
    half_life_days: f64,
) -> f64 {
    let penalty: f64 = incidents
        .iter()
        .map(|i| incident_penalty(i, now, half_life_days))
        .sum();
    clamp_score(trust_level as f64 - penalty)
}

/// Reliability sub-score: 100 minus decayed penalties for downtime/bug incidents
pub fn reliability_score(
    incidents: &[Incident],
    now: DateTime<Utc>,
    half_life_days: f64,
) -> f64 {
    let penalty: f64 = incidents
        .iter()
        .filter(|i| matches!(i.kind, IncidentKind::Downtime | IncidentKind::Bug))
        .map(|i| incident_penalty(i, now, half_life_days))
        .sum();
    clamp_score(100.0 - penalty)
}

/// Security sub-score from the latest audit.
///
/// With no audit on record the score sits at `floor`. A clean audit (high
/// numeric score, low risk level, few findings) raises the score; a poor one
/// lowers it.
pub fn security_score(audit: Option<&SecurityAudit>, floor: f64) -> f64 {
    match audit {
        None => clamp_score(floor),
        Some(a) => {
            let findings_penalty = a.findings.len() as f64 * 2.0;
            clamp_score(a.score - a.risk_level.penalty() - findings_penalty)
        }
    }
}

/// Liquidity sub-score: current TVL/volume relative to the bridge's own
/// historical range.
///
/// With fewer than two observations there is no range to compare against and
/// a neutral score is returned.
pub fn liquidity_score(
    current_tvl_usd: f64,
    current_volume_usd: f64,
    performance: &PerformanceSummary,
) -> f64 {
    if performance.samples < 2 {
        return 70.0;
    }

    let range = performance.max_tvl_usd - performance.min_tvl_usd;
    let tvl_position = if range > 0.0 {
        ((current_tvl_usd - performance.min_tvl_usd) / range).clamp(0.0, 1.0)
    } else if current_tvl_usd > 0.0 {
        1.0
    } else {
        0.0
    };

    let volume_ratio = if performance.avg_daily_volume_usd > 0.0 {
        (current_volume_usd / performance.avg_daily_volume_usd).clamp(0.0, 1.0)
    } else {
        1.0
    };

    clamp_score((tvl_position * 0.7 + volume_ratio * 0.3) * 100.0)
}
