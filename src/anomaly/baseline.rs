//! Per-entity baselines and rolling sample history.
//!
//! A baseline is created lazily on the first sample for an unseen entity,
//! updated on every subsequent sample, and dropped only by an explicit
//! reset. Baselines are internal to the detector and never exposed outside
//! the crate.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};

// ═══════════════════════════════════════════════════════════════════════════════
// SAMPLES
// ═══════════════════════════════════════════════════════════════════════════════

/// One observation of an entity's key metrics
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricSample {
    /// Total value locked in USD
    pub tvl_usd: f64,
    /// Daily volume in USD
    pub volume_usd: f64,
    /// Error rate as a fraction (0.0-1.0)
    pub error_rate: f64,
    /// Response time in milliseconds
    pub response_time_ms: f64,
    /// When the sample was taken
    pub recorded_at: DateTime<Utc>,
}

impl MetricSample {
    /// Create a sample timestamped now
    pub fn new(tvl_usd: f64, volume_usd: f64, error_rate: f64, response_time_ms: f64) -> Self {
        Self {
            tvl_usd,
            volume_usd,
            error_rate,
            response_time_ms,
            recorded_at: Utc::now(),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// BASELINE
// ═══════════════════════════════════════════════════════════════════════════════

/// Exponentially-weighted moving averages of an entity's key metrics
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EntityBaseline {
    /// EMA of total value locked
    pub tvl_usd: f64,
    /// EMA of daily volume
    pub volume_usd: f64,
    /// EMA of error rate
    pub error_rate: f64,
    /// EMA of response time
    pub response_time_ms: f64,
    /// Number of samples folded in so far
    pub samples: u64,
    /// When the baseline was last updated
    pub updated_at: DateTime<Utc>,
}

impl EntityBaseline {
    /// Seed a baseline from the first sample
    pub fn from_sample(sample: &MetricSample) -> Self {
        Self {
            tvl_usd: sample.tvl_usd,
            volume_usd: sample.volume_usd,
            error_rate: sample.error_rate,
            response_time_ms: sample.response_time_ms,
            samples: 1,
            updated_at: sample.recorded_at,
        }
    }

    /// Fold a sample into the baseline: `b' = (1-α)·b + α·x`
    pub fn update(&mut self, sample: &MetricSample, alpha: f64) {
        let blend = |baseline: f64, current: f64| (1.0 - alpha) * baseline + alpha * current;
        self.tvl_usd = blend(self.tvl_usd, sample.tvl_usd);
        self.volume_usd = blend(self.volume_usd, sample.volume_usd);
        self.error_rate = blend(self.error_rate, sample.error_rate);
        self.response_time_ms = blend(self.response_time_ms, sample.response_time_ms);
        self.samples += 1;
        self.updated_at = sample.recorded_at;
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// ENTITY STATE
// ═══════════════════════════════════════════════════════════════════════════════

/// Learning phase of a monitored entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityPhase {
    /// No samples recorded yet
    Unseen,
    /// Collecting samples, no alerts fire
    Learning,
    /// Enough history exists, every sample is evaluated
    Baselined,
}

/// Detector-internal state for one entity
#[derive(Debug)]
pub(crate) struct EntityState {
    pub history: VecDeque<MetricSample>,
    pub baseline: EntityBaseline,
    /// Consecutive-match counters keyed by pattern id
    pub streaks: HashMap<String, u32>,
    /// Last firing time keyed by pattern id
    pub last_fired: HashMap<String, DateTime<Utc>>,
}

impl EntityState {
    pub fn new(first: MetricSample, window: usize) -> Self {
        let mut history = VecDeque::with_capacity(window);
        history.push_back(first);
        Self {
            history,
            baseline: EntityBaseline::from_sample(&first),
            streaks: HashMap::new(),
            last_fired: HashMap::new(),
        }
    }

    /// Append a sample (drop-oldest beyond the window) and update the EMA
    pub fn absorb(&mut self, sample: MetricSample, window: usize, alpha: f64) {
        if self.history.len() >= window {
            self.history.pop_front();
        }
        self.history.push_back(sample);
        self.baseline.update(&sample, alpha);
    }

    pub fn phase(&self, min_learning_samples: usize) -> EntityPhase {
        if (self.baseline.samples as usize) < min_learning_samples {
            EntityPhase::Learning
        } else {
            EntityPhase::Baselined
        }
    }
}
