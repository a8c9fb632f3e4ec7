//! Per-bridge monitoring metrics.
//!
//! Uptime and error rate are exponential moving averages over health-check
//! results, so a bridge with persistent endpoint failures shows a degraded
//! uptime average and accumulating consecutive failures rather than being
//! removed from monitoring.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// EMA smoothing factor for uptime/error-rate/latency updates
pub const METRICS_EMA_ALPHA: f64 = 0.2;

/// Rolling health metrics for one bridge
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BridgeMetrics {
    /// EMA uptime percentage (0-100)
    pub uptime_pct: f64,
    /// EMA error rate as a fraction (0.0-1.0)
    pub error_rate: f64,
    /// EMA probe latency in milliseconds
    pub avg_latency_ms: f64,
    /// Health checks failed in a row
    pub consecutive_failures: u32,
    /// Total health checks performed
    pub total_checks: u64,
    /// Total health checks that failed
    pub failed_checks: u64,
    /// When the last check completed
    pub last_check_at: Option<DateTime<Utc>>,
}

impl BridgeMetrics {
    /// Fresh metrics for a newly monitored bridge: perfect uptime, no errors
    pub fn new() -> Self {
        Self {
            uptime_pct: 100.0,
            error_rate: 0.0,
            avg_latency_ms: 0.0,
            consecutive_failures: 0,
            total_checks: 0,
            failed_checks: 0,
            last_check_at: None,
        }
    }

    /// Fold in a successful health check
    pub fn record_success(&mut self, latency_ms: u64) {
        self.uptime_pct = ema(self.uptime_pct, 100.0);
        self.error_rate = ema(self.error_rate, 0.0);
        self.avg_latency_ms = if self.total_checks == 0 {
            latency_ms as f64
        } else {
            ema(self.avg_latency_ms, latency_ms as f64)
        };
        self.consecutive_failures = 0;
        self.total_checks += 1;
        self.last_check_at = Some(Utc::now());
    }

    /// Fold in a failed health check
    pub fn record_failure(&mut self) {
        self.uptime_pct = ema(self.uptime_pct, 0.0);
        self.error_rate = ema(self.error_rate, 1.0);
        self.consecutive_failures += 1;
        self.total_checks += 1;
        self.failed_checks += 1;
        self.last_check_at = Some(Utc::now());
    }
}

impl Default for BridgeMetrics {
    fn default() -> Self {
        Self::new()
    }
}

fn ema(previous: f64, current: f64) -> f64 {
    (1.0 - METRICS_EMA_ALPHA) * previous + METRICS_EMA_ALPHA * current
}
