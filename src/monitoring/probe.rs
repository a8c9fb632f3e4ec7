//! Endpoint probing.
//!
//! The orchestrator issues a generic "check reachable / measure latency"
//! request per configured endpoint; the concrete protocol is resolved by the
//! injected [`EndpointProber`], not by the core itself.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;
use std::time::{Duration, Instant};

use crate::error::{Error, Result};
use crate::types::BridgeEndpoint;

/// Boxed probe future returned by [`EndpointProber::probe`]
pub type ProbeFuture<'a> = Pin<Box<dyn Future<Output = Result<ProbeOutcome>> + Send + 'a>>;

/// Result of probing a single endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeOutcome {
    /// Endpoint URL that was probed
    pub url: String,
    /// Round-trip latency in milliseconds
    pub latency_ms: u64,
    /// Whether the endpoint answered successfully
    pub healthy: bool,
    /// Failure description when unhealthy
    pub error: Option<String>,
}

/// Injected prober resolving the concrete probe protocol.
///
/// A timeout or connection failure is reported through the returned error or
/// an unhealthy outcome; it never escapes the monitoring cycle.
pub trait EndpointProber: Send + Sync {
    /// Probe a single endpoint, bounded by the endpoint's own timeout
    fn probe<'a>(&'a self, endpoint: &'a BridgeEndpoint) -> ProbeFuture<'a>;
}

/// Aggregated health-check result for one bridge
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthCheckResult {
    /// Bridge identifier
    pub bridge_id: String,
    /// True when every configured endpoint answered healthy
    pub healthy: bool,
    /// Per-endpoint outcomes
    pub endpoints: Vec<ProbeOutcome>,
    /// Collected endpoint errors
    pub errors: Vec<String>,
    /// When the check completed
    pub checked_at: DateTime<Utc>,
}

impl HealthCheckResult {
    /// Mean latency across healthy endpoints, if any answered
    pub fn avg_latency_ms(&self) -> Option<u64> {
        let healthy: Vec<u64> = self
            .endpoints
            .iter()
            .filter(|o| o.healthy)
            .map(|o| o.latency_ms)
            .collect();
        if healthy.is_empty() {
            None
        } else {
            Some(healthy.iter().sum::<u64>() / healthy.len() as u64)
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// HTTP PROBER
// ═══════════════════════════════════════════════════════════════════════════════

/// Production prober issuing plain HTTP GET requests.
///
/// Retries per the endpoint's `retry_attempts`; each attempt carries the
/// endpoint's own timeout.
#[derive(Debug, Clone)]
pub struct HttpProber {
    client: reqwest::Client,
}

impl HttpProber {
    /// Create a prober with a shared connection pool
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("bridgewatch/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::Internal(format!("failed to build http client: {e}")))?;
        Ok(Self { client })
    }
}

impl EndpointProber for HttpProber {
    fn probe<'a>(&'a self, endpoint: &'a BridgeEndpoint) -> ProbeFuture<'a> {
        Box::pin(async move {
            let timeout = Duration::from_millis(endpoint.timeout_ms);
            let attempts = endpoint.retry_attempts.max(1);
            let mut last_error = String::new();

            for attempt in 0..attempts {
                let start = Instant::now();
                let response = self
                    .client
                    .get(&endpoint.url)
                    .timeout(timeout)
                    .send()
                    .await;
                let latency_ms = start.elapsed().as_millis() as u64;

                match response {
                    Ok(resp) if resp.status().is_success() => {
                        return Ok(ProbeOutcome {
                            url: endpoint.url.clone(),
                            latency_ms,
                            healthy: true,
                            error: None,
                        });
                    }
                    Ok(resp) => {
                        last_error = format!("status {}", resp.status());
                    }
                    Err(e) => {
                        last_error = e.to_string();
                    }
                }

                tracing::debug!(
                    url = %endpoint.url,
                    attempt = attempt + 1,
                    error = %last_error,
                    "probe attempt failed"
                );
            }

            Err(Error::EndpointUnreachable {
                url: endpoint.url.clone(),
                reason: last_error,
            })
        })
    }
}
