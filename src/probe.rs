//! Health prober: one classified check against the monitored service

use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::io::HttpClient;

/// Outcome classification of a single check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceStatus {
    Healthy,
    Unhealthy,
}

/// Result of one probe of the monitored service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckResult {
    pub timestamp_epoch_ms: u64,
    pub status: ServiceStatus,
    /// Round-trip time; absent when the request never completed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    /// Response payload, when the service returned parseable JSON
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CheckResult {
    pub fn is_healthy(&self) -> bool {
        self.status == ServiceStatus::Healthy
    }
}

/// Trait for performing one health check
#[async_trait]
pub trait Prober: Send + Sync + std::fmt::Debug {
    /// Perform one probe and classify the result. Never fails: every error
    /// becomes an unhealthy `CheckResult`.
    async fn probe(&self) -> CheckResult;
}

/// Prober that performs an authenticated HTTP GET against the target
pub struct HttpProber {
    url: String,
    api_key: String,
    timeout: Duration,
    http: Arc<dyn HttpClient>,
}

impl std::fmt::Debug for HttpProber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpProber").field("url", &self.url).finish()
    }
}

impl HttpProber {
    pub fn new(url: String, api_key: String, timeout: Duration, http: Arc<dyn HttpClient>) -> Self {
        tracing::debug!("Created HttpProber for {}", url);
        Self {
            url,
            api_key,
            timeout,
            http,
        }
    }
}

#[async_trait]
impl Prober for HttpProber {
    async fn probe(&self) -> CheckResult {
        let now_ms = current_epoch_ms();
        let start = Instant::now();

        let response = match self
            .http
            .get(&self.url, &[("x-api-key", &self.api_key)], self.timeout)
            .await
        {
            Ok(response) => response,
            Err(e) => {
                tracing::debug!("Probe of {} failed: {}", self.url, e);
                return CheckResult {
                    timestamp_epoch_ms: now_ms,
                    status: ServiceStatus::Unhealthy,
                    latency_ms: None,
                    status_code: None,
                    data: None,
                    error: Some(e.to_string()),
                };
            }
        };

        let latency_ms = start.elapsed().as_millis() as u64;
        let (status, data, error) = classify(response.status, &response.body);

        tracing::debug!(
            "Probe of {} -> {:?} ({} ms, HTTP {})",
            self.url,
            status,
            latency_ms,
            response.status
        );

        CheckResult {
            timestamp_epoch_ms: now_ms,
            status,
            latency_ms: Some(latency_ms),
            status_code: Some(response.status),
            data,
            error,
        }
    }
}

/// Classify a completed round trip. Healthy requires HTTP 200 and, when a
/// non-empty body is present, a JSON payload with `status == "success"`.
fn classify(
    status_code: u16,
    body: &str,
) -> (ServiceStatus, Option<serde_json::Value>, Option<String>) {
    if status_code != 200 {
        return (
            ServiceStatus::Unhealthy,
            None,
            Some(format!("Service returned status {}", status_code)),
        );
    }

    if body.trim().is_empty() {
        return (ServiceStatus::Healthy, None, None);
    }

    match serde_json::from_str::<serde_json::Value>(body) {
        Ok(data) => {
            if data.get("status").and_then(|s| s.as_str()) == Some("success") {
                (ServiceStatus::Healthy, Some(data), None)
            } else {
                (
                    ServiceStatus::Unhealthy,
                    Some(data),
                    Some("Service returned unhealthy status".to_string()),
                )
            }
        }
        Err(e) => (
            ServiceStatus::Unhealthy,
            None,
            Some(format!("Service returned an unreadable body: {}", e)),
        ),
    }
}

pub(crate) fn current_epoch_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
