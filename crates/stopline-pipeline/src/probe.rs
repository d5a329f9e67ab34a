//! Readiness probing: poll a health endpoint until it answers or a
//! deadline elapses.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{debug, info};

use crate::error::SpecError;

/// Polling policy for a health endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthCheckPolicy {
    /// Full URL of the liveness endpoint, e.g. `http://localhost:8000/health`.
    pub endpoint: String,

    /// Delay between probes in milliseconds.
    pub interval_ms: u64,

    /// Total budget in milliseconds before giving up.
    pub timeout_ms: u64,

    /// HTTP status that signals readiness.
    pub expected_status: u16,
}

impl HealthCheckPolicy {
    /// Build a policy, rejecting configurations that could never probe.
    pub fn new(
        endpoint: impl Into<String>,
        interval_ms: u64,
        timeout_ms: u64,
        expected_status: u16,
    ) -> Result<Self, SpecError> {
        let policy = Self {
            endpoint: endpoint.into(),
            interval_ms,
            timeout_ms,
            expected_status,
        };
        policy.validate()?;
        Ok(policy)
    }

    /// Check the policy invariants. Deserialized policies must be validated
    /// before use.
    pub fn validate(&self) -> Result<(), SpecError> {
        if self.interval_ms == 0 {
            return Err(SpecError::InvalidPolicy("interval_ms must be > 0".into()));
        }
        if self.timeout_ms == 0 {
            return Err(SpecError::InvalidPolicy("timeout_ms must be > 0".into()));
        }
        if self.timeout_ms < self.interval_ms {
            // Would allow zero-probe runs.
            return Err(SpecError::InvalidPolicy(format!(
                "timeout_ms ({}) must be >= interval_ms ({})",
                self.timeout_ms, self.interval_ms
            )));
        }
        Ok(())
    }
}

/// Outcome of a readiness wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeStatus {
    /// The endpoint answered with the expected status.
    Ready,
    /// The deadline elapsed without a successful probe.
    TimedOut,
    /// An external cancellation signal aborted the wait.
    Cancelled,
}

/// Polls a target endpoint until healthy or a deadline elapses.
///
/// Connection errors are a non-fatal "not yet ready" signal — a freshly
/// started service's port may not be listening yet — so they are retried.
/// Only deadline exhaustion constitutes failure.
#[derive(Debug, Clone, Default)]
pub struct ReadinessProber {
    client: reqwest::Client,
}

impl ReadinessProber {
    pub fn new() -> Self {
        Self::default()
    }

    /// Block (cooperatively) until the endpoint is ready or the policy's
    /// deadline elapses.
    pub async fn wait_until_ready(&self, policy: &HealthCheckPolicy) -> ProbeStatus {
        // No sender, so the cancel signal can never fire.
        let (_tx, rx) = watch::channel(false);
        self.wait_until_ready_with_cancel(policy, rx).await
    }

    /// Like [`wait_until_ready`](Self::wait_until_ready), but aborts within
    /// one interval of `cancel` flipping to `true`.
    pub async fn wait_until_ready_with_cancel(
        &self,
        policy: &HealthCheckPolicy,
        mut cancel: watch::Receiver<bool>,
    ) -> ProbeStatus {
        if *cancel.borrow() {
            return ProbeStatus::Cancelled;
        }

        let interval = Duration::from_millis(policy.interval_ms);
        let deadline = Instant::now() + Duration::from_millis(policy.timeout_ms);
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            match self
                .client
                .get(&policy.endpoint)
                .timeout(interval)
                .send()
                .await
            {
                Ok(resp) if resp.status().as_u16() == policy.expected_status => {
                    info!(endpoint = %policy.endpoint, attempt, "endpoint ready");
                    return ProbeStatus::Ready;
                }
                Ok(resp) => {
                    debug!(
                        endpoint = %policy.endpoint,
                        attempt,
                        status = resp.status().as_u16(),
                        "endpoint not ready"
                    );
                }
                Err(err) => {
                    // Expected while the service is still starting.
                    debug!(endpoint = %policy.endpoint, attempt, error = %err, "probe error, retrying");
                }
            }

            if Instant::now() >= deadline {
                info!(endpoint = %policy.endpoint, attempt, "readiness deadline exceeded");
                return ProbeStatus::TimedOut;
            }

            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                res = cancel.changed() => {
                    if res.is_ok() && *cancel.borrow() {
                        info!(endpoint = %policy.endpoint, "readiness wait cancelled");
                        return ProbeStatus::Cancelled;
                    }
                    // Sender dropped, or the signal did not flip to true:
                    // wait out the interval as usual.
                    tokio::time::sleep(interval).await;
                }
            }

            if Instant::now() >= deadline {
                info!(endpoint = %policy.endpoint, attempt, "readiness deadline exceeded");
                return ProbeStatus::TimedOut;
            }
        }
    }
}
