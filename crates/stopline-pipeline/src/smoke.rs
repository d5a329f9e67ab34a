//! Smoke testing: one-shot functional verification of a running service.

use std::time::Instant;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use crate::action::{Invocable, Invocation};
use crate::error::InvokeError;
use crate::probe::{HealthCheckPolicy, ProbeStatus, ReadinessProber};
use crate::stage::{ExitInfo, FailureKind, GateName, StageResult, StageStatus};

/// HTTP method of a smoke probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HttpMethod {
    Get,
    Post,
}

impl HttpMethod {
    fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
        }
    }
}

/// One verification request against the target service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeSpec {
    /// Request path, e.g. `/predict`.
    pub path: String,

    /// HTTP method.
    pub method: HttpMethod,

    /// Optional JSON body (POST probes).
    #[serde(default)]
    pub payload: Option<Value>,

    /// Status the response must carry for the probe to pass.
    pub expected_status: u16,
}

impl ProbeSpec {
    pub fn get(path: impl Into<String>, expected_status: u16) -> Self {
        Self {
            path: path.into(),
            method: HttpMethod::Get,
            payload: None,
            expected_status,
        }
    }

    pub fn post(path: impl Into<String>, payload: Value, expected_status: u16) -> Self {
        Self {
            path: path.into(),
            method: HttpMethod::Post,
            payload: Some(payload),
            expected_status,
        }
    }
}

/// Issues verification requests against a service that is already known to
/// be reachable, and judges pass/fail.
///
/// No retries happen here — retrying belongs to the readiness prober. A
/// failure at this level means the service came up but is functionally
/// broken, which the report must distinguish from "never came up".
#[derive(Debug, Clone)]
pub struct SmokeTestRunner {
    client: reqwest::Client,
    base_url: String,
}

impl SmokeTestRunner {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }

    /// Execute each probe in order.
    ///
    /// Returns a transcript of the requests on success, or an
    /// [`InvokeError::Assertion`] naming the first offending probe.
    pub async fn check(&self, probes: &[ProbeSpec]) -> Result<String, InvokeError> {
        let mut transcript = String::new();

        for probe in probes {
            let url = format!(
                "{}{}",
                self.base_url.trim_end_matches('/'),
                probe.path
            );

            let request = match probe.method {
                HttpMethod::Get => self.client.get(&url),
                HttpMethod::Post => {
                    let builder = self.client.post(&url);
                    match &probe.payload {
                        Some(body) => builder.json(body),
                        None => builder,
                    }
                }
            };

            let response = request.send().await.map_err(|e| {
                InvokeError::Assertion(format!(
                    "{} {} request failed: {}",
                    probe.method.as_str(),
                    probe.path,
                    e
                ))
            })?;

            let status = response.status().as_u16();
            if status != probe.expected_status {
                return Err(InvokeError::Assertion(format!(
                    "{} {} returned {}, expected {}",
                    probe.method.as_str(),
                    probe.path,
                    status,
                    probe.expected_status
                )));
            }

            info!(method = probe.method.as_str(), path = %probe.path, status, "smoke probe passed");
            transcript.push_str(&format!(
                "{} {} -> {}\n",
                probe.method.as_str(),
                probe.path,
                status
            ));
        }

        Ok(transcript)
    }

    /// Execute probes and fold the verdict into a [`StageResult`].
    pub async fn run(
        &self,
        stage_name: &str,
        gate: GateName,
        probes: &[ProbeSpec],
    ) -> StageResult {
        let start = Instant::now();
        match self.check(probes).await {
            Ok(transcript) => StageResult {
                stage_name: stage_name.to_string(),
                gate,
                blocking: true,
                status: StageStatus::Passed,
                exit_info: None,
                duration_ms: start.elapsed().as_millis() as u64,
                output: transcript,
            },
            Err(err) => StageResult {
                stage_name: stage_name.to_string(),
                gate,
                blocking: true,
                status: StageStatus::Failed,
                exit_info: Some(ExitInfo {
                    kind: FailureKind::Assertion,
                    code: None,
                    message: err.to_string(),
                }),
                duration_ms: start.elapsed().as_millis() as u64,
                output: String::new(),
            },
        }
    }
}

/// Stage action that waits for the freshly deployed service to become
/// ready, then smoke-tests it.
///
/// Placed as the final stage of the acceptance gate, after the blocking
/// package/deploy stage — so it only runs once deployment succeeded, and
/// the gate controller needs no knowledge of HTTP. Readiness exhaustion is
/// a [`FailureKind::Timeout`] ("service never came up"); a probe mismatch
/// is a [`FailureKind::Assertion`] ("came up but functionally broken").
#[derive(Debug, Clone)]
pub struct SmokeTestAction {
    pub base_url: String,
    pub policy: HealthCheckPolicy,
    pub probes: Vec<ProbeSpec>,
}

impl SmokeTestAction {
    pub fn new(
        base_url: impl Into<String>,
        policy: HealthCheckPolicy,
        probes: Vec<ProbeSpec>,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            policy,
            probes,
        }
    }
}

#[async_trait]
impl Invocable for SmokeTestAction {
    async fn invoke(&self) -> Result<Invocation, InvokeError> {
        let prober = ReadinessProber::new();
        match prober.wait_until_ready(&self.policy).await {
            ProbeStatus::Ready => {}
            ProbeStatus::TimedOut => return Err(InvokeError::Timeout(self.policy.timeout_ms)),
            ProbeStatus::Cancelled => {
                return Err(InvokeError::Infrastructure(
                    "readiness wait cancelled".to_string(),
                ))
            }
        }

        let runner = SmokeTestRunner::new(&self.base_url);
        let transcript = runner.check(&self.probes).await?;
        Ok(Invocation {
            exit_code: 0,
            output: transcript,
        })
    }
}
