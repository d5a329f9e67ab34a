//! Stage execution.

use std::time::Instant;

use tracing::info;

use crate::error::InvokeError;
use crate::stage::{ExitInfo, FailureKind, Stage, StageResult, StageStatus};

/// Executes one stage's bound action and converts the outcome into a
/// [`StageResult`].
///
/// This is the error boundary for actions: `execute` always returns a
/// result and never propagates an error past it. Any failure to invoke the
/// action (missing tool, timeout, broken environment) becomes a `Failed`
/// result with a typed [`ExitInfo`].
pub struct StageExecutor;

impl StageExecutor {
    /// Execute a single stage and return its result.
    pub async fn execute(stage: &Stage) -> StageResult {
        let start = Instant::now();
        info!(stage = %stage.name, gate = %stage.gate, "executing stage");

        let result = match stage.action.invoke().await {
            Ok(inv) if inv.succeeded() => StageResult {
                stage_name: stage.name.clone(),
                gate: stage.gate.clone(),
                blocking: stage.blocking,
                status: StageStatus::Passed,
                exit_info: None,
                duration_ms: start.elapsed().as_millis() as u64,
                output: inv.output,
            },
            Ok(inv) => StageResult {
                stage_name: stage.name.clone(),
                gate: stage.gate.clone(),
                blocking: stage.blocking,
                status: StageStatus::Failed,
                exit_info: Some(ExitInfo {
                    kind: FailureKind::Execution,
                    code: Some(inv.exit_code),
                    message: format!(
                        "stage '{}' exited with code {}",
                        stage.name, inv.exit_code
                    ),
                }),
                duration_ms: start.elapsed().as_millis() as u64,
                output: inv.output,
            },
            Err(err) => {
                let kind = match &err {
                    InvokeError::Infrastructure(_) => FailureKind::Infrastructure,
                    InvokeError::Timeout(_) => FailureKind::Timeout,
                    InvokeError::Assertion(_) => FailureKind::Assertion,
                };
                StageResult {
                    stage_name: stage.name.clone(),
                    gate: stage.gate.clone(),
                    blocking: stage.blocking,
                    status: StageStatus::Failed,
                    exit_info: Some(ExitInfo {
                        kind,
                        code: None,
                        message: err.to_string(),
                    }),
                    duration_ms: start.elapsed().as_millis() as u64,
                    output: String::new(),
                }
            }
        };

        info!(
            stage = %stage.name,
            status = ?result.status,
            duration_ms = result.duration_ms,
            "stage finished"
        );
        result
    }
}
