//! Stage definitions and outcome model.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::action::Invocable;

/// Name of a gate in the pipeline.
///
/// The canonical two-gate pipeline uses `CommitStage` followed by
/// `AcceptanceGate`, but any ordered sequence of gate names is supported.
/// Gates execute in declaration order and a gate never starts until the
/// previous gate passed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateName {
    CommitStage,
    AcceptanceGate,
    #[serde(untagged)]
    Custom(String),
}

impl fmt::Display for GateName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GateName::CommitStage => write!(f, "commit_stage"),
            GateName::AcceptanceGate => write!(f, "acceptance_gate"),
            GateName::Custom(name) => write!(f, "{}", name),
        }
    }
}

/// Final status of a single stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    Passed,
    Failed,
    Skipped,
}

/// Why a stage failed.
///
/// Typed so the report can distinguish "code is broken" (`Execution`) from
/// "environment is broken" (`Infrastructure`), "service never came up"
/// (`Timeout`) and "service came up but is functionally broken"
/// (`Assertion`) without parsing message text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The action ran and signaled failure (non-zero exit).
    Execution,
    /// The action could not be invoked at all.
    Infrastructure,
    /// A deadline elapsed before the action completed.
    Timeout,
    /// A verification probe saw an unexpected response.
    Assertion,
}

/// Exit details attached to a failed stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExitInfo {
    pub kind: FailureKind,
    pub code: Option<i32>,
    pub message: String,
}

/// A single named unit of work within a gate.
///
/// Immutable once defined. `blocking = true` means a failure stops the
/// line; `blocking = false` records the failure and continues (lint
/// warnings, for example).
#[derive(Clone)]
pub struct Stage {
    pub name: String,
    pub gate: GateName,
    pub action: Arc<dyn Invocable>,
    pub blocking: bool,
}

impl Stage {
    pub fn new(
        name: impl Into<String>,
        gate: GateName,
        action: Arc<dyn Invocable>,
        blocking: bool,
    ) -> Self {
        Self {
            name: name.into(),
            gate,
            action,
            blocking,
        }
    }

    /// A stage whose failure halts the gate and all downstream gates.
    pub fn blocking(name: impl Into<String>, gate: GateName, action: Arc<dyn Invocable>) -> Self {
        Self::new(name, gate, action, true)
    }

    /// A stage whose failure is recorded but never halts execution.
    pub fn non_blocking(
        name: impl Into<String>,
        gate: GateName,
        action: Arc<dyn Invocable>,
    ) -> Self {
        Self::new(name, gate, action, false)
    }
}

impl fmt::Debug for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stage")
            .field("name", &self.name)
            .field("gate", &self.gate)
            .field("blocking", &self.blocking)
            .finish_non_exhaustive()
    }
}

/// Result of executing (or skipping) one stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageResult {
    /// Stage name.
    pub stage_name: String,

    /// Gate the stage belongs to.
    pub gate: GateName,

    /// Whether the stage's failure stops the line.
    pub blocking: bool,

    /// Final status.
    pub status: StageStatus,

    /// Failure details, present iff `status == Failed`.
    pub exit_info: Option<ExitInfo>,

    /// Wall-clock duration in milliseconds (0 for skipped stages).
    pub duration_ms: u64,

    /// Captured output of the action.
    pub output: String,
}

impl StageResult {
    /// Whether this stage passed.
    pub fn passed(&self) -> bool {
        self.status == StageStatus::Passed
    }

    /// Result for a stage that was never invoked because an upstream
    /// blocking failure stopped the line.
    pub fn skipped(stage: &Stage) -> Self {
        Self {
            stage_name: stage.name.clone(),
            gate: stage.gate.clone(),
            blocking: stage.blocking,
            status: StageStatus::Skipped,
            exit_info: None,
            duration_ms: 0,
            output: String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::{Invocation, Invocable};
    use crate::error::InvokeError;
    use async_trait::async_trait;

    struct NoopAction;

    #[async_trait]
    impl Invocable for NoopAction {
        async fn invoke(&self) -> Result<Invocation, InvokeError> {
            Ok(Invocation {
                exit_code: 0,
                output: String::new(),
            })
        }
    }

    #[test]
    fn test_gate_name_display() {
        assert_eq!(GateName::CommitStage.to_string(), "commit_stage");
        assert_eq!(GateName::AcceptanceGate.to_string(), "acceptance_gate");
        assert_eq!(
            GateName::Custom("canary".to_string()).to_string(),
            "canary"
        );
    }

    #[test]
    fn test_gate_name_serde_round_trip() {
        let json = serde_json::to_string(&GateName::CommitStage).unwrap();
        assert_eq!(json, "\"commit_stage\"");
        let back: GateName = serde_json::from_str(&json).unwrap();
        assert_eq!(back, GateName::CommitStage);

        let custom: GateName = serde_json::from_str("\"canary\"").unwrap();
        assert_eq!(custom, GateName::Custom("canary".to_string()));
    }

    #[test]
    fn test_stage_constructors() {
        let stage = Stage::blocking("lint", GateName::CommitStage, Arc::new(NoopAction));
        assert!(stage.blocking);
        assert_eq!(stage.gate, GateName::CommitStage);

        let stage = Stage::non_blocking("style", GateName::CommitStage, Arc::new(NoopAction));
        assert!(!stage.blocking);
    }

    #[test]
    fn test_skipped_result() {
        let stage = Stage::blocking("build", GateName::AcceptanceGate, Arc::new(NoopAction));
        let result = StageResult::skipped(&stage);
        assert_eq!(result.status, StageStatus::Skipped);
        assert_eq!(result.duration_ms, 0);
        assert!(result.exit_info.is_none());
        assert!(!result.passed());
    }
}
