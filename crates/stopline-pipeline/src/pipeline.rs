//! Gate controller: ordered gates, fail-fast stages, "Stop the Line".

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::runner::StageExecutor;
use crate::stage::{GateName, Stage, StageResult, StageStatus};

/// A named, ordered group of stages that must collectively pass before any
/// later gate runs.
#[derive(Debug, Clone)]
pub struct Gate {
    pub name: GateName,
    pub stages: Vec<Stage>,
}

impl Gate {
    pub fn new(name: GateName, stages: Vec<Stage>) -> Self {
        Self { name, stages }
    }
}

/// Final status of a gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateStatus {
    Passed,
    Failed,
    /// A prior gate failed; none of this gate's stages were invoked.
    Skipped,
}

/// Results of all stages within one gate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateResult {
    pub gate: GateName,
    pub stage_results: Vec<StageResult>,
    pub status: GateStatus,
}

/// Overall pipeline verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Passed,
    Failed,
}

/// One complete pipeline run, finalized once the last gate resolves.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineRun {
    pub id: Uuid,
    pub gate_results: Vec<GateResult>,
    pub overall_status: RunStatus,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl PipelineRun {
    /// Whether every gate passed.
    pub fn passed(&self) -> bool {
        self.overall_status == RunStatus::Passed
    }

    /// The first blocking failure that stopped the line, if any.
    ///
    /// Skipped stages and non-blocking failures are not candidates: the
    /// first `Failed` stage inside a `Failed` gate is the one that halted
    /// execution.
    pub fn first_blocking_failure(&self) -> Option<&StageResult> {
        self.gate_results
            .iter()
            .find(|g| g.status == GateStatus::Failed)
            .and_then(|g| {
                g.stage_results
                    .iter()
                    .find(|s| s.status == StageStatus::Failed && s.blocking)
            })
    }

    /// Total wall-clock duration in milliseconds.
    pub fn duration_ms(&self) -> u64 {
        (self.finished_at - self.started_at)
            .num_milliseconds()
            .max(0) as u64
    }
}

/// Orchestrates an ordered list of gates.
///
/// Stages within a gate execute one at a time in declared order; gates
/// execute one at a time in declared order. Once the overall status turns
/// `Failed`, no subsequent gate's stages are ever executed — they are only
/// recorded as `Skipped`. The acceptance gate is therefore unreachable
/// after any commit-stage blocking failure.
#[derive(Debug, Clone)]
pub struct Pipeline {
    gates: Vec<Gate>,
}

impl Pipeline {
    pub fn new(gates: Vec<Gate>) -> Self {
        Self { gates }
    }

    pub fn gates(&self) -> &[Gate] {
        &self.gates
    }

    /// Run every gate in order and return the finalized run.
    pub async fn run(&self) -> PipelineRun {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        info!(run_id = %run_id, gates = self.gates.len(), "starting pipeline run");

        let mut overall = RunStatus::Passed;
        let mut gate_results = Vec::with_capacity(self.gates.len());

        for gate in &self.gates {
            if overall != RunStatus::Passed {
                // Stop the Line: record the whole gate as skipped without
                // invoking any stage.
                info!(gate = %gate.name, "skipping gate after upstream failure");
                gate_results.push(GateResult {
                    gate: gate.name.clone(),
                    stage_results: gate.stages.iter().map(StageResult::skipped).collect(),
                    status: GateStatus::Skipped,
                });
                continue;
            }

            gate_results.push(Self::run_gate(gate, &mut overall).await);
        }

        let finished_at = Utc::now();
        info!(
            run_id = %run_id,
            status = ?overall,
            duration_ms = (finished_at - started_at).num_milliseconds(),
            "pipeline run finished"
        );

        PipelineRun {
            id: run_id,
            gate_results,
            overall_status: overall,
            started_at,
            finished_at,
        }
    }

    async fn run_gate(gate: &Gate, overall: &mut RunStatus) -> GateResult {
        info!(gate = %gate.name, stages = gate.stages.len(), "entering gate");

        let mut stage_results = Vec::with_capacity(gate.stages.len());
        let mut gate_status = GateStatus::Passed;

        let mut stages = gate.stages.iter();
        for stage in stages.by_ref() {
            let result = StageExecutor::execute(stage).await;
            let failed = result.status == StageStatus::Failed;
            stage_results.push(result);

            if failed && stage.blocking {
                gate_status = GateStatus::Failed;
                *overall = RunStatus::Failed;
                break;
            }
            // Non-blocking failures are recorded and execution continues.
        }

        // Remaining stages in a failed gate were never invoked.
        for stage in stages {
            stage_results.push(StageResult::skipped(stage));
        }

        info!(gate = %gate.name, status = ?gate_status, "gate finished");
        GateResult {
            gate: gate.name.clone(),
            stage_results,
            status: gate_status,
        }
    }
}
