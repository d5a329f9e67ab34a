//! Human-readable pipeline report.
//!
//! The single place where "why the line stopped" is explained. Pure
//! formatting of a finalized [`PipelineRun`], no side effects.

use crate::pipeline::{GateStatus, PipelineRun, RunStatus};
use crate::stage::{StageResult, StageStatus};

fn stage_label(result: &StageResult) -> &'static str {
    match result.status {
        StageStatus::Passed => "pass",
        StageStatus::Skipped => "skip",
        // Non-blocking failures are warnings, not stoppers.
        StageStatus::Failed if !result.blocking => "warn",
        StageStatus::Failed => "fail",
    }
}

/// Render a finalized run as text.
///
/// Marks which gates ran and which were skipped, lists every stage with
/// its status and duration, and when the run failed, names the first
/// blocking failure's stage and message.
pub fn summarize(run: &PipelineRun) -> String {
    let verdict = match run.overall_status {
        RunStatus::Passed => "PASSED",
        RunStatus::Failed => "FAILED",
    };

    let mut out = format!(
        "pipeline run {}: {} ({} ms)\n",
        run.id,
        verdict,
        run.duration_ms()
    );

    for gate in &run.gate_results {
        let status = match gate.status {
            GateStatus::Passed => "passed",
            GateStatus::Failed => "failed",
            GateStatus::Skipped => "skipped",
        };
        out.push_str(&format!("\n{}: {}\n", gate.gate, status));

        for stage in &gate.stage_results {
            match stage.status {
                StageStatus::Skipped => {
                    out.push_str(&format!("  [{}] {}\n", stage_label(stage), stage.stage_name));
                }
                StageStatus::Passed => {
                    out.push_str(&format!(
                        "  [{}] {} ({} ms)\n",
                        stage_label(stage),
                        stage.stage_name,
                        stage.duration_ms
                    ));
                }
                StageStatus::Failed => {
                    let message = stage
                        .exit_info
                        .as_ref()
                        .map(|i| i.message.as_str())
                        .unwrap_or("unknown failure");
                    out.push_str(&format!(
                        "  [{}] {} ({} ms) - {}\n",
                        stage_label(stage),
                        stage.stage_name,
                        stage.duration_ms,
                        message
                    ));
                }
            }
        }
    }

    if let Some(failure) = run.first_blocking_failure() {
        let message = failure
            .exit_info
            .as_ref()
            .map(|i| i.message.as_str())
            .unwrap_or("unknown failure");
        out.push_str(&format!(
            "\nstopped the line at '{}' ({}): {}\n",
            failure.stage_name, failure.gate, message
        ));
    }

    out
}
