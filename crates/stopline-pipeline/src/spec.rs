//! Pipeline definition files and their identity digest.

use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::action::CommandAction;
use crate::error::SpecError;
use crate::pipeline::{Gate, Pipeline};
use crate::probe::HealthCheckPolicy;
use crate::smoke::{ProbeSpec, SmokeTestAction};
use crate::stage::{GateName, Stage};

fn default_blocking() -> bool {
    true
}

fn default_timeout_secs() -> u64 {
    600
}

fn default_smoke_gate() -> GateName {
    GateName::AcceptanceGate
}

fn default_smoke_stage() -> String {
    "smoke_test".to_string()
}

/// One stage in a definition file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageSpec {
    /// Human-readable stage name.
    pub name: String,

    /// Command to execute (first element is the executable).
    pub command: Vec<String>,

    /// Whether a failure stops the line (default true).
    #[serde(default = "default_blocking")]
    pub blocking: bool,

    /// Timeout in seconds (default 600, 0 = no timeout).
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

/// One gate in a definition file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateSpec {
    pub name: GateName,
    pub stages: Vec<StageSpec>,
}

/// Smoke-test configuration: readiness policy plus verification probes,
/// appended as the final stage of its gate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmokeSpec {
    /// Gate the smoke stage belongs to (default acceptance_gate).
    #[serde(default = "default_smoke_gate")]
    pub gate: GateName,

    /// Name of the generated stage (default "smoke_test").
    #[serde(default = "default_smoke_stage")]
    pub stage_name: String,

    /// Base URL the probe paths are resolved against.
    pub base_url: String,

    /// Readiness policy for the freshly started service.
    pub health: HealthCheckPolicy,

    /// Verification probes, executed in order.
    pub probes: Vec<ProbeSpec>,
}

/// A complete pipeline definition, loadable from JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineSpec {
    /// Pipeline name, used for logging only.
    pub name: String,

    /// Gates in execution order.
    pub gates: Vec<GateSpec>,

    /// Optional smoke-test stage.
    #[serde(default)]
    pub smoke: Option<SmokeSpec>,
}

impl PipelineSpec {
    /// Parse a definition from JSON text.
    pub fn from_json(text: &str) -> Result<Self, SpecError> {
        let spec: Self = serde_json::from_str(text)?;
        spec.validate()?;
        Ok(spec)
    }

    /// Load and validate a definition file.
    pub fn from_file(path: &Path) -> Result<Self, SpecError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    /// Check structural invariants.
    pub fn validate(&self) -> Result<(), SpecError> {
        if self.gates.is_empty() {
            return Err(SpecError::NoGates);
        }

        for gate in &self.gates {
            let smoke_targets_gate = self
                .smoke
                .as_ref()
                .map(|s| s.gate == gate.name)
                .unwrap_or(false);
            if gate.stages.is_empty() && !smoke_targets_gate {
                return Err(SpecError::EmptyGate(gate.name.to_string()));
            }
            for stage in &gate.stages {
                if stage.command.is_empty() {
                    return Err(SpecError::EmptyCommand(stage.name.clone()));
                }
            }
        }

        if let Some(smoke) = &self.smoke {
            smoke.health.validate()?;
        }
        Ok(())
    }

    /// Ordered `gate/stage` names, smoke stage included.
    pub fn stage_names(&self) -> Vec<String> {
        let mut names = Vec::new();
        for gate in &self.gates {
            for stage in &gate.stages {
                names.push(format!("{}/{}", gate.name, stage.name));
            }
            if let Some(smoke) = &self.smoke {
                if smoke.gate == gate.name {
                    names.push(format!("{}/{}", gate.name, smoke.stage_name));
                }
            }
        }
        names
    }

    /// Deterministic SHA-256 digest of the ordered stage names, usable as a
    /// stable identity for the definition.
    pub fn stages_digest(&self) -> String {
        let mut hasher = Sha256::new();
        for name in self.stage_names() {
            hasher.update(name.as_bytes());
            hasher.update(b"\0");
        }
        hex::encode(hasher.finalize())
    }

    /// Build the executable [`Pipeline`], binding each stage to a
    /// [`CommandAction`] and appending the smoke stage to its gate.
    pub fn into_pipeline(self) -> Result<Pipeline, SpecError> {
        self.validate()?;

        let smoke = self.smoke;
        let mut gates = Vec::with_capacity(self.gates.len());

        for gate_spec in self.gates {
            let mut stages: Vec<Stage> = gate_spec
                .stages
                .into_iter()
                .map(|s| {
                    Stage::new(
                        s.name,
                        gate_spec.name.clone(),
                        Arc::new(CommandAction::new(s.command, s.timeout_secs)),
                        s.blocking,
                    )
                })
                .collect();

            if let Some(smoke) = smoke.as_ref().filter(|s| s.gate == gate_spec.name) {
                // Always blocking: a broken or unreachable service must
                // stop the line.
                stages.push(Stage::blocking(
                    smoke.stage_name.clone(),
                    gate_spec.name.clone(),
                    Arc::new(SmokeTestAction::new(
                        smoke.base_url.clone(),
                        smoke.health.clone(),
                        smoke.probes.clone(),
                    )),
                ));
            }

            gates.push(Gate::new(gate_spec.name, stages));
        }

        Ok(Pipeline::new(gates))
    }
}
