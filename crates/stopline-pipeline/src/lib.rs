//! stopline - staged pipeline orchestrator with gated promotion.
//!
//! Models a deployment pipeline as an ordered list of named gates, each an
//! ordered list of stages:
//! - Stages run sequentially; a blocking failure fails its gate.
//! - A gate runs only if every prior gate passed ("Stop the Line").
//! - A readiness prober polls the freshly deployed service's health
//!   endpoint before one-shot smoke probes verify it functionally.

pub mod action;
pub mod error;
pub mod pipeline;
pub mod probe;
pub mod report;
pub mod runner;
pub mod smoke;
pub mod spec;
pub mod stage;

// Re-export key types
pub use action::{CommandAction, Invocable, Invocation};
pub use error::{InvokeError, SpecError};
pub use pipeline::{Gate, GateResult, GateStatus, Pipeline, PipelineRun, RunStatus};
pub use probe::{HealthCheckPolicy, ProbeStatus, ReadinessProber};
pub use report::summarize;
pub use runner::StageExecutor;
pub use smoke::{HttpMethod, ProbeSpec, SmokeTestAction, SmokeTestRunner};
pub use spec::{GateSpec, PipelineSpec, SmokeSpec, StageSpec};
pub use stage::{ExitInfo, FailureKind, GateName, Stage, StageResult, StageStatus};
