//! Error taxonomy for pipeline execution and definition loading.

/// Errors raised while invoking a stage action.
///
/// A non-zero exit code is *not* an `InvokeError` — the action ran and
/// signaled failure, which travels in the returned `Invocation`. These
/// variants cover the cases where the action could not produce an exit
/// code at all.
#[derive(Debug, thiserror::Error)]
pub enum InvokeError {
    /// The action could not be started (missing executable, unreachable
    /// network, broken environment).
    #[error("infrastructure error: {0}")]
    Infrastructure(String),

    /// The action ran past its deadline.
    #[error("timed out after {0} ms")]
    Timeout(u64),

    /// A verification probe received an unexpected response.
    #[error("assertion failed: {0}")]
    Assertion(String),
}

/// Errors raised while building or validating a pipeline definition.
#[derive(Debug, thiserror::Error)]
pub enum SpecError {
    #[error("pipeline has no gates")]
    NoGates,

    #[error("gate '{0}' has no stages")]
    EmptyGate(String),

    #[error("stage '{0}' has an empty command")]
    EmptyCommand(String),

    #[error("invalid health check policy: {0}")]
    InvalidPolicy(String),

    #[error("failed to parse pipeline definition: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
