//! The `Invocable` collaborator boundary and its process-backed binding.

use std::process::Stdio;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::process::Command;

use crate::error::InvokeError;

/// Outcome of an action that ran to completion.
#[derive(Debug, Clone)]
pub struct Invocation {
    /// Exit code reported by the action (0 = success).
    pub exit_code: i32,

    /// Captured text output.
    pub output: String,
}

impl Invocation {
    /// Whether the action signaled success.
    pub fn succeeded(&self) -> bool {
        self.exit_code == 0
    }
}

/// An external action bound to a stage.
///
/// The orchestrator does not know what an action computes — only that it
/// yields an exit code and captured output, or an [`InvokeError`] when it
/// could not run at all.
#[async_trait]
pub trait Invocable: Send + Sync {
    async fn invoke(&self) -> Result<Invocation, InvokeError>;
}

/// An `Invocable` that spawns an external process.
///
/// stdout and stderr are captured and merged into the invocation output.
/// A spawn failure (missing executable) is an infrastructure error; running
/// past `timeout_secs` is a timeout. `timeout_secs = 0` disables the
/// deadline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandAction {
    /// Command to execute (first element is the executable).
    pub command: Vec<String>,

    /// Timeout in seconds (0 = no timeout).
    pub timeout_secs: u64,
}

impl CommandAction {
    pub fn new(command: Vec<String>, timeout_secs: u64) -> Self {
        Self {
            command,
            timeout_secs,
        }
    }
}

#[async_trait]
impl Invocable for CommandAction {
    async fn invoke(&self) -> Result<Invocation, InvokeError> {
        if self.command.is_empty() {
            return Err(InvokeError::Infrastructure("empty command".to_string()));
        }

        let exe = &self.command[0];
        let args = &self.command[1..];

        // kill_on_drop so a timed-out child does not outlive its stage.
        let child = Command::new(exe)
            .args(args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                InvokeError::Infrastructure(format!("failed to spawn '{}': {}", exe, e))
            })?;

        let output = if self.timeout_secs > 0 {
            tokio::time::timeout(
                std::time::Duration::from_secs(self.timeout_secs),
                child.wait_with_output(),
            )
            .await
            .map_err(|_| InvokeError::Timeout(self.timeout_secs * 1000))?
            .map_err(|e| InvokeError::Infrastructure(format!("failed to collect output: {}", e)))?
        } else {
            child.wait_with_output().await.map_err(|e| {
                InvokeError::Infrastructure(format!("failed to collect output: {}", e))
            })?
        };

        let exit_code = output.status.code().unwrap_or(-1);
        let mut text = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr);
        if !stderr.is_empty() {
            if !text.is_empty() {
                text.push('\n');
            }
            text.push_str(&stderr);
        }

        Ok(Invocation {
            exit_code,
            output: text,
        })
    }
}
