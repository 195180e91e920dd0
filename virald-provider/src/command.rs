//! Subprocess execution for external tools.

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use crate::error::{ProviderError, Result};

/// Captured result of a finished subprocess.
#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    /// Exit code, `None` when killed by a signal
    pub status_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.status_code == Some(0)
    }

    /// Return stdout, or an `ExternalTool` error carrying stderr on non-zero exit.
    pub fn into_stdout(self, context: &str) -> Result<String> {
        if self.success() {
            Ok(self.stdout)
        } else {
            Err(ProviderError::ExternalTool(format!(
                "{} (exit {:?}): {}",
                context,
                self.status_code,
                self.stderr.trim()
            )))
        }
    }
}

/// Runs external programs on behalf of a provider.
///
/// No timeout is imposed; a hung tool blocks the caller until it exits.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, program: &str, args: &[String]) -> Result<CommandOutput>;
}

/// Runs programs as real child processes.
#[derive(Debug, Default, Clone)]
pub struct SystemCommandRunner;

#[async_trait]
impl CommandRunner for SystemCommandRunner {
    async fn run(&self, program: &str, args: &[String]) -> Result<CommandOutput> {
        debug!(program = %program, args = ?args, "Running command");

        let output = Command::new(program)
            .args(args)
            .output()
            .await
            .map_err(|e| ProviderError::ExternalTool(format!("Failed to execute {}: {}", program, e)))?;

        Ok(CommandOutput {
            status_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        })
    }
}

/// Build an owned argument vector from string slices.
pub(crate) fn args<I, S>(items: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    items.into_iter().map(Into::into).collect()
}

#[cfg(test)]
pub(crate) mod testing {
    //! Scripted command runner for backend tests.

    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Replays canned outputs in order and records every invocation.
    #[derive(Default)]
    pub struct ScriptedRunner {
        responses: Mutex<VecDeque<Result<CommandOutput>>>,
        calls: Mutex<Vec<(String, Vec<String>)>>,
    }

    impl ScriptedRunner {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn ok(self, stdout: &str) -> Self {
            self.push(Ok(CommandOutput {
                status_code: Some(0),
                stdout: stdout.to_string(),
                stderr: String::new(),
            }))
        }

        pub fn fail(self, code: i32, stderr: &str) -> Self {
            self.push(Ok(CommandOutput {
                status_code: Some(code),
                stdout: String::new(),
                stderr: stderr.to_string(),
            }))
        }

        pub fn spawn_error(self, message: &str) -> Self {
            self.push(Err(ProviderError::ExternalTool(message.to_string())))
        }

        pub fn push(self, response: Result<CommandOutput>) -> Self {
            self.responses.lock().unwrap().push_back(response);
            self
        }

        pub fn calls(&self) -> Vec<(String, Vec<String>)> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl CommandRunner for ScriptedRunner {
        async fn run(&self, program: &str, args: &[String]) -> Result<CommandOutput> {
            self.calls
                .lock()
                .unwrap()
                .push((program.to_string(), args.to_vec()));
            // Unscripted calls succeed with empty output
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(CommandOutput {
                    status_code: Some(0),
                    ..Default::default()
                }))
        }
    }
}
