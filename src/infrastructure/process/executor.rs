use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// One external-tool run, fully described.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
    pub current_dir: PathBuf,
    /// Variables removed from the inherited environment.
    pub env_remove: Vec<String>,
    pub timeout: Duration,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOutput {
    /// Exit code; `None` when the process was killed by a signal.
    pub status: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        self.status == Some(0)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ExecError {
    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("process timed out after {0:?}")]
    TimedOut(Duration),
    #[error("process cancelled")]
    Cancelled,
}

#[async_trait]
pub trait ProcessExecutor: Send + Sync {
    /// Run to completion, or until the timeout or `cancel` fires. A
    /// non-zero exit is not an error here; it is reported in the output.
    async fn execute(
        &self,
        invocation: &Invocation,
        cancel: &CancellationToken,
    ) -> Result<ProcessOutput, ExecError>;
}

/// Spawns real processes through tokio. The child is killed when the
/// timeout or cancellation drops its future.
#[derive(Debug, Clone, Default)]
pub struct TokioExecutor;

#[async_trait]
impl ProcessExecutor for TokioExecutor {
    async fn execute(
        &self,
        invocation: &Invocation,
        cancel: &CancellationToken,
    ) -> Result<ProcessOutput, ExecError> {
        let mut cmd = Command::new(&invocation.program);
        cmd.args(&invocation.args)
            .current_dir(&invocation.current_dir)
            .stdin(Stdio::null())
            .kill_on_drop(true);
        for key in &invocation.env_remove {
            cmd.env_remove(key);
        }

        debug!(program = %invocation.program, args = ?invocation.args, "Spawning process");

        let output = tokio::select! {
            _ = cancel.cancelled() => return Err(ExecError::Cancelled),
            res = tokio::time::timeout(invocation.timeout, cmd.output()) => match res {
                Ok(output) => output.map_err(|source| ExecError::Spawn {
                    program: invocation.program.clone(),
                    source,
                })?,
                Err(_) => return Err(ExecError::TimedOut(invocation.timeout)),
            },
        };

        Ok(ProcessOutput {
            status: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}
