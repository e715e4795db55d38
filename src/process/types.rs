/*!
 * Process Types
 * Handles, exit outcomes, stage specs, and process errors
 */

use crate::core::types::Role;
use crate::ipc::pipe::PipeError;
use miette::Diagnostic;
use nix::errno::Errno;
use nix::unistd::Pid;
use serde::{Deserialize, Serialize};
use std::ffi::CString;
use thiserror::Error;

/// Process operation result
pub type ProcessResult<T> = Result<T, ProcessError>;

/// Process errors
#[derive(Error, Debug, Diagnostic)]
pub enum ProcessError {
    #[error("Spawn failed: {0}")]
    #[diagnostic(
        code(process::spawn_failed),
        help("The system could not duplicate the process. Check process limits (`ulimit -u`).")
    )]
    SpawnFailed(#[source] Errno),

    #[error("Invalid ownership table: {0}")]
    #[diagnostic(
        code(process::invalid_ownership),
        help("Every live endpoint must be either kept or closed by the child, never both.")
    )]
    InvalidOwnership(String),

    #[error("Invalid command: {0}")]
    #[diagnostic(code(process::invalid_command))]
    InvalidCommand(String),

    #[error("Pipeline has no stages")]
    #[diagnostic(code(process::empty_pipeline))]
    EmptyPipeline,

    #[error("Invalid pipeline spec: {0}")]
    #[diagnostic(code(process::invalid_spec))]
    InvalidSpec(String),

    #[error("Pipe error: {0}")]
    #[diagnostic(transparent)]
    Pipe(#[from] PipeError),
}

/// Terminal state of a process as seen by the reaper
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "code", rename_all = "snake_case")]
pub enum ExitOutcome {
    Pending,
    Succeeded,
    Failed(i32),
}

impl ExitOutcome {
    #[inline]
    pub fn is_terminal(self) -> bool {
        !matches!(self, ExitOutcome::Pending)
    }

    /// Outcome for a plain exit status
    pub fn from_code(code: i32) -> Self {
        if code == 0 {
            ExitOutcome::Succeeded
        } else {
            ExitOutcome::Failed(code)
        }
    }
}

/// A spawned process
#[derive(Debug)]
pub struct ProcessHandle {
    pid: Pid,
    role: Role,
    outcome: ExitOutcome,
}

impl ProcessHandle {
    pub(crate) fn new(pid: Pid, role: Role) -> Self {
        Self {
            pid,
            role,
            outcome: ExitOutcome::Pending,
        }
    }

    #[inline]
    pub fn pid(&self) -> Pid {
        self.pid
    }

    #[inline]
    pub fn role(&self) -> Role {
        self.role
    }

    #[inline]
    pub fn outcome(&self) -> ExitOutcome {
        self.outcome
    }

    pub(crate) fn set_outcome(&mut self, outcome: ExitOutcome) {
        self.outcome = outcome;
    }
}

/// One external command in a pipeline
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct StageSpec {
    pub command: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,
}

impl StageSpec {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            args: vec![],
        }
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Program name and argv (argv[0] is the command itself)
    pub(crate) fn to_argv(&self) -> ProcessResult<(CString, Vec<CString>)> {
        if self.command.trim().is_empty() {
            return Err(ProcessError::InvalidCommand("Empty command".to_string()));
        }

        let to_cstring = |s: &str| {
            CString::new(s)
                .map_err(|_| ProcessError::InvalidCommand(format!("{:?} contains a NUL byte", s)))
        };

        let program = to_cstring(&self.command)?;
        let mut argv = Vec::with_capacity(self.args.len() + 1);
        argv.push(program.clone());
        for arg in &self.args {
            argv.push(to_cstring(arg)?);
        }
        Ok((program, argv))
    }
}

/// Ordered, non-empty list of stages
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct PipelineSpec {
    stages: Vec<StageSpec>,
}

impl PipelineSpec {
    pub fn new(stages: Vec<StageSpec>) -> ProcessResult<Self> {
        let spec = Self { stages };
        spec.validate()?;
        Ok(spec)
    }

    /// Reject an empty list or any stage that cannot become an argv
    ///
    /// Deserializing bypasses `new`, so the builder calls this again
    /// before the first fork.
    pub fn validate(&self) -> ProcessResult<()> {
        if self.stages.is_empty() {
            return Err(ProcessError::EmptyPipeline);
        }
        for stage in &self.stages {
            stage.to_argv()?;
        }
        Ok(())
    }

    /// Parse `{"stages": [{"command": "...", "args": [...]}, ...]}`
    pub fn from_json(json: &str) -> ProcessResult<Self> {
        let spec: Self =
            serde_json::from_str(json).map_err(|e| ProcessError::InvalidSpec(e.to_string()))?;
        Self::new(spec.stages)
    }

    pub fn stages(&self) -> &[StageSpec] {
        &self.stages
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }
}
