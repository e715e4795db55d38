/*!
 * Completion Reaper
 * Waits for spawned processes and reduces their exit statuses to one outcome
 */

use super::types::{ExitOutcome, ProcessHandle};
use crate::core::limits::{EXIT_FAILURE, REAP_FAILURE_STATUS, SIGNAL_STATUS_BASE};
use crate::core::types::Role;
use nix::errno::Errno;
use nix::sys::wait::{waitpid, WaitStatus};
use nix::unistd::Pid;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{error, info, warn};

/// Aggregate result of a set of processes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum OverallOutcome {
    AllSucceeded,
    /// First failing handle in declared order
    Degraded { role: Role, code: i32 },
}

impl OverallOutcome {
    #[inline]
    pub fn is_success(&self) -> bool {
        matches!(self, OverallOutcome::AllSucceeded)
    }

    /// Status for the orchestrator's own exit
    pub fn exit_code(&self) -> i32 {
        match *self {
            OverallOutcome::AllSucceeded => 0,
            OverallOutcome::Degraded { code, .. } if (1..=255).contains(&code) => code,
            OverallOutcome::Degraded { .. } => EXIT_FAILURE,
        }
    }
}

impl fmt::Display for OverallOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OverallOutcome::AllSucceeded => f.write_str("all processes succeeded"),
            OverallOutcome::Degraded { role, code } => {
                write!(f, "{} failed with status {}", role, code)
            }
        }
    }
}

/// Blocking reaper for [`ProcessHandle`]s
#[derive(Debug, Default, Clone, Copy)]
pub struct CompletionReaper;

impl CompletionReaper {
    /// Block until `handle` terminates and record its outcome
    ///
    /// An already-reaped handle is returned as is. A failed wait is logged
    /// and recorded as `Failed(-1)` so that it still counts against the
    /// overall outcome.
    pub fn reap(handle: &mut ProcessHandle) -> ExitOutcome {
        if handle.outcome().is_terminal() {
            return handle.outcome();
        }

        let outcome = match wait_terminal(handle.pid()) {
            Ok(status) => outcome_of(status),
            Err(errno) => {
                error!(
                    pid = handle.pid().as_raw(),
                    role = %handle.role(),
                    error = %errno,
                    "wait failed"
                );
                ExitOutcome::Failed(REAP_FAILURE_STATUS)
            }
        };

        match outcome {
            ExitOutcome::Failed(code) => warn!(
                pid = handle.pid().as_raw(),
                role = %handle.role(),
                code,
                "process failed"
            ),
            _ => info!(pid = handle.pid().as_raw(), role = %handle.role(), "process exited"),
        }

        handle.set_outcome(outcome);
        outcome
    }

    /// Reap every handle in order and reduce to one outcome
    pub fn reap_all(handles: &mut [ProcessHandle]) -> OverallOutcome {
        for handle in handles.iter_mut() {
            Self::reap(handle);
        }
        Self::summarize(handles)
    }

    /// Reduce already-recorded outcomes; pending handles count as failures
    pub fn summarize(handles: &[ProcessHandle]) -> OverallOutcome {
        handles
            .iter()
            .find_map(|handle| match handle.outcome() {
                ExitOutcome::Succeeded => None,
                ExitOutcome::Failed(code) => Some(OverallOutcome::Degraded {
                    role: handle.role(),
                    code,
                }),
                ExitOutcome::Pending => Some(OverallOutcome::Degraded {
                    role: handle.role(),
                    code: REAP_FAILURE_STATUS,
                }),
            })
            .unwrap_or(OverallOutcome::AllSucceeded)
    }
}

fn wait_terminal(pid: Pid) -> Result<WaitStatus, Errno> {
    loop {
        match waitpid(pid, None) {
            Ok(status @ (WaitStatus::Exited(..) | WaitStatus::Signaled(..))) => return Ok(status),
            Ok(_) | Err(Errno::EINTR) => continue,
            Err(errno) => return Err(errno),
        }
    }
}

fn outcome_of(status: WaitStatus) -> ExitOutcome {
    match status {
        WaitStatus::Exited(_, code) => ExitOutcome::from_code(code),
        WaitStatus::Signaled(_, signal, _) => ExitOutcome::Failed(SIGNAL_STATUS_BASE + signal as i32),
        _ => ExitOutcome::Failed(REAP_FAILURE_STATUS),
    }
}
