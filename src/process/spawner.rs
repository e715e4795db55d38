/*!
 * Process Spawner
 * Forks a process, applies an ownership table on both sides of the fork,
 * and either execs an external command or runs a closure in the child
 */

use super::ownership::OwnershipTable;
use super::types::{ProcessError, ProcessHandle, ProcessResult, StageSpec};
use crate::core::limits::{EXEC_FAILED_STATUS, EXEC_NOT_FOUND_STATUS, PANIC_STATUS};
use crate::core::types::{Role, StdStream};
use crate::ipc::pipe::EndpointArena;
use nix::errno::Errno;
use nix::fcntl::{fcntl, FcntlArg};
use nix::sys::signal::{signal, SigHandler, Signal};
use nix::libc;
use nix::unistd::{close, dup2, execvp, fork, ForkResult};
use std::collections::BTreeMap;
use std::ffi::CString;
use std::fs::File;
use std::io::{BufReader, Write};
use std::os::fd::{OwnedFd, RawFd};
use std::panic::{self, AssertUnwindSafe};
use tracing::{debug, error, info};

/// Closure run in a forked child; its return value is the exit status
pub type ChildFn<'a> = Box<dyn FnOnce(BoundEndpoints) -> i32 + 'a>;

/// What the child does after the fork
pub enum ChildTask<'a> {
    /// Replace the process image with an external command
    Exec(StageSpec),
    /// Run orchestrator logic in the child, with the kept endpoints
    Run(ChildFn<'a>),
}

impl std::fmt::Debug for ChildTask<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChildTask::Exec(spec) => f.debug_tuple("Exec").field(spec).finish(),
            ChildTask::Run(_) => f.write_str("Run(..)"),
        }
    }
}

/// Endpoints a non-exec child kept, keyed by the stream they stand in for
#[derive(Debug, Default)]
pub struct BoundEndpoints {
    fds: BTreeMap<StdStream, OwnedFd>,
}

impl BoundEndpoints {
    pub fn take(&mut self, stream: StdStream) -> Option<OwnedFd> {
        self.fds.remove(&stream)
    }

    /// Kept stdin endpoint wrapped for buffered line reads
    pub fn reader(&mut self) -> Option<BufReader<File>> {
        self.take(StdStream::Stdin).map(|fd| BufReader::new(File::from(fd)))
    }

    /// Kept stdout endpoint as a writable file
    pub fn writer(&mut self) -> Option<File> {
        self.take(StdStream::Stdout).map(File::from)
    }

    pub fn len(&self) -> usize {
        self.fds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fds.is_empty()
    }
}

/// Everything the exec path needs, built before forking
struct PreparedExec {
    command: String,
    program: CString,
    argv: Vec<CString>,
}

enum PreparedTask<'a> {
    Exec(PreparedExec),
    Run(ChildFn<'a>),
}

/// Creates processes according to an [`OwnershipTable`]
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessSpawner;

impl ProcessSpawner {
    pub fn new() -> Self {
        Self
    }

    /// Fork a new process for `role`
    ///
    /// The table is validated against `arena` before anything is forked. In
    /// the child every endpoint in the close set is closed before any I/O,
    /// then the task runs and the child exits without returning. In the
    /// parent the table's parent-close set is applied and a pending handle
    /// is returned.
    pub fn spawn(
        &self,
        arena: &mut EndpointArena,
        role: Role,
        table: &OwnershipTable,
        task: ChildTask<'_>,
    ) -> ProcessResult<ProcessHandle> {
        table.validate(arena)?;

        // Allocate before forking; the child only closes, dups and execs.
        let bindings = table
            .child_keep()
            .map(|(stream, id)| Ok((stream, arena.raw_fd(id)?)))
            .collect::<ProcessResult<Vec<(StdStream, RawFd)>>>()?;
        let task = match task {
            ChildTask::Exec(spec) => {
                let (program, argv) = spec.to_argv()?;
                PreparedTask::Exec(PreparedExec {
                    command: spec.command,
                    program,
                    argv,
                })
            }
            ChildTask::Run(run) => PreparedTask::Run(run),
        };

        // Buffered bytes would otherwise be written twice.
        let _ = std::io::stdout().flush();

        // SAFETY: the child never returns into the caller; it runs the task
        // and leaves through `_exit`.
        match unsafe { fork() } {
            Ok(ForkResult::Parent { child }) => {
                for id in table.parent_close() {
                    arena.close(id)?;
                }
                info!(pid = child.as_raw(), role = %role, "spawned process");
                Ok(ProcessHandle::new(child, role))
            }
            Ok(ForkResult::Child) => {
                for id in table.child_close() {
                    let _ = arena.close(id);
                }
                let status = match task {
                    PreparedTask::Exec(prepared) => exec_stage(&prepared, &bindings),
                    PreparedTask::Run(run) => {
                        let mut bound = BoundEndpoints::default();
                        for (stream, id) in table.child_keep() {
                            if let Ok(fd) = arena.take(id) {
                                bound.fds.insert(stream, fd);
                            }
                        }
                        run_in_child(role, run, bound)
                    }
                };
                let _ = std::io::stdout().flush();
                // SAFETY: leaves without atexit handlers or unwinding into
                // state copied from the parent.
                unsafe { libc::_exit(status) }
            }
            Err(errno) => {
                error!(role = %role, error = %errno, "fork failed");
                Err(ProcessError::SpawnFailed(errno))
            }
        }
    }
}

fn run_in_child(role: Role, run: ChildFn<'_>, bound: BoundEndpoints) -> i32 {
    match panic::catch_unwind(AssertUnwindSafe(move || run(bound))) {
        Ok(status) => {
            debug!(role = %role, status, "child task finished");
            status
        }
        Err(_) => PANIC_STATUS,
    }
}

/// Lowest descriptor used while rebinding; above stdin, stdout and stderr
const STAGING_FD_FLOOR: RawFd = 3;

fn bind_failed(prepared: &PreparedExec, stream: StdStream, errno: Errno) -> i32 {
    eprintln!(
        "pipework: {}: cannot bind {}: {}",
        prepared.command, stream, errno
    );
    EXEC_FAILED_STATUS
}

/// Rebind kept endpoints onto stdin/stdout and exec; returns only on failure
fn exec_stage(prepared: &PreparedExec, bindings: &[(StdStream, RawFd)]) -> i32 {
    // The parent runtime ignores SIGPIPE; a stage should die on a closed
    // downstream the way it would under a shell.
    // SAFETY: restoring the default disposition installs no handler.
    unsafe {
        let _ = signal(Signal::SIGPIPE, SigHandler::SigDfl);
    }

    // Copy every kept endpoint above the standard streams first, so a
    // kept descriptor in 0..=2 cannot be overwritten by another rebind.
    let mut staged = Vec::with_capacity(bindings.len());
    for &(stream, fd) in bindings {
        match fcntl(fd, FcntlArg::F_DUPFD_CLOEXEC(STAGING_FD_FLOOR)) {
            Ok(temp) => staged.push((stream, temp)),
            Err(errno) => return bind_failed(prepared, stream, errno),
        }
    }
    // dup2 clears FD_CLOEXEC on the target
    for &(stream, temp) in &staged {
        if let Err(errno) = dup2(temp, stream.raw_fd()) {
            return bind_failed(prepared, stream, errno);
        }
    }

    let targets: Vec<RawFd> = bindings.iter().map(|(stream, _)| stream.raw_fd()).collect();
    for &(_, fd) in bindings {
        if !targets.contains(&fd) {
            let _ = close(fd);
        }
    }
    for (_, temp) in staged {
        let _ = close(temp);
    }

    let errno = match execvp(&prepared.program, &prepared.argv) {
        Ok(never) => match never {},
        Err(errno) => errno,
    };
    eprintln!("pipework: {}: {}", prepared.command, errno);
    match errno {
        Errno::ENOENT => EXEC_NOT_FOUND_STATUS,
        _ => EXEC_FAILED_STATUS,
    }
}
