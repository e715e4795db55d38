/*!
 * Pipeline Builder
 *
 * Chains K external commands with K-1 pipes, `stage[0] | stage[1] | ...`.
 * Channel i sits between stage i and stage i+1. Each stage keeps only its
 * adjacent ends and closes every other endpoint in the arena, so the last
 * writer of every pipe exits with its stage and downstream readers see
 * end-of-stream.
 */

use crate::core::types::{Role, StdStream};
use crate::ipc::pipe::{ChannelIds, EndpointArena, EndpointId, EndpointKind};
use crate::process::{
    ChildTask, CompletionReaper, OverallOutcome, OwnershipTable, PipelineSpec, ProcessHandle,
    ProcessResult, ProcessSpawner,
};
use std::os::fd::OwnedFd;
use tracing::{error, info, info_span};

/// Result of a finished pipeline
#[derive(Debug)]
pub struct PipelineReport {
    pub outcome: OverallOutcome,
    /// Reaped handles, in stage order
    pub handles: Vec<ProcessHandle>,
}

/// Stages that are running and not yet reaped
#[derive(Debug)]
pub struct RunningPipeline {
    handles: Vec<ProcessHandle>,
}

impl RunningPipeline {
    pub fn handles(&self) -> &[ProcessHandle] {
        &self.handles
    }

    /// Reap every stage in declared order
    pub fn wait(mut self) -> PipelineReport {
        let outcome = CompletionReaper::reap_all(&mut self.handles);
        info!(stages = self.handles.len(), %outcome, "pipeline finished");
        PipelineReport {
            outcome,
            handles: self.handles,
        }
    }
}

#[derive(Debug)]
pub struct PipelineBuilder {
    spec: PipelineSpec,
    source: Option<OwnedFd>,
    sink: Option<OwnedFd>,
    spawner: ProcessSpawner,
}

impl PipelineBuilder {
    /// First stdin and last stdout default to the orchestrator's own streams
    pub fn new(spec: PipelineSpec) -> Self {
        Self {
            spec,
            source: None,
            sink: None,
            spawner: ProcessSpawner::new(),
        }
    }

    /// Feed the first stage from `fd` instead of the inherited stdin
    #[must_use]
    pub fn stdin_from(mut self, fd: impl Into<OwnedFd>) -> Self {
        self.source = Some(fd.into());
        self
    }

    /// Send the last stage's output to `fd` instead of the inherited stdout
    #[must_use]
    pub fn stdout_to(mut self, fd: impl Into<OwnedFd>) -> Self {
        self.sink = Some(fd.into());
        self
    }

    /// Wire and start every stage
    ///
    /// When this returns the orchestrator holds no pipe endpoint. Invalid
    /// stages are rejected before anything is forked. If a fork fails
    /// midway, the endpoints are closed and the stages already started are
    /// reaped before the error is returned.
    pub fn spawn(self) -> ProcessResult<RunningPipeline> {
        // Nothing is forked unless every stage is valid
        self.spec.validate()?;
        let stages = self.spec.len();
        let span = info_span!("pipeline", stages);
        let _entered = span.enter();

        let mut arena = EndpointArena::new();
        let channels = arena.create_channels(stages - 1)?;
        let source = self
            .source
            .map(|fd| arena.adopt(EndpointKind::Read, fd));
        let sink = self.sink.map(|fd| arena.adopt(EndpointKind::Write, fd));

        let mut handles = Vec::with_capacity(stages);
        for (index, stage) in self.spec.stages().iter().enumerate() {
            let table = stage_table(&arena, &channels, index, source, sink);
            let task = ChildTask::Exec(stage.clone());
            match self
                .spawner
                .spawn(&mut arena, Role::Stage(index), &table, task)
            {
                Ok(handle) => {
                    info!(
                        stage = index,
                        command = %stage.command,
                        pid = handle.pid().as_raw(),
                        "stage started"
                    );
                    handles.push(handle);
                }
                Err(e) => {
                    error!(stage = index, command = %stage.command, error = %e, "stage spawn failed");
                    arena.close_all();
                    CompletionReaper::reap_all(&mut handles);
                    return Err(e);
                }
            }
        }

        arena.close_all();
        Ok(RunningPipeline { handles })
    }

    /// Spawn and wait
    pub fn run(self) -> ProcessResult<PipelineReport> {
        Ok(self.spawn()?.wait())
    }
}

/// Ownership table for stage `index`
///
/// Keeps `channels[index - 1].read` on stdin and `channels[index].write` on
/// stdout (or the source/sink at the ends), closes everything else live in
/// the arena in the child, and hands the kept ends over in the parent since
/// no later stage uses them.
fn stage_table(
    arena: &EndpointArena,
    channels: &[ChannelIds],
    index: usize,
    source: Option<EndpointId>,
    sink: Option<EndpointId>,
) -> OwnershipTable {
    let input = match index {
        0 => source,
        _ => Some(channels[index - 1].read),
    };
    let output = if index < channels.len() {
        Some(channels[index].write)
    } else {
        sink
    };

    let mut table = OwnershipTable::new();
    if let Some(id) = input {
        table = table.keep(StdStream::Stdin, id);
    }
    if let Some(id) = output {
        table = table.keep(StdStream::Stdout, id);
    }
    table.close_rest_in_child(arena).hand_over_kept()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_tables_keep_only_adjacent_ends() {
        let mut arena = EndpointArena::new();
        let channels = arena.create_channels(2).unwrap();

        let first = stage_table(&arena, &channels, 0, None, None);
        let kept: Vec<_> = first.child_keep().collect();
        assert_eq!(kept, vec![(StdStream::Stdout, channels[0].write)]);
        let closed: Vec<_> = first.child_close().collect();
        assert_eq!(
            closed,
            vec![channels[0].read, channels[1].read, channels[1].write]
        );
        assert!(first.validate(&arena).is_ok());

        let middle = stage_table(&arena, &channels, 1, None, None);
        let kept: Vec<_> = middle.child_keep().collect();
        assert_eq!(
            kept,
            vec![
                (StdStream::Stdin, channels[0].read),
                (StdStream::Stdout, channels[1].write)
            ]
        );
        // Non-adjacent write end of channel 0 is closed too
        assert!(middle.child_close().any(|id| id == channels[0].write));

        let last = stage_table(&arena, &channels, 2, None, None);
        let kept: Vec<_> = last.child_keep().collect();
        assert_eq!(kept, vec![(StdStream::Stdin, channels[1].read)]);
    }

    #[test]
    fn test_single_stage_uses_source_and_sink() {
        let mut arena = EndpointArena::new();
        let outer = arena.create_channel().unwrap();
        let table = stage_table(&arena, &[], 0, Some(outer.read), Some(outer.write));
        let kept: Vec<_> = table.child_keep().collect();
        assert_eq!(
            kept,
            vec![
                (StdStream::Stdin, outer.read),
                (StdStream::Stdout, outer.write)
            ]
        );
        assert_eq!(table.child_close().count(), 0);
        assert_eq!(table.parent_close().count(), 2);
    }

    #[test]
    fn test_sink_only_bound_to_last_stage() {
        let mut arena = EndpointArena::new();
        let channels = arena.create_channels(1).unwrap();
        let sink = arena.create_channel().unwrap().write;

        let first = stage_table(&arena, &channels, 0, None, Some(sink));
        assert!(!first.keeps(sink));
        assert!(first.child_close().any(|id| id == sink));

        let last = stage_table(&arena, &channels, 1, None, Some(sink));
        assert!(last.keeps(sink));
    }
}
