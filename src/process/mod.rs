/*!
 * Process Module
 * Spawning with explicit endpoint ownership, and reaping
 */

pub mod ownership;
pub mod reaper;
pub mod spawner;
pub mod types;

// Re-export for convenience
pub use ownership::OwnershipTable;
pub use reaper::{CompletionReaper, OverallOutcome};
pub use spawner::{BoundEndpoints, ChildFn, ChildTask, ProcessSpawner};
pub use types::{
    ExitOutcome, PipelineSpec, ProcessError, ProcessHandle, ProcessResult, StageSpec,
};
