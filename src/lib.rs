/*!
 * pipework
 * Process orchestration over anonymous pipes: a two-party line exchange
 * and shell-style linear pipelines
 */

pub mod config;
pub mod core;
pub mod exchange;
pub mod ipc;
pub mod monitoring;
pub mod pipeline;
pub mod process;

// Re-exports
pub use crate::core::{PipeworkError, PipeworkResult, Role, StdStream};
pub use config::OrchestratorConfig;
pub use exchange::{Concat, ExchangeError, ExchangeReport, Transform, TwoPartyExchange};
pub use ipc::{EndpointArena, Message, MessageReader, MessageWriter, PipeChannel, PipeError};
pub use monitoring::{init_tracing, OperationSpan};
pub use pipeline::{PipelineBuilder, PipelineReport, RunningPipeline};
pub use process::{
    CompletionReaper, ExitOutcome, OverallOutcome, OwnershipTable, PipelineSpec, ProcessError,
    ProcessHandle, ProcessSpawner, StageSpec,
};
