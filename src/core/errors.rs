/*!
 * Error Types
 * Top-level error folding the per-subsystem errors, with miette diagnostics
 */

use miette::Diagnostic;
use thiserror::Error;

pub use crate::exchange::ExchangeError;
pub use crate::ipc::pipe::PipeError;
pub use crate::process::ProcessError;

/// Unified orchestration error
#[derive(Error, Debug, Diagnostic)]
pub enum PipeworkError {
    #[error("Pipe error: {0}")]
    #[diagnostic(transparent)]
    Pipe(#[from] PipeError),

    #[error("Process error: {0}")]
    #[diagnostic(transparent)]
    Process(#[from] ProcessError),

    #[error("Exchange error: {0}")]
    #[diagnostic(transparent)]
    Exchange(#[from] ExchangeError),

    #[error("{0}")]
    #[diagnostic(
        code(pipework::usage),
        help("Run `pipework exchange`, `pipework scores <pattern>` or `pipework run <spec.json>`.")
    )]
    Usage(String),

    #[error("Cannot read pipeline spec {path}")]
    #[diagnostic(code(pipework::spec_file))]
    SpecFile {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Common result type for orchestration operations
pub type PipeworkResult<T> = Result<T, PipeworkError>;

impl PipeworkError {
    /// True when the failure is bad data rather than a broken channel
    pub fn is_oversize(&self) -> bool {
        match self {
            PipeworkError::Pipe(e) => e.is_oversize(),
            PipeworkError::Exchange(e) => e.is_oversize(),
            PipeworkError::Process(ProcessError::Pipe(e)) => e.is_oversize(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use miette::Diagnostic;

    #[test]
    fn test_oversize_is_recognised_through_every_layer() {
        let pipe = PipeError::oversize(5000);
        assert!(PipeworkError::from(ExchangeError::Pipe(pipe)).is_oversize());

        let nested = ProcessError::Pipe(PipeError::oversize(5000));
        assert!(PipeworkError::from(nested).is_oversize());

        let other = PipeworkError::from(ExchangeError::PeerClosed);
        assert!(!other.is_oversize());
    }

    #[test]
    fn test_diagnostics_pass_through_from_subsystems() {
        let err = PipeworkError::from(PipeError::oversize(5000));
        let code = err.code().map(|c| c.to_string());
        assert_eq!(code.as_deref(), Some("pipe::oversize_message"));
        assert!(err.help().is_some());

        let usage = PipeworkError::Usage("usage".to_string());
        assert_eq!(
            usage.code().map(|c| c.to_string()).as_deref(),
            Some("pipework::usage")
        );
    }
}
