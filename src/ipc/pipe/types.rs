/*!
 * Pipe Types
 * Endpoint identifiers and pipe errors
 */

use crate::core::limits::MAX_MESSAGE_CONTENT;
use miette::Diagnostic;
use nix::errno::Errno;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Pipe operation result
pub type PipeResult<T> = Result<T, PipeError>;

/// Index of an endpoint inside an [`EndpointArena`](super::EndpointArena)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EndpointId(pub usize);

impl fmt::Display for EndpointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ep{}", self.0)
    }
}

/// Direction of an endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndpointKind {
    Read,
    Write,
}

impl fmt::Display for EndpointKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EndpointKind::Read => f.write_str("read"),
            EndpointKind::Write => f.write_str("write"),
        }
    }
}

/// Pipe error types
#[derive(Debug, Error, Diagnostic)]
pub enum PipeError {
    #[error("Failed to allocate pipe: {0}")]
    #[diagnostic(
        code(pipe::resource),
        help("The process may have run out of file descriptors. Check `ulimit -n`.")
    )]
    Resource(#[source] Errno),

    #[error("Endpoint not found: {0}")]
    #[diagnostic(code(pipe::not_found))]
    NotFound(EndpointId),

    #[error("Endpoint already closed: {0}")]
    #[diagnostic(code(pipe::closed))]
    Closed(EndpointId),

    #[error("Message too long: {len} bytes (max {max})")]
    #[diagnostic(
        code(pipe::oversize_message),
        help("Records are limited to 4095 content bytes plus the newline terminator.")
    )]
    OversizeMessage { len: usize, max: usize },

    #[error("Message content contains a newline")]
    #[diagnostic(code(pipe::embedded_newline))]
    EmbeddedNewline,

    #[error("Message is not valid UTF-8")]
    #[diagnostic(code(pipe::invalid_utf8))]
    InvalidUtf8,

    #[error("I/O error: {0}")]
    #[diagnostic(code(pipe::io))]
    Io(#[from] std::io::Error),
}

impl PipeError {
    pub(crate) fn oversize(len: usize) -> Self {
        PipeError::OversizeMessage {
            len,
            max: MAX_MESSAGE_CONTENT,
        }
    }

    /// True for the bad-data case, as opposed to a broken channel
    pub fn is_oversize(&self) -> bool {
        matches!(self, PipeError::OversizeMessage { .. })
    }
}
