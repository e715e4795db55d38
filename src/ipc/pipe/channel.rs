/*!
 * Pipe Channel
 * One kernel pipe exposed as a read endpoint and a write endpoint
 */

use super::types::{EndpointKind, PipeError, PipeResult};
use nix::fcntl::OFlag;
use nix::unistd::pipe2;
use std::fs::File;
use std::os::fd::{AsRawFd, OwnedFd, RawFd};
use tracing::{debug, error};

/// One end of a pipe (or an adopted external descriptor)
///
/// Closing is idempotent: a closed endpoint simply holds no descriptor, and
/// closing it again neither fails nor touches any other endpoint.
#[derive(Debug)]
pub struct Endpoint {
    kind: EndpointKind,
    fd: Option<OwnedFd>,
}

impl Endpoint {
    /// Wrap an owned descriptor
    pub fn adopt(kind: EndpointKind, fd: impl Into<OwnedFd>) -> Self {
        Self {
            kind,
            fd: Some(fd.into()),
        }
    }

    #[inline]
    pub fn kind(&self) -> EndpointKind {
        self.kind
    }

    #[inline]
    pub fn is_open(&self) -> bool {
        self.fd.is_some()
    }

    /// Raw descriptor number while open
    pub fn raw_fd(&self) -> Option<RawFd> {
        self.fd.as_ref().map(|fd| fd.as_raw_fd())
    }

    /// Close the endpoint, returning whether it was still open
    pub fn close(&mut self) -> bool {
        match self.fd.take() {
            Some(fd) => {
                debug!(fd = fd.as_raw_fd(), kind = %self.kind, "closing endpoint");
                drop(fd);
                true
            }
            None => false,
        }
    }

    /// Move the descriptor out, leaving the endpoint closed
    pub fn take_fd(&mut self) -> Option<OwnedFd> {
        self.fd.take()
    }

    /// Consume the endpoint as a `File` for byte I/O
    pub fn into_file(mut self) -> Option<File> {
        self.fd.take().map(File::from)
    }
}

/// A unidirectional pipe
#[derive(Debug)]
pub struct PipeChannel {
    pub read_end: Endpoint,
    pub write_end: Endpoint,
}

impl PipeChannel {
    /// Allocate a new pipe
    ///
    /// Both descriptors are close-on-exec, so an exec'd process only ever
    /// inherits the descriptors explicitly rebound onto its standard streams.
    pub fn create() -> PipeResult<Self> {
        let (read_fd, write_fd) = pipe2(OFlag::O_CLOEXEC).map_err(|errno| {
            error!(error = %errno, "pipe allocation failed");
            PipeError::Resource(errno)
        })?;

        debug!(
            read_fd = read_fd.as_raw_fd(),
            write_fd = write_fd.as_raw_fd(),
            "pipe created"
        );

        Ok(Self {
            read_end: Endpoint::adopt(EndpointKind::Read, read_fd),
            write_end: Endpoint::adopt(EndpointKind::Write, write_fd),
        })
    }

    /// Split into `(read_end, write_end)`
    pub fn into_parts(self) -> (Endpoint, Endpoint) {
        (self.read_end, self.write_end)
    }
}
