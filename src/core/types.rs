/*!
 * Core Types
 * Common types shared by the spawner, the exchange, and the pipeline
 */

use serde::{Deserialize, Serialize};
use std::fmt;
use std::os::fd::RawFd;

/// Standard stream an endpoint can be bound to in a child process
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StdStream {
    Stdin,
    Stdout,
}

impl StdStream {
    /// Descriptor number the stream occupies after a rebind
    #[inline]
    pub fn raw_fd(self) -> RawFd {
        match self {
            StdStream::Stdin => 0,
            StdStream::Stdout => 1,
        }
    }
}

impl fmt::Display for StdStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StdStream::Stdin => f.write_str("stdin"),
            StdStream::Stdout => f.write_str("stdout"),
        }
    }
}

/// Logical identity of a process, independent of its OS pid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "index", rename_all = "snake_case")]
pub enum Role {
    Coordinator,
    Worker,
    Stage(usize),
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Coordinator => f.write_str("coordinator"),
            Role::Worker => f.write_str("worker"),
            Role::Stage(index) => write!(f, "stage {}", index),
        }
    }
}
