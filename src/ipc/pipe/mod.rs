/*!
 * Pipe Module
 * Anonymous OS pipes and the arena that tracks their endpoints
 */

pub mod arena;
pub mod channel;
pub mod types;

// Re-export public API
pub use arena::{ChannelIds, EndpointArena};
pub use channel::{Endpoint, PipeChannel};
pub use types::{EndpointId, EndpointKind, PipeError, PipeResult};
