/*!
 * IPC Module
 * Pipes between processes and line framing on top of them
 */

pub mod message;
pub mod pipe;

pub use message::{read_line, Message, MessageReader, MessageWriter};
pub use pipe::{
    ChannelIds, Endpoint, EndpointArena, EndpointId, EndpointKind, PipeChannel, PipeError,
    PipeResult,
};
