/*!
 * Endpoint Arena
 * Indexed table of every endpoint the orchestrator holds
 */

use super::channel::{Endpoint, PipeChannel};
use super::types::{EndpointId, EndpointKind, PipeError, PipeResult};
use std::os::fd::{OwnedFd, RawFd};
use tracing::debug;

/// Endpoint ids of one channel stored in an arena
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelIds {
    pub read: EndpointId,
    pub write: EndpointId,
}

/// Arena of endpoints addressed by [`EndpointId`]
///
/// Slots are never reused, so an id stays meaningful after its endpoint is
/// closed. Dropping the arena closes whatever is still open.
#[derive(Debug, Default)]
pub struct EndpointArena {
    slots: Vec<Endpoint>,
}

impl EndpointArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store an endpoint and return its id
    pub fn insert(&mut self, endpoint: Endpoint) -> EndpointId {
        let id = EndpointId(self.slots.len());
        self.slots.push(endpoint);
        id
    }

    /// Store an external descriptor
    pub fn adopt(&mut self, kind: EndpointKind, fd: impl Into<OwnedFd>) -> EndpointId {
        self.insert(Endpoint::adopt(kind, fd))
    }

    pub fn insert_channel(&mut self, channel: PipeChannel) -> ChannelIds {
        let (read_end, write_end) = channel.into_parts();
        ChannelIds {
            read: self.insert(read_end),
            write: self.insert(write_end),
        }
    }

    /// Allocate a pipe directly into the arena
    pub fn create_channel(&mut self) -> PipeResult<ChannelIds> {
        Ok(self.insert_channel(PipeChannel::create()?))
    }

    /// Allocate `count` pipes, one per adjacent stage pair
    ///
    /// On failure the pipes created so far stay in the arena and are closed
    /// with it.
    pub fn create_channels(&mut self, count: usize) -> PipeResult<Vec<ChannelIds>> {
        (0..count).map(|_| self.create_channel()).collect()
    }

    fn slot(&self, id: EndpointId) -> PipeResult<&Endpoint> {
        self.slots.get(id.0).ok_or(PipeError::NotFound(id))
    }

    fn slot_mut(&mut self, id: EndpointId) -> PipeResult<&mut Endpoint> {
        self.slots.get_mut(id.0).ok_or(PipeError::NotFound(id))
    }

    pub fn kind(&self, id: EndpointId) -> PipeResult<EndpointKind> {
        Ok(self.slot(id)?.kind())
    }

    /// True if the id exists and its endpoint is still open
    pub fn is_open(&self, id: EndpointId) -> bool {
        self.slot(id).map(Endpoint::is_open).unwrap_or(false)
    }

    pub fn raw_fd(&self, id: EndpointId) -> PipeResult<RawFd> {
        self.slot(id)?.raw_fd().ok_or(PipeError::Closed(id))
    }

    /// Ids of every endpoint still open
    pub fn live_ids(&self) -> impl Iterator<Item = EndpointId> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, endpoint)| endpoint.is_open())
            .map(|(index, _)| EndpointId(index))
    }

    pub fn live_count(&self) -> usize {
        self.live_ids().count()
    }

    /// Close one endpoint; closing twice is a no-op that returns `false`
    pub fn close(&mut self, id: EndpointId) -> PipeResult<bool> {
        Ok(self.slot_mut(id)?.close())
    }

    /// Close every endpoint still open
    pub fn close_all(&mut self) {
        let closed = self
            .slots
            .iter_mut()
            .map(Endpoint::close)
            .filter(|closed| *closed)
            .count();
        if closed > 0 {
            debug!(closed, "closed remaining endpoints");
        }
    }

    /// Move a descriptor out of the arena for direct use
    pub fn take(&mut self, id: EndpointId) -> PipeResult<OwnedFd> {
        self.slot_mut(id)?.take_fd().ok_or(PipeError::Closed(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::{Read, Write};

    #[test]
    fn test_channels_are_indexed_in_order() {
        let mut arena = EndpointArena::new();
        let channels = arena.create_channels(3).unwrap();
        assert_eq!(channels.len(), 3);
        assert_eq!(channels[0].read, EndpointId(0));
        assert_eq!(channels[2].write, EndpointId(5));
        assert_eq!(arena.live_count(), 6);
        assert_eq!(arena.kind(channels[1].read).unwrap(), EndpointKind::Read);
    }

    #[test]
    fn test_close_twice_leaves_siblings_intact() {
        let mut arena = EndpointArena::new();
        let a = arena.create_channel().unwrap();
        let b = arena.create_channel().unwrap();

        assert!(arena.close(a.read).unwrap());
        assert!(!arena.close(a.read).unwrap());

        assert!(arena.is_open(a.write));
        assert!(arena.is_open(b.read));
        assert!(arena.is_open(b.write));

        let mut writer = File::from(arena.take(b.write).unwrap());
        writer.write_all(b"still fine").unwrap();
        drop(writer);
        let mut reader = File::from(arena.take(b.read).unwrap());
        let mut out = String::new();
        reader.read_to_string(&mut out).unwrap();
        assert_eq!(out, "still fine");
    }

    #[test]
    fn test_take_closed_endpoint_fails() {
        let mut arena = EndpointArena::new();
        let ids = arena.create_channel().unwrap();
        arena.take(ids.read).unwrap();
        assert!(matches!(arena.take(ids.read), Err(PipeError::Closed(_))));
        assert!(matches!(
            arena.close(EndpointId(42)),
            Err(PipeError::NotFound(EndpointId(42)))
        ));
    }

    #[test]
    fn test_close_all() {
        let mut arena = EndpointArena::new();
        let channels = arena.create_channels(2).unwrap();
        arena.close(channels[0].read).unwrap();

        arena.close_all();
        assert_eq!(arena.live_count(), 0);
        for ids in &channels {
            assert!(!arena.close(ids.read).unwrap());
            assert!(!arena.close(ids.write).unwrap());
        }
        // Nothing left to close
        arena.close_all();
    }
}
