/*!
 * Ownership Transfer Table
 *
 * At each spawn point, lists exactly which endpoints the new process keeps
 * (and on which standard stream), which it closes, and which the parent
 * closes once the child exists. Nothing is inherited implicitly: a table
 * that leaves a live endpoint unaccounted for in the child is rejected,
 * because a stray write end anywhere in the process tree keeps the reader
 * from ever seeing end-of-stream.
 */

use super::types::{ProcessError, ProcessResult};
use crate::core::types::StdStream;
use crate::ipc::pipe::{EndpointArena, EndpointId};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OwnershipTable {
    child_keep: BTreeMap<StdStream, EndpointId>,
    child_close: BTreeSet<EndpointId>,
    parent_close: BTreeSet<EndpointId>,
}

impl OwnershipTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Child keeps `id`, bound to `stream`
    #[must_use]
    pub fn keep(mut self, stream: StdStream, id: EndpointId) -> Self {
        self.child_keep.insert(stream, id);
        self
    }

    #[must_use]
    pub fn close_in_child(mut self, id: EndpointId) -> Self {
        self.child_close.insert(id);
        self
    }

    #[must_use]
    pub fn close_in_parent(mut self, id: EndpointId) -> Self {
        self.parent_close.insert(id);
        self
    }

    /// Child closes every live endpoint it does not keep
    #[must_use]
    pub fn close_rest_in_child(mut self, arena: &EndpointArena) -> Self {
        let kept: BTreeSet<EndpointId> = self.child_keep.values().copied().collect();
        self.child_close
            .extend(arena.live_ids().filter(|id| !kept.contains(id)));
        self
    }

    /// Parent closes everything the child keeps
    #[must_use]
    pub fn hand_over_kept(mut self) -> Self {
        self.parent_close.extend(self.child_keep.values().copied());
        self
    }

    pub fn child_keep(&self) -> impl Iterator<Item = (StdStream, EndpointId)> + '_ {
        self.child_keep.iter().map(|(stream, id)| (*stream, *id))
    }

    pub fn child_close(&self) -> impl Iterator<Item = EndpointId> + '_ {
        self.child_close.iter().copied()
    }

    pub fn parent_close(&self) -> impl Iterator<Item = EndpointId> + '_ {
        self.parent_close.iter().copied()
    }

    pub fn keeps(&self, id: EndpointId) -> bool {
        self.child_keep.values().any(|kept| *kept == id)
    }

    /// Check the table against the endpoints live in `arena`
    pub fn validate(&self, arena: &EndpointArena) -> ProcessResult<()> {
        let mut kept = BTreeSet::new();
        for (stream, id) in self.child_keep() {
            if !arena.is_open(id) {
                return Err(ProcessError::InvalidOwnership(format!(
                    "{} kept on {} is not open",
                    id, stream
                )));
            }
            if !kept.insert(id) {
                return Err(ProcessError::InvalidOwnership(format!(
                    "{} is bound to more than one stream",
                    id
                )));
            }
        }

        if let Some(id) = self.child_close.intersection(&kept).next() {
            return Err(ProcessError::InvalidOwnership(format!(
                "{} is both kept and closed in the child",
                id
            )));
        }

        if let Some(id) = arena
            .live_ids()
            .find(|id| !kept.contains(id) && !self.child_close.contains(id))
        {
            return Err(ProcessError::InvalidOwnership(format!(
                "{} would leak into the child",
                id
            )));
        }

        if let Some(id) = self.parent_close().find(|id| !arena.is_open(*id)) {
            return Err(ProcessError::InvalidOwnership(format!(
                "parent closes {} which is not open",
                id
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_channels() -> (EndpointArena, crate::ipc::ChannelIds, crate::ipc::ChannelIds) {
        let mut arena = EndpointArena::new();
        let a = arena.create_channel().unwrap();
        let b = arena.create_channel().unwrap();
        (arena, a, b)
    }

    #[test]
    fn test_complete_table_validates() {
        let (arena, a, b) = two_channels();
        let table = OwnershipTable::new()
            .keep(StdStream::Stdin, a.read)
            .keep(StdStream::Stdout, b.write)
            .close_rest_in_child(&arena)
            .hand_over_kept();

        assert!(table.validate(&arena).is_ok());
        let closed: Vec<_> = table.child_close().collect();
        assert_eq!(closed, vec![a.write, b.read]);
        assert!(table.keeps(a.read));
        assert!(!table.keeps(a.write));
    }

    #[test]
    fn test_uncovered_endpoint_rejected() {
        let (arena, a, b) = two_channels();
        let table = OwnershipTable::new()
            .keep(StdStream::Stdin, a.read)
            .close_in_child(a.write)
            .close_in_child(b.read);
        // b.write is neither kept nor closed
        let err = table.validate(&arena).unwrap_err();
        assert!(err.to_string().contains("leak"));
    }

    #[test]
    fn test_overlap_rejected() {
        let (arena, a, _b) = two_channels();
        let table = OwnershipTable::new()
            .keep(StdStream::Stdin, a.read)
            .close_rest_in_child(&arena)
            .close_in_child(a.read);
        assert!(matches!(
            table.validate(&arena),
            Err(ProcessError::InvalidOwnership(_))
        ));
    }

    #[test]
    fn test_same_endpoint_on_two_streams_rejected() {
        let (arena, a, _b) = two_channels();
        let table = OwnershipTable::new()
            .keep(StdStream::Stdin, a.read)
            .keep(StdStream::Stdout, a.read)
            .close_rest_in_child(&arena);
        assert!(table.validate(&arena).is_err());
    }

    #[test]
    fn test_closed_endpoints_are_not_required() {
        let (mut arena, a, b) = two_channels();
        arena.close(b.read).unwrap();
        arena.close(b.write).unwrap();
        let table = OwnershipTable::new()
            .keep(StdStream::Stdout, a.write)
            .close_rest_in_child(&arena);
        assert!(table.validate(&arena).is_ok());

        let bad = table.close_in_parent(b.read);
        assert!(bad.validate(&arena).is_err());
    }
}
