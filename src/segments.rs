//! Compact storage for the ancestral segments of all lineages.
//!
//! Every lineage owns a forward linked list of [`Segment`]s.
//! All lists live in one [`SegmentArena`], flattened into
//! vectors and linked by index.  Freed slots are recycled,
//! so repeated splitting and merging does not grow the arena
//! beyond the peak number of live segments.

use coalrustts_core::{NodeId, Position};
use thiserror::Error;

/// Error type for [``SegmentArena``] operations.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum SegmentArenaError {
    /// Used for invalid index values.
    #[error("Invalid segment index")]
    InvalidIndex,
    /// A slot was used after being freed.
    #[error("Segment slot is not in use")]
    FreedSlot,
}

/// The type used to refer to a slot of [`SegmentArena`].
pub(crate) type SegmentIndex = i32;

/// The null value for a [`SegmentIndex`]
pub(crate) const NULL_INDEX: SegmentIndex = -1;

/// Result type for [``SegmentArena``] operations.
pub(crate) type Result<T> = std::result::Result<T, SegmentArenaError>;

/// A half-open interval `[left, right)` of ancestral
/// material.  `node` is the most recent node in the
/// output genealogy that carries this material.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Segment {
    /// Left edge of interval
    pub left: Position,
    /// Right edge of interval
    pub right: Position,
    /// The node
    pub node: NodeId,
}

impl Segment {
    /// Create a new instance.
    pub fn new(left: Position, right: Position, node: NodeId) -> Self {
        Segment { left, right, node }
    }
}

pub(crate) struct SegmentChainIterator<'arena> {
    arena: &'arena SegmentArena,
    current: SegmentIndex,
}

impl<'arena> Iterator for SegmentChainIterator<'arena> {
    type Item = &'arena Segment;
    fn next(&mut self) -> Option<Self::Item> {
        if self.current == NULL_INDEX {
            return None;
        }
        let i = self.current as usize;
        self.current = self.arena.next_[i];
        Some(&self.arena.data_[i])
    }
}

#[derive(Default)]
pub(crate) struct SegmentArena {
    data_: Vec<Segment>,
    next_: Vec<SegmentIndex>,
    in_use_: Vec<bool>,
    free_: Vec<SegmentIndex>,
}

impl SegmentArena {
    fn check_index(&self, at: SegmentIndex) -> Result<usize> {
        if at < 0 || (at as usize) >= self.data_.len() {
            return Err(SegmentArenaError::InvalidIndex);
        }
        if !self.in_use_[at as usize] {
            return Err(SegmentArenaError::FreedSlot);
        }
        Ok(at as usize)
    }

    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Store `segment`, linked to `next`.
    pub(crate) fn alloc(&mut self, segment: Segment, next: SegmentIndex) -> SegmentIndex {
        match self.free_.pop() {
            Some(i) => {
                let idx = i as usize;
                self.data_[idx] = segment;
                self.next_[idx] = next;
                self.in_use_[idx] = true;
                i
            }
            None => {
                self.data_.push(segment);
                self.next_.push(next);
                self.in_use_.push(true);
                (self.data_.len() - 1) as SegmentIndex
            }
        }
    }

    pub(crate) fn free(&mut self, at: SegmentIndex) -> Result<()> {
        let idx = self.check_index(at)?;
        self.in_use_[idx] = false;
        self.next_[idx] = NULL_INDEX;
        self.free_.push(at);
        Ok(())
    }

    /// Free every segment reachable from `head`.
    pub(crate) fn free_chain(&mut self, head: SegmentIndex) -> Result<()> {
        let mut current = head;
        while current != NULL_INDEX {
            let next = self.next(current)?;
            self.free(current)?;
            current = next;
        }
        Ok(())
    }

    #[inline]
    pub(crate) fn get(&self, at: SegmentIndex) -> Result<&Segment> {
        let idx = self.check_index(at)?;
        Ok(&self.data_[idx])
    }

    #[inline]
    pub(crate) fn get_mut(&mut self, at: SegmentIndex) -> Result<&mut Segment> {
        let idx = self.check_index(at)?;
        Ok(&mut self.data_[idx])
    }

    #[inline]
    pub(crate) fn next(&self, at: SegmentIndex) -> Result<SegmentIndex> {
        let idx = self.check_index(at)?;
        Ok(self.next_[idx])
    }

    #[inline]
    pub(crate) fn set_next(&mut self, at: SegmentIndex, next: SegmentIndex) -> Result<()> {
        let idx = self.check_index(at)?;
        self.next_[idx] = next;
        Ok(())
    }

    pub(crate) fn chain(&self, head: SegmentIndex) -> SegmentChainIterator<'_> {
        SegmentChainIterator {
            arena: self,
            current: head,
        }
    }

    /// Number of live segments.
    pub(crate) fn num_segments(&self) -> usize {
        self.data_.len() - self.free_.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seg(left: i64, right: i64, node: i32) -> Segment {
        Segment::new(
            Position::new_valid(left),
            Position::new_valid(right),
            NodeId::from(node),
        )
    }

    #[test]
    fn test_chain() {
        let mut arena = SegmentArena::new();
        let c = arena.alloc(seg(20, 30, 2), NULL_INDEX);
        let b = arena.alloc(seg(10, 20, 1), c);
        let a = arena.alloc(seg(0, 10, 0), b);
        let lefts = arena.chain(a).map(|s| s.left.raw()).collect::<Vec<_>>();
        assert_eq!(lefts, vec![0, 10, 20]);
        assert_eq!(arena.num_segments(), 3);
    }

    #[test]
    fn test_slots_are_recycled() {
        let mut arena = SegmentArena::new();
        let b = arena.alloc(seg(10, 20, 1), NULL_INDEX);
        let a = arena.alloc(seg(0, 10, 0), b);
        arena.free_chain(a).unwrap();
        assert_eq!(arena.num_segments(), 0);
        let c = arena.alloc(seg(5, 6, 3), NULL_INDEX);
        assert!(c == a || c == b);
        assert_eq!(arena.num_segments(), 1);
    }

    #[test]
    fn test_use_after_free() {
        let mut arena = SegmentArena::new();
        let a = arena.alloc(seg(0, 10, 0), NULL_INDEX);
        arena.free(a).unwrap();
        assert_eq!(arena.get(a).unwrap_err(), SegmentArenaError::FreedSlot);
        assert_eq!(arena.free(a).unwrap_err(), SegmentArenaError::FreedSlot);
        assert_eq!(arena.get(17).unwrap_err(), SegmentArenaError::InvalidIndex);
        assert_eq!(
            arena.next(NULL_INDEX).unwrap_err(),
            SegmentArenaError::InvalidIndex
        );
    }

    #[test]
    fn test_get_mut() {
        let mut arena = SegmentArena::new();
        let a = arena.alloc(seg(0, 10, 0), NULL_INDEX);
        arena.get_mut(a).unwrap().right = Position::new_valid(5);
        assert_eq!(arena.get(a).unwrap().right, 5);
    }
}
