//! Counts of uncoalesced sample ancestry along the chromosome.

use std::collections::BTreeMap;

use coalrustts_core::Position;

use crate::error::{invariant_violation, CoalrusttsResult};

/// A step function over `[0, L)`.
///
/// For every position, the value is the number of
/// sample lineages whose ancestry at that position has
/// not yet found a most recent common ancestor.
/// Each key starts a run that ends at the next key.
/// A final key at `L` with count zero closes the last run.
#[derive(Debug, Clone)]
pub(crate) struct OverlapCounts {
    counts: BTreeMap<i64, u32>,
    sequence_length: Position,
}

impl OverlapCounts {
    pub(crate) fn new(sequence_length: Position, num_samples: u32) -> Self {
        let mut counts = BTreeMap::new();
        counts.insert(0, num_samples);
        counts.insert(sequence_length.raw(), 0);
        Self {
            counts,
            sequence_length,
        }
    }

    /// Count at `position`.
    pub(crate) fn count_at(&self, position: Position) -> u32 {
        self.counts
            .range(..=position.raw())
            .next_back()
            .map_or(0, |(_, c)| *c)
    }

    /// Keys strictly inside `(left, right)`.
    pub(crate) fn breakpoints_within(
        &self,
        left: Position,
        right: Position,
    ) -> impl Iterator<Item = Position> + '_ {
        let lo = left.raw() + 1;
        let hi = right.raw();
        let range = if lo < hi { lo..hi } else { 0..0 };
        self.counts.range(range).map(|(k, _)| Position::new_valid(*k))
    }

    fn ensure_key(&mut self, position: i64) {
        if !self.counts.contains_key(&position) {
            let value = self
                .counts
                .range(..position)
                .next_back()
                .map_or(0, |(_, c)| *c);
            self.counts.insert(position, value);
        }
    }

    /// Subtract `by` over `[left, right)`.
    ///
    /// # Errors
    ///
    /// An invariant violation if any count would go
    /// below one: merging lineages can only reduce a count
    /// to one, when the last two carriers coalesce.
    pub(crate) fn decrement(
        &mut self,
        left: Position,
        right: Position,
        by: u32,
    ) -> CoalrusttsResult<()> {
        if left >= right || right > self.sequence_length {
            return invariant_violation(format!(
                "bad overlap interval [{}, {})",
                left, right
            ));
        }
        let (l, r) = (left.raw(), right.raw());
        self.ensure_key(l);
        self.ensure_key(r);
        for (k, c) in self.counts.range_mut(l..r) {
            match c.checked_sub(by) {
                Some(v) if v >= 1 => *c = v,
                _ => {
                    return invariant_violation(format!(
                        "overlap count {} at {} cannot be reduced by {}",
                        c, k, by
                    ))
                }
            }
        }
        self.simplify_around(l, r);
        Ok(())
    }

    // Drop keys in [l, r] whose count equals the previous run.
    fn simplify_around(&mut self, l: i64, r: i64) {
        let mut previous = self.counts.range(..l).next_back().map(|(_, c)| *c);
        let mut redundant = vec![];
        for (k, c) in self.counts.range(l..=r) {
            if previous == Some(*c) {
                redundant.push(*k);
            }
            previous = Some(*c);
        }
        for k in redundant {
            self.counts.remove(&k);
        }
    }

    /// `true` when all ancestry has coalesced everywhere.
    pub(crate) fn is_fully_coalesced(&self) -> bool {
        self.counts.values().all(|c| *c <= 1)
    }

    /// Runs `(left, right, count)` in order.
    pub(crate) fn runs(&self) -> Vec<(Position, Position, u32)> {
        let keys = self.counts.iter().collect::<Vec<_>>();
        keys.windows(2)
            .map(|w| {
                (
                    Position::new_valid(*w[0].0),
                    Position::new_valid(*w[1].0),
                    *w[0].1,
                )
            })
            .collect()
    }
}
