//! The ancestral material carried by every live lineage.

use std::collections::BTreeMap;

use coalrustts_core::{NodeId, PopulationId, Position, Time};
use coalrustts_genetics::RecombinationMap;
use rand::rngs::StdRng;
use rand::Rng;

use crate::error::{invariant_violation, CoalrusttsResult};
use crate::fenwick::FenwickTree;
use crate::overlap::OverlapCounts;
use crate::records::{CoalescenceRecordSink, NodeFlags};
use crate::segments::{Segment, SegmentArena, SegmentIndex, NULL_INDEX};

pub(crate) type LineageId = usize;

#[derive(Copy, Clone, Debug)]
struct Lineage {
    head: SegmentIndex,
    tail: SegmentIndex,
    population: usize,
    // index into the membership list of `population`
    slot: usize,
}

/// Live lineages, their segments, and the
/// overlap counts along the chromosome.
///
/// Lineages are kept in a slab and referred to by
/// index.  Each population keeps a list of its members
/// so that uniform draws within a population are O(1).
/// Recombination masses are kept in a Fenwick tree indexed
/// by lineage, so the total mass and the choice of a
/// recombining lineage are O(log n).
pub struct AncestryState {
    arena: SegmentArena,
    lineages: Vec<Option<Lineage>>,
    masses: FenwickTree,
    free_lineages: Vec<LineageId>,
    populations: Vec<Vec<LineageId>>,
    overlap: OverlapCounts,
    map: RecombinationMap,
    num_lineages: usize,
}

fn push_output(output: &mut Vec<Segment>, left: Position, right: Position, node: NodeId) {
    if let Some(last) = output.last_mut() {
        if last.node == node && last.right == left {
            last.right = right;
            return;
        }
    }
    output.push(Segment::new(left, right, node));
}

impl AncestryState {
    /// `map` gives both the sequence length and, in
    /// coalescent units, the recombination rates.
    /// `num_samples` counts all samples, including
    /// those that will only be added later.
    pub(crate) fn new(map: RecombinationMap, num_populations: usize, num_samples: u32) -> Self {
        Self {
            arena: SegmentArena::new(),
            lineages: vec![],
            masses: FenwickTree::new(),
            free_lineages: vec![],
            populations: vec![vec![]; num_populations],
            overlap: OverlapCounts::new(map.sequence_length(), num_samples),
            map,
            num_lineages: 0,
        }
    }

    fn lineage(&self, id: LineageId) -> CoalrusttsResult<&Lineage> {
        match self.lineages.get(id) {
            Some(Some(lineage)) => Ok(lineage),
            _ => invariant_violation(format!("lineage {} is not live", id)),
        }
    }

    fn lineage_mut(&mut self, id: LineageId) -> CoalrusttsResult<&mut Lineage> {
        match self.lineages.get_mut(id) {
            Some(Some(lineage)) => Ok(lineage),
            _ => invariant_violation(format!("lineage {} is not live", id)),
        }
    }

    fn members_mut(&mut self, population: usize) -> CoalrusttsResult<&mut Vec<LineageId>> {
        match self.populations.get_mut(population) {
            Some(members) => Ok(members),
            None => invariant_violation(format!("population {} out of range", population)),
        }
    }

    fn extent_of(&self, head: SegmentIndex, tail: SegmentIndex) -> CoalrusttsResult<(Position, Position)> {
        Ok((self.arena.get(head)?.left, self.arena.get(tail)?.right))
    }

    fn insert_lineage(
        &mut self,
        head: SegmentIndex,
        tail: SegmentIndex,
        population: usize,
    ) -> CoalrusttsResult<LineageId> {
        let (left, right) = self.extent_of(head, tail)?;
        let recombination_mass = self.map.link_rate(left, right);
        let members = self.members_mut(population)?;
        let slot = members.len();
        let lineage = Lineage {
            head,
            tail,
            population,
            slot,
        };
        let id = match self.free_lineages.pop() {
            Some(id) => {
                self.lineages[id] = Some(lineage);
                id
            }
            None => {
                self.lineages.push(Some(lineage));
                self.lineages.len() - 1
            }
        };
        self.members_mut(population)?.push(id);
        self.masses.set(id, recombination_mass);
        self.num_lineages += 1;
        Ok(id)
    }

    fn detach(&mut self, id: LineageId) -> CoalrusttsResult<()> {
        let lineage = *self.lineage(id)?;
        let members = self.members_mut(lineage.population)?;
        if members.get(lineage.slot) != Some(&id) {
            return invariant_violation(format!("lineage {} missing from its population", id));
        }
        members.swap_remove(lineage.slot);
        if let Some(moved) = members.get(lineage.slot).copied() {
            self.lineage_mut(moved)?.slot = lineage.slot;
        }
        Ok(())
    }

    // Remove `id` from the slab.  Its segments are not freed.
    fn remove_lineage(&mut self, id: LineageId) -> CoalrusttsResult<Lineage> {
        self.detach(id)?;
        let lineage = *self.lineage(id)?;
        self.lineages[id] = None;
        self.masses.set(id, 0.0);
        self.free_lineages.push(id);
        self.num_lineages -= 1;
        Ok(lineage)
    }

    fn refresh_mass(&mut self, id: LineageId) -> CoalrusttsResult<()> {
        let lineage = *self.lineage(id)?;
        let (left, right) = self.extent_of(lineage.head, lineage.tail)?;
        self.masses.set(id, self.map.link_rate(left, right));
        Ok(())
    }

    /// Add a lineage carrying `[0, L)` for a sample node.
    pub(crate) fn add_sample_lineage(
        &mut self,
        node: NodeId,
        population: usize,
    ) -> CoalrusttsResult<LineageId> {
        let segment = Segment::new(Position::ZERO, self.map.sequence_length(), node);
        let head = self.arena.alloc(segment, NULL_INDEX);
        self.insert_lineage(head, head, population)
    }

    /// Number of live lineages in all populations.
    pub fn num_lineages(&self) -> usize {
        self.num_lineages
    }

    /// Number of populations.
    pub fn num_populations(&self) -> usize {
        self.populations.len()
    }

    /// Number of live lineages in `population`,
    /// or zero for an unknown population.
    pub fn num_lineages_in(&self, population: usize) -> usize {
        self.populations.get(population).map_or(0, |m| m.len())
    }

    /// `k(k - 1)/2` for the `k` lineages in `population`.
    pub fn common_ancestor_pairs(&self, population: usize) -> f64 {
        let k = self.num_lineages_in(population) as f64;
        k * (k - 1.0) / 2.0
    }

    /// Total rate of recombination over all lineages.
    ///
    /// A lineage spanning `[left, right)` contributes the
    /// map's rate mass over the links strictly inside its
    /// extent, gaps included, so that every breakpoint
    /// leaves material on both sides.
    pub fn recombination_mass(&self) -> f64 {
        self.masses.total()
    }

    /// Total number of segments held by live lineages.
    pub fn num_segments(&self) -> usize {
        self.arena.num_segments()
    }

    /// Number of loci.
    pub fn sequence_length(&self) -> Position {
        self.map.sequence_length()
    }

    pub(crate) fn lineages_in(&self, population: usize) -> CoalrusttsResult<&[LineageId]> {
        match self.populations.get(population) {
            Some(members) => Ok(members.as_slice()),
            None => invariant_violation(format!("population {} out of range", population)),
        }
    }

    pub(crate) fn population_of(&self, id: LineageId) -> CoalrusttsResult<usize> {
        Ok(self.lineage(id)?.population)
    }

    pub(crate) fn segments(&self, id: LineageId) -> CoalrusttsResult<Vec<Segment>> {
        let lineage = self.lineage(id)?;
        Ok(self.arena.chain(lineage.head).copied().collect())
    }

    pub(crate) fn intervals(&self, id: LineageId) -> CoalrusttsResult<Vec<(Position, Position)>> {
        let lineage = self.lineage(id)?;
        Ok(self
            .arena
            .chain(lineage.head)
            .map(|s| (s.left, s.right))
            .collect())
    }

    /// Move a lineage to `dest`, returning its old population.
    pub(crate) fn move_lineage(&mut self, id: LineageId, dest: usize) -> CoalrusttsResult<usize> {
        let source = self.population_of(id)?;
        if dest >= self.populations.len() {
            return invariant_violation(format!("population {} out of range", dest));
        }
        self.detach(id)?;
        let members = self.members_mut(dest)?;
        let slot = members.len();
        members.push(id);
        let lineage = self.lineage_mut(id)?;
        lineage.population = dest;
        lineage.slot = slot;
        Ok(source)
    }

    /// Split lineage `id` at `breakpoint`.
    ///
    /// Loci `< breakpoint` stay with `id`, and the
    /// returned lineage takes the loci `>= breakpoint`.
    /// A breakpoint inside a gap between two segments
    /// separates the segments without cutting either.
    pub(crate) fn split(&mut self, id: LineageId, breakpoint: Position) -> CoalrusttsResult<LineageId> {
        let lineage = *self.lineage(id)?;
        let (left, right) = self.extent_of(lineage.head, lineage.tail)?;
        if !(left < breakpoint && breakpoint < right) {
            return invariant_violation(format!(
                "breakpoint {} outside of ({}, {})",
                breakpoint, left, right
            ));
        }
        let mut previous = NULL_INDEX;
        let mut current = lineage.head;
        while self.arena.get(current)?.right <= breakpoint {
            previous = current;
            current = self.arena.next(current)?;
        }
        let segment = *self.arena.get(current)?;
        let (old_tail, new_head, new_tail) = if segment.left < breakpoint {
            let next = self.arena.next(current)?;
            let cut = self.arena.alloc(
                Segment::new(breakpoint, segment.right, segment.node),
                next,
            );
            self.arena.get_mut(current)?.right = breakpoint;
            self.arena.set_next(current, NULL_INDEX)?;
            let new_tail = if lineage.tail == current {
                cut
            } else {
                lineage.tail
            };
            (current, cut, new_tail)
        } else {
            self.arena.set_next(previous, NULL_INDEX)?;
            (previous, current, lineage.tail)
        };
        self.lineage_mut(id)?.tail = old_tail;
        self.refresh_mass(id)?;
        self.insert_lineage(new_head, new_tail, lineage.population)
    }

    /// Choose a lineage in proportion to its recombination
    /// mass and split it at a breakpoint drawn from the map.
    ///
    /// Returns the original lineage, the new lineage,
    /// and the breakpoint.
    pub(crate) fn recombine(
        &mut self,
        rng: &mut StdRng,
    ) -> CoalrusttsResult<(LineageId, LineageId, Position)> {
        let mass = rng.gen::<f64>() * self.masses.total();
        let id = match self.masses.find(mass) {
            Some(id) => id,
            None => return invariant_violation("no lineage can recombine"),
        };
        let lineage = *self.lineage(id)?;
        let (left, right) = self.extent_of(lineage.head, lineage.tail)?;
        let u: f64 = rng.gen();
        let breakpoint = match self.map.draw_breakpoint_between(left, right, u) {
            Some(x) => x,
            None => {
                return invariant_violation(format!(
                    "lineage {} spanning [{}, {}) cannot recombine",
                    id, left, right
                ))
            }
        };
        let new = self.split(id, breakpoint)?;
        Ok((id, new, breakpoint))
    }

    /// Merge `lineages` into their common ancestor in `population`.
    ///
    /// The material of the inputs is swept left to right over
    /// elementary intervals.  An interval carried by one input
    /// passes through unchanged.  An interval carried by two or
    /// more inputs coalesces: a record is emitted and the overlap
    /// count drops by one less than the number of carriers.
    /// Coalesced material stays in the ancestor only while its
    /// count is above one.
    ///
    /// Nodes are created only when something coalesces.  With
    /// `split_runs`, each contiguous run of coalesced intervals
    /// gets its own node, as the SMC variants require.
    ///
    /// Returns the ancestral lineage, or `None` if
    /// it carries no material.
    pub(crate) fn merge(
        &mut self,
        lineages: &[LineageId],
        population: usize,
        time: Time,
        split_runs: bool,
        sink: &mut CoalescenceRecordSink,
    ) -> CoalrusttsResult<Option<LineageId>> {
        let mut distinct = lineages.to_vec();
        distinct.sort_unstable();
        distinct.dedup();
        if distinct.len() != lineages.len() || distinct.len() < 2 {
            return invariant_violation(format!("cannot merge lineages {:?}", lineages));
        }
        let mut inputs = Vec::with_capacity(lineages.len());
        for id in lineages {
            inputs.push(self.segments(*id)?);
        }
        for id in lineages {
            let lineage = self.remove_lineage(*id)?;
            self.arena.free_chain(lineage.head)?;
        }

        let mut bounds = inputs
            .iter()
            .flatten()
            .flat_map(|s| [s.left, s.right])
            .collect::<Vec<_>>();
        bounds.sort_unstable();
        bounds.dedup();
        if let (Some(lo), Some(hi)) = (bounds.first().copied(), bounds.last().copied()) {
            bounds.extend(self.overlap.breakpoints_within(lo, hi));
            bounds.sort_unstable();
            bounds.dedup();
        }

        let population_id = PopulationId::try_from(population)?;
        let mut cursors = vec![0_usize; inputs.len()];
        let mut output: Vec<Segment> = vec![];
        let mut node: Option<NodeId> = None;
        let mut coalesced_right: Option<Position> = None;
        for w in bounds.windows(2) {
            let (left, right) = (w[0], w[1]);
            let mut carriers = vec![];
            for (segments, cursor) in inputs.iter().zip(cursors.iter_mut()) {
                while *cursor < segments.len() && segments[*cursor].right <= left {
                    *cursor += 1;
                }
                if let Some(s) = segments.get(*cursor) {
                    if s.left <= left {
                        carriers.push(s.node);
                    }
                }
            }
            match carriers.len() {
                0 => (),
                1 => push_output(&mut output, left, right, carriers[0]),
                c => {
                    let count = self.overlap.count_at(left);
                    let new_run = split_runs && coalesced_right != Some(left);
                    let parent = match node {
                        Some(n) if !new_run => n,
                        _ => {
                            let n = sink.add_node(time, population_id, NodeFlags::NONE)?;
                            node = Some(n);
                            n
                        }
                    };
                    let coalescing = (c - 1) as u32;
                    carriers.sort_unstable();
                    sink.record_coalescence(left, right, parent, carriers, time, population_id)?;
                    self.overlap.decrement(left, right, coalescing)?;
                    if count - coalescing > 1 {
                        push_output(&mut output, left, right, parent);
                    }
                    coalesced_right = Some(right);
                }
            }
        }

        if output.is_empty() {
            return Ok(None);
        }
        let mut next = NULL_INDEX;
        let mut tail = NULL_INDEX;
        for segment in output.iter().rev() {
            next = self.arena.alloc(*segment, next);
            if tail == NULL_INDEX {
                tail = next;
            }
        }
        Ok(Some(self.insert_lineage(next, tail, population)?))
    }

    /// `true` if no material remains anywhere
    /// and all overlap counts are at most one.
    pub fn is_fully_coalesced(&self) -> bool {
        self.num_lineages == 0 && self.overlap.is_fully_coalesced()
    }

    /// Check the internal consistency of the state.
    ///
    /// `pending_samples` is the number of samples
    /// not yet added to the state.
    pub fn check_invariants(&self, pending_samples: u32) -> CoalrusttsResult<()> {
        let mut coverage = BTreeMap::<Position, i64>::new();
        let mut num_segments = 0;
        let mut num_live = 0;
        for (id, lineage) in self.lineages.iter().enumerate() {
            let lineage = match lineage {
                Some(l) => l,
                None => continue,
            };
            num_live += 1;
            if self.populations.get(lineage.population).and_then(|m| m.get(lineage.slot))
                != Some(&id)
            {
                return invariant_violation(format!("lineage {} has a stale slot", id));
            }
            let mut last: Option<(SegmentIndex, Segment)> = None;
            let mut current = lineage.head;
            while current != NULL_INDEX {
                let segment = *self.arena.get(current)?;
                if segment.left >= segment.right {
                    return invariant_violation(format!("empty segment in lineage {}", id));
                }
                if let Some((_, previous)) = last {
                    if previous.right > segment.left {
                        return invariant_violation(format!(
                            "unsorted segments in lineage {}",
                            id
                        ));
                    }
                }
                *coverage.entry(segment.left).or_insert(0) += 1;
                *coverage.entry(segment.right).or_insert(0) -= 1;
                num_segments += 1;
                last = Some((current, segment));
                current = self.arena.next(current)?;
            }
            match last {
                Some((index, _)) if index == lineage.tail => (),
                _ => return invariant_violation(format!("bad tail for lineage {}", id)),
            }
            let (left, right) = self.extent_of(lineage.head, lineage.tail)?;
            if (self.map.link_rate(left, right) - self.masses.get(id)).abs() > 1e-9 {
                return invariant_violation(format!("stale recombination mass for lineage {}", id));
            }
        }
        let total = (0..self.lineages.len())
            .map(|id| self.masses.get(id))
            .sum::<f64>();
        if (total - self.masses.total()).abs() > 1e-9 * total.max(1.0) {
            return invariant_violation(format!(
                "recombination mass {} does not match the sum {}",
                self.masses.total(),
                total
            ));
        }
        if num_live != self.num_lineages
            || self.populations.iter().map(|m| m.len()).sum::<usize>() != num_live
        {
            return invariant_violation("lineage counts are inconsistent");
        }
        if num_segments != self.arena.num_segments() {
            return invariant_violation(format!(
                "{} segments reachable but {} allocated",
                num_segments,
                self.arena.num_segments()
            ));
        }
        for (left, _, _) in self.overlap.runs() {
            coverage.entry(left).or_insert(0);
        }
        let mut carriers = 0_i64;
        for (position, delta) in coverage.iter() {
            carriers += delta;
            if *position >= self.map.sequence_length() {
                break;
            }
            let count = i64::from(self.overlap.count_at(*position));
            let expected = if count > 1 {
                count - i64::from(pending_samples)
            } else {
                0
            };
            if carriers != expected {
                return invariant_violation(format!(
                    "{} lineages carry position {} but the overlap count is {}",
                    carriers, position, count
                ));
            }
        }
        Ok(())
    }
}
