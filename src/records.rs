//! The output of a simulation: nodes, coalescence
//! records, migration records, and event counters.

use bitflags::bitflags;
use coalrustts_core::{NodeId, PopulationId, Position, Time};
use thiserror::Error;

use crate::error::{invariant_violation, CoalrusttsResult};

bitflags! {
    /// Properties of a [`Node`].
    #[derive(Default)]
    pub struct NodeFlags: u32 {
        /// Default
        const NONE = 0;
        /// The node is a sample node.
        const IS_SAMPLE = 1 << 0;
    }
}

/// A Node of the output genealogy.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Node {
    /// Time of the node
    pub time: Time,
    /// Population where the node lived
    pub population: PopulationId,
    /// Bit flags
    pub flags: NodeFlags,
}

/// Over `[left, right)`, the `children` have
/// `node` as their parent.
#[derive(Clone, Debug, PartialEq)]
pub struct CoalescenceRecord {
    /// Left end
    pub left: Position,
    /// Right end
    pub right: Position,
    /// The parent node
    pub node: NodeId,
    /// The child nodes, in increasing order
    pub children: Vec<NodeId>,
    /// Time of the parent node
    pub time: Time,
    /// Population of the parent node
    pub population: PopulationId,
}

/// Ancestral material of `node` over `[left, right)`
/// moved from `source` to `dest` at `time`.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct MigrationRecord {
    /// Left end
    pub left: Position,
    /// Right end
    pub right: Position,
    /// The migrating node
    pub node: NodeId,
    /// Population the lineage left
    pub source: PopulationId,
    /// Population the lineage entered
    pub dest: PopulationId,
    /// When the migration happened
    pub time: Time,
}

/// Counts of the random events of a run.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct EventCounters {
    pub(crate) common_ancestor_events: u64,
    pub(crate) rejected_common_ancestor_events: u64,
    pub(crate) recombination_events: u64,
    pub(crate) migration_events: u64,
}

impl EventCounters {
    /// Accepted common ancestor events,
    /// including those where no material coalesced.
    pub fn num_common_ancestor_events(&self) -> u64 {
        self.common_ancestor_events
    }

    /// Common ancestor proposals the model rejected.
    pub fn num_rejected_common_ancestor_events(&self) -> u64 {
        self.rejected_common_ancestor_events
    }

    /// Number of recombination events.
    pub fn num_recombination_events(&self) -> u64 {
        self.recombination_events
    }

    /// Number of single-lineage migrations.
    pub fn num_migration_events(&self) -> u64 {
        self.migration_events
    }
}

/// Error type returned by [`validate_records`].
#[derive(Error, Debug, PartialEq, Eq)]
pub enum RecordsError {
    /// No records.
    #[error("no coalescence records")]
    ZeroRecords,
    #[error("null node in record {index}")]
    /// A record refers to a null or unknown node.
    BadNode {
        /// Index of the record
        index: usize,
    },
    #[error("record {index} has no children")]
    /// A record without children.
    ZeroChildren {
        /// Index of the record
        index: usize,
    },
    #[error("children of record {index} are not sorted")]
    /// Children must be strictly increasing.
    UnsortedChildren {
        /// Index of the record
        index: usize,
    },
    #[error("records not sorted by time at record {index}")]
    /// Parent times must not decrease along the stream.
    RecordsNotTimeSorted {
        /// Index of the record
        index: usize,
    },
    #[error("child is not younger than its parent in record {index}")]
    /// A child must be younger than its parent.
    BadNodeTimeOrdering {
        /// Index of the record
        index: usize,
    },
    #[error("time of record {index} differs from the time of its node")]
    /// A record's time must equal the time of its parent node.
    InconsistentNodeTime {
        /// Index of the record
        index: usize,
    },
    #[error("population of record {index} differs from the population of its node")]
    /// A record's population must equal the population of its parent node.
    InconsistentNodePopulation {
        /// Index of the record
        index: usize,
    },
    #[error("empty interval in record {index}")]
    /// `left` must be less than `right`.
    BadRecordInterval {
        /// Index of the record
        index: usize,
    },
    #[error("records do not start at position zero")]
    /// The minimum left coordinate must be zero.
    NotStartingAtZero,
}

/// Check a record stream for internal consistency.
///
/// Records must be time-sorted and agree with their parent
/// node on time and population.  Children must be sorted and
/// strictly younger than their parents, intervals non-empty,
/// and the leftmost record must start at zero.
pub fn validate_records(nodes: &[Node], records: &[CoalescenceRecord]) -> Result<(), RecordsError> {
    if records.is_empty() {
        return Err(RecordsError::ZeroRecords);
    }
    let node_at = |n: NodeId| usize::try_from(n).ok().and_then(|i| nodes.get(i));
    let mut left = Position::new_valid(i64::MAX);
    for (index, r) in records.iter().enumerate() {
        let parent = node_at(r.node).ok_or(RecordsError::BadNode { index })?;
        let parent_time = parent.time;
        if r.time != parent_time {
            return Err(RecordsError::InconsistentNodeTime { index });
        }
        if r.population != parent.population {
            return Err(RecordsError::InconsistentNodePopulation { index });
        }
        if r.children.is_empty() {
            return Err(RecordsError::ZeroChildren { index });
        }
        if index > 0 && r.time < records[index - 1].time {
            return Err(RecordsError::RecordsNotTimeSorted { index });
        }
        if r.children.windows(2).any(|w| w[0] >= w[1]) {
            return Err(RecordsError::UnsortedChildren { index });
        }
        for c in r.children.iter() {
            let child = node_at(*c).ok_or(RecordsError::BadNode { index })?;
            if child.time >= parent_time {
                return Err(RecordsError::BadNodeTimeOrdering { index });
            }
        }
        if r.left >= r.right {
            return Err(RecordsError::BadRecordInterval { index });
        }
        left = std::cmp::min(left, r.left);
    }
    if left != 0 {
        return Err(RecordsError::NotStartingAtZero);
    }
    Ok(())
}

/// Receives the results of accepted events.
#[derive(Default, Debug)]
pub struct CoalescenceRecordSink {
    nodes: Vec<Node>,
    records: Vec<CoalescenceRecord>,
    migrations: Vec<MigrationRecord>,
    counters: EventCounters,
}

impl CoalescenceRecordSink {
    /// An empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn add_node(
        &mut self,
        time: Time,
        population: PopulationId,
        flags: NodeFlags,
    ) -> CoalrusttsResult<NodeId> {
        self.nodes.push(Node {
            time,
            population,
            flags,
        });
        Ok(NodeId::try_from(self.nodes.len() - 1)?)
    }

    /// Append a record.
    ///
    /// If the previous record has the same node
    /// and children and ends where this one starts,
    /// it is extended instead.
    pub(crate) fn record_coalescence(
        &mut self,
        left: Position,
        right: Position,
        node: NodeId,
        children: Vec<NodeId>,
        time: Time,
        population: PopulationId,
    ) -> CoalrusttsResult<()> {
        if left >= right {
            return invariant_violation(format!("empty record interval [{}, {})", left, right));
        }
        if let Some(last) = self.records.last_mut() {
            if last.node == node && last.right == left && last.children == children {
                last.right = right;
                return Ok(());
            }
        }
        self.records.push(CoalescenceRecord {
            left,
            right,
            node,
            children,
            time,
            population,
        });
        Ok(())
    }

    pub(crate) fn record_migration(&mut self, record: MigrationRecord) {
        self.migrations.push(record);
    }

    pub(crate) fn counters_mut(&mut self) -> &mut EventCounters {
        &mut self.counters
    }

    /// All nodes, samples first.
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Coalescence records in the order they were emitted.
    pub fn records(&self) -> &[CoalescenceRecord] {
        &self.records
    }

    /// Stored migration records.
    pub fn migrations(&self) -> &[MigrationRecord] {
        &self.migrations
    }

    /// Event counts so far.
    pub fn counters(&self) -> EventCounters {
        self.counters
    }

    /// Number of nodes, samples included.
    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    pub(crate) fn into_parts(
        self,
    ) -> (
        Vec<Node>,
        Vec<CoalescenceRecord>,
        Vec<MigrationRecord>,
        EventCounters,
    ) {
        (self.nodes, self.records, self.migrations, self.counters)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pos(x: i64) -> Position {
        Position::new_valid(x)
    }

    fn t(x: f64) -> Time {
        Time::new(x).unwrap()
    }

    fn sink_with_nodes() -> CoalescenceRecordSink {
        let mut sink = CoalescenceRecordSink::new();
        for _ in 0..3 {
            sink.add_node(Time::ZERO, PopulationId::default(), NodeFlags::IS_SAMPLE)
                .unwrap();
        }
        sink.add_node(t(1.0), PopulationId::default(), NodeFlags::NONE)
            .unwrap();
        sink
    }

    #[test]
    fn test_squash_adjacent_records() {
        let mut sink = sink_with_nodes();
        let node = NodeId::from(3);
        let children = vec![NodeId::from(0), NodeId::from(1)];
        sink.record_coalescence(pos(0), pos(5), node, children.clone(), t(1.0), PopulationId::default())
            .unwrap();
        sink.record_coalescence(pos(5), pos(9), node, children.clone(), t(1.0), PopulationId::default())
            .unwrap();
        assert_eq!(sink.records().len(), 1);
        assert_eq!(sink.records()[0].right, 9);
        // a gap prevents squashing
        sink.record_coalescence(pos(10), pos(12), node, children, t(1.0), PopulationId::default())
            .unwrap();
        assert_eq!(sink.records().len(), 2);
        assert!(validate_records(sink.nodes(), sink.records()).is_ok());
    }

    #[test]
    fn test_validation_failures() {
        let sink = sink_with_nodes();
        assert_eq!(
            validate_records(sink.nodes(), &[]),
            Err(RecordsError::ZeroRecords)
        );
        let good = CoalescenceRecord {
            left: pos(0),
            right: pos(10),
            node: NodeId::from(3),
            children: vec![NodeId::from(0), NodeId::from(1)],
            time: t(1.0),
            population: PopulationId::default(),
        };
        let mut r = good.clone();
        r.children = vec![NodeId::from(1), NodeId::from(0)];
        assert_eq!(
            validate_records(sink.nodes(), &[r]),
            Err(RecordsError::UnsortedChildren { index: 0 })
        );
        let mut r = good.clone();
        r.children = vec![NodeId::from(3)];
        assert_eq!(
            validate_records(sink.nodes(), &[r]),
            Err(RecordsError::BadNodeTimeOrdering { index: 0 })
        );
        let mut r = good.clone();
        r.left = pos(1);
        assert_eq!(
            validate_records(sink.nodes(), &[r]),
            Err(RecordsError::NotStartingAtZero)
        );
        let mut r = good.clone();
        r.node = NodeId::from(42);
        assert_eq!(
            validate_records(sink.nodes(), &[r]),
            Err(RecordsError::BadNode { index: 0 })
        );
        let mut r = good.clone();
        r.time = t(2.0);
        assert_eq!(
            validate_records(sink.nodes(), &[r]),
            Err(RecordsError::InconsistentNodeTime { index: 0 })
        );
        let mut r = good.clone();
        r.population = PopulationId::from(1);
        assert_eq!(
            validate_records(sink.nodes(), &[r]),
            Err(RecordsError::InconsistentNodePopulation { index: 0 })
        );
        let mut r = good;
        r.children.clear();
        assert_eq!(
            validate_records(sink.nodes(), &[r]),
            Err(RecordsError::ZeroChildren { index: 0 })
        );
    }

    #[test]
    fn test_empty_interval_is_invariant_violation() {
        let mut sink = sink_with_nodes();
        assert!(sink
            .record_coalescence(
                pos(3),
                pos(3),
                NodeId::from(3),
                vec![NodeId::from(0)],
                t(1.0),
                PopulationId::default()
            )
            .is_err());
    }
}
