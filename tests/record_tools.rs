#![allow(dead_code)]

use std::collections::HashMap;

use coalrustts::*;

/// Pairs of consecutive records with the same
/// parent whose intervals do not abut.
pub fn count_gaps(records: &[CoalescenceRecord]) -> usize {
    records
        .windows(2)
        .filter(|w| w[0].right != w[1].left && w[0].node == w[1].node)
        .count()
}

pub fn sample_nodes(output: &SimulationOutput) -> Vec<NodeId> {
    output
        .nodes
        .iter()
        .enumerate()
        .filter(|(_, n)| n.flags.contains(NodeFlags::IS_SAMPLE))
        .map(|(i, _)| NodeId::try_from(i).unwrap())
        .collect()
}

/// Child to parent map of the tree at `position`.
pub fn parents_at(output: &SimulationOutput, position: Position) -> HashMap<NodeId, NodeId> {
    let mut parents = HashMap::new();
    for r in output
        .records
        .iter()
        .filter(|r| r.left <= position && position < r.right)
    {
        for c in r.children.iter() {
            assert!(
                parents.insert(*c, r.node).is_none(),
                "node {} has two parents at {}",
                c,
                position
            );
        }
    }
    parents
}

pub fn root_of(parents: &HashMap<NodeId, NodeId>, node: NodeId) -> NodeId {
    let mut current = node;
    while let Some(p) = parents.get(&current) {
        current = *p;
    }
    current
}

/// Every tree along the sequence has a single root
/// that is an ancestor of all samples.
pub fn assert_single_root_everywhere(output: &SimulationOutput) {
    let samples = sample_nodes(output);
    let mut positions = output.records.iter().map(|r| r.left).collect::<Vec<_>>();
    positions.push(Position::ZERO);
    positions.sort();
    positions.dedup();
    for x in positions {
        let parents = parents_at(output, x);
        let root = root_of(&parents, samples[0]);
        for s in samples.iter() {
            assert_eq!(root_of(&parents, *s), root, "multiple roots at {}", x);
        }
        assert!(!samples.contains(&root));
    }
}

/// Time of the oldest node, in generations.
pub fn tmrca(output: &SimulationOutput) -> f64 {
    output
        .records
        .iter()
        .map(|r| r.time.raw())
        .fold(0.0, f64::max)
}
