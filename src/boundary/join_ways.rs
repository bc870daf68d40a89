//! Gluing an unordered soup of way fragments into closed rings.
//!
//! Fragments are matched purely by shared endpoint node ids. Already-closed ways become rings
//! on their own; the rest are chained greedily from the first unconsumed fragment in input
//! order, reversing fragments as needed. When several fragments meet the chain's trailing
//! node, the lowest way id wins. There is no backtracking, so branching data can leave
//! remnants that a full matching would have closed.

use std::collections::{HashMap, HashSet};

use crate::data::geometry::FragmentEnds;
use crate::data::osm::{OsmId, Way};

/// A way's node list, possibly flipped to line up with its neighbours in a chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment {
    pub way_id: OsmId,
    pub nodes: Vec<OsmId>,
    pub reversed: bool,
}

impl Fragment {
    pub fn from_way(way: &Way) -> Fragment {
        Fragment {
            way_id: way.id,
            nodes: way.nodes.clone(),
            reversed: false,
        }
    }

    pub fn first(&self) -> Option<OsmId> {
        self.nodes.first().copied()
    }

    pub fn last(&self) -> Option<OsmId> {
        self.nodes.last().copied()
    }

    fn reversed(mut self) -> Fragment {
        self.nodes.reverse();
        self.reversed = !self.reversed;
        self
    }
}

fn concat_nodes(fragments: &[Fragment]) -> Vec<OsmId> {
    let mut nodes: Vec<OsmId> = Vec::new();
    for fragment in fragments {
        if nodes.is_empty() {
            nodes.extend(fragment.nodes.iter().copied());
        } else {
            // The first node repeats the previous fragment's last one.
            nodes.extend(fragment.nodes.iter().skip(1).copied());
        }
    }
    nodes
}

fn way_ids(fragments: &[Fragment]) -> Vec<OsmId> {
    fragments.iter().map(|fragment| fragment.way_id).collect()
}

fn node_reference_count(fragments: &[Fragment]) -> usize {
    fragments.iter().map(|fragment| fragment.nodes.len()).sum()
}

/// Fragments laid end to end; the last node of the last fragment is the first node of the
/// first fragment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClosedRing {
    pub fragments: Vec<Fragment>,
}

impl ClosedRing {
    pub fn nodes(&self) -> Vec<OsmId> {
        concat_nodes(&self.fragments)
    }

    pub fn way_ids(&self) -> Vec<OsmId> {
        way_ids(&self.fragments)
    }

    pub fn node_reference_count(&self) -> usize {
        node_reference_count(&self.fragments)
    }
}

/// Fragments that were chained together but never met up with their own start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Remnant {
    pub fragments: Vec<Fragment>,
}

impl Remnant {
    pub fn way_ids(&self) -> Vec<OsmId> {
        way_ids(&self.fragments)
    }

    pub fn node_reference_count(&self) -> usize {
        node_reference_count(&self.fragments)
    }

    pub fn ends(&self) -> FragmentEnds {
        FragmentEnds {
            way_ids: self.way_ids(),
            start_node: self.fragments.first().and_then(Fragment::first),
            end_node: self.fragments.last().and_then(Fragment::last),
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct JoinedWays {
    pub rings: Vec<ClosedRing>,
    pub remnants: Vec<Remnant>,
}

impl JoinedWays {
    pub fn is_closed(&self) -> bool {
        self.remnants.is_empty()
    }
}

pub fn join_way_soup<'a>(ways: impl IntoIterator<Item = &'a Way>) -> JoinedWays {
    let mut joined = JoinedWays::default();
    let mut open: Vec<Fragment> = Vec::new();

    for way in ways {
        let fragment = Fragment::from_way(way);
        if way.closed() {
            joined.rings.push(ClosedRing {
                fragments: vec![fragment],
            });
        } else if way.nodes.is_empty() {
            joined.remnants.push(Remnant {
                fragments: vec![fragment],
            });
        } else {
            open.push(fragment);
        }
    }

    // node id -> indices into `open` of fragments starting or ending there
    let mut by_endpoint: HashMap<OsmId, Vec<usize>> = HashMap::new();
    for (idx, fragment) in open.iter().enumerate() {
        let (Some(first), Some(last)) = (fragment.first(), fragment.last()) else {
            continue;
        };
        by_endpoint.entry(first).or_default().push(idx);
        if last != first {
            by_endpoint.entry(last).or_default().push(idx);
        }
    }
    for candidates in by_endpoint.values_mut() {
        candidates.sort_by_key(|idx| (open[*idx].way_id, *idx));
    }

    let mut consumed = vec![false; open.len()];
    for seed in 0..open.len() {
        if consumed[seed] {
            continue;
        }
        consumed[seed] = true;

        let head = open[seed].first();
        let mut tail = open[seed].last();
        let mut chain = vec![open[seed].clone()];

        while tail != head {
            let next = tail
                .and_then(|node| by_endpoint.get(&node))
                .and_then(|candidates| candidates.iter().copied().find(|idx| !consumed[*idx]));
            let Some(idx) = next else {
                break;
            };
            consumed[idx] = true;

            let mut fragment = open[idx].clone();
            if fragment.first() != tail {
                fragment = fragment.reversed();
            }
            tail = fragment.last();
            chain.push(fragment);
        }

        let distinct_nodes = chain
            .iter()
            .flat_map(|fragment| fragment.nodes.iter())
            .collect::<HashSet<_>>()
            .len();
        if tail == head && distinct_nodes >= 3 {
            joined.rings.push(ClosedRing { fragments: chain });
        } else {
            joined.remnants.push(Remnant { fragments: chain });
        }
    }

    joined
}

#[cfg(test)]
mod tests {
    use super::*;

    fn way(id: OsmId, nodes: &[OsmId]) -> Way {
        Way::new(id, nodes.to_vec())
    }

    fn total_node_references(ways: &[Way]) -> usize {
        ways.iter().map(|way| way.nodes.len()).sum()
    }

    fn consumed_node_references(joined: &JoinedWays) -> usize {
        joined.rings.iter().map(ClosedRing::node_reference_count).sum::<usize>()
            + joined.remnants.iter().map(Remnant::node_reference_count).sum::<usize>()
    }

    #[test]
    fn closed_way_is_its_own_ring() {
        let ways = vec![way(1, &[1, 2, 3, 4, 1])];
        let joined = join_way_soup(&ways);

        assert!(joined.is_closed());
        assert_eq!(joined.rings.len(), 1);
        assert_eq!(joined.rings[0].nodes(), vec![1, 2, 3, 4, 1]);
    }

    #[test]
    fn shuffled_and_reversed_fragments_close_into_one_ring() {
        // 1 -> 2 -> 3 -> 4 -> 5 -> 6 -> 1, split into three pieces, one of them reversed
        let ways = vec![way(30, &[5, 6, 1]), way(10, &[1, 2, 3]), way(20, &[5, 4, 3])];
        let joined = join_way_soup(&ways);

        assert!(joined.is_closed());
        assert_eq!(joined.rings.len(), 1);
        let ring = &joined.rings[0];
        assert_eq!(ring.nodes(), vec![5, 6, 1, 2, 3, 4, 5]);
        assert_eq!(ring.way_ids(), vec![30, 10, 20]);
        assert!(ring.fragments[2].reversed);

        let mut distinct = ring.nodes();
        distinct.pop();
        distinct.sort();
        distinct.dedup();
        assert_eq!(distinct.len(), 6);
    }

    #[test]
    fn rejoining_a_ring_is_idempotent() {
        let ways = vec![way(2, &[3, 4, 1]), way(1, &[1, 2, 3])];
        let first = join_way_soup(&ways);
        let ring = &first.rings[0];

        let as_way = way(99, &ring.nodes());
        let second = join_way_soup([&as_way]);
        assert_eq!(second.rings.len(), 1);
        assert_eq!(second.rings[0].nodes(), ring.nodes());
    }

    #[test]
    fn fragments_are_conserved() {
        let ways = vec![
            way(1, &[1, 2, 3]),
            way(2, &[3, 4, 1]),
            way(3, &[10, 11, 12]),
            way(4, &[20, 21, 22, 20]),
            way(5, &[]),
            way(6, &[7]),
        ];
        let joined = join_way_soup(&ways);

        assert_eq!(consumed_node_references(&joined), total_node_references(&ways));
        assert_eq!(joined.rings.len(), 2);
        assert_eq!(joined.remnants.len(), 3);
    }

    #[test]
    fn dangling_fragment_is_reported_with_its_ends() {
        let ways = vec![way(1, &[1, 2, 3]), way(2, &[3, 4])];
        let joined = join_way_soup(&ways);

        assert!(!joined.is_closed());
        assert!(joined.rings.is_empty());
        let ends = joined.remnants[0].ends();
        assert_eq!(ends.way_ids, vec![1, 2]);
        assert_eq!((ends.start_node, ends.end_node), (Some(1), Some(4)));
    }

    #[test]
    fn back_and_forth_is_not_a_ring() {
        let ways = vec![way(1, &[1, 2]), way(2, &[2, 1])];
        let joined = join_way_soup(&ways);

        assert!(joined.rings.is_empty());
        assert_eq!(joined.remnants.len(), 1);
    }

    #[test]
    fn branching_picks_lowest_way_id() {
        // Node 2 is a junction between way 5 and way 3; both lead back to node 1.
        let ways = vec![way(1, &[1, 2]), way(5, &[2, 9, 1]), way(3, &[2, 8, 1])];
        let joined = join_way_soup(&ways);

        assert_eq!(joined.rings.len(), 1);
        assert_eq!(joined.rings[0].way_ids(), vec![1, 3]);
        assert_eq!(joined.remnants.len(), 1);
        assert_eq!(joined.remnants[0].way_ids(), vec![5]);
    }

    #[test]
    fn two_disjoint_rings() {
        let ways = vec![way(1, &[1, 2, 3]), way(2, &[10, 11, 12, 10]), way(3, &[3, 4, 1])];
        let joined = join_way_soup(&ways);

        assert!(joined.is_closed());
        assert_eq!(joined.rings.len(), 2);
    }
}
