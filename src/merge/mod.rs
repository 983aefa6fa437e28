use std::{
    collections::{BTreeSet, HashMap},
    time::Instant,
};

use tracing::{debug, info, trace, warn};

use crate::map_data::{graph::MapDataGraph, node::MapDataNodeRef};

use self::bearing::ways_angle;

pub mod bearing;

#[derive(Debug, Clone, PartialEq)]
pub struct MergeReport {
    /// Way index to the way index it was merged into, identity for kept ways.
    pub redirects: Vec<usize>,
    pub merged: usize,
    /// Ways whose merge candidate was the way itself.
    pub loops: Vec<usize>,
}

impl MergeReport {
    /// Way holding the nodes of `way_idx` after merging.
    pub fn resolve(&self, way_idx: usize) -> usize {
        let mut idx = way_idx;
        while self.redirects[idx] != idx {
            idx = self.redirects[idx];
        }
        idx
    }
}

/// Collapses chains of ways where one way continues another with identical tags.
/// Ways are visited once, in arena order; a way is appended to the way ending at its
/// first node.
pub struct WayMerger<'a> {
    graph: &'a mut MapDataGraph,
    node_begins: HashMap<MapDataNodeRef, BTreeSet<usize>>,
    node_ends: HashMap<MapDataNodeRef, BTreeSet<usize>>,
    redirects: Vec<usize>,
}

impl<'a> WayMerger<'a> {
    pub fn new(graph: &'a mut MapDataGraph) -> Self {
        let mut node_begins: HashMap<MapDataNodeRef, BTreeSet<usize>> = HashMap::new();
        let mut node_ends: HashMap<MapDataNodeRef, BTreeSet<usize>> = HashMap::new();
        for (way_idx, way) in graph.ways() {
            if let (Some(first), Some(last)) = (way.first_node(), way.last_node()) {
                node_begins.entry(first).or_default().insert(way_idx);
                node_ends.entry(last).or_default().insert(way_idx);
            }
        }
        let redirects = (0..graph.way_slots()).collect();
        Self {
            graph,
            node_begins,
            node_ends,
            redirects,
        }
    }

    fn find(&mut self, way_idx: usize) -> usize {
        let mut root = way_idx;
        while self.redirects[root] != root {
            root = self.redirects[root];
        }
        let mut idx = way_idx;
        while self.redirects[idx] != root {
            let next = self.redirects[idx];
            self.redirects[idx] = root;
            idx = next;
        }
        root
    }

    fn ways_ending_at(&self, node: MapDataNodeRef) -> Vec<usize> {
        self.node_ends
            .get(&node)
            .map_or(Vec::new(), |ways| ways.iter().copied().collect())
    }

    /// Way the current way would be appended to, before checking tags and geometry.
    /// Prefers a way of the same name, then the only way ending at the junction, then
    /// the way turning the least into the current one.
    pub fn select_candidate(&mut self, way_idx: usize) -> Option<usize> {
        let way = self.graph.way(way_idx)?;
        let first = way.first_node()?;
        let name = way.name().map(|name| name.to_string());

        let ending_here = self.ways_ending_at(first);
        let resolved = ending_here
            .iter()
            .map(|idx| self.find(*idx))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect::<Vec<_>>();

        if let Some(name) = name {
            let same_name = resolved.iter().copied().find(|idx| {
                self.graph
                    .way(*idx)
                    .map_or(false, |prev| prev.name() == Some(name.as_str()))
            });
            if same_name.is_some() {
                return same_name;
            }
        }

        match resolved.len() {
            0 => None,
            1 => Some(resolved[0]),
            _ => {
                let way = self.graph.way(way_idx)?;
                resolved
                    .iter()
                    .copied()
                    .filter_map(|idx| self.graph.way(idx).map(|prev| (idx, prev)))
                    .map(|(idx, prev)| (idx, ways_angle(&self.graph, prev, way)))
                    .inspect(|(idx, angle)| trace!(way_idx, candidate = idx, angle, "Turn"))
                    .min_by(|(_, a), (_, b)| a.total_cmp(b))
                    .map(|(idx, _)| idx)
            }
        }
    }

    fn can_merge(&self, prev_idx: usize, way_idx: usize) -> bool {
        match (self.graph.way(prev_idx), self.graph.way(way_idx)) {
            (Some(prev), Some(way)) => {
                prev.tags == way.tags && prev.last_node() == way.first_node()
            }
            _ => false,
        }
    }

    fn merge_into(&mut self, prev_idx: usize, way_idx: usize) -> () {
        let way = match self.graph.remove_way(way_idx) {
            Some(way) => way,
            None => return,
        };
        if let Some(prev) = self.graph.way_mut(prev_idx) {
            trace!(way_id = way.id, into = prev.id, "Merging way");
            prev.nodes.extend_from_slice(&way.nodes[1..]);
        }
        self.redirects[way_idx] = prev_idx;
    }

    #[tracing::instrument(skip_all)]
    pub fn merge(mut self) -> MergeReport {
        let start = Instant::now();
        let ways_before = self.graph.way_count();
        let mut merged = 0;
        let mut loops = Vec::new();

        for way_idx in 0..self.graph.way_slots() {
            if self.graph.way(way_idx).is_none() {
                continue;
            }
            let prev_idx = match self.select_candidate(way_idx) {
                Some(prev_idx) => prev_idx,
                None => continue,
            };
            if prev_idx == way_idx {
                if self.can_merge(prev_idx, way_idx) {
                    warn!(
                        way_id = ?self.graph.way(way_idx).map(|way| way.id),
                        "Way closes a loop onto itself, left unmerged"
                    );
                    loops.push(way_idx);
                }
                continue;
            }
            if self.can_merge(prev_idx, way_idx) {
                self.merge_into(prev_idx, way_idx);
                merged += 1;
            }
        }

        debug!(
            begins = self.node_begins.len(),
            ends = self.node_ends.len(),
            "Junction index"
        );
        info!(
            before = ways_before,
            after = self.graph.way_count(),
            merged,
            loops = loops.len(),
            elapsed = ?start.elapsed(),
            "Ways merged"
        );

        MergeReport {
            redirects: self.redirects,
            merged,
            loops,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        map_data::tags::{tag_value, Tags},
        test_utils::{graph_from_ways, node_ids},
    };

    fn tags(pairs: &[(&str, &str)]) -> Tags {
        pairs
            .iter()
            .map(|(key, value)| (key.to_string(), tag_value(value)))
            .collect()
    }

    #[test]
    fn two_ways_with_same_tags_merge() {
        // 0 - - 1 - - 2
        let (mut graph, ways) = graph_from_ways(
            &[(0., 0.), (0., 1.), (0., 2.)],
            &[
                (vec![0, 1], tags(&[("waterway", "stream")])),
                (vec![1, 2], tags(&[("waterway", "stream")])),
            ],
        );
        let report = WayMerger::new(&mut graph).merge();

        assert_eq!(graph.way_count(), 1);
        assert_eq!(node_ids(&graph, ways[0]), vec![-1, -2, -3]);
        assert_eq!(report.merged, 1);
        assert_eq!(report.resolve(ways[1]), ways[0]);
    }

    #[test]
    fn three_collinear_ways_become_one() {
        // 0 - - 1 - - 2 - - 3, processed out of order
        let stream = tags(&[("waterway", "stream"), ("name", "La Vire")]);
        let (mut graph, ways) = graph_from_ways(
            &[(0., 0.), (0., 1.), (0., 2.), (0., 3.)],
            &[
                (vec![1, 2], stream.clone()),
                (vec![0, 1], stream.clone()),
                (vec![2, 3], stream.clone()),
            ],
        );
        let length_before = graph.total_length();
        let report = WayMerger::new(&mut graph).merge();

        assert_eq!(graph.way_count(), 1);
        let (kept, _) = graph.ways().next().unwrap();
        assert_eq!(kept, ways[1]);
        assert_eq!(node_ids(&graph, kept), vec![-1, -2, -3, -4]);
        for way_idx in &ways {
            assert_eq!(report.resolve(*way_idx), kept);
        }
        assert!((graph.total_length() - length_before).abs() < 1e-6);
    }

    #[test]
    fn different_tags_are_not_merged() {
        let (mut graph, _) = graph_from_ways(
            &[(0., 0.), (0., 1.), (0., 2.)],
            &[
                (vec![0, 1], tags(&[("waterway", "stream")])),
                (vec![1, 2], tags(&[("waterway", "river")])),
            ],
        );
        let report = WayMerger::new(&mut graph).merge();

        assert_eq!(graph.way_count(), 2);
        assert_eq!(report.merged, 0);
    }

    #[test]
    fn opposite_directions_are_not_merged() {
        // 0 - > 1 < - 2
        let stream = tags(&[("waterway", "stream")]);
        let (mut graph, _) = graph_from_ways(
            &[(0., 0.), (0., 1.), (0., 2.)],
            &[(vec![0, 1], stream.clone()), (vec![2, 1], stream.clone())],
        );
        WayMerger::new(&mut graph).merge();

        assert_eq!(graph.way_count(), 2);
    }

    #[test]
    fn smallest_turn_wins_at_junction() {
        //        3
        //        |
        //        v
        // 0 - -> 1 - -> 2
        let stream = tags(&[("waterway", "stream")]);
        let (mut graph, ways) = graph_from_ways(
            &[(0., 0.), (0., 1.), (0., 2.), (1., 1.)],
            &[
                (vec![3, 1], stream.clone()),
                (vec![0, 1], stream.clone()),
                (vec![1, 2], stream.clone()),
            ],
        );
        let report = WayMerger::new(&mut graph).merge();

        assert_eq!(report.resolve(ways[2]), ways[1]);
        assert_eq!(node_ids(&graph, ways[1]), vec![-1, -2, -3]);
        assert_eq!(node_ids(&graph, ways[0]), vec![-4, -2]);
    }

    #[test]
    fn unmatched_name_falls_back_to_smallest_turn() {
        let (mut graph, ways) = graph_from_ways(
            &[(0., 0.), (0., 1.), (0., 2.), (1., 1.)],
            &[
                (vec![3, 1], tags(&[("waterway", "stream")])),
                (vec![0, 1], tags(&[("waterway", "stream")])),
                (vec![1, 2], tags(&[("waterway", "stream"), ("name", "Le Ru")])),
            ],
        );

        let mut merger = WayMerger::new(&mut graph);
        assert_eq!(merger.select_candidate(ways[2]), Some(ways[1]));
        let report = merger.merge();

        assert_eq!(report.merged, 0);
        assert_eq!(graph.way_count(), 3);
    }

    #[test]
    fn same_name_beats_smaller_turn() {
        //        3
        //        |
        //        v
        // 0 - -> 1 - -> 2
        let named = tags(&[("waterway", "stream"), ("name", "Le Ru")]);
        let other = tags(&[("waterway", "stream"), ("name", "La Vire")]);
        let (mut graph, ways) = graph_from_ways(
            &[(0., 0.), (0., 1.), (0., 2.), (1., 1.)],
            &[
                (vec![3, 1], named.clone()),
                (vec![0, 1], other),
                (vec![1, 2], named),
            ],
        );

        let mut merger = WayMerger::new(&mut graph);
        assert_eq!(merger.select_candidate(ways[2]), Some(ways[0]));
        let report = merger.merge();

        assert_eq!(report.resolve(ways[2]), ways[0]);
        assert_eq!(node_ids(&graph, ways[0]), vec![-4, -2, -3]);
    }

    #[test]
    fn candidate_with_other_tags_blocks_merge() {
        // the name match wins candidate selection even if its other tags differ
        let named = tags(&[("waterway", "stream"), ("name", "Le Ru")]);
        let named_river = tags(&[("waterway", "river"), ("name", "Le Ru")]);
        let (mut graph, _) = graph_from_ways(
            &[(0., 0.), (0., 1.), (0., 2.), (1., 1.)],
            &[
                (vec![3, 1], named_river),
                (vec![0, 1], named.clone()),
                (vec![1, 2], named),
            ],
        );
        WayMerger::new(&mut graph).merge();

        assert_eq!(graph.way_count(), 3);
    }

    #[test]
    fn single_way_loop_is_reported() {
        // 0 -> 1 -> 2 -> 0
        let stream = tags(&[("waterway", "stream")]);
        let (mut graph, ways) = graph_from_ways(
            &[(0., 0.), (0., 1.), (1., 1.)],
            &[(vec![0, 1, 2, 0], stream)],
        );
        let report = WayMerger::new(&mut graph).merge();

        assert_eq!(report.loops, vec![ways[0]]);
        assert_eq!(node_ids(&graph, ways[0]), vec![-1, -2, -3, -1]);
    }

    #[test]
    fn merging_twice_changes_nothing() {
        let stream = tags(&[("waterway", "stream")]);
        let (mut graph, _) = graph_from_ways(
            &[(0., 0.), (0., 1.), (0., 2.), (1., 1.)],
            &[
                (vec![0, 1], stream.clone()),
                (vec![1, 2], stream.clone()),
                (vec![3, 1], stream),
            ],
        );
        WayMerger::new(&mut graph).merge();
        let ways_once = graph
            .ways()
            .map(|(idx, _)| node_ids(&graph, idx))
            .collect::<Vec<_>>();

        let report = WayMerger::new(&mut graph).merge();
        let ways_twice = graph
            .ways()
            .map(|(idx, _)| node_ids(&graph, idx))
            .collect::<Vec<_>>();

        assert_eq!(report.merged, 0);
        assert_eq!(ways_once, ways_twice);
    }
}
