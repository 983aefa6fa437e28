use std::collections::{BTreeSet, HashSet};

use tracing::{debug, warn};

use crate::hydro_data::feature::{CoordKey, RawFeature};

use super::coord_index::CoordIndex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TraceDirection {
    /// Reached through a feature's start coordinate.
    Upstream,
    /// Reached through a feature's end coordinate.
    Downstream,
}

/// Grows a set of connected features from seeds. Each direction has its own admission
/// predicate and its own visited set, so a coordinate explored upstream can still be
/// explored downstream later on.
pub struct NetworkTracer<'a, U, D>
where
    U: Fn(&RawFeature) -> bool,
    D: Fn(&RawFeature) -> bool,
{
    features: &'a [RawFeature],
    index: &'a CoordIndex,
    upstream_filter: U,
    downstream_filter: D,
}

impl<'a, U, D> NetworkTracer<'a, U, D>
where
    U: Fn(&RawFeature) -> bool,
    D: Fn(&RawFeature) -> bool,
{
    pub fn new(
        features: &'a [RawFeature],
        index: &'a CoordIndex,
        upstream_filter: U,
        downstream_filter: D,
    ) -> Self {
        Self {
            features,
            index,
            upstream_filter,
            downstream_filter,
        }
    }

    fn accepts(&self, direction: TraceDirection, feature: &RawFeature) -> bool {
        match direction {
            TraceDirection::Upstream => (self.upstream_filter)(feature),
            TraceDirection::Downstream => (self.downstream_filter)(feature),
        }
    }

    fn push_endpoints(
        feature: &RawFeature,
        to_check: &mut Vec<(CoordKey, TraceDirection)>,
    ) -> () {
        to_check.push((feature.first().key(), TraceDirection::Upstream));
        to_check.push((feature.last().key(), TraceDirection::Downstream));
    }

    pub fn trace(&self, seeds: &BTreeSet<usize>) -> BTreeSet<usize> {
        let mut checked_upstream: HashSet<CoordKey> = HashSet::new();
        let mut checked_downstream: HashSet<CoordKey> = HashSet::new();
        let mut to_check: Vec<(CoordKey, TraceDirection)> = Vec::new();
        let mut result: BTreeSet<usize> = BTreeSet::new();

        for &seed in seeds {
            match self.features.get(seed) {
                Some(feature) => {
                    Self::push_endpoints(feature, &mut to_check);
                    result.insert(seed);
                }
                None => warn!(seed, "Seed feature does not exist, ignoring it"),
            }
        }

        let mut pops = 0usize;
        while let Some((coord, direction)) = to_check.pop() {
            pops += 1;
            let checked = match direction {
                TraceDirection::Upstream => &mut checked_upstream,
                TraceDirection::Downstream => &mut checked_downstream,
            };
            if !checked.insert(coord) {
                continue;
            }
            let candidates = match self.index.features_at_key(&coord) {
                None => continue,
                Some(candidates) => candidates,
            };
            for &candidate_idx in candidates {
                if result.contains(&candidate_idx) {
                    continue;
                }
                let candidate = &self.features[candidate_idx];
                if self.accepts(direction, candidate) {
                    result.insert(candidate_idx);
                    Self::push_endpoints(candidate, &mut to_check);
                }
            }
        }

        debug!(
            seeds = seeds.len(),
            result = result.len(),
            pops,
            upstream_checked = checked_upstream.len(),
            downstream_checked = checked_downstream.len(),
            "Trace done"
        );

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{is_anonymous, test_network_1};

    #[test]
    fn always_false_returns_seeds() {
        let features = test_network_1();
        let index = CoordIndex::build(&features);
        let tracer = NetworkTracer::new(&features, &index, |_| false, |_| false);

        let seeds = BTreeSet::from([0, 2]);
        assert_eq!(tracer.trace(&seeds), seeds);
    }

    #[test]
    fn always_true_returns_connected_component() {
        let features = test_network_1();
        let index = CoordIndex::build(&features);
        let tracer = NetworkTracer::new(&features, &index, |_| true, |_| true);

        let res = tracer.trace(&BTreeSet::from([0]));
        assert_eq!(res, (0..=8).collect::<BTreeSet<_>>());
    }

    #[test]
    fn seeds_are_kept_even_when_rejected_by_filters() {
        let features = test_network_1();
        let index = CoordIndex::build(&features);
        let tracer = NetworkTracer::new(&features, &index, is_anonymous, is_anonymous);

        let seeds = BTreeSet::from([4, 9]);
        let res = tracer.trace(&seeds);
        assert!(res.is_superset(&seeds));
    }

    #[test]
    fn unknown_seed_is_ignored() {
        let features = test_network_1();
        let index = CoordIndex::build(&features);
        let tracer = NetworkTracer::new(&features, &index, |_| true, |_| true);

        assert_eq!(tracer.trace(&BTreeSet::from([9, 1000])), BTreeSet::from([9]));
    }

    #[test]
    fn anonymous_trace_stops_at_named_features() {
        let features = test_network_1();
        let index = CoordIndex::build(&features);
        let tracer = NetworkTracer::new(&features, &index, is_anonymous, is_anonymous);

        let res = tracer.trace(&BTreeSet::from([0, 2]));
        assert_eq!(res, BTreeSet::from([0, 1, 2, 3, 6, 8]));
    }

    #[test]
    fn upstream_only_filter_follows_direction() {
        let features = test_network_1();
        let index = CoordIndex::build(&features);
        let tracer = NetworkTracer::new(&features, &index, |_| true, |_| false);

        // everything flowing into feature 2, nothing below it
        let res = tracer.trace(&BTreeSet::from([2]));
        assert_eq!(res, BTreeSet::from([0, 1, 2, 5, 6, 7]));
    }

    #[test]
    fn result_is_closed_under_filters() {
        let features = test_network_1();
        let index = CoordIndex::build(&features);
        let tracer = NetworkTracer::new(&features, &index, |_| true, is_anonymous);
        let res = tracer.trace(&BTreeSet::from([0, 2]));

        for &member in &res {
            let feature = &features[member];
            for &neighbour in index.features_at(feature.first()).unwrap() {
                assert!(res.contains(&neighbour), "upstream {neighbour} of {member}");
            }
            for &neighbour in index.features_at(feature.last()).unwrap() {
                if is_anonymous(&features[neighbour]) {
                    assert!(res.contains(&neighbour), "downstream {neighbour} of {member}");
                }
            }
        }
    }
}
