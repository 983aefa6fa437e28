use std::collections::{BTreeSet, HashMap};

use crate::hydro_data::feature::{CoordKey, Coordinate, RawFeature};

/// Endpoint coordinate to the features starting or ending there.
pub struct CoordIndex {
    features_by_coord: HashMap<CoordKey, BTreeSet<usize>>,
}

impl CoordIndex {
    pub fn new() -> Self {
        Self {
            features_by_coord: HashMap::new(),
        }
    }

    pub fn build(features: &[RawFeature]) -> Self {
        let mut index = Self::new();
        for (feature_idx, feature) in features.iter().enumerate() {
            index.insert(feature.first().key(), feature_idx);
            index.insert(feature.last().key(), feature_idx);
        }
        index
    }

    pub fn insert(&mut self, key: CoordKey, feature_idx: usize) -> () {
        self.features_by_coord
            .entry(key)
            .or_default()
            .insert(feature_idx);
    }

    pub fn features_at_key(&self, key: &CoordKey) -> Option<&BTreeSet<usize>> {
        self.features_by_coord.get(key)
    }

    pub fn features_at(&self, coord: &Coordinate) -> Option<&BTreeSet<usize>> {
        self.features_at_key(&coord.key())
    }

    pub fn len(&self) -> usize {
        self.features_by_coord.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features_by_coord.is_empty()
    }
}
