use std::{collections::HashMap, time::Instant};

use tracing::{info, trace};

use crate::hydro_data::{
    feature::{CoordKey, RawFeature},
    projection::{CoordTransform, ProjectionError},
};

use super::{
    graph::MapDataGraph,
    node::MapDataNodeRef,
    tags::{tag_value, Tags, ValueCache},
    MapDataError,
};

const MIN_ELEVATION: f64 = 0.;
const MAX_ELEVATION: f64 = 5000.;

#[derive(Debug, thiserror::Error)]
pub enum MapDataBuildError {
    #[error("Failed to project feature {index}: {error}")]
    Projection {
        index: usize,
        error: ProjectionError,
    },

    #[error("Failed to create way for feature {index}: {error}")]
    MapData { index: usize, error: MapDataError },
}

/// Turns source features into a graph: one node per distinct source position, then one
/// way per feature carrying the feature's attributes as tags.
pub struct MapDataBuilder<'a> {
    transform: &'a dyn CoordTransform,
    cache: &'a mut ValueCache,
}

impl<'a> MapDataBuilder<'a> {
    pub fn new(transform: &'a dyn CoordTransform, cache: &'a mut ValueCache) -> Self {
        Self { transform, cache }
    }

    fn elevation_tag(z: Option<f64>) -> Option<String> {
        z.filter(|z| (MIN_ELEVATION..MAX_ELEVATION).contains(z))
            .map(|z| z.to_string())
    }

    #[tracing::instrument(skip_all)]
    pub fn build<'f>(
        &mut self,
        features: impl Iterator<Item = (usize, &'f RawFeature)> + Clone,
    ) -> Result<MapDataGraph, MapDataBuildError> {
        let start = Instant::now();
        let mut graph = MapDataGraph::new();
        let mut node_by_coord: HashMap<CoordKey, MapDataNodeRef> = HashMap::new();

        for (index, feature) in features.clone() {
            let last_pos = feature.coordinates().len() - 1;
            for (pos, coord) in feature.coordinates().iter().enumerate() {
                let is_endpoint = pos == 0 || pos == last_pos;
                if let Some(node_ref) = node_by_coord.get(&coord.key()) {
                    if is_endpoint && !graph.node(*node_ref).tags.contains_key("ele") {
                        if let Some(ele) = Self::elevation_tag(coord.z) {
                            trace!(index, %ele, "Elevation added to shared node");
                            graph
                                .node_mut(*node_ref)
                                .tags
                                .insert(String::from("ele"), tag_value(&ele));
                        }
                    }
                    continue;
                }
                let projected = self
                    .transform
                    .transform(coord)
                    .map_err(|error| MapDataBuildError::Projection { index, error })?;
                let mut tags = Tags::new();
                if is_endpoint {
                    if let Some(ele) = Self::elevation_tag(projected.z) {
                        tags.insert(String::from("ele"), tag_value(&ele));
                    }
                }
                let node_ref = graph.create_node(projected.y, projected.x, tags);
                node_by_coord.insert(coord.key(), node_ref);
            }
        }

        for (index, feature) in features {
            let nodes = feature
                .coordinates()
                .iter()
                .filter_map(|coord| node_by_coord.get(&coord.key()).copied())
                .collect::<Vec<_>>();
            let tags = feature
                .attributes()
                .map(|(key, value)| (key.clone(), self.cache.intern(value)))
                .collect::<Tags>();
            graph
                .create_way(nodes, tags)
                .map_err(|error| MapDataBuildError::MapData { index, error })?;
        }

        info!(
            nodes = graph.node_count(),
            ways = graph.way_count(),
            elapsed = ?start.elapsed(),
            "Map data built"
        );

        Ok(graph)
    }
}
