use std::collections::HashMap;

use super::{
    node::{MapDataNode, MapDataNodeRef},
    osm::{OsmNode, OsmWay},
    tags::{tag_value, Tags},
    way::MapDataWay,
    MapDataError,
};

fn tags_from_osm(tags: Option<HashMap<String, String>>) -> Tags {
    tags.map_or(Tags::new(), |tags| {
        tags.into_iter()
            .map(|(key, value)| {
                let value = tag_value(&value);
                (key, value)
            })
            .collect()
    })
}

/// Node and way arenas. Ways refer to nodes by arena index; a removed way leaves an
/// empty slot so that way indices stay stable.
pub struct MapDataGraph {
    nodes: Vec<MapDataNode>,
    nodes_map: HashMap<i64, usize>,
    ways: Vec<Option<MapDataWay>>,
    ways_map: HashMap<i64, usize>,
    min_id: i64,
}

impl MapDataGraph {
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            nodes_map: HashMap::new(),
            ways: Vec::new(),
            ways_map: HashMap::new(),
            min_id: 0,
        }
    }

    /// Next unused negative id, shared by nodes and ways.
    pub fn next_id(&mut self) -> i64 {
        self.min_id -= 1;
        self.min_id
    }

    fn track_id(&mut self, id: i64) -> () {
        if id < self.min_id {
            self.min_id = id;
        }
    }

    fn add_node(&mut self, node: MapDataNode) -> Result<MapDataNodeRef, MapDataError> {
        if self.nodes_map.contains_key(&node.id) {
            return Err(MapDataError::DuplicateNode { node_id: node.id });
        }
        self.track_id(node.id);
        let idx = self.nodes.len();
        self.nodes_map.insert(node.id, idx);
        self.nodes.push(node);
        Ok(MapDataNodeRef::new(idx))
    }

    fn add_way(&mut self, way: MapDataWay) -> Result<usize, MapDataError> {
        if self.ways_map.contains_key(&way.id) {
            return Err(MapDataError::DuplicateWay { way_id: way.id });
        }
        if way.nodes.len() < 2 {
            return Err(MapDataError::TooFewNodes {
                way_id: way.id,
                count: way.nodes.len(),
            });
        }
        self.track_id(way.id);
        let idx = self.ways.len();
        self.ways_map.insert(way.id, idx);
        self.ways.push(Some(way));
        Ok(idx)
    }

    pub fn insert_node(&mut self, value: OsmNode) -> Result<MapDataNodeRef, MapDataError> {
        let node = MapDataNode {
            id: value.id,
            lat: value.lat,
            lon: value.lon,
            tags: tags_from_osm(value.tags),
        };
        self.add_node(node)
    }

    pub fn insert_way(&mut self, osm_way: OsmWay) -> Result<usize, MapDataError> {
        let mut nodes = Vec::with_capacity(osm_way.node_ids.len());
        for node_id in &osm_way.node_ids {
            match self.get_node_ref_by_id(*node_id) {
                Some(node_ref) => nodes.push(node_ref),
                None => {
                    return Err(MapDataError::MissingNode {
                        way_id: osm_way.id,
                        node_id: *node_id,
                    })
                }
            }
        }
        self.add_way(MapDataWay {
            id: osm_way.id,
            nodes,
            tags: tags_from_osm(osm_way.tags),
        })
    }

    pub fn create_node(&mut self, lat: f64, lon: f64, tags: Tags) -> MapDataNodeRef {
        let id = self.next_id();
        let idx = self.nodes.len();
        self.nodes_map.insert(id, idx);
        self.nodes.push(MapDataNode { id, lat, lon, tags });
        MapDataNodeRef::new(idx)
    }

    pub fn create_way(
        &mut self,
        nodes: Vec<MapDataNodeRef>,
        tags: Tags,
    ) -> Result<usize, MapDataError> {
        let id = self.next_id();
        if let Some(bad) = nodes.iter().find(|node| node.idx() >= self.nodes.len()) {
            return Err(MapDataError::MissingNodeIndex {
                way_id: id,
                node_idx: bad.idx(),
            });
        }
        self.add_way(MapDataWay { id, nodes, tags })
    }

    pub fn node(&self, node_ref: MapDataNodeRef) -> &MapDataNode {
        &self.nodes[node_ref.idx()]
    }

    pub fn node_mut(&mut self, node_ref: MapDataNodeRef) -> &mut MapDataNode {
        &mut self.nodes[node_ref.idx()]
    }

    pub fn get_node_ref_by_id(&self, id: i64) -> Option<MapDataNodeRef> {
        self.nodes_map.get(&id).map(|idx| MapDataNodeRef::new(*idx))
    }

    pub fn nodes(&self) -> impl Iterator<Item = &MapDataNode> {
        self.nodes.iter()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn way(&self, way_idx: usize) -> Option<&MapDataWay> {
        self.ways.get(way_idx).and_then(|way| way.as_ref())
    }

    pub fn way_mut(&mut self, way_idx: usize) -> Option<&mut MapDataWay> {
        self.ways.get_mut(way_idx).and_then(|way| way.as_mut())
    }

    /// The way together with the node arena, so node tags can be edited while walking
    /// the way's node list.
    pub fn way_and_nodes_mut(
        &mut self,
        way_idx: usize,
    ) -> Option<(&mut MapDataWay, &mut [MapDataNode])> {
        let way = self.ways.get_mut(way_idx).and_then(|way| way.as_mut())?;
        Some((way, self.nodes.as_mut_slice()))
    }

    pub fn remove_way(&mut self, way_idx: usize) -> Option<MapDataWay> {
        let way = self.ways.get_mut(way_idx)?.take()?;
        self.ways_map.remove(&way.id);
        Some(way)
    }

    /// Live ways with their arena index, in arena order.
    pub fn ways(&self) -> impl Iterator<Item = (usize, &MapDataWay)> {
        self.ways
            .iter()
            .enumerate()
            .filter_map(|(idx, way)| way.as_ref().map(|way| (idx, way)))
    }

    /// Number of way slots, removed ways included.
    pub fn way_slots(&self) -> usize {
        self.ways.len()
    }

    pub fn way_count(&self) -> usize {
        self.ways.iter().filter(|way| way.is_some()).count()
    }

    /// Length of a way in meters.
    pub fn way_length(&self, way: &MapDataWay) -> f64 {
        way.nodes
            .windows(2)
            .map(|pair| self.node(pair[0]).distance_to(self.node(pair[1])))
            .sum()
    }

    pub fn total_length(&self) -> f64 {
        self.ways().map(|(_, way)| self.way_length(way)).sum()
    }
}
