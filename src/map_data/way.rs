use std::fmt::Debug;

use super::{node::MapDataNodeRef, tags::Tags};

#[derive(Clone)]
pub struct MapDataWay {
    pub id: i64,
    pub nodes: Vec<MapDataNodeRef>,
    pub tags: Tags,
}

impl MapDataWay {
    pub fn first_node(&self) -> Option<MapDataNodeRef> {
        self.nodes.first().copied()
    }

    pub fn last_node(&self) -> Option<MapDataNodeRef> {
        self.nodes.last().copied()
    }

    pub fn name(&self) -> Option<&str> {
        self.tags
            .get("name")
            .map(|name| name.as_ref())
            .filter(|name| !name.is_empty())
    }

    pub fn reverse_nodes(&mut self) -> () {
        self.nodes.reverse();
    }
}

impl PartialEq for MapDataWay {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Debug for MapDataWay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "MapDataWay
    id={}
    nodes={:?}
    tags={:?}",
            self.id,
            self.nodes.iter().map(|n| n.idx()).collect::<Vec<_>>(),
            self.tags,
        )
    }
}
