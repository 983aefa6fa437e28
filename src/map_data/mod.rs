pub mod builder;
pub mod graph;
pub mod node;
pub mod osm;
pub mod tags;
pub mod way;

#[derive(Debug, PartialEq, Clone, thiserror::Error)]
pub enum MapDataError {
    #[error("Way {way_id} references missing node with ID: {node_id}")]
    MissingNode { way_id: i64, node_id: i64 },

    #[error("Way {way_id} references node index {node_idx} outside of the node table")]
    MissingNodeIndex { way_id: i64, node_idx: usize },

    #[error("Duplicate node ID: {node_id}")]
    DuplicateNode { node_id: i64 },

    #[error("Duplicate way ID: {way_id}")]
    DuplicateWay { way_id: i64 },

    #[error("Way {way_id} has {count} node(s), at least 2 are needed")]
    TooFewNodes { way_id: i64, count: usize },
}
