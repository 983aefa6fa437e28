use std::collections::HashMap;

#[derive(Clone, Debug, PartialEq)]
pub struct OsmNode {
    pub id: i64,
    pub lat: f64,
    pub lon: f64,
    pub tags: Option<HashMap<String, String>>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct OsmWay {
    pub id: i64,
    pub node_ids: Vec<i64>,
    pub tags: Option<HashMap<String, String>>,
}
