use std::fmt::Debug;

use geo::{HaversineDistance, Point};

use super::tags::Tags;

#[derive(Clone, PartialEq)]
pub struct MapDataNode {
    pub id: i64,
    pub lat: f64,
    pub lon: f64,
    pub tags: Tags,
}

impl MapDataNode {
    pub fn new(id: i64, lat: f64, lon: f64) -> Self {
        Self {
            id,
            lat,
            lon,
            tags: Tags::new(),
        }
    }

    pub fn point(&self) -> Point {
        Point::new(self.lon, self.lat)
    }

    /// Great-circle distance in meters.
    pub fn distance_to(&self, other: &MapDataNode) -> f64 {
        self.point().haversine_distance(&other.point())
    }
}

impl Debug for MapDataNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "MapDataNode {{ id={}, lat={}, lon={}, tags={:?} }}",
            self.id, self.lat, self.lon, self.tags
        )
    }
}

/// Index of a node in the graph's node arena.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
pub struct MapDataNodeRef(usize);

impl MapDataNodeRef {
    pub(super) fn new(idx: usize) -> Self {
        Self(idx)
    }

    pub fn idx(&self) -> usize {
        self.0
    }
}
