use std::{
    collections::BTreeMap,
    fmt::{Debug, Display},
};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Coordinate {
    pub x: f64,
    pub y: f64,
    pub z: Option<f64>,
}

impl Coordinate {
    pub fn new(x: f64, y: f64, z: Option<f64>) -> Self {
        Self { x, y, z }
    }

    pub fn key(&self) -> CoordKey {
        CoordKey::from(self)
    }
}

/// Exact-match key of a planar position. Two positions are the same point only when
/// their `x` and `y` bit patterns are identical; elevation is not part of the key.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CoordKey {
    x_bits: u64,
    y_bits: u64,
}

impl CoordKey {
    pub fn new(x: f64, y: f64) -> Self {
        Self {
            x_bits: x.to_bits(),
            y_bits: y.to_bits(),
        }
    }

    pub fn x(&self) -> f64 {
        f64::from_bits(self.x_bits)
    }

    pub fn y(&self) -> f64 {
        f64::from_bits(self.y_bits)
    }
}

impl From<&Coordinate> for CoordKey {
    fn from(value: &Coordinate) -> Self {
        CoordKey::new(value.x, value.y)
    }
}

impl Debug for CoordKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "CoordKey({}, {})", self.x(), self.y())
    }
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum FeatureError {
    #[error("Feature {index} is a {geometry}, only single LineString features are supported")]
    NotALineString { index: usize, geometry: String },

    #[error("Feature {index} has {count} coordinate(s), at least 2 are needed")]
    TooFewCoordinates { index: usize, count: usize },
}

/// One source record: a polyline and its attributes, as read from the source file.
#[derive(Clone)]
pub struct RawFeature {
    coordinates: Vec<Coordinate>,
    attributes: BTreeMap<String, Option<String>>,
}

impl RawFeature {
    pub fn new(
        index: usize,
        coordinates: Vec<Coordinate>,
        attributes: BTreeMap<String, Option<String>>,
    ) -> Result<Self, FeatureError> {
        if coordinates.len() < 2 {
            return Err(FeatureError::TooFewCoordinates {
                index,
                count: coordinates.len(),
            });
        }
        Ok(Self {
            coordinates,
            attributes,
        })
    }

    pub fn coordinates(&self) -> &[Coordinate] {
        &self.coordinates
    }

    pub fn first(&self) -> &Coordinate {
        &self.coordinates[0]
    }

    pub fn last(&self) -> &Coordinate {
        &self.coordinates[self.coordinates.len() - 1]
    }

    /// Non-empty value of an attribute. Null and empty values both read as missing.
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes
            .get(key)
            .and_then(|value| value.as_deref())
            .filter(|value| !value.is_empty())
    }

    pub fn attributes(&self) -> impl Iterator<Item = (&String, &str)> {
        self.attributes
            .iter()
            .filter_map(|(key, value)| value.as_deref().map(|value| (key, value)))
            .filter(|(_, value)| !value.is_empty())
    }
}

impl Debug for RawFeature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "RawFeature
    first={:?}
    last={:?}
    coordinates={}
    attributes={:?}",
            self.first().key(),
            self.last().key(),
            self.coordinates.len(),
            self.attributes
        )
    }
}

impl Display for RawFeature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Feature({},{} -> {},{})",
            self.first().x,
            self.first().y,
            self.last().x,
            self.last().y
        )
    }
}
