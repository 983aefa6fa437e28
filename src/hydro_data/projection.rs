use proj4rs::proj::Proj;

use super::feature::Coordinate;

pub const WGS84_PROJ_STRING: &str = "+proj=longlat +ellps=WGS84 +datum=WGS84 +no_defs";
pub const LAMBERT_93_PROJ_STRING: &str = "+proj=lcc +lat_0=46.5 +lon_0=3 +lat_1=49 +lat_2=44 +x_0=700000 +y_0=6600000 +ellps=GRS80 +towgs84=0,0,0,0,0,0,0 +units=m +no_defs";

#[derive(Debug, thiserror::Error)]
pub enum ProjectionError {
    #[error("Invalid projection definition '{definition}': {error}")]
    Definition {
        definition: String,
        error: proj4rs::errors::Error,
    },

    #[error("Failed to transform ({x}, {y}): {error}")]
    Transform {
        x: f64,
        y: f64,
        error: proj4rs::errors::Error,
    },
}

/// Coordinate reference system the source features are expressed in.
#[derive(Debug, Clone, PartialEq)]
pub enum SourceCrs {
    Wgs84,
    Proj4 { definition: String },
}

impl SourceCrs {
    pub fn lambert_93() -> Self {
        SourceCrs::Proj4 {
            definition: LAMBERT_93_PROJ_STRING.to_string(),
        }
    }

    pub fn transform(&self) -> Result<Box<dyn CoordTransform>, ProjectionError> {
        match self {
            SourceCrs::Wgs84 => Ok(Box::new(IdentityTransform)),
            SourceCrs::Proj4 { definition } => {
                Ok(Box::new(Proj4Transform::new(definition.as_str())?))
            }
        }
    }
}

impl std::fmt::Display for SourceCrs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceCrs::Wgs84 => write!(f, "{WGS84_PROJ_STRING}"),
            SourceCrs::Proj4 { definition } => write!(f, "{definition}"),
        }
    }
}

/// Source CRS to WGS84 longitude/latitude. Output `x` is the longitude and `y` the
/// latitude, both in degrees; elevation is passed along.
pub trait CoordTransform {
    fn transform(&self, coord: &Coordinate) -> Result<Coordinate, ProjectionError>;
}

pub struct IdentityTransform;

impl CoordTransform for IdentityTransform {
    fn transform(&self, coord: &Coordinate) -> Result<Coordinate, ProjectionError> {
        Ok(*coord)
    }
}

pub struct Proj4Transform {
    from: Proj,
    to: Proj,
}

impl Proj4Transform {
    pub fn new(definition: &str) -> Result<Self, ProjectionError> {
        let from =
            Proj::from_proj_string(definition).map_err(|error| ProjectionError::Definition {
                definition: definition.to_string(),
                error,
            })?;
        let to = Proj::from_proj_string(WGS84_PROJ_STRING).map_err(|error| {
            ProjectionError::Definition {
                definition: WGS84_PROJ_STRING.to_string(),
                error,
            }
        })?;
        Ok(Self { from, to })
    }
}

impl CoordTransform for Proj4Transform {
    fn transform(&self, coord: &Coordinate) -> Result<Coordinate, ProjectionError> {
        let mut point = if self.from.is_latlong() {
            (coord.x.to_radians(), coord.y.to_radians(), coord.z.unwrap_or(0.))
        } else {
            (coord.x, coord.y, coord.z.unwrap_or(0.))
        };
        proj4rs::transform::transform(&self.from, &self.to, &mut point).map_err(|error| {
            ProjectionError::Transform {
                x: coord.x,
                y: coord.y,
                error,
            }
        })?;
        // proj4rs works in radians on geographic systems
        Ok(Coordinate {
            x: point.0.to_degrees(),
            y: point.1.to_degrees(),
            z: coord.z.map(|_| point.2),
        })
    }
}
