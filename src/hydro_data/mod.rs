use std::{io, path::PathBuf};

use feature::RawFeature;
use projection::{ProjectionError, SourceCrs};
use tracing::info;

pub mod dataset_fetch;
pub mod feature;
pub mod geojson_reader;
pub mod projection;
pub mod shp_reader;

#[derive(Debug, thiserror::Error)]
pub enum HydroDataError {
    #[error("File error: {error}")]
    FileError { error: io::Error },

    #[error("Failed to read shapefile: {error}")]
    ShapefileReadError { error: shapefile::Error },

    #[error("Failed to parse GeoJSON: {error}")]
    GeoJsonParseError { error: geojson::Error },

    #[error("GeoJSON document is not a FeatureCollection")]
    GeoJsonNotACollection,

    #[error("Could not recognize the coordinate system of {file:?}, pass it explicitly")]
    UnknownCrs { file: PathBuf },

    #[error("Projection error: {error}")]
    Projection { error: ProjectionError },
}

#[derive(Debug, PartialEq, Clone)]
pub enum DataSource {
    Shapefile { file: PathBuf },
    GeoJson { file: PathBuf },
}

/// Features of one source file, with their declared coordinate system.
#[derive(Debug)]
pub struct HydroFeatures {
    pub features: Vec<RawFeature>,
    pub crs: SourceCrs,
    pub skipped: usize,
}

impl HydroFeatures {
    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}

pub struct HydroDataReader {
    source: DataSource,
    crs_override: Option<SourceCrs>,
}

impl HydroDataReader {
    pub fn new(source: DataSource, crs_override: Option<SourceCrs>) -> Self {
        Self {
            source,
            crs_override,
        }
    }

    #[tracing::instrument(skip(self), fields(source = ?self.source))]
    pub fn read(self) -> Result<HydroFeatures, HydroDataError> {
        let features = match self.source {
            DataSource::Shapefile { ref file } => {
                shp_reader::ShpReader::new(file, self.crs_override.clone()).read()?
            }
            DataSource::GeoJson { ref file } => {
                geojson_reader::GeoJsonReader::new(file, self.crs_override.clone()).read()?
            }
        };
        info!(
            features = features.len(),
            skipped = features.skipped,
            crs = %features.crs,
            "Source read"
        );
        Ok(features)
    }
}

/// Logs read progress every 10 percent.
pub(crate) struct ReadProgress {
    total: usize,
    last_logged: usize,
}

impl ReadProgress {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            last_logged: 0,
        }
    }

    pub fn step(&mut self, done: usize) -> () {
        if self.total == 0 {
            return;
        }
        let percent = 100 * done / self.total;
        if percent >= self.last_logged + 10 {
            self.last_logged = percent - percent % 10;
            info!(percent = self.last_logged, done, total = self.total, "Reading");
        }
    }
}
