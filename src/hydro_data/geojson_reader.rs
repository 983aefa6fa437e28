use std::{collections::BTreeMap, path::PathBuf, time::Instant};

use geojson::{GeoJson, Value};
use tracing::{trace, warn};

use super::{
    feature::{Coordinate, FeatureError, RawFeature},
    projection::SourceCrs,
    HydroDataError, HydroFeatures, ReadProgress,
};

/// Reads a FeatureCollection of LineStrings. Coordinates are WGS84 unless the caller
/// says otherwise.
pub struct GeoJsonReader<'a> {
    file_name: &'a PathBuf,
    crs_override: Option<SourceCrs>,
}

impl<'a> GeoJsonReader<'a> {
    pub fn new(file_name: &'a PathBuf, crs_override: Option<SourceCrs>) -> Self {
        Self {
            file_name,
            crs_override,
        }
    }

    pub fn read(self) -> Result<HydroFeatures, HydroDataError> {
        let read_start = Instant::now();
        let text = std::fs::read_to_string(self.file_name)
            .map_err(|error| HydroDataError::FileError { error })?;
        let mut features = parse_feature_collection(&text)?;
        if let Some(crs) = self.crs_override {
            features.crs = crs;
        }

        let read_duration = read_start.elapsed();
        trace!(
            read_duration_secs = read_duration.as_secs(),
            "GeoJSON read done"
        );
        Ok(features)
    }
}

pub fn parse_feature_collection(text: &str) -> Result<HydroFeatures, HydroDataError> {
    let geojson = text
        .parse::<GeoJson>()
        .map_err(|error| HydroDataError::GeoJsonParseError { error })?;
    let collection = match geojson {
        GeoJson::FeatureCollection(collection) => collection,
        _ => return Err(HydroDataError::GeoJsonNotACollection),
    };

    let mut progress = ReadProgress::new(collection.features.len());
    let mut features = Vec::with_capacity(collection.features.len());
    let mut skipped = 0;
    for (index, feature) in collection.features.into_iter().enumerate() {
        progress.step(index + 1);
        let attributes = feature
            .properties
            .unwrap_or_default()
            .into_iter()
            .map(|(key, value)| (key, json_value_to_string(value)))
            .collect::<BTreeMap<_, _>>();
        let coordinates = match feature.geometry.map(|geometry| geometry.value) {
            Some(Value::LineString(positions)) => positions
                .iter()
                .map(|position| match position.as_slice() {
                    [x, y] => Some(Coordinate::new(*x, *y, None)),
                    [x, y, z, ..] => Some(Coordinate::new(*x, *y, Some(*z))),
                    _ => None,
                })
                .collect::<Option<Vec<_>>>()
                .ok_or(FeatureError::NotALineString {
                    index,
                    geometry: "LineString with incomplete positions".to_string(),
                }),
            Some(other) => Err(FeatureError::NotALineString {
                index,
                geometry: other.type_name().to_string(),
            }),
            None => Err(FeatureError::NotALineString {
                index,
                geometry: "feature without geometry".to_string(),
            }),
        };
        match coordinates.and_then(|coordinates| RawFeature::new(index, coordinates, attributes))
        {
            Ok(feature) => features.push(feature),
            Err(error) => {
                warn!(error = %error, "Skipping feature");
                skipped += 1;
            }
        }
    }

    Ok(HydroFeatures {
        features,
        crs: SourceCrs::Wgs84,
        skipped,
    })
}

fn json_value_to_string(value: serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::Null => None,
        serde_json::Value::String(value) => Some(value),
        serde_json::Value::Bool(value) => Some(if value { "oui" } else { "non" }.to_string()),
        other => Some(other.to_string()),
    }
}
