use std::{collections::BTreeMap, path::PathBuf, time::Instant};

use shapefile::{dbase::FieldValue, Shape};
use tracing::{trace, warn};

use super::{
    feature::{Coordinate, FeatureError, RawFeature},
    projection::SourceCrs,
    HydroDataError, HydroFeatures, ReadProgress,
};

pub struct ShpReader<'a> {
    file_name: &'a PathBuf,
    crs_override: Option<SourceCrs>,
}

impl<'a> ShpReader<'a> {
    pub fn new(file_name: &'a PathBuf, crs_override: Option<SourceCrs>) -> Self {
        Self {
            file_name,
            crs_override,
        }
    }

    pub fn read(self) -> Result<HydroFeatures, HydroDataError> {
        let read_start = Instant::now();

        let crs = match self.crs_override {
            Some(ref crs) => crs.clone(),
            None => self.read_prj()?,
        };

        let mut reader = shapefile::Reader::from_path(self.file_name)
            .map_err(|error| HydroDataError::ShapefileReadError { error })?;
        let shapes = reader
            .iter_shapes_and_records()
            .collect::<Result<Vec<_>, _>>()
            .map_err(|error| HydroDataError::ShapefileReadError { error })?;

        let mut progress = ReadProgress::new(shapes.len());
        let mut features = Vec::with_capacity(shapes.len());
        let mut skipped = 0;
        for (index, (shape, record)) in shapes.into_iter().enumerate() {
            progress.step(index + 1);
            let attributes = record
                .into_iter()
                .map(|(name, value)| (name, field_value_to_string(value)))
                .collect::<BTreeMap<_, _>>();
            match shape_to_coordinates(index, shape)
                .and_then(|coordinates| RawFeature::new(index, coordinates, attributes))
            {
                Ok(feature) => features.push(feature),
                Err(error) => {
                    warn!(error = %error, "Skipping feature");
                    skipped += 1;
                }
            }
        }

        let read_duration = read_start.elapsed();
        trace!(
            read_duration_secs = read_duration.as_secs(),
            "Shapefile read done"
        );

        Ok(HydroFeatures {
            features,
            crs,
            skipped,
        })
    }

    fn read_prj(&self) -> Result<SourceCrs, HydroDataError> {
        let prj_file = self.file_name.with_extension("prj");
        let wkt = match std::fs::read_to_string(&prj_file) {
            Ok(wkt) => wkt,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
                return Err(HydroDataError::UnknownCrs { file: prj_file });
            }
            Err(error) => return Err(HydroDataError::FileError { error }),
        };
        crs_from_wkt(&wkt).ok_or(HydroDataError::UnknownCrs { file: prj_file })
    }
}

fn crs_from_wkt(wkt: &str) -> Option<SourceCrs> {
    let wkt = wkt.to_uppercase();
    if wkt.contains("LAMBERT_93") || wkt.contains("LAMBERT-93") || wkt.contains("LAMBERT 93")
    {
        return Some(SourceCrs::lambert_93());
    }
    if wkt.starts_with("GEOGCS") && wkt.contains("WGS") && wkt.contains("1984") {
        return Some(SourceCrs::Wgs84);
    }
    None
}

fn shape_to_coordinates(index: usize, shape: Shape) -> Result<Vec<Coordinate>, FeatureError> {
    fn single_part<'p, P>(
        index: usize,
        parts: &'p [Vec<P>],
        geometry: &str,
    ) -> Result<&'p Vec<P>, FeatureError> {
        match parts {
            [part] => Ok(part),
            _ => Err(FeatureError::NotALineString {
                index,
                geometry: format!("{geometry} with {} parts", parts.len()),
            }),
        }
    }
    match shape {
        Shape::PolylineZ(polyline) => Ok(single_part(index, polyline.parts(), "PolylineZ")?
            .iter()
            .map(|p| Coordinate::new(p.x, p.y, Some(p.z)))
            .collect()),
        Shape::PolylineM(polyline) => Ok(single_part(index, polyline.parts(), "PolylineM")?
            .iter()
            .map(|p| Coordinate::new(p.x, p.y, None))
            .collect()),
        Shape::Polyline(polyline) => Ok(single_part(index, polyline.parts(), "Polyline")?
            .iter()
            .map(|p| Coordinate::new(p.x, p.y, None))
            .collect()),
        other => Err(FeatureError::NotALineString {
            index,
            geometry: format!("{:?}", other.shapetype()),
        }),
    }
}

fn field_value_to_string(value: FieldValue) -> Option<String> {
    match value {
        FieldValue::Character(value) => value,
        FieldValue::Memo(value) => Some(value),
        FieldValue::Numeric(value) => value.map(|v| v.to_string()),
        FieldValue::Float(value) => value.map(|v| v.to_string()),
        FieldValue::Double(value) => Some(value.to_string()),
        FieldValue::Currency(value) => Some(value.to_string()),
        FieldValue::Integer(value) => Some(value.to_string()),
        FieldValue::Logical(value) => value.map(|v| if v { "oui" } else { "non" }.to_string()),
        FieldValue::Date(value) => {
            value.map(|d| format!("{:04}-{:02}-{:02}", d.year(), d.month(), d.day()))
        }
        _ => None,
    }
}
