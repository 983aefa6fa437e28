use std::{
    fs::File,
    io::{self, BufReader},
};

use flate2::read::GzDecoder;

use crate::map_data::graph::MapDataGraph;

use super::{xml_reader::XmlReader, DataSource, OsmDataReaderError};

pub struct OsmDataReader {
    source: DataSource,
    map_data: MapDataGraph,
}

impl OsmDataReader {
    pub fn new(data_source: DataSource) -> Self {
        Self {
            map_data: MapDataGraph::new(),
            source: data_source,
        }
    }

    #[tracing::instrument(skip(self), fields(source = ?self.source))]
    pub fn read_data(mut self) -> Result<MapDataGraph, OsmDataReaderError> {
        match self.source {
            DataSource::XmlFile { ref file } => {
                let file =
                    File::open(file).map_err(|error| OsmDataReaderError::FileError { error })?;
                XmlReader::new(&mut self.map_data).read(BufReader::new(file))?;
            }
            DataSource::GzXmlFile { ref file } => {
                let file =
                    File::open(file).map_err(|error| OsmDataReaderError::FileError { error })?;
                XmlReader::new(&mut self.map_data)
                    .read(BufReader::new(GzDecoder::new(BufReader::new(file))))?;
            }
            DataSource::Stdin => {
                XmlReader::new(&mut self.map_data).read(io::stdin().lock())?;
            }
        };
        Ok(self.map_data)
    }
}
