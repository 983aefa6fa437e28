use crate::map_data::MapDataError;
use std::{io, path::PathBuf};

pub mod data_reader;
pub mod xml_reader;
pub mod xml_writer;

#[derive(Debug, thiserror::Error)]
pub enum OsmDataReaderError {
    #[error("OSM XML parser error: {error}")]
    ParserError { error: quick_xml::Error },

    #[error("Map data error: {error}")]
    MapDataError { error: MapDataError },

    #[error("File error: {error}")]
    FileError { error: io::Error },

    #[error("Element <{element}> is missing attribute '{attribute}'")]
    MissingAttribute {
        element: &'static str,
        attribute: &'static str,
    },

    #[error("Element <{element}> has invalid {attribute}='{value}'")]
    InvalidAttribute {
        element: &'static str,
        attribute: &'static str,
        value: String,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum OsmWriterError {
    #[error("File error: {error}")]
    FileError { error: io::Error },

    #[error("OSM XML writer error: {error}")]
    WriterError { error: quick_xml::Error },
}

#[derive(Debug, PartialEq, Clone)]
pub enum DataSource {
    XmlFile { file: PathBuf },
    GzXmlFile { file: PathBuf },
    Stdin,
}

#[derive(Debug, PartialEq, Clone)]
pub enum DataDestination {
    /// Gzip compressed when the file name ends with `.gz`.
    File { file: PathBuf },
    Stdout,
}
