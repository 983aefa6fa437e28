use std::{
    fs::File,
    io::{self, BufWriter, Write},
    time::Instant,
};

use flate2::{write::GzEncoder, Compression};
use quick_xml::{
    events::{BytesDecl, BytesEnd, BytesStart, Event},
    Writer,
};
use tracing::info;

use crate::map_data::{graph::MapDataGraph, tags::Tags};

use super::{DataDestination, OsmWriterError};

pub const GENERATOR: &str = "bdhydro-osm";

/// Writes a graph as an OSM XML document: all nodes, then all live ways.
pub struct OsmXmlWriter<'a> {
    map_data: &'a MapDataGraph,
}

impl<'a> OsmXmlWriter<'a> {
    pub fn new(map_data: &'a MapDataGraph) -> Self {
        Self { map_data }
    }

    fn write_tags<W: Write>(writer: &mut Writer<W>, tags: &Tags) -> Result<(), quick_xml::Error> {
        for (key, value) in tags {
            let mut tag = BytesStart::new("tag");
            tag.push_attribute(("k", key.as_str()));
            tag.push_attribute(("v", &**value));
            writer.write_event(Event::Empty(tag))?;
        }
        Ok(())
    }

    fn write_document<W: Write>(&self, writer: &mut Writer<W>) -> Result<(), quick_xml::Error> {
        writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
        let mut osm = BytesStart::new("osm");
        osm.push_attribute(("version", "0.6"));
        osm.push_attribute(("upload", "false"));
        osm.push_attribute(("generator", GENERATOR));
        writer.write_event(Event::Start(osm))?;

        for node in self.map_data.nodes() {
            let id = node.id.to_string();
            let lat = node.lat.to_string();
            let lon = node.lon.to_string();
            let mut element = BytesStart::new("node");
            element.push_attribute(("id", id.as_str()));
            element.push_attribute(("lat", lat.as_str()));
            element.push_attribute(("lon", lon.as_str()));
            if node.tags.is_empty() {
                writer.write_event(Event::Empty(element))?;
            } else {
                writer.write_event(Event::Start(element))?;
                Self::write_tags(writer, &node.tags)?;
                writer.write_event(Event::End(BytesEnd::new("node")))?;
            }
        }

        for (_, way) in self.map_data.ways() {
            let id = way.id.to_string();
            let mut element = BytesStart::new("way");
            element.push_attribute(("id", id.as_str()));
            writer.write_event(Event::Start(element))?;
            for node_ref in &way.nodes {
                let node_id = self.map_data.node(*node_ref).id.to_string();
                let mut nd = BytesStart::new("nd");
                nd.push_attribute(("ref", node_id.as_str()));
                writer.write_event(Event::Empty(nd))?;
            }
            Self::write_tags(writer, &way.tags)?;
            writer.write_event(Event::End(BytesEnd::new("way")))?;
        }

        writer.write_event(Event::End(BytesEnd::new("osm")))?;
        Ok(())
    }

    pub fn write_to<W: Write>(&self, inner: W) -> Result<W, OsmWriterError> {
        let mut writer = Writer::new_with_indent(inner, b' ', 2);
        self.write_document(&mut writer)
            .map_err(|error| OsmWriterError::WriterError { error })?;
        let mut inner = writer.into_inner();
        inner
            .write_all(b"\n")
            .map_err(|error| OsmWriterError::FileError { error })?;
        Ok(inner)
    }

    #[tracing::instrument(skip(self))]
    pub fn write(&self, destination: &DataDestination) -> Result<(), OsmWriterError> {
        let start = Instant::now();
        match destination {
            DataDestination::Stdout => {
                self.write_to(io::stdout().lock())?
                    .flush()
                    .map_err(|error| OsmWriterError::FileError { error })?;
            }
            DataDestination::File { file } => {
                let out = File::create(file).map_err(|error| OsmWriterError::FileError { error })?;
                let out = BufWriter::new(out);
                let is_gz = file
                    .extension()
                    .map_or(false, |extension| extension == "gz");
                if is_gz {
                    let encoder = self.write_to(GzEncoder::new(out, Compression::default()))?;
                    encoder
                        .finish()
                        .and_then(|mut out| out.flush())
                        .map_err(|error| OsmWriterError::FileError { error })?;
                } else {
                    self.write_to(out)?
                        .flush()
                        .map_err(|error| OsmWriterError::FileError { error })?;
                }
            }
        }
        info!(
            nodes = self.map_data.node_count(),
            ways = self.map_data.way_count(),
            elapsed = ?start.elapsed(),
            "OSM data written"
        );
        Ok(())
    }
}
