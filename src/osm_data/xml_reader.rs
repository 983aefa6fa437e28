use std::{collections::HashMap, io::BufRead, str::FromStr, time::Instant};

use quick_xml::{
    events::{BytesStart, Event},
    Reader,
};
use tracing::info;

use crate::map_data::{
    graph::MapDataGraph,
    osm::{OsmNode, OsmWay},
};

use super::OsmDataReaderError;

enum ParserState {
    Top,
    Node(OsmNode),
    Way(OsmWay),
    /// Relations and anything else whose children are skipped, by element name.
    Ignored(Vec<u8>),
}

/// Reads `<node>` and `<way>` elements with their tags. Relations are skipped.
pub struct XmlReader<'a> {
    map_data: &'a mut MapDataGraph,
    nodes: usize,
    ways: usize,
}

impl<'a> XmlReader<'a> {
    pub fn new(map_data: &'a mut MapDataGraph) -> Self {
        Self {
            map_data,
            nodes: 0,
            ways: 0,
        }
    }

    fn attributes(element: &BytesStart) -> Result<HashMap<String, String>, OsmDataReaderError> {
        let mut attributes = HashMap::new();
        for attribute in element.attributes() {
            let attribute = attribute.map_err(|error| OsmDataReaderError::ParserError {
                error: error.into(),
            })?;
            let key = String::from_utf8_lossy(attribute.key.as_ref()).to_string();
            let value = attribute
                .unescape_value()
                .map_err(|error| OsmDataReaderError::ParserError { error })?;
            attributes.insert(key, value.to_string());
        }
        Ok(attributes)
    }

    fn attribute<T: FromStr>(
        attributes: &HashMap<String, String>,
        element: &'static str,
        attribute: &'static str,
    ) -> Result<T, OsmDataReaderError> {
        let value = attributes
            .get(attribute)
            .ok_or(OsmDataReaderError::MissingAttribute { element, attribute })?;
        value
            .parse()
            .map_err(|_| OsmDataReaderError::InvalidAttribute {
                element,
                attribute,
                value: value.clone(),
            })
    }

    fn parse_node(element: &BytesStart) -> Result<OsmNode, OsmDataReaderError> {
        let attributes = Self::attributes(element)?;
        Ok(OsmNode {
            id: Self::attribute(&attributes, "node", "id")?,
            lat: Self::attribute(&attributes, "node", "lat")?,
            lon: Self::attribute(&attributes, "node", "lon")?,
            tags: None,
        })
    }

    fn parse_way(element: &BytesStart) -> Result<OsmWay, OsmDataReaderError> {
        let attributes = Self::attributes(element)?;
        Ok(OsmWay {
            id: Self::attribute(&attributes, "way", "id")?,
            node_ids: Vec::new(),
            tags: None,
        })
    }

    fn parse_tag(element: &BytesStart) -> Result<(String, String), OsmDataReaderError> {
        let attributes = Self::attributes(element)?;
        Ok((
            Self::attribute(&attributes, "tag", "k")?,
            Self::attribute(&attributes, "tag", "v")?,
        ))
    }

    fn insert_node(&mut self, node: OsmNode) -> Result<(), OsmDataReaderError> {
        self.map_data
            .insert_node(node)
            .map_err(|error| OsmDataReaderError::MapDataError { error })?;
        self.nodes += 1;
        Ok(())
    }

    fn insert_way(&mut self, way: OsmWay) -> Result<(), OsmDataReaderError> {
        self.map_data
            .insert_way(way)
            .map_err(|error| OsmDataReaderError::MapDataError { error })?;
        self.ways += 1;
        Ok(())
    }

    fn handle_child(
        state: &mut ParserState,
        element: &BytesStart,
    ) -> Result<(), OsmDataReaderError> {
        match element.name().as_ref() {
            b"tag" => {
                let (key, value) = Self::parse_tag(element)?;
                match state {
                    ParserState::Node(node) => {
                        node.tags.get_or_insert_with(HashMap::new).insert(key, value);
                    }
                    ParserState::Way(way) => {
                        way.tags.get_or_insert_with(HashMap::new).insert(key, value);
                    }
                    ParserState::Top | ParserState::Ignored(_) => {}
                }
            }
            b"nd" => {
                if let ParserState::Way(way) = state {
                    let attributes = Self::attributes(element)?;
                    way.node_ids.push(Self::attribute(&attributes, "nd", "ref")?);
                }
            }
            _ => {}
        }
        Ok(())
    }

    #[tracing::instrument(skip_all)]
    pub fn read<R: BufRead>(mut self, input: R) -> Result<(), OsmDataReaderError> {
        let start = Instant::now();
        let mut reader = Reader::from_reader(input);
        reader.trim_text(true);
        let mut buf = Vec::new();
        let mut state = ParserState::Top;

        loop {
            let event = reader
                .read_event_into(&mut buf)
                .map_err(|error| OsmDataReaderError::ParserError { error })?;
            match event {
                Event::Eof => break,
                Event::Start(element) => {
                    let at_top = matches!(state, ParserState::Top);
                    match element.name().as_ref() {
                        b"node" if at_top => {
                            state = ParserState::Node(Self::parse_node(&element)?)
                        }
                        b"way" if at_top => state = ParserState::Way(Self::parse_way(&element)?),
                        b"osm" if at_top => {}
                        name if at_top => state = ParserState::Ignored(name.to_vec()),
                        _ => Self::handle_child(&mut state, &element)?,
                    }
                }
                Event::Empty(element) => {
                    if matches!(state, ParserState::Top) && element.name().as_ref() == b"node" {
                        let node = Self::parse_node(&element)?;
                        self.insert_node(node)?;
                    } else {
                        Self::handle_child(&mut state, &element)?;
                    }
                }
                Event::End(element) => {
                    let name = element.name();
                    let closes = match &state {
                        ParserState::Node(_) => name.as_ref() == b"node",
                        ParserState::Way(_) => name.as_ref() == b"way",
                        ParserState::Ignored(ignored) => name.as_ref() == ignored.as_slice(),
                        ParserState::Top => false,
                    };
                    if closes {
                        match std::mem::replace(&mut state, ParserState::Top) {
                            ParserState::Node(node) => self.insert_node(node)?,
                            ParserState::Way(way) => self.insert_way(way)?,
                            ParserState::Top | ParserState::Ignored(_) => {}
                        }
                    }
                }
                _ => {}
            }
            buf.clear();
        }

        info!(
            nodes = self.nodes,
            ways = self.ways,
            elapsed = ?start.elapsed(),
            "OSM data read"
        );
        Ok(())
    }
}
