use std::path::Path;

use shapefile::{
    dbase::{FieldName, FieldValue, Record, TableWriterBuilder},
    PointZ, PolylineZ,
};

use crate::{
    hydro_data::feature::{Coordinate, RawFeature},
    map_data::{
        graph::MapDataGraph,
        tags::{tag_value, Tags},
    },
    network::river::RiverSchema,
};

pub fn feature(coords: &[(f64, f64)], attributes: &[(&str, &str)]) -> RawFeature {
    RawFeature::new(
        0,
        coords
            .iter()
            .map(|(x, y)| Coordinate::new(*x, *y, None))
            .collect(),
        attributes
            .iter()
            .map(|(key, value)| (key.to_string(), Some(value.to_string())))
            .collect(),
    )
    .expect("test feature needs at least 2 coordinates")
}

pub fn is_anonymous(feature: &RawFeature) -> bool {
    RiverSchema::default().is_anonymous(feature)
}

fn named(coords: &[(f64, f64)], name: &str, code: &str) -> RawFeature {
    feature(coords, &[("NOM_C_EAU", name), ("CODE_CARTH", code)])
}

pub fn test_network_1() -> Vec<RawFeature> {
    //  (0,2)      (2,3)
    //     5\        |7
    //       \     (2,2)
    //        \      |6
    // (0,1)-0-(1,1)-1-(2,1)-2-(3,1)-3-(4,1)-4-(5,1)
    //                           |8
    //                         (3,0)
    //
    // (10,0)-9-(11,0)
    //
    // every feature flows left to right or top to bottom
    vec![
        named(&[(0., 1.), (1., 1.)], "La Vire", "I5--0200"),
        feature(&[(1., 1.), (2., 1.)], &[]),
        named(&[(2., 1.), (3., 1.)], "La Vire", "I5--0200"),
        feature(&[(3., 1.), (4., 1.)], &[]),
        named(&[(4., 1.), (5., 1.)], "La Seulles", "I6--0100"),
        named(&[(0., 2.), (1., 1.)], "Le Ru", "I5--0210"),
        feature(&[(2., 2.), (2., 1.)], &[]),
        named(&[(2., 3.), (2., 2.)], "Le Ruisseau", "I5--0220"),
        feature(&[(3., 1.), (3., 0.)], &[]),
        named(&[(10., 0.), (11., 0.)], "L'Orne", "I0--0000"),
    ]
}

fn tags(pairs: &[(&str, &str)]) -> Tags {
    pairs
        .iter()
        .map(|(key, value)| (key.to_string(), tag_value(value)))
        .collect()
}

/// One way over `node_count` untagged nodes spaced along a meridian.
pub fn graph_with_way(node_count: usize, way_tags: &[(&str, &str)]) -> (MapDataGraph, usize) {
    let coords = (0..node_count)
        .map(|idx| (49. + idx as f64 * 0.001, -1.))
        .collect::<Vec<_>>();
    let (graph, ways) = graph_from_ways(&coords, &[((0..node_count).collect(), tags(way_tags))]);
    (graph, ways[0])
}

/// Nodes are created first, in order, so node `i` gets id `-(i + 1)`.
pub fn graph_from_ways(
    coords: &[(f64, f64)],
    ways: &[(Vec<usize>, Tags)],
) -> (MapDataGraph, Vec<usize>) {
    let mut graph = MapDataGraph::new();
    let nodes = coords
        .iter()
        .map(|(lat, lon)| graph.create_node(*lat, *lon, Tags::new()))
        .collect::<Vec<_>>();
    let ways = ways
        .iter()
        .map(|(positions, way_tags)| {
            graph
                .create_way(
                    positions.iter().map(|pos| nodes[*pos]).collect(),
                    way_tags.clone(),
                )
                .unwrap()
        })
        .collect();
    (graph, ways)
}

pub fn way_tag<'g>(graph: &'g MapDataGraph, way_idx: usize, key: &str) -> Option<&'g str> {
    graph
        .way(way_idx)
        .and_then(|way| way.tags.get(key))
        .map(|value| &**value)
}

pub fn node_tag<'g>(
    graph: &'g MapDataGraph,
    way_idx: usize,
    position: usize,
    key: &str,
) -> Option<&'g str> {
    let way = graph.way(way_idx)?;
    let node_ref = *way.nodes.get(position)?;
    graph.node(node_ref).tags.get(key).map(|value| &**value)
}

pub fn node_ids(graph: &MapDataGraph, way_idx: usize) -> Vec<i64> {
    graph
        .way(way_idx)
        .map(|way| {
            way.nodes
                .iter()
                .map(|node_ref| graph.node(*node_ref).id)
                .collect()
        })
        .unwrap_or_default()
}

const LAMBERT_93_PRJ: &str = r#"PROJCS["RGF93_Lambert_93",GEOGCS["GCS_RGF_1993",DATUM["D_RGF_1993",SPHEROID["GRS_1980",6378137.0,298.257222101]],PRIMEM["Greenwich",0.0],UNIT["Degree",0.0174532925199433]],PROJECTION["Lambert_Conformal_Conic"]]"#;

/// Segment shapefile in Lambert-93 with a `.prj`. Each shape is a list of parts of
/// `(x, y, z)` points with its name and code, `None` leaving the field empty.
pub fn write_segment_shapefile(
    file: &Path,
    shapes: &[(Vec<Vec<(f64, f64, f64)>>, Option<&str>, Option<&str>)],
) {
    let table = TableWriterBuilder::new()
        .add_character_field(FieldName::try_from("NOM_C_EAU").unwrap(), 50)
        .add_character_field(FieldName::try_from("CODE_CARTH").unwrap(), 20);
    let mut writer = shapefile::Writer::from_path(file, table).unwrap();
    for (parts, name, code) in shapes {
        let polyline = PolylineZ::with_parts(
            parts
                .iter()
                .map(|part| {
                    part.iter()
                        .map(|(x, y, z)| PointZ::new(*x, *y, *z, 0.))
                        .collect()
                })
                .collect(),
        );
        let mut record = Record::default();
        record.insert(
            String::from("NOM_C_EAU"),
            FieldValue::Character(name.map(String::from)),
        );
        record.insert(
            String::from("CODE_CARTH"),
            FieldValue::Character(code.map(String::from)),
        );
        writer.write_shape_and_record(&polyline, &record).unwrap();
    }
    drop(writer);
    std::fs::write(file.with_extension("prj"), LAMBERT_93_PRJ).unwrap();
}

/// Fresh directory under the system temp dir.
pub fn temp_dir(name: &str) -> std::path::PathBuf {
    let dir = std::env::temp_dir().join(format!("bdhydro-osm-{}-{}", name, std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();
    dir
}
