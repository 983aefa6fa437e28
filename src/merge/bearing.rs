use crate::map_data::{graph::MapDataGraph, node::MapDataNode, way::MapDataWay};

/// Bearing in degrees from `from` to `to`, clockwise from north, in (-180, 180].
/// Planar approximation, good enough between neighbouring vertices.
pub fn bearing(from: &MapDataNode, to: &MapDataNode) -> f64 {
    let delta_lat = to.lat - from.lat;
    let delta_lon = from.lat.to_radians().cos() * (to.lon - from.lon);
    delta_lon.atan2(delta_lat).to_degrees()
}

/// Signed difference of two bearings, in [-180, 180).
pub fn angle_diff(angle1: f64, angle2: f64) -> f64 {
    (angle1 - angle2 + 180.).rem_euclid(360.) - 180.
}

pub fn start_bearing(graph: &MapDataGraph, way: &MapDataWay) -> f64 {
    bearing(graph.node(way.nodes[0]), graph.node(way.nodes[1]))
}

pub fn end_bearing(graph: &MapDataGraph, way: &MapDataWay) -> f64 {
    let len = way.nodes.len();
    bearing(
        graph.node(way.nodes[len - 2]),
        graph.node(way.nodes[len - 1]),
    )
}

/// Absolute turn when continuing from the end of `incoming` into the start of `outgoing`.
pub fn ways_angle(graph: &MapDataGraph, incoming: &MapDataWay, outgoing: &MapDataWay) -> f64 {
    angle_diff(end_bearing(graph, incoming), start_bearing(graph, outgoing)).abs()
}
