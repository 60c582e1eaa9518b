use super::{AnnotatedGraph, Coordinates, NodeId, NodeRecord};

const ORIGIN: Coordinates = Coordinates {
    lat: 50.8798,
    lon: 4.7005,
};
const SPACING_DEG: f64 = 0.004;
const SIDE: u64 = 6;

/// A small square grid of junctions around Leuven with a handful of charging stations.
///
/// Nodes 40 and 41 are stations placed on the same coordinates so the parity offset
/// is visible.
pub fn demo_grid() -> AnnotatedGraph {
    let mut graph = AnnotatedGraph::new();

    for row in 0..SIDE {
        for col in 0..SIDE {
            let id = row * SIDE + col;
            let location = Coordinates::new(
                ORIGIN.lat + row as f64 * SPACING_DEG,
                ORIGIN.lon + col as f64 * SPACING_DEG,
            );
            let station = (row + col) % 3 == 0;
            graph.insert(
                NodeRecord::new(NodeId(id))
                    .with_location(location)
                    .with_station(station),
            );
        }
    }

    let shared = Coordinates::new(
        ORIGIN.lat + 2.5 * SPACING_DEG,
        ORIGIN.lon + 2.5 * SPACING_DEG,
    );
    for id in [40, 41] {
        graph.insert(
            NodeRecord::new(NodeId(id))
                .with_location(shared)
                .with_station(true),
        );
    }

    graph
}
