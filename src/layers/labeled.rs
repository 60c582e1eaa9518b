use eframe::egui::Color32;
use tracing::debug;

use crate::graph::SharedGraph;
use crate::projection::Projector;
use crate::surface::DrawSurface;

use super::{MapLayer, PaintReport};

pub const LABEL_COLOR: Color32 = Color32::WHITE;
/// Downward shift keeping labels clear of a marker drawn at the same point.
pub const LABEL_OFFSET: i32 = 20;

/// Node identifiers as text below each node's location.
#[derive(Clone, Debug)]
pub struct LabeledNodeLayer {
    graph: SharedGraph,
}

impl LabeledNodeLayer {
    pub fn new(graph: SharedGraph) -> Self {
        Self { graph }
    }
}

impl MapLayer for LabeledNodeLayer {
    fn name(&self) -> &'static str {
        "labels"
    }

    fn paint_layer(&self, projector: &dyn Projector, surface: &mut dyn DrawSurface) -> PaintReport {
        let graph = self.graph.read();
        let mut report = PaintReport::default();

        for node in graph.nodes() {
            match node.location() {
                Ok(location) => {
                    let point = projector.project(location).offset(0, LABEL_OFFSET);
                    surface.draw_text(point, &node.id.to_string(), LABEL_COLOR);
                    report.drawn += 1;
                }
                Err(error) => {
                    debug!(%error, "skipping label");
                    report.skipped.push(error);
                }
            }
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{AnnotatedGraph, Coordinates, NodeId, NodeRecord};
    use crate::projection::ProjectedPoint;
    use crate::surface::RecordingSurface;

    #[test]
    fn labels_sit_below_the_projected_point() {
        let mut graph = AnnotatedGraph::new();
        graph.insert(NodeRecord::new(NodeId(17)).with_location(Coordinates::new(3.0, 4.0)));
        graph.insert(NodeRecord::new(NodeId(18)));
        let layer = LabeledNodeLayer::new(graph.into_shared());
        let mut surface = RecordingSurface::new();

        let report = layer.paint_layer(
            &|location: Coordinates| ProjectedPoint::new(location.lon as i32, location.lat as i32),
            &mut surface,
        );

        assert_eq!(report.drawn, 1);
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(
            surface.texts().collect::<Vec<_>>(),
            vec![(ProjectedPoint::new(4, 3 + LABEL_OFFSET), "17", LABEL_COLOR)]
        );
        assert_eq!(surface.circles().count(), 0);
    }
}
