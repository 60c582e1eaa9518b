use eframe::egui::Color32;
use tracing::debug;

use crate::graph::{AnnotatedGraph, NodeId};
use crate::projection::{ProjectedPoint, Projector};
use crate::surface::DrawSurface;

use super::PaintReport;

pub const MARKER_DIAMETER: i32 = 6;
pub const DEFAULT_STROKE: f32 = 5.0;
pub const DEFAULT_COLOR: Color32 = Color32::BLUE;

/// Per-node marker styling. Implementations must be pure: the same state and node
/// always give the same answer.
pub trait MarkerStyle {
    fn choose_color(&self, _node: NodeId) -> Color32 {
        DEFAULT_COLOR
    }

    fn choose_stroke(&self, _node: NodeId) -> f32 {
        DEFAULT_STROKE
    }

    /// Nudges a projected point, e.g. to separate markers that would overlap.
    fn correct_position(&self, point: ProjectedPoint, _node: NodeId) -> ProjectedPoint {
        point
    }

    fn marker_diameter(&self) -> i32 {
        MARKER_DIAMETER
    }
}

/// Draws one marker per graph node, centered on its corrected projected location.
///
/// Nodes without a usable location are skipped and listed in the report.
pub fn paint_markers(
    graph: &AnnotatedGraph,
    style: &dyn MarkerStyle,
    projector: &dyn Projector,
    surface: &mut dyn DrawSurface,
) -> PaintReport {
    let mut report = PaintReport::default();
    let diameter = style.marker_diameter();

    for node in graph.nodes() {
        let location = match node.location() {
            Ok(location) => location,
            Err(error) => {
                debug!(%error, "skipping marker");
                report.skipped.push(error);
                continue;
            }
        };

        let point = style.correct_position(projector.project(location), node.id);
        surface.draw_circle(
            point.offset(-diameter / 2, -diameter / 2),
            diameter,
            style.choose_stroke(node.id),
            style.choose_color(node.id),
        );
        report.drawn += 1;
    }

    report
}
