use crate::graph::SharedGraph;
use crate::projection::Projector;
use crate::surface::DrawSurface;

use super::{MapLayer, MarkerStyle, PaintReport, paint_markers};

/// Uniform blue rings for every node.
#[derive(Clone, Debug)]
pub struct StandardNodeLayer {
    graph: SharedGraph,
}

impl StandardNodeLayer {
    pub fn new(graph: SharedGraph) -> Self {
        Self { graph }
    }
}

impl MarkerStyle for StandardNodeLayer {}

impl MapLayer for StandardNodeLayer {
    fn name(&self) -> &'static str {
        "nodes"
    }

    fn paint_layer(&self, projector: &dyn Projector, surface: &mut dyn DrawSurface) -> PaintReport {
        paint_markers(&self.graph.read(), self, projector, surface)
    }
}
