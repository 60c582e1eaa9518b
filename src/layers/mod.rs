//! Node overlay layers drawn on top of the map.
//!
//! The set of layers is closed: [`NodeLayer`] names every variant and forwards
//! painting to it. Marker layers share [`paint_markers`] and differ only in the
//! [`MarkerStyle`] they hand it.

use crate::error::LayerError;
use crate::projection::Projector;
use crate::surface::DrawSurface;

mod base;
mod labeled;
mod load;
mod standard;

pub use base::{DEFAULT_COLOR, DEFAULT_STROKE, MARKER_DIAMETER, MarkerStyle, paint_markers};
pub use labeled::{LABEL_COLOR, LABEL_OFFSET, LabeledNodeLayer};
pub use load::{
    CHARGING_STATION_EVENT_PREFIX, CLIENTS_ATTRIBUTE, HIGH_LOAD_COLOR, LOW_LOAD_COLOR,
    LoadClassifiedNodeLayer, LoadSnapshot, LoadTier, MID_LOAD_COLOR, NON_STATION_COLOR,
    OUT_OF_RANGE_COLOR, OVERLAY_TEXT_COLOR, OVERLAY_TEXT_POSITION, STATION_ATTRIBUTE,
    STATION_LOAD_EVENT, STATION_OFFSET, THIN_STROKE, ThresholdState, station_load_event,
};
pub use standard::StandardNodeLayer;

/// Outcome of one paint pass.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PaintReport {
    pub drawn: usize,
    pub skipped: Vec<LayerError>,
}

pub trait MapLayer {
    fn name(&self) -> &'static str;

    fn paint_layer(&self, projector: &dyn Projector, surface: &mut dyn DrawSurface) -> PaintReport;
}

pub enum NodeLayer {
    Standard(StandardNodeLayer),
    LoadClassified(LoadClassifiedNodeLayer),
    Labeled(LabeledNodeLayer),
}

impl NodeLayer {
    fn inner(&self) -> &dyn MapLayer {
        match self {
            Self::Standard(layer) => layer,
            Self::LoadClassified(layer) => layer,
            Self::Labeled(layer) => layer,
        }
    }
}

impl MapLayer for NodeLayer {
    fn name(&self) -> &'static str {
        self.inner().name()
    }

    fn paint_layer(&self, projector: &dyn Projector, surface: &mut dyn DrawSurface) -> PaintReport {
        self.inner().paint_layer(projector, surface)
    }
}

impl From<StandardNodeLayer> for NodeLayer {
    fn from(layer: StandardNodeLayer) -> Self {
        Self::Standard(layer)
    }
}

impl From<LoadClassifiedNodeLayer> for NodeLayer {
    fn from(layer: LoadClassifiedNodeLayer) -> Self {
        Self::LoadClassified(layer)
    }
}

impl From<LabeledNodeLayer> for NodeLayer {
    fn from(layer: LabeledNodeLayer) -> Self {
        Self::Labeled(layer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventBus;
    use crate::graph::{AnnotatedGraph, Coordinates, NodeId, NodeRecord};
    use crate::projection::ProjectedPoint;
    use crate::surface::{DrawCommand, RecordingSurface};

    #[test]
    fn node_layers_forward_to_their_variant() {
        let mut graph = AnnotatedGraph::new();
        graph.insert(
            NodeRecord::new(NodeId(1))
                .with_location(Coordinates::new(2.0, 3.0))
                .with_station(true),
        );
        let graph = graph.into_shared();
        let bus = EventBus::new();

        let layers: Vec<NodeLayer> = vec![
            StandardNodeLayer::new(graph.clone()).into(),
            LoadClassifiedNodeLayer::new(graph.clone(), &bus).into(),
            LabeledNodeLayer::new(graph).into(),
        ];
        let names = layers.iter().map(MapLayer::name).collect::<Vec<_>>();
        assert_eq!(names, vec!["nodes", "station load", "labels"]);

        let projector = |_: Coordinates| ProjectedPoint::new(10, 10);
        let mut surface = RecordingSurface::new();
        for layer in &layers {
            assert_eq!(layer.paint_layer(&projector, &mut surface).drawn, 1);
        }

        let kinds = surface
            .commands
            .iter()
            .map(|command| matches!(command, DrawCommand::Circle { .. }))
            .collect::<Vec<_>>();
        // standard ring, classified ring, max-load readout, label
        assert_eq!(kinds, vec![true, true, false, false]);
    }
}
