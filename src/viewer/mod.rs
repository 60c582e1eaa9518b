use std::time::Duration;

use anyhow::{Context as _, Result, anyhow};
use crossbeam_channel::Sender;
use eframe::egui::{self, Align, Context, Layout, Sense, Ui};
use tracing::{info, warn};

use grid_overlay::events::{Dispatcher, Event, EventBus};
use grid_overlay::graph::{AnnotatedGraph, Coordinates, SharedGraph};
use grid_overlay::layers::{
    LabeledNodeLayer, LoadClassifiedNodeLayer, MapLayer, NodeLayer, StandardNodeLayer,
};
use grid_overlay::projection::{MercatorProjector, Viewport};
use grid_overlay::simulation::{LoadSimulation, SimulationConfig};
use grid_overlay::surface::PainterSurface;

mod background;

use self::background::draw_background;

const REPAINT_INTERVAL: Duration = Duration::from_millis(200);
const INITIAL_ZOOM: f64 = 14.0;
const ZOOM_PER_SCROLL_POINT: f64 = 0.0025;

pub struct ViewerOptions {
    pub graph: AnnotatedGraph,
    pub replay: Vec<Event>,
    pub simulation: Option<SimulationConfig>,
}

struct LayerEntry {
    layer: NodeLayer,
    enabled: bool,
}

pub struct GridOverlayApp {
    layers: Vec<LayerEntry>,
    viewport: Viewport,
    last_skipped: usize,
    simulation: Option<LoadSimulation>,
    events_tx: Option<Sender<Event>>,
    dispatcher: Option<Dispatcher>,
}

impl GridOverlayApp {
    pub fn new(_cc: &eframe::CreationContext<'_>, options: ViewerOptions) -> Result<Self> {
        let center = graph_center(&options.graph);
        let station_ids = options.graph.stations().into_iter().collect::<Vec<_>>();
        let graph: SharedGraph = options.graph.into_shared();

        let bus = EventBus::new();
        let layers = vec![
            LayerEntry {
                layer: StandardNodeLayer::new(graph.clone()).into(),
                enabled: false,
            },
            LayerEntry {
                layer: LoadClassifiedNodeLayer::new(graph.clone(), &bus).into(),
                enabled: true,
            },
            LayerEntry {
                layer: LabeledNodeLayer::new(graph).into(),
                enabled: true,
            },
        ];

        let (events_tx, dispatcher) = bus
            .spawn_dispatcher()
            .context("failed to start event dispatcher")?;

        let replayed = options.replay.len();
        for event in options.replay {
            events_tx
                .send(event)
                .map_err(|_| anyhow!("event dispatcher stopped during replay"))?;
        }
        if replayed > 0 {
            info!(replayed, "queued replayed events");
        }

        let simulation = options
            .simulation
            .map(|config| LoadSimulation::start(station_ids, config, events_tx.clone()))
            .transpose()
            .context("failed to start load simulation")?;

        Ok(Self {
            layers,
            viewport: Viewport::new(center, INITIAL_ZOOM, 1.0, 1.0),
            last_skipped: 0,
            simulation,
            events_tx: Some(events_tx),
            dispatcher: Some(dispatcher),
        })
    }

    fn load_layer(&self) -> Option<&LoadClassifiedNodeLayer> {
        self.layers.iter().find_map(|entry| match &entry.layer {
            NodeLayer::LoadClassified(layer) => Some(layer),
            _ => None,
        })
    }

    fn draw_top_bar(&mut self, ui: &mut Ui) {
        ui.horizontal(|ui| {
            ui.heading("grid-overlay");
            ui.separator();
            for entry in &mut self.layers {
                ui.checkbox(&mut entry.enabled, entry.layer.name());
            }
            ui.separator();

            if let Some(layer) = self.load_layer() {
                let snapshot = layer.snapshot();
                let reporting = layer
                    .stations()
                    .iter()
                    .filter(|station| snapshot.load(**station).is_some())
                    .count();
                ui.label(format!("stations: {}", layer.stations().len()));
                ui.label(format!("reporting: {reporting}"));
                let thresholds = snapshot.thresholds();
                ui.label(format!(
                    "tiers: ≤{} / ≤{} / ≤{}",
                    thresholds.green, thresholds.yellow, thresholds.red
                ));
            }

            ui.with_layout(Layout::right_to_left(Align::Center), |ui| {
                ui.label(format!("zoom {:.1}", self.viewport.zoom));
                if self.simulation.is_some() {
                    ui.label("simulating");
                }
            });
        });
    }

    fn draw_map(&mut self, ui: &mut Ui) {
        let (rect, response) = ui.allocate_exact_size(ui.available_size(), Sense::click_and_drag());
        self.viewport.width = f64::from(rect.width());
        self.viewport.height = f64::from(rect.height());

        if response.dragged() {
            let delta = response.drag_delta();
            self.viewport.pan_by(-f64::from(delta.x), -f64::from(delta.y));
        }

        if response.hovered() {
            let scroll = ui.input(|input| input.raw_scroll_delta.y);
            if scroll.abs() > f32::EPSILON {
                let pointer = ui
                    .input(|input| input.pointer.hover_pos())
                    .unwrap_or_else(|| rect.center());
                let anchor = pointer - rect.min;
                self.viewport.zoom_around(
                    f64::from(scroll) * ZOOM_PER_SCROLL_POINT,
                    (f64::from(anchor.x), f64::from(anchor.y)),
                );
            }
        }

        let projector = MercatorProjector::new(self.viewport);
        let painter = ui.painter_at(rect);
        draw_background(&painter, rect, &projector);

        let mut surface = PainterSurface::new(&painter, rect);
        let mut skipped = 0usize;
        for entry in self.layers.iter().filter(|entry| entry.enabled) {
            let report = entry.layer.paint_layer(&projector, &mut surface);
            skipped += report.skipped.len();
        }

        if skipped != self.last_skipped {
            if skipped > 0 {
                warn!(skipped, "nodes without a location were not drawn");
            }
            self.last_skipped = skipped;
        }
    }
}

impl eframe::App for GridOverlayApp {
    fn update(&mut self, ctx: &Context, _frame: &mut eframe::Frame) {
        egui::TopBottomPanel::top("top_bar")
            .resizable(false)
            .show(ctx, |ui| self.draw_top_bar(ui));

        egui::CentralPanel::default()
            .frame(egui::Frame::NONE)
            .show(ctx, |ui| self.draw_map(ui));

        ctx.request_repaint_after(REPAINT_INTERVAL);
    }
}

impl Drop for GridOverlayApp {
    fn drop(&mut self) {
        if let Some(simulation) = self.simulation.take() {
            simulation.stop();
        }
        // The dispatcher drains and exits once the last sender is gone.
        self.events_tx.take();
        if let Some(dispatcher) = self.dispatcher.take() {
            let published = dispatcher.join();
            info!(published, "viewer shut down");
        }
    }
}

fn graph_center(graph: &AnnotatedGraph) -> Coordinates {
    let located = graph
        .nodes()
        .filter_map(|node| node.location().ok())
        .collect::<Vec<_>>();
    if located.is_empty() {
        return Coordinates::new(0.0, 0.0);
    }

    let count = located.len() as f64;
    let (lat, lon) = located
        .iter()
        .fold((0.0, 0.0), |(lat, lon), location| (lat + location.lat, lon + location.lon));
    Coordinates::new(lat / count, lon / count)
}
