//! Charging-station markers colored by their latest reported client count.
//!
//! Load reports arrive on the event bus, usually on a dispatcher thread, while
//! paint passes run on the UI thread. Both sides meet in a [`LoadCell`]: the
//! load table and the thresholds derived from it live together in one
//! copy-on-write snapshot, so a paint pass always sees a table and thresholds
//! that belong to each other.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex, PoisonError};

use eframe::egui::Color32;
use tracing::{debug, info};

use crate::error::LayerError;
use crate::events::{Event, EventBus, EventListener, Subscription, TypePrefixFilter};
use crate::graph::{NodeId, SharedGraph};
use crate::projection::{ProjectedPoint, Projector};
use crate::surface::DrawSurface;

use super::{DEFAULT_COLOR, DEFAULT_STROKE, MapLayer, MarkerStyle, PaintReport, paint_markers};

pub const CHARGING_STATION_EVENT_PREFIX: &str = "infrastructure:chargingstation";
pub const STATION_LOAD_EVENT: &str = "infrastructure:chargingstation:load";
pub const STATION_ATTRIBUTE: &str = "station";
pub const CLIENTS_ATTRIBUTE: &str = "clients";

pub const THIN_STROKE: f32 = 2.0;
pub const STATION_OFFSET: i32 = 5;

// Premultiplied forms of the tier colors at alpha 200.
pub const LOW_LOAD_COLOR: Color32 = Color32::from_rgba_premultiplied(0, 200, 0, 200);
pub const MID_LOAD_COLOR: Color32 = Color32::from_rgba_premultiplied(200, 200, 0, 200);
pub const HIGH_LOAD_COLOR: Color32 = Color32::from_rgba_premultiplied(200, 0, 0, 200);
pub const OUT_OF_RANGE_COLOR: Color32 = Color32::from_rgba_premultiplied(0, 0, 0, 200);
pub const NON_STATION_COLOR: Color32 = Color32::WHITE;

pub const OVERLAY_TEXT_COLOR: Color32 = Color32::WHITE;
pub const OVERLAY_TEXT_POSITION: ProjectedPoint = ProjectedPoint::new(100, 20);

/// Builds the load report this layer listens for.
pub fn station_load_event(station: NodeId, clients: u32) -> Event {
    Event::new(STATION_LOAD_EVENT)
        .with_attribute(STATION_ATTRIBUTE, station.0)
        .with_attribute(CLIENTS_ATTRIBUTE, clients)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LoadTier {
    NotStation,
    NoData,
    Low,
    Mid,
    High,
    /// Load above the red threshold. Not produced while table and thresholds are
    /// updated together, but kept as a drawable state.
    OutOfRange,
}

impl LoadTier {
    pub fn color(self) -> Color32 {
        match self {
            Self::NotStation => NON_STATION_COLOR,
            Self::NoData => DEFAULT_COLOR,
            Self::Low => LOW_LOAD_COLOR,
            Self::Mid => MID_LOAD_COLOR,
            Self::High => HIGH_LOAD_COLOR,
            Self::OutOfRange => OUT_OF_RANGE_COLOR,
        }
    }
}

/// Tier boundaries derived from the largest load seen so far. Only ever grows.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ThresholdState {
    pub max_observed_load: u32,
    pub green: u32,
    pub yellow: u32,
    pub red: u32,
}

impl ThresholdState {
    pub fn for_max(max_observed_load: u32) -> Self {
        let max = u64::from(max_observed_load);
        Self {
            max_observed_load,
            green: (max / 3) as u32,
            yellow: (2 * max / 3) as u32,
            red: max_observed_load,
        }
    }

    /// Ratchets the thresholds up when `load` is a new maximum; returns whether it did.
    pub fn observe(&mut self, load: u32) -> bool {
        if load > self.max_observed_load {
            *self = Self::for_max(load);
            true
        } else {
            false
        }
    }

    pub fn classify(&self, load: u32) -> LoadTier {
        if load <= self.green {
            LoadTier::Low
        } else if load <= self.yellow {
            LoadTier::Mid
        } else if load <= self.red {
            LoadTier::High
        } else {
            LoadTier::OutOfRange
        }
    }
}

/// Latest load per station plus the thresholds computed from every load seen.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LoadSnapshot {
    loads: HashMap<NodeId, u32>,
    thresholds: ThresholdState,
}

impl LoadSnapshot {
    pub fn load(&self, station: NodeId) -> Option<u32> {
        self.loads.get(&station).copied()
    }

    pub fn loads(&self) -> &HashMap<NodeId, u32> {
        &self.loads
    }

    pub fn thresholds(&self) -> ThresholdState {
        self.thresholds
    }

    /// Last observation wins; thresholds follow only when the maximum grows.
    fn record(&mut self, station: NodeId, clients: u32) -> bool {
        self.loads.insert(station, clients);
        self.thresholds.observe(clients)
    }

    fn classify(&self, stations: &BTreeSet<NodeId>, node: NodeId) -> LoadTier {
        if !stations.contains(&node) {
            return LoadTier::NotStation;
        }

        match self.load(node) {
            Some(load) => self.thresholds.classify(load),
            None => LoadTier::NoData,
        }
    }
}

/// The state shared between the event listener and the paint passes.
///
/// Writers update in place unless a paint pass still holds the current snapshot,
/// in which case `Arc::make_mut` copies it first. Neither side keeps the lock
/// beyond one update or one pointer clone.
#[derive(Debug, Default)]
struct LoadCell {
    current: Mutex<Arc<LoadSnapshot>>,
}

impl LoadCell {
    fn snapshot(&self) -> Arc<LoadSnapshot> {
        let current = self.current.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&*current)
    }

    fn record(&self, station: NodeId, clients: u32) -> ThresholdState {
        let mut current = self.current.lock().unwrap_or_else(PoisonError::into_inner);
        let snapshot = Arc::make_mut(&mut current);
        if snapshot.record(station, clients) {
            debug!(%station, clients, "new maximum station load");
        }
        snapshot.thresholds()
    }
}

struct LoadListener {
    cell: Arc<LoadCell>,
}

impl LoadListener {
    fn handle(&self, event: &Event) -> Result<(), LayerError> {
        let station = NodeId(event.unsigned_attribute(STATION_ATTRIBUTE)?);
        let clients = event.unsigned_attribute(CLIENTS_ATTRIBUTE)?;
        let clients = u32::try_from(clients)
            .map_err(|_| event.malformed(format!("client count {clients} out of range")))?;

        let thresholds = self.cell.record(station, clients);
        debug!(%station, clients, max = thresholds.max_observed_load, "station load updated");
        Ok(())
    }
}

impl EventListener for LoadListener {
    fn notify_of(&self, event: &Event) -> Result<(), LayerError> {
        self.handle(event)
    }
}

/// Marker style for one paint pass, fixed to a single snapshot.
struct ClassifiedStyle<'a> {
    stations: &'a BTreeSet<NodeId>,
    snapshot: &'a LoadSnapshot,
}

impl MarkerStyle for ClassifiedStyle<'_> {
    fn choose_color(&self, node: NodeId) -> Color32 {
        self.snapshot.classify(self.stations, node).color()
    }

    fn choose_stroke(&self, node: NodeId) -> f32 {
        if self.snapshot.load(node).is_some() {
            DEFAULT_STROKE
        } else {
            THIN_STROKE
        }
    }

    fn correct_position(&self, point: ProjectedPoint, node: NodeId) -> ProjectedPoint {
        if !self.stations.contains(&node) {
            return point;
        }

        if node.is_even() {
            point.offset(-STATION_OFFSET, -STATION_OFFSET)
        } else {
            point.offset(STATION_OFFSET, STATION_OFFSET)
        }
    }
}

/// Node markers recolored by live charging-station load.
///
/// The station set is read from the graph once, at construction; stations flagged
/// later are drawn as ordinary nodes. Dropping the layer cancels its subscription
/// and waits for a load report that is being applied at that moment.
pub struct LoadClassifiedNodeLayer {
    subscription: Option<Subscription>,
    graph: SharedGraph,
    stations: BTreeSet<NodeId>,
    cell: Arc<LoadCell>,
}

impl LoadClassifiedNodeLayer {
    pub fn new(graph: SharedGraph, bus: &EventBus) -> Self {
        let stations = graph.read().stations();
        let cell = Arc::new(LoadCell::default());
        let listener = Arc::new(LoadListener {
            cell: Arc::clone(&cell),
        });
        let subscription = bus.subscribe(
            TypePrefixFilter(CHARGING_STATION_EVENT_PREFIX.to_owned()),
            listener,
        );
        info!(stations = stations.len(), "load layer subscribed to station reports");

        Self {
            subscription: Some(subscription),
            graph,
            stations,
            cell,
        }
    }

    pub fn stations(&self) -> &BTreeSet<NodeId> {
        &self.stations
    }

    pub fn snapshot(&self) -> Arc<LoadSnapshot> {
        self.cell.snapshot()
    }

    pub fn is_subscribed(&self) -> bool {
        self.subscription.as_ref().is_some_and(Subscription::is_active)
    }

    /// Applies one load report directly, as the bus does on delivery.
    pub fn on_event(&self, event: &Event) -> Result<(), LayerError> {
        LoadListener {
            cell: Arc::clone(&self.cell),
        }
        .handle(event)
    }

    pub fn classify(&self, node: NodeId) -> LoadTier {
        self.cell.snapshot().classify(&self.stations, node)
    }
}

impl MapLayer for LoadClassifiedNodeLayer {
    fn name(&self) -> &'static str {
        "station load"
    }

    fn paint_layer(&self, projector: &dyn Projector, surface: &mut dyn DrawSurface) -> PaintReport {
        let snapshot = self.cell.snapshot();
        let style = ClassifiedStyle {
            stations: &self.stations,
            snapshot: &snapshot,
        };

        let report = paint_markers(&self.graph.read(), &style, projector, surface);

        let readout = format!(
            "Max clients at station: {}",
            snapshot.thresholds().max_observed_load
        );
        surface.draw_text(OVERLAY_TEXT_POSITION, &readout, OVERLAY_TEXT_COLOR);

        report
    }
}

impl Drop for LoadClassifiedNodeLayer {
    fn drop(&mut self) {
        if let Some(subscription) = self.subscription.take() {
            subscription.cancel();
            info!("load layer unsubscribed");
        }
    }
}
