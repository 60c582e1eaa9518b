use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::LayerError;

mod demo;
mod parse;

pub use demo::demo_grid;
pub use parse::{load_graph, parse_graph};

pub const LOCATION_KEY: &str = "location";
pub const STATION_KEY: &str = "station";

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub u64);

impl NodeId {
    pub fn is_even(self) -> bool {
        self.0 % 2 == 0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Geographic position in degrees (WGS84).
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lon: f64,
}

impl Coordinates {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }
}

/// A graph vertex together with its annotation store.
#[derive(Clone, Debug)]
pub struct NodeRecord {
    pub id: NodeId,
    annotations: BTreeMap<String, Value>,
}

impl NodeRecord {
    pub fn new(id: NodeId) -> Self {
        Self {
            id,
            annotations: BTreeMap::new(),
        }
    }

    pub fn with_location(mut self, location: Coordinates) -> Self {
        self.annotate(
            LOCATION_KEY,
            serde_json::json!({ "lat": location.lat, "lon": location.lon }),
        );
        self
    }

    pub fn with_station(mut self, station: bool) -> Self {
        self.annotate(STATION_KEY, Value::Bool(station));
        self
    }

    pub fn annotate(&mut self, key: &str, value: Value) {
        self.annotations.insert(key.to_owned(), value);
    }

    /// Typed annotation lookup. A value that does not decode as `T` reads as absent.
    pub fn annotation<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.annotations
            .get(key)
            .and_then(|value| T::deserialize(value).ok())
    }

    pub fn location(&self) -> Result<Coordinates, LayerError> {
        self.annotation(LOCATION_KEY).ok_or(LayerError::MissingAnnotation {
            node: self.id,
            key: LOCATION_KEY,
        })
    }

    pub fn is_station(&self) -> bool {
        self.annotation::<bool>(STATION_KEY).unwrap_or(false)
    }
}

#[derive(Clone, Debug, Default)]
pub struct AnnotatedGraph {
    nodes: BTreeMap<NodeId, NodeRecord>,
}

impl AnnotatedGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a node, returning the record it replaced.
    pub fn insert(&mut self, record: NodeRecord) -> Option<NodeRecord> {
        self.nodes.insert(record.id, record)
    }

    pub fn node(&self, id: NodeId) -> Option<&NodeRecord> {
        self.nodes.get(&id)
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut NodeRecord> {
        self.nodes.get_mut(&id)
    }

    /// Nodes in ascending id order.
    pub fn nodes(&self) -> impl Iterator<Item = &NodeRecord> {
        self.nodes.values()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn stations(&self) -> BTreeSet<NodeId> {
        self.nodes
            .values()
            .filter(|node| node.is_station())
            .map(|node| node.id)
            .collect()
    }

    pub fn into_shared(self) -> SharedGraph {
        SharedGraph(Arc::new(RwLock::new(self)))
    }
}

/// Handle to a graph shared between the host and its overlay layers.
#[derive(Clone, Debug, Default)]
pub struct SharedGraph(Arc<RwLock<AnnotatedGraph>>);

impl SharedGraph {
    pub fn read(&self) -> RwLockReadGuard<'_, AnnotatedGraph> {
        self.0.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn write(&self) -> RwLockWriteGuard<'_, AnnotatedGraph> {
        self.0.write().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn station_flag_defaults_to_false() {
        let plain = NodeRecord::new(NodeId(1));
        let station = NodeRecord::new(NodeId(2)).with_station(true);
        let mut garbled = NodeRecord::new(NodeId(3));
        garbled.annotate(STATION_KEY, Value::String("yes".into()));

        assert!(!plain.is_station());
        assert!(station.is_station());
        assert!(!garbled.is_station());
    }

    #[test]
    fn missing_location_is_reported() {
        let node = NodeRecord::new(NodeId(9));
        assert_eq!(
            node.location(),
            Err(LayerError::MissingAnnotation {
                node: NodeId(9),
                key: LOCATION_KEY
            })
        );

        let node = node.with_location(Coordinates::new(50.88, 4.70));
        assert_eq!(node.location(), Ok(Coordinates::new(50.88, 4.70)));
    }

    #[test]
    fn stations_are_collected_in_id_order() {
        let mut graph = AnnotatedGraph::new();
        graph.insert(NodeRecord::new(NodeId(5)).with_station(true));
        graph.insert(NodeRecord::new(NodeId(2)));
        graph.insert(NodeRecord::new(NodeId(1)).with_station(true));

        let stations = graph.stations().into_iter().collect::<Vec<_>>();
        assert_eq!(stations, vec![NodeId(1), NodeId(5)]);
    }
}
