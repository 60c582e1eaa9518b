use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow, bail};
use serde::Deserialize;
use serde_json::Value;

use super::{AnnotatedGraph, Coordinates, NodeId, NodeRecord};

#[derive(Clone, Debug, Deserialize)]
struct RawGraph {
    nodes: Vec<RawNode>,
}

#[derive(Clone, Debug, Deserialize)]
struct RawNode {
    id: u64,
    #[serde(default)]
    annotations: BTreeMap<String, Value>,
    #[serde(default)]
    location: Option<Coordinates>,
    #[serde(default)]
    station: Option<bool>,
}

pub fn load_graph(path: &Path) -> Result<AnnotatedGraph> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read graph file {}", path.display()))?;
    parse_graph(&raw).with_context(|| format!("failed to parse graph file {}", path.display()))
}

/// Parses a graph document of the form `{"nodes": [{"id": 1, "annotations": {...}}]}`.
///
/// `location` and `station` may also be given as top-level node fields; they take
/// precedence over the same keys inside `annotations`.
pub fn parse_graph(raw: &str) -> Result<AnnotatedGraph> {
    let parsed: Value = serde_json::from_str(raw).context("invalid JSON in graph document")?;
    let object = parsed
        .as_object()
        .ok_or_else(|| anyhow!("graph document must be a JSON object"))?;
    let nodes_value = object
        .get("nodes")
        .ok_or_else(|| anyhow!("graph document has no `nodes` array"))?;
    let raw_graph = RawGraph {
        nodes: Vec::<RawNode>::deserialize(nodes_value).context("invalid `nodes` array")?,
    };

    let mut graph = AnnotatedGraph::new();
    for raw_node in raw_graph.nodes {
        let id = NodeId(raw_node.id);
        let mut record = NodeRecord::new(id);
        for (key, value) in raw_node.annotations {
            record.annotate(&key, value);
        }
        if let Some(location) = raw_node.location {
            record = record.with_location(location);
        }
        if let Some(station) = raw_node.station {
            record = record.with_station(station);
        }

        if graph.insert(record).is_some() {
            bail!("duplicate node id {id} in graph document");
        }
    }

    Ok(graph)
}
