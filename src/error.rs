use crate::graph::NodeId;

/// Recoverable failures raised while painting nodes or consuming load events.
///
/// Neither variant is fatal: a paint pass skips the affected node and an event
/// listener discards the offending event.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LayerError {
    #[error("node {node} has no usable `{key}` annotation")]
    MissingAnnotation { node: NodeId, key: &'static str },
    #[error("discarded `{kind}` event: {reason}")]
    MalformedEvent { kind: String, reason: String },
}
