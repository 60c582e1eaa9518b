//! Node overlays for a power-grid simulation map: plain markers, markers
//! classified by live charging-station load, and node id labels.

pub mod error;
pub mod events;
pub mod graph;
pub mod layers;
pub mod projection;
pub mod simulation;
pub mod surface;
pub mod telemetry;

pub use error::LayerError;
