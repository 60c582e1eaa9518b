mod viewer;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Result, anyhow};
use clap::Parser;
use tracing::info;

use grid_overlay::events::load_events;
use grid_overlay::graph::{demo_grid, load_graph};
use grid_overlay::simulation::SimulationConfig;
use grid_overlay::telemetry;

#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Args {
    /// JSON graph document; a demo grid around Leuven is shown when omitted.
    #[arg(long)]
    graph: Option<PathBuf>,
    /// JSON-lines event log replayed at startup.
    #[arg(long)]
    events: Option<PathBuf>,
    /// Emit random charging-station load reports.
    #[arg(long)]
    simulate: bool,
    #[arg(long, default_value_t = 250)]
    tick_ms: u64,
    #[arg(long, default_value_t = 40)]
    max_clients: u32,
    #[arg(long, default_value = "info")]
    log_filter: String,
}

fn main() -> Result<()> {
    let args = Args::parse();
    telemetry::init(&args.log_filter)?;

    let graph = match &args.graph {
        Some(path) => load_graph(path)?,
        None => demo_grid(),
    };
    info!(
        nodes = graph.node_count(),
        stations = graph.stations().len(),
        "graph loaded"
    );

    let replay = match &args.events {
        Some(path) => load_events(path)?,
        None => Vec::new(),
    };

    let simulation = args.simulate.then(|| SimulationConfig {
        tick: Duration::from_millis(args.tick_ms),
        max_clients: args.max_clients,
    });

    let options = viewer::ViewerOptions {
        graph,
        replay,
        simulation,
    };
    let native_options = eframe::NativeOptions {
        viewport: eframe::egui::ViewportBuilder::default().with_inner_size([1280.0, 860.0]),
        ..Default::default()
    };

    eframe::run_native(
        "grid-overlay",
        native_options,
        Box::new(move |cc| Ok(Box::new(viewer::GridOverlayApp::new(cc, options)?))),
    )
    .map_err(|error| anyhow!("viewer failed: {error}"))
}
