//! Stand-in for the simulation engine: random charging-station load reports.

use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::Sender;
use rand::Rng;
use rand::seq::SliceRandom;
use tracing::{info, warn};

use crate::events::Event;
use crate::graph::NodeId;
use crate::layers::station_load_event;

#[derive(Clone, Copy, Debug)]
pub struct SimulationConfig {
    pub tick: Duration,
    pub max_clients: u32,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            tick: Duration::from_millis(250),
            max_clients: 40,
        }
    }
}

/// Background thread sending one load report per tick until stopped or until the
/// receiving side of `sink` is gone.
pub struct LoadSimulation {
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<u64>>,
}

impl LoadSimulation {
    pub fn start(
        stations: Vec<NodeId>,
        config: SimulationConfig,
        sink: Sender<Event>,
    ) -> io::Result<Self> {
        let stop = Arc::new(AtomicBool::new(false));
        let thread_stop = Arc::clone(&stop);
        let handle = thread::Builder::new()
            .name("load-simulation".to_owned())
            .spawn(move || run(&stations, config, &sink, &thread_stop))?;

        Ok(Self {
            stop,
            handle: Some(handle),
        })
    }

    /// Stops the thread and returns how many reports it sent.
    pub fn stop(mut self) -> u64 {
        self.shutdown()
    }

    fn shutdown(&mut self) -> u64 {
        self.stop.store(true, Ordering::Relaxed);
        let Some(handle) = self.handle.take() else {
            return 0;
        };
        handle.join().unwrap_or_else(|_| {
            warn!("load simulation thread panicked");
            0
        })
    }
}

impl Drop for LoadSimulation {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run(
    stations: &[NodeId],
    config: SimulationConfig,
    sink: &Sender<Event>,
    stop: &AtomicBool,
) -> u64 {
    if stations.is_empty() {
        warn!("no stations to simulate");
        return 0;
    }

    info!(stations = stations.len(), "load simulation started");
    let mut rng = rand::thread_rng();
    let mut sent = 0u64;

    while !stop.load(Ordering::Relaxed) {
        let Some(&station) = stations.choose(&mut rng) else {
            break;
        };
        let clients = rng.gen_range(0..=config.max_clients);
        if sink.send(station_load_event(station, clients)).is_err() {
            warn!("event queue closed, stopping load simulation");
            break;
        }
        sent += 1;
        thread::sleep(config.tick);
    }

    info!(sent, "load simulation stopped");
    sent
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layers::{CLIENTS_ATTRIBUTE, STATION_ATTRIBUTE, STATION_LOAD_EVENT};

    #[test]
    fn emits_reports_for_known_stations_within_bounds() {
        let (tx, rx) = crossbeam_channel::unbounded();
        let config = SimulationConfig {
            tick: Duration::from_millis(1),
            max_clients: 5,
        };
        let simulation = LoadSimulation::start(vec![NodeId(2), NodeId(9)], config, tx).unwrap();

        let events = rx.iter().take(20).collect::<Vec<_>>();
        let sent = simulation.stop();

        assert!(sent >= 20);
        for event in events {
            assert_eq!(event.kind, STATION_LOAD_EVENT);
            let station = event.integer_attribute(STATION_ATTRIBUTE).unwrap();
            let clients = event.integer_attribute(CLIENTS_ATTRIBUTE).unwrap();
            assert!(station == 2 || station == 9);
            assert!((0..=5).contains(&clients));
        }
    }

    #[test]
    fn stops_when_receiver_is_dropped() {
        let (tx, rx) = crossbeam_channel::unbounded();
        drop(rx);
        let simulation =
            LoadSimulation::start(vec![NodeId(1)], SimulationConfig::default(), tx).unwrap();
        assert_eq!(simulation.stop(), 0);
    }
}
