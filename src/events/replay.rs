use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

use super::Event;

pub fn load_events(path: &Path) -> Result<Vec<Event>> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read event log {}", path.display()))?;
    parse_event_lines(&raw).with_context(|| format!("failed to parse event log {}", path.display()))
}

/// Decodes one JSON event per line; blank lines and `#` comments are skipped.
pub fn parse_event_lines(raw: &str) -> Result<Vec<Event>> {
    raw.lines()
        .enumerate()
        .filter(|(_, line)| {
            let line = line.trim();
            !line.is_empty() && !line.starts_with('#')
        })
        .map(|(index, line)| {
            serde_json::from_str::<Event>(line)
                .with_context(|| format!("invalid event on line {}", index + 1))
        })
        .collect()
}
