#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Line-oriented match logs.
//!
//! One event per line, prefixed with the tick it happened on:
//!
//! ```text
//! 0: map {"seed":42,"map":{"0":{"3":"sb"}}}
//! 0: add_player {"pid":0,"name":"P[0]"}
//! 17: 0 u
//! 17: 1 p
//! ```
//!
//! Map and registration payloads are JSON; move lines carry the player id
//! and the action's wire code. Together with the seed embedded in the map
//! line, a log replays a match exactly: re-enqueueing each recorded move on
//! its tick reproduces the rng stream and therefore the whole run.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use blastgrid_core::{GameEvent, OccupancyMap, PlayerAction, PlayerId, Recorder};

/// Failure while writing, reading or parsing a match log.
#[derive(Debug, Error)]
pub enum LogError {
    /// Underlying file I/O failed.
    #[error("log I/O failed: {0}")]
    Io(#[from] std::io::Error),
    /// A JSON payload could not be encoded or decoded.
    #[error("log payload invalid: {0}")]
    Json(#[from] serde_json::Error),
    /// A line does not match any known event shape.
    #[error("malformed log line: {0:?}")]
    Malformed(String),
}

#[derive(Serialize, Deserialize)]
struct MapPayload {
    seed: u64,
    map: OccupancyMap,
}

#[derive(Serialize, Deserialize)]
struct PlayerPayload {
    pid: PlayerId,
    name: String,
}

/// Renders one event as its log line, without the trailing newline.
pub fn format_event(tick: u64, event: &GameEvent) -> Result<String, LogError> {
    let line = match event {
        GameEvent::MapGenerated { seed, map } => {
            let payload = serde_json::to_string(&MapPayload {
                seed: *seed,
                map: map.clone(),
            })?;
            format!("{tick}: map {payload}")
        }
        GameEvent::PlayerAdded { pid, name } => {
            let payload = serde_json::to_string(&PlayerPayload {
                pid: *pid,
                name: name.clone(),
            })?;
            format!("{tick}: add_player {payload}")
        }
        GameEvent::Move { pid, action } => format!("{tick}: {pid} {}", action.code()),
    };
    Ok(line)
}

/// Parses one log line back into its tick and event.
pub fn parse_line(line: &str) -> Result<(u64, GameEvent), LogError> {
    let malformed = || LogError::Malformed(line.to_owned());
    let (tick, rest) = line.split_once(": ").ok_or_else(malformed)?;
    let tick: u64 = tick.trim().parse().map_err(|_| malformed())?;
    if let Some(payload) = rest.strip_prefix("map ") {
        let payload: MapPayload = serde_json::from_str(payload)?;
        return Ok((
            tick,
            GameEvent::MapGenerated {
                seed: payload.seed,
                map: payload.map,
            },
        ));
    }
    if let Some(payload) = rest.strip_prefix("add_player ") {
        let payload: PlayerPayload = serde_json::from_str(payload)?;
        return Ok((
            tick,
            GameEvent::PlayerAdded {
                pid: payload.pid,
                name: payload.name,
            },
        ));
    }
    let (pid, code) = match rest.split_once(' ') {
        Some((pid, code)) => (pid, code),
        // A bare id is a recorded no-op; the code for it is empty.
        None => (rest, ""),
    };
    let pid = PlayerId::new(pid.trim().parse().map_err(|_| malformed())?);
    let action = PlayerAction::from_code(code.trim()).ok_or_else(malformed)?;
    Ok((tick, GameEvent::Move { pid, action }))
}

/// Reads a whole log file, skipping blank lines.
pub fn read_log(path: &Path) -> Result<Vec<(u64, GameEvent)>, LogError> {
    let reader = BufReader::new(File::open(path)?);
    let mut events = Vec::new();
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        events.push(parse_line(&line)?);
    }
    Ok(events)
}

/// Appends match events to a file, one line each, flushed per event so a
/// crash mid-match loses at most the line being written.
pub struct FileRecorder {
    writer: BufWriter<File>,
}

impl FileRecorder {
    /// Creates (or truncates) the log file at `path`.
    pub fn create(path: &Path) -> Result<Self, LogError> {
        Ok(Self {
            writer: BufWriter::new(File::create(path)?),
        })
    }
}

impl Recorder for FileRecorder {
    fn record(&mut self, tick: u64, event: &GameEvent) {
        // The engine never blocks on recording; a failed write costs the
        // line, not the match.
        match format_event(tick, event) {
            Ok(line) => {
                if let Err(error) = writeln!(self.writer, "{line}") {
                    warn!(%error, "dropped log line");
                    return;
                }
                if let Err(error) = self.writer.flush() {
                    warn!(%error, "log flush failed");
                }
            }
            Err(error) => warn!(%error, "unencodable event"),
        }
    }
}
