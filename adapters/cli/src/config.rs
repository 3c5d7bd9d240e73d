//! JSON match configuration for headless runs.

use std::fs;
use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

/// Match parameters a headless run reads from a JSON file. Every field is
/// optional in the file; omitted fields keep their defaults.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct MatchConfig {
    /// Grid width in cells.
    pub columns: u32,
    /// Grid height in cells.
    pub rows: u32,
    /// Tick cap; `None` runs until one player remains.
    pub max_iterations: Option<u64>,
    /// Wall-clock pacing between ticks, in milliseconds.
    pub tick_step_ms: u64,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            columns: 12,
            rows: 10,
            max_iterations: Some(3_000),
            tick_step_ms: 100,
        }
    }
}

impl MatchConfig {
    /// Loads the configuration from a JSON file.
    pub(crate) fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse config {}", path.display()))
    }
}
