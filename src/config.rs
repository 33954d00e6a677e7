use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Settings for the background map loader.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoaderConfig {
    /// How often the watcher rechecks regions in view, in milliseconds.
    #[serde(default = "default_watch_interval_ms")]
    pub watch_interval_ms: u64,
    /// Lowest block Y the loader reads.
    #[serde(default = "default_min_y")]
    pub min_y: i32,
    /// Highest block Y the loader reads.
    #[serde(default = "default_max_y")]
    pub max_y: i32,
    /// Number of region parser threads.
    #[serde(default = "default_parser_threads")]
    pub parser_threads: usize,
    /// Load the visible chunks of a region right after parsing it.
    #[serde(default = "default_true")]
    pub preload_chunks: bool,
}

fn default_watch_interval_ms() -> u64 {
    3000
}
fn default_min_y() -> i32 {
    -64
}
fn default_max_y() -> i32 {
    320
}
fn default_parser_threads() -> usize {
    1
}
fn default_true() -> bool {
    true
}

impl Default for LoaderConfig {
    fn default() -> Self {
        LoaderConfig {
            watch_interval_ms: default_watch_interval_ms(),
            min_y: default_min_y(),
            max_y: default_max_y(),
            parser_threads: default_parser_threads(),
            preload_chunks: true,
        }
    }
}

impl LoaderConfig {
    pub fn from_json(json: &str) -> crate::error::Result<Self> {
        let config: LoaderConfig = serde_json::from_str(json)?;
        Ok(config)
    }

    pub fn watch_interval(&self) -> Duration {
        Duration::from_millis(self.watch_interval_ms)
    }
}
