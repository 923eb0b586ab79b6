//! Runtime settings for the tailer and the HTTP layer.

use std::path::PathBuf;
use std::time::Duration;

/// Default log file to watch.
pub const DEFAULT_LOG_PATH: &str = "./test.txt";

/// Default interval between stat checks of the watched file. Bounds the
/// worst-case delivery latency to one interval.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 100;

/// Default number of recent lines kept for replay to new observers.
pub const DEFAULT_HISTORY_CAPACITY: usize = 10;

/// Bytes read from the end of the file at startup. Sized to usually contain
/// at least `DEFAULT_HISTORY_CAPACITY` lines without scanning the whole file.
pub const DEFAULT_TAIL_WINDOW_BYTES: u64 = 1000;

/// Default HTTP listen port.
pub const DEFAULT_PORT: u16 = 3000;

/// Settings assembled from CLI flags.
#[derive(Debug, Clone)]
pub struct Config {
    /// File whose appended lines are broadcast.
    pub log_path: PathBuf,
    /// Interval between stat checks.
    pub poll_interval: Duration,
    /// Maximum number of lines held for replay.
    pub history_capacity: usize,
    /// How far back into the file the initial read looks.
    pub tail_window_bytes: u64,
    /// HTTP listen port.
    pub port: u16,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_path: PathBuf::from(DEFAULT_LOG_PATH),
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            tail_window_bytes: DEFAULT_TAIL_WINDOW_BYTES,
            port: DEFAULT_PORT,
        }
    }
}
