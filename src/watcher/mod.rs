//! Log watching: poll-based growth detection and delta reads.

pub mod file_watcher;
pub mod history;
pub mod tail;

pub use file_watcher::FileWatcher;
pub use history::HistoryBuffer;
pub use tail::read_initial;
