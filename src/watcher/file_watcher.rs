//! Poll loop that detects file growth and feeds the hub.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::hub::Hub;
use crate::watcher::tail;

/// Caps the bytes consumed per tick. A burst of writes larger than this is
/// worked off across consecutive ticks in bounded allocations instead of
/// one delta-sized buffer.
const MAX_DELTA_BYTES_PER_TICK: u64 = 4 * 1024 * 1024;

/// Stats the watched file on a fixed interval and publishes newly appended
/// lines to the hub.
///
/// Detection is by size comparison only: growth triggers a delta read of
/// the new byte range, capped per tick; shrink or no change rebaselines
/// silently.
/// Appends landing between two ticks are coalesced into one batch, in file
/// order.
pub struct FileWatcher {
    path: PathBuf,
    interval: Duration,
    last_size: u64,
    hub: Arc<Hub>,
}

impl FileWatcher {
    /// `baseline` is the file size already accounted for, normally the one
    /// reported by the initial tail read.
    pub fn new(path: PathBuf, interval: Duration, baseline: u64, hub: Arc<Hub>) -> Self {
        Self {
            path,
            interval,
            last_size: baseline,
            hub,
        }
    }

    /// Poll until `shutdown` is cancelled. I/O errors never end the loop;
    /// a failed stat or read only skips that tick.
    pub async fn run(mut self, shutdown: CancellationToken) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {}
            }
            self.poll_once();
        }
        debug!(path = %self.path.display(), "file watcher stopped");
    }

    /// One stat-and-compare cycle.
    fn poll_once(&mut self) {
        let size = match std::fs::metadata(&self.path) {
            Ok(meta) => meta.len(),
            Err(e) => {
                debug!(path = %self.path.display(), error = %e, "stat failed, skipping tick");
                return;
            }
        };

        if size <= self.last_size {
            // No growth, or the file was truncated. Rebaseline so a later
            // regrowth is read relative to the new size, and emit nothing.
            self.last_size = size;
            return;
        }

        // A capped read can end mid-line; the cut falls under the same
        // documented fragment limitation as a write without a newline yet.
        let target = size.min(self.last_size + MAX_DELTA_BYTES_PER_TICK);

        match tail::read_delta(&self.path, self.last_size, target) {
            Ok(lines) => {
                for line in lines {
                    self.hub.publish(line);
                }
                self.last_size = target;
            }
            Err(e) => {
                // Baseline stays put; the range is retried or rebaselined
                // on the next tick depending on what the stat says then.
                warn!(path = %self.path.display(), error = %e, "delta read failed, skipping tick");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::io::Write;
    use std::path::Path;

    use tokio::sync::mpsc::error::TryRecvError;

    use super::*;

    fn watcher(path: &Path, hub: &Arc<Hub>) -> FileWatcher {
        FileWatcher::new(
            path.to_path_buf(),
            Duration::from_millis(10),
            0,
            Arc::clone(hub),
        )
    }

    fn append(path: &Path, data: &str) {
        let mut f = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .unwrap();
        f.write_all(data.as_bytes()).unwrap();
    }

    #[test]
    fn growth_publishes_each_new_line_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.log");
        fs::write(&path, "").unwrap();

        let hub = Arc::new(Hub::new(10));
        let mut w = watcher(&path, &hub);

        let mut receivers: Vec<_> = (0..3).map(|_| hub.subscribe().1).collect();
        append(&path, "a\nb\nc\n");
        w.poll_once();

        for rx in &mut receivers {
            assert_eq!(rx.try_recv().unwrap(), "a");
            assert_eq!(rx.try_recv().unwrap(), "b");
            assert_eq!(rx.try_recv().unwrap(), "c");
            assert_eq!(rx.try_recv(), Err(TryRecvError::Empty));
        }

        // A fourth observer connecting afterwards gets the replay only.
        let (_id, mut late) = hub.subscribe();
        assert_eq!(late.try_recv().unwrap(), "a");
        assert_eq!(late.try_recv().unwrap(), "b");
        assert_eq!(late.try_recv().unwrap(), "c");
        assert_eq!(late.try_recv(), Err(TryRecvError::Empty));
    }

    #[test]
    fn unchanged_size_emits_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.log");
        fs::write(&path, "a\n").unwrap();

        let hub = Arc::new(Hub::new(10));
        let mut w = watcher(&path, &hub);
        w.poll_once();

        let (_id, mut rx) = hub.subscribe();
        assert_eq!(rx.try_recv().unwrap(), "a");

        w.poll_once();
        assert_eq!(rx.try_recv(), Err(TryRecvError::Empty));
    }

    #[test]
    fn truncation_rebaselines_without_emitting() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.log");
        fs::write(&path, "old contents\n").unwrap();

        let hub = Arc::new(Hub::new(10));
        let mut w = watcher(&path, &hub);
        w.poll_once();

        let (_id, mut rx) = hub.subscribe();
        assert_eq!(rx.try_recv().unwrap(), "old contents");

        // Truncate to zero: nothing may be emitted on that tick.
        fs::write(&path, "").unwrap();
        w.poll_once();
        assert_eq!(rx.try_recv(), Err(TryRecvError::Empty));
        assert_eq!(w.last_size, 0);

        // Growth past the new baseline is emitted exactly once.
        append(&path, "x\n");
        w.poll_once();
        assert_eq!(rx.try_recv().unwrap(), "x");
        assert_eq!(rx.try_recv(), Err(TryRecvError::Empty));
    }

    #[test]
    fn missing_file_skips_tick_and_keeps_baseline() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.log");

        let hub = Arc::new(Hub::new(10));
        let mut w = FileWatcher::new(
            path.clone(),
            Duration::from_millis(10),
            7,
            Arc::clone(&hub),
        );
        w.poll_once();
        assert_eq!(w.last_size, 7);
        assert!(hub.history().is_empty());
    }

    #[test]
    fn multiple_appends_between_ticks_are_coalesced_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.log");
        fs::write(&path, "").unwrap();

        let hub = Arc::new(Hub::new(10));
        let mut w = watcher(&path, &hub);
        let (_id, mut rx) = hub.subscribe();

        append(&path, "first\n");
        append(&path, "second\n");
        append(&path, "third\n");
        w.poll_once();

        assert_eq!(rx.try_recv().unwrap(), "first");
        assert_eq!(rx.try_recv().unwrap(), "second");
        assert_eq!(rx.try_recv().unwrap(), "third");
    }

    #[test]
    fn oversized_delta_is_consumed_across_ticks() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.log");

        // 5120 lines of exactly 1024 bytes: one tick's cap lands precisely
        // on the end of line 4096.
        let mut f = fs::File::create(&path).unwrap();
        for i in 1..=5120 {
            writeln!(f, "{i:04} {}", "x".repeat(1018)).unwrap();
        }
        drop(f);

        let hub = Arc::new(Hub::new(10));
        let mut w = watcher(&path, &hub);

        w.poll_once();
        assert_eq!(w.last_size, MAX_DELTA_BYTES_PER_TICK);
        assert!(hub.history().last().unwrap().starts_with("4096"));

        w.poll_once();
        assert_eq!(w.last_size, 5120 * 1024);
        assert!(hub.history().last().unwrap().starts_with("5120"));
    }

    #[tokio::test]
    async fn run_loop_delivers_appends_and_stops_on_cancel() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.log");
        fs::write(&path, "").unwrap();

        let hub = Arc::new(Hub::new(10));
        let (_id, mut rx) = hub.subscribe();

        let shutdown = CancellationToken::new();
        let w = FileWatcher::new(
            path.clone(),
            Duration::from_millis(5),
            0,
            Arc::clone(&hub),
        );
        let task = tokio::spawn(w.run(shutdown.clone()));

        append(&path, "live\n");
        let line = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("line within poll latency")
            .expect("channel open");
        assert_eq!(line, "live");

        shutdown.cancel();
        tokio::time::timeout(Duration::from_secs(2), task)
            .await
            .expect("watcher stops promptly")
            .unwrap();
    }
}
