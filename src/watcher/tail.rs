//! Bounded tail-window and delta-range reads of the watched file.
//!
//! The file is re-opened for every read; no descriptor is held between
//! polls, so rotation or deletion between ticks cannot wedge the watcher.

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::Path;

use tracing::warn;

/// Lines parsed from the end of the file plus the size they were read at.
#[derive(Debug)]
pub struct InitialTail {
    /// Last non-blank lines within the tail window, oldest first.
    pub lines: Vec<String>,
    /// File size at read time, the baseline for subsequent delta reads.
    pub size: u64,
}

/// Read the last `window` bytes of the file (or the whole file if smaller)
/// and keep the last `keep` non-blank lines.
///
/// A missing or unreadable file is treated as an empty log: no lines and a
/// zero baseline. Polling picks the file up once it exists and grows.
pub fn read_initial(path: &Path, window: u64, keep: usize) -> InitialTail {
    match read_tail_window(path, window, keep) {
        Ok(tail) => tail,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "could not read initial tail, starting empty");
            InitialTail {
                lines: Vec::new(),
                size: 0,
            }
        }
    }
}

fn read_tail_window(path: &Path, window: u64, keep: usize) -> io::Result<InitialTail> {
    let mut file = File::open(path)?;
    let size = file.metadata()?.len();
    file.seek(SeekFrom::Start(size.saturating_sub(window)))?;

    let mut buf = Vec::new();
    file.read_to_end(&mut buf)?;

    let mut lines = split_lines(&buf);
    if lines.len() > keep {
        lines.drain(..lines.len() - keep);
    }
    Ok(InitialTail { lines, size })
}

/// Read exactly the byte range `[prev, curr)` and return its non-blank
/// lines in file order. The caller checks `curr > prev`.
///
/// A trailing fragment not yet terminated by a newline is returned as a
/// line of its own, and the rest of that line arrives as a separate line on
/// a later read. Known limitation: the baseline always advances to `curr`,
/// so the fragment is never stitched back together.
pub fn read_delta(path: &Path, prev: u64, curr: u64) -> io::Result<Vec<String>> {
    debug_assert!(curr > prev);

    let mut file = File::open(path)?;
    file.seek(SeekFrom::Start(prev))?;

    // Strict read: if the file shrank between the stat and this read, error
    // out and let the caller skip the tick rather than emit a torn range.
    let mut buf = vec![0u8; (curr - prev) as usize];
    file.read_exact(&mut buf)?;

    Ok(split_lines(&buf))
}

/// Split raw bytes on `\n`, dropping blank and whitespace-only records.
/// Decoding is lossy; a stray invalid byte must not kill the poll loop.
/// Trailing `\r` is stripped so CRLF input produces clean event payloads.
fn split_lines(bytes: &[u8]) -> Vec<String> {
    String::from_utf8_lossy(bytes)
        .split('\n')
        .map(|line| line.trim_end_matches('\r'))
        .filter(|line| !line.trim().is_empty())
        .map(str::to_owned)
        .collect()
}
