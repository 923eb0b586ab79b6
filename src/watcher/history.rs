//! Bounded ring of the most recent log lines.

use std::collections::VecDeque;

/// Holds at most `capacity` lines in file order, evicting the oldest first.
///
/// This is the backlog replayed to every newly connected observer. It lives
/// inside the hub's lock; nothing mutates it from outside the hub.
#[derive(Debug)]
pub struct HistoryBuffer {
    lines: VecDeque<String>,
    capacity: usize,
}

impl HistoryBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            lines: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append one line, dropping the oldest when at capacity.
    pub fn push(&mut self, line: String) {
        if self.capacity == 0 {
            return;
        }
        if self.lines.len() == self.capacity {
            self.lines.pop_front();
        }
        self.lines.push_back(line);
    }

    /// Append lines in order, trimming as each one lands.
    pub fn extend<I>(&mut self, lines: I)
    where
        I: IntoIterator<Item = String>,
    {
        for line in lines {
            self.push(line);
        }
    }

    /// Current contents, oldest first.
    pub fn snapshot(&self) -> Vec<String> {
        self.lines.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}
