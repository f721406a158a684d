use zkguard_common::LogEntry;

/// Append-only, ordered log of one pipeline run.
///
/// Entries are never edited or removed individually; the whole sink is
/// cleared at the start of the next run. Every append is mirrored to
/// `tracing` so the stream also lands in the process log.
#[derive(Debug, Default)]
pub struct LogSink {
    entries: Vec<LogEntry>,
}

impl LogSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stamp `message` with the current time and append it.
    pub fn append(&mut self, message: impl Into<String>) -> LogEntry {
        let entry = LogEntry::new(message);
        if entry.is_warning() {
            tracing::warn!(target: "zkguard::pipeline", "{}", entry.message);
        } else {
            tracing::info!(target: "zkguard::pipeline", "{}", entry.message);
        }
        self.entries.push(entry.clone());
        entry
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn snapshot(&self) -> Vec<LogEntry> {
        self.entries.clone()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// True if any entry's message contains `needle`.
    pub fn contains(&self, needle: &str) -> bool {
        self.entries.iter().any(|e| e.message.contains(needle))
    }
}
