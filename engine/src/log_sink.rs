//! Player-facing combat log.

use std::collections::VecDeque;

use log::debug;
use wayfarer_shared::{LogEntry, Severity};

/// Receives the human-readable events produced during combat.
/// Display and retention are up to the implementation.
pub trait LogSink {
    fn emit(&mut self, entry: LogEntry);
}

/// Bounded in-memory log; the oldest entries are dropped first
#[derive(Debug, Clone)]
pub struct CombatLog {
    entries: VecDeque<LogEntry>,
    capacity: usize,
}

impl CombatLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity.min(256)),
            capacity: capacity.max(1),
        }
    }

    pub fn entries(&self) -> impl Iterator<Item = &LogEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn last(&self) -> Option<&LogEntry> {
        self.entries.back()
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.entries.iter().any(|e| e.message.contains(needle))
    }

    pub fn count(&self, severity: Severity) -> usize {
        self.entries.iter().filter(|e| e.severity == severity).count()
    }
}

impl LogSink for CombatLog {
    fn emit(&mut self, entry: LogEntry) {
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        mirror(&entry);
        self.entries.push_back(entry);
    }
}

impl<T: LogSink + ?Sized> LogSink for Box<T> {
    fn emit(&mut self, entry: LogEntry) {
        (**self).emit(entry)
    }
}

/// Mirror an entry to the `log` facade under the `combat` target
fn mirror(entry: &LogEntry) {
    match entry.severity {
        Severity::Error => debug!(target: "combat", "rejected: {}", entry.message),
        _ => debug!(target: "combat", "{}", entry.message),
    }
}

/// Prints entries to stdout for the terminal driver, keeping the most
/// recent ones for redraws
#[derive(Debug, Clone)]
pub struct ConsoleSink {
    recent: CombatLog,
}

impl ConsoleSink {
    pub fn new(capacity: usize) -> Self {
        Self { recent: CombatLog::new(capacity) }
    }

    pub fn recent(&self) -> &CombatLog {
        &self.recent
    }
}

impl LogSink for ConsoleSink {
    fn emit(&mut self, entry: LogEntry) {
        println!("{}", entry);
        self.recent.emit(entry);
    }
}
