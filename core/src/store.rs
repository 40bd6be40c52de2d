//! Bounded per-level log store shared between the feed and the UI

use crate::{LogEntry, LogLevel};
use parking_lot::RwLock;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::watch;

/// Maximum number of entries kept per level
pub const MAX_LOG_NUM: usize = 1000;

/// Per-level ring buffers of received log entries.
///
/// Cloning yields another handle to the same store. Every operation takes the
/// lock once, so an append (including its eviction) and a full clear are each
/// observed as a single step.
#[derive(Clone)]
pub struct LogStore {
    inner: Arc<StoreInner>,
}

struct StoreInner {
    levels: RwLock<HashMap<LogLevel, VecDeque<LogEntry>>>,
    capacity: usize,
    revision: watch::Sender<u64>,
}

impl Default for LogStore {
    fn default() -> Self {
        Self::new()
    }
}

impl LogStore {
    pub fn new() -> Self {
        Self::with_capacity(MAX_LOG_NUM)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let levels = LogLevel::ALL
            .iter()
            .map(|level| (*level, VecDeque::new()))
            .collect();
        let (revision, _) = watch::channel(0);
        Self {
            inner: Arc::new(StoreInner {
                levels: RwLock::new(levels),
                capacity,
                revision,
            }),
        }
    }

    pub fn capacity(&self) -> usize {
        self.inner.capacity
    }

    /// Append an entry, evicting the oldest one when the level is full
    pub fn append(&self, level: LogLevel, entry: LogEntry) {
        {
            let mut levels = self.inner.levels.write();
            let entries = levels.entry(level).or_default();
            if entries.len() >= self.inner.capacity {
                entries.pop_front();
            }
            entries.push_back(entry);
        }
        self.bump();
    }

    /// Swap a level's entries for `batch` under a single lock.
    ///
    /// Only the newest `capacity` entries of the batch are kept.
    pub fn replace(&self, level: LogLevel, batch: impl IntoIterator<Item = LogEntry>) {
        let mut fresh: VecDeque<LogEntry> = VecDeque::new();
        for entry in batch {
            if fresh.len() >= self.inner.capacity {
                fresh.pop_front();
            }
            fresh.push_back(entry);
        }
        self.inner.levels.write().insert(level, fresh);
        self.bump();
    }

    /// Clear one level, or every level at once when `level` is `None`
    pub fn clear(&self, level: Option<LogLevel>) {
        {
            let mut levels = self.inner.levels.write();
            match level {
                Some(level) => {
                    if let Some(entries) = levels.get_mut(&level) {
                        entries.clear();
                    }
                }
                None => levels.values_mut().for_each(|entries| entries.clear()),
            }
        }
        self.bump();
    }

    /// Snapshot of a level's entries, oldest first
    pub fn get(&self, level: LogLevel) -> Vec<LogEntry> {
        self.read(level, |entries| entries.iter().cloned().collect())
    }

    /// Run `f` over a level's entries without copying them
    pub fn read<R>(&self, level: LogLevel, f: impl FnOnce(&VecDeque<LogEntry>) -> R) -> R {
        let levels = self.inner.levels.read();
        match levels.get(&level) {
            Some(entries) => f(entries),
            None => f(&VecDeque::new()),
        }
    }

    pub fn len(&self, level: LogLevel) -> usize {
        self.read(level, |entries| entries.len())
    }

    pub fn is_empty(&self, level: LogLevel) -> bool {
        self.len(level) == 0
    }

    /// Receiver that changes whenever the store is mutated
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.inner.revision.subscribe()
    }

    /// Number of mutations since creation
    pub fn revision(&self) -> u64 {
        *self.inner.revision.borrow()
    }

    fn bump(&self) {
        self.inner.revision.send_modify(|rev| *rev += 1);
    }
}
