//! In-process tables.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;

use crate::storage::{LogStore, PersistenceError};
use crate::telemetry::{LogCategory, LogRecord};

/// Store keeping every table in memory.
///
/// Its availability can be switched off to simulate an outage.
#[derive(Debug)]
pub struct MemoryLogStore {
    tables: DashMap<LogCategory, Vec<LogRecord>>,
    available: AtomicBool,
    write_attempts: AtomicU64,
}

impl MemoryLogStore {
    pub fn new() -> Self {
        Self {
            tables: DashMap::new(),
            available: AtomicBool::new(true),
            write_attempts: AtomicU64::new(0),
        }
    }

    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    pub fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }

    /// Rows of one table, in insertion order.
    pub fn records(&self, category: LogCategory) -> Vec<LogRecord> {
        self.tables
            .get(&category)
            .map(|rows| rows.clone())
            .unwrap_or_default()
    }

    /// Rows of every table.
    pub fn all_records(&self) -> Vec<LogRecord> {
        LogCategory::ALL
            .into_iter()
            .flat_map(|category| self.records(category))
            .collect()
    }

    pub fn len(&self, category: LogCategory) -> usize {
        self.tables.get(&category).map_or(0, |rows| rows.len())
    }

    pub fn total(&self) -> usize {
        self.tables.iter().map(|rows| rows.len()).sum()
    }

    pub fn write_attempts(&self) -> u64 {
        self.write_attempts.load(Ordering::Relaxed)
    }
}

impl Default for MemoryLogStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LogStore for MemoryLogStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn write_batch(
        &self,
        category: LogCategory,
        records: &[LogRecord],
    ) -> Result<(), PersistenceError> {
        self.write_attempts.fetch_add(1, Ordering::Relaxed);
        if !self.is_available() {
            return Err(PersistenceError::Unavailable(
                "memory store switched off".to_string(),
            ));
        }
        self.tables
            .entry(category)
            .or_default()
            .extend_from_slice(records);
        Ok(())
    }
}
