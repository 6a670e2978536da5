//! Persistent log store adapters.
//!
//! # Data Flow
//! ```text
//! Consumer batch (one category, insertion order)
//!     → LogStore::write_batch (memory.rs | jsonl.rs)
//!     → on exhausted retries: fallback.rs appends whole lines
//! ```
//!
//! # Design Decisions
//! - Stores receive sealed records and shape rows through schema.rs only
//! - A batch is written whole or reported failed; partial writes are the
//!   store's concern
//! - The store is only borrowed for the duration of one batch flush

pub mod fallback;
pub mod jsonl;
pub mod memory;
pub mod schema;

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::telemetry::{LogCategory, LogRecord};

pub use fallback::FallbackSink;
pub use jsonl::JsonlLogStore;
pub use memory::MemoryLogStore;

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("write timed out after {0:?}")]
    Timeout(Duration),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Destination for batches of one category.
#[async_trait]
pub trait LogStore: Send + Sync {
    /// Short identifier used in diagnostics.
    fn name(&self) -> &'static str;

    /// Append `records` to the category's table, preserving their order.
    async fn write_batch(
        &self,
        category: LogCategory,
        records: &[LogRecord],
    ) -> Result<(), PersistenceError>;
}
