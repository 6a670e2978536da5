//! One append-only JSON-lines file per table.
//!
//! A batch lands with a single blocking append that runs to completion even
//! if the caller stops waiting for it. A write whose deadline elapsed may
//! therefore still land, and the retry that follows appends it again:
//! delivery is at-least-once, and readers deduplicate rows by `id`. A line
//! is never torn.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;

use crate::storage::schema::{table_name, to_row};
use crate::storage::{LogStore, PersistenceError};
use crate::telemetry::{LogCategory, LogRecord};

#[derive(Debug)]
pub struct JsonlLogStore {
    directory: PathBuf,
    /// Held by the blocking append itself, so an abandoned write still
    /// excludes the next one until it finishes.
    write_lock: Arc<Mutex<()>>,
}

impl JsonlLogStore {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// File backing a category's table.
    pub fn table_path(&self, category: LogCategory) -> PathBuf {
        self.directory.join(format!("{}.jsonl", table_name(category)))
    }
}

fn append(lock: &Mutex<()>, directory: &Path, path: &Path, buf: &[u8]) -> std::io::Result<()> {
    let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
    fs::create_dir_all(directory)?;
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    file.write_all(buf)?;
    file.flush()
}

#[async_trait]
impl LogStore for JsonlLogStore {
    fn name(&self) -> &'static str {
        "jsonl"
    }

    async fn write_batch(
        &self,
        category: LogCategory,
        records: &[LogRecord],
    ) -> Result<(), PersistenceError> {
        let mut buf = Vec::new();
        for record in records {
            serde_json::to_writer(&mut buf, &to_row(record))?;
            buf.push(b'\n');
        }

        let lock = self.write_lock.clone();
        let directory = self.directory.clone();
        let path = self.table_path(category);
        tokio::task::spawn_blocking(move || append(&lock, &directory, &path, &buf))
            .await
            .map_err(|e| PersistenceError::Unavailable(format!("append task failed: {e}")))??;
        Ok(())
    }
}
