//! Local append log for batches the store rejected.
//!
//! Each line is `{"table": <table name>, "record": <row>}`. A batch is
//! serialized up front and written with a single append, so a crash never
//! leaves half a line from a later batch interleaved with an earlier one.

use std::path::{Path, PathBuf};

use serde_json::json;
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::storage::schema::{table_name, to_row};
use crate::storage::PersistenceError;
use crate::telemetry::{LogCategory, LogRecord};

#[derive(Debug)]
pub struct FallbackSink {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FallbackSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append a batch. Returns the number of lines written.
    pub async fn append(
        &self,
        category: LogCategory,
        records: &[LogRecord],
    ) -> Result<usize, PersistenceError> {
        if records.is_empty() {
            return Ok(0);
        }

        let table = table_name(category);
        let mut buf = Vec::new();
        for record in records {
            serde_json::to_writer(&mut buf, &json!({ "table": table, "record": to_row(record) }))?;
            buf.push(b'\n');
        }

        let _guard = self.write_lock.lock().await;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(&buf).await?;
        file.flush().await?;
        Ok(records.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::{LogEntry, Severity};
    use serde_json::Value;

    #[tokio::test]
    async fn test_lines_are_whole_json() {
        let dir = tempfile::tempdir().unwrap();
        let sink = FallbackSink::new(dir.path().join("nested/fallback.jsonl"));

        let batch: Vec<_> = (0..3)
            .map(|i| LogEntry::error(format!("e{i}"), Severity::Error).seal().unwrap())
            .collect();
        assert_eq!(sink.append(LogCategory::Error, &batch).await.unwrap(), 3);
        assert_eq!(sink.append(LogCategory::Error, &[]).await.unwrap(), 0);

        let content = std::fs::read_to_string(sink.path()).unwrap();
        let lines: Vec<Value> = content
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        assert_eq!(lines.len(), 3);
        for (i, line) in lines.iter().enumerate() {
            assert_eq!(line["table"], "error_logs");
            assert_eq!(line["record"]["message"], format!("e{i}"));
        }
    }
}
