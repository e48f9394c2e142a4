//! 持久化记录 (Persisted records)
//!
//! 记录只追加、不修改; 存储后端只需实现 `append`。

use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::risk::RiskLevel;
use crate::detection::PersonPoint;
use crate::error::{Result, SentinelError};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedRecord {
    pub timestamp: DateTime<Utc>,
    pub zone_id: String,
    pub person_count: usize,
    pub risk_level: RiskLevel,
    pub coordinates: Vec<PersonPoint>,
}

pub trait RecordSink: Send {
    fn append(&mut self, record: &PersistedRecord) -> Result<()>;
}

/// JSON Lines 文件: 每条记录一行
pub struct JsonLinesSink {
    path: PathBuf,
    writer: BufWriter<File>,
}

impl JsonLinesSink {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        info!("💾 记录文件: {}", path.display());
        Ok(Self {
            path,
            writer: BufWriter::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl RecordSink for JsonLinesSink {
    fn append(&mut self, record: &PersistedRecord) -> Result<()> {
        let line = serde_json::to_string(record)
            .map_err(|e| SentinelError::PersistenceFailure(e.to_string()))?;
        writeln!(self.writer, "{}", line)
            .and_then(|_| self.writer.flush())
            .map_err(|e| SentinelError::PersistenceFailure(format!("{}: {}", self.path.display(), e)))
    }
}

/// 内存记录 (可克隆句柄, 用于测试和嵌入)
#[derive(Clone, Default)]
pub struct MemorySink {
    records: Arc<Mutex<Vec<PersistedRecord>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<PersistedRecord> {
        self.records.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn len(&self) -> usize {
        self.records.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl RecordSink for MemorySink {
    fn append(&mut self, record: &PersistedRecord) -> Result<()> {
        self.records
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(record.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(count: usize) -> PersistedRecord {
        PersistedRecord {
            timestamp: Utc::now(),
            zone_id: "main".into(),
            person_count: count,
            risk_level: RiskLevel::Warn,
            coordinates: Vec::new(),
        }
    }

    #[test]
    fn test_json_lines_append() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("crowd_log.jsonl");
        {
            let mut sink = JsonLinesSink::open(&path).unwrap();
            sink.append(&record(3)).unwrap();
            sink.append(&record(7)).unwrap();
        }
        let text = fs::read_to_string(&path).unwrap();
        let lines: Vec<PersistedRecord> = text
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[1].person_count, 7);
        assert!(text.contains("\"risk_level\":\"WARN\""));
    }

    #[test]
    fn test_memory_sink_shares_records() {
        let sink = MemorySink::new();
        let mut handle = sink.clone();
        handle.append(&record(1)).unwrap();
        assert_eq!(sink.len(), 1);
        assert_eq!(sink.records()[0].zone_id, "main");
    }
}
