use anyhow::{Context, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Newline-delimited JSON file that only ever grows.
///
/// Each `append` serializes one record to a single line and writes it with
/// one `write_all` call on a file opened in append mode.
#[derive(Debug, Clone)]
pub struct JsonlLog {
    path: PathBuf,
}

impl JsonlLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append<T: Serialize>(&self, record: &T) -> Result<()> {
        let mut line = serde_json::to_string(record).context("Failed to serialize log record")?;
        line.push('\n');
        self.write_raw(&line)
    }

    /// Append several records, in order.
    pub fn append_all<T: Serialize>(&self, records: &[T]) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }
        let mut buf = String::new();
        for record in records {
            buf.push_str(
                &serde_json::to_string(record).context("Failed to serialize log record")?,
            );
            buf.push('\n');
        }
        self.write_raw(&buf)
    }

    fn write_raw(&self, data: &str) -> Result<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create log directory {}", parent.display()))?;
        }

        fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("Failed to open log file {}", self.path.display()))?
            .write_all(data.as_bytes())
            .with_context(|| format!("Failed to append to {}", self.path.display()))?;

        Ok(())
    }

    /// Read every parseable record. Lines that fail to parse are skipped.
    pub fn read_all<T: DeserializeOwned>(&self) -> Result<Vec<T>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let content = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read {}", self.path.display()))?;

        Ok(content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .filter_map(|line| serde_json::from_str(line).ok())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::{Event, EventKind, Phase2Artifact};
    use tempfile::tempdir;
    use uuid::Uuid;

    #[test]
    fn test_read_missing_file_is_empty() {
        let dir = tempdir().unwrap();
        let log = JsonlLog::new(dir.path().join("events.jsonl"));
        let events: Vec<Event> = log.read_all().unwrap();
        assert!(events.is_empty());
    }

    #[test]
    fn test_append_creates_parent_dirs() {
        let dir = tempdir().unwrap();
        let log = JsonlLog::new(dir.path().join("nested/deeper/events.jsonl"));
        log.append(&Event::new(Uuid::new_v4(), EventKind::RunStarted, 0))
            .unwrap();
        assert!(log.path().exists());
    }

    #[test]
    fn test_appends_preserve_history() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("events.jsonl");
        let run_id = Uuid::new_v4();

        {
            let log = JsonlLog::new(&path);
            log.append(&Event::new(run_id, EventKind::RunStarted, 0))
                .unwrap();
        }
        {
            // A second writer (e.g. after a restart) only adds lines.
            let log = JsonlLog::new(&path);
            log.append(&Event::new(run_id, EventKind::SongCompleted, 0))
                .unwrap();
        }

        let events: Vec<Event> = JsonlLog::new(&path).read_all().unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].event, EventKind::RunStarted);
        assert_eq!(events[1].event, EventKind::SongCompleted);

        let raw = std::fs::read_to_string(&path).unwrap();
        assert_eq!(raw.lines().count(), 2);
    }

    #[test]
    fn test_append_all_keeps_order() {
        let dir = tempdir().unwrap();
        let log = JsonlLog::new(dir.path().join("artifacts.jsonl"));
        let artifacts = vec![
            Phase2Artifact::Discover {
                intent: "pop".into(),
                index: 0,
                objective: "x".into(),
            },
            Phase2Artifact::Design {
                candidate_count: 0,
                candidates: vec![],
            },
        ];
        log.append_all(&artifacts).unwrap();

        let back: Vec<Phase2Artifact> = log.read_all().unwrap();
        assert_eq!(back, artifacts);
    }

    #[test]
    fn test_read_all_skips_garbage_lines() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("events.jsonl");
        let log = JsonlLog::new(&path);
        log.append(&Event::new(Uuid::new_v4(), EventKind::RunStarted, 0))
            .unwrap();
        std::fs::OpenOptions::new()
            .append(true)
            .open(&path)
            .unwrap()
            .write_all(b"{not json\n")
            .unwrap();

        let events: Vec<Event> = log.read_all().unwrap();
        assert_eq!(events.len(), 1);
    }
}
