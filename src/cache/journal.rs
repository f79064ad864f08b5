//! Durable Log
//!
//! Append-only file of newline-delimited JSON records. It is the on-disk
//! source of truth: on startup the whole file is replayed into a fresh
//! [`CacheIndex`].
//!
//! # Design
//!
//! - One file handle shared by all writers; "append + flush" is a single
//!   critical section so records from different writers never interleave
//! - Replay applies the same first-write-wins / append rules as live
//!   ingestion by going through [`CacheIndex::store`]
//! - A line that does not parse (e.g. torn by a crash mid-append, possibly
//!   inside a multi-byte character) is logged and skipped instead of
//!   failing startup

use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use super::index::CacheIndex;
use super::record::Food;
use crate::error::Result;

/// Destination for persisted records
pub trait RecordSink: Send + Sync {
    /// Durably append one record
    fn append(&self, food: &Food) -> Result<()>;
}

/// Outcome of replaying a log file
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplayStats {
    /// Lines applied to the index
    pub applied: u64,
    /// Lines skipped because they could not be parsed
    pub skipped: u64,
}

/// Append-only record log on local disk
pub struct DurableLog {
    path: PathBuf,
    writer: Mutex<BufWriter<File>>,
}

impl DurableLog {
    /// Open (creating it and its parent directories if needed) a log for
    /// appending
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        debug!(path = %path.display(), "Opened durable log");

        Ok(Self {
            path,
            writer: Mutex::new(BufWriter::new(file)),
        })
    }

    /// Path of the underlying file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Replay every record in the log into `index`
    pub fn replay(&self, index: &CacheIndex) -> Result<ReplayStats> {
        replay_file(&self.path, index)
    }
}

impl RecordSink for DurableLog {
    fn append(&self, food: &Food) -> Result<()> {
        let line = food.to_line()?;

        let mut writer = self.writer.lock();
        writer.write_all(line.as_bytes())?;
        writer.write_all(b"\n")?;
        writer.flush()?;
        Ok(())
    }
}

/// Replay a log file into `index`. A missing file is an empty log.
pub fn replay_file(path: &Path, index: &CacheIndex) -> Result<ReplayStats> {
    let mut stats = ReplayStats::default();

    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(stats),
        Err(e) => return Err(e.into()),
    };

    // Raw bytes: a tail torn inside a multi-byte character is not valid UTF-8
    for (line_no, line) in BufReader::new(file).split(b'\n').enumerate() {
        let line = line?;
        if line.iter().all(u8::is_ascii_whitespace) {
            continue;
        }

        match Food::from_slice(&line) {
            Ok(food) => {
                index.store(&food);
                stats.applied += 1;
            }
            Err(e) => {
                warn!(
                    path = %path.display(),
                    line = line_no + 1,
                    "Skipping unreadable log line: {}",
                    e
                );
                stats.skipped += 1;
            }
        }
    }

    info!(
        path = %path.display(),
        applied = stats.applied,
        skipped = stats.skipped,
        records = index.len(),
        "Replayed durable log"
    );
    Ok(stats)
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_creates_missing_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("deeper").join("cache.jsonl");

        let log = DurableLog::open(&path).unwrap();
        assert!(path.exists());
        assert_eq!(log.path(), path.as_path());
    }

    #[test]
    fn test_log_appends_one_line_per_record() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.jsonl");

        let log = DurableLog::open(&path).unwrap();
        log.append(&Food::new(1).with_description("apple")).unwrap();
        log.append(&Food::new(2).with_description("pear")).unwrap();

        let contents = fs::read_to_string(&path).unwrap();
        let lines: Vec<_> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(Food::from_line(lines[1]).unwrap().fdc_id, 2);
    }

    #[test]
    fn test_replay_rebuilds_index() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.jsonl");

        let log = DurableLog::open(&path).unwrap();
        log.append(&Food::new(1).with_gtin_upc("111").with_query("milk"))
            .unwrap();
        log.append(&Food::new(2).with_gtin_upc("111").with_query("milk"))
            .unwrap();

        let index = CacheIndex::new();
        let stats = log.replay(&index).unwrap();

        assert_eq!(stats, ReplayStats { applied: 2, skipped: 0 });
        assert_eq!(index.by_barcode("111").unwrap().fdc_id, 1);
        assert_eq!(index.keyword_ids("milk").unwrap(), vec![1, 2]);
    }

    #[test]
    fn test_replay_skips_torn_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.jsonl");
        fs::write(&path, "{\"fdcId\":5}\n\n{\"fdcId\":6,\"descr").unwrap();

        let index = CacheIndex::new();
        let stats = replay_file(&path, &index).unwrap();

        assert_eq!(stats.applied, 1);
        assert_eq!(stats.skipped, 1);
        assert!(index.by_id(5).is_some());
    }

    #[test]
    fn test_replay_skips_tail_torn_inside_character() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.jsonl");

        let mut bytes = Food::new(1).with_description("CRÈME").to_line().unwrap().into_bytes();
        bytes.push(b'\n');
        bytes.extend_from_slice(b"{\"fdcId\":2,\"description\":\"CR");
        bytes.push("È".as_bytes()[0]);
        fs::write(&path, bytes).unwrap();

        let index = CacheIndex::new();
        let stats = replay_file(&path, &index).unwrap();

        assert_eq!(stats, ReplayStats { applied: 1, skipped: 1 });
        assert_eq!(index.by_id(1).unwrap().description.as_deref(), Some("CRÈME"));
        assert!(index.by_id(2).is_none());
    }

    #[test]
    fn test_replay_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let index = CacheIndex::new();

        let stats = replay_file(&dir.path().join("absent.jsonl"), &index).unwrap();
        assert_eq!(stats, ReplayStats::default());
        assert!(index.is_empty());
    }
}
