// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Append-only write-ahead log of event records.
//!
//! One JSON record per line. The sequence number assigned on append is the
//! public event id: everything downstream — state reducers, audit
//! pagination, replay cursors — orders by it. Corrupt files found at open
//! are quarantined to `.bak` and the valid prefix is rewritten clean.

use crate::snapshot::rotate_bak_path;
use std::collections::VecDeque;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use sw_core::{Event, EventRecord};
use thiserror::Error;

/// Flush when this many appends are buffered.
const FLUSH_THRESHOLD: usize = 100;

/// Flush when the oldest buffered append is this old.
const FLUSH_INTERVAL: Duration = Duration::from_secs(1);

/// Errors from WAL operations
#[derive(Debug, Error)]
pub enum WalError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Append-only event log with at-least-once consumption tracking.
///
/// `write_seq` is the last sequence handed out; `processed_seq` is the
/// last sequence the engine loop finished handling (advanced via
/// [`Wal::mark_processed`], persisted indirectly through snapshots).
pub struct Wal {
    path: PathBuf,
    file: File,
    /// Serialized records not yet written to the file
    out_buf: Vec<u8>,
    /// Records appended but not yet handed to the consumer
    pending: VecDeque<EventRecord>,
    write_seq: u64,
    processed_seq: u64,
    buffered: usize,
    last_flush: Instant,
}

impl Wal {
    /// Open (or create) a WAL file.
    ///
    /// Entries with `seq > processed_seq` are queued for consumption —
    /// this is how crash recovery resumes processing after a snapshot.
    /// A corrupt file is rotated to `.bak` and rewritten with only its
    /// valid prefix.
    pub fn open(path: &Path, processed_seq: u64) -> Result<Self, WalError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let (entries, corrupt) = match File::open(path) {
            Ok(f) => read_valid_prefix(f),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => (Vec::new(), false),
            Err(e) => return Err(e.into()),
        };

        if corrupt {
            let bak = rotate_bak_path(path);
            tracing::warn!(
                path = %path.display(),
                bak = %bak.display(),
                valid_entries = entries.len(),
                "corrupt WAL quarantined"
            );
            std::fs::rename(path, &bak)?;
            let mut clean = File::create(path)?;
            for record in &entries {
                serde_json::to_writer(&mut clean, record)?;
                clean.write_all(b"\n")?;
            }
            clean.sync_data()?;
        }

        let write_seq = entries.last().map(|r| r.seq).unwrap_or(0);
        let pending = entries.into_iter().filter(|r| r.seq > processed_seq).collect();
        let file = OpenOptions::new().create(true).append(true).open(path)?;

        Ok(Self {
            path: path.to_path_buf(),
            file,
            out_buf: Vec::new(),
            pending,
            write_seq,
            processed_seq,
            buffered: 0,
            last_flush: Instant::now(),
        })
    }

    /// Append an event, assigning it the next sequence number.
    ///
    /// The record is buffered; call [`Wal::flush`] to make it durable.
    pub fn append(&mut self, timestamp_ms: u64, event: Event) -> Result<EventRecord, WalError> {
        let record = EventRecord::new(self.write_seq + 1, timestamp_ms, event);
        serde_json::to_writer(&mut self.out_buf, &record)?;
        self.out_buf.push(b'\n');
        self.write_seq = record.seq;
        self.buffered += 1;
        self.pending.push_back(record.clone());
        Ok(record)
    }

    /// Write buffered records to disk and sync.
    pub fn flush(&mut self) -> Result<(), WalError> {
        if !self.out_buf.is_empty() {
            self.file.write_all(&self.out_buf)?;
            self.file.sync_data()?;
            self.out_buf.clear();
        }
        self.buffered = 0;
        self.last_flush = Instant::now();
        Ok(())
    }

    /// Whether buffered appends have crossed the count or age threshold.
    pub fn needs_flush(&self) -> bool {
        self.buffered >= FLUSH_THRESHOLD
            || (self.buffered > 0 && self.last_flush.elapsed() >= FLUSH_INTERVAL)
    }

    /// Next record the consumer has not seen yet, if any.
    ///
    /// Consuming: each call hands out the following record. Processing
    /// acknowledgement is separate — see [`Wal::mark_processed`].
    pub fn next_unprocessed(&mut self) -> Result<Option<EventRecord>, WalError> {
        while let Some(record) = self.pending.pop_front() {
            if record.seq > self.processed_seq {
                return Ok(Some(record));
            }
        }
        Ok(None)
    }

    /// Mark a record as handled; recovery will not replay it.
    pub fn mark_processed(&mut self, seq: u64) {
        if seq > self.processed_seq {
            self.processed_seq = seq;
        }
    }

    /// Last sequence number handed out.
    pub fn write_seq(&self) -> u64 {
        self.write_seq
    }

    /// Last sequence number marked processed.
    pub fn processed_seq(&self) -> u64 {
        self.processed_seq
    }

    /// Durable records with `seq > after`, in order. Stops at the first
    /// corrupt line rather than erroring.
    pub fn entries_after(&self, after: u64) -> Result<Vec<EventRecord>, WalError> {
        let file = match File::open(&self.path) {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let (entries, _) = read_valid_prefix(file);
        Ok(entries.into_iter().filter(|r| r.seq > after).collect())
    }

    /// Drop durable records with `seq < before` (post-snapshot compaction).
    pub fn truncate_before(&mut self, before: u64) -> Result<(), WalError> {
        self.flush()?;
        let keep = self.entries_after(before.saturating_sub(1))?;
        let tmp = self.path.with_extension("tmp");
        {
            let mut f = File::create(&tmp)?;
            for record in &keep {
                serde_json::to_writer(&mut f, record)?;
                f.write_all(b"\n")?;
            }
            f.sync_data()?;
        }
        std::fs::rename(&tmp, &self.path)?;
        self.file = OpenOptions::new().append(true).open(&self.path)?;
        Ok(())
    }
}

/// Read records until EOF or the first undecodable line.
///
/// Returns the valid prefix and whether trailing corruption was seen.
fn read_valid_prefix(file: File) -> (Vec<EventRecord>, bool) {
    let reader = BufReader::new(file);
    let mut entries = Vec::new();
    for line in reader.split(b'\n') {
        let Ok(bytes) = line else {
            return (entries, true);
        };
        if bytes.is_empty() {
            continue;
        }
        match serde_json::from_slice::<EventRecord>(&bytes) {
            Ok(record) => entries.push(record),
            Err(_) => return (entries, true),
        }
    }
    (entries, false)
}

#[cfg(test)]
#[path = "wal_tests.rs"]
mod tests;
