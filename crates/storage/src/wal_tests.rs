// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::io::Write as _;
use sw_core::{Event, TimerId};
use tempfile::tempdir;

fn test_event(name: &str) -> Event {
    Event::TimerFired { id: TimerId(format!("test:{name}")) }
}

fn timer_name(record: &EventRecord) -> &str {
    match &record.event {
        Event::TimerFired { id } => id.as_str(),
        other => panic!("expected timer event, got {other:?}"),
    }
}

#[test]
fn open_creates_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("test.wal");

    let wal = Wal::open(&path, 0).unwrap();

    assert!(path.exists());
    assert_eq!(wal.write_seq(), 0);
    assert_eq!(wal.processed_seq(), 0);
}

#[test]
fn append_assigns_sequential_seqs() {
    let dir = tempdir().unwrap();
    let mut wal = Wal::open(&dir.path().join("test.wal"), 0).unwrap();

    let r1 = wal.append(1_000, test_event("a")).unwrap();
    let r2 = wal.append(1_001, test_event("b")).unwrap();

    assert_eq!(r1.seq, 1);
    assert_eq!(r2.seq, 2);
    assert_eq!(r2.timestamp_ms, 1_001);
}

#[test]
fn flush_writes_to_disk() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("test.wal");
    let mut wal = Wal::open(&path, 0).unwrap();

    wal.append(1_000, test_event("a")).unwrap();
    wal.flush().unwrap();

    let metadata = std::fs::metadata(&path).unwrap();
    assert!(metadata.len() > 0);
}

#[test]
fn next_unprocessed_hands_out_in_order() {
    let dir = tempdir().unwrap();
    let mut wal = Wal::open(&dir.path().join("test.wal"), 0).unwrap();

    wal.append(1_000, test_event("a")).unwrap();
    wal.append(1_001, test_event("b")).unwrap();

    let entry1 = wal.next_unprocessed().unwrap().unwrap();
    assert_eq!(entry1.seq, 1);
    assert_eq!(timer_name(&entry1), "test:a");

    let entry2 = wal.next_unprocessed().unwrap().unwrap();
    assert_eq!(entry2.seq, 2);
    assert_eq!(timer_name(&entry2), "test:b");

    assert!(wal.next_unprocessed().unwrap().is_none());
}

#[test]
fn mark_processed_advances_cursor() {
    let dir = tempdir().unwrap();
    let mut wal = Wal::open(&dir.path().join("test.wal"), 0).unwrap();

    wal.append(1_000, test_event("a")).unwrap();
    wal.flush().unwrap();

    let entry = wal.next_unprocessed().unwrap().unwrap();
    wal.mark_processed(entry.seq);

    assert_eq!(wal.processed_seq(), 1);
}

#[test]
fn reopen_with_processed_seq_skips_handled_entries() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("test.wal");

    {
        let mut wal = Wal::open(&path, 0).unwrap();
        wal.append(1_000, test_event("a")).unwrap();
        wal.append(1_001, test_event("b")).unwrap();
        wal.append(1_002, test_event("c")).unwrap();
        wal.flush().unwrap();
    }

    // Reopen with processed_seq=2 (simulating recovery from snapshot)
    let mut wal = Wal::open(&path, 2).unwrap();

    let entry = wal.next_unprocessed().unwrap().unwrap();
    assert_eq!(entry.seq, 3);
    assert_eq!(timer_name(&entry), "test:c");

    assert!(wal.next_unprocessed().unwrap().is_none());
}

#[test]
fn entries_after_filters_by_seq() {
    let dir = tempdir().unwrap();
    let mut wal = Wal::open(&dir.path().join("test.wal"), 0).unwrap();

    wal.append(1_000, test_event("a")).unwrap();
    wal.append(1_001, test_event("b")).unwrap();
    wal.append(1_002, test_event("c")).unwrap();
    wal.flush().unwrap();

    let entries = wal.entries_after(1).unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].seq, 2);
    assert_eq!(entries[1].seq, 3);
}

#[test]
fn truncate_before_compacts_the_file() {
    let dir = tempdir().unwrap();
    let mut wal = Wal::open(&dir.path().join("test.wal"), 0).unwrap();

    wal.append(1_000, test_event("a")).unwrap();
    wal.append(1_001, test_event("b")).unwrap();
    wal.append(1_002, test_event("c")).unwrap();
    wal.flush().unwrap();

    wal.truncate_before(2).unwrap();

    let entries = wal.entries_after(0).unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].seq, 2);
    assert_eq!(entries[1].seq, 3);
}

#[test]
fn needs_flush_threshold() {
    let dir = tempdir().unwrap();
    let mut wal = Wal::open(&dir.path().join("test.wal"), 0).unwrap();

    assert!(!wal.needs_flush());

    for i in 0..101 {
        wal.append(1_000 + i, test_event(&format!("e{i}"))).unwrap();
    }

    assert!(wal.needs_flush());

    wal.flush().unwrap();
    // Freshly flushed: below threshold and interval
    assert!(!wal.needs_flush());
}

#[test]
fn open_corrupt_wal_creates_bak_and_preserves_valid_entries() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("test.wal");

    {
        let mut wal = Wal::open(&path, 0).unwrap();
        wal.append(1_000, test_event("a")).unwrap();
        wal.append(1_001, test_event("b")).unwrap();
        wal.flush().unwrap();
    }
    {
        let mut f = std::fs::OpenOptions::new().append(true).open(&path).unwrap();
        f.write_all(b"not-valid-json\n").unwrap();
    }

    let wal = Wal::open(&path, 0).unwrap();

    // Valid prefix preserved, corrupt original rotated to .bak
    assert_eq!(wal.write_seq(), 2);
    assert!(path.with_extension("bak").exists());

    let entries = wal.entries_after(0).unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].seq, 1);
    assert_eq!(entries[1].seq, 2);
}

#[test]
fn open_corrupt_wal_rotates_bak_files() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("test.wal");

    // Simulate 4 corrupt opens — should keep at most 3 backups
    for i in 1..=4u8 {
        {
            let mut f = std::fs::File::create(&path).unwrap();
            f.write_all(&[i; 8]).unwrap();
        }

        let wal = Wal::open(&path, 0).unwrap();
        assert_eq!(wal.write_seq(), 0);
    }

    // .bak (most recent = round 4)
    let bak1 = path.with_extension("bak");
    assert!(bak1.exists());
    assert_eq!(std::fs::read(&bak1).unwrap(), vec![4u8; 8]);

    // .bak.2 (round 3)
    let bak2 = path.with_extension("bak.2");
    assert!(bak2.exists());
    assert_eq!(std::fs::read(&bak2).unwrap(), vec![3u8; 8]);

    // .bak.3 (round 2)
    let bak3 = path.with_extension("bak.3");
    assert!(bak3.exists());
    assert_eq!(std::fs::read(&bak3).unwrap(), vec![2u8; 8]);

    // Round 1 was evicted
    assert!(!path.with_extension("bak.4").exists());
}

#[test]
fn entries_after_stops_at_corruption() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("test.wal");

    let mut wal = Wal::open(&path, 0).unwrap();
    wal.append(1_000, test_event("a")).unwrap();
    wal.append(1_001, test_event("b")).unwrap();
    wal.flush().unwrap();

    // Corrupt after open so open-time cleanup doesn't see it
    {
        let mut f = std::fs::OpenOptions::new().append(true).open(&path).unwrap();
        f.write_all(b"post-open-corruption\n").unwrap();
    }

    let entries = wal.entries_after(0).unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].seq, 1);
    assert_eq!(entries[1].seq, 2);
}

#[test]
fn open_with_binary_wal_data() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("test.wal");

    std::fs::write(&path, b"\x80\x81\x82\xff\xfe\n").unwrap();

    let wal = Wal::open(&path, 0).unwrap();
    assert_eq!(wal.write_seq(), 0);
    assert!(path.with_extension("bak").exists());
}

#[test]
fn open_with_valid_entries_then_binary() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("test.wal");

    {
        let mut wal = Wal::open(&path, 0).unwrap();
        wal.append(1_000, test_event("a")).unwrap();
        wal.append(1_001, test_event("b")).unwrap();
        wal.flush().unwrap();
    }
    {
        let mut f = std::fs::OpenOptions::new().append(true).open(&path).unwrap();
        f.write_all(b"\x80\x81\x82\xff\xfe\n").unwrap();
    }

    let wal = Wal::open(&path, 0).unwrap();
    assert_eq!(wal.write_seq(), 2);
    assert!(path.with_extension("bak").exists());

    let entries = wal.entries_after(0).unwrap();
    assert_eq!(entries.len(), 2);
}

#[test]
fn seq_continues_after_reopen() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("test.wal");

    {
        let mut wal = Wal::open(&path, 0).unwrap();
        wal.append(1_000, test_event("a")).unwrap();
        wal.flush().unwrap();
    }

    let mut wal = Wal::open(&path, 1).unwrap();
    let record = wal.append(1_001, test_event("b")).unwrap();
    assert_eq!(record.seq, 2);
}
