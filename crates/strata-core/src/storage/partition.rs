//! Line-addressed partition files.
//!
//! A partition file is a flat sequence of newline-terminated byte slots.
//! Lines are addressed 1-based within their file; `insert` appends a line
//! and returns its index, `update` overwrites a line in place (empty bytes
//! tombstone it). Records are JSON and never contain a raw newline.
//!
//! The store synchronizes internally at line granularity: every operation on
//! a partition file runs under that file's mutex, with cached line counts so
//! appends never rescan the file.

use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::warn;

use crate::error::StorageError;
use crate::types::{FileIndex, LineIndex, PARTITION_FILE_EXT};

use super::lock::DirLock;

/// The partition-file store for one table's data directory.
#[derive(Debug)]
pub struct PartitionStore {
    dir: PathBuf,
    _lock: DirLock,
    files: Mutex<HashMap<FileIndex, Arc<Mutex<PartitionFile>>>>,
}

#[derive(Debug)]
struct PartitionFile {
    lines: LineIndex,
}

impl PartitionStore {
    /// Open (creating if needed) a table data directory and take its
    /// advisory lock.
    pub fn open(dir: impl Into<PathBuf>) -> Result<PartitionStore, StorageError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        let lock = DirLock::acquire(&dir.join(".lock"))?;
        Ok(PartitionStore {
            dir,
            _lock: lock,
            files: Mutex::new(HashMap::new()),
        })
    }

    /// Path of a partition file within the data directory.
    pub fn file_path(&self, file: FileIndex) -> PathBuf {
        self.dir.join(format!("{file}.{PARTITION_FILE_EXT}"))
    }

    /// Append a record line to a partition file, returning its 1-based index.
    pub fn insert(&self, file: FileIndex, bytes: &[u8]) -> Result<LineIndex, StorageError> {
        let handle = self.handle(file)?;
        let mut state = handle.lock();
        let mut f = OpenOptions::new()
            .append(true)
            .create(true)
            .open(self.file_path(file))?;
        f.write_all(bytes)?;
        f.write_all(b"\n")?;
        f.sync_all()?;
        state.lines += 1;
        Ok(state.lines)
    }

    /// Read the record bytes at a line. Tombstoned lines read back empty.
    pub fn read(&self, file: FileIndex, line: LineIndex) -> Result<Vec<u8>, StorageError> {
        let handle = self.handle(file)?;
        let state = handle.lock();
        let buf = fs::read(self.file_path(file))?;
        let lines = split_lines(&buf);
        line_slot(&lines, file, line, state.lines).map(<[u8]>::to_vec)
    }

    /// Overwrite the record bytes at a line. Empty bytes mark a tombstone.
    pub fn update(&self, file: FileIndex, line: LineIndex, bytes: &[u8]) -> Result<(), StorageError> {
        let handle = self.handle(file)?;
        let state = handle.lock();
        let path = self.file_path(file);
        let buf = fs::read(&path)?;
        let mut lines: Vec<&[u8]> = split_lines(&buf);
        line_slot(&lines, file, line, state.lines)?;
        lines[line as usize - 1] = bytes;

        // Rewrite through a temp file so a crash never tears the partition.
        let tmp = self.dir.join(format!(".{file}.{PARTITION_FILE_EXT}.tmp"));
        let mut out = Vec::with_capacity(buf.len() + bytes.len());
        for l in &lines {
            out.extend_from_slice(l);
            out.push(b'\n');
        }
        fs::write(&tmp, &out)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    /// Number of line slots currently in a partition file.
    pub fn line_count(&self, file: FileIndex) -> Result<LineIndex, StorageError> {
        Ok(self.handle(file)?.lock().lines)
    }

    /// All line slots of a partition file in index order, tombstones included.
    pub fn read_lines(&self, file: FileIndex) -> Result<Vec<Vec<u8>>, StorageError> {
        let handle = self.handle(file)?;
        let state = handle.lock();
        let buf = fs::read(self.file_path(file))?;
        let mut lines: Vec<Vec<u8>> = split_lines(&buf).iter().map(|l| l.to_vec()).collect();
        lines.truncate(state.lines as usize);
        Ok(lines)
    }

    /// Partition file indices present in the data directory, ascending.
    pub fn partition_files(&self) -> Result<Vec<FileIndex>, StorageError> {
        let mut out = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(PARTITION_FILE_EXT) {
                continue;
            }
            if let Some(idx) = path
                .file_stem()
                .and_then(|s| s.to_str())
                .and_then(|s| s.parse::<FileIndex>().ok())
            {
                out.push(idx);
            }
        }
        out.sort_unstable();
        Ok(out)
    }

    fn handle(&self, file: FileIndex) -> Result<Arc<Mutex<PartitionFile>>, StorageError> {
        let mut files = self.files.lock();
        if let Some(handle) = files.get(&file) {
            return Ok(handle.clone());
        }
        let path = self.file_path(file);
        let lines = match fs::read(&path) {
            Ok(buf) => {
                let count = buf.iter().filter(|b| **b == b'\n').count();
                if !buf.is_empty() && buf[buf.len() - 1] != b'\n' {
                    // Torn final line from an interrupted append; its slot
                    // was never assigned, so it is ignored.
                    warn!(file, "partition file ends mid-line");
                }
                count.min(LineIndex::MAX as usize) as LineIndex
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => 0,
            Err(e) => return Err(e.into()),
        };
        let handle = Arc::new(Mutex::new(PartitionFile { lines }));
        files.insert(file, handle.clone());
        Ok(handle)
    }
}

fn split_lines(buf: &[u8]) -> Vec<&[u8]> {
    let mut out = Vec::new();
    let mut start = 0;
    for (i, b) in buf.iter().enumerate() {
        if *b == b'\n' {
            out.push(&buf[start..i]);
            start = i + 1;
        }
    }
    out
}

fn line_slot<'a, T: AsRef<[u8]>>(
    lines: &'a [T],
    file: FileIndex,
    line: LineIndex,
    total: LineIndex,
) -> Result<&'a [u8], StorageError> {
    if line == 0 || line > total {
        return Err(StorageError::LineOutOfBounds { file, line, total });
    }
    lines
        .get(line as usize - 1)
        .map(AsRef::as_ref)
        .ok_or(StorageError::LineOutOfBounds { file, line, total })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_insert_assigns_sequential_lines() {
        let dir = tempdir().unwrap();
        let store = PartitionStore::open(dir.path()).unwrap();

        assert_eq!(store.insert(0, b"one").unwrap(), 1);
        assert_eq!(store.insert(0, b"two").unwrap(), 2);
        assert_eq!(store.insert(1, b"other file").unwrap(), 1);

        assert_eq!(store.read(0, 1).unwrap(), b"one");
        assert_eq!(store.read(0, 2).unwrap(), b"two");
        assert_eq!(store.read(1, 1).unwrap(), b"other file");
    }

    #[test]
    fn test_update_and_tombstone() {
        let dir = tempdir().unwrap();
        let store = PartitionStore::open(dir.path()).unwrap();

        store.insert(0, b"a").unwrap();
        store.insert(0, b"b").unwrap();

        store.update(0, 1, b"rewritten").unwrap();
        assert_eq!(store.read(0, 1).unwrap(), b"rewritten");
        assert_eq!(store.read(0, 2).unwrap(), b"b");

        // Empty bytes = tombstone; the slot stays addressable.
        store.update(0, 2, b"").unwrap();
        assert_eq!(store.read(0, 2).unwrap(), b"");
        assert_eq!(store.line_count(0).unwrap(), 2);
    }

    #[test]
    fn test_line_out_of_bounds() {
        let dir = tempdir().unwrap();
        let store = PartitionStore::open(dir.path()).unwrap();
        store.insert(0, b"a").unwrap();

        match store.read(0, 0) {
            Err(StorageError::LineOutOfBounds { line: 0, .. }) => {}
            other => panic!("expected LineOutOfBounds, got {other:?}"),
        }
        match store.update(0, 5, b"x") {
            Err(StorageError::LineOutOfBounds {
                file: 0,
                line: 5,
                total: 1,
            }) => {}
            other => panic!("expected LineOutOfBounds, got {other:?}"),
        }
    }

    #[test]
    fn test_reopen_preserves_counts() {
        let dir = tempdir().unwrap();
        {
            let store = PartitionStore::open(dir.path()).unwrap();
            store.insert(0, b"a").unwrap();
            store.insert(0, b"b").unwrap();
            store.insert(3, b"c").unwrap();
        }
        let store = PartitionStore::open(dir.path()).unwrap();
        assert_eq!(store.partition_files().unwrap(), vec![0, 3]);
        assert_eq!(store.line_count(0).unwrap(), 2);
        assert_eq!(store.insert(0, b"d").unwrap(), 3);
    }

    #[test]
    fn test_second_store_locked_out() {
        let dir = tempdir().unwrap();
        let _store = PartitionStore::open(dir.path()).unwrap();
        match PartitionStore::open(dir.path()) {
            Err(StorageError::DirLocked) => {}
            other => panic!("expected DirLocked, got {:?}", other.err()),
        }
    }
}
