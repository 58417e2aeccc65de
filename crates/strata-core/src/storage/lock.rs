//! Advisory lock on a table's data directory.

use std::fs::{File, OpenOptions};
use std::path::Path;

use fs2::FileExt;

use crate::error::StorageError;

/// Holds an exclusive advisory lock (`flock(2)` on Unix) on a table's data
/// directory for as long as the owning [`super::PartitionStore`] lives, so
/// two keystores can never write the same partition files. Released when
/// dropped.
#[derive(Debug)]
pub struct DirLock {
    _file: File,
}

impl DirLock {
    /// Acquire the lock file without blocking. A held lock means another
    /// keystore owns this table's directory.
    pub fn acquire(path: &Path) -> Result<DirLock, StorageError> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;
        file.try_lock_exclusive()
            .map_err(|_| StorageError::DirLocked)?;
        Ok(DirLock { _file: file })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_lock_excludes_second_holder() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(".lock");

        let held = DirLock::acquire(&path).unwrap();
        match DirLock::acquire(&path) {
            Err(StorageError::DirLocked) => {}
            other => panic!("expected DirLocked, got {other:?}"),
        }
        drop(held);
        DirLock::acquire(&path).unwrap();
    }
}
