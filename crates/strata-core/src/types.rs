//! Core types: file/line indices, partition constants, table configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Partition file index within a table's data directory.
pub type FileIndex = u16;

/// 1-based line index within a partition file.
pub type LineIndex = u16;

/// Default maximum number of lines per partition file.
pub const DEFAULT_PARTITION_MAX: u16 = 1500;

/// File extension for partition files.
pub const PARTITION_FILE_EXT: &str = "part";

/// Default bcrypt cost for encrypted string columns.
pub const DEFAULT_ENCRYPTION_COST: u32 = 8;

/// Per-table configuration.
///
/// `mem_only` keeps the whole table in memory (no partition files);
/// `data_on_drive` keeps only `(file, line)` locators resident and rereads
/// the tuple from disk on every access. The two are mutually exclusive.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeystoreConfig {
    /// Table name; also names the data directory.
    pub name: String,
    /// Base directory under which the table's data directory is created.
    /// Ignored for `mem_only` tables.
    #[serde(default)]
    pub dir: PathBuf,
    /// Maximum number of live entries; 0 = unlimited.
    #[serde(default)]
    pub max_entries: u64,
    /// Lines per partition file; 0 = [`DEFAULT_PARTITION_MAX`].
    #[serde(default)]
    pub partition_max: u16,
    #[serde(default)]
    pub mem_only: bool,
    #[serde(default)]
    pub data_on_drive: bool,
    /// bcrypt cost for encrypted columns; 0 = [`DEFAULT_ENCRYPTION_COST`].
    #[serde(default)]
    pub encryption_cost: u32,
}

impl KeystoreConfig {
    /// A memory-only table config (no persistence).
    pub fn mem_only(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            dir: PathBuf::new(),
            max_entries: 0,
            partition_max: 0,
            mem_only: true,
            data_on_drive: false,
            encryption_cost: 0,
        }
    }

    /// A disk-backed table config rooted at `dir`.
    pub fn persistent(name: impl Into<String>, dir: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            dir: dir.into(),
            max_entries: 0,
            partition_max: 0,
            mem_only: false,
            data_on_drive: false,
            encryption_cost: 0,
        }
    }
}
