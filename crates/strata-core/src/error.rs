//! Error types for all StrataDB operations.

use std::io;
use thiserror::Error;

/// Top-level error type for StrataDB operations.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Table(#[from] TableError),

    #[error(transparent)]
    Item(#[from] ItemError),

    #[error(transparent)]
    Method(#[from] MethodError),

    #[error(transparent)]
    Unique(#[from] UniqueError),

    #[error(transparent)]
    Crypto(#[from] CryptoError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Encoding(#[from] EncodingError),

    #[error("unexpected internal error: {0}")]
    Unexpected(String),
}

/// Table-level errors: creation, capacity, and key resolution.
#[derive(Debug, Error)]
pub enum TableError {
    #[error("table already exists: {0}")]
    Exists(String),

    #[error("table doesn't exist: {0}")]
    DoesntExist(String),

    #[error("table name is required")]
    NameRequired,

    #[error("invalid table config: {0}")]
    InvalidConfig(String),

    #[error("table is full")]
    Full,

    #[error("entry key is required")]
    KeyRequired,

    #[error("key already in use: {0}")]
    KeyInUse(String),

    #[error("key not found: {0}")]
    KeyNotFound(String),
}

/// Query-item errors: input shape and per-type constraints.
#[derive(Debug, Error)]
pub enum ItemError {
    #[error("query has an invalid format")]
    QueryInvalidFormat,

    #[error("invalid schema: {0}")]
    SchemaInvalid(String),

    #[error("invalid item: {0}")]
    InvalidItem(String),

    #[error("invalid item value")]
    InvalidItemValue,

    #[error("invalid time format")]
    InvalidTimeFormat,

    #[error("restored tuple does not match schema")]
    RestoreItemSchema,

    #[error("string value is required")]
    StringRequired,

    #[error("string value exceeds {max} bytes")]
    StringTooLarge { max: u32 },

    #[error("array items are required")]
    ArrayItemsRequired,

    #[error("map items are required")]
    MapItemsRequired,

    #[error("index {index} out of bounds (len {len})")]
    IndexOutOfBounds { index: i64, len: usize },

    #[error("array is empty")]
    ArrayEmpty,
}

/// Method-chain errors.
#[derive(Debug, Error)]
pub enum MethodError {
    #[error("invalid method: {0}")]
    InvalidMethod(String),

    #[error("invalid method parameters")]
    InvalidMethodParameters,

    #[error("not enough method parameters")]
    NotEnoughMethodParameters,

    #[error("too many method parameters")]
    TooManyMethodParameters,
}

/// Uniqueness violations.
#[derive(Debug, Error)]
pub enum UniqueError {
    #[error("unique value already in use for '{column}'")]
    ValueInUse { column: String },

    #[error("duplicate unique value for '{column}' within one operation")]
    ValueDuplicate { column: String },
}

/// Encrypted-string errors.
#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("failed to encrypt string")]
    EncryptingString,

    #[error("string is encrypted")]
    StringIsEncrypted,
}

/// Partition-store errors.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("line {line} out of bounds in partition {file} ({total} lines)")]
    LineOutOfBounds { file: u16, line: u16, total: u16 },

    #[error("table data directory is locked")]
    DirLocked,
}

/// Record encode/decode errors.
#[derive(Debug, Error)]
pub enum EncodingError {
    #[error("JSON encoding failed: {0}")]
    JsonEncoding(String),

    #[error("JSON decoding failed: {0}")]
    JsonDecoding(String),
}

pub type Result<T> = std::result::Result<T, Error>;
