//! # Storage Module
//!
//! The contract every ledger and merchant state backend satisfies, plus two
//! implementations of it.
//!
//! ## Architecture
//!
//! ```text
//! mod.rs     - StateStore trait, Row/Column model, ordered key encoding
//! memory.rs  - MemoryStore: BTreeMaps behind a lock, for tests and tooling
//! db.rs      - LedgerDb: sled-backed persistence with one tree per table
//! ```
//!
//! ## Data Model
//!
//! Two shapes of data live side by side:
//!
//! - **State entries**: opaque bytes under a string key (`wallet id`,
//!   `coinBalance`, merchant pool records).
//! - **Row tables**: rows with a composite key and a list of value columns.
//!   Rows are scanned by any leading subset of their key columns, in key
//!   order.
//!
//! Keys are encoded so that byte order equals column order: strings sort
//! lexicographically, integers numerically (negative before positive). That
//! is what makes the movement journal come back chronologically.

mod db;
mod memory;

use std::sync::Arc;

use serde::{Deserialize, Serialize};

pub use db::LedgerDb;
pub use memory::MemoryStore;

// ---------------------------------------------------------------------------
// Error Type
// ---------------------------------------------------------------------------

/// Errors raised by a state backend.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("sled error: {0}")]
    Sled(#[from] sled::Error),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("row already exists in table {0}")]
    RowExists(String),

    #[error("row does not exist in table {0}")]
    RowMissing(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

// ---------------------------------------------------------------------------
// Rows
// ---------------------------------------------------------------------------

/// A single typed cell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Column {
    Str(String),
    Int(i64),
}

impl Column {
    pub fn str(value: impl Into<String>) -> Self {
        Column::Str(value.into())
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Column::Str(s) => Some(s),
            Column::Int(_) => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Column::Int(n) => Some(*n),
            Column::Str(_) => None,
        }
    }
}

/// A table row: key columns identify it, value columns carry data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Row {
    pub key: Vec<Column>,
    pub values: Vec<Column>,
}

impl Row {
    pub fn new(key: Vec<Column>, values: Vec<Column>) -> Self {
        Self { key, values }
    }

    pub fn value_str(&self, idx: usize) -> Option<&str> {
        self.values.get(idx).and_then(Column::as_str)
    }

    pub fn key_str(&self, idx: usize) -> Option<&str> {
        self.key.get(idx).and_then(Column::as_str)
    }

    pub fn key_int(&self, idx: usize) -> Option<i64> {
        self.key.get(idx).and_then(Column::as_int)
    }
}

/// Rows produced by a scan, in ascending key order.
pub type RowIter<'a> = Box<dyn Iterator<Item = StoreResult<Row>> + 'a>;

// ---------------------------------------------------------------------------
// StateStore
// ---------------------------------------------------------------------------

/// A key-value state plus named row tables.
///
/// Implementations must be safe to share across threads. Individual calls are
/// atomic; sequences of calls are not, so callers that need read-modify-write
/// semantics serialize themselves.
pub trait StateStore: Send + Sync {
    fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>>;

    fn put(&self, key: &str, value: &[u8]) -> StoreResult<()>;

    /// Inserts a row whose key must not exist yet.
    fn insert_row(&self, table: &str, row: &Row) -> StoreResult<()>;

    /// Overwrites a row whose key must already exist.
    fn replace_row(&self, table: &str, row: &Row) -> StoreResult<()>;

    fn get_row(&self, table: &str, key: &[Column]) -> StoreResult<Option<Row>>;

    /// All rows whose key starts with `prefix`, ascending.
    fn scan<'a>(&'a self, table: &str, prefix: &[Column]) -> StoreResult<RowIter<'a>>;

    fn flush(&self) -> StoreResult<()> {
        Ok(())
    }
}

impl<T: StateStore + ?Sized> StateStore for Arc<T> {
    fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        (**self).get(key)
    }

    fn put(&self, key: &str, value: &[u8]) -> StoreResult<()> {
        (**self).put(key, value)
    }

    fn insert_row(&self, table: &str, row: &Row) -> StoreResult<()> {
        (**self).insert_row(table, row)
    }

    fn replace_row(&self, table: &str, row: &Row) -> StoreResult<()> {
        (**self).replace_row(table, row)
    }

    fn get_row(&self, table: &str, key: &[Column]) -> StoreResult<Option<Row>> {
        (**self).get_row(table, key)
    }

    fn scan<'a>(&'a self, table: &str, prefix: &[Column]) -> StoreResult<RowIter<'a>> {
        (**self).scan(table, prefix)
    }

    fn flush(&self) -> StoreResult<()> {
        (**self).flush()
    }
}

// ---------------------------------------------------------------------------
// Key Encoding
// ---------------------------------------------------------------------------

const TAG_STR: u8 = 0x01;
const TAG_INT: u8 = 0x02;

/// Encodes key columns into bytes whose lexicographic order matches column
/// order. Encoding a prefix of the columns yields a byte prefix of the full
/// key.
pub(crate) fn encode_key(columns: &[Column]) -> Vec<u8> {
    let mut out = Vec::with_capacity(columns.len() * 12);
    for col in columns {
        match col {
            Column::Str(s) => {
                out.push(TAG_STR);
                // 0x00 terminates; embedded NULs are escaped as 0x00 0xFF.
                for &b in s.as_bytes() {
                    if b == 0 {
                        out.extend_from_slice(&[0x00, 0xFF]);
                    } else {
                        out.push(b);
                    }
                }
                out.extend_from_slice(&[0x00, 0x01]);
            }
            Column::Int(n) => {
                out.push(TAG_INT);
                out.extend_from_slice(&((*n as u64) ^ (1 << 63)).to_be_bytes());
            }
        }
    }
    out
}

pub(crate) fn encode_row(row: &Row) -> StoreResult<Vec<u8>> {
    bincode::serialize(row).map_err(|e| StoreError::Serialization(e.to_string()))
}

pub(crate) fn decode_row(bytes: &[u8]) -> StoreResult<Row> {
    bincode::deserialize(bytes).map_err(|e| StoreError::Serialization(e.to_string()))
}
