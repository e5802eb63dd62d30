//! # LedgerDb: Persistent Storage Engine
//!
//! The on-disk [`StateStore`], built on sled's embedded key-value store.
//!
//! ## Tree Layout
//!
//! | Tree          | Key                      | Value          |
//! |---------------|--------------------------|----------------|
//! | `state`       | state key (UTF-8)        | raw bytes      |
//! | `<table>`     | ordered key encoding     | `bincode(Row)` |
//!
//! Each row table gets its own sled tree, opened on first use. Row keys use
//! the order-preserving encoding from the parent module, so `scan_prefix`
//! returns movements chronologically.
//!
//! ## Atomicity
//!
//! Single inserts are atomic; `insert_row` uses compare-and-swap so a key
//! collision is detected rather than overwritten. Multi-step updates are
//! serialized by the ledger's write guard.

use std::path::Path;

use sled::{Db, Tree};

use super::{decode_row, encode_key, encode_row, Column, Row, RowIter, StateStore, StoreError, StoreResult};

const STATE_TREE: &str = "state";

/// sled-backed [`StateStore`].
///
/// sled trees are thread-safe, so a `LedgerDb` can be shared via `Arc`
/// without further locking.
#[derive(Debug, Clone)]
pub struct LedgerDb {
    db: Db,
    state: Tree,
}

impl LedgerDb {
    /// Open or create a database at the given filesystem path.
    pub fn open<P: AsRef<Path>>(path: P) -> StoreResult<Self> {
        let db = sled::open(path)?;
        Self::from_db(db)
    }

    /// A database that is discarded when dropped.
    pub fn open_temporary() -> StoreResult<Self> {
        let db = sled::Config::new().temporary(true).open()?;
        Self::from_db(db)
    }

    fn from_db(db: Db) -> StoreResult<Self> {
        let state = db.open_tree(STATE_TREE)?;
        Ok(Self { db, state })
    }

    fn table(&self, name: &str) -> StoreResult<Tree> {
        Ok(self.db.open_tree(name)?)
    }

    /// Size of the database on disk, in bytes.
    pub fn size_on_disk(&self) -> StoreResult<u64> {
        Ok(self.db.size_on_disk()?)
    }
}

impl StateStore for LedgerDb {
    fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        Ok(self.state.get(key.as_bytes())?.map(|v| v.to_vec()))
    }

    fn put(&self, key: &str, value: &[u8]) -> StoreResult<()> {
        self.state.insert(key.as_bytes(), value)?;
        Ok(())
    }

    fn insert_row(&self, table: &str, row: &Row) -> StoreResult<()> {
        let tree = self.table(table)?;
        let key = encode_key(&row.key);
        let bytes = encode_row(row)?;
        match tree.compare_and_swap(key, None::<&[u8]>, Some(bytes))? {
            Ok(()) => Ok(()),
            Err(_) => Err(StoreError::RowExists(table.to_string())),
        }
    }

    fn replace_row(&self, table: &str, row: &Row) -> StoreResult<()> {
        let tree = self.table(table)?;
        let key = encode_key(&row.key);
        if !tree.contains_key(&key)? {
            return Err(StoreError::RowMissing(table.to_string()));
        }
        tree.insert(key, encode_row(row)?)?;
        Ok(())
    }

    fn get_row(&self, table: &str, key: &[Column]) -> StoreResult<Option<Row>> {
        let tree = self.table(table)?;
        match tree.get(encode_key(key))? {
            Some(bytes) => Ok(Some(decode_row(&bytes)?)),
            None => Ok(None),
        }
    }

    fn scan<'a>(&'a self, table: &str, prefix: &[Column]) -> StoreResult<RowIter<'a>> {
        let tree = self.table(table)?;
        let iter = tree.scan_prefix(encode_key(prefix)).values().map(|item| -> StoreResult<Row> {
            let bytes = item?;
            decode_row(&bytes)
        });
        Ok(Box::new(iter))
    }

    fn flush(&self) -> StoreResult<()> {
        self.db.flush()?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn movement(wallet: &str, t: i64, kind: &str) -> Row {
        Row::new(
            vec![Column::str("Movement"), Column::str(wallet), Column::Int(t)],
            vec![Column::str(kind)],
        )
    }

    #[test]
    fn open_temporary_is_empty() {
        let db = LedgerDb::open_temporary().unwrap();
        assert!(db.get("coinBalance").unwrap().is_none());
        assert_eq!(db.scan("Movimientos", &[]).unwrap().count(), 0);
    }

    #[test]
    fn insert_row_detects_collision() {
        let db = LedgerDb::open_temporary().unwrap();
        db.insert_row("Movimientos", &movement("w1", 10, "C")).unwrap();
        let err = db
            .insert_row("Movimientos", &movement("w1", 10, "D"))
            .unwrap_err();
        assert!(matches!(err, StoreError::RowExists(_)));

        let kept = db
            .get_row("Movimientos", &movement("w1", 10, "C").key)
            .unwrap()
            .unwrap();
        assert_eq!(kept.value_str(0), Some("C"));
    }

    #[test]
    fn replace_row_requires_presence() {
        let db = LedgerDb::open_temporary().unwrap();
        assert!(matches!(
            db.replace_row("Wallet", &movement("w1", 1, "C")),
            Err(StoreError::RowMissing(_))
        ));
    }

    #[test]
    fn scan_is_chronological() {
        let db = LedgerDb::open_temporary().unwrap();
        for t in [300, 100, 200] {
            db.insert_row("Movimientos", &movement("w1", t, "C")).unwrap();
        }
        db.insert_row("Movimientos", &movement("w2", 50, "D")).unwrap();

        let times: Vec<i64> = db
            .scan("Movimientos", &[Column::str("Movement"), Column::str("w1")])
            .unwrap()
            .map(|r| r.unwrap().key_int(2).unwrap())
            .collect();
        assert_eq!(times, vec![100, 200, 300]);
    }

    #[test]
    fn data_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let db = LedgerDb::open(dir.path()).unwrap();
            db.put("coinBalance", b"1000.000000").unwrap();
            db.insert_row("Wallet", &movement("w1", 1, "C")).unwrap();
            db.flush().unwrap();
        }
        let db = LedgerDb::open(dir.path()).unwrap();
        assert_eq!(
            db.get("coinBalance").unwrap().as_deref(),
            Some(&b"1000.000000"[..])
        );
        assert_eq!(db.scan("Wallet", &[]).unwrap().count(), 1);
    }
}
