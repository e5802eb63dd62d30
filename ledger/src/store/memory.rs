//! In-memory [`StateStore`], used by tests, benches and the merchant
//! modules' private state when no path is configured.

use std::collections::{BTreeMap, HashMap};

use parking_lot::RwLock;

use super::{encode_key, Column, Row, RowIter, StateStore, StoreError, StoreResult};

#[derive(Debug, Default)]
struct Inner {
    state: BTreeMap<String, Vec<u8>>,
    tables: HashMap<String, BTreeMap<Vec<u8>, Row>>,
}

/// A [`StateStore`] that keeps everything in ordered maps.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of rows in `table`.
    pub fn row_count(&self, table: &str) -> usize {
        self.inner.read().tables.get(table).map_or(0, BTreeMap::len)
    }
}

impl StateStore for MemoryStore {
    fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        Ok(self.inner.read().state.get(key).cloned())
    }

    fn put(&self, key: &str, value: &[u8]) -> StoreResult<()> {
        self.inner.write().state.insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn insert_row(&self, table: &str, row: &Row) -> StoreResult<()> {
        let key = encode_key(&row.key);
        let mut inner = self.inner.write();
        let rows = inner.tables.entry(table.to_string()).or_default();
        if rows.contains_key(&key) {
            return Err(StoreError::RowExists(table.to_string()));
        }
        rows.insert(key, row.clone());
        Ok(())
    }

    fn replace_row(&self, table: &str, row: &Row) -> StoreResult<()> {
        let key = encode_key(&row.key);
        let mut inner = self.inner.write();
        match inner.tables.get_mut(table).and_then(|rows| rows.get_mut(&key)) {
            Some(slot) => {
                *slot = row.clone();
                Ok(())
            }
            None => Err(StoreError::RowMissing(table.to_string())),
        }
    }

    fn get_row(&self, table: &str, key: &[Column]) -> StoreResult<Option<Row>> {
        let key = encode_key(key);
        Ok(self
            .inner
            .read()
            .tables
            .get(table)
            .and_then(|rows| rows.get(&key).cloned()))
    }

    fn scan<'a>(&'a self, table: &str, prefix: &[Column]) -> StoreResult<RowIter<'a>> {
        let prefix = encode_key(prefix);
        let inner = self.inner.read();
        let rows: Vec<StoreResult<Row>> = match inner.tables.get(table) {
            Some(rows) => rows
                .range(prefix.clone()..)
                .take_while(|(k, _)| k.starts_with(&prefix))
                .map(|(_, row)| Ok(row.clone()))
                .collect(),
            None => Vec::new(),
        };
        Ok(Box::new(rows.into_iter()))
    }
}
