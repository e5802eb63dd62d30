//! Storage failures in the middle of a ledger operation.
//!
//! A store wrapper fails one chosen write. The operation must surface the
//! storage error and perform none of the writes that come after it in the
//! fixed order: wallet, journal, index, supply, event.

use std::sync::Arc;

use loyalty_ledger::config::{COIN_BALANCE_KEY, MOVEMENT_TABLE};
use loyalty_ledger::store::{Column, Row, RowIter, StoreResult};
use loyalty_ledger::{
    Coins, LedgerError, MemoryStore, MovementKind, NewWallet, StateStore, StoreError, WalletLedger,
};
use parking_lot::Mutex;

/// Which write the store should refuse next.
#[derive(Clone, Debug, PartialEq, Eq)]
enum Fault {
    Put(String),
    Insert(String),
}

/// A memory store that fails the write matching its armed fault.
#[derive(Default)]
struct FaultyStore {
    inner: MemoryStore,
    fault: Mutex<Option<Fault>>,
}

impl FaultyStore {
    fn arm(&self, fault: Fault) {
        *self.fault.lock() = Some(fault);
    }

    fn check(&self, attempted: Fault) -> StoreResult<()> {
        if self.fault.lock().as_ref() == Some(&attempted) {
            return Err(StoreError::Serialization("disk full".into()));
        }
        Ok(())
    }
}

impl StateStore for FaultyStore {
    fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        self.inner.get(key)
    }

    fn put(&self, key: &str, value: &[u8]) -> StoreResult<()> {
        self.check(Fault::Put(key.to_string()))?;
        self.inner.put(key, value)
    }

    fn insert_row(&self, table: &str, row: &Row) -> StoreResult<()> {
        self.check(Fault::Insert(table.to_string()))?;
        self.inner.insert_row(table, row)
    }

    fn replace_row(&self, table: &str, row: &Row) -> StoreResult<()> {
        self.inner.replace_row(table, row)
    }

    fn get_row(&self, table: &str, key: &[Column]) -> StoreResult<Option<Row>> {
        self.inner.get_row(table, key)
    }

    fn scan<'a>(&'a self, table: &str, prefix: &[Column]) -> StoreResult<RowIter<'a>> {
        self.inner.scan(table, prefix)
    }
}

fn coins(s: &str) -> Coins {
    s.parse().unwrap()
}

/// Helper: a ledger with 100 coins of supply and wallet `W1` holding 10.
fn ledger() -> (WalletLedger<FaultyStore>, Arc<FaultyStore>) {
    let store = Arc::new(FaultyStore::default());
    let ledger = WalletLedger::new(Arc::clone(&store));
    ledger.init_total_coin(coins("100")).unwrap();
    ledger.create_wallet(NewWallet::new("W1")).unwrap();
    ledger.credit("W1", "shop", coins("10")).unwrap();
    (ledger, store)
}

fn indexed_balance<S: StateStore>(ledger: &WalletLedger<S>, id: &str) -> Coins {
    ledger
        .wallets()
        .unwrap()
        .into_iter()
        .find(|w| w.wallet_id == id)
        .map(|w| w.balance)
        .unwrap()
}

fn journal_len<S: StateStore>(ledger: &WalletLedger<S>, id: &str) -> usize {
    ledger.movements(Some(id)).collect_vec().unwrap().len()
}

// ---------------------------------------------------------------------------
// Credit
// ---------------------------------------------------------------------------

#[test]
fn credit_stops_when_the_wallet_write_fails() {
    let (ledger, store) = ledger();
    let mut rx = ledger.subscribe();
    store.arm(Fault::Put("W1".into()));

    assert!(matches!(
        ledger.credit("W1", "shop", coins("5")),
        Err(LedgerError::Storage(_))
    ));
    assert_eq!(ledger.balance("W1").unwrap().0, coins("10"));
    assert_eq!(journal_len(&ledger, "W1"), 2);
    assert_eq!(indexed_balance(&ledger, "W1"), coins("10"));
    assert!(rx.try_recv().is_err());
}

#[test]
fn credit_stops_when_the_journal_write_fails() {
    let (ledger, store) = ledger();
    let mut rx = ledger.subscribe();
    store.arm(Fault::Insert(MOVEMENT_TABLE.into()));

    assert!(matches!(
        ledger.credit("W1", "shop", coins("5")),
        Err(LedgerError::Storage(_))
    ));
    // The wallet record was written first and is not rolled back.
    assert_eq!(ledger.balance("W1").unwrap().0, coins("15"));
    assert_eq!(journal_len(&ledger, "W1"), 2);
    assert_eq!(indexed_balance(&ledger, "W1"), coins("10"));
    assert!(rx.try_recv().is_err());
}

// ---------------------------------------------------------------------------
// Debit
// ---------------------------------------------------------------------------

#[test]
fn debit_stops_when_the_journal_write_fails() {
    let (ledger, store) = ledger();
    let mut rx = ledger.subscribe();
    store.arm(Fault::Insert(MOVEMENT_TABLE.into()));

    assert!(matches!(
        ledger.debit("W1", "shop", coins("4")),
        Err(LedgerError::Storage(_))
    ));
    assert_eq!(journal_len(&ledger, "W1"), 2);
    assert_eq!(indexed_balance(&ledger, "W1"), coins("10"));
    assert_eq!(ledger.total_coin().unwrap(), coins("100"));
    assert!(rx.try_recv().is_err());
}

#[test]
fn debit_stops_when_the_supply_write_fails() {
    let (ledger, store) = ledger();
    let mut rx = ledger.subscribe();
    store.arm(Fault::Put(COIN_BALANCE_KEY.into()));

    assert!(matches!(
        ledger.debit("W1", "shop", coins("4")),
        Err(LedgerError::Storage(_))
    ));
    // Everything ahead of the supply counter landed.
    assert_eq!(ledger.balance("W1").unwrap().0, coins("6"));
    let journal = ledger.movements(Some("W1")).collect_vec().unwrap();
    assert_eq!(journal.len(), 3);
    assert_eq!(journal[2].kind, MovementKind::Debit);
    assert_eq!(indexed_balance(&ledger, "W1"), coins("6"));

    assert_eq!(ledger.total_coin().unwrap(), coins("100"));
    assert!(rx.try_recv().is_err());
}

#[test]
fn disarmed_store_behaves_normally() {
    let (ledger, store) = ledger();
    store.arm(Fault::Insert("Elsewhere".into()));
    ledger.debit("W1", "shop", coins("4")).unwrap();
    assert_eq!(ledger.total_coin().unwrap(), coins("104"));
}
