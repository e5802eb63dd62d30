//! Integration tests for the sled-backed ledger: state written by one
//! process lifetime must be readable by the next.

use std::sync::Arc;

use loyalty_ledger::{
    Coins, Gateway, LedgerClient, LedgerDb, MovementKind, NewWallet, StateStore, WalletLedger,
};

fn open(path: &std::path::Path) -> WalletLedger<LedgerDb> {
    WalletLedger::new(Arc::new(LedgerDb::open(path).unwrap()))
}

#[test]
fn wallets_journal_and_supply_survive_reopen() {
    let dir = tempfile::tempdir().unwrap();
    {
        let ledger = open(dir.path());
        ledger.init_total_coin(Coins::from_int(500)).unwrap();
        ledger.create_wallet(NewWallet::new("W1")).unwrap();
        ledger.create_wallet(NewWallet::new("W2")).unwrap();
        ledger.credit("W1", "cineplanet", Coins::from_int(50)).unwrap();
        ledger.debit("W1", "cineplanet", Coins::from_int(20)).unwrap();
        ledger.transfer("W1", "W2", Coins::from_int(5)).unwrap();
        ledger.store().flush().unwrap();
    }

    let ledger = open(dir.path());
    assert_eq!(
        ledger.balance("W1").unwrap(),
        (Coins::from_int(25), Coins::from_int(80))
    );
    assert_eq!(ledger.balance("W2").unwrap().0, Coins::from_int(5));
    assert_eq!(ledger.total_coin().unwrap(), Coins::from_int(520));

    let kinds: Vec<MovementKind> = ledger
        .movements(Some("W1"))
        .collect_vec()
        .unwrap()
        .into_iter()
        .map(|m| m.kind)
        .collect();
    assert_eq!(
        kinds,
        vec![
            MovementKind::Wallet,
            MovementKind::Credit,
            MovementKind::Debit,
            MovementKind::Debit
        ]
    );

    let ids: Vec<String> = ledger
        .wallets()
        .unwrap()
        .into_iter()
        .map(|w| w.wallet_id)
        .collect();
    assert_eq!(ids, vec!["W1", "W2"]);
}

#[test]
fn gateway_over_sled() {
    let ledger = Arc::new(WalletLedger::new(Arc::new(LedgerDb::open_temporary().unwrap())));
    let gw = Gateway::new(ledger);
    let args = |xs: &[&str]| xs.iter().map(|s| s.to_string()).collect::<Vec<_>>();

    gw.invoke("createwallet", &args(&["W1", "a@b.c", "1", "D"])).unwrap();
    gw.invoke("putbalance", &args(&["W1", "inkafarma", "12.5"])).unwrap();
    let out: serde_json::Value =
        serde_json::from_slice(&gw.query("getbalance", &args(&["W1"])).unwrap()).unwrap();
    assert_eq!(out["balance"], "12.500000");
    assert_eq!(out["limit"], "100.000000");
}
