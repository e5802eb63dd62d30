//! Integration tests for merchant adapters.
//!
//! Each test wires a merchant to an in-process gateway over a memory-backed
//! ledger and checks both sides: the customer's wallet and the merchant's
//! own pool and exchange journal.

use std::sync::Arc;

use loyalty_ledger::{
    Coins, Gateway, GatewayError, LedgerClient, LedgerError, MemoryStore, MovementKind,
    WalletLedger,
};
use loyalty_merchants::{ExchangeKind, Merchant, MerchantError, MerchantProfile};

type TestMerchant = Merchant<Gateway<MemoryStore>, MemoryStore>;

fn coins(s: &str) -> Coins {
    s.parse().unwrap()
}

/// Helper: a ledger seeded with 10,000 coins and an open merchant holding a
/// pool of `pool` coins, plus one customer wallet `W1`.
fn setup(profile: MerchantProfile, pool: &str) -> (Arc<WalletLedger<MemoryStore>>, TestMerchant) {
    let ledger = Arc::new(WalletLedger::new(Arc::new(MemoryStore::new())));
    ledger.init_total_coin(coins("10000")).unwrap();
    let merchant = Merchant::new(profile, Gateway::new(Arc::clone(&ledger)), MemoryStore::new());
    merchant.open(coins(pool)).unwrap();
    merchant.create_wallet("W1", "ana@example.com", "999", "DNI-1").unwrap();
    (ledger, merchant)
}

// ---------------------------------------------------------------------------
// Opening & Pool
// ---------------------------------------------------------------------------

#[test]
fn open_draws_from_global_supply() {
    let (ledger, merchant) = setup(MerchantProfile::cinema(), "1000");
    assert_eq!(ledger.total_coin().unwrap(), coins("9000"));

    let pool = merchant.pool().unwrap();
    assert_eq!(pool.business, "cineplanet");
    assert_eq!(pool.total, coins("1000"));
    assert_eq!(pool.exchanged, Coins::ZERO);
    assert_eq!(pool.sent, Coins::ZERO);

    assert!(matches!(
        merchant.open(coins("5")),
        Err(MerchantError::InvalidArgument(_))
    ));
}

#[test]
fn acquire_coins_grows_the_pool() {
    let (ledger, merchant) = setup(MerchantProfile::cinema(), "100");
    let pool = merchant.acquire_coins(coins("250")).unwrap();
    assert_eq!(pool.total, coins("350"));
    assert_eq!(ledger.total_coin().unwrap(), coins("9650"));
}

#[test]
fn out_of_range_amounts_are_rejected_without_side_effects() {
    let (ledger, merchant) = setup(MerchantProfile::pharmacy(), "100");

    assert!(matches!(
        merchant.acquire_coins(Coins::MAX),
        Err(MerchantError::InvalidArgument(_))
    ));
    assert_eq!(merchant.pool().unwrap().total, coins("100"));
    assert_eq!(ledger.total_coin().unwrap(), coins("9900"));

    assert!(matches!(
        merchant.buy("W1", Coins::MAX, Coins::ZERO),
        Err(MerchantError::InvalidArgument(_))
    ));
    assert_eq!(ledger.balance("W1").unwrap().0, Coins::ZERO);
    assert!(merchant.journal().unwrap().is_empty());
}

#[test]
fn unopened_merchant_refuses_purchases() {
    let ledger = Arc::new(WalletLedger::new(Arc::new(MemoryStore::new())));
    let merchant = Merchant::new(
        MerchantProfile::cinema(),
        Gateway::new(Arc::clone(&ledger)),
        MemoryStore::new(),
    );
    assert!(!merchant.is_open().unwrap());
    assert!(matches!(
        merchant.buy("W1", coins("10"), Coins::ZERO),
        Err(MerchantError::NotOpen(_))
    ));
    assert!(matches!(
        merchant.acquire_coins(coins("10")),
        Err(MerchantError::NotOpen(_))
    ));
}

// ---------------------------------------------------------------------------
// Purchases
// ---------------------------------------------------------------------------

#[test]
fn purchase_earns_coins_at_rate() {
    let (ledger, merchant) = setup(MerchantProfile::pharmacy(), "1000");
    let purchase = merchant.buy("W1", coins("10"), Coins::ZERO).unwrap();
    assert_eq!(purchase.issued, coins("30"));
    assert_eq!(purchase.redeemed, Coins::ZERO);

    assert_eq!(ledger.balance("W1").unwrap(), (coins("30"), coins("100")));
    let pool = merchant.pool().unwrap();
    assert_eq!(pool.total, coins("970"));
    assert_eq!(pool.sent, coins("30"));

    let journal = merchant.journal().unwrap();
    assert_eq!(journal.len(), 1);
    assert_eq!(journal[0].kind, ExchangeKind::Delivered);
    assert_eq!(journal[0].amount, coins("30"));

    let last = ledger.movements(Some("W1")).collect_vec().unwrap().pop().unwrap();
    assert_eq!(last.kind, MovementKind::Credit);
    assert_eq!(last.business, "inkafarma");
}

#[test]
fn purchase_with_partial_redemption() {
    let (ledger, merchant) = setup(MerchantProfile::cinema(), "1000");
    merchant.buy("W1", coins("50"), Coins::ZERO).unwrap();

    let purchase = merchant.buy("W1", coins("40"), coins("20")).unwrap();
    assert_eq!(purchase.redeemed, coins("20"));
    assert_eq!(purchase.issued, coins("20"));

    // 50 - 20 + 20; the limit only tracks the redemption.
    assert_eq!(ledger.balance("W1").unwrap(), (coins("50"), coins("80")));

    let pool = merchant.pool().unwrap();
    assert_eq!(pool.exchanged, coins("20"));
    assert_eq!(pool.sent, coins("70"));
    assert_eq!(pool.total, coins("930"));

    let kinds: Vec<ExchangeKind> = merchant.journal().unwrap().iter().map(|r| r.kind).collect();
    assert_eq!(
        kinds,
        vec![ExchangeKind::Delivered, ExchangeKind::Returned, ExchangeKind::Delivered]
    );

    // Redeemed coins flow back into the global supply.
    assert_eq!(ledger.total_coin().unwrap(), coins("9020"));
}

#[test]
fn pure_redemption_issues_nothing() {
    let (ledger, merchant) = setup(MerchantProfile::cinema(), "1000");
    merchant.buy("W1", coins("50"), Coins::ZERO).unwrap();

    let purchase = merchant.buy("W1", coins("10"), coins("30")).unwrap();
    assert_eq!(purchase.issued, Coins::ZERO);
    assert_eq!(ledger.balance("W1").unwrap(), (coins("20"), coins("70")));

    let pool = merchant.pool().unwrap();
    assert_eq!(pool.exchanged, coins("30"));
    assert_eq!(pool.sent, coins("50"));
}

#[test]
fn redeeming_the_whole_balance_is_allowed() {
    let (ledger, merchant) = setup(MerchantProfile::cinema(), "1000");
    merchant.buy("W1", coins("25"), Coins::ZERO).unwrap();
    merchant.buy("W1", Coins::ZERO, coins("25")).unwrap();
    assert_eq!(ledger.balance("W1").unwrap().0, Coins::ZERO);
}

#[test]
fn redemption_beyond_balance_changes_nothing() {
    let (ledger, merchant) = setup(MerchantProfile::cinema(), "1000");
    merchant.buy("W1", coins("10"), Coins::ZERO).unwrap();
    let pool_before = merchant.pool().unwrap();

    let err = merchant.buy("W1", coins("100"), coins("10.5")).unwrap_err();
    assert!(matches!(err, MerchantError::InsufficientFunds { .. }));
    assert_eq!(ledger.balance("W1").unwrap().0, coins("10"));
    assert_eq!(merchant.pool().unwrap(), pool_before);
    assert_eq!(merchant.journal().unwrap().len(), 1);
}

#[test]
fn exhausted_pool_refuses_issuance() {
    let (ledger, merchant) = setup(MerchantProfile::cinema(), "10");
    let err = merchant.buy("W1", coins("50"), Coins::ZERO).unwrap_err();
    assert!(matches!(
        err,
        MerchantError::InsufficientPool { available, requested }
            if available == coins("10") && requested == coins("50")
    ));
    assert_eq!(ledger.balance("W1").unwrap().0, Coins::ZERO);
}

#[test]
fn purchase_that_moves_nothing_is_rejected() {
    let (_, merchant) = setup(MerchantProfile::cinema(), "10");
    assert!(matches!(
        merchant.buy("W1", Coins::ZERO, Coins::ZERO),
        Err(MerchantError::InvalidArgument(_))
    ));
    assert!(matches!(
        merchant.buy("W1", coins("-1"), Coins::ZERO),
        Err(MerchantError::InvalidArgument(_))
    ));
}

#[test]
fn unknown_customer_surfaces_ledger_error() {
    let (_, merchant) = setup(MerchantProfile::cinema(), "100");
    let err = merchant.buy("ghost", coins("5"), Coins::ZERO).unwrap_err();
    assert!(matches!(
        err,
        MerchantError::Client(GatewayError::Ledger(LedgerError::NotFound(_)))
    ));
}

#[test]
fn supermarket_uses_configured_rate() {
    let profile = MerchantProfile::supermarket(Some(coins("1.5").as_decimal())).unwrap();
    let (ledger, merchant) = setup(profile, "1000");
    merchant.buy("W1", coins("20"), Coins::ZERO).unwrap();
    assert_eq!(ledger.balance("W1").unwrap().0, coins("30"));
}

// ---------------------------------------------------------------------------
// Client Failures
// ---------------------------------------------------------------------------

/// A client whose ledger is unreachable.
struct OfflineLedger;

impl LedgerClient for OfflineLedger {
    fn invoke(&self, function: &str, _args: &[String]) -> Result<Vec<u8>, GatewayError> {
        Err(GatewayError::UnknownFunction(function.to_string()))
    }

    fn query(&self, function: &str, _args: &[String]) -> Result<Vec<u8>, GatewayError> {
        Err(GatewayError::UnknownFunction(function.to_string()))
    }
}

#[test]
fn failed_open_leaves_merchant_closed() {
    let merchant = Merchant::new(MerchantProfile::cinema(), OfflineLedger, MemoryStore::new());
    assert!(matches!(
        merchant.open(coins("100")),
        Err(MerchantError::Client(_))
    ));
    assert!(!merchant.is_open().unwrap());
}
