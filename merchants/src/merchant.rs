//! # Merchant
//!
//! Turns purchases into ledger calls.
//!
//! ## Purchase Rules
//!
//! With `earned = total * rate - redeemed`:
//!
//! | earned | redeemed | Ledger calls                                   | Journal |
//! |--------|----------|------------------------------------------------|---------|
//! | > 0    | > 0      | debit `redeemed`, then credit `earned`         | C, D    |
//! | > 0    | 0        | credit `total * rate`                          | D       |
//! | <= 0   | > 0      | debit `redeemed`                               | C       |
//! | <= 0   | 0        | rejected                                       |         |
//!
//! Afterwards the pool records `exchanged += redeemed`, `sent += issued` and
//! `total -= issued`.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use loyalty_ledger::config::{COIN_BALANCE_KEY, MAX_JOURNAL_KEY_RETRIES};
use loyalty_ledger::gateway::BalanceResponse;
use loyalty_ledger::store::Column;
use loyalty_ledger::{Clock, Coins, LedgerClient, StateStore, StoreError, SystemClock};
use parking_lot::Mutex;
use serde::Serialize;
use uuid::Uuid;

use crate::error::{MerchantError, MerchantResult};
use crate::pool::{ExchangeKind, ExchangeRecord, MerchantPool};
use crate::profile::MerchantProfile;
use crate::EXCHANGE_TABLE;

/// Outcome of [`Merchant::buy`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Purchase {
    pub id: Uuid,
    pub business: String,
    pub wallet: String,
    pub redeemed: Coins,
    pub issued: Coins,
    pub at: DateTime<Utc>,
}

/// A merchant bound to a ledger client and its own state store.
pub struct Merchant<C: LedgerClient, S: StateStore> {
    profile: MerchantProfile,
    client: C,
    store: S,
    clock: Arc<dyn Clock>,
    write_guard: Mutex<()>,
}

impl<C: LedgerClient, S: StateStore> Merchant<C, S> {
    pub fn new(profile: MerchantProfile, client: C, store: S) -> Self {
        Self::with_clock(profile, client, store, Arc::new(SystemClock))
    }

    pub fn with_clock(profile: MerchantProfile, client: C, store: S, clock: Arc<dyn Clock>) -> Self {
        Self {
            profile,
            client,
            store,
            clock,
            write_guard: Mutex::new(()),
        }
    }

    pub fn profile(&self) -> &MerchantProfile {
        &self.profile
    }

    pub fn name(&self) -> &str {
        &self.profile.name
    }

    pub fn is_open(&self) -> MerchantResult<bool> {
        Ok(self.store.get(COIN_BALANCE_KEY)?.is_some())
    }

    // -- Pool --------------------------------------------------------------

    /// Draws `initial_pool` coins from the global supply and starts a fresh
    /// pool.
    pub fn open(&self, initial_pool: Coins) -> MerchantResult<MerchantPool> {
        require_positive("initial pool", initial_pool)?;
        let _guard = self.write_guard.lock();
        if self.is_open()? {
            return Err(MerchantError::InvalidArgument(format!(
                "merchant {} is already open",
                self.profile.name
            )));
        }

        self.invoke("debittotalcoin", &[initial_pool.to_string().as_str()])?;
        let pool = MerchantPool::new(&self.profile.name, initial_pool);
        self.save_pool(&pool)?;

        tracing::info!(merchant = %self.profile.name, pool = %initial_pool, "merchant opened");
        Ok(pool)
    }

    /// Draws more coins from the global supply into the pool.
    pub fn acquire_coins(&self, amount: Coins) -> MerchantResult<MerchantPool> {
        require_positive("amount", amount)?;
        let _guard = self.write_guard.lock();
        let mut pool = self.load_pool()?;

        let total = add(pool.total, amount)?;
        self.invoke("debittotalcoin", &[amount.to_string().as_str()])?;
        pool.total = total;
        self.save_pool(&pool)?;

        tracing::info!(merchant = %self.profile.name, amount = %amount, total = %pool.total, "coins acquired");
        Ok(pool)
    }

    pub fn pool(&self) -> MerchantResult<MerchantPool> {
        self.load_pool()
    }

    // -- Customers ---------------------------------------------------------

    pub fn create_wallet(&self, id: &str, email: &str, phone: &str, document: &str) -> MerchantResult<()> {
        self.invoke("createwallet", &[id, email, phone, document])?;
        tracing::info!(merchant = %self.profile.name, wallet = id, "wallet created");
        Ok(())
    }

    /// The customer's `(balance, limit)` as the ledger reports it.
    pub fn balance(&self, wallet: &str) -> MerchantResult<BalanceResponse> {
        let args = [wallet.to_string()];
        let bytes = self.client.query("getbalance", &args)?;
        serde_json::from_slice(&bytes).map_err(|e| MerchantError::Decode {
            what: "balance response",
            reason: e.to_string(),
        })
    }

    /// Records a purchase of `currency_total` currency units paid partly with
    /// `redeemed` coins.
    pub fn buy(&self, wallet: &str, currency_total: Coins, redeemed: Coins) -> MerchantResult<Purchase> {
        if currency_total.is_negative() || redeemed.is_negative() {
            return Err(MerchantError::InvalidArgument(
                "purchase amounts must not be negative".into(),
            ));
        }
        let gross = currency_total
            .scale_by(self.profile.rate)
            .ok_or_else(|| MerchantError::InvalidArgument("purchase total out of range".into()))?;
        let earned = sub(gross, redeemed)?;

        let _guard = self.write_guard.lock();
        let pool = self.load_pool()?;

        let issued = match (earned.is_positive(), redeemed.is_positive()) {
            (true, true) => earned,
            (true, false) => gross,
            (false, true) => Coins::ZERO,
            (false, false) => {
                return Err(MerchantError::InvalidArgument(
                    "purchase neither earns nor redeems coins".into(),
                ))
            }
        };
        if issued > pool.total {
            return Err(MerchantError::InsufficientPool {
                available: pool.total,
                requested: issued,
            });
        }
        let next_pool = MerchantPool {
            exchanged: add(pool.exchanged, redeemed)?,
            sent: add(pool.sent, issued)?,
            total: sub(pool.total, issued)?,
            ..pool
        };
        if redeemed.is_positive() {
            let balance = self.balance(wallet)?.balance;
            if balance < redeemed {
                return Err(MerchantError::InsufficientFunds {
                    wallet: wallet.to_string(),
                    balance,
                    requested: redeemed,
                });
            }
        }

        let business = self.profile.name.clone();
        if redeemed.is_positive() {
            self.invoke("debitbalance", &[wallet, business.as_str(), redeemed.to_string().as_str()])?;
            self.record(ExchangeKind::Returned, redeemed)?;
        }
        if issued.is_positive() {
            self.invoke("putbalance", &[wallet, business.as_str(), issued.to_string().as_str()])?;
            self.record(ExchangeKind::Delivered, issued)?;
        }

        self.save_pool(&next_pool)?;

        tracing::info!(
            merchant = %business,
            wallet,
            total = %currency_total,
            redeemed = %redeemed,
            issued = %issued,
            "purchase recorded"
        );
        Ok(Purchase {
            id: Uuid::new_v4(),
            business,
            wallet: wallet.to_string(),
            redeemed,
            issued,
            at: self.clock.now(),
        })
    }

    // -- Journal -----------------------------------------------------------

    /// Exchange journal, oldest first.
    pub fn journal(&self) -> MerchantResult<Vec<ExchangeRecord>> {
        self.store
            .scan(EXCHANGE_TABLE, &[Column::str(&self.profile.name)])?
            .map(|row| -> MerchantResult<ExchangeRecord> { ExchangeRecord::from_row(&row?) })
            .collect()
    }

    // -- Internals ---------------------------------------------------------

    fn invoke(&self, function: &str, args: &[&str]) -> MerchantResult<Vec<u8>> {
        let args: Vec<String> = args.iter().map(|a| a.to_string()).collect();
        Ok(self.client.invoke(function, &args)?)
    }

    fn load_pool(&self) -> MerchantResult<MerchantPool> {
        match self.store.get(COIN_BALANCE_KEY)? {
            Some(bytes) => MerchantPool::from_bytes(&bytes),
            None => Err(MerchantError::NotOpen(self.profile.name.clone())),
        }
    }

    fn save_pool(&self, pool: &MerchantPool) -> MerchantResult<()> {
        self.store.put(COIN_BALANCE_KEY, &pool.to_bytes()?)?;
        Ok(())
    }

    fn record(&self, kind: ExchangeKind, amount: Coins) -> MerchantResult<()> {
        let mut rec = ExchangeRecord {
            business: self.profile.name.clone(),
            time: self.clock.now_millis(),
            amount,
            kind,
        };
        for _ in 0..MAX_JOURNAL_KEY_RETRIES {
            match self.store.insert_row(EXCHANGE_TABLE, &rec.to_row()) {
                Ok(()) => return Ok(()),
                Err(StoreError::RowExists(_)) => rec.time += 1,
                Err(e) => return Err(e.into()),
            }
        }
        Err(StoreError::RowExists(EXCHANGE_TABLE.to_string()).into())
    }
}

fn add(a: Coins, b: Coins) -> MerchantResult<Coins> {
    a.checked_add(b)
        .ok_or_else(|| MerchantError::InvalidArgument(format!("{a} + {b} is out of range")))
}

fn sub(a: Coins, b: Coins) -> MerchantResult<Coins> {
    a.checked_sub(b)
        .ok_or_else(|| MerchantError::InvalidArgument(format!("{a} - {b} is out of range")))
}

fn require_positive(what: &str, amount: Coins) -> MerchantResult<()> {
    if amount.is_positive() {
        Ok(())
    } else {
        Err(MerchantError::InvalidArgument(format!(
            "{what} must be greater than zero, got {amount}"
        )))
    }
}
