//! # WalletLedger
//!
//! The operations that mutate wallets, the journal and the coin supply.
//!
//! ## Write Discipline
//!
//! Every mutating operation takes the ledger's write guard, validates all of
//! its inputs, and then writes in a fixed order:
//!
//! ```text
//! wallet record(s) → journal row(s) → wallet index row(s) → coinBalance → event
//! ```
//!
//! Results that would leave [`Coins`] range are `InvalidArgument` and are
//! caught before the first write.
//!
//! The first failing write aborts the operation; nothing after it runs. Reads
//! go straight to the store without the guard.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::broadcast;

use crate::amount::Coins;
use crate::clock::{Clock, SystemClock};
use crate::config::{
    COIN_BALANCE_KEY, CREATE_BUSINESS, EVENT_CHANNEL_CAPACITY, MAX_JOURNAL_KEY_RETRIES,
    MOVEMENT_TABLE, WALLET_TABLE, WALLET_TAG,
};
use crate::store::{Column, StateStore, StoreError};

use super::error::{LedgerError, LedgerResult};
use super::events::LedgerEvent;
use super::movement::{Movement, MovementKind, Movements};
use super::supply;
use super::wallet::{NewWallet, Wallet, WalletBalance};

/// The canonical wallet ledger over a [`StateStore`].
pub struct WalletLedger<S: StateStore> {
    store: Arc<S>,
    clock: Arc<dyn Clock>,
    write_guard: Mutex<()>,
    events: broadcast::Sender<LedgerEvent>,
}

impl<S: StateStore> WalletLedger<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self::with_clock(store, Arc::new(SystemClock))
    }

    pub fn with_clock(store: Arc<S>, clock: Arc<dyn Clock>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            store,
            clock,
            write_guard: Mutex::new(()),
            events,
        }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// A new receiver for ledger notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<LedgerEvent> {
        self.events.subscribe()
    }

    pub fn event_sender(&self) -> broadcast::Sender<LedgerEvent> {
        self.events.clone()
    }

    // -- Wallets -----------------------------------------------------------

    pub fn create_wallet(&self, new: NewWallet) -> LedgerResult<Wallet> {
        if new.id.trim().is_empty() {
            return Err(LedgerError::InvalidArgument(
                "wallet id must not be empty".into(),
            ));
        }
        if new.id == COIN_BALANCE_KEY {
            return Err(LedgerError::InvalidArgument(format!(
                "wallet id {COIN_BALANCE_KEY:?} is reserved"
            )));
        }
        if new.initial_limit.is_negative() {
            return Err(LedgerError::InvalidArgument(format!(
                "initial limit must not be negative, got {}",
                new.initial_limit
            )));
        }

        let _guard = self.write_guard.lock();
        if self.store.get(&new.id)?.is_some() {
            return Err(LedgerError::AlreadyExists(new.id));
        }

        let now = self.clock.now_millis();
        let wallet = Wallet {
            id: new.id,
            email: new.email,
            phone: new.phone,
            document: new.document,
            amount: Coins::ZERO,
            limit: new.initial_limit,
            limit_ceiling: new.initial_limit,
            created_at: now,
        };

        self.save_wallet(&wallet)?;
        self.append_movement(Movement {
            time: now,
            wallet_id: wallet.id.clone(),
            business: CREATE_BUSINESS.to_string(),
            amount: Coins::ZERO,
            balance: Coins::ZERO,
            kind: MovementKind::Wallet,
        })?;
        self.store.insert_row(WALLET_TABLE, &wallet.index_row())?;

        tracing::info!(wallet = %wallet.id, limit = %wallet.limit, "wallet created");
        self.publish(LedgerEvent::wallet_created(&wallet.id));
        Ok(wallet)
    }

    pub fn wallet(&self, wallet_id: &str) -> LedgerResult<Wallet> {
        self.load_wallet(wallet_id)
    }

    /// `(amount, limit)` of a wallet.
    pub fn balance(&self, wallet_id: &str) -> LedgerResult<(Coins, Coins)> {
        let wallet = self.load_wallet(wallet_id)?;
        Ok((wallet.amount, wallet.limit))
    }

    /// Every wallet with its last known balance, in id order.
    pub fn wallets(&self) -> LedgerResult<Vec<WalletBalance>> {
        self.store
            .scan(WALLET_TABLE, &[Column::str(WALLET_TAG)])?
            .map(|row| -> LedgerResult<WalletBalance> { WalletBalance::from_row(&row?) })
            .collect()
    }

    // -- Balance changes ---------------------------------------------------

    /// Adds coins to a wallet. The spend limit is untouched.
    pub fn credit(&self, wallet_id: &str, business: &str, amount: Coins) -> LedgerResult<Wallet> {
        require_positive(amount)?;

        let _guard = self.write_guard.lock();
        let mut wallet = self.load_wallet(wallet_id)?;
        wallet.amount = add(wallet.amount, amount)?;

        self.save_wallet(&wallet)?;
        self.append_movement(Movement {
            time: self.clock.now_millis(),
            wallet_id: wallet.id.clone(),
            business: business.to_string(),
            amount,
            balance: wallet.amount,
            kind: MovementKind::Credit,
        })?;
        self.store.replace_row(WALLET_TABLE, &wallet.index_row())?;

        tracing::info!(
            wallet = %wallet.id,
            business,
            amount = %amount,
            balance = %wallet.amount,
            "wallet credited"
        );
        self.publish(LedgerEvent::balance_changed(
            &wallet.id,
            business,
            MovementKind::Credit,
            amount,
            wallet.amount,
        ));
        Ok(wallet)
    }

    /// Spends coins from a wallet.
    ///
    /// Both the balance and the spend limit drop by `amount`; the limit may go
    /// negative. Spent coins return to the global supply.
    pub fn debit(&self, wallet_id: &str, business: &str, amount: Coins) -> LedgerResult<Wallet> {
        require_positive(amount)?;

        let _guard = self.write_guard.lock();
        let mut wallet = self.load_wallet(wallet_id)?;
        if amount > wallet.amount {
            return Err(LedgerError::InsufficientFunds {
                wallet: wallet.id,
                balance: wallet.amount,
                requested: amount,
            });
        }
        wallet.amount = sub(wallet.amount, amount)?;
        wallet.limit = sub(wallet.limit, amount)?;
        let refilled = add(supply::read(&*self.store)?, amount)?;

        self.save_wallet(&wallet)?;
        self.append_movement(Movement {
            time: self.clock.now_millis(),
            wallet_id: wallet.id.clone(),
            business: business.to_string(),
            amount,
            balance: wallet.amount,
            kind: MovementKind::Debit,
        })?;
        self.store.replace_row(WALLET_TABLE, &wallet.index_row())?;
        supply::write(&*self.store, refilled)?;

        tracing::info!(
            wallet = %wallet.id,
            business,
            amount = %amount,
            balance = %wallet.amount,
            limit = %wallet.limit,
            "wallet debited"
        );
        self.publish(LedgerEvent::balance_changed(
            &wallet.id,
            business,
            MovementKind::Debit,
            amount,
            wallet.amount,
        ));
        Ok(wallet)
    }

    /// Moves coins between two wallets. Limits and the supply are untouched.
    ///
    /// The sender's movement is stamped `t` and the receiver's `t + 1`.
    pub fn transfer(&self, from_id: &str, to_id: &str, amount: Coins) -> LedgerResult<(Wallet, Wallet)> {
        if from_id == to_id {
            return Err(LedgerError::InvalidArgument(format!(
                "cannot transfer from {from_id} to itself"
            )));
        }
        require_positive(amount)?;

        let _guard = self.write_guard.lock();
        let mut sender = self.load_wallet(from_id)?;
        let mut receiver = self.load_wallet(to_id)?;
        if amount > sender.amount {
            return Err(LedgerError::InsufficientFunds {
                wallet: sender.id,
                balance: sender.amount,
                requested: amount,
            });
        }
        sender.amount = sub(sender.amount, amount)?;
        receiver.amount = add(receiver.amount, amount)?;

        self.save_wallet(&sender)?;
        self.save_wallet(&receiver)?;
        let sent = self.append_movement(Movement {
            time: self.clock.now_millis(),
            wallet_id: sender.id.clone(),
            business: receiver.id.clone(),
            amount,
            balance: sender.amount,
            kind: MovementKind::Debit,
        })?;
        self.append_movement(Movement {
            time: sent.time + 1,
            wallet_id: receiver.id.clone(),
            business: sender.id.clone(),
            amount,
            balance: receiver.amount,
            kind: MovementKind::Credit,
        })?;
        self.store.replace_row(WALLET_TABLE, &sender.index_row())?;
        self.store.replace_row(WALLET_TABLE, &receiver.index_row())?;

        tracing::info!(from = %sender.id, to = %receiver.id, amount = %amount, "transfer applied");
        self.publish(LedgerEvent::balance_changed(
            &sender.id,
            &receiver.id,
            MovementKind::Debit,
            amount,
            sender.amount,
        ));
        self.publish(LedgerEvent::balance_changed(
            &receiver.id,
            &sender.id,
            MovementKind::Credit,
            amount,
            receiver.amount,
        ));
        Ok((sender, receiver))
    }

    /// Restores every wallet's limit to its ceiling. Returns how many wallets
    /// changed.
    pub fn reset_limits(&self) -> LedgerResult<usize> {
        let _guard = self.write_guard.lock();
        let mut changed = 0;
        for entry in self.wallets()? {
            let mut wallet = self.load_wallet(&entry.wallet_id)?;
            if wallet.limit != wallet.limit_ceiling {
                wallet.limit = wallet.limit_ceiling;
                self.save_wallet(&wallet)?;
                changed += 1;
            }
        }
        tracing::info!(changed, "wallet limits reset");
        Ok(changed)
    }

    // -- Journal -----------------------------------------------------------

    /// Journal rows, optionally restricted to one wallet.
    pub fn movements(&self, wallet_id: Option<&str>) -> Movements<'_, S> {
        Movements::new(&*self.store, wallet_id)
    }

    // -- Coin supply -------------------------------------------------------

    pub fn total_coin(&self) -> LedgerResult<Coins> {
        supply::read(&*self.store)
    }

    /// Seeds the supply counter, overwriting whatever it held.
    pub fn init_total_coin(&self, amount: Coins) -> LedgerResult<()> {
        if amount.is_negative() {
            return Err(LedgerError::InvalidArgument(format!(
                "coin supply must not be negative, got {amount}"
            )));
        }
        let _guard = self.write_guard.lock();
        supply::write(&*self.store, amount)?;
        tracing::info!(total = %amount, "coin supply initialized");
        Ok(())
    }

    /// Adds to the supply. Returns the total before the change.
    pub fn credit_total_coin(&self, amount: Coins) -> LedgerResult<Coins> {
        require_positive(amount)?;
        let _guard = self.write_guard.lock();
        let previous = supply::read(&*self.store)?;
        supply::write(&*self.store, add(previous, amount)?)?;
        tracing::info!(previous = %previous, amount = %amount, "coin supply credited");
        Ok(previous)
    }

    /// Subtracts from the supply. Returns the total before the change.
    pub fn debit_total_coin(&self, amount: Coins) -> LedgerResult<Coins> {
        require_positive(amount)?;
        let _guard = self.write_guard.lock();
        let previous = supply::read(&*self.store)?;
        supply::write(&*self.store, sub(previous, amount)?)?;
        tracing::info!(previous = %previous, amount = %amount, "coin supply debited");
        Ok(previous)
    }

    // -- Internals ---------------------------------------------------------

    fn load_wallet(&self, wallet_id: &str) -> LedgerResult<Wallet> {
        if wallet_id == COIN_BALANCE_KEY {
            return Err(LedgerError::NotFound(wallet_id.to_string()));
        }
        match self.store.get(wallet_id)? {
            Some(bytes) => Wallet::from_bytes(wallet_id, &bytes),
            None => Err(LedgerError::NotFound(wallet_id.to_string())),
        }
    }

    fn save_wallet(&self, wallet: &Wallet) -> LedgerResult<()> {
        self.store.put(&wallet.id, &wallet.to_bytes()?)?;
        Ok(())
    }

    /// Appends a journal row, bumping the timestamp by a millisecond while
    /// the `(wallet, time)` key is taken.
    fn append_movement(&self, mut movement: Movement) -> LedgerResult<Movement> {
        for _ in 0..MAX_JOURNAL_KEY_RETRIES {
            match self.store.insert_row(MOVEMENT_TABLE, &movement.to_row()) {
                Ok(()) => return Ok(movement),
                Err(StoreError::RowExists(_)) => {
                    tracing::debug!(wallet = %movement.wallet_id, time = movement.time, "journal key taken, bumping");
                    movement.time += 1;
                }
                Err(e) => return Err(e.into()),
            }
        }
        Err(StoreError::RowExists(MOVEMENT_TABLE.to_string()).into())
    }

    fn publish(&self, event: LedgerEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }
}

fn add(a: Coins, b: Coins) -> LedgerResult<Coins> {
    a.checked_add(b).ok_or_else(|| {
        LedgerError::InvalidArgument(format!("{a} + {b} is out of range"))
    })
}

fn sub(a: Coins, b: Coins) -> LedgerResult<Coins> {
    a.checked_sub(b).ok_or_else(|| {
        LedgerError::InvalidArgument(format!("{a} - {b} is out of range"))
    })
}

fn require_positive(amount: Coins) -> LedgerResult<()> {
    if amount.is_positive() {
        Ok(())
    } else {
        Err(LedgerError::InvalidArgument(format!(
            "amount must be greater than zero, got {amount}"
        )))
    }
}
