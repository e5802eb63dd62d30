//! The global coin-supply counter, a decimal string at `coinBalance`.

use crate::amount::Coins;
use crate::config::COIN_BALANCE_KEY;
use crate::store::StateStore;

use super::error::{LedgerError, LedgerResult};

/// Current total, zero if the counter was never seeded.
pub(crate) fn read<S: StateStore + ?Sized>(store: &S) -> LedgerResult<Coins> {
    let Some(bytes) = store.get(COIN_BALANCE_KEY)? else {
        return Ok(Coins::ZERO);
    };
    let corrupt = |reason: String| LedgerError::Corrupt {
        key: COIN_BALANCE_KEY.to_string(),
        reason,
    };
    let text = std::str::from_utf8(&bytes).map_err(|e| corrupt(e.to_string()))?;
    text.parse::<Coins>().map_err(|e| corrupt(e.to_string()))
}

pub(crate) fn write<S: StateStore + ?Sized>(store: &S, total: Coins) -> LedgerResult<()> {
    store.put(COIN_BALANCE_KEY, total.to_string().as_bytes())?;
    Ok(())
}
