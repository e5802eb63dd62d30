//! # Gateway: String-Argument Function Dispatch
//!
//! Merchant modules and the node's JSON-RPC endpoint do not call
//! [`WalletLedger`] methods directly. They name a function and pass string
//! arguments, and get JSON bytes back:
//!
//! ```text
//! invoke("putbalance", ["w1", "cineplanet", "50"])  →  {"code":0,"response":null}
//! query("getbalance", ["w1"])                       →  {"code":0,"balance":"50.000000","limit":"100.000000"}
//! ```
//!
//! Mutations go through [`Gateway::invoke`], reads through
//! [`Gateway::query`]. Calling a function through the wrong entry point is an
//! unknown function, the same as a typo.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::amount::Coins;
use crate::ledger::{LedgerError, NewWallet, WalletLedger};
use crate::store::StateStore;

// ---------------------------------------------------------------------------
// Error Type
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("unknown function: {0}")]
    UnknownFunction(String),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error("response encoding failed: {0}")]
    Encode(String),
}

// ---------------------------------------------------------------------------
// Functions
// ---------------------------------------------------------------------------

/// Which entry point a function belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunctionKind {
    Invoke,
    Query,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Function {
    CreateWallet,
    PutBalance,
    DebitBalance,
    Transfer,
    PutTotalCoin,
    DebitTotalCoin,
    GetBalance,
    GetTotalCoin,
    GetMovements,
    GetWallets,
    GetData,
}

impl Function {
    pub const ALL: [Function; 11] = [
        Function::CreateWallet,
        Function::PutBalance,
        Function::DebitBalance,
        Function::Transfer,
        Function::PutTotalCoin,
        Function::DebitTotalCoin,
        Function::GetBalance,
        Function::GetTotalCoin,
        Function::GetMovements,
        Function::GetWallets,
        Function::GetData,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Function::CreateWallet => "createwallet",
            Function::PutBalance => "putbalance",
            Function::DebitBalance => "debitbalance",
            Function::Transfer => "transfer",
            Function::PutTotalCoin => "puttotalcoin",
            Function::DebitTotalCoin => "debittotalcoin",
            Function::GetBalance => "getbalance",
            Function::GetTotalCoin => "gettotalcoin",
            Function::GetMovements => "getmovements",
            Function::GetWallets => "getwallets",
            Function::GetData => "getdata",
        }
    }

    pub fn kind(&self) -> FunctionKind {
        match self {
            Function::CreateWallet
            | Function::PutBalance
            | Function::DebitBalance
            | Function::Transfer
            | Function::PutTotalCoin
            | Function::DebitTotalCoin => FunctionKind::Invoke,
            Function::GetBalance
            | Function::GetTotalCoin
            | Function::GetMovements
            | Function::GetWallets
            | Function::GetData => FunctionKind::Query,
        }
    }
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Function {
    type Err = GatewayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // Legacy spellings from older merchant modules are still accepted.
        let canonical = match s {
            "getmovimientos" => "getmovements",
            "getdatos" => "getdata",
            other => other,
        };
        Function::ALL
            .iter()
            .copied()
            .find(|f| f.name() == canonical)
            .ok_or_else(|| GatewayError::UnknownFunction(s.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Response Payloads
// ---------------------------------------------------------------------------

/// `{"code":0,"response":...}`, returned by mutations and scalar queries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValueResponse {
    pub code: i32,
    pub response: Option<String>,
}

/// `{"code":0,"balance":"..","limit":".."}`, returned by `getbalance`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceResponse {
    pub code: i32,
    pub balance: Coins,
    pub limit: Coins,
}

fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, GatewayError> {
    serde_json::to_vec(value).map_err(|e| GatewayError::Encode(e.to_string()))
}

fn ok_null() -> Result<Vec<u8>, GatewayError> {
    encode(&ValueResponse {
        code: 0,
        response: None,
    })
}

fn ok_value(value: impl ToString) -> Result<Vec<u8>, GatewayError> {
    encode(&ValueResponse {
        code: 0,
        response: Some(value.to_string()),
    })
}

// ---------------------------------------------------------------------------
// LedgerClient
// ---------------------------------------------------------------------------

/// The calling convention merchant modules depend on.
pub trait LedgerClient: Send + Sync {
    fn invoke(&self, function: &str, args: &[String]) -> Result<Vec<u8>, GatewayError>;

    fn query(&self, function: &str, args: &[String]) -> Result<Vec<u8>, GatewayError>;
}

impl<T: LedgerClient + ?Sized> LedgerClient for Arc<T> {
    fn invoke(&self, function: &str, args: &[String]) -> Result<Vec<u8>, GatewayError> {
        (**self).invoke(function, args)
    }

    fn query(&self, function: &str, args: &[String]) -> Result<Vec<u8>, GatewayError> {
        (**self).query(function, args)
    }
}

// ---------------------------------------------------------------------------
// Gateway
// ---------------------------------------------------------------------------

/// In-process dispatcher over a shared [`WalletLedger`].
pub struct Gateway<S: StateStore> {
    ledger: Arc<WalletLedger<S>>,
}

impl<S: StateStore> Clone for Gateway<S> {
    fn clone(&self) -> Self {
        Self {
            ledger: Arc::clone(&self.ledger),
        }
    }
}

impl<S: StateStore> Gateway<S> {
    pub fn new(ledger: Arc<WalletLedger<S>>) -> Self {
        Self { ledger }
    }

    pub fn ledger(&self) -> &Arc<WalletLedger<S>> {
        &self.ledger
    }

    /// Routes to `invoke` or `query` by the function's kind.
    pub fn dispatch(&self, function: &str, args: &[String]) -> Result<Vec<u8>, GatewayError> {
        match function.parse::<Function>()?.kind() {
            FunctionKind::Invoke => self.run_invoke(function, args),
            FunctionKind::Query => self.run_query(function, args),
        }
    }

    fn run_invoke(&self, function: &str, args: &[String]) -> Result<Vec<u8>, GatewayError> {
        let f = function.parse::<Function>()?;
        if f.kind() != FunctionKind::Invoke {
            return Err(GatewayError::UnknownFunction(function.to_string()));
        }
        tracing::debug!(function = %f, args = args.len(), "gateway invoke");

        match f {
            Function::CreateWallet => {
                let (id, email, phone, document, limit) = match args {
                    [id, email, phone, document] => (id, email, phone, document, None),
                    [id, email, phone, document, limit] => {
                        (id, email, phone, document, Some(parse_amount(limit)?))
                    }
                    _ => return Err(arity(f, "4 or 5", args.len())),
                };
                let mut new = NewWallet::new(id.as_str()).contact(email.as_str(), phone.as_str(), document.as_str());
                if let Some(limit) = limit {
                    new = new.limit(limit);
                }
                self.ledger.create_wallet(new)?;
                ok_null()
            }
            Function::PutBalance => {
                let [wallet, business, amount] = exact::<3>(f, args)?;
                self.ledger.credit(wallet, business, parse_amount(amount)?)?;
                ok_null()
            }
            Function::DebitBalance => {
                let [wallet, business, amount] = exact::<3>(f, args)?;
                self.ledger.debit(wallet, business, parse_amount(amount)?)?;
                ok_null()
            }
            Function::Transfer => {
                let [from, to, amount] = exact::<3>(f, args)?;
                self.ledger.transfer(from, to, parse_amount(amount)?)?;
                ok_null()
            }
            Function::PutTotalCoin => {
                let [amount] = exact::<1>(f, args)?;
                let previous = self.ledger.credit_total_coin(parse_amount(amount)?)?;
                ok_value(previous)
            }
            Function::DebitTotalCoin => {
                let [amount] = exact::<1>(f, args)?;
                let previous = self.ledger.debit_total_coin(parse_amount(amount)?)?;
                ok_value(previous)
            }
            _ => Err(GatewayError::UnknownFunction(function.to_string())),
        }
    }

    fn run_query(&self, function: &str, args: &[String]) -> Result<Vec<u8>, GatewayError> {
        let f = function.parse::<Function>()?;
        if f.kind() != FunctionKind::Query {
            return Err(GatewayError::UnknownFunction(function.to_string()));
        }
        tracing::debug!(function = %f, args = args.len(), "gateway query");

        match f {
            Function::GetBalance => {
                let [wallet] = exact::<1>(f, args)?;
                let (balance, limit) = self.ledger.balance(wallet)?;
                encode(&BalanceResponse {
                    code: 0,
                    balance,
                    limit,
                })
            }
            Function::GetTotalCoin => {
                exact::<0>(f, args)?;
                ok_value(self.ledger.total_coin()?)
            }
            Function::GetMovements => {
                let wallet = match args {
                    [] => None,
                    [wallet] => Some(wallet.as_str()),
                    _ => return Err(arity(f, "0 or 1", args.len())),
                };
                let movements = self.ledger.movements(wallet).collect_vec()?;
                encode(&movements)
            }
            Function::GetWallets => {
                exact::<0>(f, args)?;
                encode(&self.ledger.wallets()?)
            }
            Function::GetData => {
                let [wallet] = exact::<1>(f, args)?;
                encode(&self.ledger.wallet(wallet)?)
            }
            _ => Err(GatewayError::UnknownFunction(function.to_string())),
        }
    }
}

impl<S: StateStore> LedgerClient for Gateway<S> {
    fn invoke(&self, function: &str, args: &[String]) -> Result<Vec<u8>, GatewayError> {
        self.run_invoke(function, args)
    }

    fn query(&self, function: &str, args: &[String]) -> Result<Vec<u8>, GatewayError> {
        self.run_query(function, args)
    }
}

// ---------------------------------------------------------------------------
// Argument Helpers
// ---------------------------------------------------------------------------

fn arity(f: Function, expected: &str, got: usize) -> GatewayError {
    GatewayError::Ledger(LedgerError::InvalidArgument(format!(
        "{f} expects {expected} arguments, got {got}"
    )))
}

fn exact<const N: usize>(f: Function, args: &[String]) -> Result<[&str; N], GatewayError> {
    if args.len() != N {
        return Err(arity(f, &N.to_string(), args.len()));
    }
    Ok(std::array::from_fn(|i| args[i].as_str()))
}

fn parse_amount(text: &str) -> Result<Coins, GatewayError> {
    Ok(text.parse::<Coins>().map_err(LedgerError::from)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn gateway() -> Gateway<MemoryStore> {
        Gateway::new(Arc::new(WalletLedger::new(Arc::new(MemoryStore::new()))))
    }

    fn args(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn json(bytes: Vec<u8>) -> serde_json::Value {
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn function_names_parse() {
        for f in Function::ALL {
            assert_eq!(f.name().parse::<Function>().unwrap(), f);
        }
        assert_eq!("getmovimientos".parse::<Function>().unwrap(), Function::GetMovements);
        assert_eq!("getdatos".parse::<Function>().unwrap(), Function::GetData);
        assert!(matches!(
            "mint".parse::<Function>(),
            Err(GatewayError::UnknownFunction(_))
        ));
    }

    #[test]
    fn create_and_query_balance() {
        let gw = gateway();
        let out = gw
            .invoke("createwallet", &args(&["w1", "a@b.c", "555", "DNI1"]))
            .unwrap();
        assert_eq!(json(out), serde_json::json!({"code": 0, "response": null}));

        gw.invoke("putbalance", &args(&["w1", "cineplanet", "50"])).unwrap();
        let out = gw.query("getbalance", &args(&["w1"])).unwrap();
        assert_eq!(
            json(out),
            serde_json::json!({"code": 0, "balance": "50.000000", "limit": "100.000000"})
        );
    }

    #[test]
    fn create_with_explicit_limit() {
        let gw = gateway();
        gw.invoke("createwallet", &args(&["w1", "", "", "", "25"])).unwrap();
        let data = json(gw.query("getdata", &args(&["w1"])).unwrap());
        assert_eq!(data["limit"], "25.000000");
        assert_eq!(data["limit_ceiling"], "25.000000");
    }

    #[test]
    fn supply_functions_return_previous_total() {
        let gw = gateway();
        let out = json(gw.invoke("puttotalcoin", &args(&["1000"])).unwrap());
        assert_eq!(out["response"], "0.000000");
        let out = json(gw.invoke("debittotalcoin", &args(&["400"])).unwrap());
        assert_eq!(out["response"], "1000.000000");
        let out = json(gw.query("gettotalcoin", &[]).unwrap());
        assert_eq!(out["response"], "600.000000");
    }

    #[test]
    fn wrong_entry_point_is_unknown() {
        let gw = gateway();
        assert!(matches!(
            gw.query("putbalance", &args(&["w1", "x", "1"])),
            Err(GatewayError::UnknownFunction(_))
        ));
        assert!(matches!(
            gw.invoke("getbalance", &args(&["w1"])),
            Err(GatewayError::UnknownFunction(_))
        ));
    }

    #[test]
    fn arity_and_decimal_validation() {
        let gw = gateway();
        gw.invoke("createwallet", &args(&["w1", "", "", ""])).unwrap();
        assert!(matches!(
            gw.invoke("putbalance", &args(&["w1", "x"])),
            Err(GatewayError::Ledger(LedgerError::InvalidArgument(_)))
        ));
        assert!(matches!(
            gw.invoke("putbalance", &args(&["w1", "x", "ten"])),
            Err(GatewayError::Ledger(LedgerError::InvalidArgument(_)))
        ));
        assert!(matches!(
            gw.invoke("createwallet", &args(&["w2"])),
            Err(GatewayError::Ledger(LedgerError::InvalidArgument(_)))
        ));
    }

    #[test]
    fn oversized_amounts_are_rejected_not_panicking() {
        let gw = gateway();
        gw.invoke("createwallet", &args(&["w1", "", "", ""])).unwrap();
        assert!(matches!(
            gw.invoke("putbalance", &args(&["w1", "m", "79228162514264337593543950335"])),
            Err(GatewayError::Ledger(LedgerError::InvalidArgument(_)))
        ));

        gw.invoke("putbalance", &args(&["w1", "m", "79228162514264337593543"])).unwrap();
        assert!(matches!(
            gw.invoke("putbalance", &args(&["w1", "m", "1"])),
            Err(GatewayError::Ledger(LedgerError::InvalidArgument(_)))
        ));
        let out = json(gw.query("getbalance", &args(&["w1"])).unwrap());
        assert_eq!(out["balance"], "79228162514264337593543.000000");
    }

    #[test]
    fn listings_are_json_arrays() {
        let gw = gateway();
        gw.invoke("createwallet", &args(&["w1", "", "", ""])).unwrap();
        gw.invoke("createwallet", &args(&["w2", "", "", ""])).unwrap();
        gw.invoke("transfer", &args(&["w1", "w2", "0.5"])).unwrap_err();
        gw.invoke("putbalance", &args(&["w1", "shop", "2"])).unwrap();
        gw.invoke("transfer", &args(&["w1", "w2", "0.5"])).unwrap();

        let wallets = json(gw.query("getwallets", &[]).unwrap());
        assert_eq!(
            wallets,
            serde_json::json!([
                {"walletid": "w1", "balance": "1.500000"},
                {"walletid": "w2", "balance": "0.500000"}
            ])
        );

        let moves = json(gw.query("getmovements", &args(&["w2"])).unwrap());
        let moves = moves.as_array().unwrap();
        assert_eq!(moves.len(), 2);
        assert_eq!(moves[1]["type"], "C");
        assert_eq!(moves[1]["business"], "w1");

        let all = json(gw.query("getmovements", &[]).unwrap());
        assert_eq!(all.as_array().unwrap().len(), 5);
    }

    #[test]
    fn dispatch_routes_by_kind() {
        let gw = gateway();
        gw.dispatch("createwallet", &args(&["w1", "", "", ""])).unwrap();
        let out = json(gw.dispatch("getbalance", &args(&["w1"])).unwrap());
        assert_eq!(out["balance"], "0.000000");
    }
}
