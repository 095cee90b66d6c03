use crate::storage::KeyValueStore;
use std::fmt;
use tracing::warn;

pub const BALANCE_KEY: &str = "mk_balance";
pub const DEFAULT_BALANCE: f64 = 100.0;

/// Integral amounts print without decimals, everything else with two.
pub fn format_money(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{value:.0}")
    } else {
        format!("{value:.2}")
    }
}

/// Interpret a stored balance. Missing, blank, non-numeric, non-finite and
/// negative values all fall back to `default`.
pub fn parse_balance(raw: Option<&str>, default: f64) -> f64 {
    let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return default;
    };
    match raw.parse::<f64>() {
        Ok(value) if value.is_finite() && value >= 0.0 => value,
        _ => {
            warn!(%raw, default, "ignoring unusable stored balance");
            default
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum WagerRejection {
    NotPositive,
    InsufficientBalance { wager: f64, balance: f64 },
}

impl fmt::Display for WagerRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WagerRejection::NotPositive => write!(f, "Enter a wager (>0)."),
            WagerRejection::InsufficientBalance { .. } => {
                write!(f, "Not enough balance.")
            }
        }
    }
}

/// Floors the requested wager and checks it against the balance.
pub fn validate_wager(raw: f64, balance: f64) -> Result<f64, WagerRejection> {
    if raw.is_nan() {
        return Err(WagerRejection::NotPositive);
    }
    let wager = raw.floor();
    if wager <= 0.0 {
        return Err(WagerRejection::NotPositive);
    }
    if wager > balance {
        return Err(WagerRejection::InsufficientBalance { wager, balance });
    }
    Ok(wager)
}

/// In-memory balance mirrored to a key-value store after every mutation.
/// Store failures are logged and otherwise ignored.
pub struct Ledger<S> {
    store: S,
    key: String,
    balance: f64,
}

impl<S: KeyValueStore> Ledger<S> {
    pub fn load(store: S, key: impl Into<String>, default: f64) -> Self {
        let key = key.into();
        let raw = match store.get(&key) {
            Ok(raw) => raw,
            Err(err) => {
                warn!(%key, ?err, "failed to read stored balance");
                None
            }
        };
        let balance = parse_balance(raw.as_deref(), default);
        Self {
            store,
            key,
            balance,
        }
    }

    pub fn balance(&self) -> f64 {
        self.balance
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Callers validate first; the balance is clamped at zero regardless.
    pub fn debit(&mut self, amount: f64) {
        self.balance = (self.balance - amount).max(0.0);
        self.persist();
    }

    pub fn credit(&mut self, amount: f64) {
        self.balance += amount;
        self.persist();
    }

    fn persist(&mut self) {
        let value = self.balance.to_string();
        if let Err(err) = self.store.set(&self.key, &value) {
            warn!(key = %self.key, %value, ?err, "failed to persist balance");
        }
    }
}
