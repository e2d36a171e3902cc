//! Wallet ledger replay.
//!
//! The engine folds an ordered sequence of transactions into wallet state,
//! emitting an independent snapshot of every balance after each one.

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::model::{Currencies, CurrencyCode, Direction, Leg, Transaction};
use crate::Amount;

mod state;
pub use state::{Wallet, WalletSnapshot};

mod error;
pub use error::{CorruptTransactionError, EngineError};

/// The ledger replayer.
///
/// Owns the running wallet for the duration of one replay.
pub struct Engine {
    wallet: Wallet,
}

/// Public API
impl Engine {
    /// Start from a zero balance in every supported currency.
    pub fn new(currencies: &Currencies) -> Self {
        Self {
            wallet: Wallet::new(currencies.iter()),
        }
    }

    /// Current running balances.
    pub fn wallet(&self) -> &Wallet {
        &self.wallet
    }

    /// Copy of the current balances tagged with `time`.
    pub fn snapshot(&self, time: DateTime<Utc>) -> WalletSnapshot {
        WalletSnapshot {
            time,
            balances: self.wallet.clone(),
        }
    }

    /// Apply every transaction in order, returning one snapshot per transaction.
    /// Stops at the first corrupt transaction.
    pub fn replay<'a>(
        &mut self,
        transactions: impl IntoIterator<Item = &'a Transaction>,
    ) -> Result<Vec<WalletSnapshot>, EngineError> {
        let transactions = transactions.into_iter();
        let mut snapshots = Vec::with_capacity(transactions.size_hint().0);
        for tx in transactions {
            self.apply(tx)?;
            snapshots.push(self.snapshot(tx.created_at()));
        }
        Ok(snapshots)
    }

    /// Apply a single transaction on top of the current wallet.
    /// A failed transaction leaves the wallet untouched.
    pub fn apply(&mut self, tx: &Transaction) -> Result<(), EngineError> {
        let result = match tx {
            Transaction::Conversion { from, to, .. } => self.apply_conversion(tx, from, to),
            Transaction::Payment {
                currency,
                amount,
                direction,
                ..
            } => self.apply_payment(tx, currency, *amount, *direction),
        };
        Self::log_result(tx, &result);
        result
    }
}

/// Private API
impl Engine {
    /// Small helper to log `apply` results
    fn log_result(tx: &Transaction, result: &Result<(), EngineError>) {
        match result {
            Ok(()) => {
                debug!(
                    at = %tx.created_at(),
                    kind = %tx.kind(),
                    currency = %tx.currency(),
                    amount = %tx.amount(),
                    "transaction applied"
                );
            }
            Err(e) => {
                warn!(
                    at = %tx.created_at(),
                    kind = %tx.kind(),
                    reason = %e,
                    "transaction rejected"
                );
            }
        }
    }

    /// Apply a `Transaction::Conversion`: debit the `from` leg, then
    /// credit the `to` leg, both or neither.
    fn apply_conversion(
        &mut self,
        tx: &Transaction,
        from: &Leg,
        to: &Leg,
    ) -> Result<(), EngineError> {
        self.wallet
            .apply(&[(&from.currency, -from.amount), (&to.currency, to.amount)])
            .map_err(|e| e.at(tx.created_at()))
    }

    /// Apply a `Transaction::Payment`: credit or debit its currency.
    fn apply_payment(
        &mut self,
        tx: &Transaction,
        currency: &CurrencyCode,
        amount: Amount,
        direction: Direction,
    ) -> Result<(), EngineError> {
        let delta = match direction {
            Direction::Credit => amount,
            Direction::Debit => -amount,
        };
        self.wallet
            .apply(&[(currency, delta)])
            .map_err(|e| e.at(tx.created_at()))
    }
}

/// Replay `transactions` from an empty wallet over `currencies`.
pub fn replay(
    transactions: &[Transaction],
    currencies: &Currencies,
) -> Result<Vec<WalletSnapshot>, EngineError> {
    Engine::new(currencies).replay(transactions)
}
