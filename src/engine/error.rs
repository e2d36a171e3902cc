//! Error types for ledger replay.

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::model::CurrencyCode;

/// Top-level error returned by [`Engine::apply`](super::Engine::apply).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error("corrupt transaction: {0}")]
    Corrupt(#[from] CorruptTransactionError),

    #[error("transaction at {at} takes the {currency} balance out of range")]
    Overflow {
        at: DateTime<Utc>,
        currency: CurrencyCode,
    },
}

/// A constructed transaction that breaks the model's invariants.
///
/// Parsing never produces one; it points at a transaction built by hand or
/// against a different set of currencies than the engine was created with.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CorruptTransactionError {
    #[error("transaction at {at} references untracked currency {currency}")]
    UntrackedCurrency {
        at: DateTime<Utc>,
        currency: CurrencyCode,
    },
}

/// Why a wallet refused a set of deltas.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub(crate) enum BalanceError {
    #[error("untracked currency {0}")]
    Untracked(CurrencyCode),

    #[error("{0} balance out of range")]
    Overflow(CurrencyCode),
}

impl BalanceError {
    /// Attach the instant of the transaction that caused it.
    pub(crate) fn at(self, at: DateTime<Utc>) -> EngineError {
        match self {
            BalanceError::Untracked(currency) => {
                CorruptTransactionError::UntrackedCurrency { at, currency }.into()
            }
            BalanceError::Overflow(currency) => EngineError::Overflow { at, currency },
        }
    }
}
