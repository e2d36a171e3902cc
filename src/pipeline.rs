//! End-to-end computation: parse, sort, replay, sample.

use thiserror::Error;
use tracing::info;

use crate::engine::{EngineError, WalletSnapshot, replay};
use crate::model::{Currencies, InvalidRecord, RawTransaction, parse_all, sort_by_created_at};
use crate::rates::RateBook;
use crate::sampler::{NetWorthSample, SampleError, SamplerConfig, sample};

/// Wallet composition per transaction and the daily net worth derived from it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    pub snapshots: Vec<WalletSnapshot>,
    pub samples: Vec<NetWorthSample>,
}

#[derive(Debug, Error)]
pub enum ComputeError {
    #[error("malformed transaction: {0}")]
    Malformed(#[from] InvalidRecord),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("sampling failed: {0}")]
    Sample(#[from] SampleError),
}

/// Run the three passes in sequence, each consuming the previous one's output.
pub fn compute(
    raws: Vec<RawTransaction>,
    currencies: &Currencies,
    rates: &RateBook,
    config: SamplerConfig,
) -> Result<Report, ComputeError> {
    let mut transactions = parse_all(raws, currencies)?;
    sort_by_created_at(&mut transactions);

    let snapshots = replay(&transactions, currencies)?;
    let samples = sample(&snapshots, rates, config)?;

    info!(
        transactions = transactions.len(),
        days = samples.len(),
        base = %currencies.base(),
        "net worth computed"
    );

    Ok(Report { snapshots, samples })
}
