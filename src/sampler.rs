//! Daily net worth sampling.
//!
//! Days run from midnight of the first snapshot's day up to, but excluding,
//! the day of the last snapshot. Each day is valued from the snapshot and
//! the rates selected by one as-of direction.

use chrono::{DateTime, Duration, FixedOffset, NaiveTime, Offset, Utc};
use thiserror::Error;
use tracing::{debug, warn};

use crate::Amount;
use crate::engine::{Wallet, WalletSnapshot};
use crate::model::CurrencyCode;
use crate::rates::{AsOf, MissingRatePolicy, RateBook, RateError, Valuation};

/// Where the daily iteration stops.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum SampleEnd {
    /// Stop before midnight of the last transaction's day.
    #[default]
    ExcludeFinalDay,
    /// Stop before the last transaction's instant, which samples the
    /// final day's midnight unless the transaction falls exactly on it.
    LastTransaction,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SamplerConfig {
    /// Lookup direction for both snapshots and rates.
    pub asof: AsOf,
    pub missing_rate: MissingRatePolicy,
    /// Offset whose midnight starts each sampled day.
    pub offset: FixedOffset,
    pub end: SampleEnd,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            asof: AsOf::default(),
            missing_rate: MissingRatePolicy::default(),
            offset: Utc.fix(),
            end: SampleEnd::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetWorthSample {
    pub time: DateTime<FixedOffset>,
    pub value: Amount,
    /// Currencies held that day that had no rate and were counted as zero.
    pub unvalued: Vec<CurrencyCode>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SampleError {
    #[error("snapshot {index} is earlier than the one before it")]
    UnorderedSnapshots { index: usize },

    #[error(transparent)]
    Rate(#[from] RateError),

    #[error("net worth as of {at} is out of range")]
    Overflow { at: DateTime<Utc> },
}

/// Values wallet snapshots against a rate book.
pub struct Sampler<'a> {
    rates: &'a RateBook,
    config: SamplerConfig,
}

impl<'a> Sampler<'a> {
    pub fn new(rates: &'a RateBook, config: SamplerConfig) -> Self {
        Self { rates, config }
    }

    /// Base-currency value of `wallet` at `at`, plus the currencies left unvalued.
    pub fn value_wallet(
        &self,
        wallet: &Wallet,
        at: DateTime<Utc>,
    ) -> Result<(Amount, Vec<CurrencyCode>), SampleError> {
        let mut total = Amount::ZERO;
        let mut unvalued = Vec::new();
        for (currency, balance) in wallet.iter() {
            let valuation = self.rates.valuate(
                currency,
                balance,
                at,
                self.config.asof,
                self.config.missing_rate,
            )?;
            match valuation {
                Valuation::Priced(value) => {
                    total = total
                        .checked_add(value)
                        .ok_or(SampleError::Overflow { at })?;
                }
                Valuation::Unpriced => unvalued.push(currency.clone()),
            }
        }
        Ok((total, unvalued))
    }

    /// One sample per day. An empty ledger yields no samples.
    pub fn sample(
        &self,
        snapshots: &[WalletSnapshot],
    ) -> Result<Vec<NetWorthSample>, SampleError> {
        let (Some(first), Some(last)) = (snapshots.first(), snapshots.last()) else {
            return Ok(Vec::new());
        };
        let unordered =
            (1..snapshots.len()).find(|&i| snapshots[i].time < snapshots[i - 1].time);
        if let Some(index) = unordered {
            return Err(SampleError::UnorderedSnapshots { index });
        }

        let end = match self.config.end {
            SampleEnd::ExcludeFinalDay => {
                floor_to_day(last.time, self.config.offset).with_timezone(&Utc)
            }
            SampleEnd::LastTransaction => last.time,
        };
        let mut day = floor_to_day(first.time, self.config.offset);
        let mut samples = Vec::new();
        let mut unvalued_days = 0usize;

        while day.with_timezone(&Utc) < end {
            let at = day.with_timezone(&Utc);
            let (value, unvalued) = match snapshot_at(snapshots, at, self.config.asof) {
                Some(snapshot) => self.value_wallet(&snapshot.balances, at)?,
                // before the first transaction the wallet is empty
                None => (Amount::ZERO, Vec::new()),
            };
            if !unvalued.is_empty() {
                unvalued_days += 1;
            }
            samples.push(NetWorthSample {
                time: day,
                value,
                unvalued,
            });
            day += Duration::days(1);
        }

        if unvalued_days > 0 {
            warn!(
                days = unvalued_days,
                "some balances had no exchange rate and were valued at zero"
            );
        }
        debug!(days = samples.len(), "net worth sampled");

        Ok(samples)
    }
}

/// Sample `snapshots` against `rates`.
pub fn sample(
    snapshots: &[WalletSnapshot],
    rates: &RateBook,
    config: SamplerConfig,
) -> Result<Vec<NetWorthSample>, SampleError> {
    Sampler::new(rates, config).sample(snapshots)
}

/// Binary-search the snapshot governing `at`. Ties resolve like rate lookups:
/// first of an equal run for `AtOrAfter`, last for `AtOrBefore`.
pub fn snapshot_at(
    snapshots: &[WalletSnapshot],
    at: DateTime<Utc>,
    asof: AsOf,
) -> Option<&WalletSnapshot> {
    match asof {
        AsOf::AtOrAfter => {
            let idx = snapshots.partition_point(|s| s.time < at);
            snapshots.get(idx)
        }
        AsOf::AtOrBefore => {
            let idx = snapshots.partition_point(|s| s.time <= at);
            idx.checked_sub(1).map(|i| &snapshots[i])
        }
    }
}

/// Midnight of the calendar day containing `at`, in `offset`.
pub fn floor_to_day(at: DateTime<Utc>, offset: FixedOffset) -> DateTime<FixedOffset> {
    let midnight = at.with_timezone(&offset).date_naive().and_time(NaiveTime::MIN);
    // fixed offsets have no gaps or folds, so the shift is exact
    let utc = midnight - Duration::seconds(offset.local_minus_utc().into());
    DateTime::from_naive_utc_and_offset(utc, offset)
}

/// Headline figures of a sampled series.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetWorthSummary {
    pub start: DateTime<FixedOffset>,
    pub end: DateTime<FixedOffset>,
    pub latest: Amount,
    pub highest: Amount,
    pub lowest: Amount,
}

impl NetWorthSummary {
    pub fn from_samples(samples: &[NetWorthSample]) -> Option<Self> {
        let first = samples.first()?;
        let last = samples.last()?;
        let values = samples.iter().map(|s| s.value);
        Some(Self {
            start: first.time,
            end: last.time,
            latest: last.value,
            highest: values.clone().max()?,
            lowest: values.min()?,
        })
    }
}
