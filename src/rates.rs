//! Historical exchange rates and as-of lookups.
//!
//! Every series is keyed by one foreign currency. An observation's `rate` is
//! the number of base-currency units worth one unit of that foreign currency,
//! so valuing a balance is `amount × rate` whichever way round the feed
//! spells its pair.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use tracing::{debug, warn};

use crate::Amount;
use crate::model::{CurrencyCode, InvalidCurrencyCode};

/// Which side of the query instant an as-of lookup searches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum AsOf {
    /// First observation at or after the instant.
    #[default]
    AtOrAfter,
    /// Last observation at or before the instant.
    AtOrBefore,
}

/// What to do when an as-of lookup finds no observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum MissingRatePolicy {
    /// Value the balance at zero and report the currency as unvalued.
    #[default]
    Zero,
    /// Fail the computation with [`RateError::Unavailable`].
    Error,
    /// Use the closest observation on the other side of the instant.
    Nearest,
}

/// Two currencies as written in a feed, e.g. `CAD_BTC`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CurrencyPair {
    pub base: CurrencyCode,
    pub quote: CurrencyCode,
}

impl CurrencyPair {
    /// The side of the pair that is not `base`, if `base` is on exactly one side.
    pub fn foreign_to(&self, base: &CurrencyCode) -> Option<&CurrencyCode> {
        match (&self.base == base, &self.quote == base) {
            (true, false) => Some(&self.quote),
            (false, true) => Some(&self.base),
            _ => None,
        }
    }
}

impl FromStr for CurrencyPair {
    type Err = SeriesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (base, quote) = s
            .split_once('_')
            .ok_or_else(|| SeriesError::InvalidPair(s.to_string()))?;
        Ok(CurrencyPair {
            base: CurrencyCode::new(base)?,
            quote: CurrencyCode::new(quote)?,
        })
    }
}

impl fmt::Display for CurrencyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.base, self.quote)
    }
}

/// A rate record as it appears in the feed.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawExchangeRate {
    pub pair: String,
    pub mid_market_rate: Decimal,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExchangeRateObservation {
    pub pair: CurrencyPair,
    pub rate: Decimal,
    pub observed_at: DateTime<Utc>,
}

impl ExchangeRateObservation {
    pub fn parse(raw: RawExchangeRate) -> Result<Self, SeriesError> {
        let pair = raw.pair.parse()?;
        let observed_at = DateTime::parse_from_rfc3339(&raw.created_at)
            .map(|t| t.with_timezone(&Utc))
            .map_err(|e| SeriesError::InvalidTimestamp {
                value: raw.created_at.clone(),
                reason: e.to_string(),
            })?;
        Ok(Self {
            pair,
            rate: raw.mid_market_rate,
            observed_at,
        })
    }
}

/// Problems building a rate series.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SeriesError {
    #[error("rate series is empty")]
    Empty,

    #[error("invalid currency pair '{0}'")]
    InvalidPair(String),

    #[error(transparent)]
    InvalidCurrency(#[from] InvalidCurrencyCode),

    #[error("invalid timestamp '{value}': {reason}")]
    InvalidTimestamp { value: String, reason: String },

    #[error("pair {pair} does not involve base currency {base}")]
    PairWithoutBase { pair: String, base: CurrencyCode },

    #[error("observation {index}: pair {found} differs from series pair {expected}")]
    PairMismatch {
        index: usize,
        expected: String,
        found: String,
    },

    #[error("observation {index}: rate must be positive, got {rate}")]
    NonPositiveRate { index: usize, rate: Decimal },

    #[error("observation {index} is earlier than the one before it")]
    NonMonotonic { index: usize },
}

/// Failed valuation of a foreign balance.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RateError {
    #[error("no {currency} rate available as of {at}")]
    Unavailable {
        currency: CurrencyCode,
        at: DateTime<Utc>,
    },

    #[error("no rate series for {0}")]
    NoSeries(CurrencyCode),

    #[error("{currency} balance valued as of {at} is out of range")]
    Overflow {
        currency: CurrencyCode,
        at: DateTime<Utc>,
    },
}

/// Outcome of valuing one balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Valuation {
    Priced(Amount),
    /// No rate was found and the policy chose to count the balance as zero.
    Unpriced,
}

impl Valuation {
    pub fn value(&self) -> Amount {
        match self {
            Valuation::Priced(amount) => *amount,
            Valuation::Unpriced => Amount::ZERO,
        }
    }
}

/// Immutable, time-ordered rates of one foreign currency against the base.
#[derive(Debug, Clone)]
pub struct ExchangeRateSeries {
    currency: CurrencyCode,
    observations: Vec<ExchangeRateObservation>,
}

impl ExchangeRateSeries {
    /// Build a series from observations already ordered by `observed_at`.
    /// Equal instants are allowed and keep their input order.
    pub fn new(
        base: &CurrencyCode,
        observations: Vec<ExchangeRateObservation>,
    ) -> Result<Self, SeriesError> {
        let first = observations.first().ok_or(SeriesError::Empty)?;
        let pair = first.pair.clone();
        let currency = pair
            .foreign_to(base)
            .cloned()
            .ok_or_else(|| SeriesError::PairWithoutBase {
                pair: pair.to_string(),
                base: base.clone(),
            })?;

        for (index, obs) in observations.iter().enumerate() {
            if obs.pair != pair {
                return Err(SeriesError::PairMismatch {
                    index,
                    expected: pair.to_string(),
                    found: obs.pair.to_string(),
                });
            }
            if obs.rate <= Decimal::ZERO {
                return Err(SeriesError::NonPositiveRate {
                    index,
                    rate: obs.rate,
                });
            }
            if index > 0 && obs.observed_at < observations[index - 1].observed_at {
                return Err(SeriesError::NonMonotonic { index });
            }
        }

        Ok(Self {
            currency,
            observations,
        })
    }

    /// Like [`ExchangeRateSeries::new`], but stable-sorts the input first.
    pub fn from_unsorted(
        base: &CurrencyCode,
        mut observations: Vec<ExchangeRateObservation>,
    ) -> Result<Self, SeriesError> {
        let sorted = observations
            .windows(2)
            .all(|w| w[0].observed_at <= w[1].observed_at);
        if !sorted {
            warn!(
                observations = observations.len(),
                "rate observations out of order, sorting"
            );
            observations.sort_by_key(|o| o.observed_at);
        }
        Self::new(base, observations)
    }

    /// The foreign currency this series prices.
    pub fn currency(&self) -> &CurrencyCode {
        &self.currency
    }

    pub fn observations(&self) -> &[ExchangeRateObservation] {
        &self.observations
    }

    pub fn len(&self) -> usize {
        self.observations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    /// Binary-search the observation governing `at`.
    ///
    /// Within a run of equal instants, `AtOrAfter` picks the first and
    /// `AtOrBefore` the last.
    pub fn observation_at(
        &self,
        at: DateTime<Utc>,
        asof: AsOf,
    ) -> Option<&ExchangeRateObservation> {
        match asof {
            AsOf::AtOrAfter => {
                let idx = self.observations.partition_point(|o| o.observed_at < at);
                self.observations.get(idx)
            }
            AsOf::AtOrBefore => {
                let idx = self.observations.partition_point(|o| o.observed_at <= at);
                idx.checked_sub(1).map(|i| &self.observations[i])
            }
        }
    }

    /// Value `amount` at `at`: first observation at or after `at`, zero when
    /// the query is past the last observation.
    pub fn value_in_base(
        &self,
        amount: Amount,
        at: DateTime<Utc>,
    ) -> Result<Amount, RateError> {
        match self.observation_at(at, AsOf::AtOrAfter) {
            Some(obs) => self.convert(amount, obs, at),
            None => Ok(Amount::ZERO),
        }
    }

    /// Value `amount` at `at` under an explicit lookup direction and policy.
    pub fn valuate(
        &self,
        amount: Amount,
        at: DateTime<Utc>,
        asof: AsOf,
        policy: MissingRatePolicy,
    ) -> Result<Valuation, RateError> {
        if let Some(obs) = self.observation_at(at, asof) {
            return self.convert(amount, obs, at).map(Valuation::Priced);
        }

        match policy {
            MissingRatePolicy::Zero => Ok(Valuation::Unpriced),
            MissingRatePolicy::Error => Err(RateError::Unavailable {
                currency: self.currency.clone(),
                at,
            }),
            MissingRatePolicy::Nearest => {
                // a miss means every observation lies on the other side
                let nearest = match asof {
                    AsOf::AtOrAfter => self.observations.last(),
                    AsOf::AtOrBefore => self.observations.first(),
                };
                match nearest {
                    Some(obs) => self.convert(amount, obs, at).map(Valuation::Priced),
                    None => Ok(Valuation::Unpriced),
                }
            }
        }
    }

    fn convert(
        &self,
        amount: Amount,
        obs: &ExchangeRateObservation,
        at: DateTime<Utc>,
    ) -> Result<Amount, RateError> {
        amount
            .checked_scale(obs.rate)
            .ok_or_else(|| RateError::Overflow {
                currency: self.currency.clone(),
                at,
            })
    }
}

/// Rate series per foreign currency, all against one base currency.
#[derive(Debug, Clone)]
pub struct RateBook {
    base: CurrencyCode,
    series: BTreeMap<CurrencyCode, ExchangeRateSeries>,
}

impl RateBook {
    pub fn new(base: CurrencyCode) -> Self {
        Self {
            base,
            series: BTreeMap::new(),
        }
    }

    pub fn base(&self) -> &CurrencyCode {
        &self.base
    }

    /// Register a series, returning the one it replaces.
    pub fn insert(&mut self, series: ExchangeRateSeries) -> Option<ExchangeRateSeries> {
        debug!(
            currency = %series.currency(),
            observations = series.len(),
            "rate series registered"
        );
        self.series.insert(series.currency().clone(), series)
    }

    pub fn series(&self, currency: &CurrencyCode) -> Option<&ExchangeRateSeries> {
        self.series.get(currency)
    }

    /// Foreign currencies with a registered series.
    pub fn currencies(&self) -> impl Iterator<Item = &CurrencyCode> + '_ {
        self.series.keys()
    }

    /// Value with the default lookup: identity for the base currency,
    /// at-or-after lookup otherwise, zero when nothing is found.
    pub fn value_in_base(
        &self,
        currency: &CurrencyCode,
        amount: Amount,
        at: DateTime<Utc>,
    ) -> Result<Amount, RateError> {
        if currency == &self.base {
            return Ok(amount);
        }
        match self.series.get(currency) {
            Some(series) => series.value_in_base(amount, at),
            None => Ok(Amount::ZERO),
        }
    }

    /// Value one balance. The base currency and zero balances need no rate.
    pub fn valuate(
        &self,
        currency: &CurrencyCode,
        amount: Amount,
        at: DateTime<Utc>,
        asof: AsOf,
        policy: MissingRatePolicy,
    ) -> Result<Valuation, RateError> {
        if currency == &self.base {
            return Ok(Valuation::Priced(amount));
        }
        if amount.is_zero() {
            return Ok(Valuation::Priced(Amount::ZERO));
        }
        match self.series.get(currency) {
            Some(series) => series.valuate(amount, at, asof, policy),
            None if policy == MissingRatePolicy::Zero => Ok(Valuation::Unpriced),
            None => Err(RateError::NoSeries(currency.clone())),
        }
    }
}

impl Extend<ExchangeRateSeries> for RateBook {
    fn extend<I: IntoIterator<Item = ExchangeRateSeries>>(&mut self, iter: I) {
        for series in iter {
            self.insert(series);
        }
    }
}
