//! JSON feeds: the transaction history and one rate history per pair.

use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

use crate::model::{CurrencyCode, RawTransaction};
use crate::rates::{ExchangeRateObservation, ExchangeRateSeries, RawExchangeRate, SeriesError};

/// Errors that can occur when loading a feed
#[derive(Debug, Error)]
pub enum FeedError {
    #[error("{}: {source}", path.display())]
    Io { path: PathBuf, source: io::Error },

    #[error("invalid json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("rate {index}: {source}")]
    Rate { index: usize, source: SeriesError },

    #[error(transparent)]
    Series(#[from] SeriesError),
}

/// Read a whole feed file.
pub async fn read_feed(path: impl AsRef<Path>) -> Result<String, FeedError> {
    let path = path.as_ref();
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| FeedError::Io {
            path: path.to_path_buf(),
            source,
        })?;
    debug!(path = %path.display(), bytes = content.len(), "feed read");
    Ok(content)
}

/// Decode a transaction history. Records are validated later, against the
/// supported currencies.
pub fn parse_transactions(json: &str) -> Result<Vec<RawTransaction>, FeedError> {
    Ok(serde_json::from_str(json)?)
}

/// Decode a rate history into a series against `base`. With `strict`, the
/// feed must be non-empty and already ordered by time. Otherwise it is
/// sorted, and an empty feed yields `None`.
pub fn parse_rates(
    json: &str,
    base: &CurrencyCode,
    strict: bool,
) -> Result<Option<ExchangeRateSeries>, FeedError> {
    let raws: Vec<RawExchangeRate> = serde_json::from_str(json)?;
    if raws.is_empty() && !strict {
        debug!("empty rate feed");
        return Ok(None);
    }
    let observations = raws
        .into_iter()
        .enumerate()
        .map(|(index, raw)| {
            ExchangeRateObservation::parse(raw).map_err(|source| FeedError::Rate { index, source })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let series = if strict {
        ExchangeRateSeries::new(base, observations)?
    } else {
        ExchangeRateSeries::from_unsorted(base, observations)?
    };
    Ok(Some(series))
}
