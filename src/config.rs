//! Command line configuration.

use chrono::FixedOffset;
use clap::Parser;
use std::path::PathBuf;

use crate::model::CurrencyCode;
use crate::rates::{AsOf, MissingRatePolicy};
use crate::sampler::{SampleEnd, SamplerConfig};

#[derive(Debug, Parser)]
#[command(name = "worth-eng")]
#[command(about = "Daily net worth of a multi-currency wallet from its transaction history")]
pub struct Config {
    /// Transaction history (JSON array)
    pub transactions: PathBuf,

    /// Rate history of one currency pair (JSON array); repeat per pair
    #[arg(short, long = "rates", value_name = "PATH")]
    pub rates: Vec<PathBuf>,

    /// Currency every valuation is expressed in
    #[arg(long, default_value = "CAD")]
    pub base: CurrencyCode,

    /// Foreign currencies to track; defaults to those of the rate feeds
    #[arg(long, value_delimiter = ',', value_name = "CODE")]
    pub track: Vec<CurrencyCode>,

    /// Side of each sampled day searched for snapshots and rates
    #[arg(long, value_enum, default_value_t)]
    pub asof: AsOf,

    /// Valuation of a balance whose rate lookup finds nothing
    #[arg(long, value_enum, default_value_t)]
    pub missing_rate: MissingRatePolicy,

    /// Last sampled day
    #[arg(long, value_enum, default_value_t)]
    pub sample_end: SampleEnd,

    /// UTC offset defining calendar days, e.g. -05:00
    #[arg(
        long,
        default_value = "+00:00",
        allow_hyphen_values = true,
        value_parser = parse_offset
    )]
    pub utc_offset: FixedOffset,

    /// Reject rate feeds that are not ordered by time instead of sorting them
    #[arg(long)]
    pub strict_rates: bool,

    /// Print the wallet composition after every transaction instead of daily net worth
    #[arg(long)]
    pub snapshots: bool,
}

impl Config {
    pub fn sampler(&self) -> SamplerConfig {
        SamplerConfig {
            asof: self.asof,
            missing_rate: self.missing_rate,
            offset: self.utc_offset,
            end: self.sample_end,
        }
    }
}

/// Parse `+HH:MM` / `-HH:MM`.
fn parse_offset(s: &str) -> Result<FixedOffset, String> {
    let invalid = || format!("invalid UTC offset '{s}', expected +HH:MM or -HH:MM");
    let (sign, rest) = match s.as_bytes().first() {
        Some(b'+') => (1, &s[1..]),
        Some(b'-') => (-1, &s[1..]),
        _ => return Err(invalid()),
    };
    let (hours, minutes) = rest.split_once(':').ok_or_else(invalid)?;
    let hours: i32 = hours.parse().map_err(|_| invalid())?;
    let minutes: i32 = minutes.parse().map_err(|_| invalid())?;
    if !(0..24).contains(&hours) || !(0..60).contains(&minutes) {
        return Err(invalid());
    }
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60)).ok_or_else(invalid)
}
