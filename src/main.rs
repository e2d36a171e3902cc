use anyhow::{Context, Result};
use clap::Parser;
use std::io;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use worth_eng::config::Config;
use worth_eng::csv::{write_samples, write_snapshots};
use worth_eng::feed::{parse_rates, parse_transactions, read_feed};
use worth_eng::sampler::NetWorthSummary;
use worth_eng::{Currencies, RateBook, compute};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = Config::parse();

    if let Err(e) = run(config).await {
        error!("{e:#}");
        std::process::exit(1);
    }
}

async fn run(config: Config) -> Result<()> {
    for path in std::iter::once(&config.transactions).chain(&config.rates) {
        if path.extension().is_none_or(|ext| ext != "json") {
            warn!(path = %path.display(), "input file seems to not be a json file");
        }
    }

    // all feeds are fetched before the engine runs
    let ledger = tokio::spawn(read_feed(config.transactions.clone()));
    let rate_feeds: Vec<_> = config
        .rates
        .iter()
        .cloned()
        .map(|path| tokio::spawn(read_feed(path)))
        .collect();

    let mut rates = RateBook::new(config.base.clone());
    for (path, feed) in config.rates.iter().zip(rate_feeds) {
        let json = feed.await??;
        let Some(series) = parse_rates(&json, &config.base, config.strict_rates)
            .with_context(|| path.display().to_string())?
        else {
            warn!(path = %path.display(), "rate feed is empty, skipping it");
            continue;
        };
        if let Some(previous) = rates.insert(series) {
            warn!(
                currency = %previous.currency(),
                path = %path.display(),
                "rate series replaced by a later feed"
            );
        }
    }

    let tracked = if config.track.is_empty() {
        rates.currencies().cloned().collect()
    } else {
        config.track.clone()
    };
    let currencies = Currencies::new(config.base.clone(), tracked);
    for currency in currencies.tracked() {
        if rates.series(currency).is_none() {
            warn!(currency = %currency, "no rate feed for tracked currency");
        }
    }

    let ledger = ledger.await??;
    let raws = parse_transactions(&ledger)
        .with_context(|| config.transactions.display().to_string())?;
    let report = compute(raws, &currencies, &rates, config.sampler())?;

    if let Some(summary) = NetWorthSummary::from_samples(&report.samples) {
        info!(
            start = %summary.start.date_naive(),
            end = %summary.end.date_naive(),
            latest = %summary.latest,
            highest = %summary.highest,
            lowest = %summary.lowest,
            "net worth summary"
        );
    }

    let stdout = io::stdout();
    if config.snapshots {
        write_snapshots(stdout.lock(), &report.snapshots, &currencies)?;
    } else {
        write_samples(stdout.lock(), &report.samples)?;
    }

    Ok(())
}
