use serde::Serialize;
use std::io;

use crate::engine::WalletSnapshot;
use crate::model::Currencies;
use crate::sampler::NetWorthSample;

#[derive(Debug, Serialize)]
struct SampleRow {
    date: String,
    value: String,
    unvalued: String,
}

/// Write the daily net worth series in csv format
pub fn write_samples<W: io::Write>(writer: W, samples: &[NetWorthSample]) -> csv::Result<()> {
    let mut writer = csv::Writer::from_writer(writer);

    for sample in samples {
        let row = SampleRow {
            date: sample.time.date_naive().to_string(),
            value: sample.value.to_string(),
            unvalued: sample
                .unvalued
                .iter()
                .map(|c| c.as_str())
                .collect::<Vec<_>>()
                .join(";"),
        };
        writer.serialize(&row)?;
    }

    writer.flush()?;
    Ok(())
}

/// Write one row per wallet snapshot, one column per supported currency
pub fn write_snapshots<W: io::Write>(
    writer: W,
    snapshots: &[WalletSnapshot],
    currencies: &Currencies,
) -> csv::Result<()> {
    let mut writer = csv::Writer::from_writer(writer);

    let mut header = vec!["time".to_string()];
    header.extend(currencies.iter().map(|c| c.to_string()));
    writer.write_record(&header)?;

    for snapshot in snapshots {
        let mut record = vec![snapshot.time.to_rfc3339()];
        record.extend(currencies.iter().map(|c| snapshot.balance(c).to_string()));
        writer.write_record(&record)?;
    }

    writer.flush()?;
    Ok(())
}
