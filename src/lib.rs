pub mod amount;
pub mod config;
pub mod csv;
pub mod engine;
pub mod feed;
pub mod model;
pub mod pipeline;
pub mod rates;
pub mod sampler;

pub use amount::Amount;
pub use engine::{Engine, WalletSnapshot};
pub use model::{Currencies, CurrencyCode, Transaction};
pub use pipeline::{Report, compute};
pub use rates::{AsOf, ExchangeRateSeries, MissingRatePolicy, RateBook};
pub use sampler::{NetWorthSample, SamplerConfig};
