//! Core domain types for the valuation engine.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::Amount;

/// Currency identifier, upper-cased on construction.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CurrencyCode(String);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid currency code '{0}'")]
pub struct InvalidCurrencyCode(pub String);

impl CurrencyCode {
    pub fn new(code: &str) -> Result<Self, InvalidCurrencyCode> {
        let trimmed = code.trim();
        if trimmed.is_empty() || !trimmed.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(InvalidCurrencyCode(code.to_string()));
        }
        Ok(CurrencyCode(trimmed.to_ascii_uppercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for CurrencyCode {
    type Err = InvalidCurrencyCode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CurrencyCode::new(s)
    }
}

impl fmt::Display for CurrencyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The set of currencies a computation knows about: one base currency that
/// every valuation is expressed in, plus the tracked foreign currencies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Currencies {
    base: CurrencyCode,
    tracked: Vec<CurrencyCode>,
}

impl Currencies {
    /// Duplicates and occurrences of the base currency in `tracked` are dropped.
    pub fn new(base: CurrencyCode, tracked: impl IntoIterator<Item = CurrencyCode>) -> Self {
        let mut unique: Vec<CurrencyCode> = Vec::new();
        for code in tracked {
            if code != base && !unique.contains(&code) {
                unique.push(code);
            }
        }
        Self {
            base,
            tracked: unique,
        }
    }

    pub fn base(&self) -> &CurrencyCode {
        &self.base
    }

    pub fn tracked(&self) -> &[CurrencyCode] {
        &self.tracked
    }

    pub fn is_base(&self, code: &CurrencyCode) -> bool {
        &self.base == code
    }

    pub fn contains(&self, code: &CurrencyCode) -> bool {
        self.is_base(code) || self.tracked.contains(code)
    }

    /// Base currency first, then tracked currencies in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &CurrencyCode> + '_ {
        std::iter::once(&self.base).chain(self.tracked.iter())
    }
}

/// Type tag of a ledger record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionKind {
    ExternalAccount,
    Peer,
    Conversion,
}

impl TransactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionKind::ExternalAccount => "external account",
            TransactionKind::Peer => "peer",
            TransactionKind::Conversion => "conversion",
        }
    }
}

impl FromStr for TransactionKind {
    type Err = MalformedTransactionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "external account" => Ok(TransactionKind::ExternalAccount),
            "peer" => Ok(TransactionKind::Peer),
            "conversion" => Ok(TransactionKind::Conversion),
            other => Err(MalformedTransactionError::UnrecognizedType(other.to_string())),
        }
    }
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Direction of a payment relative to the wallet holder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Credit,
    Debit,
}

impl FromStr for Direction {
    type Err = MalformedTransactionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "credit" => Ok(Direction::Credit),
            "debit" => Ok(Direction::Debit),
            other => Err(MalformedTransactionError::UnrecognizedDirection(
                other.to_string(),
            )),
        }
    }
}

/// Counterparty of a payment. Destination metadata is not kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentKind {
    ExternalAccount,
    Peer,
}

impl From<PaymentKind> for TransactionKind {
    fn from(value: PaymentKind) -> Self {
        match value {
            PaymentKind::ExternalAccount => TransactionKind::ExternalAccount,
            PaymentKind::Peer => TransactionKind::Peer,
        }
    }
}

/// One side of a conversion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Leg {
    pub currency: CurrencyCode,
    pub amount: Amount,
}

/// A validated ledger event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transaction {
    /// Move value between two currencies of the wallet.
    Conversion {
        created_at: DateTime<Utc>,
        from: Leg,
        to: Leg,
    },
    /// Credit or debit a single currency.
    Payment {
        created_at: DateTime<Utc>,
        kind: PaymentKind,
        currency: CurrencyCode,
        amount: Amount,
        direction: Direction,
    },
}

impl Transaction {
    pub fn created_at(&self) -> DateTime<Utc> {
        match self {
            Transaction::Conversion { created_at, .. } | Transaction::Payment { created_at, .. } => {
                *created_at
            }
        }
    }

    pub fn kind(&self) -> TransactionKind {
        match self {
            Transaction::Conversion { .. } => TransactionKind::Conversion,
            Transaction::Payment { kind, .. } => (*kind).into(),
        }
    }

    /// `None` exactly for conversions.
    pub fn direction(&self) -> Option<Direction> {
        match self {
            Transaction::Conversion { .. } => None,
            Transaction::Payment { direction, .. } => Some(*direction),
        }
    }

    /// Headline amount of the record; the debited leg for a conversion.
    pub fn amount(&self) -> Amount {
        match self {
            Transaction::Conversion { from, .. } => from.amount,
            Transaction::Payment { amount, .. } => *amount,
        }
    }

    /// Headline currency of the record; the debited leg for a conversion.
    pub fn currency(&self) -> &CurrencyCode {
        match self {
            Transaction::Conversion { from, .. } => &from.currency,
            Transaction::Payment { currency, .. } => currency,
        }
    }

    pub fn is_conversion(&self) -> bool {
        matches!(self, Transaction::Conversion { .. })
    }

    pub fn is_credit(&self) -> bool {
        self.direction() == Some(Direction::Credit)
    }

    pub fn is_debit(&self) -> bool {
        self.direction() == Some(Direction::Debit)
    }

    /// Validate a raw feed record against the supported currencies.
    pub fn parse(
        raw: RawTransaction,
        currencies: &Currencies,
    ) -> Result<Self, MalformedTransactionError> {
        let kind: TransactionKind = raw.kind.parse()?;
        let created_at = parse_timestamp(&raw.created_at)?;

        match kind {
            TransactionKind::Conversion => {
                if let Some(direction) = raw.direction {
                    return Err(MalformedTransactionError::UnexpectedDirection(direction));
                }
                let from = parse_leg(raw.from, "from", currencies)?;
                let to = parse_leg(raw.to, "to", currencies)?;
                Ok(Transaction::Conversion {
                    created_at,
                    from,
                    to,
                })
            }
            TransactionKind::ExternalAccount | TransactionKind::Peer => {
                let payment_kind = if kind == TransactionKind::Peer {
                    PaymentKind::Peer
                } else {
                    PaymentKind::ExternalAccount
                };
                let direction: Direction = raw
                    .direction
                    .ok_or(MalformedTransactionError::MissingField { kind, field: "direction" })?
                    .parse()?;
                let currency = raw
                    .currency
                    .ok_or(MalformedTransactionError::MissingField { kind, field: "currency" })?;
                let currency = supported(&currency, currencies)?;
                let amount = Amount::new(
                    raw.amount
                        .ok_or(MalformedTransactionError::MissingField { kind, field: "amount" })?,
                );
                if amount.is_negative() {
                    return Err(MalformedTransactionError::NegativeAmount(amount));
                }
                Ok(Transaction::Payment {
                    created_at,
                    kind: payment_kind,
                    currency,
                    amount,
                    direction,
                })
            }
        }
    }
}

/// Stable sort by creation instant. Records sharing an instant keep their
/// relative input order, which is the order their deltas are applied in.
pub fn sort_by_created_at(transactions: &mut [Transaction]) {
    transactions.sort_by_key(Transaction::created_at);
}

/// Parse a whole batch. The ledger is totally ordered, so the first
/// malformed record aborts the batch rather than being skipped.
pub fn parse_all(
    raws: impl IntoIterator<Item = RawTransaction>,
    currencies: &Currencies,
) -> Result<Vec<Transaction>, InvalidRecord> {
    raws.into_iter()
        .enumerate()
        .map(|(index, raw)| {
            Transaction::parse(raw, currencies).map_err(|source| InvalidRecord { index, source })
        })
        .collect()
}

/// A malformed record and its position in the batch.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("record {index}: {source}")]
pub struct InvalidRecord {
    pub index: usize,
    pub source: MalformedTransactionError,
}

/// A transaction record as it appears in the feed.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawTransaction {
    pub created_at: String,
    #[serde(default)]
    pub amount: Option<Decimal>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub direction: Option<String>,
    #[serde(default)]
    pub from: Option<RawLeg>,
    #[serde(default)]
    pub to: Option<RawLeg>,
}

/// `from`/`to` object of a raw record. Payments carry opaque destination
/// metadata here (e.g. `toAddress`), which is ignored.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawLeg {
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub amount: Option<Decimal>,
}

/// A raw record that cannot become a [`Transaction`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MalformedTransactionError {
    #[error("unrecognized transaction type '{0}'")]
    UnrecognizedType(String),

    #[error("unrecognized direction '{0}'")]
    UnrecognizedDirection(String),

    #[error("conversion must not carry a direction, got '{0}'")]
    UnexpectedDirection(String),

    #[error("{kind} missing {field}")]
    MissingField {
        kind: TransactionKind,
        field: &'static str,
    },

    #[error("invalid timestamp '{value}': {reason}")]
    InvalidTimestamp { value: String, reason: String },

    #[error(transparent)]
    InvalidCurrency(#[from] InvalidCurrencyCode),

    #[error("currency {0} is not supported")]
    UnsupportedCurrency(CurrencyCode),

    #[error("conversion {leg} amount must be positive, got {amount}")]
    NonPositiveAmount { leg: &'static str, amount: Amount },

    #[error("payment amount must not be negative, got {0}")]
    NegativeAmount(Amount),
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, MalformedTransactionError> {
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| MalformedTransactionError::InvalidTimestamp {
            value: value.to_string(),
            reason: e.to_string(),
        })
}

fn supported(
    code: &str,
    currencies: &Currencies,
) -> Result<CurrencyCode, MalformedTransactionError> {
    let code = CurrencyCode::new(code)?;
    if !currencies.contains(&code) {
        return Err(MalformedTransactionError::UnsupportedCurrency(code));
    }
    Ok(code)
}

fn parse_leg(
    leg: Option<RawLeg>,
    field: &'static str,
    currencies: &Currencies,
) -> Result<Leg, MalformedTransactionError> {
    use MalformedTransactionError::MissingField;
    let kind = TransactionKind::Conversion;

    let leg = leg.ok_or(MissingField { kind, field })?;
    let currency = leg.currency.ok_or(MissingField { kind, field })?;
    let amount = leg.amount.ok_or(MissingField { kind, field })?;

    let currency = supported(&currency, currencies)?;
    let amount = Amount::new(amount);
    if !amount.is_positive() {
        return Err(MalformedTransactionError::NonPositiveAmount { leg: field, amount });
    }
    Ok(Leg { currency, amount })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn code(s: &str) -> CurrencyCode {
        CurrencyCode::new(s).unwrap()
    }

    fn currencies() -> Currencies {
        Currencies::new(code("CAD"), [code("BTC"), code("ETH")])
    }

    fn payment_raw(kind: &str, direction: Option<&str>) -> RawTransaction {
        RawTransaction {
            created_at: "2018-01-01T10:00:00.000Z".to_string(),
            amount: Some(dec!(100)),
            currency: Some("CAD".to_string()),
            kind: kind.to_string(),
            direction: direction.map(str::to_string),
            from: None,
            to: None,
        }
    }

    fn conversion_raw(from: Option<RawLeg>, to: Option<RawLeg>) -> RawTransaction {
        RawTransaction {
            created_at: "2018-01-02T10:00:00Z".to_string(),
            amount: Some(dec!(50)),
            currency: Some("CAD".to_string()),
            kind: "conversion".to_string(),
            direction: None,
            from,
            to,
        }
    }

    fn leg(currency: &str, amount: Decimal) -> Option<RawLeg> {
        Some(RawLeg {
            currency: Some(currency.to_string()),
            amount: Some(amount),
        })
    }

    fn payment_at(rfc3339: &str, amount: Decimal) -> Transaction {
        Transaction::Payment {
            created_at: DateTime::parse_from_rfc3339(rfc3339).unwrap().with_timezone(&Utc),
            kind: PaymentKind::ExternalAccount,
            currency: code("CAD"),
            amount: Amount::new(amount),
            direction: Direction::Credit,
        }
    }

    #[test]
    fn currency_code_is_upper_cased() {
        assert_eq!(code(" btc ").as_str(), "BTC");
        assert!(CurrencyCode::new("").is_err());
        assert!(CurrencyCode::new("US-D").is_err());
    }

    #[test]
    fn currencies_drop_base_and_duplicates() {
        let set = Currencies::new(code("CAD"), [code("BTC"), code("CAD"), code("BTC")]);
        assert_eq!(set.tracked(), &[code("BTC")]);
        assert!(set.is_base(&code("CAD")));
        assert!(set.contains(&code("BTC")));
        assert!(!set.contains(&code("ETH")));
        let all: Vec<_> = set.iter().map(CurrencyCode::as_str).collect();
        assert_eq!(all, vec!["CAD", "BTC"]);
    }

    #[test]
    fn parse_external_account_credit() {
        let tx = Transaction::parse(payment_raw("external account", Some("credit")), &currencies())
            .unwrap();
        assert!(!tx.is_conversion());
        assert!(tx.is_credit());
        assert!(!tx.is_debit());
        assert_eq!(tx.kind(), TransactionKind::ExternalAccount);
        assert_eq!(tx.amount(), Amount::new(dec!(100)));
        assert_eq!(tx.currency(), &code("CAD"));
        assert_eq!(tx.created_at().to_rfc3339(), "2018-01-01T10:00:00+00:00");
    }

    #[test]
    fn parse_peer_debit() {
        let tx = Transaction::parse(payment_raw("peer", Some("debit")), &currencies()).unwrap();
        assert!(tx.is_debit());
        assert_eq!(tx.kind(), TransactionKind::Peer);
    }

    #[test]
    fn parse_conversion() {
        let raw = conversion_raw(leg("CAD", dec!(50)), leg("btc", dec!(0.001)));
        let tx = Transaction::parse(raw, &currencies()).unwrap();
        assert!(tx.is_conversion());
        assert_eq!(tx.direction(), None);
        assert!(!tx.is_credit() && !tx.is_debit());
        match tx {
            Transaction::Conversion { from, to, .. } => {
                assert_eq!(from.currency, code("CAD"));
                assert_eq!(to.currency, code("BTC"));
                assert_eq!(to.amount, Amount::new(dec!(0.001)));
            }
            _ => panic!("expected conversion"),
        }
    }

    #[test]
    fn parse_rejects_unknown_type() {
        let err = Transaction::parse(payment_raw("refund", Some("credit")), &currencies())
            .unwrap_err();
        assert_eq!(err, MalformedTransactionError::UnrecognizedType("refund".into()));
    }

    #[test]
    fn parse_rejects_payment_without_direction() {
        let err = Transaction::parse(payment_raw("peer", None), &currencies()).unwrap_err();
        assert!(matches!(
            err,
            MalformedTransactionError::MissingField {
                kind: TransactionKind::Peer,
                field: "direction"
            }
        ));
    }

    #[test]
    fn parse_rejects_unknown_direction() {
        let err = Transaction::parse(payment_raw("peer", Some("sideways")), &currencies())
            .unwrap_err();
        assert!(matches!(err, MalformedTransactionError::UnrecognizedDirection(_)));
    }

    #[test]
    fn parse_rejects_conversion_missing_leg() {
        let err = Transaction::parse(conversion_raw(leg("CAD", dec!(1)), None), &currencies())
            .unwrap_err();
        assert!(matches!(
            err,
            MalformedTransactionError::MissingField { field: "to", .. }
        ));

        // a payment-style destination is not a conversion leg
        let to_address = Some(RawLeg::default());
        let err = Transaction::parse(conversion_raw(leg("CAD", dec!(1)), to_address), &currencies())
            .unwrap_err();
        assert!(matches!(
            err,
            MalformedTransactionError::MissingField { field: "to", .. }
        ));
    }

    #[test]
    fn parse_rejects_conversion_with_direction() {
        let mut raw = conversion_raw(leg("CAD", dec!(1)), leg("BTC", dec!(1)));
        raw.direction = Some("credit".into());
        let err = Transaction::parse(raw, &currencies()).unwrap_err();
        assert!(matches!(err, MalformedTransactionError::UnexpectedDirection(_)));
    }

    #[test]
    fn parse_rejects_non_positive_leg() {
        let raw = conversion_raw(leg("CAD", dec!(0)), leg("BTC", dec!(1)));
        let err = Transaction::parse(raw, &currencies()).unwrap_err();
        assert!(matches!(
            err,
            MalformedTransactionError::NonPositiveAmount { leg: "from", .. }
        ));
    }

    #[test]
    fn parse_rejects_negative_payment() {
        let mut raw = payment_raw("peer", Some("credit"));
        raw.amount = Some(dec!(-1));
        let err = Transaction::parse(raw, &currencies()).unwrap_err();
        assert!(matches!(err, MalformedTransactionError::NegativeAmount(_)));
    }

    #[test]
    fn parse_accepts_zero_payment() {
        let mut raw = payment_raw("peer", Some("credit"));
        raw.amount = Some(dec!(0));
        assert!(Transaction::parse(raw, &currencies()).is_ok());
    }

    #[test]
    fn parse_rejects_unsupported_currency() {
        let raw = conversion_raw(leg("CAD", dec!(1)), leg("DOGE", dec!(1)));
        let err = Transaction::parse(raw, &currencies()).unwrap_err();
        assert_eq!(err, MalformedTransactionError::UnsupportedCurrency(code("DOGE")));
    }

    #[test]
    fn parse_rejects_bad_timestamp() {
        let mut raw = payment_raw("peer", Some("credit"));
        raw.created_at = "yesterday".into();
        let err = Transaction::parse(raw, &currencies()).unwrap_err();
        assert!(matches!(err, MalformedTransactionError::InvalidTimestamp { .. }));
    }

    #[test]
    fn raw_record_deserializes_from_feed_shape() {
        let json = r#"{
            "createdAt": "2018-01-03T12:00:00.000Z",
            "amount": 20.5,
            "currency": "CAD",
            "type": "peer",
            "direction": "debit",
            "to": { "toAddress": "someone@example.com" }
        }"#;
        let raw: RawTransaction = serde_json::from_str(json).unwrap();
        assert_eq!(raw.amount, Some(dec!(20.5)));
        let tx = Transaction::parse(raw, &currencies()).unwrap();
        assert!(tx.is_debit());
    }

    #[test]
    fn parse_all_reports_first_bad_record() {
        let raws = vec![
            payment_raw("peer", Some("credit")),
            payment_raw("gift", Some("credit")),
            payment_raw("peer", None),
        ];
        let err = parse_all(raws, &currencies()).unwrap_err();
        assert_eq!(err.index, 1);
        assert!(matches!(err.source, MalformedTransactionError::UnrecognizedType(_)));
    }

    #[test]
    fn parse_all_keeps_input_order() {
        let raws = vec![
            payment_raw("peer", Some("credit")),
            payment_raw("external account", Some("debit")),
        ];
        let txs = parse_all(raws, &currencies()).unwrap();
        assert!(txs[0].is_credit());
        assert!(txs[1].is_debit());
    }

    #[test]
    fn sort_is_stable_for_equal_instants() {
        let mut txs = vec![
            payment_at("2018-01-02T00:00:00Z", dec!(3)),
            payment_at("2018-01-01T00:00:00Z", dec!(1)),
            payment_at("2018-01-02T00:00:00Z", dec!(4)),
            payment_at("2018-01-01T00:00:00Z", dec!(2)),
        ];
        sort_by_created_at(&mut txs);
        let amounts: Vec<_> = txs.iter().map(|t| t.amount().to_string()).collect();
        assert_eq!(amounts, vec!["1", "2", "3", "4"]);
    }
}
