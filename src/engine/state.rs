use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

use super::error::BalanceError;
use crate::Amount;
use crate::model::CurrencyCode;

/// Running balances per currency. Only currencies registered at creation
/// are tracked; the engine refuses deltas in any other currency.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Wallet {
    balances: BTreeMap<CurrencyCode, Amount>,
}

impl Wallet {
    /// A wallet holding zero of every given currency.
    pub fn new<'a>(currencies: impl IntoIterator<Item = &'a CurrencyCode>) -> Self {
        Self {
            balances: currencies
                .into_iter()
                .map(|c| (c.clone(), Amount::ZERO))
                .collect(),
        }
    }

    pub fn tracks(&self, currency: &CurrencyCode) -> bool {
        self.balances.contains_key(currency)
    }

    /// Balance of `currency`, zero if untracked.
    pub fn balance(&self, currency: &CurrencyCode) -> Amount {
        self.balances.get(currency).copied().unwrap_or_default()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&CurrencyCode, Amount)> + '_ {
        self.balances.iter().map(|(c, a)| (c, *a))
    }

    /// Add each signed delta in order, all or nothing. An untracked currency
    /// or an out of range balance leaves the wallet as it was.
    pub(crate) fn apply(
        &mut self,
        deltas: &[(&CurrencyCode, Amount)],
    ) -> Result<(), BalanceError> {
        let mut updated: Vec<(&CurrencyCode, Amount)> = Vec::with_capacity(deltas.len());
        for &(currency, delta) in deltas {
            // a conversion may name the same currency on both legs
            let current = match updated.iter().rev().find(|(c, _)| *c == currency) {
                Some(&(_, balance)) => balance,
                None => self
                    .balances
                    .get(currency)
                    .copied()
                    .ok_or_else(|| BalanceError::Untracked(currency.clone()))?,
            };
            let next = current
                .checked_add(delta)
                .ok_or_else(|| BalanceError::Overflow(currency.clone()))?;
            updated.push((currency, next));
        }
        for (currency, balance) in updated {
            if let Some(slot) = self.balances.get_mut(currency) {
                *slot = balance;
            }
        }
        Ok(())
    }
}

/// Wallet state right after one transaction was applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalletSnapshot {
    pub time: DateTime<Utc>,
    pub balances: Wallet,
}

impl WalletSnapshot {
    pub fn balance(&self, currency: &CurrencyCode) -> Amount {
        self.balances.balance(currency)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&CurrencyCode, Amount)> + '_ {
        self.balances.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn code(s: &str) -> CurrencyCode {
        CurrencyCode::new(s).unwrap()
    }

    #[test]
    fn wallet_starts_at_zero() {
        let cad = code("CAD");
        let btc = code("BTC");
        let wallet = Wallet::new([&cad, &btc]);
        assert_eq!(wallet.balance(&cad), Amount::ZERO);
        assert_eq!(wallet.balance(&btc), Amount::ZERO);
        assert_eq!(wallet.iter().count(), 2);
    }

    #[test]
    fn wallet_applies_signed_deltas() {
        let cad = code("CAD");
        let mut wallet = Wallet::new([&cad]);
        wallet.apply(&[(&cad, Amount::new(dec!(100)))]).unwrap();
        wallet.apply(&[(&cad, Amount::new(dec!(-30)))]).unwrap();
        assert_eq!(wallet.balance(&cad), Amount::new(dec!(70)));
    }

    #[test]
    fn wallet_refuses_untracked_currency() {
        let cad = code("CAD");
        let eth = code("ETH");
        let mut wallet = Wallet::new([&cad]);
        assert!(!wallet.tracks(&eth));
        let result = wallet.apply(&[
            (&cad, Amount::new(dec!(-1))),
            (&eth, Amount::new(dec!(1))),
        ]);
        assert_eq!(result, Err(BalanceError::Untracked(eth.clone())));
        assert_eq!(wallet.balance(&cad), Amount::ZERO);
        assert_eq!(wallet.balance(&eth), Amount::ZERO);
        assert_eq!(wallet.iter().count(), 1);
    }

    #[test]
    fn wallet_overflow_leaves_every_balance_untouched() {
        let cad = code("CAD");
        let btc = code("BTC");
        let mut wallet = Wallet::new([&cad, &btc]);
        wallet.apply(&[(&btc, Amount::new(Decimal::MAX))]).unwrap();

        let result = wallet.apply(&[
            (&cad, Amount::new(dec!(-5))),
            (&btc, Amount::new(dec!(1))),
        ]);

        assert_eq!(result, Err(BalanceError::Overflow(btc.clone())));
        assert_eq!(wallet.balance(&cad), Amount::ZERO);
        assert_eq!(wallet.balance(&btc), Amount::new(Decimal::MAX));
    }

    #[test]
    fn wallet_chains_deltas_on_the_same_currency() {
        let cad = code("CAD");
        let mut wallet = Wallet::new([&cad]);
        wallet
            .apply(&[(&cad, Amount::new(dec!(-4))), (&cad, Amount::new(dec!(3)))])
            .unwrap();
        assert_eq!(wallet.balance(&cad), Amount::new(dec!(-1)));
    }
}
