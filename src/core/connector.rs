//! Capability contracts implemented by provider adapters.
//!
//! An adapter implements only the traits its upstream supports. Callers hold
//! trait objects, so a new asset class plugs in without touching them.

use super::error::Result;
use super::model::{CurrencyCode, MarketData, NormalizedBalance, NormalizedTransaction};
use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;

#[async_trait]
pub trait Connector: Send + Sync {
    /// Short provider tag, recorded on cache entries.
    fn name(&self) -> &str;

    /// Liveness probe. Any network or auth failure yields `false`.
    async fn test_connection(&self) -> bool;
}

#[async_trait]
pub trait MarketDataConnector: Connector {
    async fn fetch_price(&self, symbol: &str, currency: &CurrencyCode) -> Result<MarketData>;
}

#[async_trait]
pub trait BankingConnector: Connector {
    async fn fetch_balances(&self) -> Result<Vec<NormalizedBalance>>;

    async fn fetch_transactions(
        &self,
        account_id: &str,
        from_date: Option<NaiveDate>,
    ) -> Result<Vec<NormalizedTransaction>>;
}

#[async_trait]
pub trait FxConnector: Connector {
    async fn fetch_rate(&self, base: &CurrencyCode, target: &CurrencyCode) -> Result<Decimal>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::PriceError;
    use rust_decimal_macros::dec;
    use std::sync::Arc;

    struct StaticBank {
        balances: Vec<NormalizedBalance>,
        transactions: Vec<NormalizedTransaction>,
    }

    #[async_trait]
    impl Connector for StaticBank {
        fn name(&self) -> &str {
            "static-bank"
        }

        async fn test_connection(&self) -> bool {
            true
        }
    }

    #[async_trait]
    impl BankingConnector for StaticBank {
        async fn fetch_balances(&self) -> Result<Vec<NormalizedBalance>> {
            Ok(self.balances.clone())
        }

        async fn fetch_transactions(
            &self,
            account_id: &str,
            from_date: Option<NaiveDate>,
        ) -> Result<Vec<NormalizedTransaction>> {
            if account_id != "acc-1" {
                return Err(PriceError::SymbolNotFound(account_id.to_string()));
            }
            Ok(self
                .transactions
                .iter()
                .filter(|t| from_date.is_none_or(|from| t.date >= from))
                .cloned()
                .collect())
        }
    }

    fn transaction(id: &str, date: NaiveDate, amount: Decimal) -> NormalizedTransaction {
        NormalizedTransaction {
            external_id: id.to_string(),
            date,
            description: format!("Transaction {id}"),
            amount,
            currency: CurrencyCode::new("EUR"),
            category: None,
            merchant: Some("Bakery".to_string()),
        }
    }

    #[tokio::test]
    async fn test_banking_connector_as_trait_object() {
        let jan = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();
        let feb = NaiveDate::from_ymd_opt(2024, 2, 15).unwrap();
        let bank: Arc<dyn BankingConnector> = Arc::new(StaticBank {
            balances: vec![NormalizedBalance {
                external_id: "acc-1".to_string(),
                name: "Checking".to_string(),
                balance: dec!(1234.56),
                currency: CurrencyCode::new("EUR"),
                account_type: "checking".to_string(),
            }],
            transactions: vec![transaction("t1", jan, dec!(-3.5)), transaction("t2", feb, dec!(-4))],
        });

        assert!(bank.test_connection().await);
        assert_eq!(bank.name(), "static-bank");

        let balances = bank.fetch_balances().await.unwrap();
        assert_eq!(balances.len(), 1);
        assert_eq!(balances[0].balance, dec!(1234.56));

        let all = bank.fetch_transactions("acc-1", None).await.unwrap();
        assert_eq!(all.len(), 2);

        let since_feb = bank.fetch_transactions("acc-1", Some(feb)).await.unwrap();
        assert_eq!(since_feb.len(), 1);
        assert_eq!(since_feb[0].external_id, "t2");

        assert!(bank.fetch_transactions("acc-2", None).await.is_err());
    }

    #[test]
    fn test_balance_serializes_type_field() {
        let balance = NormalizedBalance {
            external_id: "acc-1".to_string(),
            name: "Savings".to_string(),
            balance: dec!(10),
            currency: CurrencyCode::new("usd"),
            account_type: "savings".to_string(),
        };
        let json = serde_json::to_value(&balance).unwrap();
        assert_eq!(json["externalId"], "acc-1");
        assert_eq!(json["type"], "savings");
        assert_eq!(json["currency"], "USD");
    }
}
