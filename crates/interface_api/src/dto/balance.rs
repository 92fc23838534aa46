//! Balance DTOs

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use domain_settlement::{BalanceSnapshot, ReceiptContribution};

/// Both ledgers as plain amounts; debits and charges count positive
#[derive(Debug, Serialize)]
pub struct BalancesResponse {
    pub cash_pln: Decimal,
    pub cash_usd: Decimal,
    pub card_pln: Decimal,
    pub computed_at: DateTime<Utc>,
}

impl From<BalanceSnapshot> for BalancesResponse {
    fn from(snapshot: BalanceSnapshot) -> Self {
        Self {
            cash_pln: snapshot.cash.pln.amount(),
            cash_usd: snapshot.cash.usd.amount(),
            card_pln: snapshot.card.amount(),
            computed_at: snapshot.computed_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ReceiptContributionResponse {
    pub receipt_id: String,
    pub receipt_number: String,
    pub cash_pln: Decimal,
    pub cash_usd: Decimal,
    pub card_pln: Decimal,
}

impl From<ReceiptContribution> for ReceiptContributionResponse {
    fn from(c: ReceiptContribution) -> Self {
        Self {
            receipt_id: c.receipt_id.to_string(),
            receipt_number: c.receipt_number,
            cash_pln: c.cash_pln.amount(),
            cash_usd: c.cash_usd.amount(),
            card_pln: c.card_pln.amount(),
        }
    }
}
