//! Ledger DTOs

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use domain_settlement::{BackwardStep, LedgerKind, NewLedgerEntry, ReversalOutcome};

fn non_negative(value: &Decimal) -> Result<(), ValidationError> {
    if value.is_sign_negative() {
        return Err(ValidationError::new("non_negative"));
    }
    Ok(())
}

/// Body of a manual payment or charge
#[derive(Debug, Deserialize, Validate)]
pub struct ManualEntryRequest {
    #[validate(custom(function = "non_negative", message = "Amount cannot be negative"))]
    pub amount_pln: Decimal,
    /// Cash ledger only
    #[serde(default)]
    #[validate(custom(function = "non_negative", message = "Amount cannot be negative"))]
    pub amount_usd: Decimal,
    /// Defaults to today
    pub transaction_date: Option<NaiveDate>,
    #[serde(default)]
    #[validate(length(max = 500, message = "Description is limited to 500 characters"))]
    pub description: String,
}

impl ManualEntryRequest {
    pub fn into_entry(self, ledger: LedgerKind, operator: Option<String>) -> NewLedgerEntry {
        let mut entry = match ledger {
            LedgerKind::Cash => NewLedgerEntry::cash(self.amount_pln, self.amount_usd, self.description),
            LedgerKind::Card => {
                let mut entry = NewLedgerEntry::card(self.amount_pln, self.description);
                // Left for the domain to reject
                entry.amount_usd = self.amount_usd;
                entry
            }
        };
        if let Some(date) = self.transaction_date {
            entry = entry.on(date);
        }
        entry.created_by = operator;
        entry
    }
}

/// Result of a reversal, with ids rendered for the UI
#[derive(Debug, Serialize)]
pub struct ReversalResponse {
    pub reversed: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub receipt_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub receipt_status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub step: Option<BackwardStep>,
    pub orders_reset: u64,
}

impl From<ReversalOutcome> for ReversalResponse {
    fn from(outcome: ReversalOutcome) -> Self {
        Self {
            reversed: outcome.reversed.iter().map(ToString::to_string).collect(),
            receipt_id: outcome.receipt.as_ref().map(|r| r.id.to_string()),
            receipt_status: outcome.receipt.as_ref().map(|r| r.status.to_string()),
            step: outcome.step,
            orders_reset: outcome.orders_reset,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_negative_amount_fails_validation() {
        let request: ManualEntryRequest =
            serde_json::from_str(r#"{"amount_pln": "-5", "description": "fee"}"#).unwrap();
        assert!(request.validate().is_err());
    }

    #[test]
    fn test_cash_entry_keeps_usd_and_operator() {
        let request: ManualEntryRequest = serde_json::from_str(
            r#"{"amount_pln": "10", "amount_usd": "2.5", "transaction_date": "2024-04-15", "description": "fuel"}"#,
        )
        .unwrap();
        request.validate().unwrap();

        let entry = request.into_entry(LedgerKind::Cash, Some("olena".to_string()));
        assert_eq!(entry.amount_usd, dec!(2.5));
        assert_eq!(entry.created_by.as_deref(), Some("olena"));
        assert_eq!(entry.transaction_date, NaiveDate::from_ymd_opt(2024, 4, 15).unwrap());
    }
}
