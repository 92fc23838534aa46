//! Receipt DTOs

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use domain_settlement::{ActiveReceipt, LedgerEntry, SettlementOutcome, SettlementType};

#[derive(Debug, Deserialize)]
pub struct SettleRequest {
    pub settlement_type: SettlementType,
}

#[derive(Debug, Serialize)]
pub struct ReceiptResponse {
    pub id: String,
    pub receipt_number: String,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub settlement_type: Option<SettlementType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub settled_date: Option<NaiveDate>,
    pub version: i64,
}

impl From<&ActiveReceipt> for ReceiptResponse {
    fn from(receipt: &ActiveReceipt) -> Self {
        Self {
            id: receipt.id.to_string(),
            receipt_number: receipt.receipt_number.clone(),
            status: receipt.status.to_string(),
            settlement_type: receipt.settlement_type,
            settled_date: receipt.settled_date,
            version: receipt.version,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SettleResponse {
    pub receipt: ReceiptResponse,
    pub entry: LedgerEntry,
}

impl From<SettlementOutcome> for SettleResponse {
    fn from(outcome: SettlementOutcome) -> Self {
        Self {
            receipt: ReceiptResponse::from(&outcome.receipt),
            entry: outcome.entry,
        }
    }
}
