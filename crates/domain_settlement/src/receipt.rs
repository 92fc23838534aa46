//! Delivery receipts

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use core_kernel::{CoreError, Money, ReceiptId};

use crate::ledger::LedgerKind;

/// Receipt status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReceiptStatus {
    /// Being assembled, outside reconciliation
    Draft,
    /// Checked and accepted, not yet submitted for settlement
    Approved,
    /// Submitted; counted in balances
    SentForSettlement,
    /// Settled through the cash or card ledger
    Settled,
}

impl ReceiptStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReceiptStatus::Draft => "draft",
            ReceiptStatus::Approved => "approved",
            ReceiptStatus::SentForSettlement => "sent_for_settlement",
            ReceiptStatus::Settled => "settled",
        }
    }
}

impl fmt::Display for ReceiptStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReceiptStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(ReceiptStatus::Draft),
            "approved" => Ok(ReceiptStatus::Approved),
            "sent_for_settlement" => Ok(ReceiptStatus::SentForSettlement),
            "settled" => Ok(ReceiptStatus::Settled),
            other => Err(CoreError::validation(format!("unknown receipt status '{}'", other))),
        }
    }
}

/// How a settled receipt was paid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SettlementType {
    Cash,
    Card,
}

impl SettlementType {
    /// The ledger that records this kind of settlement
    pub fn ledger(&self) -> LedgerKind {
        match self {
            SettlementType::Cash => LedgerKind::Cash,
            SettlementType::Card => LedgerKind::Card,
        }
    }

    pub fn as_str(&self) -> &'static str {
        self.ledger().as_str()
    }
}

impl From<LedgerKind> for SettlementType {
    fn from(kind: LedgerKind) -> Self {
        match kind {
            LedgerKind::Cash => SettlementType::Cash,
            LedgerKind::Card => SettlementType::Card,
        }
    }
}

impl FromStr for SettlementType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<LedgerKind>().map(SettlementType::from)
    }
}

/// A delivery receipt taking part in reconciliation
///
/// Null numeric columns are read as zero, so costs are plain decimals here.
/// `version` is bumped by the store on every successful update and is used
/// for compare-and-swap status writes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveReceipt {
    pub id: ReceiptId,
    pub receipt_number: String,
    pub status: ReceiptStatus,
    pub receipt_cost_pln: Decimal,
    pub cash_on_delivery_pln: Decimal,
    pub transport_cost_usd: Decimal,
    /// Date the receipt was sent for settlement
    pub settlement_date: Option<NaiveDate>,
    /// Date the receipt was settled
    pub settled_date: Option<NaiveDate>,
    pub settlement_type: Option<SettlementType>,
    pub version: i64,
    pub updated_at: DateTime<Utc>,
}

impl ActiveReceipt {
    /// Creates a receipt with zero costs
    pub fn new(receipt_number: impl Into<String>, status: ReceiptStatus) -> Self {
        Self {
            id: ReceiptId::new(),
            receipt_number: receipt_number.into(),
            status,
            receipt_cost_pln: Decimal::ZERO,
            cash_on_delivery_pln: Decimal::ZERO,
            transport_cost_usd: Decimal::ZERO,
            settlement_date: None,
            settled_date: None,
            settlement_type: None,
            version: 0,
            updated_at: Utc::now(),
        }
    }

    /// Sets the receipt's cost fields
    pub fn with_costs(
        mut self,
        receipt_cost_pln: Decimal,
        cash_on_delivery_pln: Decimal,
        transport_cost_usd: Decimal,
    ) -> Self {
        self.receipt_cost_pln = receipt_cost_pln;
        self.cash_on_delivery_pln = cash_on_delivery_pln;
        self.transport_cost_usd = transport_cost_usd;
        self
    }

    /// PLN owed on the cash ledger: receipt cost plus cash-on-delivery
    pub fn cash_total_pln(&self) -> Money {
        Money::pln(self.receipt_cost_pln + self.cash_on_delivery_pln)
    }

    /// USD transport cost owed on the cash ledger
    pub fn transport_usd(&self) -> Money {
        Money::usd(self.transport_cost_usd)
    }

    /// Whether this receipt counts towards the balance of `ledger`
    ///
    /// Receipts sent for settlement count in both ledgers. Settled receipts
    /// count only in the ledger they were settled through; a settled receipt
    /// with no recorded settlement type counts in both.
    pub fn participates_in(&self, ledger: LedgerKind) -> bool {
        match self.status {
            ReceiptStatus::SentForSettlement => true,
            ReceiptStatus::Settled => self
                .settlement_type
                .map_or(true, |t| t.ledger() == ledger),
            ReceiptStatus::Draft | ReceiptStatus::Approved => false,
        }
    }
}
