//! Ledger entry types
//!
//! Two append-only ledgers are tracked: the cash ledger (PLN cash-on-delivery
//! plus USD transport costs) and the card ledger (PLN only). Entries are never
//! deleted. Reversal flips `is_reversed` and keeps the row for audit.
//!
//! The ledgers use opposite vocabularies for the same idea: on the cash
//! ledger a `Debit` increases what is owed and a `Credit` reduces it, on the
//! card ledger a `Charge` increases it and a `Payment` reduces it.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use core_kernel::{CoreError, Currency, Money, ReceiptId, TransactionId};

/// Which ledger an operation targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LedgerKind {
    /// Cash settlement ledger (PLN and USD)
    Cash,
    /// Card settlement ledger (PLN)
    Card,
}

impl LedgerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            LedgerKind::Cash => "cash",
            LedgerKind::Card => "card",
        }
    }
}

impl fmt::Display for LedgerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LedgerKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cash" => Ok(LedgerKind::Cash),
            "card" => Ok(LedgerKind::Card),
            other => Err(CoreError::validation(format!("unknown ledger '{}'", other))),
        }
    }
}

/// Direction of a cash ledger entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    /// Charge or accrual, increases the balance owed
    Debit,
    /// Payment, reduces the balance owed
    Credit,
}

impl TransactionType {
    /// +1 for debits, -1 for credits
    pub fn sign(&self) -> i8 {
        match self {
            TransactionType::Debit => 1,
            TransactionType::Credit => -1,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Debit => "debit",
            TransactionType::Credit => "credit",
        }
    }
}

impl FromStr for TransactionType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "debit" => Ok(TransactionType::Debit),
            "credit" => Ok(TransactionType::Credit),
            other => Err(CoreError::validation(format!("unknown transaction type '{}'", other))),
        }
    }
}

/// Direction of a card ledger entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CardTransactionType {
    /// Card payment, reduces the balance owed
    Payment,
    /// Card charge, increases the balance owed
    Charge,
}

impl CardTransactionType {
    /// +1 for charges, -1 for payments
    pub fn sign(&self) -> i8 {
        match self {
            CardTransactionType::Charge => 1,
            CardTransactionType::Payment => -1,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CardTransactionType::Payment => "payment",
            CardTransactionType::Charge => "charge",
        }
    }
}

impl FromStr for CardTransactionType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "payment" => Ok(CardTransactionType::Payment),
            "charge" => Ok(CardTransactionType::Charge),
            other => Err(CoreError::validation(format!("unknown card transaction type '{}'", other))),
        }
    }
}

/// A cash ledger entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: TransactionId,
    pub transaction_type: TransactionType,
    /// PLN amount (cash-on-delivery and receipt cost)
    pub cash_on_delivery_pln: Decimal,
    /// USD transport cost
    pub transport_cost_usd: Decimal,
    pub description: String,
    pub transaction_date: NaiveDate,
    /// Set on entries generated by settling a receipt
    pub receipt_id: Option<ReceiptId>,
    pub is_reversed: bool,
    pub reversed_at: Option<DateTime<Utc>>,
    pub created_by: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Transaction {
    /// Creates a new, unlinked cash entry
    pub fn new(
        transaction_type: TransactionType,
        cash_on_delivery_pln: Decimal,
        transport_cost_usd: Decimal,
        description: impl Into<String>,
        transaction_date: NaiveDate,
    ) -> Self {
        Self {
            id: TransactionId::new(),
            transaction_type,
            cash_on_delivery_pln,
            transport_cost_usd,
            description: description.into(),
            transaction_date,
            receipt_id: None,
            is_reversed: false,
            reversed_at: None,
            created_by: None,
            created_at: Utc::now(),
        }
    }

    /// Links the entry to the receipt it settles
    pub fn for_receipt(mut self, receipt_id: ReceiptId) -> Self {
        self.receipt_id = Some(receipt_id);
        self
    }

    /// Records the operator who created the entry
    pub fn created_by(mut self, operator: Option<String>) -> Self {
        self.created_by = operator;
        self
    }

    /// Signed PLN effect on the balance
    pub fn signed_pln(&self) -> Money {
        Money::pln(self.cash_on_delivery_pln).signed(self.transaction_type.sign())
    }

    /// Signed USD effect on the balance
    pub fn signed_usd(&self) -> Money {
        Money::usd(self.transport_cost_usd).signed(self.transaction_type.sign())
    }

    /// A live entry not tied to any receipt
    pub fn is_manual_adjustment(&self) -> bool {
        !self.is_reversed && self.receipt_id.is_none()
    }
}

/// A card ledger entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardTransaction {
    pub id: TransactionId,
    pub transaction_type: CardTransactionType,
    pub amount_pln: Decimal,
    pub description: String,
    pub transaction_date: NaiveDate,
    pub receipt_id: Option<ReceiptId>,
    pub is_reversed: bool,
    pub reversed_at: Option<DateTime<Utc>>,
    pub created_by: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl CardTransaction {
    /// Creates a new, unlinked card entry
    pub fn new(
        transaction_type: CardTransactionType,
        amount_pln: Decimal,
        description: impl Into<String>,
        transaction_date: NaiveDate,
    ) -> Self {
        Self {
            id: TransactionId::new(),
            transaction_type,
            amount_pln,
            description: description.into(),
            transaction_date,
            receipt_id: None,
            is_reversed: false,
            reversed_at: None,
            created_by: None,
            created_at: Utc::now(),
        }
    }

    pub fn for_receipt(mut self, receipt_id: ReceiptId) -> Self {
        self.receipt_id = Some(receipt_id);
        self
    }

    pub fn created_by(mut self, operator: Option<String>) -> Self {
        self.created_by = operator;
        self
    }

    /// Signed PLN effect on the card balance
    pub fn signed_amount(&self) -> Money {
        Money::pln(self.amount_pln).signed(self.transaction_type.sign())
    }

    pub fn is_manual_adjustment(&self) -> bool {
        !self.is_reversed && self.receipt_id.is_none()
    }
}

/// An entry from either ledger
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "ledger", rename_all = "snake_case")]
pub enum LedgerEntry {
    Cash(Transaction),
    Card(CardTransaction),
}

impl LedgerEntry {
    pub fn ledger(&self) -> LedgerKind {
        match self {
            LedgerEntry::Cash(_) => LedgerKind::Cash,
            LedgerEntry::Card(_) => LedgerKind::Card,
        }
    }

    pub fn id(&self) -> TransactionId {
        match self {
            LedgerEntry::Cash(t) => t.id,
            LedgerEntry::Card(t) => t.id,
        }
    }

    pub fn receipt_id(&self) -> Option<ReceiptId> {
        match self {
            LedgerEntry::Cash(t) => t.receipt_id,
            LedgerEntry::Card(t) => t.receipt_id,
        }
    }

    pub fn is_reversed(&self) -> bool {
        match self {
            LedgerEntry::Cash(t) => t.is_reversed,
            LedgerEntry::Card(t) => t.is_reversed,
        }
    }

    /// True for entries that increase the balance owed (debit or charge)
    pub fn is_accrual(&self) -> bool {
        match self {
            LedgerEntry::Cash(t) => t.transaction_type == TransactionType::Debit,
            LedgerEntry::Card(t) => t.transaction_type == CardTransactionType::Charge,
        }
    }

    /// Signed PLN effect, whichever ledger the entry lives in
    pub fn signed_pln(&self) -> Money {
        match self {
            LedgerEntry::Cash(t) => t.signed_pln(),
            LedgerEntry::Card(t) => t.signed_amount(),
        }
    }

    /// Signed USD effect; card entries carry none
    pub fn signed_usd(&self) -> Money {
        match self {
            LedgerEntry::Cash(t) => t.signed_usd(),
            LedgerEntry::Card(_) => Money::zero(Currency::USD),
        }
    }
}

impl From<Transaction> for LedgerEntry {
    fn from(t: Transaction) -> Self {
        LedgerEntry::Cash(t)
    }
}

impl From<CardTransaction> for LedgerEntry {
    fn from(t: CardTransaction) -> Self {
        LedgerEntry::Card(t)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()
    }

    #[test]
    fn test_polarity_is_inverted_between_ledgers() {
        assert_eq!(TransactionType::Debit.sign(), CardTransactionType::Charge.sign());
        assert_eq!(TransactionType::Credit.sign(), CardTransactionType::Payment.sign());
    }

    #[test]
    fn test_cash_entry_signed_amounts() {
        let credit = Transaction::new(TransactionType::Credit, dec!(50), dec!(5), "cash in", date());
        assert_eq!(credit.signed_pln(), Money::pln(dec!(-50)));
        assert_eq!(credit.signed_usd(), Money::usd(dec!(-5)));
    }

    #[test]
    fn test_linked_entry_is_not_manual_adjustment() {
        let t = Transaction::new(TransactionType::Debit, dec!(150), dec!(0), "settled", date())
            .for_receipt(ReceiptId::new());
        assert!(!t.is_manual_adjustment());
    }

    #[test]
    fn test_reversed_entry_is_not_manual_adjustment() {
        let mut t = CardTransaction::new(CardTransactionType::Charge, dec!(10), "fee", date());
        t.is_reversed = true;
        assert!(!t.is_manual_adjustment());
    }

    #[test]
    fn test_ledger_kind_parse() {
        assert_eq!("card".parse::<LedgerKind>().unwrap(), LedgerKind::Card);
        assert!("wire".parse::<LedgerKind>().is_err());
    }

    #[test]
    fn test_ledger_entry_accessors() {
        let entry: LedgerEntry =
            CardTransaction::new(CardTransactionType::Payment, dec!(30), "card", date()).into();
        assert_eq!(entry.ledger(), LedgerKind::Card);
        assert!(!entry.is_accrual());
        assert_eq!(entry.signed_pln(), Money::pln(dec!(-30)));
        assert!(entry.signed_usd().is_zero());
    }
}
