//! Supplier orders and their link to receipts

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use core_kernel::{CoreError, OrderId, ReceiptId};

/// How the customer pays for an order
///
/// Stored in the backend as the Ukrainian labels used by the operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PaymentType {
    /// Prepaid; settled with the supplier by card
    #[serde(rename = "оплачено")]
    Paid,
    #[serde(rename = "не оплачено")]
    Unpaid,
    /// Collected from the customer at delivery
    #[serde(rename = "наложка")]
    CashOnDelivery,
}

impl PaymentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentType::Paid => "оплачено",
            PaymentType::Unpaid => "не оплачено",
            PaymentType::CashOnDelivery => "наложка",
        }
    }
}

impl fmt::Display for PaymentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "оплачено" => Ok(PaymentType::Paid),
            "не оплачено" => Ok(PaymentType::Unpaid),
            "наложка" => Ok(PaymentType::CashOnDelivery),
            other => Err(CoreError::validation(format!("unknown payment type '{}'", other))),
        }
    }
}

/// Order processing status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    New,
    /// Active order being handled; receipts returned to approved reset here
    InProcess,
    /// Bundled into a receipt
    InReceipt,
    Completed,
    Returned,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::New => "new",
            OrderStatus::InProcess => "in_process",
            OrderStatus::InReceipt => "in_receipt",
            OrderStatus::Completed => "completed",
            OrderStatus::Returned => "returned",
        }
    }
}

impl FromStr for OrderStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "new" => Ok(OrderStatus::New),
            "in_process" => Ok(OrderStatus::InProcess),
            "in_receipt" => Ok(OrderStatus::InReceipt),
            "completed" => Ok(OrderStatus::Completed),
            "returned" => Ok(OrderStatus::Returned),
            other => Err(CoreError::validation(format!("unknown order status '{}'", other))),
        }
    }
}

/// A supplier order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub order_number: String,
    pub status: OrderStatus,
    /// Inspected and confirmed by an operator
    pub verified: bool,
    pub payment_type: PaymentType,
    pub part_price: Decimal,
    pub delivery_cost: Decimal,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    pub fn new(order_number: impl Into<String>, payment_type: PaymentType) -> Self {
        Self {
            id: OrderId::new(),
            order_number: order_number.into(),
            status: OrderStatus::InReceipt,
            verified: false,
            payment_type,
            part_price: Decimal::ZERO,
            delivery_cost: Decimal::ZERO,
            updated_at: Utc::now(),
        }
    }

    /// Verified prepaid orders are what the card ledger settles
    pub fn is_card_eligible(&self) -> bool {
        self.verified && self.payment_type == PaymentType::Paid
    }

    /// PLN amount this order adds to the card balance
    pub fn card_amount(&self) -> Decimal {
        self.part_price + self.delivery_cost
    }
}

/// Join row linking an order to a receipt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReceiptOrder {
    pub receipt_id: ReceiptId,
    pub order_id: OrderId,
}
