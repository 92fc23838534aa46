//! Pre-built Test Fixtures
//!
//! Ready-made values for the settlement scenarios the test suites keep
//! coming back to. Everything here is deterministic.

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use core_kernel::{Currency, Money, OrderId, ReceiptId, TransactionId};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use uuid::Uuid;

/// Fixture for Money test data
pub struct MoneyFixtures;

impl MoneyFixtures {
    /// Receipt cost of the standard receipt
    pub fn receipt_cost() -> Decimal {
        dec!(100.00)
    }

    /// Cash-on-delivery amount of the standard receipt
    pub fn cash_on_delivery() -> Decimal {
        dec!(50.00)
    }

    /// Standard receipt's full cash ledger contribution
    pub fn pln_150() -> Money {
        Money::new(dec!(150.00), Currency::PLN)
    }

    /// Transport cost of the standard receipt
    pub fn usd_transport() -> Money {
        Money::new(dec!(12.50), Currency::USD)
    }

    pub fn pln_zero() -> Money {
        Money::zero(Currency::PLN)
    }

    pub fn usd_zero() -> Money {
        Money::zero(Currency::USD)
    }
}

/// Fixture for temporal test data
pub struct TemporalFixtures;

impl TemporalFixtures {
    /// Day the standard receipt was sent for settlement
    pub fn settlement_day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 4, 15).unwrap()
    }

    /// Day manual entries are booked on
    pub fn booking_day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 4, 20).unwrap()
    }

    pub fn noon() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 4, 20, 12, 0, 0).unwrap()
    }
}

/// Fixture for identifier test data
pub struct IdFixtures;

impl IdFixtures {
    pub fn receipt_id() -> ReceiptId {
        ReceiptId::from_uuid(Uuid::parse_str("0190f5a0-0000-7000-8000-000000000001").unwrap())
    }

    pub fn order_id() -> OrderId {
        OrderId::from_uuid(Uuid::parse_str("0190f5a0-0000-7000-8000-000000000002").unwrap())
    }

    pub fn transaction_id() -> TransactionId {
        TransactionId::from_uuid(Uuid::parse_str("0190f5a0-0000-7000-8000-000000000003").unwrap())
    }
}

/// Fixture for string test data
pub struct StringFixtures;

impl StringFixtures {
    pub fn receipt_number() -> &'static str {
        "RC-2024-0415"
    }

    pub fn order_number() -> &'static str {
        "ZM-88120"
    }

    /// Operator name used as `created_by`
    pub fn operator() -> &'static str {
        "olena"
    }

    pub fn charge_reason() -> &'static str {
        "Storage fee for April"
    }
}
