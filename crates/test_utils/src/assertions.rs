//! Custom Test Assertions
//!
//! Assertion helpers for money and balances with messages that name the
//! currency and the ledger involved.

use core_kernel::Money;
use rust_decimal::Decimal;

use domain_settlement::{ActiveReceipt, BalanceSnapshot, ReceiptStatus};

/// Asserts that two Money values are approximately equal within a tolerance
///
/// # Panics
///
/// Panics if the currencies don't match or the amounts differ by more than tolerance
pub fn assert_money_approx_eq(actual: &Money, expected: &Money, tolerance: Decimal) {
    assert_eq!(
        actual.currency(),
        expected.currency(),
        "Currency mismatch: actual={}, expected={}",
        actual.currency(),
        expected.currency()
    );

    let diff = (actual.amount() - expected.amount()).abs();
    assert!(
        diff <= tolerance,
        "Money amounts differ by more than tolerance: actual={}, expected={}, diff={}, tolerance={}",
        actual.amount(),
        expected.amount(),
        diff,
        tolerance
    );
}

/// Asserts that a Money value is zero
pub fn assert_money_zero(money: &Money) {
    assert!(
        money.is_zero(),
        "Expected zero money, got {}",
        money
    );
}

/// Asserts that two snapshots agree on every balance, ignoring when they
/// were computed
pub fn assert_balances_eq(actual: &BalanceSnapshot, expected: &BalanceSnapshot) {
    assert_eq!(
        actual.cash.pln, expected.cash.pln,
        "Cash PLN balance differs: actual={}, expected={}",
        actual.cash.pln, expected.cash.pln
    );
    assert_eq!(
        actual.cash.usd, expected.cash.usd,
        "Cash USD balance differs: actual={}, expected={}",
        actual.cash.usd, expected.cash.usd
    );
    assert_eq!(
        actual.card, expected.card,
        "Card balance differs: actual={}, expected={}",
        actual.card, expected.card
    );
}

/// Asserts a receipt's status, printing its settlement fields on failure
pub fn assert_receipt_status(receipt: &ActiveReceipt, expected: ReceiptStatus) {
    assert_eq!(
        receipt.status, expected,
        "Receipt {} is {} (settlement_type={:?}, settled_date={:?}), expected {}",
        receipt.receipt_number, receipt.status, receipt.settlement_type, receipt.settled_date, expected
    );
}

/// Asserts that a result is Ok and returns the value
#[macro_export]
macro_rules! assert_ok {
    ($result:expr) => {
        match $result {
            Ok(value) => value,
            Err(e) => panic!("Expected Ok, got Err: {:?}", e),
        }
    };
    ($result:expr, $msg:expr) => {
        match $result {
            Ok(value) => value,
            Err(e) => panic!("{}: {:?}", $msg, e),
        }
    };
}

/// Asserts that an error matches a specific variant
#[macro_export]
macro_rules! assert_err_variant {
    ($result:expr, $pattern:pat) => {
        match $result {
            Ok(value) => panic!("Expected Err matching {}, got Ok({:?})", stringify!($pattern), value),
            Err(ref e) => {
                assert!(
                    matches!(e, $pattern),
                    "Error {:?} does not match pattern {}",
                    e,
                    stringify!($pattern)
                );
            }
        }
    };
}
