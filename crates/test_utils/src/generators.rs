//! Property-Based Test Generators
//!
//! Proptest strategies producing settlement data that respects the domain
//! invariants: non-negative amounts with two decimal places, settlement
//! types only on settled receipts, and join rows that point at generated
//! receipts and orders.

use chrono::NaiveDate;
use core_kernel::{Currency, Money};
use proptest::prelude::*;
use rust_decimal::Decimal;

use domain_settlement::{
    ActiveReceipt, BalanceInputs, CardTransaction, CardTransactionType, Order, PaymentType,
    ReceiptOrder, ReceiptStatus, SettlementType, Transaction, TransactionType,
};

/// Non-negative amount with two decimal places, up to 100 000.00
pub fn amount_strategy() -> impl Strategy<Value = Decimal> {
    (0i64..10_000_000i64).prop_map(|minor| Decimal::new(minor, 2))
}

/// Strictly positive amount with two decimal places
pub fn positive_amount_strategy() -> impl Strategy<Value = Decimal> {
    (1i64..10_000_000i64).prop_map(|minor| Decimal::new(minor, 2))
}

pub fn pln_money_strategy() -> impl Strategy<Value = Money> {
    (-10_000_000i64..10_000_000i64).prop_map(|minor| Money::from_minor(minor, Currency::PLN))
}

pub fn date_strategy() -> impl Strategy<Value = NaiveDate> {
    (0u32..365u32).prop_map(|offset| {
        NaiveDate::from_yo_opt(2024, offset + 1).unwrap_or(NaiveDate::MIN)
    })
}

pub fn receipt_status_strategy() -> impl Strategy<Value = ReceiptStatus> {
    prop_oneof![
        Just(ReceiptStatus::Draft),
        Just(ReceiptStatus::Approved),
        Just(ReceiptStatus::SentForSettlement),
        Just(ReceiptStatus::Settled),
    ]
}

pub fn settlement_type_strategy() -> impl Strategy<Value = Option<SettlementType>> {
    prop_oneof![
        Just(None),
        Just(Some(SettlementType::Cash)),
        Just(Some(SettlementType::Card)),
    ]
}

pub fn payment_type_strategy() -> impl Strategy<Value = PaymentType> {
    prop_oneof![
        Just(PaymentType::Paid),
        Just(PaymentType::Unpaid),
        Just(PaymentType::CashOnDelivery),
    ]
}

pub fn receipt_strategy() -> impl Strategy<Value = ActiveReceipt> {
    (
        receipt_status_strategy(),
        settlement_type_strategy(),
        amount_strategy(),
        amount_strategy(),
        amount_strategy(),
        0u32..100_000u32,
    )
        .prop_map(|(status, settlement_type, cost, cod, usd, n)| {
            let mut receipt = ActiveReceipt::new(format!("RC-{:05}", n), status).with_costs(cost, cod, usd);
            if status == ReceiptStatus::Settled {
                receipt.settlement_type = settlement_type;
            }
            receipt
        })
}

pub fn order_strategy() -> impl Strategy<Value = Order> {
    (any::<bool>(), payment_type_strategy(), amount_strategy(), amount_strategy()).prop_map(
        |(verified, payment_type, price, delivery)| {
            let mut order = Order::new("ZM-PROP", payment_type);
            order.verified = verified;
            order.part_price = price;
            order.delivery_cost = delivery;
            order
        },
    )
}

pub fn transaction_type_strategy() -> impl Strategy<Value = TransactionType> {
    prop_oneof![Just(TransactionType::Debit), Just(TransactionType::Credit)]
}

pub fn card_transaction_type_strategy() -> impl Strategy<Value = CardTransactionType> {
    prop_oneof![Just(CardTransactionType::Charge), Just(CardTransactionType::Payment)]
}

/// Unlinked cash entry, possibly reversed
pub fn transaction_strategy() -> impl Strategy<Value = Transaction> {
    (
        transaction_type_strategy(),
        amount_strategy(),
        amount_strategy(),
        date_strategy(),
        prop::bool::weighted(0.2),
    )
        .prop_map(|(transaction_type, pln, usd, date, reversed)| {
            let mut t = Transaction::new(transaction_type, pln, usd, "generated", date);
            t.is_reversed = reversed;
            t
        })
}

/// Unlinked card entry, possibly reversed
pub fn card_transaction_strategy() -> impl Strategy<Value = CardTransaction> {
    (
        card_transaction_type_strategy(),
        amount_strategy(),
        date_strategy(),
        prop::bool::weighted(0.2),
    )
        .prop_map(|(transaction_type, pln, date, reversed)| {
            let mut t = CardTransaction::new(transaction_type, pln, "generated", date);
            t.is_reversed = reversed;
            t
        })
}

/// A full balance input set: receipts, orders linked to them, and ledger
/// history including entries linked to the generated receipts
pub fn balance_inputs_strategy() -> impl Strategy<Value = BalanceInputs> {
    (
        prop::collection::vec(receipt_strategy(), 0..8),
        prop::collection::vec(order_strategy(), 0..12),
        prop::collection::vec(transaction_strategy(), 0..10),
        prop::collection::vec(card_transaction_strategy(), 0..10),
        prop::collection::vec((any::<prop::sample::Index>(), any::<prop::sample::Index>()), 0..16),
        prop::collection::vec(any::<prop::sample::Index>(), 0..10),
    )
        .prop_map(|(receipts, orders, mut transactions, mut card_transactions, links, owners)| {
            let receipt_orders = if receipts.is_empty() || orders.is_empty() {
                Vec::new()
            } else {
                links
                    .into_iter()
                    .map(|(r, o)| ReceiptOrder {
                        receipt_id: receipts[r.index(receipts.len())].id,
                        order_id: orders[o.index(orders.len())].id,
                    })
                    .collect()
            };

            // Link some entries to receipts, the way settlement does
            if !receipts.is_empty() {
                for (i, owner) in owners.iter().enumerate() {
                    let receipt_id = receipts[owner.index(receipts.len())].id;
                    if i % 2 == 0 {
                        if let Some(t) = transactions.get_mut(i) {
                            t.receipt_id = Some(receipt_id);
                        }
                    } else if let Some(t) = card_transactions.get_mut(i) {
                        t.receipt_id = Some(receipt_id);
                    }
                }
            }

            BalanceInputs {
                receipts,
                transactions,
                card_transactions,
                receipt_orders,
                orders,
            }
        })
}
