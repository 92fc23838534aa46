//! Balance calculator
//!
//! Balances are derived from persisted state on every call; nothing here
//! keeps counters between calls.
//!
//! Each ledger balance has two terms:
//!
//! - a receipt term, summing what every participating receipt owes
//! - an adjustment term, summing live ledger entries with no `receipt_id`
//!
//! Entries that carry a `receipt_id` are the settlement record of a receipt
//! already counted by the receipt term. They are excluded from the adjustment
//! term, otherwise settling a receipt would count its cost twice.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use core_kernel::{Currency, Money, OrderId, ReceiptId};

use crate::ledger::{CardTransaction, LedgerKind, Transaction};
use crate::order::{Order, ReceiptOrder};
use crate::receipt::ActiveReceipt;

/// Cash ledger balance, tracked separately per currency
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CashBalance {
    pub pln: Money,
    pub usd: Money,
}

impl CashBalance {
    pub fn zero() -> Self {
        Self {
            pln: Money::zero(Currency::PLN),
            usd: Money::zero(Currency::USD),
        }
    }
}

/// Read-only view of both ledgers at one moment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceSnapshot {
    pub cash: CashBalance,
    pub card: Money,
    pub computed_at: DateTime<Utc>,
}

/// How much a single receipt contributes to each balance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiptContribution {
    pub receipt_id: ReceiptId,
    pub receipt_number: String,
    pub cash_pln: Money,
    pub cash_usd: Money,
    pub card_pln: Money,
}

/// Everything the calculator needs, fetched independently from the store
#[derive(Debug, Clone, Default)]
pub struct BalanceInputs {
    pub receipts: Vec<ActiveReceipt>,
    /// Full cash history, reversed entries included
    pub transactions: Vec<Transaction>,
    /// Full card history, reversed entries included
    pub card_transactions: Vec<CardTransaction>,
    pub receipt_orders: Vec<ReceiptOrder>,
    pub orders: Vec<Order>,
}

/// Cash balance in PLN and USD
pub fn cash_balance(receipts: &[ActiveReceipt], transactions: &[Transaction]) -> CashBalance {
    let participating = receipts.iter().filter(|r| r.participates_in(LedgerKind::Cash));
    let adjustments = transactions.iter().filter(|t| t.is_manual_adjustment());

    let mut pln = Decimal::ZERO;
    let mut usd = Decimal::ZERO;
    for receipt in participating {
        pln += receipt.cash_total_pln().amount();
        usd += receipt.transport_usd().amount();
    }
    for t in adjustments {
        pln += t.signed_pln().amount();
        usd += t.signed_usd().amount();
    }

    CashBalance {
        pln: Money::pln(pln),
        usd: Money::usd(usd),
    }
}

/// Card balance in PLN
pub fn card_balance(
    receipts: &[ActiveReceipt],
    receipt_orders: &[ReceiptOrder],
    orders: &[Order],
    card_transactions: &[CardTransaction],
) -> Money {
    let index = OrderIndex::build(receipt_orders, orders);

    let receipt_term = receipts
        .iter()
        .filter(|r| r.participates_in(LedgerKind::Card))
        .map(|r| index.card_amount(r.id));

    let adjustment_term = card_transactions
        .iter()
        .filter(|t| t.is_manual_adjustment())
        .map(|t| t.signed_amount().amount());

    Money::total(Currency::PLN, receipt_term.chain(adjustment_term))
}

/// Per-receipt contributions for every receipt that counts in either ledger
pub fn receipt_breakdown(
    receipts: &[ActiveReceipt],
    receipt_orders: &[ReceiptOrder],
    orders: &[Order],
) -> Vec<ReceiptContribution> {
    let index = OrderIndex::build(receipt_orders, orders);

    receipts
        .iter()
        .filter(|r| r.participates_in(LedgerKind::Cash) || r.participates_in(LedgerKind::Card))
        .map(|r| {
            let (cash_pln, cash_usd) = if r.participates_in(LedgerKind::Cash) {
                (r.cash_total_pln(), r.transport_usd())
            } else {
                (Money::zero(Currency::PLN), Money::zero(Currency::USD))
            };
            let card_pln = if r.participates_in(LedgerKind::Card) {
                Money::pln(index.card_amount(r.id))
            } else {
                Money::zero(Currency::PLN)
            };
            ReceiptContribution {
                receipt_id: r.id,
                receipt_number: r.receipt_number.clone(),
                cash_pln,
                cash_usd,
                card_pln,
            }
        })
        .collect()
}

/// Computes both balances from one set of inputs
pub fn snapshot(inputs: &BalanceInputs, computed_at: DateTime<Utc>) -> BalanceSnapshot {
    BalanceSnapshot {
        cash: cash_balance(&inputs.receipts, &inputs.transactions),
        card: card_balance(
            &inputs.receipts,
            &inputs.receipt_orders,
            &inputs.orders,
            &inputs.card_transactions,
        ),
        computed_at,
    }
}

/// Sum of eligible linked orders for a single receipt
pub fn receipt_card_amount(receipt_id: ReceiptId, receipt_orders: &[ReceiptOrder], orders: &[Order]) -> Money {
    Money::pln(OrderIndex::build(receipt_orders, orders).card_amount(receipt_id))
}

/// In-memory join of receipts to their orders
struct OrderIndex<'a> {
    orders: HashMap<OrderId, &'a Order>,
    links: HashMap<ReceiptId, Vec<OrderId>>,
}

impl<'a> OrderIndex<'a> {
    fn build(receipt_orders: &[ReceiptOrder], orders: &'a [Order]) -> Self {
        let orders = orders.iter().map(|o| (o.id, o)).collect();
        let mut links: HashMap<ReceiptId, Vec<OrderId>> = HashMap::new();
        for link in receipt_orders {
            let ids = links.entry(link.receipt_id).or_default();
            if !ids.contains(&link.order_id) {
                ids.push(link.order_id);
            }
        }
        Self { orders, links }
    }

    fn card_amount(&self, receipt_id: ReceiptId) -> Decimal {
        self.links
            .get(&receipt_id)
            .into_iter()
            .flatten()
            .filter_map(|id| self.orders.get(id))
            .filter(|o| o.is_card_eligible())
            .map(|o| o.card_amount())
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    use crate::ledger::{CardTransactionType, TransactionType};
    use crate::order::PaymentType;
    use crate::receipt::{ReceiptStatus, SettlementType};

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 4, 2).unwrap()
    }

    fn sent_receipt(cost: Decimal, cod: Decimal, usd: Decimal) -> ActiveReceipt {
        ActiveReceipt::new("R-1", ReceiptStatus::SentForSettlement).with_costs(cost, cod, usd)
    }

    fn order(verified: bool, payment_type: PaymentType, price: Decimal, delivery: Decimal) -> Order {
        let mut o = Order::new("ORD", payment_type);
        o.verified = verified;
        o.part_price = price;
        o.delivery_cost = delivery;
        o
    }

    #[test]
    fn test_receipt_term_counts_cost_and_cash_on_delivery() {
        let receipts = vec![sent_receipt(dec!(100), dec!(50), dec!(7))];
        let balance = cash_balance(&receipts, &[]);
        assert_eq!(balance.pln, Money::pln(dec!(150)));
        assert_eq!(balance.usd, Money::usd(dec!(7)));
    }

    #[test]
    fn test_approved_and_draft_receipts_do_not_count() {
        let mut approved = sent_receipt(dec!(100), dec!(0), dec!(0));
        approved.status = ReceiptStatus::Approved;
        let mut draft = sent_receipt(dec!(100), dec!(0), dec!(0));
        draft.status = ReceiptStatus::Draft;

        assert_eq!(cash_balance(&[approved, draft], &[]), CashBalance::zero());
    }

    #[test]
    fn test_manual_adjustments_apply_with_sign() {
        let charge = Transaction::new(TransactionType::Debit, dec!(200), dec!(3), "fee", day());
        let payment = Transaction::new(TransactionType::Credit, dec!(80), dec!(1), "cash", day());

        let balance = cash_balance(&[], &[charge, payment]);
        assert_eq!(balance.pln, Money::pln(dec!(120)));
        assert_eq!(balance.usd, Money::usd(dec!(2)));
    }

    #[test]
    fn test_reversed_and_linked_entries_are_ignored() {
        let receipt = sent_receipt(dec!(100), dec!(50), dec!(0));
        let linked = Transaction::new(TransactionType::Debit, dec!(150), dec!(0), "settle", day())
            .for_receipt(receipt.id);
        let mut reversed = Transaction::new(TransactionType::Credit, dec!(40), dec!(0), "oops", day());
        reversed.is_reversed = true;

        let balance = cash_balance(&[receipt], &[linked, reversed]);
        assert_eq!(balance.pln, Money::pln(dec!(150)));
    }

    #[test]
    fn test_settled_receipt_counts_only_in_its_ledger() {
        let mut r = sent_receipt(dec!(100), dec!(0), dec!(0));
        let o = order(true, PaymentType::Paid, dec!(60), dec!(10));
        let links = vec![ReceiptOrder { receipt_id: r.id, order_id: o.id }];
        r.status = ReceiptStatus::Settled;
        r.settlement_type = Some(SettlementType::Cash);

        let receipts = vec![r];
        let orders = vec![o];
        assert_eq!(cash_balance(&receipts, &[]).pln, Money::pln(dec!(100)));
        assert!(card_balance(&receipts, &links, &orders, &[]).is_zero());
    }

    #[test]
    fn test_card_term_only_counts_verified_paid_orders() {
        let r = sent_receipt(dec!(0), dec!(0), dec!(0));
        let eligible = order(true, PaymentType::Paid, dec!(80), dec!(20));
        let unverified = order(false, PaymentType::Paid, dec!(500), dec!(0));
        let cod = order(true, PaymentType::CashOnDelivery, dec!(300), dec!(0));
        let links = vec![
            ReceiptOrder { receipt_id: r.id, order_id: eligible.id },
            ReceiptOrder { receipt_id: r.id, order_id: unverified.id },
            ReceiptOrder { receipt_id: r.id, order_id: cod.id },
        ];

        let card = card_balance(&[r], &links, &[eligible, unverified, cod], &[]);
        assert_eq!(card, Money::pln(dec!(100)));
    }

    #[test]
    fn test_receipt_without_orders_counts_in_cash_only() {
        let r = sent_receipt(dec!(90), dec!(10), dec!(0));
        let receipts = vec![r];
        assert_eq!(cash_balance(&receipts, &[]).pln, Money::pln(dec!(100)));
        assert!(card_balance(&receipts, &[], &[], &[]).is_zero());
    }

    #[test]
    fn test_card_adjustments_apply_with_sign() {
        let charge = CardTransaction::new(CardTransactionType::Charge, dec!(70), "fee", day());
        let payment = CardTransaction::new(CardTransactionType::Payment, dec!(100), "card", day());
        let card = card_balance(&[], &[], &[], &[charge, payment]);
        assert_eq!(card, Money::pln(dec!(-30)));
    }

    #[test]
    fn test_duplicate_join_rows_count_once() {
        let r = sent_receipt(dec!(0), dec!(0), dec!(0));
        let o = order(true, PaymentType::Paid, dec!(10), dec!(5));
        let link = ReceiptOrder { receipt_id: r.id, order_id: o.id };
        let card = card_balance(&[r], &[link, link], &[o], &[]);
        assert_eq!(card, Money::pln(dec!(15)));
    }

    #[test]
    fn test_breakdown_lists_participating_receipts() {
        let sent = sent_receipt(dec!(10), dec!(5), dec!(1));
        let mut approved = sent_receipt(dec!(99), dec!(0), dec!(0));
        approved.status = ReceiptStatus::Approved;

        let rows = receipt_breakdown(&[sent.clone(), approved], &[], &[]);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].receipt_id, sent.id);
        assert_eq!(rows[0].cash_pln, Money::pln(dec!(15)));
        assert!(rows[0].card_pln.is_zero());
    }

    #[test]
    fn test_snapshot_is_repeatable() {
        let inputs = BalanceInputs {
            receipts: vec![sent_receipt(dec!(100), dec!(50), dec!(2))],
            transactions: vec![Transaction::new(TransactionType::Credit, dec!(20), dec!(0), "cash", day())],
            ..Default::default()
        };
        let at = Utc::now();
        assert_eq!(snapshot(&inputs, at), snapshot(&inputs, at));
    }
}
