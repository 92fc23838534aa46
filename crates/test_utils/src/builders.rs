//! Test Data Builders
//!
//! Builder patterns for settlement test data. Tests set only the fields they
//! care about; everything else falls back to the fixtures.

use chrono::NaiveDate;
use core_kernel::{OrderId, ReceiptId};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;

use domain_settlement::{
    ActiveReceipt, CardTransaction, CardTransactionType, InMemorySettlementStore, LedgerEntry,
    Order, OrderStatus, PaymentType, ReceiptStatus, SettlementType, Transaction, TransactionType,
};

use crate::fixtures::{MoneyFixtures, StringFixtures, TemporalFixtures};

/// Builder for receipts
pub struct TestReceiptBuilder {
    receipt: ActiveReceipt,
}

impl Default for TestReceiptBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TestReceiptBuilder {
    /// A receipt sent for settlement, costing 100 PLN plus 50 PLN cash-on-delivery
    pub fn new() -> Self {
        let mut receipt = ActiveReceipt::new(StringFixtures::receipt_number(), ReceiptStatus::SentForSettlement)
            .with_costs(MoneyFixtures::receipt_cost(), MoneyFixtures::cash_on_delivery(), Decimal::ZERO);
        receipt.settlement_date = Some(TemporalFixtures::settlement_day());
        Self { receipt }
    }

    pub fn with_id(mut self, id: ReceiptId) -> Self {
        self.receipt.id = id;
        self
    }

    pub fn with_number(mut self, number: impl Into<String>) -> Self {
        self.receipt.receipt_number = number.into();
        self
    }

    pub fn with_status(mut self, status: ReceiptStatus) -> Self {
        self.receipt.status = status;
        if matches!(status, ReceiptStatus::Draft | ReceiptStatus::Approved) {
            self.receipt.settlement_date = None;
        }
        self
    }

    pub fn with_costs(mut self, cost_pln: Decimal, cash_on_delivery_pln: Decimal, transport_usd: Decimal) -> Self {
        self.receipt = self.receipt.with_costs(cost_pln, cash_on_delivery_pln, transport_usd);
        self
    }

    /// Marks the receipt settled through the given ledger
    pub fn settled_as(mut self, settlement_type: SettlementType) -> Self {
        self.receipt.status = ReceiptStatus::Settled;
        self.receipt.settlement_type = Some(settlement_type);
        self.receipt.settled_date = Some(TemporalFixtures::booking_day());
        self
    }

    pub fn build(self) -> ActiveReceipt {
        self.receipt
    }
}

/// Builder for orders
pub struct TestOrderBuilder {
    order: Order,
}

impl Default for TestOrderBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TestOrderBuilder {
    /// A verified, prepaid order worth 80 + 20 PLN
    pub fn new() -> Self {
        let mut order = Order::new(StringFixtures::order_number(), PaymentType::Paid);
        order.verified = true;
        order.part_price = dec!(80.00);
        order.delivery_cost = dec!(20.00);
        Self { order }
    }

    pub fn with_id(mut self, id: OrderId) -> Self {
        self.order.id = id;
        self
    }

    pub fn with_price(mut self, part_price: Decimal, delivery_cost: Decimal) -> Self {
        self.order.part_price = part_price;
        self.order.delivery_cost = delivery_cost;
        self
    }

    pub fn with_payment_type(mut self, payment_type: PaymentType) -> Self {
        self.order.payment_type = payment_type;
        self
    }

    pub fn with_status(mut self, status: OrderStatus) -> Self {
        self.order.status = status;
        self
    }

    pub fn unverified(mut self) -> Self {
        self.order.verified = false;
        self
    }

    pub fn build(self) -> Order {
        self.order
    }
}

/// Builder for cash ledger entries
pub struct TestTransactionBuilder {
    transaction: Transaction,
}

impl TestTransactionBuilder {
    /// A manual debit (charge) with a reason
    pub fn debit(pln: Decimal) -> Self {
        Self::of(TransactionType::Debit, pln)
    }

    /// A manual credit (payment)
    pub fn credit(pln: Decimal) -> Self {
        Self::of(TransactionType::Credit, pln)
    }

    fn of(transaction_type: TransactionType, pln: Decimal) -> Self {
        Self {
            transaction: Transaction::new(
                transaction_type,
                pln,
                Decimal::ZERO,
                StringFixtures::charge_reason(),
                TemporalFixtures::booking_day(),
            ),
        }
    }

    pub fn with_usd(mut self, usd: Decimal) -> Self {
        self.transaction.transport_cost_usd = usd;
        self
    }

    pub fn on(mut self, date: NaiveDate) -> Self {
        self.transaction.transaction_date = date;
        self
    }

    pub fn for_receipt(mut self, receipt_id: ReceiptId) -> Self {
        self.transaction.receipt_id = Some(receipt_id);
        self
    }

    pub fn reversed(mut self) -> Self {
        self.transaction.is_reversed = true;
        self.transaction.reversed_at = Some(TemporalFixtures::noon());
        self
    }

    pub fn build(self) -> Transaction {
        self.transaction
    }
}

/// Builder for card ledger entries
pub struct TestCardTransactionBuilder {
    transaction: CardTransaction,
}

impl TestCardTransactionBuilder {
    pub fn charge(pln: Decimal) -> Self {
        Self::of(CardTransactionType::Charge, pln)
    }

    pub fn payment(pln: Decimal) -> Self {
        Self::of(CardTransactionType::Payment, pln)
    }

    fn of(transaction_type: CardTransactionType, pln: Decimal) -> Self {
        Self {
            transaction: CardTransaction::new(
                transaction_type,
                pln,
                StringFixtures::charge_reason(),
                TemporalFixtures::booking_day(),
            ),
        }
    }

    pub fn for_receipt(mut self, receipt_id: ReceiptId) -> Self {
        self.transaction.receipt_id = Some(receipt_id);
        self
    }

    pub fn reversed(mut self) -> Self {
        self.transaction.is_reversed = true;
        self.transaction.reversed_at = Some(TemporalFixtures::noon());
        self
    }

    pub fn build(self) -> CardTransaction {
        self.transaction
    }
}

/// Seeds an in-memory store with receipts, linked orders and ledger entries
#[derive(Default)]
pub struct StoreBuilder {
    receipts: Vec<ActiveReceipt>,
    orders: Vec<(Option<ReceiptId>, Order)>,
    entries: Vec<LedgerEntry>,
}

impl StoreBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn receipt(mut self, receipt: ActiveReceipt) -> Self {
        self.receipts.push(receipt);
        self
    }

    /// Adds an order linked to `receipt_id`
    pub fn linked_order(mut self, receipt_id: ReceiptId, order: Order) -> Self {
        self.orders.push((Some(receipt_id), order));
        self
    }

    pub fn order(mut self, order: Order) -> Self {
        self.orders.push((None, order));
        self
    }

    pub fn entry(mut self, entry: impl Into<LedgerEntry>) -> Self {
        self.entries.push(entry.into());
        self
    }

    pub async fn build(self) -> Arc<InMemorySettlementStore> {
        let store = InMemorySettlementStore::new();
        for receipt in self.receipts {
            store.insert_receipt(receipt).await;
        }
        for (receipt_id, order) in self.orders {
            if let Some(receipt_id) = receipt_id {
                store.link_order(receipt_id, order.id).await;
            }
            store.insert_order(order).await;
        }
        for entry in self.entries {
            store.seed_entry(entry).await;
        }
        Arc::new(store)
    }
}
