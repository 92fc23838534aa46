//! Settlement store port
//!
//! The reconciliation core sees its backing store as an opaque CRUD service:
//! point lookups by id, filtered scans on equality and inclusion predicates,
//! and results ordered by date. Joins between receipts, orders and ledger
//! entries are done in memory by the caller.
//!
//! The only conditional write the core relies on is the receipt
//! compare-and-swap in [`SettlementStore::update_receipt`].
//!
//! ```rust,ignore
//! let store: Arc<dyn SettlementStore> = Arc::new(PostgresSettlementStore::new(pool));
//! let service = ReconciliationService::new(store);
//! let snapshot = service.balances().await?;
//! ```

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use core_kernel::{DomainPort, HealthCheckable, OrderId, PortError, ReceiptId, TransactionId};

use crate::ledger::{CardTransaction, LedgerEntry, LedgerKind, Transaction};
use crate::order::{Order, OrderStatus, ReceiptOrder};
use crate::receipt::{ActiveReceipt, ReceiptStatus};

/// Filter for receipt scans
#[derive(Debug, Clone, Default)]
pub struct ReceiptQuery {
    /// Status must be one of these; empty matches any status
    pub statuses: Vec<ReceiptStatus>,
    /// Id must be one of these; empty matches any id
    pub ids: Vec<ReceiptId>,
}

impl ReceiptQuery {
    /// Receipts that can count towards a balance
    pub fn balance_eligible() -> Self {
        Self {
            statuses: vec![ReceiptStatus::SentForSettlement, ReceiptStatus::Settled],
            ..Default::default()
        }
    }

    pub fn matches(&self, receipt: &ActiveReceipt) -> bool {
        (self.statuses.is_empty() || self.statuses.contains(&receipt.status))
            && (self.ids.is_empty() || self.ids.contains(&receipt.id))
    }
}

/// Filter for ledger scans
#[derive(Debug, Clone, Default)]
pub struct TransactionQuery {
    pub receipt_id: Option<ReceiptId>,
    pub include_reversed: bool,
}

impl TransactionQuery {
    /// Every live entry
    pub fn live() -> Self {
        Self::default()
    }

    /// Full history, reversed entries included
    pub fn history() -> Self {
        Self {
            include_reversed: true,
            ..Default::default()
        }
    }

    /// Live entries generated for one receipt
    pub fn for_receipt(receipt_id: ReceiptId) -> Self {
        Self {
            receipt_id: Some(receipt_id),
            include_reversed: false,
        }
    }

    pub fn matches(&self, receipt_id: Option<ReceiptId>, is_reversed: bool) -> bool {
        (self.include_reversed || !is_reversed)
            && self.receipt_id.map_or(true, |id| receipt_id == Some(id))
    }
}

/// Backing store for receipts, orders and both ledgers
#[async_trait]
pub trait SettlementStore: DomainPort + HealthCheckable {
    /// Fetches one receipt, `PortError::NotFound` if absent
    async fn get_receipt(&self, id: ReceiptId) -> Result<ActiveReceipt, PortError>;

    async fn find_receipts(&self, query: ReceiptQuery) -> Result<Vec<ActiveReceipt>, PortError>;

    /// Writes status and settlement fields if the stored version still equals
    /// `expected_version`
    ///
    /// Returns the stored receipt with its bumped version. A version mismatch
    /// is reported as `PortError::Conflict`.
    async fn update_receipt(
        &self,
        receipt: &ActiveReceipt,
        expected_version: i64,
    ) -> Result<ActiveReceipt, PortError>;

    async fn insert_transaction(&self, transaction: &Transaction) -> Result<(), PortError>;

    async fn get_transaction(&self, id: TransactionId) -> Result<Transaction, PortError>;

    /// Matching cash entries ordered by transaction date
    async fn find_transactions(&self, query: TransactionQuery) -> Result<Vec<Transaction>, PortError>;

    /// Flags a live cash entry as reversed
    ///
    /// `PortError::Conflict` if it is already reversed.
    async fn mark_transaction_reversed(
        &self,
        id: TransactionId,
        at: DateTime<Utc>,
    ) -> Result<(), PortError>;

    async fn insert_card_transaction(&self, transaction: &CardTransaction) -> Result<(), PortError>;

    async fn get_card_transaction(&self, id: TransactionId) -> Result<CardTransaction, PortError>;

    async fn find_card_transactions(
        &self,
        query: TransactionQuery,
    ) -> Result<Vec<CardTransaction>, PortError>;

    async fn mark_card_transaction_reversed(
        &self,
        id: TransactionId,
        at: DateTime<Utc>,
    ) -> Result<(), PortError>;

    /// Join rows for the given receipts
    async fn find_receipt_orders(&self, receipt_ids: &[ReceiptId]) -> Result<Vec<ReceiptOrder>, PortError>;

    /// Orders with the given ids; unknown ids are skipped
    async fn get_orders(&self, ids: &[OrderId]) -> Result<Vec<Order>, PortError>;

    /// Sets the status of every listed order, returning how many rows changed
    async fn update_order_status(&self, ids: &[OrderId], status: OrderStatus) -> Result<u64, PortError>;
}

/// Ledger-agnostic helpers over [`SettlementStore`]
#[async_trait]
pub trait SettlementStoreExt: SettlementStore {
    async fn insert_entry(&self, entry: &LedgerEntry) -> Result<(), PortError> {
        match entry {
            LedgerEntry::Cash(t) => self.insert_transaction(t).await,
            LedgerEntry::Card(t) => self.insert_card_transaction(t).await,
        }
    }

    async fn get_entry(&self, ledger: LedgerKind, id: TransactionId) -> Result<LedgerEntry, PortError> {
        match ledger {
            LedgerKind::Cash => self.get_transaction(id).await.map(LedgerEntry::from),
            LedgerKind::Card => self.get_card_transaction(id).await.map(LedgerEntry::from),
        }
    }

    async fn mark_entry_reversed(
        &self,
        ledger: LedgerKind,
        id: TransactionId,
        at: DateTime<Utc>,
    ) -> Result<(), PortError> {
        match ledger {
            LedgerKind::Cash => self.mark_transaction_reversed(id, at).await,
            LedgerKind::Card => self.mark_card_transaction_reversed(id, at).await,
        }
    }

    /// Live entries of both ledgers linked to a receipt, cash first
    async fn find_linked_entries(&self, receipt_id: ReceiptId) -> Result<Vec<LedgerEntry>, PortError> {
        let cash = self.find_transactions(TransactionQuery::for_receipt(receipt_id)).await?;
        let card = self
            .find_card_transactions(TransactionQuery::for_receipt(receipt_id))
            .await?;
        Ok(cash
            .into_iter()
            .map(LedgerEntry::from)
            .chain(card.into_iter().map(LedgerEntry::from))
            .collect())
    }

    /// Orders linked to the given receipts, with the join rows
    async fn find_linked_orders(
        &self,
        receipt_ids: &[ReceiptId],
    ) -> Result<(Vec<ReceiptOrder>, Vec<Order>), PortError> {
        if receipt_ids.is_empty() {
            return Ok((Vec::new(), Vec::new()));
        }
        let links = self.find_receipt_orders(receipt_ids).await?;
        let mut order_ids: Vec<OrderId> = links.iter().map(|l| l.order_id).collect();
        order_ids.sort();
        order_ids.dedup();
        let orders = if order_ids.is_empty() {
            Vec::new()
        } else {
            self.get_orders(&order_ids).await?
        };
        Ok((links, orders))
    }
}

impl<T: SettlementStore + ?Sized> SettlementStoreExt for T {}

/// In-memory store used by tests and local runs
pub mod memory {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use tokio::sync::RwLock;

    use core_kernel::{AdapterHealth, HealthCheckResult};

    /// `tokio::sync::RwLock` maps standing in for the five tables
    ///
    /// Two faults can be injected: failing the Nth write from now, and a
    /// concurrent writer bumping a receipt's version just before the next
    /// compare-and-swap.
    #[derive(Debug, Default)]
    pub struct InMemorySettlementStore {
        receipts: RwLock<HashMap<ReceiptId, ActiveReceipt>>,
        orders: RwLock<HashMap<OrderId, Order>>,
        links: RwLock<Vec<ReceiptOrder>>,
        transactions: RwLock<HashMap<TransactionId, Transaction>>,
        card_transactions: RwLock<HashMap<TransactionId, CardTransaction>>,
        writes: AtomicUsize,
        fail_at_write: AtomicUsize,
        interfere_next_update: AtomicBool,
    }

    impl InMemorySettlementStore {
        pub fn new() -> Self {
            Self::default()
        }

        pub async fn insert_receipt(&self, receipt: ActiveReceipt) {
            self.receipts.write().await.insert(receipt.id, receipt);
        }

        pub async fn insert_order(&self, order: Order) {
            self.orders.write().await.insert(order.id, order);
        }

        pub async fn link_order(&self, receipt_id: ReceiptId, order_id: OrderId) {
            self.links.write().await.push(ReceiptOrder { receipt_id, order_id });
        }

        /// Seeds a ledger entry without counting it as a write
        pub async fn seed_entry(&self, entry: LedgerEntry) {
            match entry {
                LedgerEntry::Cash(t) => {
                    self.transactions.write().await.insert(t.id, t);
                }
                LedgerEntry::Card(t) => {
                    self.card_transactions.write().await.insert(t.id, t);
                }
            }
        }

        /// Makes the `n`th write from now fail with a connection error
        pub fn fail_nth_write(&self, n: usize) {
            let seen = self.writes.load(Ordering::SeqCst);
            self.fail_at_write.store(seen + n, Ordering::SeqCst);
        }

        /// The next receipt update sees a version bumped by another writer
        pub fn interfere_with_next_update(&self) {
            self.interfere_next_update.store(true, Ordering::SeqCst);
        }

        pub async fn receipt(&self, id: ReceiptId) -> Option<ActiveReceipt> {
            self.receipts.read().await.get(&id).cloned()
        }

        pub async fn order(&self, id: OrderId) -> Option<Order> {
            self.orders.read().await.get(&id).cloned()
        }

        pub async fn all_transactions(&self) -> Vec<Transaction> {
            let mut all: Vec<_> = self.transactions.read().await.values().cloned().collect();
            all.sort_by_key(|t| (t.transaction_date, t.created_at));
            all
        }

        pub async fn all_card_transactions(&self) -> Vec<CardTransaction> {
            let mut all: Vec<_> = self.card_transactions.read().await.values().cloned().collect();
            all.sort_by_key(|t| (t.transaction_date, t.created_at));
            all
        }

        fn record_write(&self, operation: &str) -> Result<(), PortError> {
            let n = self.writes.fetch_add(1, Ordering::SeqCst) + 1;
            if self.fail_at_write.load(Ordering::SeqCst) == n {
                self.fail_at_write.store(0, Ordering::SeqCst);
                return Err(PortError::connection(format!("injected failure in {}", operation)));
            }
            Ok(())
        }
    }

    impl DomainPort for InMemorySettlementStore {}

    #[async_trait]
    impl HealthCheckable for InMemorySettlementStore {
        async fn health_check(&self) -> HealthCheckResult {
            HealthCheckResult {
                adapter_id: "in-memory-settlement-store".to_string(),
                status: AdapterHealth::Healthy,
                latency_ms: 0,
                message: None,
                checked_at: Utc::now(),
            }
        }
    }

    #[async_trait]
    impl SettlementStore for InMemorySettlementStore {
        async fn get_receipt(&self, id: ReceiptId) -> Result<ActiveReceipt, PortError> {
            self.receipts
                .read()
                .await
                .get(&id)
                .cloned()
                .ok_or_else(|| PortError::not_found("Receipt", id))
        }

        async fn find_receipts(&self, query: ReceiptQuery) -> Result<Vec<ActiveReceipt>, PortError> {
            let mut found: Vec<_> = self
                .receipts
                .read()
                .await
                .values()
                .filter(|r| query.matches(r))
                .cloned()
                .collect();
            found.sort_by(|a, b| a.receipt_number.cmp(&b.receipt_number));
            Ok(found)
        }

        async fn update_receipt(
            &self,
            receipt: &ActiveReceipt,
            expected_version: i64,
        ) -> Result<ActiveReceipt, PortError> {
            self.record_write("update_receipt")?;
            let mut receipts = self.receipts.write().await;
            let stored = receipts
                .get_mut(&receipt.id)
                .ok_or_else(|| PortError::not_found("Receipt", receipt.id))?;

            if self.interfere_next_update.swap(false, Ordering::SeqCst) {
                stored.version += 1;
            }
            if stored.version != expected_version {
                return Err(PortError::conflict(format!(
                    "receipt {} is at version {}, expected {}",
                    receipt.id, stored.version, expected_version
                )));
            }

            stored.status = receipt.status;
            stored.settlement_date = receipt.settlement_date;
            stored.settled_date = receipt.settled_date;
            stored.settlement_type = receipt.settlement_type;
            stored.updated_at = receipt.updated_at;
            stored.version += 1;
            Ok(stored.clone())
        }

        async fn insert_transaction(&self, transaction: &Transaction) -> Result<(), PortError> {
            self.record_write("insert_transaction")?;
            self.transactions
                .write()
                .await
                .insert(transaction.id, transaction.clone());
            Ok(())
        }

        async fn get_transaction(&self, id: TransactionId) -> Result<Transaction, PortError> {
            self.transactions
                .read()
                .await
                .get(&id)
                .cloned()
                .ok_or_else(|| PortError::not_found("Transaction", id))
        }

        async fn find_transactions(&self, query: TransactionQuery) -> Result<Vec<Transaction>, PortError> {
            Ok(self
                .all_transactions()
                .await
                .into_iter()
                .filter(|t| query.matches(t.receipt_id, t.is_reversed))
                .collect())
        }

        async fn mark_transaction_reversed(
            &self,
            id: TransactionId,
            at: DateTime<Utc>,
        ) -> Result<(), PortError> {
            self.record_write("mark_transaction_reversed")?;
            let mut transactions = self.transactions.write().await;
            let t = transactions
                .get_mut(&id)
                .ok_or_else(|| PortError::not_found("Transaction", id))?;
            if t.is_reversed {
                return Err(PortError::conflict(format!("transaction {} is already reversed", id)));
            }
            t.is_reversed = true;
            t.reversed_at = Some(at);
            Ok(())
        }

        async fn insert_card_transaction(&self, transaction: &CardTransaction) -> Result<(), PortError> {
            self.record_write("insert_card_transaction")?;
            self.card_transactions
                .write()
                .await
                .insert(transaction.id, transaction.clone());
            Ok(())
        }

        async fn get_card_transaction(&self, id: TransactionId) -> Result<CardTransaction, PortError> {
            self.card_transactions
                .read()
                .await
                .get(&id)
                .cloned()
                .ok_or_else(|| PortError::not_found("CardTransaction", id))
        }

        async fn find_card_transactions(
            &self,
            query: TransactionQuery,
        ) -> Result<Vec<CardTransaction>, PortError> {
            Ok(self
                .all_card_transactions()
                .await
                .into_iter()
                .filter(|t| query.matches(t.receipt_id, t.is_reversed))
                .collect())
        }

        async fn mark_card_transaction_reversed(
            &self,
            id: TransactionId,
            at: DateTime<Utc>,
        ) -> Result<(), PortError> {
            self.record_write("mark_card_transaction_reversed")?;
            let mut transactions = self.card_transactions.write().await;
            let t = transactions
                .get_mut(&id)
                .ok_or_else(|| PortError::not_found("CardTransaction", id))?;
            if t.is_reversed {
                return Err(PortError::conflict(format!("card transaction {} is already reversed", id)));
            }
            t.is_reversed = true;
            t.reversed_at = Some(at);
            Ok(())
        }

        async fn find_receipt_orders(&self, receipt_ids: &[ReceiptId]) -> Result<Vec<ReceiptOrder>, PortError> {
            Ok(self
                .links
                .read()
                .await
                .iter()
                .filter(|l| receipt_ids.contains(&l.receipt_id))
                .copied()
                .collect())
        }

        async fn get_orders(&self, ids: &[OrderId]) -> Result<Vec<Order>, PortError> {
            let orders = self.orders.read().await;
            Ok(ids.iter().filter_map(|id| orders.get(id).cloned()).collect())
        }

        async fn update_order_status(&self, ids: &[OrderId], status: OrderStatus) -> Result<u64, PortError> {
            self.record_write("update_order_status")?;
            let mut orders = self.orders.write().await;
            let now = Utc::now();
            let mut changed = 0;
            for id in ids {
                if let Some(order) = orders.get_mut(id) {
                    order.status = status;
                    order.updated_at = now;
                    changed += 1;
                }
            }
            Ok(changed)
        }
    }
}
