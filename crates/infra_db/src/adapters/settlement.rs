//! PostgreSQL Settlement Adapter
//!
//! Implements `SettlementStore` over `SettlementRepository`. Text columns are
//! parsed back into domain enums here; a value the domain does not know is
//! reported as `PortError::Transformation` rather than silently defaulted.
//!
//! # Example
//!
//! ```rust,ignore
//! use infra_db::adapters::PostgresSettlementStore;
//! use domain_settlement::{ReconciliationService, SettlementStore};
//! use std::sync::Arc;
//!
//! let store: Arc<dyn SettlementStore> = Arc::new(PostgresSettlementStore::new(pool));
//! let service = ReconciliationService::new(store);
//! let balances = service.balances().await?;
//! ```

use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use tracing::{debug, instrument};
use uuid::Uuid;

use core_kernel::{
    AdapterHealth, DomainPort, HealthCheckResult, HealthCheckable, OrderId, PortError, ReceiptId,
    TransactionId,
};
use domain_settlement::{
    ActiveReceipt, CardTransaction, CardTransactionType, Order, OrderStatus, PaymentType,
    ReceiptOrder, ReceiptQuery, ReceiptStatus, SettlementStore, SettlementType, Transaction,
    TransactionQuery, TransactionType,
};

use crate::repositories::settlement::{
    CardTransactionRow, LedgerTable, OrderRow, ReceiptOrderRow, ReceiptRow, ReceiptStatusUpdate,
    SettlementRepository, TransactionRow,
};

const ADAPTER_ID: &str = "postgres-settlement-store";

/// PostgreSQL-backed implementation of `SettlementStore`
#[derive(Debug, Clone)]
pub struct PostgresSettlementStore {
    repository: SettlementRepository,
    pool: PgPool,
}

impl PostgresSettlementStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            repository: SettlementRepository::new(pool.clone()),
            pool,
        }
    }

    /// Returns a reference to the underlying repository
    pub fn repository(&self) -> &SettlementRepository {
        &self.repository
    }
}

impl DomainPort for PostgresSettlementStore {}

#[async_trait]
impl HealthCheckable for PostgresSettlementStore {
    async fn health_check(&self) -> HealthCheckResult {
        let start = std::time::Instant::now();

        let result = sqlx::query_scalar::<_, i32>("SELECT 1")
            .fetch_one(&self.pool)
            .await;

        let latency_ms = start.elapsed().as_millis() as u64;

        match result {
            Ok(_) => HealthCheckResult {
                adapter_id: ADAPTER_ID.to_string(),
                status: AdapterHealth::Healthy,
                latency_ms,
                message: None,
                checked_at: Utc::now(),
            },
            Err(e) => HealthCheckResult {
                adapter_id: ADAPTER_ID.to_string(),
                status: AdapterHealth::Unhealthy,
                latency_ms,
                message: Some(format!("Database error: {}", e)),
                checked_at: Utc::now(),
            },
        }
    }
}

#[async_trait]
impl SettlementStore for PostgresSettlementStore {
    #[instrument(skip(self), fields(receipt_id = %id))]
    async fn get_receipt(&self, id: ReceiptId) -> Result<ActiveReceipt, PortError> {
        let row = self.repository.get_receipt(id.into()).await?;
        row_to_receipt(row)
    }

    #[instrument(skip(self))]
    async fn find_receipts(&self, query: ReceiptQuery) -> Result<Vec<ActiveReceipt>, PortError> {
        let statuses: Vec<String> = query.statuses.iter().map(|s| s.as_str().to_string()).collect();
        let ids: Vec<Uuid> = query.ids.iter().map(|id| Uuid::from(*id)).collect();

        let rows = self.repository.find_receipts(&statuses, &ids).await?;
        debug!(count = rows.len(), "Loaded receipts");
        rows.into_iter().map(row_to_receipt).collect()
    }

    #[instrument(skip(self, receipt), fields(receipt_id = %receipt.id, status = %receipt.status))]
    async fn update_receipt(
        &self,
        receipt: &ActiveReceipt,
        expected_version: i64,
    ) -> Result<ActiveReceipt, PortError> {
        let update = ReceiptStatusUpdate {
            id: receipt.id.into(),
            status: receipt.status.as_str().to_string(),
            settlement_date: receipt.settlement_date,
            settled_date: receipt.settled_date,
            settlement_type: receipt.settlement_type.map(|t| t.as_str().to_string()),
            updated_at: receipt.updated_at,
        };
        let row = self
            .repository
            .update_receipt_status(&update, expected_version)
            .await?;
        row_to_receipt(row)
    }

    #[instrument(skip(self, transaction), fields(transaction_id = %transaction.id))]
    async fn insert_transaction(&self, transaction: &Transaction) -> Result<(), PortError> {
        self.repository
            .insert_transaction(&transaction_to_row(transaction))
            .await?;
        Ok(())
    }

    #[instrument(skip(self), fields(transaction_id = %id))]
    async fn get_transaction(&self, id: TransactionId) -> Result<Transaction, PortError> {
        let row = self.repository.get_transaction(id.into()).await?;
        row_to_transaction(row)
    }

    #[instrument(skip(self))]
    async fn find_transactions(&self, query: TransactionQuery) -> Result<Vec<Transaction>, PortError> {
        let rows = self
            .repository
            .find_transactions(query.receipt_id.map(Uuid::from), query.include_reversed)
            .await?;
        rows.into_iter().map(row_to_transaction).collect()
    }

    #[instrument(skip(self), fields(transaction_id = %id))]
    async fn mark_transaction_reversed(
        &self,
        id: TransactionId,
        at: DateTime<Utc>,
    ) -> Result<(), PortError> {
        self.repository
            .mark_reversed(LedgerTable::Transactions, id.into(), at)
            .await?;
        Ok(())
    }

    #[instrument(skip(self, transaction), fields(transaction_id = %transaction.id))]
    async fn insert_card_transaction(&self, transaction: &CardTransaction) -> Result<(), PortError> {
        self.repository
            .insert_card_transaction(&card_transaction_to_row(transaction))
            .await?;
        Ok(())
    }

    #[instrument(skip(self), fields(transaction_id = %id))]
    async fn get_card_transaction(&self, id: TransactionId) -> Result<CardTransaction, PortError> {
        let row = self.repository.get_card_transaction(id.into()).await?;
        row_to_card_transaction(row)
    }

    #[instrument(skip(self))]
    async fn find_card_transactions(
        &self,
        query: TransactionQuery,
    ) -> Result<Vec<CardTransaction>, PortError> {
        let rows = self
            .repository
            .find_card_transactions(query.receipt_id.map(Uuid::from), query.include_reversed)
            .await?;
        rows.into_iter().map(row_to_card_transaction).collect()
    }

    #[instrument(skip(self), fields(transaction_id = %id))]
    async fn mark_card_transaction_reversed(
        &self,
        id: TransactionId,
        at: DateTime<Utc>,
    ) -> Result<(), PortError> {
        self.repository
            .mark_reversed(LedgerTable::CardTransactions, id.into(), at)
            .await?;
        Ok(())
    }

    #[instrument(skip(self), fields(count = receipt_ids.len()))]
    async fn find_receipt_orders(&self, receipt_ids: &[ReceiptId]) -> Result<Vec<ReceiptOrder>, PortError> {
        if receipt_ids.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<Uuid> = receipt_ids.iter().map(|id| Uuid::from(*id)).collect();
        let rows = self.repository.find_receipt_orders(&ids).await?;
        Ok(rows.into_iter().map(row_to_link).collect())
    }

    #[instrument(skip(self), fields(count = ids.len()))]
    async fn get_orders(&self, ids: &[OrderId]) -> Result<Vec<Order>, PortError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<Uuid> = ids.iter().map(|id| Uuid::from(*id)).collect();
        let rows = self.repository.get_orders(&ids).await?;
        rows.into_iter().map(row_to_order).collect()
    }

    #[instrument(skip(self), fields(count = ids.len(), status = status.as_str()))]
    async fn update_order_status(&self, ids: &[OrderId], status: OrderStatus) -> Result<u64, PortError> {
        if ids.is_empty() {
            return Ok(0);
        }
        let ids: Vec<Uuid> = ids.iter().map(|id| Uuid::from(*id)).collect();
        let changed = self.repository.update_order_status(&ids, status.as_str()).await?;
        debug!(changed, "Order statuses updated");
        Ok(changed)
    }
}

// ============================================================================
// Row <-> domain conversions
// ============================================================================

fn parse_column<T: FromStr>(column: &str, value: &str) -> Result<T, PortError>
where
    T::Err: std::fmt::Display,
{
    value
        .parse()
        .map_err(|e| PortError::transformation(format!("column {}: {}", column, e)))
}

fn amount(value: Option<Decimal>) -> Decimal {
    value.unwrap_or(Decimal::ZERO)
}

fn row_to_receipt(row: ReceiptRow) -> Result<ActiveReceipt, PortError> {
    let status: ReceiptStatus = parse_column("active_receipts.status", &row.status)?;
    let settlement_type = row
        .settlement_type
        .as_deref()
        .map(|s| parse_column::<SettlementType>("active_receipts.settlement_type", s))
        .transpose()?;

    Ok(ActiveReceipt {
        id: ReceiptId::from_uuid(row.id),
        receipt_number: row.receipt_number,
        status,
        receipt_cost_pln: amount(row.receipt_cost_pln),
        cash_on_delivery_pln: amount(row.cash_on_delivery_pln),
        transport_cost_usd: amount(row.transport_cost_usd),
        settlement_date: row.settlement_date,
        settled_date: row.settled_date,
        settlement_type,
        version: row.version,
        updated_at: row.updated_at,
    })
}

fn row_to_transaction(row: TransactionRow) -> Result<Transaction, PortError> {
    let transaction_type: TransactionType =
        parse_column("transactions.transaction_type", &row.transaction_type)?;

    Ok(Transaction {
        id: TransactionId::from_uuid(row.id),
        transaction_type,
        cash_on_delivery_pln: amount(row.cash_on_delivery_pln),
        transport_cost_usd: amount(row.transport_cost_usd),
        description: row.description.unwrap_or_default(),
        transaction_date: row.transaction_date,
        receipt_id: row.receipt_id.map(ReceiptId::from_uuid),
        is_reversed: row.is_reversed,
        reversed_at: row.reversed_at,
        created_by: row.created_by,
        created_at: row.created_at,
    })
}

fn transaction_to_row(transaction: &Transaction) -> TransactionRow {
    TransactionRow {
        id: transaction.id.into(),
        transaction_type: transaction.transaction_type.as_str().to_string(),
        cash_on_delivery_pln: Some(transaction.cash_on_delivery_pln),
        transport_cost_usd: Some(transaction.transport_cost_usd),
        description: Some(transaction.description.clone()),
        transaction_date: transaction.transaction_date,
        receipt_id: transaction.receipt_id.map(Uuid::from),
        is_reversed: transaction.is_reversed,
        reversed_at: transaction.reversed_at,
        created_by: transaction.created_by.clone(),
        created_at: transaction.created_at,
    }
}

fn row_to_card_transaction(row: CardTransactionRow) -> Result<CardTransaction, PortError> {
    let transaction_type: CardTransactionType =
        parse_column("card_transactions.transaction_type", &row.transaction_type)?;

    Ok(CardTransaction {
        id: TransactionId::from_uuid(row.id),
        transaction_type,
        amount_pln: amount(row.amount_pln),
        description: row.description.unwrap_or_default(),
        transaction_date: row.transaction_date,
        receipt_id: row.receipt_id.map(ReceiptId::from_uuid),
        is_reversed: row.is_reversed,
        reversed_at: row.reversed_at,
        created_by: row.created_by,
        created_at: row.created_at,
    })
}

fn card_transaction_to_row(transaction: &CardTransaction) -> CardTransactionRow {
    CardTransactionRow {
        id: transaction.id.into(),
        transaction_type: transaction.transaction_type.as_str().to_string(),
        amount_pln: Some(transaction.amount_pln),
        description: Some(transaction.description.clone()),
        transaction_date: transaction.transaction_date,
        receipt_id: transaction.receipt_id.map(Uuid::from),
        is_reversed: transaction.is_reversed,
        reversed_at: transaction.reversed_at,
        created_by: transaction.created_by.clone(),
        created_at: transaction.created_at,
    }
}

/// A missing payment type counts as unpaid and a missing verification flag
/// as unverified, so neither makes an order card-eligible
fn row_to_order(row: OrderRow) -> Result<Order, PortError> {
    let status: OrderStatus = parse_column("orders.status", &row.status)?;
    let payment_type = match row.payment_type.as_deref() {
        Some(value) => parse_column::<PaymentType>("orders.payment_type", value)?,
        None => PaymentType::Unpaid,
    };

    Ok(Order {
        id: OrderId::from_uuid(row.id),
        order_number: row.order_number,
        status,
        verified: row.verified.unwrap_or(false),
        payment_type,
        part_price: amount(row.part_price),
        delivery_cost: amount(row.delivery_cost),
        updated_at: row.updated_at,
    })
}

fn row_to_link(row: ReceiptOrderRow) -> ReceiptOrder {
    ReceiptOrder {
        receipt_id: ReceiptId::from_uuid(row.receipt_id),
        order_id: OrderId::from_uuid(row.order_id),
    }
}
