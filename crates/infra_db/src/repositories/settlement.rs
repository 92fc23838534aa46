//! Settlement repository implementation
//!
//! Row-level access to receipts, orders and both ledgers. Rows mirror the
//! table layout (nullable numeric columns stay `Option`) and are turned into
//! domain values by the adapter.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::{FromRow, PgPool};
use tracing::instrument;
use uuid::Uuid;

use crate::error::DatabaseError;

const RECEIPT_COLUMNS: &str = "id, receipt_number, status, receipt_cost_pln, cash_on_delivery_pln, \
     transport_cost_usd, settlement_date, settled_date, settlement_type, version, updated_at";

const TRANSACTION_COLUMNS: &str = "id, transaction_type, cash_on_delivery_pln, transport_cost_usd, \
     description, transaction_date, receipt_id, is_reversed, reversed_at, created_by, created_at";

const CARD_TRANSACTION_COLUMNS: &str = "id, transaction_type, amount_pln, description, \
     transaction_date, receipt_id, is_reversed, reversed_at, created_by, created_at";

const ORDER_COLUMNS: &str =
    "id, order_number, status, verified, payment_type, part_price, delivery_cost, updated_at";

/// Row in `active_receipts`
#[derive(Debug, Clone, FromRow)]
pub struct ReceiptRow {
    pub id: Uuid,
    pub receipt_number: String,
    pub status: String,
    pub receipt_cost_pln: Option<Decimal>,
    pub cash_on_delivery_pln: Option<Decimal>,
    pub transport_cost_usd: Option<Decimal>,
    pub settlement_date: Option<NaiveDate>,
    pub settled_date: Option<NaiveDate>,
    pub settlement_type: Option<String>,
    pub version: i64,
    pub updated_at: DateTime<Utc>,
}

/// Status and settlement fields written by a receipt update
#[derive(Debug, Clone)]
pub struct ReceiptStatusUpdate {
    pub id: Uuid,
    pub status: String,
    pub settlement_date: Option<NaiveDate>,
    pub settled_date: Option<NaiveDate>,
    pub settlement_type: Option<String>,
    pub updated_at: DateTime<Utc>,
}

/// Row in `transactions`
#[derive(Debug, Clone, FromRow)]
pub struct TransactionRow {
    pub id: Uuid,
    pub transaction_type: String,
    pub cash_on_delivery_pln: Option<Decimal>,
    pub transport_cost_usd: Option<Decimal>,
    pub description: Option<String>,
    pub transaction_date: NaiveDate,
    pub receipt_id: Option<Uuid>,
    pub is_reversed: bool,
    pub reversed_at: Option<DateTime<Utc>>,
    pub created_by: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Row in `card_transactions`
#[derive(Debug, Clone, FromRow)]
pub struct CardTransactionRow {
    pub id: Uuid,
    pub transaction_type: String,
    pub amount_pln: Option<Decimal>,
    pub description: Option<String>,
    pub transaction_date: NaiveDate,
    pub receipt_id: Option<Uuid>,
    pub is_reversed: bool,
    pub reversed_at: Option<DateTime<Utc>>,
    pub created_by: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Row in `orders`
#[derive(Debug, Clone, FromRow)]
pub struct OrderRow {
    pub id: Uuid,
    pub order_number: String,
    pub status: String,
    pub verified: Option<bool>,
    pub payment_type: Option<String>,
    pub part_price: Option<Decimal>,
    pub delivery_cost: Option<Decimal>,
    pub updated_at: DateTime<Utc>,
}

/// Row in `receipt_orders`
#[derive(Debug, Clone, Copy, FromRow)]
pub struct ReceiptOrderRow {
    pub receipt_id: Uuid,
    pub order_id: Uuid,
}

/// The two ledger tables share their reversal columns
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerTable {
    Transactions,
    CardTransactions,
}

impl LedgerTable {
    fn name(self) -> &'static str {
        match self {
            LedgerTable::Transactions => "transactions",
            LedgerTable::CardTransactions => "card_transactions",
        }
    }

    fn entity(self) -> &'static str {
        match self {
            LedgerTable::Transactions => "Transaction",
            LedgerTable::CardTransactions => "CardTransaction",
        }
    }
}

/// Repository for receipts, orders and ledger rows
#[derive(Debug, Clone)]
pub struct SettlementRepository {
    pool: PgPool,
}

impl SettlementRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[instrument(skip(self))]
    pub async fn get_receipt(&self, id: Uuid) -> Result<ReceiptRow, DatabaseError> {
        let sql = format!("SELECT {} FROM active_receipts WHERE id = $1", RECEIPT_COLUMNS);
        sqlx::query_as::<_, ReceiptRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DatabaseError::not_found("Receipt", id))
    }

    /// Receipts whose status and id are in the given sets; an empty set
    /// does not filter
    #[instrument(skip(self))]
    pub async fn find_receipts(
        &self,
        statuses: &[String],
        ids: &[Uuid],
    ) -> Result<Vec<ReceiptRow>, DatabaseError> {
        let sql = format!(
            r#"
            SELECT {} FROM active_receipts
            WHERE (cardinality($1::text[]) = 0 OR status = ANY($1))
              AND (cardinality($2::uuid[]) = 0 OR id = ANY($2))
            ORDER BY receipt_number
            "#,
            RECEIPT_COLUMNS
        );
        let rows = sqlx::query_as::<_, ReceiptRow>(&sql)
            .bind(statuses)
            .bind(ids)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    /// Compare-and-swap update of the status fields
    ///
    /// Bumps `version` on success. Zero matched rows means either the receipt
    /// is gone or its version moved; the two are reported separately.
    #[instrument(skip(self, update), fields(receipt_id = %update.id))]
    pub async fn update_receipt_status(
        &self,
        update: &ReceiptStatusUpdate,
        expected_version: i64,
    ) -> Result<ReceiptRow, DatabaseError> {
        let sql = format!(
            r#"
            UPDATE active_receipts
            SET status = $2,
                settlement_date = $3,
                settled_date = $4,
                settlement_type = $5,
                updated_at = $6,
                version = version + 1
            WHERE id = $1 AND version = $7
            RETURNING {}
            "#,
            RECEIPT_COLUMNS
        );
        let updated = sqlx::query_as::<_, ReceiptRow>(&sql)
            .bind(update.id)
            .bind(&update.status)
            .bind(update.settlement_date)
            .bind(update.settled_date)
            .bind(&update.settlement_type)
            .bind(update.updated_at)
            .bind(expected_version)
            .fetch_optional(&self.pool)
            .await?;

        match updated {
            Some(row) => Ok(row),
            None => {
                let current = self.get_receipt(update.id).await?;
                Err(DatabaseError::Conflict(format!(
                    "receipt {} is at version {}, expected {}",
                    update.id, current.version, expected_version
                )))
            }
        }
    }

    #[instrument(skip(self, row), fields(transaction_id = %row.id))]
    pub async fn insert_transaction(&self, row: &TransactionRow) -> Result<(), DatabaseError> {
        sqlx::query(
            r#"
            INSERT INTO transactions (
                id, transaction_type, cash_on_delivery_pln, transport_cost_usd, description,
                transaction_date, receipt_id, is_reversed, reversed_at, created_by, created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(row.id)
        .bind(&row.transaction_type)
        .bind(row.cash_on_delivery_pln)
        .bind(row.transport_cost_usd)
        .bind(&row.description)
        .bind(row.transaction_date)
        .bind(row.receipt_id)
        .bind(row.is_reversed)
        .bind(row.reversed_at)
        .bind(&row.created_by)
        .bind(row.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn get_transaction(&self, id: Uuid) -> Result<TransactionRow, DatabaseError> {
        let sql = format!("SELECT {} FROM transactions WHERE id = $1", TRANSACTION_COLUMNS);
        sqlx::query_as::<_, TransactionRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DatabaseError::not_found(LedgerTable::Transactions.entity(), id))
    }

    #[instrument(skip(self))]
    pub async fn find_transactions(
        &self,
        receipt_id: Option<Uuid>,
        include_reversed: bool,
    ) -> Result<Vec<TransactionRow>, DatabaseError> {
        let sql = format!(
            r#"
            SELECT {} FROM transactions
            WHERE ($1::uuid IS NULL OR receipt_id = $1)
              AND ($2 OR NOT is_reversed)
            ORDER BY transaction_date, created_at
            "#,
            TRANSACTION_COLUMNS
        );
        let rows = sqlx::query_as::<_, TransactionRow>(&sql)
            .bind(receipt_id)
            .bind(include_reversed)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    #[instrument(skip(self, row), fields(transaction_id = %row.id))]
    pub async fn insert_card_transaction(&self, row: &CardTransactionRow) -> Result<(), DatabaseError> {
        sqlx::query(
            r#"
            INSERT INTO card_transactions (
                id, transaction_type, amount_pln, description, transaction_date,
                receipt_id, is_reversed, reversed_at, created_by, created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(row.id)
        .bind(&row.transaction_type)
        .bind(row.amount_pln)
        .bind(&row.description)
        .bind(row.transaction_date)
        .bind(row.receipt_id)
        .bind(row.is_reversed)
        .bind(row.reversed_at)
        .bind(&row.created_by)
        .bind(row.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn get_card_transaction(&self, id: Uuid) -> Result<CardTransactionRow, DatabaseError> {
        let sql = format!(
            "SELECT {} FROM card_transactions WHERE id = $1",
            CARD_TRANSACTION_COLUMNS
        );
        sqlx::query_as::<_, CardTransactionRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DatabaseError::not_found(LedgerTable::CardTransactions.entity(), id))
    }

    #[instrument(skip(self))]
    pub async fn find_card_transactions(
        &self,
        receipt_id: Option<Uuid>,
        include_reversed: bool,
    ) -> Result<Vec<CardTransactionRow>, DatabaseError> {
        let sql = format!(
            r#"
            SELECT {} FROM card_transactions
            WHERE ($1::uuid IS NULL OR receipt_id = $1)
              AND ($2 OR NOT is_reversed)
            ORDER BY transaction_date, created_at
            "#,
            CARD_TRANSACTION_COLUMNS
        );
        let rows = sqlx::query_as::<_, CardTransactionRow>(&sql)
            .bind(receipt_id)
            .bind(include_reversed)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    /// Flags a live ledger row as reversed
    ///
    /// The `NOT is_reversed` guard makes the write conditional, so two
    /// operators reversing the same row cannot both succeed.
    #[instrument(skip(self))]
    pub async fn mark_reversed(
        &self,
        table: LedgerTable,
        id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<(), DatabaseError> {
        let sql = format!(
            "UPDATE {} SET is_reversed = TRUE, reversed_at = $2 WHERE id = $1 AND NOT is_reversed",
            table.name()
        );
        let result = sqlx::query(&sql).bind(id).bind(at).execute(&self.pool).await?;
        if result.rows_affected() > 0 {
            return Ok(());
        }

        let exists_sql = format!("SELECT EXISTS (SELECT 1 FROM {} WHERE id = $1)", table.name());
        let exists: bool = sqlx::query_scalar(&exists_sql)
            .bind(id)
            .fetch_one(&self.pool)
            .await?;
        if exists {
            Err(DatabaseError::Conflict(format!("{} {} is already reversed", table.entity(), id)))
        } else {
            Err(DatabaseError::not_found(table.entity(), id))
        }
    }

    #[instrument(skip(self))]
    pub async fn find_receipt_orders(&self, receipt_ids: &[Uuid]) -> Result<Vec<ReceiptOrderRow>, DatabaseError> {
        let rows = sqlx::query_as::<_, ReceiptOrderRow>(
            "SELECT receipt_id, order_id FROM receipt_orders WHERE receipt_id = ANY($1)",
        )
        .bind(receipt_ids)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    #[instrument(skip(self), fields(count = ids.len()))]
    pub async fn get_orders(&self, ids: &[Uuid]) -> Result<Vec<OrderRow>, DatabaseError> {
        let sql = format!("SELECT {} FROM orders WHERE id = ANY($1)", ORDER_COLUMNS);
        let rows = sqlx::query_as::<_, OrderRow>(&sql)
            .bind(ids)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    #[instrument(skip(self), fields(count = ids.len()))]
    pub async fn update_order_status(&self, ids: &[Uuid], status: &str) -> Result<u64, DatabaseError> {
        let result = sqlx::query("UPDATE orders SET status = $2, updated_at = NOW() WHERE id = ANY($1)")
            .bind(ids)
            .bind(status)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    /// Runs `SELECT 1` against the pool
    pub async fn ping(&self) -> Result<(), DatabaseError> {
        sqlx::query_scalar::<_, i32>("SELECT 1").fetch_one(&self.pool).await?;
        Ok(())
    }
}
