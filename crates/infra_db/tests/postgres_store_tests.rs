//! PostgreSQL store tests
//!
//! These start a container through testcontainers and need a Docker daemon:
//!
//! ```sh
//! cargo test -p infra_db -- --ignored
//! ```

use std::sync::Arc;

use chrono::Utc;
use rust_decimal_macros::dec;
use sqlx::PgPool;

use core_kernel::{PortError, ReceiptId};
use domain_settlement::{
    ActiveReceipt, LedgerKind, Order, ReceiptQuery, ReceiptStatus, ReconciliationService,
    SettlementStore, SettlementType, TransactionQuery,
};
use infra_db::PostgresSettlementStore;
use test_utils::{
    create_isolated_test_database, StringFixtures, TestCardTransactionBuilder, TestOrderBuilder,
    TestReceiptBuilder, TestTransactionBuilder,
};

async fn seed_receipt(pool: &PgPool, receipt: &ActiveReceipt) {
    sqlx::query(
        r#"
        INSERT INTO active_receipts (
            id, receipt_number, status, receipt_cost_pln, cash_on_delivery_pln,
            transport_cost_usd, settlement_type, version
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        "#,
    )
    .bind(*receipt.id.as_uuid())
    .bind(&receipt.receipt_number)
    .bind(receipt.status.as_str())
    .bind(receipt.receipt_cost_pln)
    .bind(receipt.cash_on_delivery_pln)
    .bind(receipt.transport_cost_usd)
    .bind(receipt.settlement_type.map(|t| t.as_str()))
    .bind(receipt.version)
    .execute(pool)
    .await
    .expect("seed receipt");
}

async fn seed_linked_order(pool: &PgPool, receipt_id: ReceiptId, order: &Order) {
    sqlx::query(
        r#"
        INSERT INTO orders (id, order_number, status, verified, payment_type, part_price, delivery_cost)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        "#,
    )
    .bind(*order.id.as_uuid())
    .bind(&order.order_number)
    .bind(order.status.as_str())
    .bind(order.verified)
    .bind(order.payment_type.as_str())
    .bind(order.part_price)
    .bind(order.delivery_cost)
    .execute(pool)
    .await
    .expect("seed order");

    sqlx::query("INSERT INTO receipt_orders (receipt_id, order_id) VALUES ($1, $2)")
        .bind(*receipt_id.as_uuid())
        .bind(*order.id.as_uuid())
        .execute(pool)
        .await
        .expect("seed link");
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_receipt_round_trip_and_version_check() {
    let db = create_isolated_test_database().await.expect("database");
    let store = PostgresSettlementStore::new(db.pool().clone());

    let receipt = TestReceiptBuilder::new().build();
    seed_receipt(db.pool(), &receipt).await;

    let loaded = store.get_receipt(receipt.id).await.unwrap();
    assert_eq!(loaded.receipt_cost_pln, dec!(100));
    assert_eq!(loaded.status, ReceiptStatus::SentForSettlement);

    let mut settled = loaded.clone();
    settled
        .mark_settled(SettlementType::Cash, Utc::now().date_naive(), Utc::now())
        .unwrap();
    let stored = store.update_receipt(&settled, loaded.version).await.unwrap();
    assert_eq!(stored.version, loaded.version + 1);
    assert_eq!(stored.settlement_type, Some(SettlementType::Cash));

    // Second writer still holds the old version
    let stale = store.update_receipt(&settled, loaded.version).await;
    assert!(matches!(stale, Err(PortError::Conflict { .. })));

    let missing = store.get_receipt(ReceiptId::new()).await;
    assert!(matches!(missing, Err(PortError::NotFound { .. })));
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_find_receipts_filters_by_status() {
    let db = create_isolated_test_database().await.expect("database");
    let store = PostgresSettlementStore::new(db.pool().clone());

    seed_receipt(db.pool(), &TestReceiptBuilder::new().with_number("RC-1").build()).await;
    seed_receipt(
        db.pool(),
        &TestReceiptBuilder::new()
            .with_number("RC-2")
            .with_status(ReceiptStatus::Draft)
            .build(),
    )
    .await;

    let eligible = store.find_receipts(ReceiptQuery::balance_eligible()).await.unwrap();
    assert_eq!(eligible.len(), 1);
    assert_eq!(eligible[0].receipt_number, "RC-1");

    let all = store.find_receipts(ReceiptQuery::default()).await.unwrap();
    assert_eq!(all.len(), 2);
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_reversal_is_conditional() {
    let db = create_isolated_test_database().await.expect("database");
    let store = PostgresSettlementStore::new(db.pool().clone());

    let entry = TestTransactionBuilder::credit(dec!(40)).with_usd(dec!(5)).build();
    store.insert_transaction(&entry).await.unwrap();

    store.mark_transaction_reversed(entry.id, Utc::now()).await.unwrap();
    let again = store.mark_transaction_reversed(entry.id, Utc::now()).await;
    assert!(matches!(again, Err(PortError::Conflict { .. })));

    let live = store.find_transactions(TransactionQuery::live()).await.unwrap();
    assert!(live.is_empty());
    let history = store.find_transactions(TransactionQuery::history()).await.unwrap();
    assert_eq!(history.len(), 1);
    assert!(history[0].is_reversed);
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_settle_and_return_against_postgres() {
    let db = create_isolated_test_database().await.expect("database");
    let store: Arc<dyn SettlementStore> = Arc::new(PostgresSettlementStore::new(db.pool().clone()));
    let service = ReconciliationService::new(store.clone());

    let receipt = TestReceiptBuilder::new().build();
    seed_receipt(db.pool(), &receipt).await;
    let order = TestOrderBuilder::new().build();
    seed_linked_order(db.pool(), receipt.id, &order).await;

    let before = service.balances().await.unwrap();
    assert_eq!(before.card.amount(), dec!(100));

    let outcome = service
        .settle_receipt(receipt.id, SettlementType::Card, Some(StringFixtures::operator().to_string()))
        .await
        .unwrap();
    assert_eq!(outcome.entry.ledger(), LedgerKind::Card);

    let after = service.balances().await.unwrap();
    assert_eq!(after.card, before.card);

    let returned = service.return_to_active(receipt.id).await;
    assert!(returned.is_err());

    let back = service.return_settled_to_settlement(receipt.id).await.unwrap();
    assert_eq!(back.reversed, vec![outcome.entry.id()]);
    let stored = store.get_receipt(receipt.id).await.unwrap();
    assert_eq!(stored.status, ReceiptStatus::SentForSettlement);
    assert_eq!(stored.settlement_type, None);
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_card_entries_and_order_reset() {
    let db = create_isolated_test_database().await.expect("database");
    let store = PostgresSettlementStore::new(db.pool().clone());

    let receipt = TestReceiptBuilder::new().build();
    seed_receipt(db.pool(), &receipt).await;
    let order = TestOrderBuilder::new().build();
    seed_linked_order(db.pool(), receipt.id, &order).await;

    let charge = TestCardTransactionBuilder::charge(dec!(100)).for_receipt(receipt.id).build();
    store.insert_card_transaction(&charge).await.unwrap();
    let linked = store
        .find_card_transactions(TransactionQuery::for_receipt(receipt.id))
        .await
        .unwrap();
    assert_eq!(linked.len(), 1);

    let links = store.find_receipt_orders(&[receipt.id]).await.unwrap();
    assert_eq!(links.len(), 1);
    let changed = store
        .update_order_status(&[links[0].order_id], domain_settlement::OrderStatus::InProcess)
        .await
        .unwrap();
    assert_eq!(changed, 1);

    let orders = store.get_orders(&[order.id]).await.unwrap();
    assert_eq!(orders[0].status, domain_settlement::OrderStatus::InProcess);
}
