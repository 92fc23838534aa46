//! Reconciliation action tests against the in-memory store

use rust_decimal_macros::dec;
use std::sync::Arc;

use core_kernel::{Money, ReceiptId, TransactionId};
use domain_settlement::{
    BackwardStep, InMemorySettlementStore, LedgerEntry, LedgerKind, NewLedgerEntry, OrderStatus,
    ReceiptStatus, ReconciliationService, SettlementError, SettlementStore, SettlementType,
};
use test_utils::{
    assert_balances_eq, assert_err_variant, assert_receipt_status, MoneyFixtures, StoreBuilder,
    StringFixtures, TestOrderBuilder, TestReceiptBuilder, TestTransactionBuilder,
};

struct Scenario {
    store: Arc<InMemorySettlementStore>,
    service: ReconciliationService,
    receipt_id: ReceiptId,
}

/// Sent receipt of 100 + 50 PLN with one eligible 80 + 20 order and one
/// unverified order
async fn scenario() -> Scenario {
    let receipt = TestReceiptBuilder::new().build();
    let receipt_id = receipt.id;
    let store = StoreBuilder::new()
        .receipt(receipt)
        .linked_order(receipt_id, TestOrderBuilder::new().build())
        .linked_order(
            receipt_id,
            TestOrderBuilder::new().unverified().with_price(dec!(500), dec!(0)).build(),
        )
        .build()
        .await;
    let service = ReconciliationService::new(store.clone());
    Scenario {
        store,
        service,
        receipt_id,
    }
}

mod balances {
    use super::*;

    #[tokio::test]
    async fn test_sent_receipt_counts_in_both_ledgers() {
        let s = scenario().await;
        let snapshot = s.service.balances().await.unwrap();

        assert_eq!(snapshot.cash.pln, MoneyFixtures::pln_150());
        assert_eq!(snapshot.card, Money::pln(dec!(100)));
    }

    #[tokio::test]
    async fn test_reversed_history_is_ignored() {
        let s = scenario().await;
        let before = s.service.balances().await.unwrap();
        let entry = s
            .service
            .record_charge(NewLedgerEntry::cash(dec!(25), dec!(3), "fuel"))
            .await
            .unwrap();
        s.service.reverse_transaction(LedgerKind::Cash, entry.id()).await.unwrap();

        assert_eq!(s.store.all_transactions().await.len(), 1);
        assert_balances_eq(&s.service.balances().await.unwrap(), &before);
    }

    #[tokio::test]
    async fn test_balances_are_idempotent() {
        let s = scenario().await;
        let first = s.service.balances().await.unwrap();
        let second = s.service.balances().await.unwrap();
        assert_balances_eq(&first, &second);
    }

    #[tokio::test]
    async fn test_breakdown_lists_the_receipt() {
        let s = scenario().await;
        let rows = s.service.receipt_breakdown().await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].receipt_number, StringFixtures::receipt_number());
        assert_eq!(rows[0].card_pln, Money::pln(dec!(100)));
    }
}

mod manual_entries {
    use super::*;

    #[tokio::test]
    async fn test_cash_charge_without_description_is_rejected() {
        let s = scenario().await;
        let result = s.service.record_charge(NewLedgerEntry::cash(dec!(200), dec!(0), "  ")).await;

        assert_err_variant!(result, SettlementError::Validation(_));
        assert!(s.store.all_transactions().await.is_empty());
    }

    #[tokio::test]
    async fn test_card_charge_without_description_is_accepted() {
        let s = scenario().await;
        let entry = s.service.record_charge(NewLedgerEntry::card(dec!(30), "")).await.unwrap();
        assert_eq!(entry.ledger(), LedgerKind::Card);
    }

    #[tokio::test]
    async fn test_zero_and_negative_amounts_are_rejected() {
        let s = scenario().await;
        assert_err_variant!(
            s.service.record_payment(NewLedgerEntry::cash(dec!(0), dec!(0), "cash")).await,
            SettlementError::Validation(_)
        );
        assert_err_variant!(
            s.service.record_payment(NewLedgerEntry::card(dec!(-5), "card")).await,
            SettlementError::Validation(_)
        );
    }

    #[tokio::test]
    async fn test_sub_cent_amounts_are_rejected_before_any_write() {
        let s = scenario().await;
        let before = s.service.balances().await.unwrap();

        assert_err_variant!(
            s.service.record_payment(NewLedgerEntry::cash(dec!(0.00004), dec!(0), "cash")).await,
            SettlementError::Validation(_)
        );
        assert_err_variant!(
            s.service.record_charge(NewLedgerEntry::cash(dec!(10.005), dec!(0), "fuel")).await,
            SettlementError::Validation(_)
        );
        assert_err_variant!(
            s.service.record_payment(NewLedgerEntry::cash(dec!(0), dec!(1.001), "transport")).await,
            SettlementError::Validation(_)
        );
        assert_err_variant!(
            s.service.record_charge(NewLedgerEntry::card(dec!(3.333), "fee")).await,
            SettlementError::Validation(_)
        );

        assert!(s.store.all_transactions().await.is_empty());
        assert!(s.store.all_card_transactions().await.is_empty());
        assert_balances_eq(&s.service.balances().await.unwrap(), &before);
    }

    #[tokio::test]
    async fn test_trailing_zeros_do_not_count_as_precision() {
        let s = scenario().await;
        let entry = s
            .service
            .record_payment(NewLedgerEntry::cash(dec!(10.5000), dec!(0), "cash"))
            .await
            .unwrap();
        assert_eq!(entry.signed_pln(), Money::pln(dec!(-10.50)));
    }

    #[tokio::test]
    async fn test_card_entries_reject_usd() {
        let s = scenario().await;
        let mut entry = NewLedgerEntry::card(dec!(10), "card");
        entry.amount_usd = dec!(1);
        assert_err_variant!(s.service.record_payment(entry).await, SettlementError::Validation(_));
    }

    #[tokio::test]
    async fn test_usd_only_cash_payment_is_accepted() {
        let s = scenario().await;
        let before = s.service.balances().await.unwrap();
        s.service
            .record_payment(NewLedgerEntry::cash(dec!(0), dec!(12.50), "transport"))
            .await
            .unwrap();
        let after = s.service.balances().await.unwrap();

        assert_eq!(after.cash.pln, before.cash.pln);
        assert_eq!(after.cash.usd, Money::usd(dec!(-12.50)));
    }

    #[tokio::test]
    async fn test_payment_reduces_and_reversal_restores() {
        let s = scenario().await;
        let before = s.service.balances().await.unwrap();

        let entry = s
            .service
            .record_payment(NewLedgerEntry::cash(dec!(60), dec!(0), "cash").with_operator(StringFixtures::operator()))
            .await
            .unwrap();
        let paid = s.service.balances().await.unwrap();
        assert_eq!(paid.cash.pln, Money::pln(dec!(90)));

        let outcome = s.service.reverse_transaction(LedgerKind::Cash, entry.id()).await.unwrap();
        assert_eq!(outcome.reversed, vec![entry.id()]);
        assert!(outcome.step.is_none());
        assert_balances_eq(&s.service.balances().await.unwrap(), &before);
    }
}

mod settlement {
    use super::*;

    #[tokio::test]
    async fn test_cash_settlement_keeps_cash_balance() {
        let s = scenario().await;
        let outcome = s
            .service
            .settle_receipt(s.receipt_id, SettlementType::Cash, Some(StringFixtures::operator().into()))
            .await
            .unwrap();

        assert_receipt_status(&outcome.receipt, ReceiptStatus::Settled);
        assert_eq!(outcome.receipt.settlement_type, Some(SettlementType::Cash));
        assert!(outcome.receipt.settled_date.is_some());
        assert_eq!(outcome.receipt.version, 1);

        match &outcome.entry {
            LedgerEntry::Cash(t) => {
                assert_eq!(t.cash_on_delivery_pln, dec!(150));
                assert_eq!(t.receipt_id, Some(s.receipt_id));
                assert_eq!(t.created_by.as_deref(), Some(StringFixtures::operator()));
            }
            other => panic!("expected a cash entry, got {:?}", other),
        }

        let snapshot = s.service.balances().await.unwrap();
        assert_eq!(snapshot.cash.pln, MoneyFixtures::pln_150());
        // Settled through cash, so it no longer counts on the card ledger
        assert!(snapshot.card.is_zero());
    }

    #[tokio::test]
    async fn test_card_settlement_charges_eligible_orders() {
        let s = scenario().await;
        let outcome = s
            .service
            .settle_receipt(s.receipt_id, SettlementType::Card, None)
            .await
            .unwrap();

        match &outcome.entry {
            LedgerEntry::Card(t) => {
                assert_eq!(t.amount_pln, dec!(100));
                assert_eq!(t.receipt_id, Some(s.receipt_id));
            }
            other => panic!("expected a card entry, got {:?}", other),
        }

        let snapshot = s.service.balances().await.unwrap();
        assert_eq!(snapshot.card, Money::pln(dec!(100)));
        assert!(snapshot.cash.pln.is_zero());
    }

    #[tokio::test]
    async fn test_settling_twice_is_rejected_without_writes() {
        let s = scenario().await;
        s.service.settle_receipt(s.receipt_id, SettlementType::Cash, None).await.unwrap();

        let again = s.service.settle_receipt(s.receipt_id, SettlementType::Card, None).await;
        assert_err_variant!(again, SettlementError::InvalidStatusTransition { .. });
        assert_eq!(s.store.all_transactions().await.len(), 1);
        assert!(s.store.all_card_transactions().await.is_empty());
    }

    #[tokio::test]
    async fn test_settling_unknown_receipt() {
        let s = scenario().await;
        let result = s.service.settle_receipt(ReceiptId::new(), SettlementType::Cash, None).await;
        assert_err_variant!(result, SettlementError::NotFound { entity: "Receipt", .. });
    }

    #[tokio::test]
    async fn test_settling_approved_receipt_is_rejected() {
        let receipt = TestReceiptBuilder::new().with_status(ReceiptStatus::Approved).build();
        let id = receipt.id;
        let store = StoreBuilder::new().receipt(receipt).build().await;
        let service = ReconciliationService::new(store.clone());

        let result = service.settle_receipt(id, SettlementType::Cash, None).await;
        assert_err_variant!(result, SettlementError::InvalidStatusTransition { .. });
        assert!(store.all_transactions().await.is_empty());
    }
}

mod reversal {
    use super::*;

    async fn settled(s: &Scenario) -> TransactionId {
        s.service
            .settle_receipt(s.receipt_id, SettlementType::Cash, None)
            .await
            .unwrap()
            .entry
            .id()
    }

    #[tokio::test]
    async fn test_reversing_settlement_steps_back_once() {
        let s = scenario().await;
        let before = s.service.balances().await.unwrap();
        let debit = settled(&s).await;

        let outcome = s.service.reverse_transaction(LedgerKind::Cash, debit).await.unwrap();

        assert_eq!(outcome.step, Some(BackwardStep::SettledToSettlement));
        let receipt = outcome.receipt.unwrap();
        assert_receipt_status(&receipt, ReceiptStatus::SentForSettlement);
        assert_eq!(receipt.settlement_type, None);
        assert_eq!(receipt.settled_date, None);
        assert!(receipt.settlement_date.is_some());
        assert_eq!(outcome.orders_reset, 0);

        let reversed = s.store.get_transaction(debit).await.unwrap();
        assert!(reversed.is_reversed);
        assert!(reversed.reversed_at.is_some());
        assert_balances_eq(&s.service.balances().await.unwrap(), &before);
    }

    #[tokio::test]
    async fn test_reversing_card_settlement_steps_back_once() {
        let s = scenario().await;
        let before = s.service.balances().await.unwrap();
        let charge = s
            .service
            .settle_receipt(s.receipt_id, SettlementType::Card, None)
            .await
            .unwrap()
            .entry;
        assert_eq!(charge.ledger(), LedgerKind::Card);
        assert_eq!(charge.receipt_id(), Some(s.receipt_id));

        let outcome = s
            .service
            .reverse_transaction(LedgerKind::Card, charge.id())
            .await
            .unwrap();

        assert_eq!(outcome.step, Some(BackwardStep::SettledToSettlement));
        assert_eq!(outcome.reversed, vec![charge.id()]);
        assert_eq!(outcome.orders_reset, 0);
        let receipt = s.store.receipt(s.receipt_id).await.unwrap();
        assert_receipt_status(&receipt, ReceiptStatus::SentForSettlement);
        assert_eq!(receipt.settlement_type, None);

        let reversed = s.store.get_card_transaction(charge.id()).await.unwrap();
        assert!(reversed.is_reversed);
        let after = s.service.balances().await.unwrap();
        assert_eq!(after.card, before.card);
        assert_balances_eq(&after, &before);
    }

    #[tokio::test]
    async fn test_double_reversal_is_rejected_and_balance_unchanged() {
        let s = scenario().await;
        let debit = settled(&s).await;
        s.service.reverse_transaction(LedgerKind::Cash, debit).await.unwrap();
        let between = s.service.balances().await.unwrap();

        let again = s.service.reverse_transaction(LedgerKind::Cash, debit).await;
        assert_err_variant!(again, SettlementError::AlreadyReversed(_));

        assert_balances_eq(&s.service.balances().await.unwrap(), &between);
        let receipt = s.store.receipt(s.receipt_id).await.unwrap();
        assert_receipt_status(&receipt, ReceiptStatus::SentForSettlement);
    }

    #[tokio::test]
    async fn test_reversing_entry_of_sent_receipt_returns_it_to_approved() {
        let receipt = TestReceiptBuilder::new().build();
        let order = TestOrderBuilder::new().build();
        let partial = TestTransactionBuilder::credit(dec!(40)).for_receipt(receipt.id).build();
        let other = TestTransactionBuilder::debit(dec!(10)).for_receipt(receipt.id).build();
        let (receipt_id, order_id, partial_id, other_id) = (receipt.id, order.id, partial.id, other.id);
        let store = StoreBuilder::new()
            .receipt(receipt)
            .linked_order(receipt_id, order)
            .entry(partial)
            .entry(other)
            .build()
            .await;
        let service = ReconciliationService::new(store.clone());

        let outcome = service.reverse_transaction(LedgerKind::Cash, partial_id).await.unwrap();

        assert_eq!(outcome.step, Some(BackwardStep::SettlementToApproved));
        assert_eq!(outcome.reversed, vec![partial_id, other_id]);
        assert_eq!(outcome.orders_reset, 1);
        let receipt = store.receipt(receipt_id).await.unwrap();
        assert_receipt_status(&receipt, ReceiptStatus::Approved);
        assert_eq!(receipt.settlement_date, None);
        assert_eq!(store.order(order_id).await.unwrap().status, OrderStatus::InProcess);

        let snapshot = service.balances().await.unwrap();
        assert!(snapshot.cash.pln.is_zero());
        assert!(snapshot.card.is_zero());
    }

    #[tokio::test]
    async fn test_reversal_never_skips_a_step() {
        let s = scenario().await;
        let debit = settled(&s).await;
        s.service.reverse_transaction(LedgerKind::Cash, debit).await.unwrap();

        let receipt = s.store.receipt(s.receipt_id).await.unwrap();
        assert_receipt_status(&receipt, ReceiptStatus::SentForSettlement);
        let order_statuses: Vec<_> = s
            .store
            .find_receipt_orders(&[s.receipt_id])
            .await
            .unwrap()
            .into_iter()
            .map(|l| l.order_id)
            .collect();
        for id in order_statuses {
            assert_eq!(s.store.order(id).await.unwrap().status, OrderStatus::InReceipt);
        }
    }

    #[tokio::test]
    async fn test_reversing_unknown_transaction() {
        let s = scenario().await;
        let result = s.service.reverse_transaction(LedgerKind::Card, TransactionId::new()).await;
        assert_err_variant!(result, SettlementError::NotFound { entity: "Transaction", .. });
    }

    #[tokio::test]
    async fn test_linked_entry_of_approved_receipt_reverses_without_cascade() {
        let receipt = TestReceiptBuilder::new().with_status(ReceiptStatus::Approved).build();
        let entry = TestTransactionBuilder::debit(dec!(25)).for_receipt(receipt.id).build();
        let (receipt_id, entry_id) = (receipt.id, entry.id);
        let store = StoreBuilder::new().receipt(receipt).entry(entry).build().await;
        let service = ReconciliationService::new(store.clone());

        let outcome = service.reverse_transaction(LedgerKind::Cash, entry_id).await.unwrap();
        assert!(outcome.step.is_none());
        assert_receipt_status(&store.receipt(receipt_id).await.unwrap(), ReceiptStatus::Approved);
    }
}

mod explicit_returns {
    use super::*;

    #[tokio::test]
    async fn test_return_settled_to_settlement_reverses_only_accruals() {
        let s = scenario().await;
        let debit = s
            .service
            .settle_receipt(s.receipt_id, SettlementType::Cash, None)
            .await
            .unwrap()
            .entry
            .id();
        let payment = TestTransactionBuilder::credit(dec!(30)).for_receipt(s.receipt_id).build();
        let payment_id = payment.id;
        s.store.seed_entry(payment.into()).await;

        let outcome = s.service.return_settled_to_settlement(s.receipt_id).await.unwrap();

        assert_eq!(outcome.reversed, vec![debit]);
        assert!(!s.store.get_transaction(payment_id).await.unwrap().is_reversed);
        assert_receipt_status(&outcome.receipt.unwrap(), ReceiptStatus::SentForSettlement);
    }

    #[tokio::test]
    async fn test_return_to_active_resets_orders() {
        let s = scenario().await;
        let outcome = s.service.return_to_active(s.receipt_id).await.unwrap();

        assert_eq!(outcome.step, Some(BackwardStep::SettlementToApproved));
        assert_eq!(outcome.orders_reset, 2);
        assert!(outcome.reversed.is_empty());
        let snapshot = s.service.balances().await.unwrap();
        assert!(snapshot.cash.pln.is_zero());
    }

    #[tokio::test]
    async fn test_return_to_active_from_settled_is_rejected() {
        let s = scenario().await;
        s.service.settle_receipt(s.receipt_id, SettlementType::Cash, None).await.unwrap();

        let result = s.service.return_to_active(s.receipt_id).await;
        assert_err_variant!(result, SettlementError::InvalidStatusTransition { .. });
        assert_receipt_status(&s.store.receipt(s.receipt_id).await.unwrap(), ReceiptStatus::Settled);
    }

    #[tokio::test]
    async fn test_return_settled_from_sent_is_rejected() {
        let s = scenario().await;
        let result = s.service.return_settled_to_settlement(s.receipt_id).await;
        assert_err_variant!(result, SettlementError::InvalidStatusTransition { .. });
    }

    #[tokio::test]
    async fn test_full_round_trip_back_to_approved() {
        let s = scenario().await;
        s.service.settle_receipt(s.receipt_id, SettlementType::Card, None).await.unwrap();
        s.service.return_settled_to_settlement(s.receipt_id).await.unwrap();
        s.service.return_to_active(s.receipt_id).await.unwrap();

        let receipt = s.store.receipt(s.receipt_id).await.unwrap();
        assert_receipt_status(&receipt, ReceiptStatus::Approved);
        assert_eq!(receipt.version, 3);
        assert!(s.store.all_card_transactions().await.iter().all(|t| t.is_reversed));
    }
}

mod failures {
    use super::*;

    #[tokio::test]
    async fn test_concurrent_update_during_settlement_is_compensated() {
        let s = scenario().await;
        let before = s.service.balances().await.unwrap();
        s.store.interfere_with_next_update();

        let result = s.service.settle_receipt(s.receipt_id, SettlementType::Cash, None).await;
        assert_err_variant!(result, SettlementError::ConcurrentModification(_));

        let receipt = s.store.receipt(s.receipt_id).await.unwrap();
        assert_receipt_status(&receipt, ReceiptStatus::SentForSettlement);
        assert!(s.store.all_transactions().await.iter().all(|t| t.is_reversed));
        assert_balances_eq(&s.service.balances().await.unwrap(), &before);
    }

    #[tokio::test]
    async fn test_failed_first_write_leaves_state_untouched() {
        let s = scenario().await;
        s.store.fail_nth_write(1);

        let err = s
            .service
            .settle_receipt(s.receipt_id, SettlementType::Cash, None)
            .await
            .unwrap_err();
        assert!(matches!(err, SettlementError::Store(_)));
        assert!(err.left_state_untouched());
        assert!(s.store.all_transactions().await.is_empty());
    }

    #[tokio::test]
    async fn test_failed_status_write_reports_written_entry() {
        let s = scenario().await;
        s.store.fail_nth_write(2);

        let err = s
            .service
            .settle_receipt(s.receipt_id, SettlementType::Cash, None)
            .await
            .unwrap_err();

        let written = s.store.all_transactions().await;
        assert_eq!(written.len(), 1);
        match err {
            SettlementError::PartialFailure { step, completed, .. } => {
                assert_eq!(step, "update_receipt");
                assert_eq!(completed, vec![written[0].id.to_string()]);
            }
            other => panic!("expected partial failure, got {:?}", other),
        }
        // The stray entry is linked, so the balance is not distorted
        assert_eq!(s.service.balances().await.unwrap().cash.pln, MoneyFixtures::pln_150());
    }

    #[tokio::test]
    async fn test_failed_order_reset_is_partial() {
        let s = scenario().await;
        s.store.fail_nth_write(2);

        let err = s.service.return_to_active(s.receipt_id).await.unwrap_err();
        assert!(!err.left_state_untouched());
        assert_err_variant!(Err::<(), _>(err), SettlementError::PartialFailure { step: "reset_orders", .. });
        assert_receipt_status(&s.store.receipt(s.receipt_id).await.unwrap(), ReceiptStatus::Approved);
    }
}
