//! Property tests for the balance calculator and reversal

use chrono::Utc;
use proptest::prelude::*;
use rust_decimal::Decimal;

use core_kernel::Money;
use domain_settlement::balance::{card_balance, cash_balance, snapshot};
use domain_settlement::{
    BalanceInputs, InMemorySettlementStore, LedgerKind, NewLedgerEntry, ReconciliationService,
    ReceiptStatus, Transaction, TransactionType,
};
use test_utils::{
    balance_inputs_strategy, positive_amount_strategy, receipt_strategy, transaction_strategy,
};

fn card_of(inputs: &BalanceInputs) -> Money {
    card_balance(
        &inputs.receipts,
        &inputs.receipt_orders,
        &inputs.orders,
        &inputs.card_transactions,
    )
}

proptest! {
    #[test]
    fn balance_is_idempotent(inputs in balance_inputs_strategy()) {
        let at = Utc::now();
        prop_assert_eq!(snapshot(&inputs, at), snapshot(&inputs, at));
    }

    #[test]
    fn reversed_entry_has_no_effect(
        inputs in balance_inputs_strategy(),
        extra in transaction_strategy(),
    ) {
        let before = cash_balance(&inputs.receipts, &inputs.transactions);

        let mut reversed = extra;
        reversed.receipt_id = None;
        reversed.is_reversed = true;
        let mut with_reversed = inputs.transactions.clone();
        with_reversed.push(reversed);

        prop_assert_eq!(cash_balance(&inputs.receipts, &with_reversed), before);
    }

    #[test]
    fn manual_entry_moves_balance_by_its_signed_amount(
        inputs in balance_inputs_strategy(),
        extra in transaction_strategy(),
    ) {
        let before = cash_balance(&inputs.receipts, &inputs.transactions);

        let mut live = extra;
        live.receipt_id = None;
        live.is_reversed = false;
        let delta_pln = live.signed_pln();
        let delta_usd = live.signed_usd();
        let mut with_live = inputs.transactions.clone();
        with_live.push(live);

        let after = cash_balance(&inputs.receipts, &with_live);
        prop_assert_eq!(after.pln, before.pln + delta_pln);
        prop_assert_eq!(after.usd, before.usd + delta_usd);
    }

    #[test]
    fn settlement_entry_is_never_counted_twice(
        inputs in balance_inputs_strategy(),
        receipt in receipt_strategy(),
    ) {
        let mut receipts = inputs.receipts.clone();
        receipts.push(receipt.clone());
        let with_receipt = cash_balance(&receipts, &inputs.transactions);

        // The mirrored debit that settling writes, linked to the receipt
        let mirror = Transaction::new(
            TransactionType::Debit,
            receipt.cash_total_pln().amount(),
            receipt.transport_usd().amount(),
            "settlement",
            Utc::now().date_naive(),
        )
        .for_receipt(receipt.id);
        let mut transactions = inputs.transactions.clone();
        transactions.push(mirror);

        prop_assert_eq!(cash_balance(&receipts, &transactions), with_receipt);

        let without_receipt = cash_balance(&inputs.receipts, &inputs.transactions);
        let contribution = if receipt.participates_in(LedgerKind::Cash) {
            receipt.cash_total_pln().amount()
        } else {
            Decimal::ZERO
        };
        prop_assert_eq!(with_receipt.pln.amount() - without_receipt.pln.amount(), contribution);
    }

    #[test]
    fn inactive_receipts_never_count(inputs in balance_inputs_strategy()) {
        let active: Vec<_> = inputs
            .receipts
            .iter()
            .filter(|r| matches!(r.status, ReceiptStatus::SentForSettlement | ReceiptStatus::Settled))
            .cloned()
            .collect();
        let mut only_active = inputs.clone();
        only_active.receipts = active;

        prop_assert_eq!(
            cash_balance(&inputs.receipts, &inputs.transactions),
            cash_balance(&only_active.receipts, &only_active.transactions)
        );
        prop_assert_eq!(card_of(&inputs), card_of(&only_active));
    }

    #[test]
    fn recording_then_reversing_restores_balance(
        amounts in prop::collection::vec(positive_amount_strategy(), 1..6),
    ) {
        let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
        runtime.block_on(async {
            let service = ReconciliationService::new(std::sync::Arc::new(InMemorySettlementStore::new()));
            let before = service.balances().await.unwrap();

            let mut ids = Vec::new();
            for (i, amount) in amounts.iter().enumerate() {
                let entry = if i % 2 == 0 {
                    service.record_charge(NewLedgerEntry::card(*amount, "fee")).await.unwrap()
                } else {
                    service.record_payment(NewLedgerEntry::card(*amount, "card")).await.unwrap()
                };
                ids.push(entry.id());
            }
            for id in ids {
                service.reverse_transaction(LedgerKind::Card, id).await.unwrap();
            }

            let after = service.balances().await.unwrap();
            assert_eq!(after.card, before.card);
            assert_eq!(after.cash, before.cash);
        });
    }
}
