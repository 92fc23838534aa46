//! Reconciliation actions
//!
//! Every action reads what it needs first, then writes in a fixed order:
//!
//! 1. ledger insert or reversal
//! 2. receipt status (compare-and-swap on `version`)
//! 3. linked order reset
//!
//! The store has no multi-statement transactions. A failure before the first
//! write leaves state untouched and is returned as the plain error. A failure
//! after a write is logged with the ids already written and returned as
//! [`SettlementError::PartialFailure`] so an operator can finish by hand.

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

use core_kernel::{OrderId, PortError, ReceiptId, TransactionId};

use crate::balance::{self, BalanceInputs, BalanceSnapshot, ReceiptContribution};
use crate::error::SettlementError;
use crate::ledger::{CardTransaction, CardTransactionType, LedgerEntry, LedgerKind, Transaction, TransactionType};
use crate::lifecycle::{plan_step_back, BackwardStep};
use crate::order::OrderStatus;
use crate::ports::{ReceiptQuery, SettlementStore, SettlementStoreExt, TransactionQuery};
use crate::receipt::{ActiveReceipt, ReceiptStatus, SettlementType};

/// Status linked orders are reset to when their receipt returns to approved
pub const ORDER_RESET_STATUS: OrderStatus = OrderStatus::InProcess;

/// Ledger amounts are stored in minor units (grosze, cents)
pub const AMOUNT_SCALE: u32 = 2;

/// A manual ledger entry requested by an operator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewLedgerEntry {
    pub ledger: LedgerKind,
    pub amount_pln: Decimal,
    /// Transport cost; cash ledger only
    pub amount_usd: Decimal,
    pub transaction_date: NaiveDate,
    pub description: String,
    pub created_by: Option<String>,
}

impl NewLedgerEntry {
    pub fn cash(amount_pln: Decimal, amount_usd: Decimal, description: impl Into<String>) -> Self {
        Self {
            ledger: LedgerKind::Cash,
            amount_pln,
            amount_usd,
            transaction_date: Utc::now().date_naive(),
            description: description.into(),
            created_by: None,
        }
    }

    pub fn card(amount_pln: Decimal, description: impl Into<String>) -> Self {
        Self {
            ledger: LedgerKind::Card,
            amount_pln,
            amount_usd: Decimal::ZERO,
            transaction_date: Utc::now().date_naive(),
            description: description.into(),
            created_by: None,
        }
    }

    pub fn on(mut self, date: NaiveDate) -> Self {
        self.transaction_date = date;
        self
    }

    pub fn with_operator(mut self, operator: impl Into<String>) -> Self {
        self.created_by = Some(operator.into());
        self
    }

    fn validate(&self, direction: Direction) -> Result<(), SettlementError> {
        if self.amount_pln.is_sign_negative() || self.amount_usd.is_sign_negative() {
            return Err(SettlementError::validation("amounts must not be negative"));
        }
        if self.ledger == LedgerKind::Card && !self.amount_usd.is_zero() {
            return Err(SettlementError::validation("card entries are PLN only"));
        }
        if self.amount_pln.normalize().scale() > AMOUNT_SCALE
            || self.amount_usd.normalize().scale() > AMOUNT_SCALE
        {
            return Err(SettlementError::validation(format!(
                "amounts are limited to {} decimal places",
                AMOUNT_SCALE
            )));
        }
        if self.amount_pln <= Decimal::ZERO && self.amount_usd <= Decimal::ZERO {
            return Err(SettlementError::validation("amount must be greater than zero"));
        }
        if direction == Direction::Charge
            && self.ledger == LedgerKind::Cash
            && self.description.trim().is_empty()
        {
            return Err(SettlementError::validation("cash charges require a description"));
        }
        Ok(())
    }

    fn into_entry(self, direction: Direction) -> LedgerEntry {
        let description = self.description.trim().to_string();
        match self.ledger {
            LedgerKind::Cash => {
                let transaction_type = match direction {
                    Direction::Payment => TransactionType::Credit,
                    Direction::Charge => TransactionType::Debit,
                };
                Transaction::new(
                    transaction_type,
                    self.amount_pln,
                    self.amount_usd,
                    description,
                    self.transaction_date,
                )
                .created_by(self.created_by)
                .into()
            }
            LedgerKind::Card => {
                let transaction_type = match direction {
                    Direction::Payment => CardTransactionType::Payment,
                    Direction::Charge => CardTransactionType::Charge,
                };
                CardTransaction::new(transaction_type, self.amount_pln, description, self.transaction_date)
                    .created_by(self.created_by)
                    .into()
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Payment,
    Charge,
}

/// Result of settling a receipt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementOutcome {
    pub receipt: ActiveReceipt,
    /// The generated debit or charge, linked to the receipt
    pub entry: LedgerEntry,
}

/// Result of a reversal or an explicit return action
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReversalOutcome {
    /// Every entry flagged reversed by the action, in write order
    pub reversed: Vec<TransactionId>,
    /// The receipt after its backward step, if one was taken
    pub receipt: Option<ActiveReceipt>,
    pub step: Option<BackwardStep>,
    pub orders_reset: u64,
}

/// Entry point for every reconciliation action
#[derive(Clone)]
pub struct ReconciliationService {
    store: Arc<dyn SettlementStore>,
}

impl ReconciliationService {
    pub fn new(store: Arc<dyn SettlementStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn SettlementStore> {
        &self.store
    }

    /// Appends a credit (cash) or payment (card) entry
    #[instrument(skip(self, entry), fields(ledger = %entry.ledger))]
    pub async fn record_payment(&self, entry: NewLedgerEntry) -> Result<LedgerEntry, SettlementError> {
        self.record(entry, Direction::Payment).await
    }

    /// Appends a debit (cash) or charge (card) entry
    #[instrument(skip(self, entry), fields(ledger = %entry.ledger))]
    pub async fn record_charge(&self, entry: NewLedgerEntry) -> Result<LedgerEntry, SettlementError> {
        self.record(entry, Direction::Charge).await
    }

    async fn record(&self, entry: NewLedgerEntry, direction: Direction) -> Result<LedgerEntry, SettlementError> {
        entry.validate(direction)?;
        let entry = entry.into_entry(direction);
        self.store.insert_entry(&entry).await?;
        info!(
            transaction_id = %entry.id(),
            amount_pln = %entry.signed_pln(),
            "Recorded manual ledger entry"
        );
        Ok(entry)
    }

    /// sent_for_settlement → settled, writing the mirrored accrual
    #[instrument(skip(self, settlement_type, created_by), fields(settlement_type = %settlement_type.as_str()))]
    pub async fn settle_receipt(
        &self,
        receipt_id: ReceiptId,
        settlement_type: SettlementType,
        created_by: Option<String>,
    ) -> Result<SettlementOutcome, SettlementError> {
        let receipt = self.load_receipt(receipt_id).await?;
        let expected_version = receipt.version;
        let now = Utc::now();
        let today = now.date_naive();

        let mut settled = receipt.clone();
        settled.mark_settled(settlement_type, today, now)?;

        let entry = self
            .settlement_entry(&receipt, settlement_type, today, created_by)
            .await?;
        self.store.insert_entry(&entry).await?;
        debug!(transaction_id = %entry.id(), "Inserted settlement entry");

        match self.store.update_receipt(&settled, expected_version).await {
            Ok(receipt) => {
                info!(
                    receipt_number = %receipt.receipt_number,
                    transaction_id = %entry.id(),
                    "Receipt settled"
                );
                Ok(SettlementOutcome { receipt, entry })
            }
            Err(e) if e.is_conflict() => {
                warn!("Receipt changed during settlement, reversing the new entry");
                self.store
                    .mark_entry_reversed(entry.ledger(), entry.id(), Utc::now())
                    .await
                    .map_err(|source| {
                        partial_failure("compensate_settlement", vec![entry.id().to_string()], source)
                    })?;
                Err(SettlementError::ConcurrentModification(receipt_id))
            }
            Err(source) => Err(partial_failure(
                "update_receipt",
                vec![entry.id().to_string()],
                source,
            )),
        }
    }

    /// Reverses one ledger entry and, if it belongs to a receipt in
    /// settlement, moves that receipt exactly one step back
    #[instrument(skip(self))]
    pub async fn reverse_transaction(
        &self,
        ledger: LedgerKind,
        transaction_id: TransactionId,
    ) -> Result<ReversalOutcome, SettlementError> {
        let entry = self
            .store
            .get_entry(ledger, transaction_id)
            .await
            .map_err(|e| SettlementError::from_lookup(e, "Transaction", transaction_id))?;
        if entry.is_reversed() {
            return Err(SettlementError::AlreadyReversed(transaction_id));
        }

        let cascade = match entry.receipt_id() {
            Some(receipt_id) => {
                let receipt = self.load_receipt(receipt_id).await?;
                match plan_step_back(receipt.status) {
                    Ok(step) => Some(self.plan_unwind(receipt, step).await?),
                    Err(_) => {
                        debug!(status = %receipt.status, "Linked receipt is not in settlement, no cascade");
                        None
                    }
                }
            }
            None => None,
        };

        self.store
            .mark_entry_reversed(ledger, transaction_id, Utc::now())
            .await
            .map_err(|e| {
                if e.is_conflict() {
                    SettlementError::AlreadyReversed(transaction_id)
                } else {
                    SettlementError::Store(e)
                }
            })?;
        info!("Transaction reversed");

        let written = vec![transaction_id];
        match cascade {
            Some(plan) => self.apply_unwind(plan, written).await,
            None => Ok(ReversalOutcome {
                reversed: written,
                receipt: None,
                step: None,
                orders_reset: 0,
            }),
        }
    }

    /// settled → sent_for_settlement, reversing the settlement accruals
    #[instrument(skip(self))]
    pub async fn return_settled_to_settlement(
        &self,
        receipt_id: ReceiptId,
    ) -> Result<ReversalOutcome, SettlementError> {
        self.return_receipt(receipt_id, ReceiptStatus::Settled).await
    }

    /// sent_for_settlement → approved, reversing linked entries and resetting
    /// linked orders
    #[instrument(skip(self))]
    pub async fn return_to_active(&self, receipt_id: ReceiptId) -> Result<ReversalOutcome, SettlementError> {
        self.return_receipt(receipt_id, ReceiptStatus::SentForSettlement).await
    }

    async fn return_receipt(
        &self,
        receipt_id: ReceiptId,
        required: ReceiptStatus,
    ) -> Result<ReversalOutcome, SettlementError> {
        let receipt = self.load_receipt(receipt_id).await?;
        let step = plan_step_back(receipt.status)?;
        if step.from_status() != required {
            return Err(SettlementError::invalid_transition(receipt.status, step.to_status()));
        }
        let plan = self.plan_unwind(receipt, step).await?;
        self.apply_unwind(plan, Vec::new()).await
    }

    /// Current balances of both ledgers, computed from fresh reads
    #[instrument(skip(self))]
    pub async fn balances(&self) -> Result<BalanceSnapshot, SettlementError> {
        let inputs = self.balance_inputs().await?;
        let snapshot = balance::snapshot(&inputs, Utc::now());
        debug!(
            cash_pln = %snapshot.cash.pln,
            cash_usd = %snapshot.cash.usd,
            card = %snapshot.card,
            "Computed balances"
        );
        Ok(snapshot)
    }

    /// Per-receipt contributions to the current balances
    #[instrument(skip(self))]
    pub async fn receipt_breakdown(&self) -> Result<Vec<ReceiptContribution>, SettlementError> {
        let inputs = self.balance_inputs().await?;
        Ok(balance::receipt_breakdown(
            &inputs.receipts,
            &inputs.receipt_orders,
            &inputs.orders,
        ))
    }

    async fn balance_inputs(&self) -> Result<BalanceInputs, SettlementError> {
        let receipts = self.store.find_receipts(ReceiptQuery::balance_eligible()).await?;
        let transactions = self.store.find_transactions(TransactionQuery::history()).await?;
        let card_transactions = self.store.find_card_transactions(TransactionQuery::history()).await?;
        let receipt_ids: Vec<ReceiptId> = receipts.iter().map(|r| r.id).collect();
        let (receipt_orders, orders) = self.store.find_linked_orders(&receipt_ids).await?;

        Ok(BalanceInputs {
            receipts,
            transactions,
            card_transactions,
            receipt_orders,
            orders,
        })
    }

    async fn load_receipt(&self, receipt_id: ReceiptId) -> Result<ActiveReceipt, SettlementError> {
        self.store
            .get_receipt(receipt_id)
            .await
            .map_err(|e| SettlementError::from_lookup(e, "Receipt", receipt_id))
    }

    async fn settlement_entry(
        &self,
        receipt: &ActiveReceipt,
        settlement_type: SettlementType,
        on: NaiveDate,
        created_by: Option<String>,
    ) -> Result<LedgerEntry, SettlementError> {
        let description = format!("Settlement of receipt {}", receipt.receipt_number);
        let entry = match settlement_type {
            SettlementType::Cash => Transaction::new(
                TransactionType::Debit,
                receipt.cash_total_pln().amount(),
                receipt.transport_usd().amount(),
                description,
                on,
            )
            .for_receipt(receipt.id)
            .created_by(created_by)
            .into(),
            SettlementType::Card => {
                let (links, orders) = self.store.find_linked_orders(&[receipt.id]).await?;
                let amount = balance::receipt_card_amount(receipt.id, &links, &orders);
                CardTransaction::new(CardTransactionType::Charge, amount.amount(), description, on)
                    .for_receipt(receipt.id)
                    .created_by(created_by)
                    .into()
            }
        };
        Ok(entry)
    }

    /// Reads everything a backward step will touch, before any write
    async fn plan_unwind(&self, receipt: ActiveReceipt, step: BackwardStep) -> Result<Unwind, SettlementError> {
        let entries = self
            .store
            .find_linked_entries(receipt.id)
            .await?
            .into_iter()
            .filter(|e| step.reverses(e))
            .collect();
        let order_ids = if step.resets_orders() {
            self.store
                .find_receipt_orders(&[receipt.id])
                .await?
                .into_iter()
                .map(|l| l.order_id)
                .collect()
        } else {
            Vec::new()
        };
        Ok(Unwind {
            receipt,
            step,
            entries,
            order_ids,
        })
    }

    /// Applies one backward step: linked reversals, receipt CAS, order reset
    ///
    /// `written` holds entries the caller already reversed; they are skipped.
    async fn apply_unwind(
        &self,
        plan: Unwind,
        mut written: Vec<TransactionId>,
    ) -> Result<ReversalOutcome, SettlementError> {
        let Unwind {
            mut receipt,
            step,
            entries,
            order_ids,
        } = plan;
        let receipt_id = receipt.id;

        for entry in &entries {
            if written.contains(&entry.id()) {
                continue;
            }
            match self
                .store
                .mark_entry_reversed(entry.ledger(), entry.id(), Utc::now())
                .await
            {
                Ok(()) => {
                    debug!(transaction_id = %entry.id(), "Reversed linked entry");
                    written.push(entry.id());
                }
                Err(e) if e.is_conflict() => {
                    warn!(transaction_id = %entry.id(), "Linked entry was already reversed");
                }
                Err(source) => {
                    return Err(partial_failure("reverse_linked_entry", ids(&written), source));
                }
            }
        }

        let expected_version = receipt.version;
        receipt.step_back(Utc::now())?;
        let receipt = match self.store.update_receipt(&receipt, expected_version).await {
            Ok(stored) => stored,
            Err(source) if written.is_empty() => {
                return Err(if source.is_conflict() {
                    SettlementError::ConcurrentModification(receipt_id)
                } else {
                    SettlementError::Store(source)
                });
            }
            Err(source) => return Err(partial_failure("update_receipt", ids(&written), source)),
        };
        info!(
            receipt_number = %receipt.receipt_number,
            from = %step.from_status(),
            to = %step.to_status(),
            "Receipt moved one step back"
        );

        let mut orders_reset = 0;
        if step.resets_orders() && !order_ids.is_empty() {
            orders_reset = self
                .store
                .update_order_status(&order_ids, ORDER_RESET_STATUS)
                .await
                .map_err(|source| {
                    let mut completed = ids(&written);
                    completed.push(receipt_id.to_string());
                    partial_failure("reset_orders", completed, source)
                })?;
            info!(orders_reset, "Linked orders reset");
        }

        Ok(ReversalOutcome {
            reversed: written,
            receipt: Some(receipt),
            step: Some(step),
            orders_reset,
        })
    }
}

struct Unwind {
    receipt: ActiveReceipt,
    step: BackwardStep,
    entries: Vec<LedgerEntry>,
    order_ids: Vec<OrderId>,
}

fn ids(written: &[TransactionId]) -> Vec<String> {
    written.iter().map(ToString::to_string).collect()
}

fn partial_failure(step: &'static str, completed: Vec<String>, source: PortError) -> SettlementError {
    error!(step, completed = ?completed, error = %source, "Reconciliation action failed part way, manual fix needed");
    SettlementError::PartialFailure {
        step,
        completed,
        source,
    }
}
