//! Settlement Domain - Mutual Settlement Reconciliation
//!
//! This crate holds the reconciliation core for supplier settlement: how the
//! cash and card balances are derived, how delivery receipts move through
//! their lifecycle, and how reversals cascade back through receipt state.
//!
//! # Ledgers
//!
//! - **Cash**: PLN cash-on-delivery plus USD transport costs
//!   (`debit` increases what is owed, `credit` reduces it)
//! - **Card**: PLN only (`charge` increases, `payment` reduces)
//!
//! # Receipt lifecycle
//!
//! `draft → approved → sent_for_settlement → settled`, with single-step
//! backward moves `settled → sent_for_settlement → approved`.
//!
//! # Example
//!
//! ```rust,ignore
//! use domain_settlement::{ReconciliationService, SettlementType};
//!
//! let service = ReconciliationService::new(store);
//! service.settle_receipt(receipt_id, SettlementType::Cash, Some("anna".into())).await?;
//! let snapshot = service.balances().await?;
//! ```

pub mod ledger;
pub mod receipt;
pub mod order;
pub mod lifecycle;
pub mod balance;
pub mod ports;
pub mod service;
pub mod error;

pub use ledger::{CardTransaction, CardTransactionType, LedgerEntry, LedgerKind, Transaction, TransactionType};
pub use receipt::{ActiveReceipt, ReceiptStatus, SettlementType};
pub use order::{Order, OrderStatus, PaymentType, ReceiptOrder};
pub use lifecycle::{plan_step_back, BackwardStep};
pub use balance::{BalanceInputs, BalanceSnapshot, CashBalance, ReceiptContribution};
pub use ports::{ReceiptQuery, SettlementStore, SettlementStoreExt, TransactionQuery};
pub use ports::memory::InMemorySettlementStore;
pub use service::{NewLedgerEntry, ReconciliationService, ReversalOutcome, SettlementOutcome};
pub use error::SettlementError;
