//! Core Kernel - Foundational types shared by the settlement crates
//!
//! - Money types with precise decimal arithmetic (PLN and USD)
//! - Strongly-typed identifiers for receipts, orders and ledger entries
//! - Port infrastructure for swappable storage adapters

pub mod money;
pub mod identifiers;
pub mod ports;
pub mod error;

pub use money::{Money, Currency, MoneyError};
pub use identifiers::{ReceiptId, OrderId, TransactionId};
pub use ports::{PortError, DomainPort, HealthCheckable, HealthCheckResult, AdapterHealth};
pub use error::CoreError;
