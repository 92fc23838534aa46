//! Repository implementations
//!
//! Repositories own the SQL. They speak in row types and `DatabaseError`
//! and know nothing about the domain enums.

pub mod settlement;

pub use settlement::{LedgerTable, SettlementRepository};
