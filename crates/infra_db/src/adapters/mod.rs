//! Domain Adapters
//!
//! Implementations of domain ports backed by PostgreSQL. Each adapter
//! translates between row types and domain models and delegates the SQL to a
//! repository.

pub mod settlement;

pub use settlement::PostgresSettlementStore;
