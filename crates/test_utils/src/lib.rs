//! Test Utilities Crate
//!
//! Shared test infrastructure for the settlement workspace.
//!
//! # Modules
//!
//! - `fixtures`: Deterministic amounts, dates, ids and names
//! - `builders`: Builders for receipts, orders, ledger entries and seeded stores
//! - `database`: PostgreSQL test containers with the settlement schema
//! - `assertions`: Assertion helpers for money and balances
//! - `generators`: Property-based test data generators

pub mod fixtures;
pub mod builders;
pub mod database;
pub mod assertions;
pub mod generators;

pub use fixtures::*;
pub use builders::*;
pub use database::*;
pub use assertions::*;
pub use generators::*;
