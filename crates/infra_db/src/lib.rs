//! Infrastructure Database Layer
//!
//! PostgreSQL persistence for the settlement core, built on SQLx.
//!
//! # Architecture
//!
//! The crate follows the repository pattern. `repositories` holds the SQL and
//! row types, `adapters` implements the domain's `SettlementStore` port on top
//! of them.
//!
//! Receipt updates are compare-and-swap on a `version` column and ledger
//! reversal is conditional on the row still being live, so two concurrent
//! operators cannot both win.
//!
//! # Example
//!
//! ```rust,ignore
//! use infra_db::{create_pool, run_migrations, DatabaseConfig, PostgresSettlementStore};
//!
//! let pool = create_pool(DatabaseConfig::new("postgres://localhost/settlement")).await?;
//! run_migrations(&pool).await?;
//! let store = PostgresSettlementStore::new(pool);
//! ```

pub mod pool;
pub mod error;
pub mod repositories;
pub mod adapters;

pub use pool::{DatabasePool, create_pool, run_migrations, DatabaseConfig};
pub use error::DatabaseError;
pub use repositories::SettlementRepository;
pub use adapters::PostgresSettlementStore;
