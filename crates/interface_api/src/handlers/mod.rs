//! Request handlers

pub mod balances;
pub mod health;
pub mod ledgers;
pub mod receipts;
