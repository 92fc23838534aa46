//! Request and response bodies

pub mod balance;
pub mod ledger;
pub mod receipt;
