//! Accounts, generation history and credit balances.
//!
//! All three live in an external user service. The pipeline and the auth
//! layer depend only on the traits in [`ledger`]; [`UserApiClient`] talks to
//! the real service and [`InMemoryLedger`] backs local development and tests.

pub mod client;
pub mod error;
pub mod ledger;
pub mod memory;

pub use client::{UserApiClient, UserApiConfig};
pub use error::LedgerError;
pub use ledger::{Account, AccountDirectory, CreditLedger, GenerationLedger, HistoryEntry};
pub use memory::InMemoryLedger;
