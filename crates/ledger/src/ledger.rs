use async_trait::async_trait;
use modelgen_core::types::OwnerId;
use serde::Serialize;

use crate::error::LedgerError;

/// What the auth layer needs to know about a caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub id: OwnerId,
    pub credit_balance: i64,
}

/// One line of a user's generation history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HistoryEntry {
    pub input_ref: Option<String>,
    pub output_ref: Option<String>,
    pub transferred_ref: Option<String>,
    pub success: bool,
    /// History type label, `IMAGE` for every image pipeline.
    pub kind: String,
}

#[async_trait]
pub trait AccountDirectory: Send + Sync {
    /// `Ok(None)` when the owner does not exist.
    async fn lookup(&self, owner_id: OwnerId) -> Result<Option<Account>, LedgerError>;
}

/// Append-only generation history.
#[async_trait]
pub trait GenerationLedger: Send + Sync {
    async fn record(&self, owner_id: OwnerId, entry: &HistoryEntry) -> Result<(), LedgerError>;
}

#[async_trait]
pub trait CreditLedger: Send + Sync {
    /// Store a new absolute balance.
    async fn set_balance(&self, owner_id: OwnerId, balance: i64) -> Result<(), LedgerError>;
}
