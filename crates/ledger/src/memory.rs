//! In-process ledger used when no user service is configured.

use std::collections::HashMap;

use async_trait::async_trait;
use modelgen_core::types::OwnerId;
use tokio::sync::RwLock;

use crate::error::LedgerError;
use crate::ledger::{Account, AccountDirectory, CreditLedger, GenerationLedger, HistoryEntry};

#[derive(Default)]
pub struct InMemoryLedger {
    balances: RwLock<HashMap<OwnerId, i64>>,
    history: RwLock<Vec<(OwnerId, HistoryEntry)>>,
    balance_updates: RwLock<Vec<(OwnerId, i64)>>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an account.
    pub async fn insert_account(&self, owner_id: OwnerId, credit_balance: i64) {
        self.balances.write().await.insert(owner_id, credit_balance);
    }

    pub async fn balance(&self, owner_id: OwnerId) -> Option<i64> {
        self.balances.read().await.get(&owner_id).copied()
    }

    pub async fn history(&self) -> Vec<(OwnerId, HistoryEntry)> {
        self.history.read().await.clone()
    }

    /// Every `set_balance` call, in order.
    pub async fn balance_updates(&self) -> Vec<(OwnerId, i64)> {
        self.balance_updates.read().await.clone()
    }
}

#[async_trait]
impl AccountDirectory for InMemoryLedger {
    async fn lookup(&self, owner_id: OwnerId) -> Result<Option<Account>, LedgerError> {
        Ok(self.balance(owner_id).await.map(|credit_balance| Account {
            id: owner_id,
            credit_balance,
        }))
    }
}

#[async_trait]
impl GenerationLedger for InMemoryLedger {
    async fn record(&self, owner_id: OwnerId, entry: &HistoryEntry) -> Result<(), LedgerError> {
        self.history.write().await.push((owner_id, entry.clone()));
        Ok(())
    }
}

#[async_trait]
impl CreditLedger for InMemoryLedger {
    async fn set_balance(&self, owner_id: OwnerId, balance: i64) -> Result<(), LedgerError> {
        self.balances.write().await.insert(owner_id, balance);
        self.balance_updates.write().await.push((owner_id, balance));
        Ok(())
    }
}
