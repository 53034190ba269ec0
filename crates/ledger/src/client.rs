//! HTTP client for the external user service.
//!
//! | Operation      | Request                                             |
//! |----------------|-----------------------------------------------------|
//! | lookup         | `GET  /api/users/{id}`        -> `{ id, imageCredit }` |
//! | record         | `POST /api/generations`       `{ data: { ... } }`   |
//! | set_balance    | `PUT  /api/users/{id}`        `{ imageCredit }`     |

use std::time::Duration;

use async_trait::async_trait;
use modelgen_core::types::OwnerId;
use serde::Deserialize;
use serde_json::json;

use crate::error::LedgerError;
use crate::ledger::{Account, AccountDirectory, CreditLedger, GenerationLedger, HistoryEntry};

const HTTP_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Clone)]
pub struct UserApiConfig {
    pub base_url: String,
    pub api_key: String,
}

impl UserApiConfig {
    /// Reads `USER_API_URL` and `USER_API_KEY`. Returns `None` when the URL
    /// is unset.
    pub fn from_env() -> Result<Option<Self>, LedgerError> {
        let Ok(base_url) = std::env::var("USER_API_URL") else {
            return Ok(None);
        };
        let api_key = std::env::var("USER_API_KEY")
            .map_err(|_| LedgerError::NotConfigured("USER_API_KEY is not set".into()))?;
        Ok(Some(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        }))
    }
}

pub struct UserApiClient {
    client: reqwest::Client,
    config: UserApiConfig,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UserRecord {
    id: OwnerId,
    #[serde(default)]
    image_credit: Option<i64>,
}

impl UserApiClient {
    pub fn new(config: UserApiConfig) -> Result<Self, LedgerError> {
        let client = reqwest::Client::builder().timeout(HTTP_TIMEOUT).build()?;
        Ok(Self { client, config })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.config.base_url)
    }

    async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, LedgerError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(LedgerError::Api {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }
}

#[async_trait]
impl AccountDirectory for UserApiClient {
    async fn lookup(&self, owner_id: OwnerId) -> Result<Option<Account>, LedgerError> {
        let response = self
            .client
            .get(self.url(&format!("/api/users/{owner_id}")))
            .bearer_auth(&self.config.api_key)
            .send()
            .await?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let user: UserRecord = Self::ensure_success(response)
            .await?
            .json()
            .await
            .map_err(|e| LedgerError::Decode(e.to_string()))?;

        Ok(Some(Account {
            id: user.id,
            credit_balance: user.image_credit.unwrap_or(0),
        }))
    }
}

#[async_trait]
impl GenerationLedger for UserApiClient {
    async fn record(&self, owner_id: OwnerId, entry: &HistoryEntry) -> Result<(), LedgerError> {
        let body = json!({
            "data": {
                "input_url": entry.input_ref,
                "output_url": entry.output_ref,
                "swaped_url": entry.transferred_ref,
                "success": entry.success,
                "type": entry.kind,
                "users_permissions_user": owner_id,
            }
        });
        let response = self
            .client
            .post(self.url("/api/generations"))
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await?;
        Self::ensure_success(response).await?;
        Ok(())
    }
}

#[async_trait]
impl CreditLedger for UserApiClient {
    async fn set_balance(&self, owner_id: OwnerId, balance: i64) -> Result<(), LedgerError> {
        let response = self
            .client
            .put(self.url(&format!("/api/users/{owner_id}")))
            .bearer_auth(&self.config.api_key)
            .json(&json!({ "imageCredit": balance }))
            .send()
            .await?;
        Self::ensure_success(response).await?;
        tracing::info!(owner_id, balance, "Credit balance updated");
        Ok(())
    }
}
