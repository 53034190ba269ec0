//! Replicate predictions client.
//!
//! Runs a model version via `POST /predictions` with `Prefer: wait`. If the
//! prediction is still running when the sync window closes, `urls.get` is
//! polled until it reaches a terminal status or the poll timeout expires.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::adapters::{FaceSwapper, GenerationRequest, ImageGenerator};
use crate::error::ProviderError;
use crate::output::ProviderOutput;

pub const DEFAULT_API_BASE: &str = "https://api.replicate.com/v1";
pub const DEFAULT_GENERATION_VERSION: &str =
    "openai/gpt-image-1:a6198aeaea27df5f3a9f11335cd61b2031729f9527cd34e6cdb4bb3ee9355b87";
pub const DEFAULT_FACE_SWAP_VERSION: &str =
    "cdingram/face-swap:d1d6ea8c8be89d664a07a457526f7128109dee7030fdac424788d762c71ed111";

/// Per-request HTTP timeout. The sync window itself is at most 60s.
const HTTP_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, Clone)]
pub struct ReplicateConfig {
    pub api_base: String,
    pub api_token: String,
    pub generation_version: String,
    pub face_swap_version: String,
    /// Forwarded to models that call OpenAI on the caller's behalf.
    pub openai_api_key: Option<String>,
    pub poll_interval: Duration,
    pub poll_timeout: Duration,
}

impl ReplicateConfig {
    /// Load from the environment.
    ///
    /// | Env Var                         | Default                          |
    /// |---------------------------------|----------------------------------|
    /// | `REPLICATE_API_TOKEN`           | required                         |
    /// | `REPLICATE_API_BASE`            | `https://api.replicate.com/v1`   |
    /// | `REPLICATE_GENERATION_VERSION`  | `openai/gpt-image-1:<version>`   |
    /// | `REPLICATE_FACE_SWAP_VERSION`   | `cdingram/face-swap:<version>`   |
    /// | `OPENAI_API_KEY`                | unset                            |
    pub fn from_env() -> Result<Self, ProviderError> {
        let api_token = std::env::var("REPLICATE_API_TOKEN")
            .map_err(|_| ProviderError::NotConfigured("REPLICATE_API_TOKEN is not set".into()))?;

        Ok(Self {
            api_base: std::env::var("REPLICATE_API_BASE")
                .unwrap_or_else(|_| DEFAULT_API_BASE.into())
                .trim_end_matches('/')
                .to_string(),
            api_token,
            generation_version: std::env::var("REPLICATE_GENERATION_VERSION")
                .unwrap_or_else(|_| DEFAULT_GENERATION_VERSION.into()),
            face_swap_version: std::env::var("REPLICATE_FACE_SWAP_VERSION")
                .unwrap_or_else(|_| DEFAULT_FACE_SWAP_VERSION.into()),
            openai_api_key: std::env::var("OPENAI_API_KEY").ok(),
            poll_interval: Duration::from_secs(1),
            poll_timeout: Duration::from_secs(300),
        })
    }
}

pub struct ReplicateClient {
    client: reqwest::Client,
    config: ReplicateConfig,
}

impl ReplicateClient {
    pub fn new(config: ReplicateConfig) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder().timeout(HTTP_TIMEOUT).build()?;
        Ok(Self { client, config })
    }

    /// Run `version` with `input` and return the prediction's `output` value.
    pub async fn run(&self, version: &str, input: Value) -> Result<Value, ProviderError> {
        tracing::info!(version, "Running Replicate prediction");

        let response = self
            .client
            .post(format!("{}/predictions", self.config.api_base))
            .bearer_auth(&self.config.api_token)
            .header("Prefer", "wait")
            .json(&json!({ "version": version, "input": input }))
            .send()
            .await?;
        let mut prediction: Value = Self::ensure_success(response).await?.json().await?;

        let started = Instant::now();
        loop {
            match prediction_status(&prediction).as_str() {
                "succeeded" => {
                    return prediction.get("output").cloned().ok_or_else(|| {
                        ProviderError::UnexpectedOutput("prediction has no output".into())
                    });
                }
                status @ ("failed" | "canceled") => {
                    return Err(ProviderError::PredictionFailed {
                        status: status.to_string(),
                        detail: prediction
                            .get("error")
                            .map(|e| e.to_string())
                            .unwrap_or_default(),
                    });
                }
                "starting" | "processing" => {
                    if started.elapsed() >= self.config.poll_timeout {
                        return Err(ProviderError::Timeout(self.config.poll_timeout.as_secs()));
                    }
                    let poll_url = prediction
                        .pointer("/urls/get")
                        .and_then(Value::as_str)
                        .map(str::to_string)
                        .ok_or_else(|| {
                            ProviderError::UnexpectedOutput("prediction missing poll URL".into())
                        })?;
                    tokio::time::sleep(self.config.poll_interval).await;
                    prediction = self.fetch_prediction(&poll_url).await?;
                }
                other => {
                    return Err(ProviderError::UnexpectedOutput(format!(
                        "unknown prediction status '{other}'"
                    )));
                }
            }
        }
    }

    async fn fetch_prediction(&self, url: &str) -> Result<Value, ProviderError> {
        let response = self
            .client
            .get(url)
            .bearer_auth(&self.config.api_token)
            .send()
            .await?;
        Ok(Self::ensure_success(response).await?.json().await?)
    }

    async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, ProviderError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(ProviderError::Api {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }
}

fn prediction_status(prediction: &Value) -> String {
    prediction
        .get("status")
        .and_then(Value::as_str)
        .map(str::to_ascii_lowercase)
        .unwrap_or_default()
}

#[async_trait]
impl ImageGenerator for ReplicateClient {
    async fn generate(&self, request: &GenerationRequest) -> Result<ProviderOutput, ProviderError> {
        let mut input = json!({
            "prompt": request.instruction,
            "quality": request.quality,
            "background": request.background,
            "moderation": "auto",
            "aspect_ratio": request.aspect_ratio,
            "output_format": "webp",
            "number_of_images": 1,
            "output_compression": 90,
            "input_images": [request.source_image_url],
        });
        if let (Some(key), Some(obj)) = (&self.config.openai_api_key, input.as_object_mut()) {
            obj.insert("openai_api_key".into(), Value::String(key.clone()));
        }

        let output = self.run(&self.config.generation_version, input).await?;
        ProviderOutput::from_json(&output)
    }
}

#[async_trait]
impl FaceSwapper for ReplicateClient {
    async fn swap(
        &self,
        identity_source_url: &str,
        target_image_url: &str,
    ) -> Result<ProviderOutput, ProviderError> {
        let input = json!({
            "swap_image": identity_source_url,
            "input_image": target_image_url,
        });
        let output = self.run(&self.config.face_swap_version, input).await?;
        ProviderOutput::from_json(&output)
    }
}
