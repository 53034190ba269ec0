//! OpenAI image edits (`POST /images/edits`).

use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde_json::Value;

use crate::adapters::{EditRequest, ImageEditor};
use crate::error::ProviderError;
use crate::output::ProviderOutput;

pub const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";
pub const DEFAULT_IMAGE_MODEL: &str = "gpt-image-1";

const HTTP_TIMEOUT: Duration = Duration::from_secs(300);

#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    pub api_base: String,
    pub api_key: String,
    pub model: String,
}

impl OpenAiConfig {
    /// | Env Var              | Default                       |
    /// |----------------------|-------------------------------|
    /// | `OPENAI_API_KEY`     | required                      |
    /// | `OPENAI_API_BASE`    | `https://api.openai.com/v1`   |
    /// | `OPENAI_IMAGE_MODEL` | `gpt-image-1`                 |
    pub fn from_env() -> Result<Self, ProviderError> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| ProviderError::NotConfigured("OPENAI_API_KEY is not set".into()))?;
        Ok(Self {
            api_base: std::env::var("OPENAI_API_BASE")
                .unwrap_or_else(|_| DEFAULT_API_BASE.into())
                .trim_end_matches('/')
                .to_string(),
            api_key,
            model: std::env::var("OPENAI_IMAGE_MODEL").unwrap_or_else(|_| DEFAULT_IMAGE_MODEL.into()),
        })
    }
}

pub struct OpenAiImageEditor {
    client: reqwest::Client,
    config: OpenAiConfig,
}

impl OpenAiImageEditor {
    pub fn new(config: OpenAiConfig) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder().timeout(HTTP_TIMEOUT).build()?;
        Ok(Self { client, config })
    }

    fn build_form(&self, request: &EditRequest) -> Result<Form, ProviderError> {
        let mut form = Form::new()
            .text("model", self.config.model.clone())
            .text("prompt", request.instruction.clone())
            .text("n", "1")
            .text("input_fidelity", request.input_fidelity.clone())
            .text("size", request.size.clone());

        for image in &request.images {
            let part = Part::bytes(image.bytes.clone())
                .file_name(image.file_name.clone())
                .mime_str(&image.content_type)?;
            form = form.part("image[]", part);
        }
        Ok(form)
    }
}

#[async_trait]
impl ImageEditor for OpenAiImageEditor {
    async fn edit(&self, request: &EditRequest) -> Result<Vec<u8>, ProviderError> {
        if request.images.is_empty() {
            return Err(ProviderError::UnexpectedOutput(
                "image edits require at least one input image".into(),
            ));
        }

        tracing::info!(
            model = %self.config.model,
            images = request.images.len(),
            size = %request.size,
            "Requesting OpenAI image edit",
        );

        let response = self
            .client
            .post(format!("{}/images/edits", self.config.api_base))
            .bearer_auth(&self.config.api_key)
            .multipart(self.build_form(request)?)
            .send()
            .await?;

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

        let payload: Value = response.json().await?;
        let encoded = payload
            .pointer("/data/0/b64_json")
            .and_then(Value::as_str)
            .ok_or_else(|| ProviderError::UnexpectedOutput("response has no data[0].b64_json".into()))?;

        match ProviderOutput::from_base64(encoded)? {
            ProviderOutput::Bytes(bytes) => Ok(bytes),
            ProviderOutput::Url(url) => Err(ProviderError::UnexpectedOutput(format!(
                "expected inline image bytes, got URL {url}"
            ))),
        }
    }
}
