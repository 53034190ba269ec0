//! Multipart parsing for the pipeline routes.
//!
//! Image parts (`images`) are staged under the upload directory as
//! [`StagedUpload`]s, so they are deleted if parsing fails halfway or once the
//! pipeline is done with them. Text parts become [`GenerationOptions`] and the
//! list of remote image URLs.

use std::path::Path;

use axum::extract::multipart::Field;
use axum::extract::Multipart;
use modelgen_core::validation::{extension_of, UploadedImage};
use modelgen_pipeline::{GenerationOptions, StagedUpload};

use crate::error::{AppError, AppResult};

/// Hard cap on staged parts, independent of per-route validation.
pub const MAX_STAGED_FILES: usize = 10;

#[derive(Debug, Default)]
pub struct GenerationForm {
    pub uploads: Vec<StagedUpload>,
    pub image_urls: Vec<String>,
    pub options: GenerationOptions,
}

impl GenerationForm {
    pub fn has_prompt(&self) -> bool {
        self.options
            .prompt
            .as_deref()
            .is_some_and(|p| !p.trim().is_empty())
    }
}

pub async fn parse_generation_form(
    multipart: &mut Multipart,
    upload_dir: &Path,
) -> AppResult<GenerationForm> {
    let mut form = GenerationForm::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(e.to_string()))?
    {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "images" | "images[]" | "image" => {
                if form.uploads.len() >= MAX_STAGED_FILES {
                    return Err(AppError::BadRequest(format!(
                        "At most {MAX_STAGED_FILES} files may be uploaded"
                    )));
                }
                let upload = stage_file(field, upload_dir).await?;
                form.uploads.push(upload);
            }
            "imageUrls" | "imageUrls[]" => {
                let text = read_text(field).await?;
                form.image_urls.extend(parse_image_urls(&text)?);
            }
            "prompt" => form.options.prompt = Some(read_text(field).await?),
            "quality" => set_if_present(&mut form.options.quality, read_text(field).await?),
            "background" => set_if_present(&mut form.options.background, read_text(field).await?),
            "aspect_ratio" => {
                let value = read_text(field).await?;
                if !value.trim().is_empty() {
                    form.options.aspect_ratio = Some(value.trim().to_string());
                }
            }
            "input_fidelity" => {
                set_if_present(&mut form.options.input_fidelity, read_text(field).await?)
            }
            _ => {} // ignore unknown fields
        }
    }

    Ok(form)
}

/// `imageUrls` may be a JSON array string or a single URL per part.
pub fn parse_image_urls(text: &str) -> AppResult<Vec<String>> {
    let text = text.trim();
    if text.is_empty() {
        return Ok(Vec::new());
    }
    if text.starts_with('[') {
        let urls: Vec<String> = serde_json::from_str(text).map_err(|_| {
            AppError::BadRequest("Invalid imageUrls format. Expected JSON array.".into())
        })?;
        return Ok(urls
            .into_iter()
            .map(|u| u.trim().to_string())
            .filter(|u| !u.is_empty())
            .collect());
    }
    Ok(vec![text.to_string()])
}

fn set_if_present(slot: &mut String, value: String) {
    let value = value.trim();
    if !value.is_empty() {
        *slot = value.to_string();
    }
}

async fn read_text(field: Field<'_>) -> AppResult<String> {
    field
        .text()
        .await
        .map_err(|e| AppError::BadRequest(e.to_string()))
}

async fn stage_file(field: Field<'_>, upload_dir: &Path) -> AppResult<StagedUpload> {
    let original_name = field.file_name().unwrap_or("upload").to_string();
    let content_type = field
        .content_type()
        .unwrap_or("application/octet-stream")
        .to_string();
    let data = field
        .bytes()
        .await
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    tokio::fs::create_dir_all(upload_dir)
        .await
        .map_err(|e| AppError::InternalError(format!("Failed to create upload dir: {e}")))?;

    let stamp = chrono::Utc::now().timestamp_millis();
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    let extension = extension_of(&original_name);
    let path = upload_dir.join(format!("images-{stamp}-{}{extension}", &suffix[..8]));

    // Guard first so a failed write leaves nothing behind.
    let staged = StagedUpload::new(UploadedImage {
        original_name,
        content_type,
        size: data.len() as u64,
        path: path.clone(),
    });
    tokio::fs::write(&path, &data)
        .await
        .map_err(|e| AppError::InternalError(format!("Failed to stage upload: {e}")))?;

    tracing::debug!(
        name = %staged.image.original_name,
        size = staged.image.size,
        path = %path.display(),
        "Staged upload",
    );
    Ok(staged)
}
