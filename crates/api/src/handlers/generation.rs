//! Handlers for the pipeline routes.
//!
//! Each route parses the same multipart form and hands it to the
//! orchestrator with its [`GenerationKind`]. The HTTP response is returned
//! once the generation is terminal; interim progress goes out over the
//! socket independently.

use axum::extract::{Multipart, State};
use axum::Json;
use modelgen_core::generation::{GenerationKind, GenerationStage};
use modelgen_pipeline::PipelineRequest;
use serde::Serialize;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::handlers::form::parse_generation_form;
use crate::middleware::auth::CreditedUser;
use crate::state::AppState;

/// Request bookkeeping echoed back with every successful run.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestSummary {
    pub total_input_images: usize,
    pub url_count: usize,
    pub uploaded_count: usize,
    pub has_prompt: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationResponse {
    pub success: bool,
    pub generation_id: Uuid,
    pub kind: GenerationKind,
    pub stage: GenerationStage,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub composition_url: Option<String>,
    pub output_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub face_swap_url: Option<String>,
    /// The reference clients should display.
    pub result_url: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub annotations: Vec<String>,
    /// Remaining balance after the debit, when it was recorded.
    pub credit: Option<i64>,
    pub summary: RequestSummary,
}

/// POST /api/v1/generate-with-multiple-images
pub async fn generate_with_multiple_images(
    State(state): State<AppState>,
    user: CreditedUser,
    multipart: Multipart,
) -> AppResult<Json<GenerationResponse>> {
    run_pipeline(state, user, multipart, GenerationKind::ComposeGenerate).await
}

/// POST /api/v1/edit-with-openai
pub async fn edit_with_openai(
    State(state): State<AppState>,
    user: CreditedUser,
    multipart: Multipart,
) -> AppResult<Json<GenerationResponse>> {
    run_pipeline(state, user, multipart, GenerationKind::ComposeEdit).await
}

/// POST /api/v1/edit-images-with-openai
pub async fn edit_images_with_openai(
    State(state): State<AppState>,
    user: CreditedUser,
    multipart: Multipart,
) -> AppResult<Json<GenerationResponse>> {
    run_pipeline(state, user, multipart, GenerationKind::DirectEdit).await
}

/// POST /api/v1/combine
pub async fn combine(
    State(state): State<AppState>,
    user: CreditedUser,
    multipart: Multipart,
) -> AppResult<Json<GenerationResponse>> {
    run_pipeline(state, user, multipart, GenerationKind::CombineEdit).await
}

async fn run_pipeline(
    state: AppState,
    user: CreditedUser,
    mut multipart: Multipart,
    kind: GenerationKind,
) -> AppResult<Json<GenerationResponse>> {
    let form = parse_generation_form(&mut multipart, &state.config.upload_dir).await?;
    let has_prompt = form.has_prompt();

    tracing::info!(
        owner_id = user.account.id,
        kind = kind.as_str(),
        uploads = form.uploads.len(),
        urls = form.image_urls.len(),
        has_prompt,
        "Pipeline request accepted",
    );

    // Detached so the run still finishes if the client disconnects or the
    // request times out.
    let outcome = state
        .orchestrator
        .spawn(PipelineRequest {
            owner: user.account,
            kind,
            uploads: form.uploads,
            image_urls: form.image_urls,
            options: form.options,
        })
        .await
        .map_err(|e| AppError::InternalError(format!("Generation task failed: {e}")))??;

    let succeeded = outcome.succeeded();
    let generation = outcome.generation;
    if !succeeded {
        let failure = generation.error.clone().ok_or_else(|| {
            AppError::InternalError(format!("generation {} failed without error", generation.id))
        })?;
        return Err(AppError::GenerationFailed {
            generation_id: generation.id,
            failure,
        });
    }

    let result_url = generation.result_ref().map(str::to_string);
    Ok(Json(GenerationResponse {
        success: true,
        generation_id: generation.id,
        kind: generation.kind,
        stage: generation.stage,
        composition_url: generation.composition_ref,
        output_url: generation.output_ref,
        face_swap_url: generation.identity_transfer_ref,
        result_url,
        annotations: generation.annotations,
        credit: outcome.remaining_credit,
        summary: RequestSummary {
            total_input_images: outcome.counts.total_images,
            url_count: outcome.counts.url_count,
            uploaded_count: outcome.counts.uploaded_count,
            has_prompt,
        },
    }))
}
