//! The generation pipeline.
//!
//! Stages run strictly in sequence for one generation:
//!
//! ```text
//! STARTED -> COMPOSING -> COMPOSED -> GENERATING -> (IDENTITY_TRANSFER) -> COMPLETED
//!                        any non-terminal stage -> FAILED
//! ```
//!
//! Composition and provider failures are fatal. Identity transfer is a soft
//! stage: its failure becomes an annotation and the run still completes.
//! Credit is debited once, only after the generation is `COMPLETED`. All
//! scratch files and staged uploads are deleted before [`Orchestrator::run`]
//! returns, whatever the outcome (panics included).

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use serde_json::Value;

use modelgen_cloud::{unique_name_hint, ObjectStorage, StoredObject};
use modelgen_core::composition::{compose_with, CanvasSpec, CompositionError};
use modelgen_core::error::CoreError;
use modelgen_core::generation::{
    Generation, GenerationKind, GenerationStage, InputRef,
};
use modelgen_core::media;
use modelgen_core::progress_events::*;
use modelgen_core::validation::{validate_inputs, UploadedImage, ValidatedCounts};
use modelgen_events::{with_heartbeat, ProgressEvent, ProgressSink};
use modelgen_ledger::{Account, CreditLedger, GenerationLedger, HistoryEntry};
use modelgen_providers::{
    EditRequest, FaceSwapper, GenerationRequest, ImageEditor, ImageGenerator, InputImage,
    ProviderOutput,
};

use crate::ephemeral::{Scratch, StagedUpload};
use crate::error::PipelineError;
use crate::fetch::RemoteFetcher;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

pub const FOLDER_COMPOSITIONS: &str = "compositions";
pub const FOLDER_GENERATED: &str = "generated-images";
pub const FOLDER_FACE_SWAP: &str = "face-swap-images";
pub const FOLDER_EDITS: &str = "edits";

/// History type label for image generations.
pub const HISTORY_KIND_IMAGE: &str = "IMAGE";

pub const DEFAULT_EDIT_SIZE: &str = "1024x1536";
pub const DEFAULT_GENERATION_ASPECT_RATIO: &str = "2:3";
pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(2);

/// Used when a request carries no prompt.
pub const DEFAULT_INSTRUCTION: &str = "Dress the AI fashion model in exactly the top and bottom \
garments provided. Reproduce every garment detail (texture, fabric, color, cut and folds) \
without altering the outfit. Keep the model's face, expression, hair, pose, body position and \
background unchanged, and make the result photorealistic, as if the model had originally been \
photographed wearing the outfit.";

// ---------------------------------------------------------------------------
// Wiring
// ---------------------------------------------------------------------------

/// Every external dependency of a run.
#[derive(Clone)]
pub struct Collaborators {
    pub storage: Arc<dyn ObjectStorage>,
    pub generator: Arc<dyn ImageGenerator>,
    pub editor: Arc<dyn ImageEditor>,
    pub face_swapper: Arc<dyn FaceSwapper>,
    pub fetcher: Arc<dyn RemoteFetcher>,
    pub history: Arc<dyn GenerationLedger>,
    pub credits: Arc<dyn CreditLedger>,
    pub events: Arc<dyn ProgressSink>,
}

#[derive(Debug, Clone)]
pub struct PipelineSettings {
    /// Shared directory for per-run scratch files.
    pub scratch_dir: PathBuf,
    pub heartbeat_interval: Duration,
    pub default_instruction: String,
    pub canvas: CanvasSpec,
    /// Output size requested from the edit provider.
    pub edit_size: String,
    /// Aspect ratio for AI generation when the request names none.
    pub generation_aspect_ratio: String,
}

impl PipelineSettings {
    pub fn new(scratch_dir: impl Into<PathBuf>) -> Self {
        Self {
            scratch_dir: scratch_dir.into(),
            heartbeat_interval: DEFAULT_HEARTBEAT_INTERVAL,
            default_instruction: DEFAULT_INSTRUCTION.to_string(),
            canvas: CanvasSpec::default(),
            edit_size: DEFAULT_EDIT_SIZE.to_string(),
            generation_aspect_ratio: DEFAULT_GENERATION_ASPECT_RATIO.to_string(),
        }
    }
}

/// Optional knobs supplied with a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationOptions {
    pub prompt: Option<String>,
    pub quality: String,
    pub background: String,
    pub aspect_ratio: Option<String>,
    pub input_fidelity: String,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            prompt: None,
            quality: "auto".into(),
            background: "auto".into(),
            aspect_ratio: None,
            input_fidelity: "low".into(),
        }
    }
}

pub struct PipelineRequest {
    pub owner: Account,
    pub kind: GenerationKind,
    /// Staged uploads. Deleted when the run ends.
    pub uploads: Vec<StagedUpload>,
    pub image_urls: Vec<String>,
    pub options: GenerationOptions,
}

/// A terminal generation plus request bookkeeping.
#[derive(Debug, Clone)]
pub struct PipelineOutcome {
    pub generation: Generation,
    pub counts: ValidatedCounts,
    /// New balance, when the debit was recorded.
    pub remaining_credit: Option<i64>,
}

impl PipelineOutcome {
    pub fn succeeded(&self) -> bool {
        self.generation.stage == GenerationStage::Completed
    }
}

/// Where the AI stage takes its input from.
enum AiSource {
    /// Durable URL of the source image (generation).
    Url(String),
    /// Inline images (edit).
    Images(Vec<InputImage>),
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

pub struct Orchestrator {
    collab: Collaborators,
    settings: PipelineSettings,
}

impl Orchestrator {
    pub fn new(collab: Collaborators, settings: PipelineSettings) -> Self {
        Self { collab, settings }
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    /// Run one generation on its own task.
    ///
    /// The run reaches a terminal stage even if the returned handle is
    /// dropped, so a caller going away never leaves a generation without its
    /// terminal event, history record and debit.
    pub fn spawn(
        self: &Arc<Self>,
        request: PipelineRequest,
    ) -> tokio::task::JoinHandle<Result<PipelineOutcome, CoreError>> {
        let this = Arc::clone(self);
        tokio::spawn(async move { this.run(request).await })
    }

    /// Run one generation to a terminal stage.
    ///
    /// Returns `Err` only for precondition failures (insufficient credit,
    /// invalid input), in which case no work was started. Otherwise the
    /// outcome carries a generation that is `COMPLETED` or `FAILED`.
    pub async fn run(&self, request: PipelineRequest) -> Result<PipelineOutcome, CoreError> {
        let owner = request.owner;
        if owner.credit_balance < 1 {
            return Err(CoreError::InsufficientCredit(format!(
                "balance is {}",
                owner.credit_balance
            )));
        }

        let uploads: Vec<UploadedImage> = request.uploads.iter().map(|u| u.image.clone()).collect();
        let counts = validate_inputs(&uploads, &request.image_urls, request.kind.image_rule())?;

        let input_refs = uploads
            .iter()
            .map(|u| InputRef::Upload {
                name: u.original_name.clone(),
                path: u.path.clone(),
            })
            .chain(request.image_urls.iter().map(|url| InputRef::Remote { url: url.clone() }))
            .collect();
        let mut generation = Generation::new(owner.id, request.kind, input_refs);

        tracing::info!(
            generation_id = %generation.id,
            owner_id = owner.id,
            kind = generation.kind.as_str(),
            uploaded = counts.uploaded_count,
            urls = counts.url_count,
            "Generation started",
        );
        self.emit(
            &generation,
            EVENT_GENERATION_STARTED,
            STATUS_STARTED,
            "Generation started",
            [
                ("kind", Value::from(generation.kind.as_str())),
                ("totalImages", Value::from(counts.total_images)),
            ],
        );

        let result = match Scratch::create(&self.settings.scratch_dir).await {
            Ok(scratch) => {
                let driven = AssertUnwindSafe(self.drive(&mut generation, &request, &scratch))
                    .catch_unwind()
                    .await;
                drop(scratch);
                match driven {
                    Ok(result) => result,
                    Err(panic) => Err(PipelineError::Panic(panic_message(panic))),
                }
            }
            Err(e) => Err(PipelineError::Io(e)),
        };
        // Staged uploads are not needed past this point.
        drop(request);

        let outcome = match result {
            Ok(()) => self.finish_completed(generation, owner, counts).await,
            Err(error) => self.finish_failed(generation, error, counts).await,
        };
        Ok(outcome)
    }

    // -----------------------------------------------------------------------
    // Stages
    // -----------------------------------------------------------------------

    async fn drive(
        &self,
        g: &mut Generation,
        request: &PipelineRequest,
        scratch: &Scratch,
    ) -> Result<(), PipelineError> {
        let instruction = self.instruction(&request.options);

        let source = if g.kind.composes() {
            self.enter(
                g,
                GenerationStage::Composing,
                PROGRESS_COMPOSITION,
                STATUS_COMPOSITION,
                "Composing input images",
            )?;
            let inputs = self.load_inputs(request).await?;
            let (canvas, composition_url) = self.compose_and_store(g, inputs, scratch).await?;

            self.enter(
                g,
                GenerationStage::Generating,
                PROGRESS_AI_GENERATION,
                STATUS_AI_GENERATION,
                "Generating image",
            )?;
            if g.kind.edits() {
                AiSource::Images(vec![InputImage {
                    bytes: canvas,
                    file_name: "composition.png".into(),
                    content_type: "image/png".into(),
                }])
            } else {
                AiSource::Url(composition_url)
            }
        } else {
            self.enter(
                g,
                GenerationStage::Generating,
                PROGRESS_AI_GENERATION,
                STATUS_AI_GENERATION,
                "Editing images",
            )?;
            AiSource::Images(self.load_inputs(request).await?)
        };

        let output = with_heartbeat(
            self.collab.events.clone(),
            self.heartbeat(g),
            self.settings.heartbeat_interval,
            self.produce(&instruction, &request.options, source, scratch),
        )
        .await?;

        g.set_output_ref(output.url.clone())?;
        g.bump_progress(PROGRESS_AI_GENERATION_COMPLETED);
        self.emit(
            g,
            EVENT_CONTINUE,
            STATUS_AI_GENERATION_COMPLETED,
            "AI generation completed",
            [("outputUrl", Value::from(output.url.clone()))],
        );

        if g.kind.transfers_identity() {
            if let Some(identity_source) = g.first_remote_url().map(str::to_string) {
                self.transfer_identity(g, &identity_source, &output.url, scratch)
                    .await?;
            }
        }

        Ok(())
    }

    async fn compose_and_store(
        &self,
        g: &mut Generation,
        inputs: Vec<InputImage>,
        scratch: &Scratch,
    ) -> Result<(Vec<u8>, String), PipelineError> {
        let canvas = self.settings.canvas;
        let buffers: Vec<Vec<u8>> = inputs.into_iter().map(|i| i.bytes).collect();

        let composition = tokio::task::spawn_blocking(move || compose_with(&canvas, &buffers))
            .await
            .map_err(|e| PipelineError::Panic(e.to_string()))??;

        let hint = unique_name_hint("composition");
        let path = scratch.write(&hint, &composition.bytes).await?;
        let stored = self
            .collab
            .storage
            .upload_file(&path, FOLDER_COMPOSITIONS, &hint)
            .await?;

        g.set_composition_ref(stored.url.clone())?;
        g.advance(GenerationStage::Composed, PROGRESS_COMPOSITION_COMPLETED)?;
        tracing::info!(
            generation_id = %g.id,
            slices = composition.slices.len(),
            url = %stored.url,
            "Composition stored",
        );
        self.emit(
            g,
            EVENT_CONTINUE,
            STATUS_COMPOSITION_COMPLETED,
            "Composition completed",
            [("compositionUrl", Value::from(stored.url.clone()))],
        );

        Ok((composition.bytes, stored.url))
    }

    async fn produce(
        &self,
        instruction: &str,
        options: &GenerationOptions,
        source: AiSource,
        scratch: &Scratch,
    ) -> Result<StoredObject, PipelineError> {
        match source {
            AiSource::Url(source_image_url) => {
                let request = GenerationRequest {
                    instruction: instruction.to_string(),
                    source_image_url,
                    quality: options.quality.clone(),
                    background: options.background.clone(),
                    aspect_ratio: options
                        .aspect_ratio
                        .clone()
                        .unwrap_or_else(|| self.settings.generation_aspect_ratio.clone()),
                };
                let output = self.collab.generator.generate(&request).await?;
                self.persist(output, FOLDER_GENERATED, "generated", scratch).await
            }
            AiSource::Images(images) => {
                let request = EditRequest {
                    instruction: instruction.to_string(),
                    images,
                    input_fidelity: options.input_fidelity.clone(),
                    size: self.settings.edit_size.clone(),
                };
                let bytes = self.collab.editor.edit(&request).await?;
                self.persist(ProviderOutput::Bytes(bytes), FOLDER_EDITS, "edited_image", scratch)
                    .await
            }
        }
    }

    /// Soft stage: failures are annotated, never propagated.
    async fn transfer_identity(
        &self,
        g: &mut Generation,
        identity_source: &str,
        target: &str,
        scratch: &Scratch,
    ) -> Result<(), PipelineError> {
        self.enter(
            g,
            GenerationStage::IdentityTransfer,
            PROGRESS_FACE_SWAP,
            STATUS_FACE_SWAP,
            "Transferring identity",
        )?;

        let swapped = with_heartbeat(
            self.collab.events.clone(),
            self.heartbeat(g),
            self.settings.heartbeat_interval,
            async {
                let output = self.collab.face_swapper.swap(identity_source, target).await?;
                self.persist(output, FOLDER_FACE_SWAP, "face_swap", scratch).await
            },
        )
        .await;

        match swapped {
            Ok(stored) => {
                g.set_identity_transfer_ref(stored.url.clone())?;
                g.bump_progress(PROGRESS_FACE_SWAP_COMPLETED);
                self.emit(
                    g,
                    EVENT_CONTINUE,
                    STATUS_FACE_SWAP_COMPLETED,
                    "Identity transfer completed",
                    [("faceSwapUrl", Value::from(stored.url))],
                );
            }
            Err(e) => {
                tracing::warn!(
                    generation_id = %g.id,
                    error = %e,
                    "Identity transfer failed, keeping generated output",
                );
                g.annotate(format!("Identity transfer failed: {e}"));
                g.bump_progress(PROGRESS_FACE_SWAP_FAILED);
                self.emit(
                    g,
                    EVENT_CONTINUE,
                    STATUS_FACE_SWAP_FAILED,
                    "Identity transfer failed, using generated image",
                    [("error", Value::from(e.to_string()))],
                );
            }
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Terminal handling
    // -----------------------------------------------------------------------

    async fn finish_completed(
        &self,
        mut g: Generation,
        owner: Account,
        counts: ValidatedCounts,
    ) -> PipelineOutcome {
        if let Err(e) = g.complete() {
            return self.finish_failed(g, e.into(), counts).await;
        }

        self.record_history(&mut g).await;

        let new_balance = owner.credit_balance - 1;
        let remaining_credit = match self.collab.credits.set_balance(owner.id, new_balance).await {
            Ok(()) => Some(new_balance),
            Err(e) => {
                tracing::error!(
                    generation_id = %g.id,
                    owner_id = owner.id,
                    error = %e,
                    "Credit debit failed",
                );
                g.annotate(format!("Credit update failed: {e}"));
                None
            }
        };

        tracing::info!(
            generation_id = %g.id,
            owner_id = owner.id,
            result = g.result_ref().unwrap_or_default(),
            "Generation completed",
        );

        let mut fields = vec![
            ("compositionUrl", Value::from(g.composition_ref.clone())),
            ("outputUrl", Value::from(g.output_ref.clone())),
            ("faceSwapUrl", Value::from(g.identity_transfer_ref.clone())),
            ("resultUrl", Value::from(g.result_ref().map(str::to_string))),
            ("credit", Value::from(remaining_credit)),
        ];
        if !g.annotations.is_empty() {
            fields.push(("annotations", Value::from(g.annotations.clone())));
        }
        self.emit(
            &g,
            EVENT_GENERATION_COMPLETED,
            STATUS_COMPLETED,
            "Generation completed successfully",
            fields,
        );

        PipelineOutcome {
            generation: g,
            counts,
            remaining_credit,
        }
    }

    async fn finish_failed(
        &self,
        mut g: Generation,
        error: PipelineError,
        counts: ValidatedCounts,
    ) -> PipelineOutcome {
        let failure = error.to_failure_for(g.kind);
        tracing::error!(
            generation_id = %g.id,
            owner_id = g.owner_id,
            stage = %g.stage,
            error = %error,
            "Generation failed",
        );
        if let Err(e) = g.fail(failure.clone()) {
            tracing::error!(generation_id = %g.id, error = %e, "Could not mark generation failed");
        }

        self.record_history(&mut g).await;

        let mut fields = vec![
            ("error", Value::from(failure.details.clone())),
            ("failureKind", serde_json::to_value(failure.kind).unwrap_or(Value::Null)),
        ];
        if let Some(index) = failure.input_index {
            fields.push(("inputIndex", Value::from(index)));
        }
        self.emit(&g, EVENT_GENERATION_FAILED, STATUS_FAILED, &failure.message, fields);

        PipelineOutcome {
            generation: g,
            counts,
            remaining_credit: None,
        }
    }

    /// History is best-effort: failures are logged and annotated.
    async fn record_history(&self, g: &mut Generation) {
        let entry = HistoryEntry {
            input_ref: g
                .composition_ref
                .clone()
                .or_else(|| g.first_remote_url().map(str::to_string)),
            output_ref: g.output_ref.clone(),
            transferred_ref: g.identity_transfer_ref.clone(),
            success: g.stage == GenerationStage::Completed,
            kind: HISTORY_KIND_IMAGE.to_string(),
        };
        if let Err(e) = self.collab.history.record(g.owner_id, &entry).await {
            tracing::warn!(generation_id = %g.id, error = %e, "Failed to record generation history");
            g.annotate(format!("History record failed: {e}"));
        }
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    fn instruction(&self, options: &GenerationOptions) -> String {
        options
            .prompt
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .unwrap_or(&self.settings.default_instruction)
            .to_string()
    }

    /// Read uploads from disk then fetch URLs, preserving request order.
    async fn load_inputs(&self, request: &PipelineRequest) -> Result<Vec<InputImage>, PipelineError> {
        let mut images = Vec::with_capacity(request.uploads.len() + request.image_urls.len());

        for (index, upload) in request.uploads.iter().enumerate() {
            let bytes = tokio::fs::read(&upload.image.path).await.map_err(|e| {
                CompositionError::Unreadable {
                    index,
                    reason: e.to_string(),
                }
            })?;
            images.push(InputImage {
                bytes,
                file_name: upload.image.original_name.clone(),
                content_type: upload.image.content_type.clone(),
            });
        }

        for (offset, url) in request.image_urls.iter().enumerate() {
            let index = request.uploads.len() + offset;
            let bytes = self
                .collab
                .fetcher
                .fetch(url)
                .await
                .map_err(|source| PipelineError::Fetch { index, source })?;
            let extension = media::sniff_extension(&bytes);
            images.push(InputImage {
                file_name: format!("image_{index}.{extension}"),
                content_type: media::content_type_for_extension(extension).to_string(),
                bytes,
            });
        }

        Ok(images)
    }

    /// Turn any provider output into a durable object.
    async fn persist(
        &self,
        output: ProviderOutput,
        folder: &str,
        prefix: &str,
        scratch: &Scratch,
    ) -> Result<StoredObject, PipelineError> {
        let hint = unique_name_hint(prefix);
        let stored = match output {
            ProviderOutput::Url(url) if self.collab.storage.owns(&url) => StoredObject {
                id: url.clone(),
                url,
            },
            ProviderOutput::Url(url) => {
                self.collab
                    .storage
                    .upload_from_url(&url, folder, &hint)
                    .await?
            }
            ProviderOutput::Bytes(bytes) => {
                let path = scratch.write(&hint, &bytes).await?;
                self.collab.storage.upload_file(&path, folder, &hint).await?
            }
        };
        Ok(stored)
    }

    fn enter(
        &self,
        g: &mut Generation,
        stage: GenerationStage,
        progress: u8,
        status: &str,
        message: &str,
    ) -> Result<(), PipelineError> {
        g.advance(stage, progress)?;
        tracing::info!(
            generation_id = %g.id,
            owner_id = g.owner_id,
            stage = %stage,
            progress = g.progress,
            "Stage entered",
        );
        self.emit(g, EVENT_CONTINUE, status, message, []);
        Ok(())
    }

    fn emit<'a>(
        &self,
        g: &Generation,
        event: &str,
        status: &str,
        message: &str,
        fields: impl IntoIterator<Item = (&'a str, Value)>,
    ) {
        let mut progress_event = ProgressEvent::new(event, g.owner_id, g.id)
            .with_status(status, message)
            .with_progress(g.progress);
        for (key, value) in fields {
            progress_event = progress_event.with_field(key, value);
        }
        self.collab.events.publish(progress_event);
    }

    fn heartbeat(&self, g: &Generation) -> ProgressEvent {
        ProgressEvent::new(EVENT_CONTINUE, g.owner_id, g.id)
            .with_status(STATUS_PROCESSING, "Still working...")
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
