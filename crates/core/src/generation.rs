//! Generation record and its stage state machine.
//!
//! A [`Generation`] is created in [`GenerationStage::Started`] and moves only
//! forward until it reaches one of the two terminal stages. All mutation goes
//! through methods that reject illegal transitions, so a record can never
//! regress or carry both an output and an error.

use std::path::PathBuf;

use serde::Serialize;
use uuid::Uuid;

use crate::error::CoreError;
use crate::types::{OwnerId, Timestamp};
use crate::validation::ImageCountRule;

// ---------------------------------------------------------------------------
// Stages
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GenerationStage {
    Started,
    Composing,
    Composed,
    Generating,
    IdentityTransfer,
    Completed,
    Failed,
}

impl GenerationStage {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Started => "STARTED",
            Self::Composing => "COMPOSING",
            Self::Composed => "COMPOSED",
            Self::Generating => "GENERATING",
            Self::IdentityTransfer => "IDENTITY_TRANSFER",
            Self::Completed => "COMPLETED",
            Self::Failed => "FAILED",
        }
    }

    /// Stages reachable from `self`. Terminal stages return an empty slice.
    pub fn valid_transitions(self) -> &'static [GenerationStage] {
        use GenerationStage::*;
        match self {
            // Edit routes skip composition entirely.
            Started => &[Composing, Generating, Failed],
            Composing => &[Composed, Failed],
            Composed => &[Generating, Failed],
            Generating => &[IdentityTransfer, Completed, Failed],
            IdentityTransfer => &[Completed, Failed],
            Completed | Failed => &[],
        }
    }

    pub fn can_transition(self, to: GenerationStage) -> bool {
        self.valid_transitions().contains(&to)
    }
}

impl std::fmt::Display for GenerationStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Validate a stage transition.
pub fn validate_transition(from: GenerationStage, to: GenerationStage) -> Result<(), CoreError> {
    if from.can_transition(to) {
        Ok(())
    } else {
        Err(CoreError::InvalidTransition {
            from: from.as_str(),
            to: to.as_str(),
        })
    }
}

// ---------------------------------------------------------------------------
// Kinds
// ---------------------------------------------------------------------------

/// The pipeline shape a request runs through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationKind {
    /// Compose 2-3 images, run AI generation on the canvas, then transfer
    /// identity from the first remote image.
    ComposeGenerate,
    /// Compose 2-3 images, run an AI edit on the canvas, then transfer
    /// identity from the first remote image.
    ComposeEdit,
    /// AI edit directly on 1-5 images.
    DirectEdit,
    /// Compose 1-5 images, then run an AI edit on the canvas.
    CombineEdit,
}

impl GenerationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ComposeGenerate => "compose_generate",
            Self::ComposeEdit => "compose_edit",
            Self::DirectEdit => "direct_edit",
            Self::CombineEdit => "combine_edit",
        }
    }

    pub fn image_rule(self) -> ImageCountRule {
        match self {
            Self::ComposeGenerate | Self::ComposeEdit => ImageCountRule::MIXED_SOURCES,
            Self::DirectEdit | Self::CombineEdit => ImageCountRule::ANY_SOURCE,
        }
    }

    /// Whether the inputs are merged onto a canvas before the AI stage.
    pub fn composes(self) -> bool {
        !matches!(self, Self::DirectEdit)
    }

    /// Whether the AI stage is an edit (bytes in, bytes out) rather than a
    /// generation from a source URL.
    pub fn edits(self) -> bool {
        !matches!(self, Self::ComposeGenerate)
    }

    /// Whether an identity-transfer stage follows the AI stage when a
    /// remote image is available.
    pub fn transfers_identity(self) -> bool {
        matches!(self, Self::ComposeGenerate | Self::ComposeEdit)
    }
}

// ---------------------------------------------------------------------------
// Record
// ---------------------------------------------------------------------------

/// One input image, in the order the client supplied it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InputRef {
    /// A file uploaded with the request and staged on local disk.
    Upload {
        name: String,
        #[serde(skip)]
        path: PathBuf,
    },
    /// A remote image addressed by URL.
    Remote { url: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// An input image could not be loaded on a route without composition.
    Input,
    Composition,
    Provider,
    Storage,
    Internal,
}

/// Structured description of why a generation failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationFailure {
    pub kind: FailureKind,
    pub message: String,
    pub details: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_index: Option<usize>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Generation {
    pub id: Uuid,
    pub owner_id: OwnerId,
    pub kind: GenerationKind,
    pub stage: GenerationStage,
    pub progress: u8,
    pub input_refs: Vec<InputRef>,
    pub composition_ref: Option<String>,
    pub output_ref: Option<String>,
    pub identity_transfer_ref: Option<String>,
    pub annotations: Vec<String>,
    pub error: Option<GenerationFailure>,
    pub created_at: Timestamp,
    pub completed_at: Option<Timestamp>,
}

impl Generation {
    pub fn new(owner_id: OwnerId, kind: GenerationKind, input_refs: Vec<InputRef>) -> Self {
        Self {
            id: Uuid::new_v4(),
            owner_id,
            kind,
            stage: GenerationStage::Started,
            progress: 0,
            input_refs,
            composition_ref: None,
            output_ref: None,
            identity_transfer_ref: None,
            annotations: Vec::new(),
            error: None,
            created_at: chrono::Utc::now(),
            completed_at: None,
        }
    }

    /// Move to `stage`. Progress never decreases; a lower value is ignored.
    pub fn advance(&mut self, stage: GenerationStage, progress: u8) -> Result<(), CoreError> {
        validate_transition(self.stage, stage)?;
        self.stage = stage;
        self.bump_progress(progress);
        Ok(())
    }

    /// Raise progress within the current stage.
    pub fn bump_progress(&mut self, progress: u8) {
        self.progress = self.progress.max(progress.min(100));
    }

    pub fn set_composition_ref(&mut self, url: String) -> Result<(), CoreError> {
        set_once(&mut self.composition_ref, url, "composition_ref")
    }

    pub fn set_output_ref(&mut self, url: String) -> Result<(), CoreError> {
        set_once(&mut self.output_ref, url, "output_ref")
    }

    pub fn set_identity_transfer_ref(&mut self, url: String) -> Result<(), CoreError> {
        set_once(&mut self.identity_transfer_ref, url, "identity_transfer_ref")
    }

    /// Attach a non-fatal note (soft failures).
    pub fn annotate(&mut self, note: impl Into<String>) {
        self.annotations.push(note.into());
    }

    /// Terminal success. Requires an output reference.
    pub fn complete(&mut self) -> Result<(), CoreError> {
        if self.output_ref.is_none() {
            return Err(CoreError::Conflict(
                "cannot complete a generation without an output".into(),
            ));
        }
        validate_transition(self.stage, GenerationStage::Completed)?;
        self.stage = GenerationStage::Completed;
        self.progress = 100;
        self.completed_at = Some(chrono::Utc::now());
        Ok(())
    }

    /// Terminal failure. Already-produced references are kept for diagnostics.
    pub fn fail(&mut self, failure: GenerationFailure) -> Result<(), CoreError> {
        validate_transition(self.stage, GenerationStage::Failed)?;
        self.stage = GenerationStage::Failed;
        self.error = Some(failure);
        self.completed_at = Some(chrono::Utc::now());
        Ok(())
    }

    /// The externally visible result: the identity-transferred image when
    /// present, otherwise the primary output.
    pub fn result_ref(&self) -> Option<&str> {
        self.identity_transfer_ref
            .as_deref()
            .or(self.output_ref.as_deref())
    }

    /// First remote input, used as the identity source.
    pub fn first_remote_url(&self) -> Option<&str> {
        self.input_refs.iter().find_map(|input| match input {
            InputRef::Remote { url } => Some(url.as_str()),
            InputRef::Upload { .. } => None,
        })
    }
}

fn set_once(slot: &mut Option<String>, value: String, field: &str) -> Result<(), CoreError> {
    if slot.is_some() {
        return Err(CoreError::Conflict(format!("{field} is already set")));
    }
    *slot = Some(value);
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
