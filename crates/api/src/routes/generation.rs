//! Route definitions for the generation pipeline.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::{generation, validation};
use crate::state::AppState;

/// Pipeline routes, merged directly into `/api/v1`.
///
/// ```text
/// POST   /generate-with-multiple-images   -> generate_with_multiple_images
/// POST   /edit-with-openai                -> edit_with_openai
/// POST   /edit-images-with-openai         -> edit_images_with_openai
/// POST   /combine                         -> combine
/// GET    /validation-rules                -> get_validation_rules
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/generate-with-multiple-images",
            post(generation::generate_with_multiple_images),
        )
        .route("/edit-with-openai", post(generation::edit_with_openai))
        .route(
            "/edit-images-with-openai",
            post(generation::edit_images_with_openai),
        )
        .route("/combine", post(generation::combine))
        .route("/validation-rules", get(validation::get_validation_rules))
}
