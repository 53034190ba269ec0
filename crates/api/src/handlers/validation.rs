//! Handler for the published validation limits.

use axum::Json;
use modelgen_core::validation::validation_rules;
use serde_json::json;

/// GET /api/v1/validation-rules
///
/// Public. Returns the limits every pipeline route enforces so clients can
/// check inputs before uploading.
pub async fn get_validation_rules() -> Json<serde_json::Value> {
    Json(json!({
        "success": true,
        "validationRules": validation_rules(),
    }))
}
