//! HTTP-level tests for the pipeline routes.
//!
//! Every collaborator is in memory; requests go through the full middleware
//! stack with a hand-built multipart body.

mod common;

use axum::http::StatusCode;
use common::{
    body_json, dir_is_empty, get, post_multipart, token_for, FakeProvider, MultipartBody,
    BROKE_OWNER, CDN, MODEL_URL, OWNER,
};

fn urls(list: &[&str]) -> String {
    serde_json::to_string(list).unwrap()
}

// ---------------------------------------------------------------------------
// Test: a compose-and-generate run returns every reference and debits once
// ---------------------------------------------------------------------------

#[tokio::test]
async fn generate_with_multiple_images_succeeds() {
    let app = common::build_test_app().await;
    let token = token_for(OWNER);

    let body = MultipartBody::new()
        .png("top.png")
        .text("imageUrls", &urls(&[MODEL_URL]))
        .text("prompt", "studio lighting");
    let response = post_multipart(
        app.router.clone(),
        "/api/v1/generate-with-multiple-images",
        Some(&token),
        body,
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;

    assert_eq!(json["success"], true);
    assert_eq!(json["kind"], "compose_generate");
    assert_eq!(json["stage"], "COMPLETED");
    assert!(json["generationId"].is_string());
    assert!(json["compositionUrl"]
        .as_str()
        .unwrap()
        .starts_with(&format!("{CDN}/compositions/")));
    assert!(json["outputUrl"]
        .as_str()
        .unwrap()
        .starts_with(&format!("{CDN}/generated-images/")));
    let face_swap = json["faceSwapUrl"].as_str().unwrap();
    assert!(face_swap.starts_with(&format!("{CDN}/face-swap-images/")));
    assert_eq!(json["resultUrl"], face_swap);
    assert_eq!(json["credit"], 4);

    assert_eq!(json["summary"]["totalInputImages"], 2);
    assert_eq!(json["summary"]["uploadedCount"], 1);
    assert_eq!(json["summary"]["urlCount"], 1);
    assert_eq!(json["summary"]["hasPrompt"], true);

    assert_eq!(app.ledger.balance(OWNER).await, Some(4));
    assert_eq!(app.ledger.history().await.len(), 1);
    assert_eq!(*app.provider.calls.lock().unwrap(), vec!["generate", "swap"]);
}

// ---------------------------------------------------------------------------
// Test: staged uploads and scratch files are gone after the response
// ---------------------------------------------------------------------------

#[tokio::test]
async fn staged_files_are_removed_after_run() {
    let app = common::build_test_app().await;
    let token = token_for(OWNER);

    let body = MultipartBody::new()
        .png("a.png")
        .png("b.png")
        .text("imageUrls", &urls(&[MODEL_URL]));
    let response = post_multipart(app.router.clone(), "/api/v1/edit-with-openai", Some(&token), body).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert!(dir_is_empty(&app.upload_dir));
    assert!(dir_is_empty(&app.scratch_dir));
}

// ---------------------------------------------------------------------------
// Test: only a URL on the mixed-source route is rejected
// ---------------------------------------------------------------------------

#[tokio::test]
async fn url_only_on_mixed_route_requires_upload() {
    let app = common::build_test_app().await;
    let token = token_for(OWNER);

    let body = MultipartBody::new().text("imageUrls", &urls(&[MODEL_URL]));
    let response = post_multipart(
        app.router.clone(),
        "/api/v1/generate-with-multiple-images",
        Some(&token),
        body,
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["success"], false);
    assert_eq!(json["code"], "VALIDATION_ERROR");
    assert_eq!(json["error"], "At least one image must be uploaded as file");
    assert!(app.provider.calls.lock().unwrap().is_empty());
    assert_eq!(app.ledger.balance(OWNER).await, Some(5));
}

// ---------------------------------------------------------------------------
// Test: four uploads on the 2-3 image route hit the maximum
// ---------------------------------------------------------------------------

#[tokio::test]
async fn too_many_uploads_are_rejected_before_providers() {
    let app = common::build_test_app().await;
    let token = token_for(OWNER);

    let body = MultipartBody::new()
        .png("1.png")
        .png("2.png")
        .png("3.png")
        .png("4.png");
    let response = post_multipart(
        app.router.clone(),
        "/api/v1/generate-with-multiple-images",
        Some(&token),
        body,
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["error"], "Maximum 3 images allowed (uploaded files + URLs)");
    assert!(app.provider.calls.lock().unwrap().is_empty());
    assert!(dir_is_empty(&app.upload_dir));
}

// ---------------------------------------------------------------------------
// Test: direct edit accepts a single URL and skips identity transfer
// ---------------------------------------------------------------------------

#[tokio::test]
async fn direct_edit_with_single_url() {
    let app = common::build_test_app().await;
    let token = token_for(OWNER);

    let body = MultipartBody::new().text("imageUrls", MODEL_URL);
    let response = post_multipart(
        app.router.clone(),
        "/api/v1/edit-images-with-openai",
        Some(&token),
        body,
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["kind"], "direct_edit");
    assert!(json.get("compositionUrl").is_none());
    assert!(json.get("faceSwapUrl").is_none());
    assert_eq!(json["resultUrl"], json["outputUrl"]);
    assert_eq!(json["summary"]["hasPrompt"], false);
    assert_eq!(*app.provider.calls.lock().unwrap(), vec!["edit"]);
}

// ---------------------------------------------------------------------------
// Test: a provider failure is a 500 carrying the generation id, no debit
// ---------------------------------------------------------------------------

#[tokio::test]
async fn provider_failure_maps_to_500() {
    let app = common::build_test_app_with(FakeProvider {
        fail_generation: true,
        ..FakeProvider::default()
    })
    .await;
    let token = token_for(OWNER);

    let body = MultipartBody::new()
        .png("top.png")
        .text("imageUrls", &urls(&[MODEL_URL]));
    let response = post_multipart(
        app.router.clone(),
        "/api/v1/generate-with-multiple-images",
        Some(&token),
        body,
    )
    .await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let json = body_json(response).await;
    assert_eq!(json["success"], false);
    assert_eq!(json["code"], "PROVIDER_ERROR");
    assert!(json["generationId"].is_string());
    assert!(json["details"].as_str().unwrap().contains("model overloaded"));
    assert_eq!(app.ledger.balance(OWNER).await, Some(5));
}

// ---------------------------------------------------------------------------
// Test: auth and credit gates
// ---------------------------------------------------------------------------

#[tokio::test]
async fn missing_token_is_401() {
    let app = common::build_test_app().await;

    let body = MultipartBody::new().png("top.png");
    let response = post_multipart(app.router.clone(), "/api/v1/combine", None, body).await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["code"], "UNAUTHORIZED");
}

#[tokio::test]
async fn unknown_owner_is_401() {
    let app = common::build_test_app().await;
    let token = token_for(999);

    let body = MultipartBody::new().png("top.png");
    let response = post_multipart(app.router.clone(), "/api/v1/combine", Some(&token), body).await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn zero_credit_is_402() {
    let app = common::build_test_app().await;
    let token = token_for(BROKE_OWNER);

    let body = MultipartBody::new().png("top.png");
    let response = post_multipart(app.router.clone(), "/api/v1/combine", Some(&token), body).await;

    assert_eq!(response.status(), StatusCode::PAYMENT_REQUIRED);
    let json = body_json(response).await;
    assert_eq!(json["error"], "Insufficient credit");
    assert!(app.provider.calls.lock().unwrap().is_empty());
}

// ---------------------------------------------------------------------------
// Test: malformed imageUrls is a 400 with the published message
// ---------------------------------------------------------------------------

#[tokio::test]
async fn malformed_image_urls_is_400() {
    let app = common::build_test_app().await;
    let token = token_for(OWNER);

    let body = MultipartBody::new()
        .png("top.png")
        .text("imageUrls", "[\"https://broken");
    let response = post_multipart(app.router.clone(), "/api/v1/combine", Some(&token), body).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["error"], "Invalid imageUrls format. Expected JSON array.");
}

// ---------------------------------------------------------------------------
// Test: validation rules are public
// ---------------------------------------------------------------------------

#[tokio::test]
async fn validation_rules_are_published() {
    let app = common::build_test_app().await;
    let response = get(app.router.clone(), "/api/v1/validation-rules").await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["success"], true);

    let rules = &json["validationRules"];
    assert_eq!(rules["maxFileSizeMb"], 10);
    assert_eq!(rules["maxFileSize"], 10 * 1024 * 1024);
    assert!(rules["allowedMimeTypes"]
        .as_array()
        .unwrap()
        .contains(&serde_json::json!("image/png")));
    assert_eq!(rules["mixedSources"]["maxImages"], 3);
    assert_eq!(rules["mixedSources"]["requireUpload"], true);
    assert_eq!(rules["anySource"]["maxImages"], 5);
}
