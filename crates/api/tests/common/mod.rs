#![allow(dead_code)]

use std::io::Cursor;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use image::imageops::FilterType;
use image::{ImageFormat, Rgba, RgbaImage};
use tower::ServiceExt;

use modelgen_api::auth::jwt::{generate_token, JwtConfig};
use modelgen_api::config::ServerConfig;
use modelgen_api::router::build_app_router;
use modelgen_api::state::AppState;
use modelgen_api::ws::WsManager;
use modelgen_cloud::{ObjectStorage, StorageError, StoredObject};
use modelgen_core::composition::CanvasSpec;
use modelgen_core::types::OwnerId;
use modelgen_events::EventBus;
use modelgen_ledger::InMemoryLedger;
use modelgen_pipeline::{Collaborators, FetchError, Orchestrator, PipelineSettings, RemoteFetcher};
use modelgen_providers::{
    EditRequest, FaceSwapper, GenerationRequest, ImageEditor, ImageGenerator, ProviderError,
    ProviderOutput,
};

pub const OWNER: OwnerId = 7;
pub const BROKE_OWNER: OwnerId = 8;
pub const CDN: &str = "https://cdn.test";
pub const MODEL_URL: &str = "https://images.test/model.png";
pub const JWT_SECRET: &str = "test-secret-for-integration-tests";
pub const BOUNDARY: &str = "modelgen-test-boundary";

// ---------------------------------------------------------------------------
// Fakes
// ---------------------------------------------------------------------------

pub fn png(width: u32, height: u32) -> Vec<u8> {
    let img = RgbaImage::from_pixel(width, height, Rgba([20, 120, 200, 255]));
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, ImageFormat::Png).unwrap();
    out.into_inner()
}

#[derive(Default)]
pub struct FakeStorage {
    pub folders: Mutex<Vec<String>>,
}

#[async_trait]
impl ObjectStorage for FakeStorage {
    async fn upload_bytes(
        &self,
        _bytes: Vec<u8>,
        folder: &str,
        name_hint: &str,
    ) -> Result<StoredObject, StorageError> {
        self.folders.lock().unwrap().push(folder.to_string());
        let id = format!("{folder}/{name_hint}.png");
        Ok(StoredObject {
            url: format!("{CDN}/{id}"),
            id,
        })
    }

    async fn upload_from_url(
        &self,
        _url: &str,
        folder: &str,
        name_hint: &str,
    ) -> Result<StoredObject, StorageError> {
        self.upload_bytes(Vec::new(), folder, name_hint).await
    }

    fn owns(&self, url: &str) -> bool {
        url.starts_with(CDN)
    }
}

/// Generation, edit and identity-transfer provider in one.
#[derive(Default)]
pub struct FakeProvider {
    pub fail_generation: bool,
    pub calls: Mutex<Vec<&'static str>>,
}

#[async_trait]
impl ImageGenerator for FakeProvider {
    async fn generate(&self, _request: &GenerationRequest) -> Result<ProviderOutput, ProviderError> {
        self.calls.lock().unwrap().push("generate");
        if self.fail_generation {
            return Err(ProviderError::Api {
                status: 503,
                body: "model overloaded".into(),
            });
        }
        Ok(ProviderOutput::Url("https://provider.test/generated.png".into()))
    }
}

#[async_trait]
impl ImageEditor for FakeProvider {
    async fn edit(&self, _request: &EditRequest) -> Result<Vec<u8>, ProviderError> {
        self.calls.lock().unwrap().push("edit");
        Ok(png(4, 6))
    }
}

#[async_trait]
impl FaceSwapper for FakeProvider {
    async fn swap(&self, _identity: &str, _target: &str) -> Result<ProviderOutput, ProviderError> {
        self.calls.lock().unwrap().push("swap");
        Ok(ProviderOutput::Url("https://provider.test/swapped.png".into()))
    }
}

pub struct FakeFetcher;

#[async_trait]
impl RemoteFetcher for FakeFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        if url == MODEL_URL {
            Ok(png(30, 50))
        } else {
            Err(FetchError::Status(404))
        }
    }
}

// ---------------------------------------------------------------------------
// App
// ---------------------------------------------------------------------------

pub fn jwt_config() -> JwtConfig {
    JwtConfig {
        secret: JWT_SECRET.to_string(),
        token_expiry_days: 1,
    }
}

pub fn token_for(owner_id: OwnerId) -> String {
    generate_token(owner_id, &jwt_config()).expect("token generation should succeed")
}

/// Build a test `ServerConfig` rooted in `dir`.
pub fn test_config(dir: &std::path::Path) -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        max_upload_bytes: 20 * 1024 * 1024,
        upload_dir: dir.join("uploads"),
        scratch_dir: dir.join("temp"),
        heartbeat_interval: Duration::from_secs(60),
        default_instruction: "Dress the model.".to_string(),
        jwt: jwt_config(),
    }
}

/// Everything a test may want to inspect after a request.
pub struct TestApp {
    pub router: Router,
    pub ledger: Arc<InMemoryLedger>,
    pub provider: Arc<FakeProvider>,
    pub storage: Arc<FakeStorage>,
    pub ws_manager: Arc<WsManager>,
    pub event_bus: Arc<EventBus>,
    pub upload_dir: PathBuf,
    pub scratch_dir: PathBuf,
    _dir: tempfile::TempDir,
}

pub async fn build_test_app() -> TestApp {
    build_test_app_with(FakeProvider::default()).await
}

/// Build the full application router over in-memory collaborators.
///
/// Uses the same [`build_app_router`] as `main.rs`, so the middleware stack
/// (CORS, request ID, timeout, body limit, tracing, panic recovery) matches
/// production.
pub async fn build_test_app_with(provider: FakeProvider) -> TestApp {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());

    let ledger = Arc::new(InMemoryLedger::new());
    ledger.insert_account(OWNER, 5).await;
    ledger.insert_account(BROKE_OWNER, 0).await;

    let provider = Arc::new(provider);
    let storage = Arc::new(FakeStorage::default());
    let event_bus = Arc::new(EventBus::default());
    let ws_manager = Arc::new(WsManager::new());

    let mut settings = PipelineSettings::new(config.scratch_dir.clone());
    settings.heartbeat_interval = config.heartbeat_interval;
    settings.canvas = CanvasSpec {
        width: 60,
        height: 40,
        filter: FilterType::Nearest,
        ..CanvasSpec::default()
    };
    let orchestrator = Orchestrator::new(
        Collaborators {
            storage: storage.clone(),
            generator: provider.clone(),
            editor: provider.clone(),
            face_swapper: provider.clone(),
            fetcher: Arc::new(FakeFetcher),
            history: ledger.clone(),
            credits: ledger.clone(),
            events: event_bus.clone(),
        },
        settings,
    );

    let state = AppState {
        config: Arc::new(config.clone()),
        ws_manager: ws_manager.clone(),
        event_bus: event_bus.clone(),
        orchestrator: Arc::new(orchestrator),
        accounts: ledger.clone(),
        media_dir: None,
    };

    TestApp {
        router: build_app_router(state, &config),
        ledger,
        provider,
        storage,
        ws_manager,
        event_bus,
        upload_dir: config.upload_dir.clone(),
        scratch_dir: config.scratch_dir.clone(),
        _dir: dir,
    }
}

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

pub async fn get(app: Router, uri: &str) -> Response<Body> {
    let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

/// Hand-assembled `multipart/form-data` body.
#[derive(Default)]
pub struct MultipartBody {
    buf: Vec<u8>,
}

impl MultipartBody {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn file(mut self, field: &str, file_name: &str, content_type: &str, bytes: &[u8]) -> Self {
        self.buf.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"{file_name}\"\r\nContent-Type: {content_type}\r\n\r\n"
            )
            .as_bytes(),
        );
        self.buf.extend_from_slice(bytes);
        self.buf.extend_from_slice(b"\r\n");
        self
    }

    pub fn png(self, file_name: &str) -> Self {
        self.file("images", file_name, "image/png", &png(16, 16))
    }

    pub fn text(mut self, field: &str, value: &str) -> Self {
        self.buf.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
        self
    }

    pub fn finish(mut self) -> Vec<u8> {
        self.buf
            .extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
        self.buf
    }
}

pub async fn post_multipart(
    app: Router,
    uri: &str,
    token: Option<&str>,
    body: MultipartBody,
) -> Response<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header(
            "content-type",
            format!("multipart/form-data; boundary={BOUNDARY}"),
        );
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }
    let request = builder.body(Body::from(body.finish())).unwrap();
    app.oneshot(request).await.unwrap()
}

pub fn dir_is_empty(path: &std::path::Path) -> bool {
    std::fs::read_dir(path)
        .map(|mut d| d.next().is_none())
        .unwrap_or(true)
}
