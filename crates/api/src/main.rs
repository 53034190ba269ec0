use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use modelgen_api::config::ServerConfig;
use modelgen_api::notifications::ProgressRouter;
use modelgen_api::router::build_app_router;
use modelgen_api::state::AppState;
use modelgen_api::ws;
use modelgen_cloud::{build_storage, StorageConfig};
use modelgen_events::EventBus;
use modelgen_ledger::{
    AccountDirectory, CreditLedger, GenerationLedger, InMemoryLedger, UserApiClient,
    UserApiConfig,
};
use modelgen_pipeline::{Collaborators, HttpFetcher, Orchestrator, PipelineSettings};
use modelgen_providers::{OpenAiConfig, OpenAiImageEditor, ReplicateClient, ReplicateConfig};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        "modelgen_api=debug,modelgen_pipeline=debug,tower_http=debug".into()
    });
    let json_logs = std::env::var("LOG_FORMAT").is_ok_and(|f| f.eq_ignore_ascii_case("json"));
    if json_logs {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    // --- Configuration ---
    let config = ServerConfig::from_env();
    tracing::info!(host = %config.host, port = %config.port, "Loaded server configuration");

    // --- Storage ---
    let storage_config = StorageConfig::from_env().expect("Invalid storage configuration");
    let storage = build_storage(&storage_config)
        .await
        .expect("Failed to initialise object storage");
    let media_dir = storage_config.local_dir().cloned();
    tracing::info!(backend = ?storage_config.backend, "Object storage ready");

    // --- Providers ---
    let replicate = Arc::new(
        ReplicateClient::new(ReplicateConfig::from_env().expect("Invalid Replicate configuration"))
            .expect("Failed to build Replicate client"),
    );
    let editor = Arc::new(
        OpenAiImageEditor::new(OpenAiConfig::from_env().expect("Invalid OpenAI configuration"))
            .expect("Failed to build OpenAI client"),
    );
    let fetcher = Arc::new(HttpFetcher::new().expect("Failed to build HTTP fetcher"));

    // --- User service ---
    let (accounts, history, credits): (
        Arc<dyn AccountDirectory>,
        Arc<dyn GenerationLedger>,
        Arc<dyn CreditLedger>,
    ) = match UserApiConfig::from_env().expect("Invalid user API configuration") {
        Some(user_api) => {
            let client =
                Arc::new(UserApiClient::new(user_api).expect("Failed to build user API client"));
            tracing::info!("Using external user service");
            (
                client.clone() as Arc<dyn AccountDirectory>,
                client.clone() as Arc<dyn GenerationLedger>,
                client as Arc<dyn CreditLedger>,
            )
        }
        None => {
            tracing::warn!("USER_API_URL not set, using in-memory ledger (development only)");
            let ledger = Arc::new(InMemoryLedger::new());
            (
                ledger.clone() as Arc<dyn AccountDirectory>,
                ledger.clone() as Arc<dyn GenerationLedger>,
                ledger as Arc<dyn CreditLedger>,
            )
        }
    };

    // --- Event bus ---
    let event_bus = Arc::new(EventBus::default());

    // --- WebSocket manager ---
    let ws_manager = Arc::new(ws::WsManager::new());
    let heartbeat_cancel = CancellationToken::new();
    let heartbeat_handle = ws::start_heartbeat(Arc::clone(&ws_manager), heartbeat_cancel.clone());

    // Spawn progress router (routes bus events to sockets).
    let progress_router = ProgressRouter::new(Arc::clone(&ws_manager));
    let router_handle = tokio::spawn(progress_router.run(event_bus.subscribe()));
    tracing::info!("Progress router started");

    // --- Working directories ---
    tokio::fs::create_dir_all(&config.upload_dir)
        .await
        .expect("Failed to create upload directory");
    tokio::fs::create_dir_all(&config.scratch_dir)
        .await
        .expect("Failed to create scratch directory");

    // --- Orchestrator ---
    let mut settings = PipelineSettings::new(config.scratch_dir.clone());
    settings.heartbeat_interval = config.heartbeat_interval;
    settings.default_instruction = config.default_instruction.clone();

    let orchestrator = Orchestrator::new(
        Collaborators {
            storage,
            generator: replicate.clone(),
            editor,
            face_swapper: replicate,
            fetcher,
            history,
            credits,
            events: event_bus.clone(),
        },
        settings,
    );

    // --- App state ---
    let state = AppState {
        config: Arc::new(config.clone()),
        ws_manager: Arc::clone(&ws_manager),
        event_bus: Arc::clone(&event_bus),
        orchestrator: Arc::new(orchestrator),
        accounts,
        media_dir,
    };

    let app = build_app_router(state, &config);

    // --- Start server ---
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, cleaning up");

    heartbeat_cancel.cancel();
    let _ = tokio::time::timeout(Duration::from_secs(5), heartbeat_handle).await;
    tracing::info!("Heartbeat task stopped");

    // Dropping the last bus handle closes the channel and stops the router.
    drop(event_bus);
    let _ = tokio::time::timeout(Duration::from_secs(5), router_handle).await;
    tracing::info!("Progress router shut down");

    let ws_count = ws_manager.connection_count().await;
    tracing::info!(ws_count, "Closing remaining WebSocket connections");
    ws_manager.shutdown_all().await;

    tracing::info!("Graceful shutdown complete");
}

/// Wait for a termination signal to initiate graceful shutdown.
///
/// Handles both SIGINT (Ctrl-C) and SIGTERM (on Unix).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
