use std::path::PathBuf;
use std::time::Duration;

use modelgen_pipeline::orchestrator::DEFAULT_INSTRUCTION;

use crate::auth::jwt::JwtConfig;

/// Server configuration loaded from environment variables.
///
/// All fields except the JWT secret have defaults suitable for local
/// development. Provider, storage and ledger settings are loaded by their own
/// crates.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS`.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds. Pipeline routes wait for provider
    /// calls, so the default is long (`600`).
    pub request_timeout_secs: u64,
    /// Request body limit for multipart uploads.
    pub max_upload_bytes: usize,
    /// Where multipart uploads are staged before validation.
    pub upload_dir: PathBuf,
    /// Shared directory for per-generation scratch files.
    pub scratch_dir: PathBuf,
    /// Interval between "still working" events during provider calls.
    pub heartbeat_interval: Duration,
    /// Instruction used when a request carries no prompt.
    pub default_instruction: String,
    pub jwt: JwtConfig,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                 | Default                    |
    /// |-------------------------|----------------------------|
    /// | `HOST`                  | `0.0.0.0`                  |
    /// | `PORT`                  | `3000`                     |
    /// | `CORS_ORIGINS`          | `http://localhost:3000`    |
    /// | `REQUEST_TIMEOUT_SECS`  | `600`                      |
    /// | `MAX_UPLOAD_BYTES`      | `52428800`                 |
    /// | `UPLOAD_DIR`            | `./uploads`                |
    /// | `SCRATCH_DIR`           | `./temp`                   |
    /// | `HEARTBEAT_INTERVAL_MS` | `2000`                     |
    /// | `DEFAULT_INSTRUCTION`   | built-in try-on wording    |
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let port: u16 = std::env::var("PORT")
            .unwrap_or_else(|_| "3000".into())
            .parse()
            .expect("PORT must be a valid u16");

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:3000".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs: u64 = std::env::var("REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|_| "600".into())
            .parse()
            .expect("REQUEST_TIMEOUT_SECS must be a valid u64");

        let max_upload_bytes: usize = std::env::var("MAX_UPLOAD_BYTES")
            .unwrap_or_else(|_| (50 * 1024 * 1024).to_string())
            .parse()
            .expect("MAX_UPLOAD_BYTES must be a valid usize");

        let upload_dir = std::env::var("UPLOAD_DIR")
            .unwrap_or_else(|_| "./uploads".into())
            .into();
        let scratch_dir = std::env::var("SCRATCH_DIR")
            .unwrap_or_else(|_| "./temp".into())
            .into();

        let heartbeat_ms: u64 = std::env::var("HEARTBEAT_INTERVAL_MS")
            .unwrap_or_else(|_| "2000".into())
            .parse()
            .expect("HEARTBEAT_INTERVAL_MS must be a valid u64");

        let default_instruction = std::env::var("DEFAULT_INSTRUCTION")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_INSTRUCTION.to_string());

        let jwt = JwtConfig::from_env();

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            max_upload_bytes,
            upload_dir,
            scratch_dir,
            heartbeat_interval: Duration::from_millis(heartbeat_ms),
            default_instruction,
            jwt,
        }
    }
}
