//! Carelink registration server
//!
//! Accepts registration forms over HTTP and links caregivers and elders to
//! primary users by invite code.
//!
//! # Configuration
//!
//! Environment variables:
//! - `CARELINK_PORT`: Port to listen on (default: 8080)
//! - `CARELINK_DATABASE_PATH`: SQLite database path (default: ~/.local/share/carelink/carelink.db)
//! - `CARELINK_INVITE_CODE_ATTEMPTS`: Invite codes drawn before giving up (default: 5)
//! - `CARELINK_CONFIG`: Path to config file (default: ~/.config/carelink/config.yaml)
//!
//! # Endpoints
//!
//! - `GET /health`: Health check endpoint
//! - `POST /register`: Submit a registration form
//! - `GET /users/{id}`: Fetch a stored user record

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use carelink::config::Config;
use carelink::credentials::SqliteCredentials;
use carelink::db::init_db;
use carelink::registration::Registrar;
use carelink::server::{router, AppState};
use carelink::store::SqliteStore;

#[tokio::main]
async fn main() {
    carelink::logging::init("carelink=info,carelink_server=info,tower_http=info");

    if let Err(e) = run().await {
        tracing::error!("{}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load(std::env::var("CARELINK_CONFIG").ok().map(PathBuf::from))?;

    if let Some(path) = &config.config_file {
        tracing::info!("Config file: {}", path.display());
    }
    tracing::info!(
        "Database: {} ({})",
        config.database_path.value.display(),
        config.database_path.source
    );

    let pool = init_db(&config.database_path.value).await?;

    let registrar = Registrar::new(
        Arc::new(SqliteCredentials::new(pool.clone())),
        Arc::new(SqliteStore::new(pool)),
    )
    .with_invite_code_attempts(config.invite_code_attempts.value);

    let app = router(AppState::new(registrar));

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port.value));
    tracing::info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
