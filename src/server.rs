//!
//! eventshare HTTP server
//! ----------------------
//! This module defines the Axum-based HTTP API.
//!
//! Responsibilities:
//! - Building the shared `AppState` (store, blob layer, token service, auth provider)
//!   from a `Config`.
//! - Public routes: health, register, login, profile picture download.
//! - Protected routes behind the bearer-token gate: profile, picture upload,
//!   follow, event creation, discovery and followed feeds, join.
//! - Mapping every failure to a JSON error body with the right status code.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::{middleware, Json, Router};
use tracing::info;

use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::identity::{require_auth, AuthGate, AuthProvider, LocalAuthProvider, TokenService};
use crate::security::PasswordHasherConfig;
use crate::storage::{BlobStore, SharedStore};

pub mod events;
pub mod form;
pub mod users;
pub mod views;

/// Upper bound on images attached to one event.
pub const MAX_EVENT_IMAGES: usize = 10;

/// Shared server state injected into all handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: SharedStore,
    pub blobs: BlobStore,
    pub tokens: TokenService,
    pub auth: Arc<dyn AuthProvider>,
}

impl AppState {
    /// Open the store and blob directory under `cfg.data_dir` and wire the components.
    pub fn from_config(cfg: &Config) -> anyhow::Result<Self> {
        std::fs::create_dir_all(&cfg.data_dir)
            .with_context(|| format!("Failed to create or access data folder: {}", cfg.data_dir.display()))?;
        let store = SharedStore::open(cfg.store_path())
            .with_context(|| format!("While opening store at {}", cfg.store_path().display()))?;
        let blobs = BlobStore::new(cfg.uploads_dir(), cfg.max_upload_bytes)
            .with_context(|| format!("While creating uploads folder {}", cfg.uploads_dir().display()))?;
        let hasher = PasswordHasherConfig::new(cfg.hash_cost)?;
        let auth = LocalAuthProvider::new(store.clone(), hasher)?;
        Ok(Self {
            store,
            blobs,
            tokens: TokenService::new(&cfg.jwt_secret, cfg.token_ttl),
            auth: Arc::new(auth),
        })
    }
}

/// Run store or credential work on the blocking pool. Store mutations write the
/// snapshot to disk while holding the store lock, so they never run on an async worker.
pub(crate) async fn blocking<T, F>(f: F) -> AppResult<T>
where
    T: Send + 'static,
    F: FnOnce() -> AppResult<T> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| AppError::storage(format!("blocking task failed: {}", e)))?
}

/// Largest request body accepted: a full set of event images plus form overhead.
fn body_limit(max_upload_bytes: usize) -> usize {
    max_upload_bytes.saturating_mul(MAX_EVENT_IMAGES).saturating_add(1024 * 1024)
}

pub fn router(state: AppState) -> Router {
    let gate = AuthGate::new(state.tokens.clone(), state.store.clone());
    let limit = body_limit(state.blobs.max_bytes());

    let protected = Router::new()
        .route("/users/me", get(users::me))
        .route("/users/upload", post(users::upload_profile_picture))
        .route("/users/{user_id}/follow", post(users::follow_user))
        .route("/events", post(events::create_event))
        .route("/events/discovery", get(events::discovery))
        .route("/events/followed", get(events::followed))
        .route("/events/{event_id}/join", post(events::join_event))
        .route_layer(middleware::from_fn_with_state(gate, require_auth));

    Router::new()
        .route("/", get(health))
        .route("/users/register", post(users::register))
        .route("/users/login", post(users::login))
        .route("/users/profilePicture/{user_id}", get(users::profile_picture))
        .merge(protected)
        .fallback(|| async { AppError::missing("Route") })
        .layer(DefaultBodyLimit::max(limit))
        .with_state(state)
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "message": "eventshare ok" }))
}

fn log_startup(cfg: &Config) {
    let cwd = std::env::current_dir().ok();
    info!(
        target: "startup",
        "eventshare starting: cwd={:?}, data_dir={:?}, data_dir_exists={}, http_port={}, token_ttl_days={}, hash_cost={:?}, max_upload_bytes={}",
        cwd,
        cfg.data_dir,
        cfg.data_dir.exists(),
        cfg.http_port,
        cfg.token_ttl.num_days(),
        cfg.hash_cost,
        cfg.max_upload_bytes
    );
}

/// Start the HTTP server and serve until the listener fails.
pub async fn run(cfg: Config) -> anyhow::Result<()> {
    log_startup(&cfg);
    let state = AppState::from_config(&cfg)?;
    {
        let store = state.store.0.lock();
        info!(target: "startup", "store ready: users={} events={}", store.user_count(), store.event_count());
    }
    let app = router(state);

    let addr: SocketAddr = format!("0.0.0.0:{}", cfg.http_port).parse()?;
    info!("Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
