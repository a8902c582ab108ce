//! gabinete-server library
//!
//! HTTP service for gabinete submissions, SPARK checkpoints and rubric
//! scores. Admin routes are gated by a single shared key.

use axum::extract::DefaultBodyLimit;
use axum::Router;
use sqlx::SqlitePool;
use std::path::PathBuf;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

pub mod api;
pub mod db;
pub mod error;
pub mod export;
pub mod media;
pub mod pagination;

use db::{CheckpointStore, ScoreStore, SubmissionStore};
use media::MediaStore;

/// Largest accepted submission body (six images plus one audio file)
pub const MAX_UPLOAD_BYTES: usize = 64 * 1024 * 1024;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub entries: SubmissionStore,
    pub spark: CheckpointStore,
    pub scores: ScoreStore,
    pub media: MediaStore,
    /// Shared secret for the admin routes
    pub admin_key: String,
}

impl AppState {
    /// Create new application state over one pool and one data root
    pub fn new(db: SqlitePool, root_folder: PathBuf, admin_key: String) -> Self {
        Self {
            entries: SubmissionStore::new(db.clone()),
            spark: CheckpointStore::new(db.clone()),
            scores: ScoreStore::new(db),
            media: MediaStore::new(root_folder),
            admin_key,
        }
    }
}

/// Build application router
///
/// `/api/admin/*` requires the admin key; everything else is public.
/// Stored media is served read-only under `/media/uploads`.
pub fn build_router(state: AppState) -> Router {
    use axum::middleware;
    use axum::routing::{get, put};

    let admin = Router::new()
        .route("/api/admin/stats", get(api::admin_stats))
        .route("/api/admin/export/entries.csv", get(api::export_entries_csv))
        .route("/api/admin/export/entries.zip", get(api::export_entries_archive))
        .route("/api/admin/export/scores.csv", get(api::export_scores_csv))
        .route("/api/admin/scores/:email", put(api::put_score).get(api::get_score))
        .route("/api/admin/spark/complete", get(api::list_complete))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            api::admin_auth_middleware,
        ));

    let public = Router::new()
        .route(
            "/api/entries",
            get(api::list_entries)
                .post(api::create_entry)
                .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES)),
        )
        .route("/api/entries/:id", get(api::get_entry))
        .route("/api/spark/:email", get(api::get_spark))
        .route("/api/spark/:email/export", get(api::export_spark))
        .route("/api/spark/:email/:section", put(api::put_section))
        .merge(api::health_routes());

    let uploads = ServeDir::new(state.media.root().join("uploads"));

    Router::new()
        .merge(admin)
        .merge(public)
        .nest_service("/media/uploads", uploads)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
