//! Teacher-panel endpoints (admin key required)

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    response::Response,
    Json,
};
use gabinete_common::db::{EntryStats, Rubric, SparkScore};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::attachment;
use crate::error::{ApiError, ApiResult};
use crate::export::{entries_archive, entries_csv, ARCHIVE_NAME, ENTRIES_CSV_NAME};
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct AdminStats {
    #[serde(flatten)]
    pub entries: EntryStats,
    /// Students with all five SPARK sections saved
    pub spark_complete: usize,
}

/// GET /api/admin/stats
pub async fn admin_stats(State(state): State<AppState>) -> ApiResult<Json<AdminStats>> {
    let entries = state.entries.stats().await?;
    let spark_complete = state.spark.list_complete().await?.len();
    Ok(Json(AdminStats {
        entries,
        spark_complete,
    }))
}

/// GET /api/admin/export/entries.csv
pub async fn export_entries_csv(State(state): State<AppState>) -> ApiResult<Response> {
    let entries = state.entries.list_all().await?;
    let csv = entries_csv(&entries)?;
    info!("Exported {} entries as CSV", entries.len());
    Ok(attachment("text/csv; charset=utf-8", ENTRIES_CSV_NAME, csv))
}

/// GET /api/admin/export/entries.zip
pub async fn export_entries_archive(State(state): State<AppState>) -> ApiResult<Response> {
    let entries = state.entries.list_all().await?;
    let media = state.media.clone();

    let archive = tokio::task::spawn_blocking(move || entries_archive(&entries, &media))
        .await
        .map_err(|e| ApiError::Internal(format!("Archive task failed: {}", e)))??;

    Ok(attachment("application/zip", ARCHIVE_NAME, archive))
}

/// Body of a rubric save
#[derive(Debug, Deserialize)]
pub struct ScoreRequest {
    #[serde(flatten)]
    pub rubric: Rubric,
    #[serde(default)]
    pub comments: String,
}

/// PUT /api/admin/scores/:email
///
/// Only students with a SPARK record can be scored.
pub async fn put_score(
    State(state): State<AppState>,
    Path(email): Path<String>,
    request: Result<Json<ScoreRequest>, JsonRejection>,
) -> ApiResult<Json<SparkScore>> {
    let Json(request) = request?;
    if state.spark.get(&email).await?.is_none() {
        return Err(ApiError::NotFound(format!("No SPARK record for {}", email)));
    }

    let score = state
        .scores
        .upsert_score(&email, request.rubric, &request.comments)
        .await?;
    Ok(Json(score))
}

/// GET /api/admin/scores/:email
pub async fn get_score(
    State(state): State<AppState>,
    Path(email): Path<String>,
) -> ApiResult<Json<SparkScore>> {
    state
        .scores
        .get_score(&email)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("No score for {}", email)))
}

/// GET /api/admin/export/scores.csv
pub async fn export_scores_csv(State(state): State<AppState>) -> ApiResult<Response> {
    let csv = state.scores.export_all_csv().await?;
    Ok(attachment("text/csv; charset=utf-8", "spark_scores.csv", csv))
}

/// GET /api/admin/spark/complete
pub async fn list_complete(State(state): State<AppState>) -> ApiResult<Json<Vec<String>>> {
    Ok(Json(state.spark.list_complete().await?))
}
