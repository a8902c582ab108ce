//! SPARK checkpoint endpoints
//!
//! Each section is saved on its own with `PUT /api/spark/:email/:section`.
//! The body is the section's JSON payload, optionally with a `team` string.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    response::Response,
    Json,
};
use gabinete_common::{SectionName, SparkEntry, SparkSection};
use serde::Serialize;
use serde_json::Value;

use super::attachment;
use crate::error::{ApiError, ApiResult};
use crate::AppState;

/// Checkpoint record with its completion count
#[derive(Debug, Serialize)]
pub struct SparkResponse {
    pub entry: SparkEntry,
    /// Saved sections out of five
    pub completion: usize,
}

impl From<SparkEntry> for SparkResponse {
    fn from(entry: SparkEntry) -> Self {
        let completion = entry.completion();
        Self { entry, completion }
    }
}

/// PUT /api/spark/:email/:section
pub async fn put_section(
    State(state): State<AppState>,
    Path((email, section)): Path<(String, String)>,
    body: Result<Json<Value>, JsonRejection>,
) -> ApiResult<Json<SparkResponse>> {
    let Json(mut body) = body?;
    let name: SectionName = section.parse()?;

    let team = match body.as_object_mut().and_then(|o| o.remove("team")) {
        Some(Value::String(team)) => Some(team),
        Some(Value::Null) | None => None,
        Some(_) => return Err(ApiError::BadRequest("team must be a string".to_string())),
    };

    let section = SparkSection::from_json(name, body)
        .map_err(|e| ApiError::BadRequest(format!("Invalid {} payload: {}", name, e)))?;

    let entry = state
        .spark
        .save_section(&email, team.as_deref(), section)
        .await?;
    Ok(Json(entry.into()))
}

/// GET /api/spark/:email
pub async fn get_spark(
    State(state): State<AppState>,
    Path(email): Path<String>,
) -> ApiResult<Json<SparkResponse>> {
    state
        .spark
        .get(&email)
        .await?
        .map(|entry| Json(entry.into()))
        .ok_or_else(|| ApiError::NotFound(format!("No SPARK record for {}", email)))
}

/// GET /api/spark/:email/export
///
/// Full record as a downloadable JSON document.
pub async fn export_spark(State(state): State<AppState>, Path(email): Path<String>) -> ApiResult<Response> {
    let document = state.spark.export(&email).await?;
    let body = serde_json::to_vec_pretty(&document)
        .map_err(|e| ApiError::Internal(format!("Failed to encode export: {}", e)))?;

    Ok(attachment("application/json", &export_filename(&email), body))
}

/// `spark_<email>.json` with anything outside `[A-Za-z0-9._-]` replaced by `_`
fn export_filename(email: &str) -> String {
    let safe: String = email
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();
    format!("spark_{}.json", safe)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_export_filename() {
        assert_eq!(export_filename("ana.p@example.com"), "spark_ana.p_example.com.json");
        assert_eq!(export_filename("x\"y@z"), "spark_x_y_z.json");
    }
}
