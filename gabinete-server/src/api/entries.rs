//! Submission endpoints
//!
//! `POST /api/entries` takes a multipart form: the text fields of
//! [`NewEntry`], repeated `images` file parts and one optional `audio` part.
//! Required fields are checked before any media is written, and media saved
//! for a submission whose insert fails is removed again, so a rejected
//! submission leaves nothing on disk.

use axum::{
    extract::{multipart::Field, Multipart, Path, Query, State},
    http::StatusCode,
    Json,
};
use gabinete_common::db::{Entry, EntryFilter, NewEntry, MAX_IMAGES};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{ApiError, ApiResult};
use crate::media::MediaStore;
use crate::pagination::{calculate_pagination, Pagination, PAGE_SIZE};
use crate::AppState;

/// Created entry plus any per-file media problems
#[derive(Debug, Serialize)]
pub struct CreatedEntry {
    pub entry: Entry,
    pub warnings: Vec<String>,
}

/// One uploaded file, held in memory until validation passes
struct Upload {
    file_name: Option<String>,
    bytes: Vec<u8>,
}

/// POST /api/entries
pub async fn create_entry(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> ApiResult<(StatusCode, Json<CreatedEntry>)> {
    let mut form = NewEntry::default();
    let mut images: Vec<Upload> = Vec::new();
    let mut audio: Option<Upload> = None;
    let mut dropped_images = 0usize;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Malformed form data: {}", e)))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "images" => {
                let upload = read_upload(field).await?;
                if upload.bytes.is_empty() {
                    continue;
                }
                if images.len() < MAX_IMAGES {
                    images.push(upload);
                } else {
                    dropped_images += 1;
                }
            }
            "audio" => {
                let upload = read_upload(field).await?;
                if !upload.bytes.is_empty() {
                    audio = Some(upload);
                }
            }
            _ => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| ApiError::BadRequest(format!("Unreadable field {}: {}", name, e)))?;
                set_text_field(&mut form, &name, value);
            }
        }
    }

    let missing = form.missing_fields();
    if !missing.is_empty() {
        return Err(ApiError::Validation { missing });
    }

    if dropped_images > 0 {
        debug!("Ignoring {} images beyond the first {}", dropped_images, MAX_IMAGES);
    }

    let mut warnings = Vec::new();
    for (index, upload) in images.into_iter().enumerate() {
        let label = upload
            .file_name
            .clone()
            .unwrap_or_else(|| format!("image {}", index + 1));
        let media = state.media.clone();
        match store_blocking(move || media.save_image(&upload.bytes)).await? {
            Ok(rel) => form.image_urls.push(rel),
            Err(e) => {
                warn!("Image {} skipped: {}", label, e);
                warnings.push(format!("Image {} was not saved: {}", label, e));
            }
        }
    }

    if let Some(upload) = audio {
        let media = state.media.clone();
        match store_blocking(move || media.save_audio(&upload.bytes, upload.file_name.as_deref())).await? {
            Ok(rel) => form.audio_url = Some(rel),
            Err(e) => {
                warn!("Audio skipped: {}", e);
                warnings.push(format!("Audio was not saved: {}", e));
            }
        }
    }

    let saved: Vec<String> = form
        .image_urls
        .iter()
        .cloned()
        .chain(form.audio_url.clone())
        .collect();

    match state.entries.create(form).await {
        Ok(entry) => Ok((StatusCode::CREATED, Json(CreatedEntry { entry, warnings }))),
        Err(e) => {
            discard_media(&state.media, saved).await;
            Err(e.into())
        }
    }
}

/// Remove media written for a submission that was not stored
async fn discard_media(media: &MediaStore, paths: Vec<String>) {
    if paths.is_empty() {
        return;
    }
    let media = media.clone();
    let result = tokio::task::spawn_blocking(move || {
        for rel in &paths {
            if let Err(e) = media.remove(rel) {
                warn!("Failed to remove orphaned media {}: {}", rel, e);
            }
        }
    })
    .await;
    if let Err(e) = result {
        warn!("Media cleanup task failed: {}", e);
    }
}

async fn read_upload(field: Field<'_>) -> ApiResult<Upload> {
    let file_name = field.file_name().map(str::to_string);
    let bytes = field
        .bytes()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Unreadable upload: {}", e)))?;
    Ok(Upload {
        file_name,
        bytes: bytes.to_vec(),
    })
}

/// Run a media write on the blocking pool
async fn store_blocking<F>(f: F) -> ApiResult<gabinete_common::Result<String>>
where
    F: FnOnce() -> gabinete_common::Result<String> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| ApiError::Internal(format!("Media task failed: {}", e)))
}

fn set_text_field(form: &mut NewEntry, name: &str, value: String) {
    match name {
        "student_name" => form.student_name = value,
        "email" => form.email = value,
        "group" => form.group = Some(value),
        "artifact_title" => form.artifact_title = value,
        "artifact_desc" => form.artifact_desc = value,
        "tags" => form.tags = value,
        "reflection_q1" => form.reflection_q1 = value,
        "reflection_q2" => form.reflection_q2 = value,
        "reflection_q3" => form.reflection_q3 = value,
        "suno_link" => form.suno_link = Some(value),
        other => debug!("Ignoring unknown form field {}", other),
    }
}

/// Gallery query parameters
#[derive(Debug, Deserialize)]
pub struct GalleryQuery {
    pub group: Option<String>,
    /// Free-text search
    pub q: Option<String>,
    pub tag: Option<String>,
    #[serde(default = "default_page")]
    pub page: usize,
}

fn default_page() -> usize {
    1
}

#[derive(Debug, Serialize)]
pub struct GalleryResponse {
    pub entries: Vec<Entry>,
    pub total_results: usize,
    pub page_size: usize,
    #[serde(flatten)]
    pub pagination: Pagination,
}

/// GET /api/entries
pub async fn list_entries(
    State(state): State<AppState>,
    Query(query): Query<GalleryQuery>,
) -> ApiResult<Json<GalleryResponse>> {
    let filter = EntryFilter {
        group: query.group,
        free_text: query.q,
        exact_tag: query.tag,
    };
    let matching = state.entries.filter(&filter).await?;
    let total_results = matching.len();
    let p = calculate_pagination(total_results, query.page);

    let entries = matching.into_iter().skip(p.offset).take(PAGE_SIZE).collect();

    Ok(Json(GalleryResponse {
        entries,
        total_results,
        page_size: PAGE_SIZE,
        pagination: p,
    }))
}

/// GET /api/entries/:id
pub async fn get_entry(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<Json<Entry>> {
    state
        .entries
        .get(id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Entry {}", id)))
}
