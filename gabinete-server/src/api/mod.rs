//! HTTP API handlers for gabinete-server

pub mod admin;
pub mod auth;
pub mod entries;
pub mod health;
pub mod spark;

use axum::http::header;
use axum::response::{IntoResponse, Response};

pub use admin::{
    admin_stats, export_entries_archive, export_entries_csv, export_scores_csv, get_score,
    list_complete, put_score,
};
pub use auth::admin_auth_middleware;
pub use entries::{create_entry, get_entry, list_entries};
pub use health::health_routes;
pub use spark::{export_spark, get_spark, put_section};

/// Response that the browser saves as `filename`
pub(crate) fn attachment(content_type: &str, filename: &str, body: Vec<u8>) -> Response {
    (
        [
            (header::CONTENT_TYPE, content_type.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", filename),
            ),
        ],
        body,
    )
        .into_response()
}
