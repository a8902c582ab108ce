//! Admin key middleware
//!
//! Admin requests carry the shared key in the `x-admin-key` header. A missing
//! or wrong key gets 401 and the handler never runs.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use subtle::ConstantTimeEq;
use tracing::warn;

use crate::error::ApiError;
use crate::AppState;

/// Header carrying the admin key
pub const ADMIN_KEY_HEADER: &str = "x-admin-key";

/// Applied to the `/api/admin` routes only
pub async fn admin_auth_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let provided = request
        .headers()
        .get(ADMIN_KEY_HEADER)
        .and_then(|v| v.to_str().ok());

    match provided {
        Some(key) if key_matches(key, &state.admin_key) => Ok(next.run(request).await),
        Some(_) => {
            warn!("Rejected admin request to {}: wrong key", request.uri().path());
            Err(ApiError::Unauthorized)
        }
        None => {
            warn!("Rejected admin request to {}: no key", request.uri().path());
            Err(ApiError::Unauthorized)
        }
    }
}

/// Constant-time key comparison; a length mismatch still does one comparison
fn key_matches(provided: &str, expected: &str) -> bool {
    let provided = provided.as_bytes();
    let expected = expected.as_bytes();
    if provided.len() != expected.len() {
        let _ = expected.ct_eq(expected);
        return false;
    }
    provided.ct_eq(expected).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_matches() {
        assert!(key_matches("regina-demo", "regina-demo"));
        assert!(!key_matches("regina-demx", "regina-demo"));
        assert!(!key_matches("regina", "regina-demo"));
        assert!(!key_matches("", "regina-demo"));
    }
}
