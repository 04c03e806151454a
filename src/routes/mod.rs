//! HTTP routes and the shared error-to-response mapping.

pub mod auth;
pub mod ics;
pub mod sessions;
pub mod speakers;

use axum::{
    Json, Router,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use greenroom_core::{Claims, PortalError, TokenSigner};
use serde::Serialize;

use crate::state::AppState;

pub fn router(state: AppState) -> Router {
    Router::new()
        .merge(auth::router())
        .merge(sessions::router())
        .merge(speakers::router())
        .merge(ics::router())
        .with_state(state)
}

/// Standard API error response body.
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Errors as they leave the handler layer.
///
/// Authentication failures are deliberately uniform: expired, malformed,
/// wrong-scope and wrong-subject tokens all produce the same 401 body so a
/// caller cannot probe which check failed. Internal details go to the log,
/// never to the client.
pub enum ApiError {
    Unauthenticated,
    NotFound(&'static str),
    BadRequest(String),
    Internal(anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Unauthenticated => {
                (StatusCode::UNAUTHORIZED, "Invalid key".to_string())
            }
            ApiError::NotFound(message) => (StatusCode::NOT_FOUND, message.to_string()),
            ApiError::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
            ApiError::Internal(err) => {
                tracing::error!(error = ?err, "request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };
        (status, Json(ErrorResponse { error: message })).into_response()
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        ApiError::Internal(err)
    }
}

// Core errors reaching a handler are server-side faults (bad config, a
// session record with garbage times), never authentication outcomes.
impl From<PortalError> for ApiError {
    fn from(err: PortalError) -> Self {
        ApiError::Internal(anyhow::Error::new(err))
    }
}

/// Authenticate the `key` query parameter against a required scope.
pub fn authenticate(
    signer: &TokenSigner,
    key: Option<&str>,
    scope: &str,
) -> Result<Claims, ApiError> {
    key.and_then(|token| signer.decode(token))
        .filter(|claims| claims.scope == scope)
        .ok_or(ApiError::Unauthenticated)
}
