//! Token issuance endpoints.
//!
//! Two ways into the portal: a trusted backend exchanges the shared API key
//! for a token directly, or a speaker requests a login link by email. Tokens
//! themselves are stateless; nothing issued here is stored.

use axum::{
    Form, Json, Router,
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::post,
};
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::routes::ApiError;
use crate::state::AppState;
use crate::urls;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/auth/request", post(request_token))
        .route("/api/auth/request-link", post(request_link))
}

/// Constant-time comparison so the API key cannot be guessed byte by byte
/// from response timing.
fn api_key_matches(expected: &str, presented: &str) -> bool {
    if expected.len() != presented.len() {
        return false;
    }
    let mut diff = 0u8;
    for (a, b) in expected.bytes().zip(presented.bytes()) {
        diff |= a ^ b;
    }
    diff == 0
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestTokenBody {
    #[serde(default)]
    pub speaker_id: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestTokenResponse {
    pub token: String,
    pub speaker_id: String,
    pub slug: String,
    pub exp: i64,
}

/// POST /api/auth/request - machine token issuance (x-api-key protected)
async fn request_token(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<RequestTokenBody>,
) -> Result<Json<RequestTokenResponse>, ApiError> {
    let presented = headers
        .get("x-api-key")
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();
    if !api_key_matches(&state.config.secrets.api_key, presented) {
        return Err(ApiError::Unauthenticated);
    }

    if body.speaker_id.is_empty() {
        return Err(ApiError::BadRequest("speakerId is required".to_string()));
    }

    let expires_at = Utc::now() + Duration::seconds(state.config.tokens.auth_ttl_secs as i64);
    let token = state
        .signer
        .issue(expires_at, "auth", Some(&body.speaker_id))?;

    Ok(Json(RequestTokenResponse {
        token,
        speaker_id: body.speaker_id,
        slug: "auth".to_string(),
        exp: expires_at.timestamp(),
    }))
}

#[derive(Deserialize)]
pub struct LoginLinkForm {
    #[serde(default)]
    pub email: String,
    /// Honeypot. Humans never see this field; bots fill it.
    #[serde(default)]
    pub website: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginLinkResponse {
    pub ok: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cooldown_ms: Option<u64>,
}

const SENT_MESSAGE: &str = "A login link has been sent to your email.";
const COOLDOWN_MS: u64 = 60_000;

fn sent_response() -> (StatusCode, Json<LoginLinkResponse>) {
    (
        StatusCode::OK,
        Json(LoginLinkResponse {
            ok: true,
            message: SENT_MESSAGE.to_string(),
            cooldown_ms: Some(COOLDOWN_MS),
        }),
    )
}

fn rejection(status: StatusCode, message: &str) -> (StatusCode, Json<LoginLinkResponse>) {
    (
        status,
        Json(LoginLinkResponse {
            ok: false,
            message: message.to_string(),
            cooldown_ms: None,
        }),
    )
}

/// POST /api/auth/request-link - email a login link to a speaker
async fn request_link(
    State(state): State<AppState>,
    Form(form): Form<LoginLinkForm>,
) -> Result<(StatusCode, Json<LoginLinkResponse>), ApiError> {
    // Filled honeypot: pretend success without doing any work.
    if !form.website.is_empty() {
        return Ok(sent_response());
    }

    let email = form.email.trim().to_lowercase();
    if email.is_empty() || !email.contains('@') {
        return Ok(rejection(StatusCode::BAD_REQUEST, "Invalid email address"));
    }

    if !state.limiter.check(&email) {
        return Ok(rejection(
            StatusCode::TOO_MANY_REQUESTS,
            "Too many requests. Please try again later.",
        ));
    }

    let matches = state.directory.find_speakers_by_email(&email).await?;
    let speaker = match matches.as_slice() {
        [] => {
            return Ok(rejection(
                StatusCode::NOT_FOUND,
                "No account found with that email.",
            ));
        }
        [speaker] => speaker,
        _ => {
            return Ok(rejection(
                StatusCode::BAD_REQUEST,
                "Multiple accounts found for this email. Please contact support.",
            ));
        }
    };

    let expires_at = Utc::now() + Duration::seconds(state.config.tokens.auth_ttl_secs as i64);
    let token = state.signer.issue(expires_at, "auth", Some(&speaker.id))?;
    let link = urls::login_link(&state.config.server.base_url, &token);

    if let Err(err) = state.mailer.send_login_link(&email, &link).await {
        tracing::error!(error = ?err, speaker_id = %speaker.id, "failed to send login link");
        return Ok(rejection(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to send email. Please try again.",
        ));
    }

    Ok(sent_response())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_key_matches() {
        assert!(api_key_matches("shared-key", "shared-key"));
        assert!(!api_key_matches("shared-key", "shared-kez"));
        assert!(!api_key_matches("shared-key", "shared-key-extra"));
        assert!(!api_key_matches("shared-key", ""));
    }
}
