//! Speaker endpoints.
//!
//! The speaker view embeds ready-made calendar subscription URLs. Viewing
//! requires an `auth`-scoped token; the embedded URLs carry a fresh
//! `ics`-scoped token bound to the same speaker, so the portal token is
//! never handed to a calendar app.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::get,
};
use chrono::{Duration, Utc};
use serde::Serialize;

use crate::routes::{ApiError, authenticate, sessions::KeyParams};
use crate::state::AppState;
use crate::urls;

pub fn router() -> Router<AppState> {
    Router::new().route("/api/speakers/{id}", get(get_speaker))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SpeakerView {
    pub id: String,
    pub name: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub job_title: Option<String>,
    pub company: Option<String>,
    /// HTTP subscription URL for this speaker's personal feed.
    pub calendar_url: String,
    /// Same feed behind the `webcal://` scheme.
    pub webcal_url: String,
}

/// GET /api/speakers/:id - speaker profile plus calendar links
async fn get_speaker(
    State(state): State<AppState>,
    Path(speaker_id): Path<String>,
    Query(params): Query<KeyParams>,
) -> Result<Json<SpeakerView>, ApiError> {
    let claims = authenticate(&state.signer, params.key.as_deref(), "auth")?;

    // A subject-bound token only opens its own speaker's page.
    if let Some(subject) = &claims.sub {
        if subject != &speaker_id {
            return Err(ApiError::Unauthenticated);
        }
    }

    let speaker = state
        .directory
        .get_speaker(&speaker_id)
        .await?
        .ok_or(ApiError::NotFound("Speaker not found"))?;

    let expires_at = Utc::now() + Duration::seconds(state.config.tokens.ics_ttl_secs as i64);
    let feed_key = state.signer.issue(expires_at, "ics", Some(&speaker_id))?;

    let calendar_url =
        urls::speaker_calendar_url(&state.config.server.base_url, &speaker_id, &feed_key);
    let webcal_url = urls::webcal(&calendar_url);

    Ok(Json(SpeakerView {
        id: speaker.id,
        name: speaker.name,
        first_name: speaker.first_name,
        last_name: speaker.last_name,
        job_title: speaker.job_title,
        company: speaker.company,
        calendar_url,
        webcal_url,
    }))
}
