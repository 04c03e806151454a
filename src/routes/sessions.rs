//! Session endpoints (portal schedule views).

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::get,
};
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::routes::{ApiError, authenticate};
use crate::state::AppState;
use crate::store::{SessionFilter, SessionRecord};
use crate::urls;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/sessions", get(list_sessions))
        .route("/api/sessions/{id}", get(get_session))
}

#[derive(Deserialize)]
pub struct KeyParams {
    pub key: Option<String>,
}

/// Session view model returned by the API.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
    pub id: String,
    pub name: Option<String>,
    pub description: Option<String>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub stage: Option<String>,
    /// Calendar subscription URL for this one session. Only populated on
    /// the detail view, where a feed token is minted alongside.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subscribe_url: Option<String>,
}

impl From<SessionRecord> for SessionView {
    fn from(record: SessionRecord) -> Self {
        Self {
            id: record.id,
            name: record.name,
            description: record.description,
            start_time: record.start_time,
            end_time: record.end_time,
            stage: record.stage,
            subscribe_url: None,
        }
    }
}

/// GET /api/sessions - the full agenda
async fn list_sessions(
    State(state): State<AppState>,
    Query(params): Query<KeyParams>,
) -> Result<Json<Vec<SessionView>>, ApiError> {
    authenticate(&state.signer, params.key.as_deref(), "auth")?;

    let records = state.directory.list_sessions(SessionFilter::default()).await?;
    Ok(Json(records.into_iter().map(SessionView::from).collect()))
}

/// GET /api/sessions/:id - one session, with its subscription link
async fn get_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Query(params): Query<KeyParams>,
) -> Result<Json<SessionView>, ApiError> {
    authenticate(&state.signer, params.key.as_deref(), "auth")?;

    let record = state
        .directory
        .get_session(&session_id)
        .await?
        .ok_or(ApiError::NotFound("Session not found"))?;

    let expires_at = Utc::now() + Duration::seconds(state.config.tokens.ics_ttl_secs as i64);
    let feed_key = state.signer.issue(expires_at, "ics", None)?;

    let mut view = SessionView::from(record);
    view.subscribe_url = Some(urls::session_calendar_url(
        &state.config.server.base_url,
        &session_id,
        &feed_key,
    ));
    Ok(Json(view))
}
