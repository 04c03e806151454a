//! Calendar feed endpoints.
//!
//! These serve external calendar clients, not just the portal UI: responses
//! carry the `text/calendar` content type and are cacheable, since a feed is
//! a deterministic function of the session data at generation time.

use std::collections::HashSet;

use axum::{
    Router,
    extract::{Path, Query, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use greenroom_core::SessionEvent;
use serde::Deserialize;

use crate::routes::{ApiError, authenticate};
use crate::state::AppState;
use crate::store::{SessionFilter, SessionRecord};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/ics/event", get(schedule_feed))
        .route("/api/ics/session/{id}", get(session_feed))
        .route("/api/ics/speaker/{id}", get(speaker_feed))
}

#[derive(Deserialize)]
pub struct FeedParams {
    pub key: Option<String>,
    /// Comma-separated session ids restricting the schedule feed.
    pub sessions: Option<String>,
}

fn to_session_event(record: SessionRecord, attendee_label: Option<String>) -> SessionEvent {
    SessionEvent {
        id: record.id,
        title: record.name.unwrap_or_default(),
        description: record.description,
        start: record.start_time,
        end: record.end_time,
        location: record.stage,
        attendee_label,
    }
}

fn ics_response(body: String, filename: &str) -> Response {
    (
        StatusCode::OK,
        [
            (
                header::CONTENT_TYPE,
                "text/calendar; charset=utf-8".to_string(),
            ),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{filename}\""),
            ),
            (
                header::CACHE_CONTROL,
                "public, max-age=3600, s-maxage=3600".to_string(),
            ),
        ],
        body,
    )
        .into_response()
}

/// GET /api/ics/event - the whole schedule, optionally restricted by id
async fn schedule_feed(
    State(state): State<AppState>,
    Query(params): Query<FeedParams>,
) -> Result<Response, ApiError> {
    authenticate(&state.signer, params.key.as_deref(), "ics")?;

    let mut records = state
        .directory
        .list_sessions(SessionFilter::default())
        .await?;

    if let Some(filter) = &params.sessions {
        let wanted: HashSet<&str> = filter
            .split(',')
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .collect();
        records.retain(|record| wanted.contains(record.id.as_str()));
    }

    let sessions: Vec<SessionEvent> = records
        .into_iter()
        .filter(SessionRecord::is_schedulable)
        .map(|record| to_session_event(record, None))
        .collect();

    if sessions.is_empty() {
        return Err(ApiError::NotFound("No sessions found"));
    }

    let body = state.feed.build_feed(&sessions)?;
    Ok(ics_response(body, "schedule.ics"))
}

/// GET /api/ics/session/:id - a single session as a one-event feed
async fn session_feed(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Query(params): Query<FeedParams>,
) -> Result<Response, ApiError> {
    authenticate(&state.signer, params.key.as_deref(), "ics")?;

    let record = state
        .directory
        .get_session(&session_id)
        .await?
        .ok_or(ApiError::NotFound("Session not found"))?;

    if !record.is_schedulable() {
        return Err(ApiError::BadRequest(
            "Session missing start or end time".to_string(),
        ));
    }

    let filename = format!("session-{session_id}.ics");
    let body = state
        .feed
        .build_feed(&[to_session_event(record, None)])?;
    Ok(ics_response(body, &filename))
}

/// GET /api/ics/speaker/:id - personalized feed of one speaker's sessions
async fn speaker_feed(
    State(state): State<AppState>,
    Path(speaker_id): Path<String>,
    Query(params): Query<FeedParams>,
) -> Result<Response, ApiError> {
    let claims = authenticate(&state.signer, params.key.as_deref(), "ics")?;

    // Personal feeds require a token bound to this exact speaker.
    if claims.sub.as_deref() != Some(speaker_id.as_str()) {
        return Err(ApiError::Unauthenticated);
    }

    let speaker = state
        .directory
        .get_speaker(&speaker_id)
        .await?
        .ok_or(ApiError::NotFound("Speaker not found"))?;

    let records = state
        .directory
        .list_sessions(SessionFilter {
            speaker_name: Some(speaker.name.clone()),
        })
        .await?;

    let sessions: Vec<SessionEvent> = records
        .into_iter()
        .filter(SessionRecord::is_schedulable)
        .map(|record| to_session_event(record, Some(speaker.name.clone())))
        .collect();

    if sessions.is_empty() {
        return Err(ApiError::NotFound("No sessions found for speaker"));
    }

    let filename = format!("speaker-{speaker_id}.ics");
    let body = state.feed.build_feed(&sessions)?;
    Ok(ics_response(body, &filename))
}
