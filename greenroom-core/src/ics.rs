//! Calendar feed generation.
//!
//! Turns session records into a single iCalendar document served to
//! calendar clients as a subscription feed. Encoding is deterministic for a
//! fixed generation stamp: the same sessions always produce the same bytes,
//! and a session keeps its UID across regenerations so clients treat
//! repeated fetches as updates rather than duplicates.

use chrono::{DateTime, Timelike, Utc};
use icalendar::{Calendar, Component, EventLike};
use serde::{Deserialize, Serialize};

use crate::error::{PortalError, PortalResult};

/// A session as handed to the feed generator.
///
/// Start and end arrive as the raw RFC 3339 strings the directory returned;
/// parsing happens here so a bad record fails the feed instead of silently
/// producing a broken event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionEvent {
    /// Stable external record id. Drives the event UID.
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    /// RFC 3339 start time. `None` or unparseable fails the feed.
    pub start: Option<String>,
    /// RFC 3339 end time. `None` or unparseable fails the feed.
    pub end: Option<String>,
    /// Stage or venue name. Falls back to the feed's default location.
    pub location: Option<String>,
    /// Appended to the title for personalized per-speaker feeds.
    pub attendee_label: Option<String>,
}

/// Feed identity and rendering defaults, fixed per deployment.
#[derive(Debug, Clone)]
pub struct FeedBuilder {
    /// Domain part of every event UID (`session-<id>@<uid_domain>`).
    pub uid_domain: String,
    /// PRODID emitted in the calendar header.
    pub product_id: String,
    /// Optional prefix for every event title (e.g. the conference name).
    pub title_prefix: Option<String>,
    /// LOCATION used when a session has no stage of its own.
    pub default_location: String,
}

impl FeedBuilder {
    /// Build a complete feed, stamping every event with the current time.
    ///
    /// All-or-nothing: one malformed session fails the whole feed. An empty
    /// session list yields a structurally valid feed with zero events.
    pub fn build_feed(&self, sessions: &[SessionEvent]) -> PortalResult<String> {
        self.build_feed_at(sessions, Utc::now())
    }

    /// Build a feed with an explicit generation stamp. The stamp is applied
    /// to every event so one generation pass is internally consistent (and
    /// reproducible in tests).
    pub fn build_feed_at(
        &self,
        sessions: &[SessionEvent],
        generated_at: DateTime<Utc>,
    ) -> PortalResult<String> {
        let mut cal = Calendar::new();
        for session in sessions {
            cal.push(self.build_event(session, generated_at)?);
        }
        let cal = cal.done();
        Ok(rewrite_calendar_header(&cal.to_string(), &self.product_id))
    }

    /// Encode a single session as a VEVENT.
    ///
    /// Times are converted to UTC and truncated to the minute before
    /// encoding, so the feed is portable regardless of server or venue
    /// local time. Seconds are intentionally not represented.
    pub fn build_event(
        &self,
        session: &SessionEvent,
        generated_at: DateTime<Utc>,
    ) -> PortalResult<icalendar::Event> {
        let start = parse_utc_minute(session.start.as_deref())
            .ok_or_else(|| PortalError::MalformedSession {
                session_id: session.id.clone(),
            })?;
        let end = parse_utc_minute(session.end.as_deref())
            .ok_or_else(|| PortalError::MalformedSession {
                session_id: session.id.clone(),
            })?;

        let mut event = icalendar::Event::new();
        event.uid(&format!("session-{}@{}", session.id, self.uid_domain));

        let mut title = match &self.title_prefix {
            Some(prefix) => format!("{prefix} - {}", session.title),
            None => session.title.clone(),
        };
        if let Some(label) = &session.attendee_label {
            title = format!("{title} - {label}");
        }
        event.summary(&title);

        event.add_property("DTSTAMP", format_utc(generated_at));
        event.add_property("DTSTART", format_utc(start));
        event.add_property("DTEND", format_utc(end));

        if let Some(description) = &session.description {
            event.description(description);
        }
        event.location(session.location.as_deref().unwrap_or(&self.default_location));

        Ok(event.done())
    }
}

/// Parse an RFC 3339 timestamp, convert to UTC, truncate to the minute.
fn parse_utc_minute(value: Option<&str>) -> Option<DateTime<Utc>> {
    let parsed = DateTime::parse_from_rfc3339(value?).ok()?;
    parsed
        .with_timezone(&Utc)
        .with_second(0)?
        .with_nanosecond(0)
}

fn format_utc(dt: DateTime<Utc>) -> String {
    dt.format("%Y%m%dT%H%M%SZ").to_string()
}

/// Replace the icalendar crate's PRODID with our own and drop the
/// redundant CALSCALE line (GREGORIAN is the default).
fn rewrite_calendar_header(ics: &str, product_id: &str) -> String {
    let mut result = String::with_capacity(ics.len());
    for line in ics.lines() {
        if line.starts_with("PRODID:") {
            result.push_str("PRODID:");
            result.push_str(product_id);
        } else if line == "CALSCALE:GREGORIAN" {
            continue;
        } else {
            result.push_str(line);
        }
        result.push_str("\r\n");
    }
    result
}
