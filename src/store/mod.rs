//! Speaker directory: the external system of record.
//!
//! Request handlers depend on the [`Directory`] trait only; the Airtable
//! implementation lives in [`airtable`]. Records keep optional fields as
//! `Option` all the way through so consumers must handle absence.

pub mod airtable;

pub use airtable::AirtableDirectory;

use anyhow::Result;
use async_trait::async_trait;

/// Restricts a session listing. Empty filter means "everything".
#[derive(Debug, Clone, Default)]
pub struct SessionFilter {
    /// Only sessions naming this speaker.
    pub speaker_name: Option<String>,
}

/// A session row as parsed from the directory. Fields the organizers have
/// not filled in yet stay `None`.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionRecord {
    pub id: String,
    pub name: Option<String>,
    pub description: Option<String>,
    /// RFC 3339 timestamps as stored upstream.
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub stage: Option<String>,
}

impl SessionRecord {
    /// A session can only appear in a feed once it has a name and both
    /// timestamps.
    pub fn is_schedulable(&self) -> bool {
        self.name.is_some() && self.start_time.is_some() && self.end_time.is_some()
    }
}

/// A speaker row as parsed from the directory.
#[derive(Debug, Clone, PartialEq)]
pub struct SpeakerRecord {
    pub id: String,
    /// Full display name; also the value session rows reference.
    pub name: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub assistant_email: Option<String>,
    pub job_title: Option<String>,
    pub company: Option<String>,
}

/// Read-only access to the conference's speakers and sessions.
#[async_trait]
pub trait Directory: Send + Sync {
    async fn list_sessions(&self, filter: SessionFilter) -> Result<Vec<SessionRecord>>;

    async fn get_session(&self, id: &str) -> Result<Option<SessionRecord>>;

    async fn get_speaker(&self, id: &str) -> Result<Option<SpeakerRecord>>;

    /// All speakers whose own or assistant's email matches,
    /// case-insensitively. The login-link flow requires exactly one match.
    async fn find_speakers_by_email(&self, email: &str) -> Result<Vec<SpeakerRecord>>;
}
