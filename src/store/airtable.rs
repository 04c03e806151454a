//! Airtable-backed [`Directory`] implementation.
//!
//! Thin read-only client for the Airtable REST API. Raw records come back
//! as `{id, fields}` JSON; decoding into typed records is an explicit parse
//! step that reports the offending record id instead of throwing shapeless
//! errors past this boundary.

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use reqwest::{StatusCode, Url};
use serde::Deserialize;

use super::{Directory, SessionFilter, SessionRecord, SpeakerRecord};
use crate::config::Config;

pub struct AirtableDirectory {
    http: reqwest::Client,
    api_key: String,
    sessions_url: Url,
    speakers_url: Url,
}

#[derive(Debug, Deserialize)]
struct ListResponse {
    records: Vec<RawRecord>,
    offset: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawRecord {
    id: String,
    #[serde(default)]
    fields: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct SessionFields {
    #[serde(rename = "Session Name")]
    name: Option<String>,
    #[serde(rename = "Description")]
    description: Option<String>,
    #[serde(rename = "Start Time")]
    start_time: Option<String>,
    #[serde(rename = "End Time")]
    end_time: Option<String>,
    #[serde(rename = "Stage")]
    stage: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SpeakerFields {
    #[serde(rename = "Name")]
    name: String,
    #[serde(rename = "First Name")]
    first_name: Option<String>,
    #[serde(rename = "Last Name")]
    last_name: Option<String>,
    #[serde(rename = "Speaker's Email")]
    email: Option<String>,
    #[serde(rename = "Assistant's Email")]
    assistant_email: Option<String>,
    #[serde(rename = "Role or Title")]
    job_title: Option<String>,
    #[serde(rename = "Company")]
    company: Option<String>,
}

impl AirtableDirectory {
    pub fn new(config: &Config) -> Result<Self> {
        if config.airtable.base_id.is_empty() {
            return Err(anyhow!("airtable.base_id is not configured"));
        }

        let base_url = Url::parse(&config.airtable.api_url)
            .with_context(|| format!("Invalid airtable.api_url: {}", config.airtable.api_url))?;

        let table_url = |table: &str| -> Result<Url> {
            let mut url = base_url.clone();
            url.path_segments_mut()
                .map_err(|_| anyhow!("airtable.api_url cannot be a base URL"))?
                .push(&config.airtable.base_id)
                .push(table);
            Ok(url)
        };

        Ok(Self {
            http: reqwest::Client::new(),
            api_key: config.secrets.airtable_api_key.clone(),
            sessions_url: table_url(&config.airtable.sessions_table)?,
            speakers_url: table_url(&config.airtable.speakers_table)?,
        })
    }

    /// List a table, following pagination offsets until exhausted.
    async fn select(&self, url: &Url, query: &[(&str, String)]) -> Result<Vec<RawRecord>> {
        let mut records = Vec::new();
        let mut offset: Option<String> = None;

        loop {
            let mut request = self
                .http
                .get(url.clone())
                .bearer_auth(&self.api_key)
                .query(query);
            if let Some(cursor) = &offset {
                request = request.query(&[("offset", cursor.as_str())]);
            }

            let page: ListResponse = request
                .send()
                .await?
                .error_for_status()?
                .json()
                .await
                .context("Airtable list response did not parse")?;

            records.extend(page.records);
            match page.offset {
                Some(next) => offset = Some(next),
                None => return Ok(records),
            }
        }
    }

    /// Fetch a single record by id. Airtable's 404 maps to `None`.
    async fn find(&self, table_url: &Url, id: &str) -> Result<Option<RawRecord>> {
        let mut url = table_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.push(id);
        }

        let response = self
            .http
            .get(url)
            .bearer_auth(&self.api_key)
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let record = response
            .error_for_status()?
            .json()
            .await
            .context("Airtable record response did not parse")?;
        Ok(Some(record))
    }
}

fn parse_session(raw: RawRecord) -> Result<SessionRecord> {
    let fields: SessionFields = serde_json::from_value(raw.fields)
        .with_context(|| format!("session record '{}' has an unexpected field shape", raw.id))?;
    Ok(SessionRecord {
        id: raw.id,
        name: fields.name,
        description: fields.description,
        start_time: fields.start_time,
        end_time: fields.end_time,
        stage: fields.stage,
    })
}

fn parse_speaker(raw: RawRecord) -> Result<SpeakerRecord> {
    let fields: SpeakerFields = serde_json::from_value(raw.fields)
        .with_context(|| format!("speaker record '{}' has an unexpected field shape", raw.id))?;
    Ok(SpeakerRecord {
        id: raw.id,
        name: fields.name,
        first_name: fields.first_name,
        last_name: fields.last_name,
        email: fields.email,
        assistant_email: fields.assistant_email,
        job_title: fields.job_title,
        company: fields.company,
    })
}

/// Escape a value for interpolation inside an Airtable formula string
/// literal (single-quoted).
fn escape_formula(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}

#[async_trait]
impl Directory for AirtableDirectory {
    async fn list_sessions(&self, filter: SessionFilter) -> Result<Vec<SessionRecord>> {
        let mut query: Vec<(&str, String)> = vec![
            ("fields[]", "Session Name".to_string()),
            ("fields[]", "Description".to_string()),
            ("fields[]", "Start Time".to_string()),
            ("fields[]", "End Time".to_string()),
            ("fields[]", "Stage".to_string()),
            ("sort[0][field]", "Start Time".to_string()),
            ("sort[0][direction]", "asc".to_string()),
        ];
        if let Some(speaker_name) = &filter.speaker_name {
            query.push((
                "filterByFormula",
                format!("FIND('{}', {{Speakers}}&\"\")", escape_formula(speaker_name)),
            ));
        }

        self.select(&self.sessions_url, &query)
            .await?
            .into_iter()
            .map(parse_session)
            .collect()
    }

    async fn get_session(&self, id: &str) -> Result<Option<SessionRecord>> {
        self.find(&self.sessions_url, id)
            .await?
            .map(parse_session)
            .transpose()
    }

    async fn get_speaker(&self, id: &str) -> Result<Option<SpeakerRecord>> {
        self.find(&self.speakers_url, id)
            .await?
            .map(parse_speaker)
            .transpose()
    }

    async fn find_speakers_by_email(&self, email: &str) -> Result<Vec<SpeakerRecord>> {
        let needle = escape_formula(&email.to_lowercase());
        let formula = format!(
            "OR(LOWER({{Speaker's Email}}) = '{needle}', LOWER({{Assistant's Email}}) = '{needle}')"
        );
        let query: Vec<(&str, String)> = vec![
            ("filterByFormula", formula),
            ("maxRecords", "2".to_string()),
        ];

        self.select(&self.speakers_url, &query)
            .await?
            .into_iter()
            .map(parse_speaker)
            .collect()
    }
}
