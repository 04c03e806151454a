//! Server configuration.
//!
//! Non-secret settings come from a TOML file (`GREENROOM_CONFIG`, default
//! `greenroom.toml`; a missing file means defaults). Secrets come from the
//! environment only and are read once at startup; a missing signing secret
//! aborts startup rather than degrading to an unsigned mode.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub feed: FeedConfig,
    pub tokens: TokenConfig,
    pub rate_limit: RateLimitConfig,
    pub airtable: AirtableConfig,
    pub mailer: MailerConfig,
    #[serde(skip)]
    pub secrets: Secrets,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,
    /// Public base URL used in login links and calendar subscription URLs.
    pub base_url: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 4810,
            base_url: "http://localhost:4810".to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    /// Domain part of event UIDs; must stay stable across deployments or
    /// calendar clients will duplicate events.
    pub uid_domain: String,
    pub product_id: String,
    /// Conference name prepended to every event title.
    pub title_prefix: Option<String>,
    /// LOCATION fallback for sessions without a stage.
    pub default_location: String,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            uid_domain: "speakers.example.com".to_string(),
            product_id: "-//greenroom//speaker portal//EN".to_string(),
            title_prefix: None,
            default_location: "Main Venue".to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct TokenConfig {
    /// Lifetime of login-link ("auth") tokens, in seconds.
    pub auth_ttl_secs: u64,
    /// Lifetime of calendar-feed ("ics") tokens, in seconds. Calendar apps
    /// poll subscriptions for months, so this is much longer.
    pub ics_ttl_secs: u64,
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            auth_ttl_secs: 24 * 60 * 60,
            ics_ttl_secs: 90 * 24 * 60 * 60,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Login-link requests allowed per email per window.
    pub max_requests: u32,
    pub window_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: 3,
            window_secs: 60,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct AirtableConfig {
    pub api_url: String,
    pub base_id: String,
    pub sessions_table: String,
    pub speakers_table: String,
}

impl Default for AirtableConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.airtable.com/v0".to_string(),
            base_id: String::new(),
            sessions_table: "Agenda".to_string(),
            speakers_table: "Onboarded Speakers".to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct MailerConfig {
    pub provider: MailerProvider,
    /// HTTP endpoint of the mail provider (required for `provider = "http"`).
    pub endpoint: Option<String>,
    pub from: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MailerProvider {
    /// Log the login link instead of sending it (development default).
    #[default]
    Log,
    Http,
}

impl Default for MailerConfig {
    fn default() -> Self {
        Self {
            provider: MailerProvider::Log,
            endpoint: None,
            from: "no-reply@speakers.example.com".to_string(),
        }
    }
}

/// Secrets, environment-only. Never serialized, never logged.
#[derive(Debug, Default, Clone)]
pub struct Secrets {
    /// Token signing secret. Required.
    pub site_secret: String,
    /// Shared key for the machine token-issuance endpoint. Required.
    pub api_key: String,
    /// Airtable personal access token. Required.
    pub airtable_api_key: String,
    /// Bearer key for the HTTP mailer, when configured.
    pub mailer_api_key: Option<String>,
}

impl Secrets {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            site_secret: std::env::var("GREENROOM_SITE_SECRET")
                .context("GREENROOM_SITE_SECRET is not set")?,
            api_key: std::env::var("GREENROOM_API_KEY")
                .context("GREENROOM_API_KEY is not set")?,
            airtable_api_key: std::env::var("AIRTABLE_API_KEY")
                .context("AIRTABLE_API_KEY is not set")?,
            mailer_api_key: std::env::var("GREENROOM_MAILER_API_KEY").ok(),
        })
    }
}

impl Config {
    /// Load configuration from file and environment.
    pub fn load() -> Result<Config> {
        let path =
            std::env::var("GREENROOM_CONFIG").unwrap_or_else(|_| "greenroom.toml".to_string());

        let mut config = if Path::new(&path).exists() {
            let raw = std::fs::read_to_string(&path)
                .with_context(|| format!("Could not read config file {path}"))?;
            toml::from_str(&raw).with_context(|| format!("Could not parse config file {path}"))?
        } else {
            Config::default()
        };

        config.secrets = Secrets::from_env()?;
        Ok(config)
    }
}
