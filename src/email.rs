//! Email delivery collaborator.
//!
//! The portal only ever sends one kind of message: a login link. The trait
//! keeps handlers independent of the provider; the HTTP implementation posts
//! template variables to a configured endpoint, and the log implementation
//! just records the link (useful in development, where the link is pasted
//! into a browser by hand).

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use serde_json::json;

use crate::config::Config;

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send_login_link(&self, to: &str, link: &str) -> Result<()>;
}

/// Logs the login link instead of delivering it.
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send_login_link(&self, to: &str, link: &str) -> Result<()> {
        tracing::info!(%to, %link, "login link issued (log mailer, not delivered)");
        Ok(())
    }
}

/// Delivers through an HTTP mail provider.
pub struct HttpMailer {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
    from: String,
}

impl HttpMailer {
    pub fn new(config: &Config) -> Result<Self> {
        let endpoint = config
            .mailer
            .endpoint
            .clone()
            .ok_or_else(|| anyhow!("mailer.endpoint is required for the http mailer"))?;
        let api_key = config
            .secrets
            .mailer_api_key
            .clone()
            .ok_or_else(|| anyhow!("GREENROOM_MAILER_API_KEY is required for the http mailer"))?;

        Ok(Self {
            http: reqwest::Client::new(),
            endpoint,
            api_key,
            from: config.mailer.from.clone(),
        })
    }
}

#[async_trait]
impl Mailer for HttpMailer {
    async fn send_login_link(&self, to: &str, link: &str) -> Result<()> {
        let body = json!({
            "from": self.from,
            "to": [to],
            "subject": "Your speaker portal login link",
            "html": format!(
                "<p>Click <a href=\"{link}\">here</a> to access your speaker portal.</p>\
                 <p>This link expires; request a new one from the portal if it stops working.</p>"
            ),
        });

        self.http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .context("mail provider request failed")?
            .error_for_status()
            .context("mail provider rejected the message")?;

        Ok(())
    }
}
