//! Shared application state.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use greenroom_core::{FeedBuilder, TokenSigner};

use crate::config::{Config, MailerProvider};
use crate::email::{HttpMailer, LogMailer, Mailer};
use crate::rate_limit::{MemoryStore, RateLimiter};
use crate::store::{AirtableDirectory, Directory};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub signer: Arc<TokenSigner>,
    pub feed: Arc<FeedBuilder>,
    pub directory: Arc<dyn Directory>,
    pub mailer: Arc<dyn Mailer>,
    pub limiter: Arc<RateLimiter>,
}

impl AppState {
    pub fn new(config: Config) -> Result<Self> {
        let signer = TokenSigner::new(config.secrets.site_secret.as_bytes().to_vec())?;

        let feed = FeedBuilder {
            uid_domain: config.feed.uid_domain.clone(),
            product_id: config.feed.product_id.clone(),
            title_prefix: config.feed.title_prefix.clone(),
            default_location: config.feed.default_location.clone(),
        };

        let directory = Arc::new(AirtableDirectory::new(&config)?);

        let mailer: Arc<dyn Mailer> = match config.mailer.provider {
            MailerProvider::Log => Arc::new(LogMailer),
            MailerProvider::Http => Arc::new(HttpMailer::new(&config)?),
        };

        let limiter = RateLimiter::new(
            Box::new(MemoryStore::default()),
            config.rate_limit.max_requests,
            Duration::from_secs(config.rate_limit.window_secs),
        );

        Ok(Self {
            config: Arc::new(config),
            signer: Arc::new(signer),
            feed: Arc::new(feed),
            directory,
            mailer,
            limiter: Arc::new(limiter),
        })
    }
}
