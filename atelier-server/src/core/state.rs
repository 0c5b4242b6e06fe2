//! Server state: shared handles to storage and services

use std::path::PathBuf;
use std::sync::Arc;

use crate::core::Config;
use crate::db::BackofficeStorage;
use crate::notify::{
    CachedCredentialProvider, CredentialProvider, HttpMailer, HttpTokenFetcher, Mailer,
    NoopMailer, SchedulerConfig, StaticCredentials,
};
use crate::tokens::TokenService;

/// Server state - shared references to every service
///
/// Cloning is cheap: all members are handles.
///
/// | Field | Purpose |
/// |-------|---------|
/// | config | Immutable configuration |
/// | storage | Embedded redb database |
/// | tokens | Confirmation token lifecycle |
/// | mailer | Outbound email |
#[derive(Clone)]
pub struct ServerState {
    pub config: Config,
    pub storage: BackofficeStorage,
    pub tokens: TokenService,
    pub mailer: Arc<dyn Mailer>,
}

impl ServerState {
    /// Initialize all services from configuration
    pub fn initialize(config: &Config) -> anyhow::Result<Self> {
        let work_dir = PathBuf::from(&config.work_dir);
        std::fs::create_dir_all(&work_dir)?;
        let storage = BackofficeStorage::open(work_dir.join("backoffice.redb"))?;

        let tokens = TokenService::new(storage.clone(), config.public_base_url.clone());

        let mailer: Arc<dyn Mailer> = if config.email_api_url.is_empty() {
            tracing::warn!("EMAIL_API_URL not set; outbound email is discarded");
            Arc::new(NoopMailer)
        } else {
            let mut mailer = HttpMailer::new(
                config.email_api_url.clone(),
                config.email_from.clone(),
                config.email_timeout_ms,
            );
            // Refreshed tokens take precedence over a static key
            let credentials: Option<Arc<dyn CredentialProvider>> =
                if !config.email_token_url.is_empty() {
                    Some(Arc::new(CachedCredentialProvider::new(
                        HttpTokenFetcher::new(
                            config.email_token_url.clone(),
                            config.email_client_secret.clone(),
                            config.email_timeout_ms,
                        ),
                    )))
                } else if !config.email_api_key.is_empty() {
                    Some(Arc::new(StaticCredentials::new(config.email_api_key.clone())))
                } else {
                    None
                };
            if let Some(credentials) = credentials {
                mailer = mailer.with_credentials(credentials);
            }
            Arc::new(mailer)
        };

        Ok(Self {
            config: config.clone(),
            storage,
            tokens,
            mailer,
        })
    }

    /// In-memory state for tests
    pub fn for_tests() -> Self {
        let storage = BackofficeStorage::open_in_memory().expect("in-memory storage");
        let config = Config::with_overrides("/tmp/atelier-test", 0);
        let tokens = TokenService::new(storage.clone(), config.public_base_url.clone());
        Self {
            config,
            storage,
            tokens,
            mailer: Arc::new(NoopMailer),
        }
    }

    pub fn work_dir(&self) -> PathBuf {
        PathBuf::from(&self.config.work_dir)
    }

    /// Scheduler knobs derived from configuration
    pub fn scheduler_config(&self) -> SchedulerConfig {
        SchedulerConfig {
            reminder_interval_ms: self.config.reminder_interval_hours as i64 * 60 * 60 * 1000,
            invoiced_min_delay_ms: self.config.invoiced_min_delay_mins as i64 * 60 * 1000,
        }
    }
}
