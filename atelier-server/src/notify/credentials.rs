//! Email provider credentials
//!
//! The provider credential is a non-authoritative cache: any unit of work
//! may refresh it, last write wins, and staleness is corrected by
//! re-fetching on expiry. Refreshing is idempotent so no locking is held
//! across the fetch.

use super::mailer::MailerError;
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::utils::now_millis;

/// Slack subtracted from the reported expiry so a token is never used
/// right at its deadline
const EXPIRY_SLACK_MS: i64 = 60_000;

/// Source of the bearer token attached to provider calls
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    async fn bearer_token(&self) -> Result<String, MailerError>;
}

/// Fixed API key from configuration
pub struct StaticCredentials {
    token: String,
}

impl StaticCredentials {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

#[async_trait]
impl CredentialProvider for StaticCredentials {
    async fn bearer_token(&self) -> Result<String, MailerError> {
        Ok(self.token.clone())
    }
}

/// A fetched access token with its expiry
#[derive(Debug, Clone)]
pub struct AccessToken {
    pub token: String,
    /// Unix millis
    pub expires_at: i64,
}

impl AccessToken {
    /// Still usable, with slack before the reported deadline
    pub fn is_fresh(&self, now: i64) -> bool {
        now + EXPIRY_SLACK_MS < self.expires_at
    }
}

/// Exchanges long-lived credentials for a short-lived access token
#[async_trait]
pub trait TokenFetcher: Send + Sync {
    async fn fetch(&self) -> Result<AccessToken, MailerError>;
}

/// OAuth-style token endpoint client
pub struct HttpTokenFetcher {
    client: reqwest::Client,
    token_url: String,
    client_secret: String,
}

impl HttpTokenFetcher {
    pub fn new(
        token_url: impl Into<String>,
        client_secret: impl Into<String>,
        timeout_ms: u64,
    ) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(timeout_ms))
            .build()
            .unwrap_or_default();
        Self {
            client,
            token_url: token_url.into(),
            client_secret: client_secret.into(),
        }
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    /// Seconds until expiry
    expires_in: i64,
}

#[async_trait]
impl TokenFetcher for HttpTokenFetcher {
    async fn fetch(&self) -> Result<AccessToken, MailerError> {
        let response = self
            .client
            .post(&self.token_url)
            .json(&serde_json::json!({ "client_secret": self.client_secret }))
            .send()
            .await
            .map_err(|e| MailerError::Send(e.to_string()))?;

        if !response.status().is_success() {
            return Err(MailerError::Send(format!(
                "token endpoint returned {}",
                response.status()
            )));
        }
        let body: TokenResponse = response
            .json()
            .await
            .map_err(|e| MailerError::Send(e.to_string()))?;
        Ok(AccessToken {
            token: body.access_token,
            expires_at: now_millis() + body.expires_in * 1000,
        })
    }
}

/// Lazily-refreshed credential cache
///
/// The cache is advisory: concurrent callers that both observe an expired
/// token both refresh, and the later write wins. The fetch runs outside
/// the lock so a slow token endpoint never blocks readers.
pub struct CachedCredentialProvider<F: TokenFetcher> {
    fetcher: F,
    cache: RwLock<Option<AccessToken>>,
}

impl<F: TokenFetcher> CachedCredentialProvider<F> {
    pub fn new(fetcher: F) -> Self {
        Self {
            fetcher,
            cache: RwLock::new(None),
        }
    }
}

#[async_trait]
impl<F: TokenFetcher> CredentialProvider for CachedCredentialProvider<F> {
    async fn bearer_token(&self) -> Result<String, MailerError> {
        let now = now_millis();
        {
            let cached = self.cache.read().await;
            if let Some(token) = cached.as_ref()
                && token.is_fresh(now)
            {
                return Ok(token.token.clone());
            }
        }

        let fresh = self.fetcher.fetch().await?;
        let value = fresh.token.clone();
        *self.cache.write().await = Some(fresh);
        tracing::debug!("Provider access token refreshed");
        Ok(value)
    }
}
