//! Outbound email
//!
//! The scheduler and routes talk to a [`Mailer`] trait; production wires
//! the HTTP provider client, tests use [`NoopMailer`] or a recording stub.

use super::credentials::CredentialProvider;
use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// One outbound message
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub text_body: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub html_body: Option<String>,
    /// Order/quote this email belongs to, for provider-side threading
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

#[derive(Debug, Error)]
pub enum MailerError {
    /// Provider rejected for rate limiting; the current sweep must stop
    #[error("Email provider rate limited")]
    RateLimited,

    #[error("Email send failed: {0}")]
    Send(String),
}

/// Email delivery abstraction
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, message: &EmailMessage) -> Result<(), MailerError>;
}

/// HTTP JSON provider client
///
/// Posts the message to the configured endpoint. Calls are time-bounded so
/// a stalled provider cannot hang a sweep.
pub struct HttpMailer {
    client: reqwest::Client,
    api_url: String,
    from: String,
    credentials: Option<Arc<dyn CredentialProvider>>,
}

impl HttpMailer {
    pub fn new(api_url: impl Into<String>, from: impl Into<String>, timeout_ms: u64) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(timeout_ms))
            .build()
            .unwrap_or_default();
        Self {
            client,
            api_url: api_url.into(),
            from: from.into(),
            credentials: None,
        }
    }

    /// Attach a credential provider; its token is sent as a bearer header
    pub fn with_credentials(mut self, credentials: Arc<dyn CredentialProvider>) -> Self {
        self.credentials = Some(credentials);
        self
    }
}

#[derive(Serialize)]
struct ProviderPayload<'a> {
    from: &'a str,
    #[serde(flatten)]
    message: &'a EmailMessage,
}

#[async_trait]
impl Mailer for HttpMailer {
    async fn send(&self, message: &EmailMessage) -> Result<(), MailerError> {
        let mut request = self.client.post(&self.api_url).json(&ProviderPayload {
            from: &self.from,
            message,
        });
        if let Some(credentials) = &self.credentials {
            request = request.bearer_auth(credentials.bearer_token().await?);
        }
        let response = request
            .send()
            .await
            .map_err(|e| MailerError::Send(e.to_string()))?;

        if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(MailerError::RateLimited);
        }
        if !response.status().is_success() {
            return Err(MailerError::Send(format!(
                "provider returned {}",
                response.status()
            )));
        }
        Ok(())
    }
}

/// Discards every message; for local development and wiring tests
pub struct NoopMailer;

#[async_trait]
impl Mailer for NoopMailer {
    async fn send(&self, message: &EmailMessage) -> Result<(), MailerError> {
        tracing::debug!(to = %message.to, subject = %message.subject, "NoopMailer discarding email");
        Ok(())
    }
}
