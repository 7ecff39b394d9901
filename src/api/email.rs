//! Outbound mail delivery abstractions.
//!
//! Resume links and admin magic links are delivered through a `MailDispatcher`
//! that wraps a pluggable `EmailSender`. Delivery problems never propagate to
//! the owning request: the dispatcher reports a non-ok outcome and the caller
//! degrades to logging the link. A missing sending identity is a deliberate
//! skip, not an error.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Clone, Debug)]
pub struct OutboundEmail {
    pub to: String,
    pub subject: String,
    pub html_body: String,
    pub text_body: String,
    pub reply_to: Option<String>,
}

/// Result of a dispatch attempt. Failures are data, not errors.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SendOutcome {
    Sent { message_id: Option<String> },
    Skipped,
    Failed { reason: String },
}

impl SendOutcome {
    #[must_use]
    pub const fn is_sent(&self) -> bool {
        matches!(self, Self::Sent { .. })
    }
}

/// Email delivery abstraction used by the dispatcher.
#[async_trait]
pub trait EmailSender: Send + Sync {
    /// Deliver a message, returning the provider message id if one exists.
    async fn send(&self, message: &OutboundEmail) -> Result<Option<String>>;
}

/// Local dev sender that logs the payload instead of sending real email.
#[derive(Clone, Debug)]
pub struct LogEmailSender;

#[async_trait]
impl EmailSender for LogEmailSender {
    async fn send(&self, message: &OutboundEmail) -> Result<Option<String>> {
        info!(
            to = %message.to,
            subject = %message.subject,
            "email send stub"
        );
        Ok(None)
    }
}

#[derive(Serialize, Debug)]
struct MailApiRequest<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    html: &'a str,
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    reply_to: Option<&'a str>,
}

#[derive(Deserialize, Debug)]
struct MailApiResponse {
    id: Option<String>,
}

/// Sender that posts to a transactional mail HTTP API.
#[derive(Debug)]
pub struct HttpEmailSender {
    endpoint: String,
    from: String,
    client: Client,
}

impl HttpEmailSender {
    /// # Errors
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(endpoint: String, from: String) -> Result<Self> {
        let client = Client::builder()
            .user_agent(crate::APP_USER_AGENT)
            .build()
            .context("failed to build mail client")?;
        Ok(Self {
            endpoint,
            from,
            client,
        })
    }
}

#[async_trait]
impl EmailSender for HttpEmailSender {
    async fn send(&self, message: &OutboundEmail) -> Result<Option<String>> {
        let request = MailApiRequest {
            from: &self.from,
            to: &message.to,
            subject: &message.subject,
            html: &message.html_body,
            text: &message.text_body,
            reply_to: message.reply_to.as_deref(),
        };
        let response = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .context("mail API request failed")?;
        if !response.status().is_success() {
            return Err(anyhow!("mail API returned {}", response.status()));
        }
        let body: MailApiResponse = response
            .json()
            .await
            .context("mail API returned an invalid body")?;
        Ok(body.id)
    }
}

/// Wraps the configured sender and guarantees failures stay contained.
#[derive(Clone)]
pub struct MailDispatcher {
    sender: Option<Arc<dyn EmailSender>>,
}

impl MailDispatcher {
    #[must_use]
    pub fn new(sender: Arc<dyn EmailSender>) -> Self {
        Self {
            sender: Some(sender),
        }
    }

    /// Dispatcher without a sending identity; every dispatch is skipped.
    #[must_use]
    pub const fn disabled() -> Self {
        Self { sender: None }
    }

    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.sender.is_some()
    }

    /// Deliver a message. Never fails the caller.
    pub async fn dispatch(&self, message: OutboundEmail) -> SendOutcome {
        let Some(sender) = &self.sender else {
            return SendOutcome::Skipped;
        };
        match sender.send(&message).await {
            Ok(message_id) => SendOutcome::Sent { message_id },
            Err(err) => {
                warn!(to = %message.to, "failed to send email: {err}");
                SendOutcome::Failed {
                    reason: err.to_string(),
                }
            }
        }
    }
}
