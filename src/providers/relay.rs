//! Thin relays to hosted endpoints: the showroom chat proxy and the
//! automation webhook that receives violation records.

use chrono::{DateTime, Utc};
use reqwest::Client as HttpClient;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::{FallbackRule, RelayConfig};
use crate::core::{Record, ViewId};
use crate::error::ProviderError;

/// Keyword-matched canned replies used when the chat relay is unavailable
#[derive(Debug, Clone)]
pub struct LocalResponder {
    rules: Vec<FallbackRule>,
    default_reply: String,
}

impl LocalResponder {
    pub fn new(rules: Vec<FallbackRule>, default_reply: impl Into<String>) -> Self {
        Self {
            rules,
            default_reply: default_reply.into(),
        }
    }

    /// Reply of the first rule with a keyword contained in `message`
    pub fn respond(&self, message: &str) -> &str {
        let message = message.to_lowercase();
        self.rules
            .iter()
            .find(|rule| {
                rule.keywords
                    .iter()
                    .any(|k| message.contains(&k.to_lowercase()))
            })
            .map(|rule| rule.reply.as_str())
            .unwrap_or(self.default_reply.as_str())
    }
}

#[derive(Debug, Serialize)]
struct ChatRelayRequest<'a> {
    message: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatRelayResponse {
    answer: Option<String>,
}

/// Client of the chat proxy: `{ message }` in, `{ answer }` out
#[derive(Debug, Clone)]
pub struct ChatRelay {
    http: HttpClient,
    url: Option<String>,
    fallback: LocalResponder,
}

impl ChatRelay {
    pub fn new(url: Option<String>, fallback: LocalResponder) -> Self {
        Self {
            http: HttpClient::new(),
            url,
            fallback,
        }
    }

    pub fn from_config(config: &RelayConfig) -> Self {
        Self::new(
            config.chat_url.clone(),
            LocalResponder::new(config.fallback.rules.clone(), &config.fallback.default),
        )
    }

    /// Always produces an answer; relay failures fall back to local replies.
    pub async fn ask(&self, message: &str) -> String {
        match self.try_ask(message).await {
            Ok(answer) if !answer.trim().is_empty() => answer,
            Ok(_) => self.fallback.respond(message).to_string(),
            Err(e) => {
                warn!(error = %e, "chat relay unavailable, answering locally");
                self.fallback.respond(message).to_string()
            }
        }
    }

    async fn try_ask(&self, message: &str) -> Result<String, ProviderError> {
        let url = self.url.as_deref().ok_or_else(|| {
            ProviderError::MissingCredentials("no chat relay url configured".into())
        })?;
        let response = self
            .http
            .post(url)
            .json(&ChatRelayRequest { message })
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::Status {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }
        let body: ChatRelayResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Malformed(e.to_string()))?;
        body.answer.ok_or(ProviderError::Empty)
    }
}

/// A record flagged for follow-up, forwarded to the automation webhook
#[derive(Debug, Clone, Serialize)]
pub struct ViolationReport {
    pub view: ViewId,
    pub record: Record,
    pub reported_at: DateTime<Utc>,
}

impl ViolationReport {
    pub fn new(view: ViewId, record: Record) -> Self {
        Self {
            view,
            record,
            reported_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayOutcome {
    Delivered,
    /// No webhook is configured
    NotConfigured,
    Failed(String),
}

impl RelayOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Delivered)
    }
}

/// Fire-and-forget forwarder of violation records
#[derive(Debug, Clone)]
pub struct RecordRelay {
    http: HttpClient,
    webhook_url: Option<String>,
}

impl RecordRelay {
    pub fn new(webhook_url: Option<String>) -> Self {
        Self {
            http: HttpClient::new(),
            webhook_url,
        }
    }

    pub fn from_config(config: &RelayConfig) -> Self {
        Self::new(config.webhook_url.clone())
    }

    pub async fn forward(&self, report: &ViolationReport) -> RelayOutcome {
        let Some(url) = self.webhook_url.as_deref().filter(|u| !u.trim().is_empty()) else {
            warn!("record relay has no webhook url");
            return RelayOutcome::NotConfigured;
        };
        let result = self
            .http
            .post(url)
            .json(report)
            .send()
            .await
            .and_then(|r| r.error_for_status());
        match result {
            Ok(_) => {
                info!(record = report.record.id(), view = %report.view, "record forwarded");
                RelayOutcome::Delivered
            }
            Err(e) => {
                warn!(error = %e, record = report.record.id(), "record relay failed");
                RelayOutcome::Failed(e.to_string())
            }
        }
    }
}
