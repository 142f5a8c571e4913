//! Hosted temporary-mailbox backend.
//!
//! Talks to a hosted mail service over HTTP: one allocation call issues a
//! fresh address, then the session polls the message list until a
//! verification code arrives or the timeout expires. A priming fetch at
//! allocation time records every pre-existing message id so old inbox
//! content is never mistaken for a fresh verification email.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use serde_json::Value;

use super::dedup::SeenMessages;
use super::error::{MailError, Result};
use super::extract::{CodeExtractor, MessageContent};
use super::matches_keywords;
use super::poll::{self, PollCycle};

const CLIENT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// One message as returned by the hosted API. Field names vary between
/// deployments, so accessors try several aliases.
#[derive(Debug, Clone)]
pub struct HostedMessage(Value);

impl HostedMessage {
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    fn get_str(&self, keys: &[&str]) -> Option<String> {
        for key in keys {
            match self.0.get(key) {
                Some(Value::String(s)) if !s.is_empty() => return Some(s.clone()),
                Some(Value::Number(n)) => return Some(n.to_string()),
                _ => {}
            }
        }
        None
    }

    /// Unique identity of the message. Tries the id aliases first; when none
    /// is present, falls back to a `sender|subject|date` composite. The
    /// composite can collide for two distinct messages with identical sender
    /// and subject within the same reported timestamp granularity — the
    /// hosted API offers nothing stronger, and a collision only skips a
    /// message, it never reports a stale code.
    pub fn identity(&self) -> Option<String> {
        if let Some(id) = self.get_str(&["id", "messageId", "message_id"]) {
            return Some(id);
        }

        let sender = self.sender();
        let subject = self.subject();
        if sender.is_empty() && subject.is_empty() {
            return None;
        }
        let date = self
            .get_str(&["date", "received_at", "created_at"])
            .unwrap_or_default();
        Some(format!("{}|{}|{}", sender, subject, date))
    }

    pub fn sender(&self) -> String {
        self.get_str(&["from", "sender"]).unwrap_or_default()
    }

    pub fn subject(&self) -> String {
        self.get_str(&["subject"]).unwrap_or_default()
    }

    pub fn matches_keywords(&self) -> bool {
        matches_keywords(&self.sender(), &self.subject())
    }

    pub fn content(&self) -> MessageContent {
        MessageContent {
            content: self.get_str(&["content"]).unwrap_or_default(),
            text: self.get_str(&["text_content"]).unwrap_or_default(),
            body: self.get_str(&["body"]).unwrap_or_default(),
            html: self.get_str(&["html_content"]).unwrap_or_default(),
        }
    }
}

/// Per-session message scan state: the seen-id set plus the extraction
/// cascade. Split from the HTTP side so the invariants are testable without
/// a live service.
#[derive(Default)]
pub(super) struct MessageScan {
    seen: SeenMessages,
    extractor: CodeExtractor,
}

impl MessageScan {
    pub fn new() -> Self {
        Self {
            seen: SeenMessages::new(),
            extractor: CodeExtractor::new(),
        }
    }

    /// Records every message of the priming fetch as already seen.
    pub fn prime(&mut self, messages: &[HostedMessage]) {
        for message in messages {
            if let Some(id) = message.identity() {
                self.seen.prime(id);
            }
        }
    }

    pub fn primed_count(&self) -> usize {
        self.seen.len()
    }

    /// Inspects one fetch cycle's messages in backend order. Each message is
    /// marked seen the moment it is inspected; the first successful
    /// extraction wins.
    pub fn scan(&mut self, messages: &[HostedMessage]) -> Option<String> {
        for message in messages {
            let id = message.identity();
            if !self.seen.admit(id.as_deref()) {
                debug!("Skipping already-inspected message '{}'", message.subject());
                continue;
            }

            if !message.matches_keywords() {
                debug!(
                    "Message '{}' from '{}' does not match the sender allow-list",
                    message.subject(),
                    message.sender()
                );
                continue;
            }

            match self.extractor.extract(&message.content()) {
                Some(code) => {
                    info!("Extracted verification code from '{}'", message.subject());
                    return Some(code);
                }
                None => {
                    warn!(
                        "Message '{}' matched the allow-list but carried no code",
                        message.subject()
                    );
                }
            }
        }
        None
    }
}

/// One hosted mailbox session, scoped to a single provisioning attempt.
pub struct HostedSession {
    client: reqwest::Client,
    base_url: String,
    address: String,
    created_at: DateTime<Utc>,
    scan: MessageScan,
}

impl HostedSession {
    /// Allocates a fresh address and primes the seen-message set. The
    /// priming fetch must succeed before the session is handed out,
    /// otherwise pre-existing messages could later be mistaken for new ones.
    pub async fn open(api_url: &str, http_timeout: Duration) -> Result<Self> {
        let base_url = api_url.trim_end_matches('/').to_string();
        let origin = base_url.trim_end_matches("/api").to_string();

        let client = reqwest::Client::builder()
            .connect_timeout(http_timeout)
            .timeout(http_timeout)
            .user_agent(CLIENT_USER_AGENT)
            .build()
            .map_err(|e| MailError::ApiError(format!("Failed to build HTTP client: {}", e)))?;

        let response = client
            .get(format!("{}/generate-email", base_url))
            .header("Origin", &origin)
            .header("Referer", format!("{}/", origin))
            .send()
            .await
            .map_err(|e| MailError::ApiError(format!("Address allocation failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(MailError::ApiError(format!(
                "Address allocation returned HTTP {}",
                response.status().as_u16()
            )));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| MailError::ApiError(format!("Malformed allocation response: {}", e)))?;

        let address = body
            .get("data")
            .and_then(|d| d.get("email"))
            .and_then(Value::as_str)
            .filter(|_| body.get("success").and_then(Value::as_bool) == Some(true))
            .map(str::to_string)
            .ok_or_else(|| {
                MailError::ApiError(format!("Allocation response carried no address: {}", body))
            })?;

        info!("Issued hosted mailbox {}", address);

        let mut session = Self {
            client,
            base_url,
            address,
            created_at: Utc::now(),
            scan: MessageScan::new(),
        };

        let existing = session.fetch_messages().await?;
        session.scan.prime(&existing);
        if session.scan.primed_count() > 0 {
            info!(
                "Ignoring {} pre-existing messages in {}",
                session.scan.primed_count(),
                session.address
            );
        }

        Ok(session)
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    async fn fetch_messages(&self) -> Result<Vec<HostedMessage>> {
        // Millisecond cache-buster; some deployments sit behind aggressive
        // caches that would otherwise replay an old message list.
        let url = format!(
            "{}/emails?email={}&_t={}",
            self.base_url,
            self.address,
            Utc::now().timestamp_millis()
        );

        let response = self
            .client
            .get(url)
            .header("Cache-Control", "no-cache, no-store, must-revalidate")
            .header("Pragma", "no-cache")
            .header("Expires", "0")
            .send()
            .await
            .map_err(|e| MailError::ApiError(format!("Message fetch failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(MailError::ApiError(format!(
                "Message fetch returned HTTP {}",
                response.status().as_u16()
            )));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| MailError::ApiError(format!("Malformed message list: {}", e)))?;

        if body.get("success").and_then(Value::as_bool) != Some(true) {
            return Err(MailError::ApiError(format!(
                "Message fetch reported failure: {}",
                body
            )));
        }

        let messages = body
            .get("data")
            .and_then(|d| d.get("emails"))
            .and_then(Value::as_array)
            .map(|list| list.iter().cloned().map(HostedMessage::new).collect())
            .unwrap_or_default();

        Ok(messages)
    }

    /// Polls until a verification code arrives or the timeout expires.
    /// Terminal: the session is consumed and at most one code is ever
    /// reported. A failed fetch is one empty cycle, not a fatal error.
    pub async fn poll_for_code(
        mut self,
        timeout: Duration,
        poll_interval: Duration,
    ) -> Option<String> {
        info!(
            "Watching {} for a verification code (up to {}s)",
            self.address,
            timeout.as_secs()
        );

        let result = poll::until_deadline(&mut self, timeout, poll_interval).await;
        if result.is_none() {
            warn!(
                "No verification code in {} after {}s (mailbox issued {}s ago)",
                self.address,
                timeout.as_secs(),
                (Utc::now() - self.created_at).num_seconds()
            );
        }
        result
    }
}

#[async_trait]
impl PollCycle for HostedSession {
    async fn cycle(&mut self) -> Option<String> {
        match self.fetch_messages().await {
            Ok(messages) => self.scan.scan(&messages),
            Err(e) => {
                warn!("Fetch cycle failed, treating as no messages: {}", e);
                None
            }
        }
    }
}
