//! IMAP verification-mailbox backend with XOAUTH2 authentication.
//!
//! The address here is a pre-configured, long-lived account rather than a
//! freshly issued one. Session start is bounded by the OAuth exchange, so
//! instead of a priming fetch the poll loop only inspects the newest few
//! messages each cycle, re-selecting the mailbox and searching everything —
//! no server-side "unseen" filter is trusted.

use std::time::Duration;

use async_imap::Session;
use async_native_tls::TlsConnector;
use async_trait::async_trait;
use futures_util::StreamExt;
use log::{debug, info, warn};
use mail_parser::MessageParser;
use secrecy::{ExposeSecret, SecretString};

use super::dedup::SeenMessages;
use super::error::{MailError, Result};
use super::extract::{CodeExtractor, MessageContent};
use super::matches_keywords;
use super::oauth::TokenRefresher;
use super::poll::{self, PollCycle};

/// Default IMAP host for Outlook accounts.
pub const OUTLOOK_IMAP_HOST: &str = "outlook.office365.com";

const IMAP_PORT: u16 = 993;

/// How many of the newest messages each poll cycle inspects.
const RECENT_WINDOW: usize = 3;

/// Type alias for the underlying async stream (async-std compatible TcpStream).
type AsyncTcpStream = async_io::Async<std::net::TcpStream>;

/// Type alias for the TLS stream used by the IMAP session.
type TlsStream = async_native_tls::TlsStream<AsyncTcpStream>;

/// Simple authenticator for XOAUTH2.
struct XOAuth2Authenticator {
    response: String,
}

impl async_imap::Authenticator for XOAuth2Authenticator {
    type Response = String;

    fn process(&mut self, _data: &[u8]) -> Self::Response {
        std::mem::take(&mut self.response)
    }
}

/// Builds the base64-encoded XOAUTH2 initial response:
/// `user=<addr>\x01auth=Bearer <token>\x01\x01`.
fn xoauth2_response(user: &str, access_token: &SecretString) -> String {
    let auth_string = format!(
        "user={}\x01auth=Bearer {}\x01\x01",
        user,
        access_token.expose_secret()
    );
    base64::Engine::encode(
        &base64::engine::general_purpose::STANDARD,
        auth_string.as_bytes(),
    )
}

/// One IMAP mailbox session, scoped to a single provisioning attempt.
pub struct ImapSession {
    address: String,
    session: Session<TlsStream>,
    inspected: SeenMessages,
    extractor: CodeExtractor,
}

impl ImapSession {
    /// Exchanges the refresh token for an access token, then connects and
    /// authenticates. A failed exchange is fatal for the whole session and
    /// is never retried here.
    pub async fn open(
        address: String,
        client_id: &str,
        refresh_token: &SecretString,
        token_url: Option<&str>,
        imap_host: Option<&str>,
    ) -> Result<Self> {
        let refresher = match token_url {
            Some(url) => TokenRefresher::new(url)?,
            None => TokenRefresher::outlook()?,
        };
        let access_token = refresher.refresh(client_id, refresh_token).await?;

        let host = imap_host.unwrap_or(OUTLOOK_IMAP_HOST);
        let addr = format!("{}:{}", host, IMAP_PORT);
        info!("Connecting to IMAP server at {}", addr);

        // Establish TCP connection using std::net and wrap with async-io
        let std_stream = std::net::TcpStream::connect(&addr)
            .map_err(|e| MailError::ConnectionFailed(e.to_string()))?;
        std_stream
            .set_nonblocking(true)
            .map_err(|e| MailError::ConnectionFailed(e.to_string()))?;
        let tcp_stream = async_io::Async::new(std_stream)
            .map_err(|e| MailError::ConnectionFailed(e.to_string()))?;

        let tls = TlsConnector::new();
        let tls_stream = tls
            .connect(host, tcp_stream)
            .await
            .map_err(|e| MailError::TlsError(e.to_string()))?;

        let client = async_imap::Client::new(tls_stream);

        let authenticator = XOAuth2Authenticator {
            response: xoauth2_response(&address, &access_token),
        };
        let session = client
            .authenticate("XOAUTH2", authenticator)
            .await
            .map_err(|(e, _)| MailError::AuthenticationFailed(e.to_string()))?;

        info!("Authenticated IMAP session for {}", address);

        Ok(Self {
            address,
            session,
            inspected: SeenMessages::new(),
            extractor: CodeExtractor::new(),
        })
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    /// One fetch cycle: re-select the inbox, search all messages, inspect the
    /// newest few that have not been inspected before.
    async fn poll_cycle(&mut self) -> Result<Option<String>> {
        self.session
            .select("INBOX")
            .await
            .map_err(|e| MailError::ProtocolError(e.to_string()))?;

        let uids = self
            .session
            .uid_search("ALL")
            .await
            .map_err(|e| MailError::ProtocolError(e.to_string()))?;

        let mut uids: Vec<u32> = uids.into_iter().collect();
        uids.sort_unstable();

        let recent: Vec<u32> = uids.into_iter().rev().take(RECENT_WINDOW).collect();
        for uid in recent {
            let uid_str = uid.to_string();
            if self.inspected.contains(&uid_str) {
                continue;
            }

            // The mark happens only once the message is in hand: a transient
            // fetch failure leaves the UID eligible for the next cycle.
            let body = match self.fetch_message(uid).await {
                Ok(Some(body)) => body,
                Ok(None) => {
                    self.inspected.admit(Some(&uid_str));
                    continue;
                }
                Err(e) => {
                    warn!("Failed to fetch message {}, retrying next cycle: {}", uid, e);
                    continue;
                }
            };
            self.inspected.admit(Some(&uid_str));

            if let Some(code) = self.inspect_message(uid, &body) {
                return Ok(Some(code));
            }
        }

        Ok(None)
    }

    async fn fetch_message(&mut self, uid: u32) -> Result<Option<Vec<u8>>> {
        let mut messages = self
            .session
            .uid_fetch(uid.to_string(), "BODY.PEEK[]")
            .await
            .map_err(|e| MailError::ProtocolError(e.to_string()))?;

        let message = match messages.next().await {
            Some(m) => m.map_err(|e| MailError::ProtocolError(e.to_string()))?,
            None => return Ok(None),
        };

        Ok(message.body().map(|b| b.to_vec()))
    }

    fn inspect_message(&self, uid: u32, raw: &[u8]) -> Option<String> {
        let message = match MessageParser::default().parse(raw) {
            Some(m) => m,
            None => {
                warn!("Message {} could not be parsed", uid);
                return None;
            }
        };

        let sender = message
            .from()
            .and_then(|addrs| addrs.first())
            .and_then(|addr| addr.address())
            .unwrap_or_default()
            .to_string();
        let subject = message.subject().unwrap_or_default().to_string();

        if !matches_keywords(&sender, &subject) {
            debug!(
                "Message {} ('{}') does not match the sender allow-list",
                uid, subject
            );
            return None;
        }

        let content = MessageContent {
            content: message
                .body_text(0)
                .map(|t| t.to_string())
                .unwrap_or_default(),
            html: message
                .body_html(0)
                .map(|h| h.to_string())
                .unwrap_or_default(),
            ..Default::default()
        };

        self.extractor.extract(&content)
    }

    /// Polls until a verification code arrives or the timeout expires.
    /// Terminal: consumes the session, logs out best-effort, reports at most
    /// one code. Errors inside a cycle are one empty cycle, not fatal.
    pub async fn poll_for_code(
        mut self,
        timeout: Duration,
        poll_interval: Duration,
    ) -> Option<String> {
        info!(
            "Watching {} over IMAP for a verification code (up to {}s)",
            self.address,
            timeout.as_secs()
        );

        let result = poll::until_deadline(&mut self, timeout, poll_interval).await;

        if result.is_none() {
            warn!(
                "No verification code for {} after {}s",
                self.address,
                timeout.as_secs()
            );
        }

        if let Err(e) = self.session.logout().await {
            debug!("IMAP logout failed: {}", e);
        }

        result
    }
}

#[async_trait]
impl PollCycle for ImapSession {
    async fn cycle(&mut self) -> Option<String> {
        match self.poll_cycle().await {
            Ok(code) => code,
            Err(e) => {
                warn!("Poll cycle failed, treating as no messages: {}", e);
                None
            }
        }
    }
}
