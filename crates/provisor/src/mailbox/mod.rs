//! Verification mailbox module.
//!
//! One disposable email identity per provisioning attempt, polymorphic over
//! two backends: a hosted temporary-mailbox service (address issuance +
//! HTTP polling) and IMAP with OAuth2 (token refresh + protocol polling).
//! Both share the same dedup guarantees and code-extraction cascade.

pub mod dedup;
pub mod error;
pub mod extract;
pub mod hosted;
pub mod imap;
pub mod oauth;
mod poll;

use std::time::Duration;

use secrecy::SecretString;

pub use error::MailError;
pub use extract::{CodeExtractor, MessageContent};
pub use hosted::HostedSession;
pub use imap::ImapSession;
pub use oauth::TokenRefresher;

use error::Result;

/// Sender/subject allow-list. A message qualifies for code extraction only
/// when its sender or subject contains one of these, case-insensitively.
pub const VERIFICATION_KEYWORDS: &[&str] = &["amazon", "aws", "verify", "verification", "builder"];

pub(crate) fn matches_keywords(sender: &str, subject: &str) -> bool {
    let sender = sender.to_lowercase();
    let subject = subject.to_lowercase();
    VERIFICATION_KEYWORDS
        .iter()
        .any(|k| sender.contains(k) || subject.contains(k))
}

/// Which backend to use, chosen explicitly by the caller. An account with
/// OAuth material gets `Imap`; everything else gets `Hosted`. The choice is
/// a tagged variant rather than being inferred inside the mailbox from which
/// credential fields happen to be populated.
#[derive(Clone)]
pub enum MailboxSpec {
    Hosted {
        api_url: String,
    },
    Imap {
        address: String,
        client_id: String,
        refresh_token: SecretString,
        /// Defaults to the Microsoft common-tenant token endpoint.
        token_url: Option<String>,
        /// Defaults to the Outlook IMAP host.
        imap_host: Option<String>,
    },
}

impl std::fmt::Debug for MailboxSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MailboxSpec::Hosted { api_url } => {
                f.debug_struct("Hosted").field("api_url", api_url).finish()
            }
            MailboxSpec::Imap {
                address, client_id, ..
            } => f
                .debug_struct("Imap")
                .field("address", address)
                .field("client_id", client_id)
                .finish_non_exhaustive(),
        }
    }
}

/// One live mailbox session. Produced by [`MailSession::open`], consumed by
/// [`MailSession::poll_for_code`]: a session reports at most one result and
/// never polls again afterwards.
pub enum MailSession {
    Hosted(HostedSession),
    Imap(ImapSession),
}

impl MailSession {
    /// Opens a session for the given backend. Hosted: allocates a fresh
    /// address and primes the seen-message set before returning. IMAP:
    /// performs the OAuth exchange (fatal on failure) and authenticates.
    pub async fn open(spec: MailboxSpec, http_timeout: Duration) -> Result<Self> {
        match spec {
            MailboxSpec::Hosted { api_url } => {
                let session = HostedSession::open(&api_url, http_timeout).await?;
                Ok(MailSession::Hosted(session))
            }
            MailboxSpec::Imap {
                address,
                client_id,
                refresh_token,
                token_url,
                imap_host,
            } => {
                let session = ImapSession::open(
                    address,
                    &client_id,
                    &refresh_token,
                    token_url.as_deref(),
                    imap_host.as_deref(),
                )
                .await?;
                Ok(MailSession::Imap(session))
            }
        }
    }

    /// The mailbox address the signup flow should register with.
    pub fn address(&self) -> &str {
        match self {
            MailSession::Hosted(s) => s.address(),
            MailSession::Imap(s) => s.address(),
        }
    }

    /// Polls for a verification code until the timeout expires, sleeping
    /// `poll_interval` between fetches. Consumes the session.
    pub async fn poll_for_code(
        self,
        timeout: Duration,
        poll_interval: Duration,
    ) -> Option<String> {
        match self {
            MailSession::Hosted(s) => s.poll_for_code(timeout, poll_interval).await,
            MailSession::Imap(s) => s.poll_for_code(timeout, poll_interval).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matches_keywords() {
        assert!(matches_keywords("no-reply@amazon.com", ""));
        assert!(matches_keywords("", "Verify your email"));
        assert!(matches_keywords("AWS Builder <builder@aws.example>", ""));
        assert!(!matches_keywords("friend@example.com", "lunch tomorrow"));
    }

    #[test]
    fn test_imap_spec_debug_hides_token() {
        let spec = MailboxSpec::Imap {
            address: "a@outlook.com".to_string(),
            client_id: "cid".to_string(),
            refresh_token: SecretString::from("super-secret"),
            token_url: None,
            imap_host: None,
        };
        let debug = format!("{:?}", spec);
        assert!(!debug.contains("super-secret"));
        assert!(debug.contains("a@outlook.com"));
    }
}
