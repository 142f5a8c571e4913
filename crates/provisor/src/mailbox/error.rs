//! Verification mailbox error types.

use thiserror::Error;

/// Errors that can occur while operating a verification mailbox.
#[derive(Error, Debug)]
pub enum MailError {
    /// The hosted mailbox API refused or failed an allocation call.
    #[error("Mailbox API error: {0}")]
    ApiError(String),

    /// OAuth2 token exchange failed. Fatal for the whole session; never
    /// retried within one poll.
    #[error("No access token: {0}")]
    NoToken(String),

    /// Failed to connect to the IMAP server.
    #[error("IMAP connection failed: {0}")]
    ConnectionFailed(String),

    /// TLS error during connection.
    #[error("TLS error: {0}")]
    TlsError(String),

    /// IMAP authentication failed.
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// IMAP protocol error.
    #[error("IMAP protocol error: {0}")]
    ProtocolError(String),
}

/// Result type for mailbox operations.
pub type Result<T> = std::result::Result<T, MailError>;
