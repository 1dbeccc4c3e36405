//! Error types for SMTP operations.

use std::io;
use std::time::Duration;

use crate::types::Reply;

/// Result type alias for SMTP operations.
pub type Result<T> = std::result::Result<T, Error>;

/// SMTP error types.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// I/O error, including connection failures.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// TLS error.
    #[error("TLS error: {0}")]
    Tls(#[from] rustls::Error),

    /// The configured host is not a valid TLS server name.
    #[error("Invalid DNS name: {0}")]
    InvalidDnsName(#[from] rustls::pki_types::InvalidDnsNameError),

    /// Connecting took longer than the configured timeout.
    #[error("Connection timed out after {0:?}")]
    Timeout(Duration),

    /// The server closed the connection before the session finished.
    #[error("Connection closed unexpectedly")]
    ConnectionClosed,

    /// A reply line did not start with a three digit code.
    #[error("Malformed reply: {0}")]
    MalformedReply(String),

    /// The server sent a reply the current state does not expect.
    #[error("Unexpected reply {}: {}", .0.code, .0.message_text())]
    UnexpectedReply(Reply),

    /// The server explicitly refused the session.
    #[error("Server error {}: {}", .0.code, .0.message_text())]
    ServerError(Reply),

    /// The session reached a state it cannot continue from.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// The server rejected the credentials.
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// The CRAM-MD5 challenge was not valid Base64.
    #[error("Undecodable authentication challenge")]
    UndecodableChallenge,

    /// Authentication was about to start without TLS on a secure session.
    #[error("Expected a secure connection before authenticating")]
    ExpectedSecureConnection,

    /// The email failed validation or encoding.
    #[error(transparent)]
    Mime(#[from] missive_mime::Error),

    /// Protocol violation by the server.
    #[error("Protocol error: {0}")]
    Protocol(String),
}

impl Error {
    /// Returns the server reply carried by this error, if any.
    #[must_use]
    pub const fn reply(&self) -> Option<&Reply> {
        match self {
            Self::UnexpectedReply(reply) | Self::ServerError(reply) => Some(reply),
            _ => None,
        }
    }

    /// Returns true if the server reported a permanent failure (5xx).
    #[must_use]
    pub fn is_permanent(&self) -> bool {
        self.reply().is_some_and(|reply| reply.code.is_permanent())
    }

    /// Returns true if the server reported a transient failure (4xx).
    #[must_use]
    pub fn is_transient(&self) -> bool {
        self.reply().is_some_and(|reply| reply.code.is_transient())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::types::ReplyCode;

    #[test]
    fn test_reply_classification() {
        let err = Error::UnexpectedReply(Reply::new(
            ReplyCode::MAILBOX_UNAVAILABLE,
            vec!["No such user".to_string()],
        ));
        assert!(err.is_permanent());
        assert!(!err.is_transient());
        assert_eq!(err.to_string(), "Unexpected reply 550: No such user");

        let err = Error::ServerError(Reply::new(ReplyCode::MAILBOX_BUSY, vec![]));
        assert!(err.is_transient());
        assert_eq!(err.reply().unwrap().code.as_u16(), 450);

        assert!(!Error::ConnectionClosed.is_permanent());
        assert!(Error::InvalidCredentials.reply().is_none());
    }

    #[test]
    fn test_mime_error_is_transparent() {
        let err = Error::from(missive_mime::Error::MissingSubject);
        assert_eq!(err.to_string(), "Email has no subject");
    }
}
