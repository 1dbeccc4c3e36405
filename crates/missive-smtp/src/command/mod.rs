//! SMTP command encoder.

use std::fmt;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use bytes::Bytes;
use missive_mime::Recipient;

use crate::types::AuthMechanism;

/// SMTP command.
#[derive(Clone, PartialEq, Eq)]
pub enum Command {
    /// EHLO - Extended greeting
    Ehlo {
        /// Client hostname
        hostname: String,
    },
    /// HELO - Legacy greeting, used when EHLO is refused
    Helo {
        /// Client hostname
        hostname: String,
    },
    /// STARTTLS - Upgrade to TLS
    StartTls,
    /// AUTH - Begin authentication
    Auth {
        /// Authentication mechanism
        mechanism: AuthMechanism,
    },
    /// A SASL response line, sent Base64 encoded
    Credential(String),
    /// MAIL FROM - Start mail transaction
    MailFrom {
        /// Sender address
        from: Recipient,
    },
    /// RCPT TO - Add recipient
    RcptTo {
        /// Recipient address
        to: Recipient,
    },
    /// DATA - Begin message data
    Data,
    /// The encoded message, already terminated by `CRLF.`
    TransferBody(Bytes),
    /// QUIT - Close connection
    Quit,
}

impl Command {
    /// Serializes the command to bytes.
    #[must_use]
    pub fn serialize(&self) -> Vec<u8> {
        let mut buf = Vec::new();

        match self {
            Self::Ehlo { hostname } => {
                buf.extend_from_slice(b"EHLO ");
                buf.extend_from_slice(hostname.as_bytes());
            }
            Self::Helo { hostname } => {
                buf.extend_from_slice(b"HELO ");
                buf.extend_from_slice(hostname.as_bytes());
            }
            Self::StartTls => {
                buf.extend_from_slice(b"STARTTLS");
            }
            Self::Auth { mechanism } => {
                buf.extend_from_slice(b"AUTH ");
                buf.extend_from_slice(mechanism.as_str().as_bytes());
            }
            Self::Credential(data) => {
                buf.extend_from_slice(STANDARD.encode(data.as_bytes()).as_bytes());
            }
            Self::MailFrom { from } => {
                buf.extend_from_slice(b"MAIL FROM:<");
                buf.extend_from_slice(from.address().as_bytes());
                buf.push(b'>');
            }
            Self::RcptTo { to } => {
                buf.extend_from_slice(b"RCPT TO:<");
                buf.extend_from_slice(to.address().as_bytes());
                buf.push(b'>');
            }
            Self::Data => {
                buf.extend_from_slice(b"DATA");
            }
            Self::TransferBody(body) => {
                buf.reserve(body.len() + 2);
                buf.extend_from_slice(body);
            }
            Self::Quit => {
                buf.extend_from_slice(b"QUIT");
            }
        }

        buf.extend_from_slice(b"\r\n");
        buf
    }

    /// Returns the command verb for logging.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Ehlo { .. } => "EHLO",
            Self::Helo { .. } => "HELO",
            Self::StartTls => "STARTTLS",
            Self::Auth { .. } => "AUTH",
            Self::Credential(_) => "<credential>",
            Self::MailFrom { .. } => "MAIL FROM",
            Self::RcptTo { .. } => "RCPT TO",
            Self::Data => "DATA",
            Self::TransferBody(_) => "<message body>",
            Self::Quit => "QUIT",
        }
    }
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ehlo { hostname } => f.debug_struct("Ehlo").field("hostname", hostname).finish(),
            Self::Helo { hostname } => f.debug_struct("Helo").field("hostname", hostname).finish(),
            Self::StartTls => f.write_str("StartTls"),
            Self::Auth { mechanism } => f.debug_struct("Auth").field("mechanism", mechanism).finish(),
            Self::Credential(_) => f.write_str("Credential(<redacted>)"),
            Self::MailFrom { from } => f
                .debug_struct("MailFrom")
                .field("from", &from.address())
                .finish(),
            Self::RcptTo { to } => f.debug_struct("RcptTo").field("to", &to.address()).finish(),
            Self::Data => f.write_str("Data"),
            Self::TransferBody(body) => write!(f, "TransferBody({} bytes)", body.len()),
            Self::Quit => f.write_str("Quit"),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::redundant_clone, clippy::manual_string_new, clippy::needless_collect, clippy::unreadable_literal, clippy::used_underscore_items, clippy::similar_names)]
mod tests {
    use super::*;

    fn rcpt(address: &str) -> Recipient {
        Recipient::with_name("Someone", address).unwrap()
    }

    #[test]
    fn test_ehlo_command() {
        let cmd = Command::Ehlo {
            hostname: "client.example.com".to_string(),
        };
        assert_eq!(cmd.serialize(), b"EHLO client.example.com\r\n");
    }

    #[test]
    fn test_helo_command() {
        let cmd = Command::Helo {
            hostname: "client.example.com".to_string(),
        };
        assert_eq!(cmd.serialize(), b"HELO client.example.com\r\n");
    }

    #[test]
    fn test_starttls_command() {
        assert_eq!(Command::StartTls.serialize(), b"STARTTLS\r\n");
    }

    #[test]
    fn test_auth_commands() {
        let cases = [
            (AuthMechanism::Plain, &b"AUTH PLAIN\r\n"[..]),
            (AuthMechanism::Login, b"AUTH LOGIN\r\n"),
            (AuthMechanism::CramMd5, b"AUTH CRAM-MD5\r\n"),
        ];
        for (mechanism, expected) in cases {
            assert_eq!(Command::Auth { mechanism }.serialize(), expected);
        }
    }

    #[test]
    fn test_credential_is_base64() {
        let cmd = Command::Credential("\0user\0pass".to_string());
        assert_eq!(cmd.serialize(), b"AHVzZXIAcGFzcw==\r\n");
    }

    #[test]
    fn test_mail_from_uses_bare_address() {
        let cmd = Command::MailFrom {
            from: rcpt("sender@example.com"),
        };
        assert_eq!(cmd.serialize(), b"MAIL FROM:<sender@example.com>\r\n");
    }

    #[test]
    fn test_rcpt_to_command() {
        let cmd = Command::RcptTo {
            to: rcpt("recipient@example.com"),
        };
        assert_eq!(cmd.serialize(), b"RCPT TO:<recipient@example.com>\r\n");
    }

    #[test]
    fn test_data_and_quit() {
        assert_eq!(Command::Data.serialize(), b"DATA\r\n");
        assert_eq!(Command::Quit.serialize(), b"QUIT\r\n");
    }

    #[test]
    fn test_transfer_body_gets_single_crlf() {
        let cmd = Command::TransferBody(Bytes::from_static(b"Subject: x\r\n\r\nbody\r\n."));
        assert_eq!(cmd.serialize(), b"Subject: x\r\n\r\nbody\r\n.\r\n");
    }

    #[test]
    fn test_debug_redacts_credentials() {
        let cmd = Command::Credential("secret".to_string());
        assert!(!format!("{cmd:?}").contains("secret"));

        let cmd = Command::TransferBody(Bytes::from_static(b"hello"));
        assert_eq!(format!("{cmd:?}"), "TransferBody(5 bytes)");
    }
}
