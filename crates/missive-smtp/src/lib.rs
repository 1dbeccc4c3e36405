//! # missive-smtp
//!
//! An async SMTP submission client implementing the client side of RFC 5321.
//!
//! ## Features
//!
//! - **Sans-I/O session**: the [`protocol::Protocol`] state machine decides
//!   every command; the [`Mailer`] only moves bytes
//! - **TLS support**: both implicit TLS (port 465) and STARTTLS (port 587)
//! - **Authentication**: PLAIN, LOGIN and CRAM-MD5
//! - **MIME**: messages are encoded with [`missive_mime`]
//!
//! ## Quick Start
//!
//! ```no_run
//! use missive_smtp::mime::{Email, Recipient};
//! use missive_smtp::{Config, Credentials, Mailer, Security};
//!
//! #[tokio::main]
//! async fn main() -> missive_smtp::Result<()> {
//!     let config = Config::new(
//!         "smtp.example.com",
//!         Security::StartTls,
//!         Credentials::Plain {
//!             username: "alice@example.com".into(),
//!             password: "secret".into(),
//!         },
//!     );
//!     let mailer = Mailer::new(config).with_client_identification("missive");
//!
//!     let email = Email::new()
//!         .from(Recipient::with_name("Alice", "alice@example.com")?)
//!         .to(Recipient::new("bob@example.org")?)
//!         .subject("Hello")
//!         .plain_body("Hello, Bob!");
//!
//!     mailer.send(&email).await
//! }
//! ```
//!
//! ## Session States
//!
//! ```text
//! greeting ─→ EHLO ─┬─→ STARTTLS ─→ TLS ─→ EHLO ─┐
//!                   └────────────────────────────┴─→ AUTH ─→ MAIL FROM
//!     ─→ RCPT TO (per recipient) ─→ DATA ─→ body ─→ QUIT
//! ```
//!
//! Any failure records the first error, sends a best-effort QUIT and ends
//! the session. A malformed reply ends it without QUIT.
//!
//! ## Modules
//!
//! - [`command`]: SMTP command encoder
//! - [`connection`]: Configuration and the plain/TLS stream
//! - [`parser`]: Reply decoder
//! - [`protocol`]: Session state machine
//! - [`types`]: Replies, mechanisms and the envelope

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod command;
pub mod connection;
mod error;
mod mailer;
pub mod parser;
pub mod protocol;
pub mod types;

pub use missive_mime as mime;

pub use command::Command;
pub use connection::{Config, ConfigBuilder, Credentials, Security};
pub use error::{Error, Result};
pub use mailer::Mailer;
pub use parser::ReplyDecoder;
pub use types::{AuthMechanism, Envelope, Reply, ReplyCode};
