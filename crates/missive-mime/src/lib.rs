//! # missive-mime
//!
//! Data model and MIME encoder for outbound email.
//!
//! ## Features
//!
//! - **Data model**: [`Email`], [`Recipient`], [`Attachment`], [`Priority`]
//! - **MIME tree**: leaf and multipart parts with fresh random boundaries
//! - **Header encoding**: RFC 2047 encoded-words and RFC 5322 line folding
//! - **Encoder**: full message bytes ready for the SMTP DATA phase
//!
//! ## Quick Start
//!
//! ```
//! use missive_mime::{Attachment, Email, MessageEncoder, Recipient};
//!
//! let email = Email::new()
//!     .from(Recipient::with_name("Alice", "alice@example.com")?)
//!     .to(Recipient::parse("Bob <bob@example.org>")?)
//!     .subject("Quarterly numbers")
//!     .plain_body("See attached.")
//!     .html_body("<p>See attached.</p>")
//!     .attach(Attachment::new("numbers.csv", "q,total\n1,42\n"));
//!
//! let bytes = MessageEncoder::new()
//!     .with_client_identification("missive")
//!     .encode(&email)?;
//! assert!(bytes.ends_with(b"\r\n."));
//! # Ok::<(), missive_mime::Error>(())
//! ```
//!
//! ### Header Encoding
//!
//! ```
//! use missive_mime::encoding::{encode_header_value, fold_header};
//!
//! assert_eq!(encode_header_value("Héllo", false), "=?UTF-8?B?SMOpbGxv?=");
//! assert_eq!(fold_header("Subject", "Hi", ' '), "Subject: Hi\r\n");
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod attachment;
mod content_type;
mod email;
mod error;
mod message;
mod part;
mod recipient;

pub mod encoding;

pub use attachment::Attachment;
pub use content_type::ContentType;
pub use email::{Email, Priority};
pub use error::{Error, Result};
pub use message::MessageEncoder;
pub use part::{
    ContentDisposition, DATE_FORMAT, DispositionKind, Leaf, Multipart, MultipartKind, Part,
    TransferEncoding,
};
pub use recipient::{Recipient, mailbox_list};
