//! Error types for message construction and encoding.

use std::io;

use crate::part::TransferEncoding;

/// Result type alias for MIME operations.
pub type Result<T> = std::result::Result<T, Error>;

/// MIME error types.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Address does not look like `local@domain.tld`.
    #[error("Invalid email address: {0}")]
    InvalidAddress(String),

    /// The email has no sender.
    #[error("Email has no sender")]
    MissingSender,

    /// The email has no `To` recipient.
    #[error("Email has no recipients")]
    NoRecipients,

    /// The email has no subject.
    #[error("Email has no subject")]
    MissingSubject,

    /// The email has neither a plain nor an HTML body.
    #[error("Email has no plain or HTML body")]
    MissingBody,

    /// An attachment has no resolved content type, so no part can be built for it.
    #[error("Cannot create part for attachment {filename}: missing content type")]
    MissingContentType {
        /// Name of the offending attachment.
        filename: String,
    },

    /// Invalid content type.
    #[error("Invalid content type: {0}")]
    InvalidContentType(String),

    /// A header value contains a line break or other control character.
    #[error("Header {name} contains control characters: {value:?}")]
    InvalidHeaderValue {
        /// Header name.
        name: &'static str,
        /// The rejected value.
        value: String,
    },

    /// A part declares a transfer encoding the encoder cannot emit.
    #[error(
        "Transfer encoding not implemented: {}",
        .0.map_or("none", TransferEncoding::as_str)
    )]
    UnsupportedTransferEncoding(Option<TransferEncoding>),

    /// Attachment could not be loaded.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl Error {
    /// Returns true if this error comes from the pre-send completeness check.
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::InvalidAddress(_)
                | Self::MissingSender
                | Self::NoRecipients
                | Self::MissingSubject
                | Self::MissingBody
        )
    }
}
