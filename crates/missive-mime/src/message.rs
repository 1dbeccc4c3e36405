//! Serialization of a complete message for the DATA phase.

use chrono::{DateTime, FixedOffset, Local};
use uuid::Uuid;

use crate::email::{Email, Priority};
use crate::encoding::{CRLF, encode_header_value, fold_header};
use crate::error::{Error, Result};
use crate::part::DATE_FORMAT;
use crate::recipient::mailbox_list;

/// Turns an [`Email`] into wire bytes.
///
/// The output holds the top-level headers, the MIME body and the
/// terminating `CRLF.` marker that closes the DATA phase.
#[derive(Debug, Clone, Default)]
pub struct MessageEncoder {
    client_identification: Option<String>,
    date: Option<DateTime<FixedOffset>>,
}

impl MessageEncoder {
    /// Creates an encoder that stamps the current local time.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Emits an `X-Mailer` header with this value.
    #[must_use]
    pub fn with_client_identification(mut self, id: impl Into<String>) -> Self {
        self.client_identification = Some(id.into());
        self
    }

    /// Uses a fixed `Date` instead of the current time.
    #[must_use]
    pub const fn with_date(mut self, date: DateTime<FixedOffset>) -> Self {
        self.date = Some(date);
        self
    }

    /// Encodes `email`.
    ///
    /// # Errors
    ///
    /// Returns a validation error if the email is incomplete, or an encoding
    /// error from building the MIME tree.
    pub fn encode(&self, email: &Email) -> Result<Vec<u8>> {
        email.validate()?;
        let sender = email.from.as_ref().ok_or(Error::MissingSender)?;
        let subject = email.subject.as_deref().ok_or(Error::MissingSubject)?;

        // Build the tree first so a bad attachment fails before any output.
        let body = email.body_part()?;

        let date = self.date.unwrap_or_else(|| Local::now().fixed_offset());
        let message_id = format!("<{}@{}>", Uuid::new_v4(), sender.domain());

        let mut out = String::new();
        out.push_str(&fold_header("From", &sender.mailbox(), ' '));
        out.push_str(&fold_header("To", &mailbox_list(&email.to), ' '));
        if !email.cc.is_empty() {
            out.push_str(&fold_header("Cc", &mailbox_list(&email.cc), ' '));
        }
        if let Some(reply_to) = &email.reply_to {
            out.push_str(&fold_header("Reply-To", &reply_to.mailbox(), ' '));
        }
        out.push_str(&format!("Date: {}{CRLF}", date.format(DATE_FORMAT)));
        out.push_str(&fold_header(
            "Subject",
            &encode_header_value(subject, false),
            ' ',
        ));
        out.push_str(&format!("Message-ID: {message_id}{CRLF}"));
        out.push_str(&format!("MIME-Version: 1.0{CRLF}"));
        if let Some(id) = &self.client_identification {
            out.push_str(&fold_header("X-Mailer", &encode_header_value(id, false), ' '));
        }
        if email.priority != Priority::Normal {
            out.push_str(&format!("X-Priority: {}{CRLF}", email.priority.as_str()));
        }

        body.write(&mut out)?;
        out.push_str(CRLF);
        out.push('.');

        tracing::debug!(
            %message_id,
            bytes = out.len(),
            attachments = email.attachments.len(),
            "Encoded message"
        );

        Ok(out.into_bytes())
    }
}
