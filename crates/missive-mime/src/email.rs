//! The structured email handed to the encoder.

use std::collections::HashSet;

use crate::attachment::Attachment;
use crate::content_type::ContentType;
use crate::error::{Error, Result};
use crate::part::{
    ContentDisposition, DispositionKind, Leaf, Multipart, MultipartKind, Part, TransferEncoding,
};
use crate::recipient::Recipient;

/// Message importance, sent as `X-Priority`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Priority {
    /// Low importance.
    Low,
    /// No header is emitted.
    #[default]
    Normal,
    /// High importance.
    High,
}

impl Priority {
    /// Returns the `X-Priority` header value.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Low => "1",
            Self::Normal => "3",
            Self::High => "5",
        }
    }
}

/// An outgoing email.
///
/// Built with chained setters and checked with [`Email::validate`] before
/// sending.
///
/// ```
/// use missive_mime::{Email, Recipient};
///
/// let email = Email::new()
///     .from(Recipient::with_name("Alice", "alice@example.com")?)
///     .to(Recipient::new("bob@example.com")?)
///     .subject("Lunch")
///     .plain_body("Noon at the usual place?");
/// assert!(email.validate().is_ok());
/// # Ok::<(), missive_mime::Error>(())
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Email {
    /// Sender.
    pub from: Option<Recipient>,
    /// Reply-To address.
    pub reply_to: Option<Recipient>,
    /// Primary recipients.
    pub to: Vec<Recipient>,
    /// Carbon-copy recipients.
    pub cc: Vec<Recipient>,
    /// Blind carbon-copy recipients, never written to headers.
    pub bcc: Vec<Recipient>,
    /// Subject line.
    pub subject: Option<String>,
    /// Importance.
    pub priority: Priority,
    /// `text/plain` body.
    pub plain_body: Option<String>,
    /// `text/html` body.
    pub html_body: Option<String>,
    /// Attached files.
    pub attachments: Vec<Attachment>,
}

impl Email {
    /// Creates an empty email.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the sender.
    #[must_use]
    pub fn from(mut self, sender: Recipient) -> Self {
        self.from = Some(sender);
        self
    }

    /// Sets the Reply-To address.
    #[must_use]
    pub fn reply_to(mut self, recipient: Recipient) -> Self {
        self.reply_to = Some(recipient);
        self
    }

    /// Adds a primary recipient.
    #[must_use]
    pub fn to(mut self, recipient: Recipient) -> Self {
        self.to.push(recipient);
        self
    }

    /// Adds a carbon-copy recipient.
    #[must_use]
    pub fn cc(mut self, recipient: Recipient) -> Self {
        self.cc.push(recipient);
        self
    }

    /// Adds a blind carbon-copy recipient.
    #[must_use]
    pub fn bcc(mut self, recipient: Recipient) -> Self {
        self.bcc.push(recipient);
        self
    }

    /// Sets the subject.
    #[must_use]
    pub fn subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    /// Sets the priority.
    #[must_use]
    pub const fn priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    /// Sets the plain text body.
    #[must_use]
    pub fn plain_body(mut self, body: impl Into<String>) -> Self {
        self.plain_body = Some(body.into());
        self
    }

    /// Sets the HTML body.
    #[must_use]
    pub fn html_body(mut self, body: impl Into<String>) -> Self {
        self.html_body = Some(body.into());
        self
    }

    /// Adds an attachment.
    #[must_use]
    pub fn attach(mut self, attachment: Attachment) -> Self {
        self.attachments.push(attachment);
        self
    }

    /// Checks that the email can be sent.
    ///
    /// # Errors
    ///
    /// Returns the first missing piece: sender, a `To` recipient, a subject,
    /// or a body.
    pub fn validate(&self) -> Result<()> {
        if self.from.is_none() {
            return Err(Error::MissingSender);
        }
        if self.to.is_empty() {
            return Err(Error::NoRecipients);
        }
        if self.subject.as_deref().is_none_or(str::is_empty) {
            return Err(Error::MissingSubject);
        }
        if !self.has_body() {
            return Err(Error::MissingBody);
        }
        Ok(())
    }

    /// Returns true if a plain or HTML body is set.
    #[must_use]
    pub const fn has_body(&self) -> bool {
        self.plain_body.is_some() || self.html_body.is_some()
    }

    /// Returns every envelope recipient once, in `to`, `cc`, `bcc` order.
    ///
    /// The first occurrence of an address wins.
    #[must_use]
    pub fn recipients(&self) -> Vec<&Recipient> {
        let mut seen = HashSet::new();
        let mut unique = Vec::new();
        for recipient in self.to.iter().chain(&self.cc).chain(&self.bcc) {
            if seen.insert(recipient.address()) {
                unique.push(recipient);
            }
        }
        unique
    }

    /// Builds the MIME tree for the body and attachments.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingBody`] without a body, or
    /// [`Error::MissingContentType`] / [`Error::InvalidContentType`] for an
    /// attachment whose type is unknown or malformed.
    pub fn body_part(&self) -> Result<Part> {
        let plain = self
            .plain_body
            .as_deref()
            .map(|text| Leaf::text(text, ContentType::text_plain()));
        let html = self
            .html_body
            .as_deref()
            .map(|text| Leaf::text(text, ContentType::text_html()));

        let body: Part = match (plain, html) {
            (Some(plain), Some(html)) => {
                Multipart::new(MultipartKind::Alternative, plain)
                    .with_part(html)
                    .into()
            }
            (Some(leaf), None) | (None, Some(leaf)) => leaf.into(),
            (None, None) => return Err(Error::MissingBody),
        };

        if self.attachments.is_empty() {
            return Ok(body);
        }

        let mut related = Multipart::new(MultipartKind::Related, body);
        for attachment in &self.attachments {
            related.push(attachment_part(attachment)?);
        }
        Ok(related.into())
    }
}

fn attachment_part(attachment: &Attachment) -> Result<Leaf> {
    let content_type = attachment
        .content_type
        .as_deref()
        .ok_or_else(|| Error::MissingContentType {
            filename: attachment.filename.clone(),
        })?;

    Ok(Leaf {
        content_type: ContentType::parse(content_type)?,
        disposition: Some(ContentDisposition {
            kind: DispositionKind::Attachment,
            filename: Some(attachment.filename.clone()),
            size: Some(attachment.size),
            creation_date: attachment.creation_date,
            modification_date: attachment.modification_date,
        }),
        transfer_encoding: Some(TransferEncoding::Base64),
        attachment_id: attachment.id.clone(),
        body: Some(attachment.data.clone()),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn rcpt(address: &str) -> Recipient {
        Recipient::new(address).unwrap()
    }

    fn complete() -> Email {
        Email::new()
            .from(rcpt("sender@example.com"))
            .to(rcpt("to@example.com"))
            .subject("Subject")
            .plain_body("Body")
    }

    #[test]
    fn test_validate_complete() {
        assert!(complete().validate().is_ok());
    }

    #[test]
    fn test_validate_missing_fields() {
        let mut email = complete();
        email.from = None;
        assert!(matches!(email.validate(), Err(Error::MissingSender)));

        let mut email = complete();
        email.to.clear();
        assert!(matches!(email.validate(), Err(Error::NoRecipients)));

        let email = complete().subject("");
        assert!(matches!(email.validate(), Err(Error::MissingSubject)));

        let mut email = complete();
        email.plain_body = None;
        assert!(matches!(email.validate(), Err(Error::MissingBody)));
        assert!(email.html_body("<p>hi</p>").validate().is_ok());
    }

    #[test]
    fn test_cc_only_is_not_enough() {
        let mut email = complete();
        email.to.clear();
        let email = email.cc(rcpt("cc@example.com"));
        assert!(matches!(email.validate(), Err(Error::NoRecipients)));
    }

    #[test]
    fn test_priority_strings() {
        assert_eq!(Priority::Low.as_str(), "1");
        assert_eq!(Priority::Normal.as_str(), "3");
        assert_eq!(Priority::High.as_str(), "5");
        assert_eq!(Priority::default(), Priority::Normal);
    }

    #[test]
    fn test_recipients_are_ordered_and_unique() {
        let email = complete()
            .to(Recipient::with_name("Dup", "to@example.com").unwrap())
            .cc(rcpt("cc@example.com"))
            .bcc(rcpt("bcc@example.com"))
            .bcc(rcpt("cc@example.com"));

        let addresses: Vec<&str> = email.recipients().iter().map(|r| r.address()).collect();
        assert_eq!(
            addresses,
            ["to@example.com", "cc@example.com", "bcc@example.com"]
        );
    }

    #[test]
    fn test_single_body_is_root_leaf() {
        let part = complete().body_part().unwrap();
        let Part::Leaf(leaf) = part else {
            panic!("expected a leaf");
        };
        assert_eq!(leaf.content_type.essence(), "text/plain");
    }

    #[test]
    fn test_both_bodies_make_alternative() {
        let part = complete().html_body("<b>Body</b>").body_part().unwrap();
        let Part::Multipart(multipart) = part else {
            panic!("expected a multipart");
        };
        assert_eq!(multipart.kind(), MultipartKind::Alternative);
        assert_eq!(multipart.parts().len(), 2);
    }

    #[test]
    fn test_attachments_make_related() {
        let email = complete()
            .attach(Attachment::new("a.pdf", vec![1, 2]).with_id("a"))
            .attach(Attachment::new("b.png", vec![3]));
        let Part::Multipart(multipart) = email.body_part().unwrap() else {
            panic!("expected a multipart");
        };

        assert_eq!(multipart.kind(), MultipartKind::Related);
        assert_eq!(multipart.parts().len(), 3);
        let Part::Leaf(first) = &multipart.parts()[1] else {
            panic!("expected a leaf");
        };
        assert_eq!(first.content_type.essence(), "application/pdf");
        assert_eq!(first.attachment_id.as_deref(), Some("a"));
        let disposition = first.disposition.as_ref().unwrap();
        assert_eq!(disposition.kind, DispositionKind::Attachment);
        assert_eq!(disposition.size, Some(2));
    }

    #[test]
    fn test_attachment_without_content_type() {
        let email = complete().attach(Attachment::new("blob.unknownext", vec![0]));
        match email.body_part() {
            Err(Error::MissingContentType { filename }) => assert_eq!(filename, "blob.unknownext"),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_attachment_with_malformed_content_type() {
        let email =
            complete().attach(Attachment::new("x.bin", vec![0]).with_content_type("garbage"));
        assert!(matches!(email.body_part(), Err(Error::InvalidContentType(_))));
    }

    #[test]
    fn test_missing_body() {
        let mut email = complete();
        email.plain_body = None;
        assert!(matches!(email.body_part(), Err(Error::MissingBody)));
    }
}
