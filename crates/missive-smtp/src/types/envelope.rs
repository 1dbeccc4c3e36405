//! SMTP envelope.

use missive_mime::{Email, Recipient};

use crate::error::Result;

/// Reverse path and forward paths for one mail transaction.
///
/// Recipients are unique by address and keep their first-seen order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    sender: Recipient,
    recipients: Vec<Recipient>,
}

impl Envelope {
    /// Creates an envelope, dropping repeated addresses.
    ///
    /// # Errors
    ///
    /// Returns [`missive_mime::Error::NoRecipients`] if `recipients` is empty.
    pub fn new(sender: Recipient, recipients: impl IntoIterator<Item = Recipient>) -> Result<Self> {
        let mut unique: Vec<Recipient> = Vec::new();
        for recipient in recipients {
            if !unique.contains(&recipient) {
                unique.push(recipient);
            }
        }

        if unique.is_empty() {
            return Err(missive_mime::Error::NoRecipients.into());
        }

        Ok(Self {
            sender,
            recipients: unique,
        })
    }

    /// Builds the envelope for `email`: its sender and every `to`, `cc` and
    /// `bcc` address.
    ///
    /// # Errors
    ///
    /// Returns a validation error if the sender or recipients are missing.
    pub fn from_email(email: &Email) -> Result<Self> {
        let sender = email
            .from
            .clone()
            .ok_or(missive_mime::Error::MissingSender)?;
        Self::new(sender, email.recipients().into_iter().cloned())
    }

    /// Returns the reverse path.
    #[must_use]
    pub const fn sender(&self) -> &Recipient {
        &self.sender
    }

    /// Returns the forward paths.
    #[must_use]
    pub fn recipients(&self) -> &[Recipient] {
        &self.recipients
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn rcpt(address: &str) -> Recipient {
        Recipient::new(address).unwrap()
    }

    #[test]
    fn test_dedup_keeps_first_order() {
        let envelope = Envelope::new(
            rcpt("from@example.com"),
            [
                rcpt("b@example.com"),
                rcpt("a@example.com"),
                Recipient::with_name("Again", "b@example.com").unwrap(),
            ],
        )
        .unwrap();

        let addresses: Vec<&str> = envelope.recipients().iter().map(Recipient::address).collect();
        assert_eq!(addresses, ["b@example.com", "a@example.com"]);
        assert_eq!(envelope.recipients()[0].name(), None);
    }

    #[test]
    fn test_empty_recipients() {
        let err = Envelope::new(rcpt("from@example.com"), []).unwrap_err();
        assert!(matches!(
            err,
            crate::Error::Mime(missive_mime::Error::NoRecipients)
        ));
    }

    #[test]
    fn test_from_email_includes_bcc() {
        let email = Email::new()
            .from(rcpt("from@example.com"))
            .to(rcpt("to@example.com"))
            .cc(rcpt("cc@example.com"))
            .bcc(rcpt("hidden@example.com"));
        let envelope = Envelope::from_email(&email).unwrap();

        assert_eq!(envelope.sender().address(), "from@example.com");
        assert_eq!(envelope.recipients().len(), 3);
        assert_eq!(envelope.recipients()[2].address(), "hidden@example.com");
    }

    #[test]
    fn test_from_email_without_sender() {
        let email = Email::new().to(rcpt("to@example.com"));
        assert!(matches!(
            Envelope::from_email(&email),
            Err(crate::Error::Mime(missive_mime::Error::MissingSender))
        ));
    }
}
