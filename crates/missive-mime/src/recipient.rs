//! Message recipients.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use crate::encoding::{encode_header_value, requires_encoding};
use crate::error::{Error, Result};

/// RFC 5322 specials that force a display name into a quoted-string.
const SPECIALS: &str = "()<>[]:;@\\,.\"";

/// A mailbox: optional display name plus address.
///
/// Two recipients are equal when their addresses are equal; the display
/// name does not take part in identity.
#[derive(Debug, Clone)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(try_from = "RecipientRepr", into = "RecipientRepr")
)]
pub struct Recipient {
    name: Option<String>,
    address: String,
    encoded_name: Option<String>,
}

impl Recipient {
    /// Creates a recipient without a display name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidAddress`] if the address is malformed.
    pub fn new(address: impl Into<String>) -> Result<Self> {
        let address = address.into();
        validate(&address)?;
        Ok(Self {
            name: None,
            address,
            encoded_name: None,
        })
    }

    /// Creates a recipient with a display name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidAddress`] if the address is malformed.
    pub fn with_name(name: impl Into<String>, address: impl Into<String>) -> Result<Self> {
        let mut recipient = Self::new(address)?;
        let name = name.into();
        if !name.trim().is_empty() {
            recipient.encoded_name = Some(encode_display_name(&name));
            recipient.name = Some(name);
        }
        Ok(recipient)
    }

    /// Parses `addr`, `<addr>` or `Display Name <addr>`.
    ///
    /// A quoted display name has its quotes removed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidAddress`] if the input is malformed.
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();

        let Some(open) = s.rfind('<') else {
            return Self::new(s);
        };
        let address = s[open + 1..]
            .strip_suffix('>')
            .ok_or_else(|| Error::InvalidAddress(format!("Unterminated angle address: {s}")))?;

        let name = s[..open].trim().trim_matches('"');
        if name.is_empty() {
            Self::new(address)
        } else {
            Self::with_name(name, address)
        }
    }

    /// Returns the display name as given.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Returns the bare address.
    #[must_use]
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Returns the header-safe form of the display name.
    #[must_use]
    pub fn encoded_name(&self) -> Option<&str> {
        self.encoded_name.as_deref()
    }

    /// Returns the domain part of the address.
    #[must_use]
    pub fn domain(&self) -> &str {
        self.address
            .rsplit_once('@')
            .map_or(self.address.as_str(), |(_, domain)| domain)
    }

    /// Returns `Name <addr>` or `<addr>` for use in headers.
    #[must_use]
    pub fn mailbox(&self) -> String {
        match &self.encoded_name {
            Some(name) => format!("{name} <{}>", self.address),
            None => format!("<{}>", self.address),
        }
    }
}

/// Checks `local@domain.tld` shape: no whitespace, a non-empty local part and
/// a dot inside the domain.
fn validate(address: &str) -> Result<()> {
    if address.is_empty() || address.chars().any(char::is_whitespace) {
        return Err(Error::InvalidAddress(address.to_string()));
    }

    let valid = address.match_indices('@').any(|(at, _)| {
        let domain = &address[at + 1..];
        at > 0
            && domain
                .match_indices('.')
                .any(|(dot, _)| dot > 0 && dot + 1 < domain.len())
    });

    if valid {
        Ok(())
    } else {
        Err(Error::InvalidAddress(address.to_string()))
    }
}

fn encode_display_name(name: &str) -> String {
    if requires_encoding(name) {
        encode_header_value(name, false)
    } else if name.contains(|c| SPECIALS.contains(c)) {
        let escaped = name.replace('\\', "\\\\").replace('"', "\\\"");
        format!("\"{escaped}\"")
    } else {
        name.to_string()
    }
}

impl PartialEq for Recipient {
    fn eq(&self, other: &Self) -> bool {
        self.address == other.address
    }
}

impl Eq for Recipient {}

impl Hash for Recipient {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.address.hash(state);
    }
}

impl FromStr for Recipient {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<&str> for Recipient {
    type Error = Error;

    fn try_from(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for Recipient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.mailbox())
    }
}

/// Joins mailboxes with `", "` for an address-list header.
#[must_use]
pub fn mailbox_list(recipients: &[Recipient]) -> String {
    recipients
        .iter()
        .map(Recipient::mailbox)
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(feature = "serde")]
#[derive(serde::Serialize, serde::Deserialize)]
struct RecipientRepr {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    address: String,
}

#[cfg(feature = "serde")]
impl TryFrom<RecipientRepr> for Recipient {
    type Error = Error;

    fn try_from(repr: RecipientRepr) -> Result<Self> {
        match repr.name {
            Some(name) => Self::with_name(name, repr.address),
            None => Self::new(repr.address),
        }
    }
}

#[cfg(feature = "serde")]
impl From<Recipient> for RecipientRepr {
    fn from(recipient: Recipient) -> Self {
        Self {
            name: recipient.name,
            address: recipient.address,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_valid_addresses() {
        for address in ["user@example.com", "a.b+tag@mail.example.org", "x@y.z"] {
            assert!(Recipient::new(address).is_ok(), "{address}");
        }
    }

    #[test]
    fn test_invalid_addresses() {
        for address in [
            "",
            "userexample.com",
            "@example.com",
            "user@",
            "user@localhost",
            "user@.com",
            "user@example.",
            "us er@example.com",
        ] {
            assert!(
                matches!(Recipient::new(address), Err(Error::InvalidAddress(_))),
                "{address}"
            );
        }
    }

    #[test]
    fn test_mailbox_without_name() {
        let r = Recipient::new("user@example.com").unwrap();
        assert_eq!(r.mailbox(), "<user@example.com>");
        assert_eq!(r.domain(), "example.com");
    }

    #[test]
    fn test_mailbox_with_ascii_name() {
        let r = Recipient::with_name("John Doe", "john@example.com").unwrap();
        assert_eq!(r.mailbox(), "John Doe <john@example.com>");
    }

    #[test]
    fn test_mailbox_with_specials_is_quoted() {
        let r = Recipient::with_name("Doe, John", "john@example.com").unwrap();
        assert_eq!(r.mailbox(), "\"Doe, John\" <john@example.com>");
    }

    #[test]
    fn test_mailbox_with_non_ascii_name() {
        let r = Recipient::with_name("Jürgen", "j@example.de").unwrap();
        assert_eq!(r.name(), Some("Jürgen"));
        assert_eq!(r.encoded_name(), Some("=?UTF-8?B?SsO8cmdlbg==?="));
        assert_eq!(r.mailbox(), "=?UTF-8?B?SsO8cmdlbg==?= <j@example.de>");
    }

    #[test]
    fn test_parse_forms() {
        let r = Recipient::parse("user@example.com").unwrap();
        assert_eq!(r.name(), None);

        let r = Recipient::parse("<user@example.com>").unwrap();
        assert_eq!(r.address(), "user@example.com");
        assert_eq!(r.name(), None);

        let r: Recipient = "\"Jane Roe\" <jane@example.com>".parse().unwrap();
        assert_eq!(r.name(), Some("Jane Roe"));
        assert_eq!(r.address(), "jane@example.com");

        assert!(Recipient::parse("Jane <jane@example.com").is_err());
    }

    #[test]
    fn test_identity_is_address_only() {
        let a = Recipient::with_name("A", "same@example.com").unwrap();
        let b = Recipient::with_name("B", "same@example.com").unwrap();
        assert_eq!(a, b);

        let set: HashSet<Recipient> = [a, b].into_iter().collect();
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_mailbox_list() {
        let list = [
            Recipient::new("a@example.com").unwrap(),
            Recipient::with_name("B", "b@example.com").unwrap(),
        ];
        assert_eq!(mailbox_list(&list), "<a@example.com>, B <b@example.com>");
    }
}
