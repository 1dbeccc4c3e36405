//! MIME part tree and its serialization.
//!
//! A message body is a tree of [`Part`]s. Leaves carry a payload; multiparts
//! carry an ordered, non-empty list of children separated by a boundary.

use std::fmt;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::content_type::ContentType;
use crate::encoding::{
    CRLF, encode_base64_lines, encode_header_value, fold_header, is_header_safe,
};
use crate::error::{Error, Result};

/// Date format used in MIME parameters and the `Date` header.
pub const DATE_FORMAT: &str = "%a, %d %b %Y %H:%M:%S %z";

/// Transfer encoding types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferEncoding {
    /// 7-bit ASCII.
    SevenBit,
    /// 8-bit binary.
    EightBit,
    /// Base64 encoding.
    Base64,
    /// Quoted-Printable encoding.
    QuotedPrintable,
    /// Binary (no encoding).
    Binary,
}

impl TransferEncoding {
    /// Returns the header token for this encoding.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::SevenBit => "7bit",
            Self::EightBit => "8bit",
            Self::Base64 => "base64",
            Self::QuotedPrintable => "quoted-printable",
            Self::Binary => "binary",
        }
    }
}

impl fmt::Display for TransferEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Presentation style of a part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispositionKind {
    /// Displayed as part of the message.
    Inline,
    /// Offered as a separate file.
    Attachment,
    /// Any other registered or private style.
    Other(String),
}

impl DispositionKind {
    /// Returns the header token for this style.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Inline => "inline",
            Self::Attachment => "attachment",
            Self::Other(style) => style,
        }
    }
}

/// `Content-Disposition` header value (RFC 2183).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentDisposition {
    /// Presentation style.
    pub kind: DispositionKind,
    /// Suggested file name.
    pub filename: Option<String>,
    /// Payload size in bytes.
    pub size: Option<u64>,
    /// File creation time.
    pub creation_date: Option<DateTime<Utc>>,
    /// File modification time.
    pub modification_date: Option<DateTime<Utc>>,
}

impl ContentDisposition {
    /// Creates a disposition with no parameters.
    #[must_use]
    pub const fn new(kind: DispositionKind) -> Self {
        Self {
            kind,
            filename: None,
            size: None,
            creation_date: None,
            modification_date: None,
        }
    }

    /// Renders the header value. Parameters appear in a fixed order.
    #[must_use]
    pub fn value(&self) -> String {
        let mut value = self.kind.as_str().to_string();

        if let Some(filename) = &self.filename {
            let filename = encode_header_value(filename, false)
                .replace('\\', "\\\\")
                .replace('"', "\\\"");
            value.push_str(&format!("; filename=\"{filename}\""));
        }
        if let Some(size) = self.size {
            value.push_str(&format!("; size={size}"));
        }
        if let Some(date) = self.creation_date {
            value.push_str(&format!("; creation-date=\"{}\"", date.format(DATE_FORMAT)));
        }
        if let Some(date) = self.modification_date {
            value.push_str(&format!(
                "; modification-date=\"{}\"",
                date.format(DATE_FORMAT)
            ));
        }

        value
    }
}

/// A part with a payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Leaf {
    /// Payload content type.
    pub content_type: ContentType,
    /// Optional disposition.
    pub disposition: Option<ContentDisposition>,
    /// Declared transfer encoding.
    pub transfer_encoding: Option<TransferEncoding>,
    /// Optional `X-Attachment-Id`.
    pub attachment_id: Option<String>,
    /// Raw payload.
    pub body: Option<Vec<u8>>,
}

impl Leaf {
    /// Creates an inline, Base64-encoded text leaf.
    #[must_use]
    pub fn text(text: &str, content_type: ContentType) -> Self {
        Self {
            content_type,
            disposition: Some(ContentDisposition::new(DispositionKind::Inline)),
            transfer_encoding: Some(TransferEncoding::Base64),
            attachment_id: None,
            body: Some(text.as_bytes().to_vec()),
        }
    }

    fn write(&self, out: &mut String) -> Result<()> {
        let content_type = checked("Content-Type", self.content_type.to_string())?;
        out.push_str(&fold_header("Content-Type", &content_type, ' '));
        if let Some(disposition) = &self.disposition {
            let value = checked("Content-Disposition", disposition.value())?;
            out.push_str(&fold_header("Content-Disposition", &value, ' '));
        }
        if let Some(encoding) = self.transfer_encoding {
            out.push_str(&format!("Content-Transfer-Encoding: {encoding}{CRLF}"));
        }
        if let Some(id) = &self.attachment_id {
            let id = checked("X-Attachment-Id", id.clone())?;
            out.push_str(&format!("X-Attachment-Id: {id}{CRLF}"));
        }
        out.push_str(CRLF);

        if let Some(body) = &self.body {
            match self.transfer_encoding {
                Some(TransferEncoding::Base64) => out.push_str(&encode_base64_lines(body)),
                other => return Err(Error::UnsupportedTransferEncoding(other)),
            }
        }

        Ok(())
    }
}

/// Refuses header values that would break out of their line.
fn checked(name: &'static str, value: String) -> Result<String> {
    if is_header_safe(&value) {
        Ok(value)
    } else {
        Err(Error::InvalidHeaderValue { name, value })
    }
}

/// Multipart subtype.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MultipartKind {
    /// Alternative renditions of the same content.
    Alternative,
    /// Independent parts in order.
    Mixed,
    /// A root part and the resources it references.
    Related,
}

impl MultipartKind {
    /// Returns the subtype token.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Alternative => "alternative",
            Self::Mixed => "mixed",
            Self::Related => "related",
        }
    }
}

/// A part grouping child parts under a boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Multipart {
    kind: MultipartKind,
    boundary: String,
    parts: Vec<Part>,
}

impl Multipart {
    /// Creates a multipart with its first child and a fresh random boundary.
    #[must_use]
    pub fn new(kind: MultipartKind, first: impl Into<Part>) -> Self {
        Self {
            kind,
            boundary: Uuid::new_v4().simple().to_string(),
            parts: vec![first.into()],
        }
    }

    /// Appends a child part.
    pub fn push(&mut self, part: impl Into<Part>) {
        self.parts.push(part.into());
    }

    /// Appends a child part, builder style.
    #[must_use]
    pub fn with_part(mut self, part: impl Into<Part>) -> Self {
        self.push(part);
        self
    }

    /// Returns the subtype.
    #[must_use]
    pub const fn kind(&self) -> MultipartKind {
        self.kind
    }

    /// Returns the boundary token.
    #[must_use]
    pub fn boundary(&self) -> &str {
        &self.boundary
    }

    /// Returns the children, never empty.
    #[must_use]
    pub fn parts(&self) -> &[Part] {
        &self.parts
    }

    fn write(&self, out: &mut String) -> Result<()> {
        let boundary = &self.boundary;
        let content_type = ContentType::multipart(self.kind.as_str(), boundary);
        out.push_str(&fold_header("Content-Type", &content_type.to_string(), ' '));
        out.push_str(CRLF);

        for part in &self.parts {
            out.push_str(&format!("{CRLF}--{boundary}{CRLF}"));
            part.write(out)?;
        }
        out.push_str(&format!("{CRLF}--{boundary}--"));

        Ok(())
    }
}

/// A node of the MIME tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Part {
    /// Payload-carrying part.
    Leaf(Leaf),
    /// Container part.
    Multipart(Multipart),
}

impl Part {
    /// Appends this part's headers and content to `out`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedTransferEncoding`] if a leaf with a payload
    /// declares anything other than Base64.
    pub fn write(&self, out: &mut String) -> Result<()> {
        match self {
            Self::Leaf(leaf) => leaf.write(out),
            Self::Multipart(multipart) => multipart.write(out),
        }
    }

    /// Serializes this part to a new string.
    ///
    /// # Errors
    ///
    /// See [`Part::write`].
    pub fn to_mime_string(&self) -> Result<String> {
        let mut out = String::new();
        self.write(&mut out)?;
        Ok(out)
    }
}

impl From<Leaf> for Part {
    fn from(leaf: Leaf) -> Self {
        Self::Leaf(leaf)
    }
}

impl From<Multipart> for Part {
    fn from(multipart: Multipart) -> Self {
        Self::Multipart(multipart)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::unreadable_literal)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn leaf(text: &str) -> Leaf {
        Leaf::text(text, ContentType::text_plain())
    }

    #[test]
    fn test_text_leaf_serialization() {
        let out = Part::from(leaf("Hello")).to_mime_string().unwrap();
        assert_eq!(
            out,
            "Content-Type: text/plain; charset=utf-8\r\n\
             Content-Disposition: inline\r\n\
             Content-Transfer-Encoding: base64\r\n\
             \r\n\
             SGVsbG8="
        );
    }

    #[test]
    fn test_leaf_with_attachment_id() {
        let mut part = leaf("x");
        part.attachment_id = Some("logo".to_string());
        let out = Part::from(part).to_mime_string().unwrap();
        assert!(out.contains("Content-Transfer-Encoding: base64\r\nX-Attachment-Id: logo\r\n\r\n"));
    }

    #[test]
    fn test_leaf_unsupported_encoding() {
        let mut part = leaf("x");
        part.transfer_encoding = Some(TransferEncoding::QuotedPrintable);
        let err = Part::from(part).to_mime_string().unwrap_err();
        assert!(matches!(
            err,
            Error::UnsupportedTransferEncoding(Some(TransferEncoding::QuotedPrintable))
        ));

        let mut part = leaf("x");
        part.transfer_encoding = None;
        assert!(matches!(
            Part::from(part).to_mime_string(),
            Err(Error::UnsupportedTransferEncoding(None))
        ));
    }

    #[test]
    fn test_leaf_without_body_needs_no_encoding() {
        let part = Leaf {
            content_type: ContentType::text_plain(),
            disposition: None,
            transfer_encoding: Some(TransferEncoding::SevenBit),
            attachment_id: None,
            body: None,
        };
        let out = Part::from(part).to_mime_string().unwrap();
        assert!(out.ends_with("Content-Transfer-Encoding: 7bit\r\n\r\n"));
    }

    #[test]
    fn test_disposition_parameter_order() {
        let date = Utc.with_ymd_and_hms(2024, 3, 5, 14, 7, 9).unwrap();
        let disposition = ContentDisposition {
            kind: DispositionKind::Attachment,
            filename: Some("report.pdf".to_string()),
            size: Some(1024),
            creation_date: Some(date),
            modification_date: Some(date),
        };

        assert_eq!(
            disposition.value(),
            "attachment; filename=\"report.pdf\"; size=1024; \
             creation-date=\"Tue, 05 Mar 2024 14:07:09 +0000\"; \
             modification-date=\"Tue, 05 Mar 2024 14:07:09 +0000\""
        );
    }

    #[test]
    fn test_disposition_encodes_non_ascii_filename() {
        let mut disposition = ContentDisposition::new(DispositionKind::Other("x-custom".into()));
        disposition.filename = Some("résumé.txt".to_string());
        let value = disposition.value();
        assert!(value.starts_with("x-custom; filename=\"=?UTF-8?B?"));
    }

    #[test]
    fn test_leaf_rejects_line_breaks_in_headers() {
        let mut custom = leaf("x");
        custom.disposition = Some(ContentDisposition::new(DispositionKind::Other(
            "inline\r\n.\r\nQUIT".into(),
        )));
        assert!(matches!(
            Part::from(custom).to_mime_string(),
            Err(Error::InvalidHeaderValue { name: "Content-Disposition", .. })
        ));

        let mut tagged = leaf("x");
        tagged.attachment_id = Some("logo\nX-Injected: 1".into());
        assert!(matches!(
            Part::from(tagged).to_mime_string(),
            Err(Error::InvalidHeaderValue { name: "X-Attachment-Id", .. })
        ));

        let mut typed = leaf("x");
        typed.content_type = ContentType::new("text", "plain\r\nBcc: evil@example.org");
        assert!(matches!(
            Part::from(typed).to_mime_string(),
            Err(Error::InvalidHeaderValue { name: "Content-Type", .. })
        ));
    }

    #[test]
    fn test_multipart_boundaries_are_fresh() {
        let a = Multipart::new(MultipartKind::Mixed, leaf("a"));
        let b = Multipart::new(MultipartKind::Mixed, leaf("a"));
        assert_ne!(a.boundary(), b.boundary());
        assert_eq!(a.boundary().len(), 32);
        assert!(a.boundary().chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_mixed_multipart_delimiters() {
        let n = 3;
        let mut multipart = Multipart::new(MultipartKind::Mixed, leaf("0"));
        for i in 1..n {
            multipart.push(leaf(&i.to_string()));
        }
        let boundary = multipart.boundary().to_string();
        let out = Part::from(multipart).to_mime_string().unwrap();

        let delimiters: Vec<&str> = out
            .split(CRLF)
            .filter(|line| line.starts_with(&format!("--{boundary}")))
            .collect();
        assert_eq!(delimiters.len(), n + 1);
        assert!(delimiters[..n].iter().all(|l| *l == format!("--{boundary}")));
        assert_eq!(delimiters[n], format!("--{boundary}--"));

        assert!(out.starts_with(&format!(
            "Content-Type: multipart/mixed; boundary={boundary}\r\n\r\n\r\n--{boundary}\r\n"
        )));
        assert!(out.ends_with(&format!("\r\n--{boundary}--")));
    }

    #[test]
    fn test_nested_multipart() {
        let alternative = Multipart::new(MultipartKind::Alternative, leaf("plain"))
            .with_part(Leaf::text("<p>html</p>", ContentType::text_html()));
        let inner = alternative.boundary().to_string();
        let related = Multipart::new(MultipartKind::Related, alternative);
        let outer = related.boundary().to_string();

        let out = Part::from(related).to_mime_string().unwrap();
        let inner_start = out.find(&format!("boundary={inner}\r\n")).unwrap();
        let inner_end = out.find(&format!("--{inner}--")).unwrap();
        let outer_end = out.find(&format!("--{outer}--")).unwrap();

        assert!(out.starts_with("Content-Type: multipart/related"));
        assert!(inner_start < inner_end && inner_end < outer_end);
        assert!(out.contains("Content-Type: text/html; charset=utf-8"));
    }
}
