//! MIME content type handling.

use crate::encoding::is_header_safe;
use crate::error::{Error, Result};
use std::fmt;

/// Characters that force a parameter value into a quoted-string.
const TSPECIALS: &str = "()<>@,;:\\\"/[]?=";

/// MIME content type with parameters.
///
/// Parameters keep their insertion order so the rendered header is stable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentType {
    /// Main type (e.g., "text", "image", "multipart").
    pub main_type: String,
    /// Subtype (e.g., "plain", "html", "jpeg").
    pub sub_type: String,
    /// Parameters (e.g., charset=utf-8, boundary=xxx).
    pub parameters: Vec<(String, String)>,
}

impl ContentType {
    /// Creates a new content type.
    #[must_use]
    pub fn new(main_type: impl Into<String>, sub_type: impl Into<String>) -> Self {
        Self {
            main_type: main_type.into(),
            sub_type: sub_type.into(),
            parameters: Vec::new(),
        }
    }

    /// Creates a `text/plain; charset=utf-8` content type.
    #[must_use]
    pub fn text_plain() -> Self {
        Self::new("text", "plain").with_parameter("charset", "utf-8")
    }

    /// Creates a `text/html; charset=utf-8` content type.
    #[must_use]
    pub fn text_html() -> Self {
        Self::new("text", "html").with_parameter("charset", "utf-8")
    }

    /// Creates a `multipart/<sub_type>` content type with a boundary.
    #[must_use]
    pub fn multipart(sub_type: impl Into<String>, boundary: impl Into<String>) -> Self {
        Self::new("multipart", sub_type).with_parameter("boundary", boundary)
    }

    /// Sets a parameter, replacing any existing value for the same key.
    #[must_use]
    pub fn with_parameter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let key = key.into();
        let value = value.into();
        match self
            .parameters
            .iter_mut()
            .find(|(k, _)| k.eq_ignore_ascii_case(&key))
        {
            Some((_, existing)) => *existing = value,
            None => self.parameters.push((key, value)),
        }
        self
    }

    /// Returns the `type/subtype` essence without parameters.
    #[must_use]
    pub fn essence(&self) -> String {
        format!("{}/{}", self.main_type, self.sub_type)
    }

    /// Parses a content type string.
    ///
    /// Format: `type/subtype; param1=value1; param2=value2`
    ///
    /// # Errors
    ///
    /// Returns an error if the type or subtype is missing or empty, or if the
    /// string contains a line break or other control character.
    pub fn parse(s: &str) -> Result<Self> {
        if !is_header_safe(s) {
            return Err(Error::InvalidContentType(format!(
                "Control characters in {s:?}"
            )));
        }

        let mut parts = s.split(';');

        let type_str = parts.next().unwrap_or_default().trim();
        let (main_type, sub_type) = type_str
            .split_once('/')
            .ok_or_else(|| Error::InvalidContentType(format!("Missing subtype in {s:?}")))?;

        let main_type = main_type.trim().to_lowercase();
        let sub_type = sub_type.trim().to_lowercase();
        if main_type.is_empty() || sub_type.is_empty() {
            return Err(Error::InvalidContentType(format!(
                "Empty type or subtype in {s:?}"
            )));
        }

        let mut content_type = Self::new(main_type, sub_type);

        for param in parts {
            if let Some((key, value)) = param.trim().split_once('=') {
                let key = key.trim().to_lowercase();
                let value = value.trim().trim_matches('"');
                content_type = content_type.with_parameter(key, value);
            }
        }

        Ok(content_type)
    }
}

impl std::str::FromStr for ContentType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let main = &self.main_type;
        let sub = &self.sub_type;
        write!(f, "{main}/{sub}")?;

        for (key, value) in &self.parameters {
            if value.is_empty() || value.contains(|c: char| c.is_whitespace() || TSPECIALS.contains(c))
            {
                let escaped = value.replace('\\', "\\\\").replace('"', "\\\"");
                write!(f, "; {key}=\"{escaped}\"")?;
            } else {
                write!(f, "; {key}={value}")?;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_content_type_new() {
        let ct = ContentType::new("text", "plain");
        assert_eq!(ct.main_type, "text");
        assert_eq!(ct.sub_type, "plain");
        assert!(ct.parameters.is_empty());
    }

    #[test]
    fn test_text_plain() {
        let ct = ContentType::text_plain();
        assert_eq!(ct.essence(), "text/plain");
        assert_eq!(ct.to_string(), "text/plain; charset=utf-8");
    }

    #[test]
    fn test_multipart() {
        let ct = ContentType::multipart("mixed", "boundary123");
        assert_eq!(ct.main_type, "multipart");
        assert_eq!(ct.sub_type, "mixed");
        assert_eq!(ct.to_string(), "multipart/mixed; boundary=boundary123");
    }

    #[test]
    fn test_content_type_parse() {
        let ct = ContentType::parse("Text/Plain; charset=utf-8").unwrap();
        assert_eq!(ct.main_type, "text");
        assert_eq!(ct.sub_type, "plain");
        assert_eq!(
            ct.parameters,
            vec![("charset".to_string(), "utf-8".to_string())]
        );
    }

    #[test]
    fn test_content_type_parse_quoted() {
        let ct = ContentType::parse("multipart/mixed; boundary=\"----=_Part_123\"").unwrap();
        assert_eq!(ct.parameters[0].1, "----=_Part_123");
        assert_eq!(
            ct.to_string(),
            "multipart/mixed; boundary=\"----=_Part_123\""
        );
    }

    #[test]
    fn test_content_type_parse_rejects_incomplete() {
        assert!(ContentType::parse("text").is_err());
        assert!(ContentType::parse("text/").is_err());
        assert!(ContentType::parse("/plain").is_err());
        assert!(ContentType::parse("").is_err());
    }

    #[test]
    fn test_content_type_parse_rejects_line_breaks() {
        for input in [
            "application/x\r\n.\r\nQUIT",
            "text\n/plain",
            "text/plain; name=\"a\r\nb\"",
            "image/png\0",
        ] {
            assert!(
                matches!(ContentType::parse(input), Err(Error::InvalidContentType(_))),
                "accepted {input:?}"
            );
        }
    }

    #[test]
    fn test_content_type_display_quotes_specials() {
        let ct = ContentType::multipart("alternative", "a=b");
        assert_eq!(ct.to_string(), "multipart/alternative; boundary=\"a=b\"");
    }

    #[test]
    fn test_content_type_with_parameter_keeps_order() {
        let ct = ContentType::new("text", "plain")
            .with_parameter("format", "flowed")
            .with_parameter("charset", "iso-8859-1")
            .with_parameter("Charset", "utf-8");

        assert_eq!(ct.to_string(), "text/plain; format=flowed; charset=utf-8");
    }
}
