//! Header and payload encoding utilities.
//!
//! Supports Base64 payloads (RFC 2045), RFC 2047 encoded-words for
//! non-ASCII header text, and header folding (RFC 5322 section 2.2.3).

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

/// Line terminator used everywhere on the wire.
pub const CRLF: &str = "\r\n";

/// Target width for folded header lines.
pub const FOLD_WIDTH: usize = 78;

/// Hard limit for a single line, excluding the CRLF (RFC 5322 section 2.1.1).
pub const MAX_LINE_LENGTH: usize = 998;

/// Maximum length of a Base64 payload line (RFC 2045 section 6.8).
pub const BASE64_LINE_LENGTH: usize = 76;

/// UTF-8 bytes carried by one encoded-word.
///
/// 39 bytes become 52 Base64 characters, so a word is 64 characters long and
/// `Subject: ` plus one word still fits in [`FOLD_WIDTH`].
pub const ENCODED_WORD_BUDGET: usize = 39;

/// Returns `true` if `value` may appear inside a header line.
///
/// Control characters other than tab are refused: a bare CR or LF would end
/// the header early and could forge the `CRLF.CRLF` end-of-data marker.
#[must_use]
pub fn is_header_safe(value: &str) -> bool {
    !value.chars().any(|c| c.is_control() && c != '\t')
}

/// Encodes data as Base64.
#[must_use]
pub fn encode_base64(data: &[u8]) -> String {
    STANDARD.encode(data)
}

/// Encodes data as Base64, broken into CRLF-separated lines of at most
/// [`BASE64_LINE_LENGTH`] characters. No trailing CRLF is emitted.
#[must_use]
pub fn encode_base64_lines(data: &[u8]) -> String {
    let encoded = STANDARD.encode(data);
    let mut result = String::with_capacity(encoded.len() + encoded.len() / BASE64_LINE_LENGTH * 2);

    // Base64 output is ASCII, every index is a char boundary.
    let mut rest = encoded.as_str();
    while rest.len() > BASE64_LINE_LENGTH {
        let (line, tail) = rest.split_at(BASE64_LINE_LENGTH);
        result.push_str(line);
        result.push_str(CRLF);
        rest = tail;
    }
    result.push_str(rest);

    result
}

/// Decodes Base64 data, ignoring line breaks.
///
/// # Errors
///
/// Returns an error if the input is not valid Base64.
pub fn decode_base64(data: &str) -> std::result::Result<Vec<u8>, base64::DecodeError> {
    let cleaned: String = data.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    STANDARD.decode(cleaned)
}

/// Returns true if `text` cannot be placed in a header verbatim.
///
/// Safe bytes are tab and printable ASCII except `=`, which starts an
/// encoded-word and would make the value ambiguous.
#[must_use]
pub fn requires_encoding(text: &str) -> bool {
    text.bytes()
        .any(|b| !matches!(b, b'\t' | 0x20..=0x3C | 0x3E..=0x7E))
}

/// Encodes a header value as RFC 2047 encoded-words if it needs it.
///
/// With `force` the value is always encoded. Otherwise safe values are
/// returned unchanged. Encoded values become one or more
/// `=?UTF-8?B?...?=` words joined by single spaces; each word carries at
/// most [`ENCODED_WORD_BUDGET`] bytes and never splits a character.
#[must_use]
pub fn encode_header_value(text: &str, force: bool) -> String {
    if !force && !requires_encoding(text) {
        return text.to_string();
    }

    encoded_word_chunks(text)
        .into_iter()
        .map(|chunk| format!("=?UTF-8?B?{}?=", STANDARD.encode(chunk.as_bytes())))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Splits `text` into runs of whole characters within the word budget.
fn encoded_word_chunks(text: &str) -> Vec<&str> {
    let mut chunks = Vec::new();
    let mut start = 0;

    for (index, ch) in text.char_indices() {
        if index > start && index + ch.len_utf8() - start > ENCODED_WORD_BUDGET {
            chunks.push(&text[start..index]);
            start = index;
        }
    }
    if start < text.len() {
        chunks.push(&text[start..]);
    }

    chunks
}

/// Renders `name: value` as one or more CRLF-terminated lines.
///
/// Values that fit in [`FOLD_WIDTH`] are emitted on one line. Longer values
/// are split on `separator` and rebuilt, starting a continuation line (CRLF
/// plus one space) before any token that would overflow the current line.
/// A token longer than [`MAX_LINE_LENGTH`] cannot be emitted legally and is
/// dropped.
#[must_use]
pub fn fold_header(name: &str, value: &str, separator: char) -> String {
    let mut result = String::with_capacity(name.len() + value.len() + 8);
    result.push_str(name);
    result.push_str(": ");

    if name.len() + 2 + value.len() <= FOLD_WIDTH {
        result.push_str(value);
        result.push_str(CRLF);
        return result;
    }

    let separator_len = separator.len_utf8();
    let mut line_length = name.len() + 2;
    let mut first = true;

    for token in value.split(separator) {
        if token.is_empty() {
            continue;
        }
        if token.len() + 1 > MAX_LINE_LENGTH {
            tracing::warn!(
                header = name,
                length = token.len(),
                "Dropping header token that exceeds the line limit"
            );
            continue;
        }

        if first {
            result.push_str(token);
            line_length += token.len();
            first = false;
        } else if line_length + separator_len + token.len() <= FOLD_WIDTH {
            result.push(separator);
            result.push_str(token);
            line_length += separator_len + token.len();
        } else {
            if !separator.is_whitespace() {
                result.push(separator);
            }
            result.push_str(CRLF);
            result.push(' ');
            result.push_str(token);
            line_length = 1 + token.len();
        }
    }

    result.push_str(CRLF);
    result
}

/// Decodes a single `=?charset?B?...?=` word back into text.
///
/// Only the `B` encoding is understood, which is all [`encode_header_value`]
/// produces. Returns `None` for anything else or for a corrupt payload.
#[must_use]
pub fn decode_encoded_word(word: &str) -> Option<String> {
    let inner = word.strip_prefix("=?")?.strip_suffix("?=")?;

    let mut parts = inner.splitn(3, '?');
    let (_charset, encoding, payload) = (parts.next()?, parts.next()?, parts.next()?);
    if !encoding.eq_ignore_ascii_case("B") {
        return None;
    }

    let bytes = decode_base64(payload).ok()?;
    String::from_utf8(bytes).ok()
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn decode_words(encoded: &str) -> String {
        encoded
            .split(' ')
            .map(|word| {
                assert!(word.starts_with("=?UTF-8?B?") && word.ends_with("?="), "{word}");
                decode_encoded_word(word).unwrap()
            })
            .collect()
    }

    #[test]
    fn test_base64_encode_decode() {
        let data = b"Hello, World!";
        let encoded = encode_base64(data);
        assert_eq!(encoded, "SGVsbG8sIFdvcmxkIQ==");

        let decoded = decode_base64(&encoded).unwrap();
        assert_eq!(decoded, data);
    }

    #[test]
    fn test_base64_lines_wrap_at_76() {
        let data = vec![0xAB_u8; 200];
        let encoded = encode_base64_lines(&data);
        let lines: Vec<&str> = encoded.split(CRLF).collect();

        assert_eq!(lines.len(), 4);
        assert!(lines[..3].iter().all(|l| l.len() == BASE64_LINE_LENGTH));
        assert!(!encoded.ends_with(CRLF));
        assert_eq!(decode_base64(&encoded).unwrap(), data);
    }

    #[test]
    fn test_base64_lines_short_payload() {
        assert_eq!(encode_base64_lines(b"gnampf"), "Z25hbXBm");
        assert_eq!(encode_base64_lines(b""), "");
    }

    #[test]
    fn test_requires_encoding() {
        assert!(!requires_encoding("Hello, World!"));
        assert!(!requires_encoding("tab\tseparated"));
        assert!(requires_encoding("a=b"));
        assert!(requires_encoding("Héllo"));
        assert!(requires_encoding("line\r\nbreak"));
    }

    #[test]
    fn test_encode_header_value_passthrough() {
        assert_eq!(encode_header_value("Quarterly report", false), "Quarterly report");
    }

    #[test]
    fn test_encode_header_value_forced() {
        assert_eq!(encode_header_value("Hi", true), "=?UTF-8?B?SGk=?=");
    }

    #[test]
    fn test_encode_header_value_non_ascii() {
        let encoded = encode_header_value("Héllo", false);
        assert_eq!(encoded, "=?UTF-8?B?SMOpbGxv?=");
    }

    #[test]
    fn test_encode_header_value_chunks_on_char_boundaries() {
        // 30 two-byte characters: 60 bytes, more than one word.
        let text = "ä".repeat(30);
        let encoded = encode_header_value(&text, false);
        let words: Vec<&str> = encoded.split(' ').collect();

        assert_eq!(words.len(), 2);
        for word in &words {
            let decoded = decode_encoded_word(word).unwrap();
            assert!(decoded.len() <= ENCODED_WORD_BUDGET);
        }
        assert_eq!(decode_words(&encoded), text);
    }

    #[test]
    fn test_fold_short_value_single_line() {
        assert_eq!(fold_header("Subject", "Hello", ' '), "Subject: Hello\r\n");
    }

    #[test]
    fn test_fold_long_value() {
        let value = "word ".repeat(30);
        let value = value.trim_end();
        let folded = fold_header("Subject", value, ' ');
        let lines: Vec<&str> = folded.trim_end_matches(CRLF).split(CRLF).collect();

        assert!(lines.len() > 1);
        assert!(lines.iter().all(|l| l.len() <= FOLD_WIDTH));
        assert!(lines[1..].iter().all(|l| l.starts_with(' ') && !l.starts_with("  ")));

        // Unfolding restores the value.
        let unfolded = folded.trim_end_matches(CRLF).replace("\r\n", "");
        assert_eq!(unfolded, format!("Subject: {value}"));
    }

    #[test]
    fn test_fold_with_comma_separator() {
        let value = (0..10)
            .map(|i| format!("<recipient{i}@example.com>"))
            .collect::<Vec<_>>()
            .join(",");
        let folded = fold_header("To", &value, ',');

        for line in folded.trim_end_matches(CRLF).split(CRLF) {
            assert!(line.len() <= FOLD_WIDTH + 1);
        }
        assert!(folded.contains(",\r\n <recipient"));
    }

    #[test]
    fn test_fold_drops_oversized_token() {
        let huge = "x".repeat(MAX_LINE_LENGTH + 10);
        let value = format!("before {huge} after {}", "pad ".repeat(20));
        let folded = fold_header("Subject", &value, ' ');

        assert!(!folded.contains(&huge));
        assert!(folded.starts_with("Subject: before after"));
    }

    #[test]
    fn test_fold_skips_repeated_separators() {
        let value = format!("{} word tail", "word ".repeat(14));
        let folded = fold_header("Subject", &value, ' ');
        let lines: Vec<&str> = folded.trim_end_matches(CRLF).split(CRLF).collect();

        assert!(lines.len() > 1);
        assert!(lines[1..].iter().all(|l| l.starts_with(' ') && !l.starts_with("  ")));
        assert!(folded.contains("tail"));
    }

    #[test]
    fn test_header_safe() {
        assert!(is_header_safe("logo-1@example.com"));
        assert!(is_header_safe("tab\tseparated"));
        assert!(!is_header_safe("logo\r\n.\r\nQUIT"));
        assert!(!is_header_safe("bare\nfeed"));
        assert!(!is_header_safe("nul\0byte"));
    }

    #[test]
    fn test_decode_encoded_word_rejects_plain_text() {
        assert_eq!(decode_encoded_word("plain"), None);
        assert_eq!(decode_encoded_word("=?UTF-8?Q?abc?="), None);
    }

    proptest! {
        #[test]
        fn prop_safe_strings_unchanged(text in "[\t -<>-~]{0,120}") {
            prop_assert!(!requires_encoding(&text));
            prop_assert_eq!(encode_header_value(&text, false), text);
        }

        #[test]
        fn prop_encoded_words_round_trip(prefix in "[a-z ]{0,20}", text in "\\PC{1,80}") {
            let text = format!("{prefix}é{text}");
            let encoded = encode_header_value(&text, false);
            for word in encoded.split(' ') {
                prop_assert!(word.starts_with("=?UTF-8?B?"));
                prop_assert!(word.ends_with("?="));
            }
            prop_assert_eq!(decode_words(&encoded), text);
        }

        #[test]
        fn prop_short_ascii_values_not_folded(value in "[!-~][ -~]{0,50}") {
            let folded = fold_header("Subject", &value, ' ');
            prop_assert_eq!(folded.matches(CRLF).count(), 1);
            prop_assert_eq!(folded, format!("Subject: {value}\r\n"));
        }

        #[test]
        fn prop_folded_lines_fit(tokens in proptest::collection::vec("[!-~]{1,40}", 10..40)) {
            let value = tokens.join(" ");
            let folded = fold_header("Subject", &value, ' ');
            let body = folded.strip_suffix(CRLF).unwrap();
            let lines: Vec<&str> = body.split(CRLF).collect();

            for line in &lines[..lines.len() - 1] {
                prop_assert!(line.len() <= FOLD_WIDTH);
            }
            for line in &lines[1..] {
                prop_assert!(line.starts_with(' '));
                prop_assert!(!line.starts_with("  "));
            }
            prop_assert_eq!(body.replace(CRLF, ""), format!("Subject: {value}"));
        }
    }
}
