//! SMTP reply decoder.

use crate::error::{Error, Result};
use crate::types::{Reply, ReplyCode};

/// Accumulates reply lines into complete replies.
///
/// SMTP replies can be single-line or multi-line:
/// - Single: `250 OK`
/// - Multi: `250-First line`, `250-Second line`, `250 Last line`
///
/// Lines are fed without their CRLF. Continuation lines are buffered until the
/// final line arrives; the buffer is cleared for every completed reply.
#[derive(Debug, Default)]
pub struct ReplyDecoder {
    lines: Vec<String>,
}

impl ReplyDecoder {
    /// Creates an empty decoder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds one line and returns the reply it completes, if any.
    ///
    /// The fourth byte is the separator: `-` continues the reply, anything
    /// else (normally a space) ends it. A line of just the code is final.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedReply`] if the line does not start with three
    /// ASCII digits.
    pub fn decode(&mut self, line: &[u8]) -> Result<Option<Reply>> {
        let code = parse_code(line)?;

        let (continuation, text) = match line.get(3) {
            Some(b'-') => (true, &line[4..]),
            Some(_) => (false, &line[4..]),
            None => (false, &line[3..]),
        };
        self.lines.push(String::from_utf8_lossy(text).into_owned());

        if continuation {
            return Ok(None);
        }

        Ok(Some(Reply::new(code, std::mem::take(&mut self.lines))))
    }

    /// Returns true if a multi-line reply is partially buffered.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        !self.lines.is_empty()
    }
}

fn parse_code(line: &[u8]) -> Result<ReplyCode> {
    match line {
        [a, b, c, ..] if a.is_ascii_digit() && b.is_ascii_digit() && c.is_ascii_digit() => {
            let code = u16::from(a - b'0') * 100 + u16::from(b - b'0') * 10 + u16::from(c - b'0');
            Ok(ReplyCode::new(code))
        }
        _ => Err(Error::MalformedReply(
            String::from_utf8_lossy(line).into_owned(),
        )),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::redundant_clone, clippy::manual_string_new, clippy::needless_collect, clippy::unreadable_literal, clippy::used_underscore_items, clippy::similar_names)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_single_line_reply() {
        let mut decoder = ReplyDecoder::new();
        let reply = decoder.decode(b"250 OK").unwrap().unwrap();
        assert_eq!(reply.code.as_u16(), 250);
        assert_eq!(reply.text, vec!["OK"]);
        assert!(reply.is_success());
        assert!(!decoder.is_pending());
    }

    #[test]
    fn test_multi_line_reply() {
        let mut decoder = ReplyDecoder::new();
        assert!(decoder.decode(b"250-smtp.example.com").unwrap().is_none());
        assert!(decoder.decode(b"250-STARTTLS").unwrap().is_none());
        assert!(decoder.is_pending());

        let reply = decoder.decode(b"250 AUTH PLAIN LOGIN").unwrap().unwrap();
        assert_eq!(reply.code.as_u16(), 250);
        assert_eq!(
            reply.text,
            vec!["smtp.example.com", "STARTTLS", "AUTH PLAIN LOGIN"]
        );
    }

    #[test]
    fn test_replies_do_not_leak_lines() {
        let mut decoder = ReplyDecoder::new();
        decoder.decode(b"220-first").unwrap();
        decoder.decode(b"220 second").unwrap().unwrap();

        let reply = decoder.decode(b"250 third").unwrap().unwrap();
        assert_eq!(reply.text, vec!["third"]);
    }

    #[test]
    fn test_code_only_line() {
        let mut decoder = ReplyDecoder::new();
        let reply = decoder.decode(b"221").unwrap().unwrap();
        assert_eq!(reply.code, ReplyCode::CLOSING);
        assert_eq!(reply.text, vec![""]);
    }

    #[test]
    fn test_text_without_separator() {
        let mut decoder = ReplyDecoder::new();
        let reply = decoder.decode(b"250xOK").unwrap().unwrap();
        assert_eq!(reply.text, vec!["OK"]);
    }

    #[test]
    fn test_malformed_replies() {
        let mut decoder = ReplyDecoder::new();
        assert!(matches!(decoder.decode(b"25"), Err(Error::MalformedReply(_))));
        assert!(matches!(decoder.decode(b"ABC OK"), Err(Error::MalformedReply(_))));
        assert!(matches!(decoder.decode(b""), Err(Error::MalformedReply(_))));
        assert!(matches!(decoder.decode(b"2x0 OK"), Err(Error::MalformedReply(_))));
    }

    proptest! {
        #[test]
        fn prop_multi_line_replies(
            code in 200u16..600,
            lines in proptest::collection::vec("[ -~]{0,40}", 1..8),
        ) {
            let mut decoder = ReplyDecoder::new();
            let last = lines.len() - 1;

            for (i, text) in lines.iter().enumerate() {
                let separator = if i == last { ' ' } else { '-' };
                let line = format!("{code}{separator}{text}");
                let decoded = decoder.decode(line.as_bytes()).unwrap();

                if i == last {
                    let reply = decoded.unwrap();
                    prop_assert_eq!(reply.code.as_u16(), code);
                    prop_assert_eq!(&reply.text, &lines);
                } else {
                    prop_assert!(decoded.is_none());
                }
            }
            prop_assert!(!decoder.is_pending());
        }
    }
}
