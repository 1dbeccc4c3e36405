//! Sans-I/O SMTP session state machine.
//!
//! The [`Protocol`] drives one mail submission from greeting to QUIT without
//! performing any I/O itself. The driver feeds it [`Event`]s (decoded
//! replies, TLS and connection notifications) and carries out the
//! [`Action`] each event produces.
//!
//! # Example
//!
//! ```
//! use bytes::Bytes;
//! use missive_mime::Recipient;
//! use missive_smtp::protocol::{Action, Event, Protocol};
//! use missive_smtp::{Command, Config, Credentials, Envelope, Reply, ReplyCode, Security};
//!
//! let config = Config::new("localhost", Security::None, Credentials::None);
//! let envelope = Envelope::new(
//!     Recipient::new("alice@example.com")?,
//!     [Recipient::new("bob@example.org")?],
//! )?;
//! let mut protocol = Protocol::new(&config, envelope, Bytes::from_static(b"Subject: hi\r\n\r\nhi\r\n."));
//!
//! let greeting = Reply::new(ReplyCode::SERVICE_READY, vec!["ready".into()]);
//! let action = protocol.handle(Event::Reply(greeting));
//! assert!(matches!(action, Some(Action::Send(Command::Ehlo { .. }))));
//! # Ok::<(), missive_smtp::Error>(())
//! ```

#![allow(clippy::missing_const_for_fn)]

mod auth;
mod state;

use std::collections::VecDeque;

use bytes::Bytes;
use missive_mime::Recipient;
use tracing::{debug, warn};

pub use state::State;

use crate::command::Command;
use crate::connection::{Config, Credentials, Security};
use crate::types::{Envelope, Reply};
use crate::{Error, Result};

/// Input to the state machine.
#[derive(Debug)]
pub enum Event {
    /// A complete reply from the server.
    Reply(Reply),
    /// The TLS handshake finished (implicit TLS or after STARTTLS).
    TlsEstablished,
    /// The server closed the connection.
    Closed,
    /// The transport or reply framing failed.
    Failed(Error),
}

/// What the driver must do next.
#[derive(Debug, PartialEq, Eq)]
pub enum Action {
    /// Write this command.
    Send(Command),
    /// Run the TLS handshake on the current connection, then report
    /// [`Event::TlsEstablished`] or [`Event::Failed`].
    UpgradeTls,
    /// Close the connection; the session is over.
    Close,
}

/// SMTP client session for a single message.
///
/// Created fresh for each send and consumed by [`Protocol::into_result`].
#[derive(Debug)]
pub struct Protocol {
    state: State,
    security: Security,
    credentials: Credentials,
    helo_name: String,
    sender: Recipient,
    pending: VecDeque<Recipient>,
    message: Bytes,
    tls_established: bool,
    delivered: bool,
    error: Option<Error>,
}

impl Protocol {
    /// Creates a session waiting for the server greeting.
    #[must_use]
    pub fn new(config: &Config, envelope: Envelope, message: Bytes) -> Self {
        Self {
            state: State::AwaitingGreeting,
            security: config.security,
            credentials: config.credentials.clone(),
            helo_name: config.helo_name().to_string(),
            sender: envelope.sender().clone(),
            pending: envelope.recipients().iter().cloned().collect(),
            message,
            tls_established: false,
            delivered: false,
            error: None,
        }
    }

    /// Returns the current state.
    #[must_use]
    pub fn state(&self) -> State {
        self.state
    }

    /// Returns `true` once the session has finished.
    #[must_use]
    pub fn is_done(&self) -> bool {
        self.state.is_done()
    }

    /// Returns `true` if the server accepted the message.
    #[must_use]
    pub fn is_delivered(&self) -> bool {
        self.delivered
    }

    /// Processes one event and returns the resulting action, if any.
    pub fn handle(&mut self, event: Event) -> Option<Action> {
        match event {
            Event::Reply(reply) => self.handle_reply(reply),
            Event::TlsEstablished => self.handle_tls_established(),
            Event::Closed => self.handle_closed(),
            Event::Failed(error) => self.handle_failure(error),
        }
    }

    /// Returns the outcome of the session.
    ///
    /// # Errors
    ///
    /// Returns the first error recorded, or [`Error::InvalidState`] if the
    /// session ended (or was abandoned) without delivering.
    pub fn into_result(self) -> Result<()> {
        if self.delivered {
            return Ok(());
        }
        Err(self.error.unwrap_or_else(|| {
            Error::InvalidState(format!("Session ended in {:?} without delivery", self.state))
        }))
    }

    fn handle_reply(&mut self, reply: Reply) -> Option<Action> {
        let code = reply.code.as_u16();

        match (self.state, code) {
            (State::Done, _) => None,
            (State::AwaitingQuit, _) => self.finish(),

            (State::AwaitingGreeting, 220) => self.send(self.ehlo(), State::AwaitingIdentity),
            (State::AwaitingGreeting, 554) => self.abort(Error::ServerError(reply)),

            (State::AwaitingIdentity, 200..=299) => {
                if self.security == Security::StartTls && !self.tls_established {
                    self.send(Command::StartTls, State::AwaitingStartTls)
                } else {
                    self.begin_authentication()
                }
            }
            (State::AwaitingIdentity, 500) => {
                let helo = Command::Helo {
                    hostname: self.helo_name.clone(),
                };
                self.send(helo, State::AwaitingIdentity)
            }

            (State::AwaitingStartTls, 220) => {
                self.transition(State::UpgradingToTls);
                Some(Action::UpgradeTls)
            }
            (State::AwaitingStartTls, 501) => self.abort(Error::ServerError(reply)),

            // The stream is mid-handshake, a QUIT could not be read by either side.
            (State::UpgradingToTls, _) => self.fail(Error::Protocol(format!(
                "Reply {code} received during TLS upgrade"
            ))),

            (State::AwaitingAuthentication, 334) => self.answer_challenge(&reply),
            (State::AwaitingAuthentication, 503) => self.abort(Error::InvalidState(
                "Server refused AUTH in the current session state".into(),
            )),

            (State::AwaitingUsername, 334) => match &self.credentials {
                Credentials::Login { password, .. } => {
                    let password = Command::Credential(password.clone());
                    self.send(password, State::AwaitingPassword)
                }
                other => {
                    let mechanism = other.mechanism();
                    self.abort(Error::InvalidState(format!(
                        "Username prompt for {mechanism:?} credentials"
                    )))
                }
            },

            (State::AwaitingPassword, 235) => self.begin_mail_transaction(),
            (State::AwaitingPassword, 535) => self.abort(Error::InvalidCredentials),

            (State::AwaitingMailTransaction, 250) | (State::AwaitingRecipient, 250 | 251) => {
                self.next_recipient()
            }

            (State::AwaitingDataTransaction, 354) => {
                let body = Command::TransferBody(self.message.clone());
                self.send(body, State::AwaitingDataTransfer)
            }
            (State::AwaitingDataTransfer, 250) => {
                self.delivered = true;
                debug!("Message accepted by server");
                self.send(Command::Quit, State::AwaitingQuit)
            }

            _ => self.abort(Error::UnexpectedReply(reply)),
        }
    }

    fn handle_tls_established(&mut self) -> Option<Action> {
        self.tls_established = true;
        if self.state == State::UpgradingToTls {
            self.send(self.ehlo(), State::AwaitingIdentity)
        } else {
            None
        }
    }

    fn handle_closed(&mut self) -> Option<Action> {
        match self.state {
            State::Done => None,
            state if state.may_close() => self.finish(),
            _ => self.fail(Error::ConnectionClosed),
        }
    }

    fn handle_failure(&mut self, error: Error) -> Option<Action> {
        match (self.state, &error) {
            (State::Done, _) => None,
            (State::AwaitingQuit, _) | (_, Error::MalformedReply(_)) => self.fail(error),
            _ => self.abort(error),
        }
    }

    fn begin_authentication(&mut self) -> Option<Action> {
        if self.security.requires_tls() && !self.tls_established {
            return self.abort(Error::ExpectedSecureConnection);
        }

        match self.credentials.mechanism() {
            Some(mechanism) => self.send(Command::Auth { mechanism }, State::AwaitingAuthentication),
            None => self.begin_mail_transaction(),
        }
    }

    fn answer_challenge(&mut self, challenge: &Reply) -> Option<Action> {
        let next = match &self.credentials {
            Credentials::Plain { username, password } => Ok((
                auth::plain_response(username, password),
                State::AwaitingPassword,
            )),
            Credentials::Login { username, .. } => Ok((username.clone(), State::AwaitingUsername)),
            Credentials::CramMd5 { username, password } => {
                auth::cram_md5_response(username, password, challenge)
                    .map(|response| (response, State::AwaitingPassword))
            }
            Credentials::None => Err(Error::InvalidState(
                "Authentication challenge without credentials".into(),
            )),
        };

        match next {
            Ok((response, state)) => self.send(Command::Credential(response), state),
            Err(error) => self.abort(error),
        }
    }

    fn begin_mail_transaction(&mut self) -> Option<Action> {
        let mail_from = Command::MailFrom {
            from: self.sender.clone(),
        };
        self.send(mail_from, State::AwaitingMailTransaction)
    }

    fn next_recipient(&mut self) -> Option<Action> {
        match self.pending.pop_front() {
            Some(to) => self.send(Command::RcptTo { to }, State::AwaitingRecipient),
            None if self.state == State::AwaitingRecipient => {
                self.send(Command::Data, State::AwaitingDataTransaction)
            }
            None => self.abort(Error::InvalidState("No recipients to send".into())),
        }
    }

    fn ehlo(&self) -> Command {
        Command::Ehlo {
            hostname: self.helo_name.clone(),
        }
    }

    fn transition(&mut self, next: State) {
        if self.state != next {
            debug!(from = ?self.state, to = ?next, "SMTP state transition");
        }
        self.state = next;
    }

    fn send(&mut self, command: Command, next: State) -> Option<Action> {
        self.transition(next);
        Some(Action::Send(command))
    }

    /// Records `error` and ends the session politely with QUIT.
    fn abort(&mut self, error: Error) -> Option<Action> {
        warn!(%error, state = ?self.state, "Aborting SMTP session");
        self.record(error);
        self.send(Command::Quit, State::AwaitingQuit)
    }

    /// Records `error` and closes without QUIT.
    fn fail(&mut self, error: Error) -> Option<Action> {
        if self.state != State::AwaitingQuit {
            warn!(%error, state = ?self.state, "Closing SMTP session");
        }
        self.record(error);
        self.finish()
    }

    fn record(&mut self, error: Error) {
        if self.error.is_none() {
            self.error = Some(error);
        } else {
            debug!(%error, "Ignoring error after the first failure");
        }
    }

    fn finish(&mut self) -> Option<Action> {
        self.transition(State::Done);
        Some(Action::Close)
    }
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
    use crate::types::ReplyCode;

    const BODY: &[u8] = b"Subject: test\r\n\r\nhello\r\n.";

    fn config(security: Security, credentials: Credentials) -> Config {
        Config::builder("smtp.example.com")
            .security(security)
            .credentials(credentials)
            .helo_name("client.example.org")
            .build()
    }

    fn protocol(security: Security, credentials: Credentials, recipients: &[&str]) -> Protocol {
        let envelope = Envelope::new(
            Recipient::new("alice@example.com").unwrap(),
            recipients.iter().map(|r| Recipient::new(*r).unwrap()),
        )
        .unwrap();
        Protocol::new(
            &config(security, credentials),
            envelope,
            Bytes::from_static(BODY),
        )
    }

    fn reply(code: u16, text: &str) -> Event {
        Event::Reply(Reply::new(ReplyCode::new(code), vec![text.to_string()]))
    }

    fn sent(action: Option<Action>) -> Vec<u8> {
        match action {
            Some(Action::Send(command)) => command.serialize(),
            other => panic!("expected a command, got {other:?}"),
        }
    }

    fn sent_str(action: Option<Action>) -> String {
        String::from_utf8(sent(action)).unwrap()
    }

    fn login(username: &str, password: &str) -> Credentials {
        Credentials::Login {
            username: username.into(),
            password: password.into(),
        }
    }

    #[test]
    fn happy_path_plaintext_no_auth() {
        let mut p = protocol(Security::None, Credentials::None, &["bob@example.org"]);

        assert_eq!(sent_str(p.handle(reply(220, "ready"))), "EHLO client.example.org\r\n");
        assert_eq!(p.state(), State::AwaitingIdentity);
        assert_eq!(sent_str(p.handle(reply(250, "hello"))), "MAIL FROM:<alice@example.com>\r\n");
        assert_eq!(sent_str(p.handle(reply(250, "ok"))), "RCPT TO:<bob@example.org>\r\n");
        assert_eq!(sent_str(p.handle(reply(250, "ok"))), "DATA\r\n");
        assert_eq!(sent(p.handle(reply(354, "go ahead"))), [BODY, &b"\r\n"[..]].concat());
        assert_eq!(sent_str(p.handle(reply(250, "queued"))), "QUIT\r\n");
        assert!(p.is_delivered());
        assert_eq!(p.handle(reply(221, "bye")), Some(Action::Close));
        assert!(p.is_done());

        assert!(p.into_result().is_ok());
    }

    #[test]
    fn recipients_are_sent_in_order() {
        let mut p = protocol(
            Security::None,
            Credentials::None,
            &["a@example.org", "b@example.org", "c@example.org"],
        );
        p.handle(reply(220, ""));
        p.handle(reply(250, ""));

        let mut rcpts = Vec::new();
        for _ in 0..3 {
            rcpts.push(sent_str(p.handle(reply(250, ""))));
        }
        assert_eq!(
            rcpts,
            [
                "RCPT TO:<a@example.org>\r\n",
                "RCPT TO:<b@example.org>\r\n",
                "RCPT TO:<c@example.org>\r\n"
            ]
        );
        assert_eq!(sent_str(p.handle(reply(251, "will forward"))), "DATA\r\n");
    }

    #[test]
    fn rejected_recipient_quits() {
        let mut p = protocol(
            Security::None,
            Credentials::None,
            &["bob@example.org", "carol@example.org"],
        );
        p.handle(reply(220, ""));
        p.handle(reply(250, ""));
        p.handle(reply(250, ""));

        assert_eq!(sent_str(p.handle(reply(550, "no such user"))), "QUIT\r\n");
        assert_eq!(p.state(), State::AwaitingQuit);
        assert_eq!(p.handle(reply(221, "bye")), Some(Action::Close));

        let err = p.into_result().unwrap_err();
        match err {
            Error::UnexpectedReply(reply) => assert_eq!(reply.code, ReplyCode::MAILBOX_UNAVAILABLE),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn greeting_rejection() {
        let mut p = protocol(Security::None, Credentials::None, &["bob@example.org"]);
        assert_eq!(sent_str(p.handle(reply(554, "go away"))), "QUIT\r\n");
        p.handle(reply(221, ""));
        assert!(matches!(p.into_result(), Err(Error::ServerError(_))));
    }

    #[test]
    fn ehlo_fallback_to_helo() {
        let mut p = protocol(Security::None, Credentials::None, &["bob@example.org"]);
        p.handle(reply(220, ""));
        assert_eq!(sent_str(p.handle(reply(500, "what?"))), "HELO client.example.org\r\n");
        assert_eq!(p.state(), State::AwaitingIdentity);
        assert_eq!(sent_str(p.handle(reply(250, ""))), "MAIL FROM:<alice@example.com>\r\n");
    }

    #[test]
    fn starttls_then_auth_plain() {
        let creds = Credentials::Plain {
            username: "user".into(),
            password: "pass".into(),
        };
        let mut p = protocol(Security::StartTls, creds, &["bob@example.org"]);

        assert_eq!(sent_str(p.handle(reply(220, ""))), "EHLO client.example.org\r\n");
        assert_eq!(sent_str(p.handle(reply(250, "STARTTLS"))), "STARTTLS\r\n");
        assert_eq!(p.handle(reply(220, "go ahead")), Some(Action::UpgradeTls));
        assert_eq!(p.state(), State::UpgradingToTls);
        assert_eq!(sent_str(p.handle(Event::TlsEstablished)), "EHLO client.example.org\r\n");
        assert_eq!(sent_str(p.handle(reply(250, "AUTH PLAIN"))), "AUTH PLAIN\r\n");
        assert_eq!(sent_str(p.handle(reply(334, ""))), "AHVzZXIAcGFzcw==\r\n");
        assert_eq!(p.state(), State::AwaitingPassword);
        assert_eq!(sent_str(p.handle(reply(235, "ok"))), "MAIL FROM:<alice@example.com>\r\n");
    }

    #[test]
    fn starttls_refused() {
        let mut p = protocol(Security::StartTls, Credentials::None, &["bob@example.org"]);
        p.handle(reply(220, ""));
        p.handle(reply(250, ""));
        assert_eq!(sent_str(p.handle(reply(501, "no"))), "QUIT\r\n");
        p.handle(Event::Closed);
        assert!(matches!(p.into_result(), Err(Error::ServerError(_))));
    }

    #[test]
    fn starttls_unavailable_never_authenticates() {
        let creds = Credentials::Plain {
            username: "user".into(),
            password: "pass".into(),
        };
        let mut p = protocol(Security::StartTls, creds, &["bob@example.org"]);
        p.handle(reply(220, ""));
        assert_eq!(sent_str(p.handle(reply(250, "STARTTLS"))), "STARTTLS\r\n");
        assert_eq!(sent_str(p.handle(reply(454, "TLS not available"))), "QUIT\r\n");
        assert_eq!(p.state(), State::AwaitingQuit);
        assert_eq!(p.handle(reply(221, "bye")), Some(Action::Close));

        let err = p.into_result().unwrap_err();
        assert!(matches!(err, Error::UnexpectedReply(_)));
        assert_eq!(err.reply().unwrap().code.as_u16(), 454);
        assert!(err.is_transient());
    }

    #[test]
    fn failed_handshake_never_authenticates() {
        let mut p = protocol(Security::StartTls, login("user", "pw"), &["bob@example.org"]);
        p.handle(reply(220, ""));
        p.handle(reply(250, ""));
        assert_eq!(p.handle(reply(220, "")), Some(Action::UpgradeTls));

        let failure = Error::Io(std::io::Error::other("handshake failed"));
        assert_eq!(sent_str(p.handle(Event::Failed(failure))), "QUIT\r\n");
        assert_eq!(p.handle(Event::Closed), Some(Action::Close));
        assert!(matches!(p.into_result(), Err(Error::Io(_))));
    }

    #[test]
    fn implicit_tls_without_handshake_refuses_auth() {
        let mut p = protocol(Security::Implicit, login("user", "pw"), &["bob@example.org"]);
        p.handle(reply(220, ""));
        assert_eq!(sent_str(p.handle(reply(250, ""))), "QUIT\r\n");
        p.handle(reply(221, ""));
        assert!(matches!(p.into_result(), Err(Error::ExpectedSecureConnection)));
    }

    #[test]
    fn implicit_tls_with_handshake() {
        let mut p = protocol(Security::Implicit, login("user", "pw"), &["bob@example.org"]);
        assert_eq!(p.handle(Event::TlsEstablished), None);
        assert_eq!(p.state(), State::AwaitingGreeting);

        p.handle(reply(220, ""));
        assert_eq!(sent_str(p.handle(reply(250, ""))), "AUTH LOGIN\r\n");
        assert_eq!(sent_str(p.handle(reply(334, "VXNlcm5hbWU6"))), "dXNlcg==\r\n");
        assert_eq!(p.state(), State::AwaitingUsername);
        assert_eq!(sent_str(p.handle(reply(334, "UGFzc3dvcmQ6"))), "cHc=\r\n");
        assert_eq!(p.state(), State::AwaitingPassword);
        assert_eq!(sent_str(p.handle(reply(235, ""))), "MAIL FROM:<alice@example.com>\r\n");
    }

    #[test]
    fn cram_md5_exchange() {
        let creds = Credentials::CramMd5 {
            username: "tim".into(),
            password: "tanstaaftanstaaf".into(),
        };
        let mut p = protocol(Security::None, creds, &["bob@example.org"]);
        p.handle(reply(220, ""));
        assert_eq!(sent_str(p.handle(reply(250, ""))), "AUTH CRAM-MD5\r\n");
        assert_eq!(
            sent_str(p.handle(reply(
                334,
                "PDE4OTYuNjk3MTcwOTUyQHBvc3RvZmZpY2UucmVzdG9uLm1jaS5uZXQ+"
            ))),
            "dGltIGI5MTNhNjAyYzdlZGE3YTQ5NWI0ZTZlNzMzNGQzODkw\r\n"
        );
        assert_eq!(p.state(), State::AwaitingPassword);
    }

    #[test]
    fn cram_md5_bad_challenge() {
        let creds = Credentials::CramMd5 {
            username: "tim".into(),
            password: "pw".into(),
        };
        let mut p = protocol(Security::None, creds, &["bob@example.org"]);
        p.handle(reply(220, ""));
        p.handle(reply(250, ""));
        assert_eq!(sent_str(p.handle(reply(334, "%%%"))), "QUIT\r\n");
        p.handle(reply(221, ""));
        assert!(matches!(p.into_result(), Err(Error::UndecodableChallenge)));
    }

    #[test]
    fn invalid_credentials() {
        let mut p = protocol(Security::None, login("user", "wrong"), &["bob@example.org"]);
        p.handle(reply(220, ""));
        p.handle(reply(250, ""));
        p.handle(reply(334, ""));
        p.handle(reply(334, ""));
        assert_eq!(sent_str(p.handle(reply(535, "bad"))), "QUIT\r\n");
        p.handle(reply(221, ""));
        assert!(matches!(p.into_result(), Err(Error::InvalidCredentials)));
    }

    #[test]
    fn auth_bad_sequence() {
        let mut p = protocol(Security::None, login("user", "pw"), &["bob@example.org"]);
        p.handle(reply(220, ""));
        p.handle(reply(250, ""));
        assert_eq!(sent_str(p.handle(reply(503, "already authenticated"))), "QUIT\r\n");
        p.handle(reply(221, ""));
        assert!(matches!(p.into_result(), Err(Error::InvalidState(_))));
    }

    #[test]
    fn malformed_reply_closes_without_quit() {
        let mut p = protocol(Security::None, Credentials::None, &["bob@example.org"]);
        p.handle(reply(220, ""));
        let action = p.handle(Event::Failed(Error::MalformedReply("garbage".into())));
        assert_eq!(action, Some(Action::Close));
        assert!(p.is_done());
        assert!(matches!(p.into_result(), Err(Error::MalformedReply(_))));
    }

    #[test]
    fn premature_close() {
        let mut p = protocol(Security::None, Credentials::None, &["bob@example.org"]);
        p.handle(reply(220, ""));
        assert_eq!(p.handle(Event::Closed), Some(Action::Close));
        assert!(matches!(p.into_result(), Err(Error::ConnectionClosed)));
    }

    #[test]
    fn reply_during_upgrade_is_fatal() {
        let mut p = protocol(Security::StartTls, Credentials::None, &["bob@example.org"]);
        p.handle(reply(220, ""));
        p.handle(reply(250, ""));
        p.handle(reply(220, ""));
        assert_eq!(p.handle(reply(250, "surprise")), Some(Action::Close));
        assert!(matches!(p.into_result(), Err(Error::Protocol(_))));
    }

    #[test]
    fn done_ignores_input() {
        let mut p = protocol(Security::None, Credentials::None, &["bob@example.org"]);
        p.handle(Event::Closed);
        assert!(p.is_done());
        assert_eq!(p.handle(reply(220, "")), None);
        assert_eq!(p.handle(Event::Closed), None);
        assert_eq!(p.handle(Event::Failed(Error::ConnectionClosed)), None);
    }

    #[test]
    fn first_error_wins() {
        let mut p = protocol(Security::None, Credentials::None, &["bob@example.org"]);
        p.handle(reply(220, ""));
        p.handle(reply(421, "shutting down"));
        assert_eq!(p.handle(Event::Closed), Some(Action::Close));
        let err = p.into_result().unwrap_err();
        assert_eq!(err.reply().unwrap().code, ReplyCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn delivery_survives_failed_quit() {
        let mut p = protocol(Security::None, Credentials::None, &["bob@example.org"]);
        for event in [
            reply(220, ""),
            reply(250, ""),
            reply(250, ""),
            reply(250, ""),
            reply(354, ""),
            reply(250, ""),
        ] {
            p.handle(event);
        }
        assert_eq!(p.handle(Event::Failed(Error::ConnectionClosed)), Some(Action::Close));
        assert!(p.into_result().is_ok());
    }
}
