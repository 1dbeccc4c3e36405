//! Session states.
//!
//! Each state names the reply the client is waiting for.

/// Position in the SMTP dialogue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum State {
    /// Connected, waiting for the `220` greeting.
    #[default]
    AwaitingGreeting,
    /// Sent EHLO (or HELO).
    AwaitingIdentity,
    /// Sent STARTTLS.
    AwaitingStartTls,
    /// STARTTLS accepted, the TLS handshake is in progress.
    ///
    /// Any reply in this state is a protocol violation.
    UpgradingToTls,
    /// Sent `AUTH <mechanism>`.
    AwaitingAuthentication,
    /// Sent the LOGIN username.
    AwaitingUsername,
    /// Sent the final credential.
    AwaitingPassword,
    /// Sent MAIL FROM.
    AwaitingMailTransaction,
    /// Sent RCPT TO.
    AwaitingRecipient,
    /// Sent DATA.
    AwaitingDataTransaction,
    /// Sent the message body.
    AwaitingDataTransfer,
    /// Sent QUIT.
    AwaitingQuit,
    /// Session over; further input is ignored.
    Done,
}

impl State {
    /// Returns `true` once the session has finished.
    #[must_use]
    pub const fn is_done(self) -> bool {
        matches!(self, Self::Done)
    }

    /// Returns `true` if a closed connection is an expected outcome here.
    #[must_use]
    pub const fn may_close(self) -> bool {
        matches!(self, Self::AwaitingQuit | Self::Done)
    }
}
