//! Core SMTP types.

mod envelope;
mod mechanism;
mod reply;

pub use envelope::Envelope;
pub use mechanism::AuthMechanism;
pub use reply::{Reply, ReplyCode};
