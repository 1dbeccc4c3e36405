//! Session configuration and the byte stream the session runs over.

mod config;
mod stream;

pub use config::{Config, ConfigBuilder, Credentials, Security};
pub use stream::{SmtpStream, default_tls_config};
