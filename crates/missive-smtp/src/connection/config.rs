//! Session configuration types.

use std::fmt;
use std::time::Duration;

use crate::types::AuthMechanism;

/// Connection security mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Security {
    /// No encryption (port 25). **Not recommended for production.**
    None,
    /// Start with plaintext, upgrade with STARTTLS (port 587).
    #[default]
    StartTls,
    /// TLS from the start (port 465).
    Implicit,
}

impl Security {
    /// Returns the default port for this security mode.
    #[must_use]
    pub const fn default_port(self) -> u16 {
        match self {
            Self::None => 25,
            Self::StartTls => 587,
            Self::Implicit => 465,
        }
    }

    /// Returns true if credentials may only be sent over TLS.
    #[must_use]
    pub const fn requires_tls(self) -> bool {
        !matches!(self, Self::None)
    }
}

/// Authentication credentials.
#[derive(Clone, PartialEq, Eq, Default)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(tag = "mechanism", rename_all = "kebab-case")
)]
pub enum Credentials {
    /// Skip authentication.
    #[default]
    None,
    /// SASL PLAIN.
    Plain {
        /// Username
        username: String,
        /// Password
        password: String,
    },
    /// SASL LOGIN.
    Login {
        /// Username
        username: String,
        /// Password
        password: String,
    },
    /// CRAM-MD5 challenge-response.
    CramMd5 {
        /// Username
        username: String,
        /// Password
        password: String,
    },
}

impl Credentials {
    /// Returns the mechanism to announce with `AUTH`, or `None` to skip
    /// authentication.
    #[must_use]
    pub const fn mechanism(&self) -> Option<AuthMechanism> {
        match self {
            Self::None => None,
            Self::Plain { .. } => Some(AuthMechanism::Plain),
            Self::Login { .. } => Some(AuthMechanism::Login),
            Self::CramMd5 { .. } => Some(AuthMechanism::CramMd5),
        }
    }

    /// Returns the username, if any.
    #[must_use]
    pub fn username(&self) -> Option<&str> {
        match self {
            Self::None => None,
            Self::Plain { username, .. }
            | Self::Login { username, .. }
            | Self::CramMd5 { username, .. } => Some(username),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.mechanism() {
            None => f.write_str("None"),
            Some(mechanism) => f
                .debug_struct(mechanism.as_str())
                .field("username", &self.username().unwrap_or_default())
                .field("password", &"<redacted>")
                .finish(),
        }
    }
}

/// SMTP session configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Config {
    /// Server hostname.
    pub host: String,
    /// Server port.
    pub port: u16,
    /// Security mode.
    pub security: Security,
    /// Authentication credentials.
    pub credentials: Credentials,
    /// Name sent with EHLO/HELO; the server hostname when unset.
    pub helo_name: Option<String>,
    /// TCP connect timeout.
    pub connect_timeout: Duration,
}

impl Config {
    /// Creates a configuration using the default port for `security`.
    #[must_use]
    pub fn new(host: impl Into<String>, security: Security, credentials: Credentials) -> Self {
        Self::builder(host)
            .security(security)
            .credentials(credentials)
            .build()
    }

    /// Creates a configuration builder.
    #[must_use]
    pub fn builder(host: impl Into<String>) -> ConfigBuilder {
        ConfigBuilder::new(host)
    }

    /// Returns the name to identify as.
    #[must_use]
    pub fn helo_name(&self) -> &str {
        self.helo_name.as_deref().unwrap_or(&self.host)
    }
}

/// Builder for session configuration.
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    host: String,
    port: Option<u16>,
    security: Security,
    credentials: Credentials,
    helo_name: Option<String>,
    connect_timeout: Duration,
}

impl ConfigBuilder {
    /// Creates a new builder with the given hostname.
    #[must_use]
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: None,
            security: Security::default(),
            credentials: Credentials::None,
            helo_name: None,
            connect_timeout: Duration::from_secs(30),
        }
    }

    /// Sets the port.
    #[must_use]
    pub const fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Sets the security mode.
    #[must_use]
    pub const fn security(mut self, security: Security) -> Self {
        self.security = security;
        self
    }

    /// Sets the credentials.
    #[must_use]
    pub fn credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = credentials;
        self
    }

    /// Sets the name sent with EHLO/HELO.
    #[must_use]
    pub fn helo_name(mut self, name: impl Into<String>) -> Self {
        self.helo_name = Some(name.into());
        self
    }

    /// Sets the connection timeout.
    #[must_use]
    pub const fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Builds the configuration.
    #[must_use]
    pub fn build(self) -> Config {
        Config {
            host: self.host,
            port: self.port.unwrap_or_else(|| self.security.default_port()),
            security: self.security,
            credentials: self.credentials,
            helo_name: self.helo_name,
            connect_timeout: self.connect_timeout,
        }
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

    #[test]
    fn test_default_ports() {
        assert_eq!(Security::None.default_port(), 25);
        assert_eq!(Security::StartTls.default_port(), 587);
        assert_eq!(Security::Implicit.default_port(), 465);
        assert_eq!(Security::default(), Security::StartTls);
    }

    #[test]
    fn test_config_new() {
        let config = Config::new("smtp.example.com", Security::Implicit, Credentials::None);
        assert_eq!(config.host, "smtp.example.com");
        assert_eq!(config.port, 465);
        assert_eq!(config.helo_name(), "smtp.example.com");
        assert_eq!(config.connect_timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_config_builder() {
        let config = Config::builder("smtp.example.com")
            .port(2525)
            .security(Security::None)
            .helo_name("client.example.org")
            .connect_timeout(Duration::from_secs(5))
            .build();

        assert_eq!(config.port, 2525);
        assert_eq!(config.security, Security::None);
        assert_eq!(config.helo_name(), "client.example.org");
        assert_eq!(config.connect_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_credentials_mechanism() {
        let creds = Credentials::Login {
            username: "user".into(),
            password: "pw".into(),
        };
        assert_eq!(creds.mechanism(), Some(AuthMechanism::Login));
        assert_eq!(creds.username(), Some("user"));
        assert_eq!(Credentials::None.mechanism(), None);
    }

    #[test]
    fn test_credentials_debug_hides_password() {
        let creds = Credentials::CramMd5 {
            username: "user".into(),
            password: "hunter2".into(),
        };
        let debug = format!("{creds:?}");
        assert!(debug.contains("user"));
        assert!(!debug.contains("hunter2"));
    }
}
