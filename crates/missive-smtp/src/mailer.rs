//! Async driver that runs a [`Protocol`] over a real connection.

use std::sync::Arc;

use bytes::Bytes;
use missive_mime::{Email, MessageEncoder};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use tokio_rustls::rustls::ClientConfig;
use tracing::{debug, info, trace, warn};

use crate::connection::{Config, Security, SmtpStream, default_tls_config};
use crate::error::{Error, Result};
use crate::parser::ReplyDecoder;
use crate::protocol::{Action, Event, Protocol};
use crate::types::Envelope;

/// Sends emails through one configured submission server.
///
/// A `Mailer` holds no connection: every [`Mailer::send`] opens its own, so a
/// shared `Mailer` may send many messages concurrently.
#[derive(Debug, Clone)]
pub struct Mailer {
    config: Config,
    client_identification: Option<String>,
    tls_config: Arc<ClientConfig>,
}

impl Mailer {
    /// Creates a mailer trusting the Mozilla root certificates.
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self {
            config,
            client_identification: None,
            tls_config: default_tls_config(),
        }
    }

    /// Sets the `X-Mailer` value stamped on every message.
    #[must_use]
    pub fn with_client_identification(mut self, id: impl Into<String>) -> Self {
        self.client_identification = Some(id.into());
        self
    }

    /// Replaces the TLS client configuration.
    #[must_use]
    pub fn with_tls_config(mut self, tls_config: Arc<ClientConfig>) -> Self {
        self.tls_config = tls_config;
        self
    }

    /// Returns the session configuration.
    #[must_use]
    pub const fn config(&self) -> &Config {
        &self.config
    }

    /// Connects to the configured server and submits `email`.
    ///
    /// The email is validated and encoded before any connection is made.
    ///
    /// # Errors
    ///
    /// Returns a validation error for an incomplete email, a transport error
    /// if the connection fails, or the first error of the SMTP session.
    pub async fn send(&self, email: &Email) -> Result<()> {
        let (envelope, message) = self.prepare(email)?;
        let stream = self.connect().await?;
        self.run(stream, envelope, message).await
    }

    /// Submits `email` over an already established byte stream.
    ///
    /// With [`Security::Implicit`] the TLS handshake runs on `stream` first.
    ///
    /// # Errors
    ///
    /// Same as [`Mailer::send`].
    pub async fn send_over<S>(&self, stream: S, email: &Email) -> Result<()>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let (envelope, message) = self.prepare(email)?;
        self.run(stream, envelope, message).await
    }

    fn prepare(&self, email: &Email) -> Result<(Envelope, Bytes)> {
        email.validate()?;
        let envelope = Envelope::from_email(email)?;

        let mut encoder = MessageEncoder::new();
        if let Some(id) = &self.client_identification {
            encoder = encoder.with_client_identification(id.clone());
        }
        let message = Bytes::from(encoder.encode(email)?);

        Ok((envelope, message))
    }

    async fn connect(&self) -> Result<TcpStream> {
        let Config {
            host,
            port,
            connect_timeout,
            ..
        } = &self.config;

        debug!(%host, port, "Connecting to SMTP server");
        tokio::time::timeout(*connect_timeout, TcpStream::connect((host.as_str(), *port)))
            .await
            .map_err(|_| Error::Timeout(*connect_timeout))?
            .map_err(Error::from)
    }

    async fn run<S>(&self, stream: S, envelope: Envelope, message: Bytes) -> Result<()>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let host = self.config.host.as_str();
        let connector = TlsConnector::from(Arc::clone(&self.tls_config));
        let mut protocol = Protocol::new(&self.config, envelope, message);

        let mut stream = if self.config.security == Security::Implicit {
            let stream = SmtpStream::tls(stream, &connector, host).await?;
            protocol.handle(Event::TlsEstablished);
            Some(stream)
        } else {
            Some(SmtpStream::plain(stream))
        };

        let mut decoder = ReplyDecoder::new();
        let mut next = None;

        while !protocol.is_done() {
            let event = match next.take() {
                Some(event) => event,
                None => read_event(stream.as_mut(), &mut decoder).await,
            };
            if let Some(action) = protocol.handle(event) {
                next = perform(action, &mut stream, &connector, host).await;
            }
        }

        let result = protocol.into_result();
        match &result {
            Ok(()) => info!(host, "Message delivered"),
            Err(error) => warn!(host, %error, "Message not delivered"),
        }
        result
    }
}

/// Reads lines until a complete reply, a closed connection, or a failure.
async fn read_event<S>(stream: Option<&mut SmtpStream<S>>, decoder: &mut ReplyDecoder) -> Event
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let Some(stream) = stream else {
        return Event::Closed;
    };

    loop {
        match stream.read_line().await {
            Ok(Some(line)) if line.is_empty() => {}
            Ok(Some(line)) => match decoder.decode(&line) {
                Ok(Some(reply)) => return Event::Reply(reply),
                Ok(None) => {}
                Err(error) => return Event::Failed(error),
            },
            Ok(None) => return Event::Closed,
            Err(error) => return Event::Failed(error),
        }
    }
}

/// Carries out `action`; returns the event it produced, if any.
async fn perform<S>(
    action: Action,
    stream: &mut Option<SmtpStream<S>>,
    connector: &TlsConnector,
    host: &str,
) -> Option<Event>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    match action {
        Action::Send(command) => {
            let Some(stream) = stream.as_mut() else {
                return Some(Event::Closed);
            };
            trace!(command = command.name(), "C:");
            stream.write_all(&command.serialize()).await.err().map(Event::Failed)
        }
        Action::UpgradeTls => {
            let plain = stream.take()?;
            match plain.upgrade_to_tls(connector, host).await {
                Ok(tls) => {
                    *stream = Some(tls);
                    Some(Event::TlsEstablished)
                }
                Err(error) => Some(Event::Failed(error)),
            }
        }
        Action::Close => {
            if let Some(mut stream) = stream.take() {
                if let Err(error) = stream.shutdown().await {
                    debug!(%error, "Shutdown failed");
                }
            }
            None
        }
    }
}
