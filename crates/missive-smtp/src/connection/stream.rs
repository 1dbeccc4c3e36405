//! Line-framed SMTP stream handling.

use std::sync::Arc;

use rustls::pki_types::ServerName;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio_rustls::TlsConnector;
use tokio_rustls::client::TlsStream;
use tokio_rustls::rustls::{ClientConfig, RootCertStore};

use crate::error::{Error, Result};

/// Maximum reply line length to prevent memory exhaustion.
const MAX_LINE_LENGTH: usize = 8192;

/// SMTP stream over any byte transport, plain or TLS.
#[derive(Debug)]
pub enum SmtpStream<S> {
    /// Plaintext connection.
    Plain(BufReader<S>),
    /// TLS-encrypted connection.
    Tls(Box<BufReader<TlsStream<S>>>),
}

impl<S> SmtpStream<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Wraps a plaintext stream.
    pub fn plain(stream: S) -> Self {
        Self::Plain(BufReader::new(stream))
    }

    /// Performs a TLS handshake on `stream` before any SMTP traffic.
    ///
    /// # Errors
    ///
    /// Returns an error if `host` is not a valid server name or the
    /// handshake fails.
    pub async fn tls(stream: S, connector: &TlsConnector, host: &str) -> Result<Self> {
        let server_name = ServerName::try_from(host.to_string())?;
        let tls_stream = connector.connect(server_name, stream).await?;
        tracing::debug!(host, "TLS handshake complete");
        Ok(Self::Tls(Box::new(BufReader::new(tls_stream))))
    }

    /// Returns true if the stream is encrypted.
    pub const fn is_tls(&self) -> bool {
        matches!(self, Self::Tls(_))
    }

    /// Reads one line, without its line terminator.
    ///
    /// Returns `None` once the peer has closed the connection.
    ///
    /// # Errors
    ///
    /// Returns an error if the read fails or the line is too long.
    pub async fn read_line(&mut self) -> Result<Option<Vec<u8>>> {
        let line = match self {
            Self::Plain(reader) => read_line_from(reader).await?,
            Self::Tls(reader) => read_line_from(&mut **reader).await?,
        };
        if let Some(line) = &line {
            tracing::trace!(line = %String::from_utf8_lossy(line), "S:");
        }
        Ok(line)
    }

    /// Writes data to the stream and flushes it.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub async fn write_all(&mut self, data: &[u8]) -> Result<()> {
        match self {
            Self::Plain(reader) => {
                reader.get_mut().write_all(data).await?;
                reader.get_mut().flush().await?;
            }
            Self::Tls(reader) => {
                reader.get_mut().write_all(data).await?;
                reader.get_mut().flush().await?;
            }
        }
        tracing::trace!(bytes = data.len(), "C: wrote");
        Ok(())
    }

    /// Upgrades a plaintext stream to TLS after `STARTTLS` was accepted.
    ///
    /// # Errors
    ///
    /// Returns an error if the stream is already encrypted, if the server sent
    /// data ahead of the handshake, or if the handshake fails.
    pub async fn upgrade_to_tls(self, connector: &TlsConnector, host: &str) -> Result<Self> {
        let reader = match self {
            Self::Plain(reader) => reader,
            Self::Tls(_) => return Err(Error::Protocol("Already using TLS".into())),
        };

        if !reader.buffer().is_empty() {
            return Err(Error::Protocol(
                "Server sent data before the TLS handshake".into(),
            ));
        }

        Self::tls(reader.into_inner(), connector, host).await
    }

    /// Shuts down the write half of the connection.
    ///
    /// # Errors
    ///
    /// Returns an error if the shutdown fails.
    pub async fn shutdown(&mut self) -> Result<()> {
        match self {
            Self::Plain(reader) => reader.get_mut().shutdown().await?,
            Self::Tls(reader) => reader.get_mut().shutdown().await?,
        }
        Ok(())
    }
}

async fn read_line_from<R>(reader: &mut R) -> Result<Option<Vec<u8>>>
where
    R: AsyncBufRead + Unpin,
{
    let mut line = Vec::new();

    loop {
        let buf = reader.fill_buf().await?;
        if buf.is_empty() {
            if !line.is_empty() {
                tracing::debug!(bytes = line.len(), "Discarding unterminated line at EOF");
            }
            return Ok(None);
        }

        if let Some(pos) = buf.iter().position(|&b| b == b'\n') {
            line.extend_from_slice(&buf[..pos]);
            reader.consume(pos + 1);
            break;
        }

        let len = buf.len();
        line.extend_from_slice(buf);
        reader.consume(len);

        if line.len() > MAX_LINE_LENGTH {
            return Err(Error::MalformedReply(format!(
                "Reply line exceeds {MAX_LINE_LENGTH} bytes"
            )));
        }
    }

    if line.last() == Some(&b'\r') {
        line.pop();
    }
    if line.len() > MAX_LINE_LENGTH {
        return Err(Error::MalformedReply(format!(
            "Reply line exceeds {MAX_LINE_LENGTH} bytes"
        )));
    }

    Ok(Some(line))
}

/// Creates a TLS client configuration trusting the Mozilla root store.
#[must_use]
pub fn default_tls_config() -> Arc<ClientConfig> {
    let root_store = RootCertStore {
        roots: webpki_roots::TLS_SERVER_ROOTS.to_vec(),
    };

    let config = ClientConfig::builder()
        .with_root_certificates(root_store)
        .with_no_client_auth();

    Arc::new(config)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_read_lines() {
        let (client, mut server) = tokio::io::duplex(64);
        server
            .write_all(b"220-first\r\n220 second\r\nbare\n")
            .await
            .unwrap();
        drop(server);

        let mut stream = SmtpStream::plain(client);
        assert_eq!(stream.read_line().await.unwrap().unwrap(), b"220-first");
        assert_eq!(stream.read_line().await.unwrap().unwrap(), b"220 second");
        assert_eq!(stream.read_line().await.unwrap().unwrap(), b"bare");
        assert!(stream.read_line().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_line_too_long() {
        let (client, mut server) = tokio::io::duplex(MAX_LINE_LENGTH * 4);
        let long = vec![b'a'; MAX_LINE_LENGTH + 10];
        server.write_all(&long).await.unwrap();
        server.write_all(b"\r\n").await.unwrap();

        let mut stream = SmtpStream::plain(client);
        assert!(matches!(
            stream.read_line().await,
            Err(Error::MalformedReply(_))
        ));
    }

    #[tokio::test]
    async fn test_write_all() {
        let (client, server) = tokio::io::duplex(64);
        let mut stream = SmtpStream::plain(client);
        stream.write_all(b"QUIT\r\n").await.unwrap();
        stream.shutdown().await.unwrap();

        let mut reader = BufReader::new(server);
        let mut line = String::new();
        reader.read_line(&mut line).await.unwrap();
        assert_eq!(line, "QUIT\r\n");
        assert!(!stream.is_tls());
    }

    #[tokio::test]
    async fn test_upgrade_rejects_buffered_data() {
        let (client, mut server) = tokio::io::duplex(64);
        server.write_all(b"220 go ahead\r\nsmuggled\r\n").await.unwrap();

        let mut stream = SmtpStream::plain(client);
        stream.read_line().await.unwrap();

        let connector = TlsConnector::from(default_tls_config());
        let err = stream
            .upgrade_to_tls(&connector, "smtp.example.com")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Protocol(_)));
    }
}
