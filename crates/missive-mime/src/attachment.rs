//! File attachments.

use std::io;
use std::path::Path;

use chrono::{DateTime, Utc};

use crate::error::Result;

/// A file to send alongside the message body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    /// File name presented to the recipient.
    pub filename: String,
    /// MIME type, guessed from the file name unless set explicitly.
    pub content_type: Option<String>,
    /// Raw file content.
    pub data: Vec<u8>,
    /// Size of `data` in bytes.
    pub size: u64,
    /// File creation time.
    pub creation_date: Option<DateTime<Utc>>,
    /// File modification time.
    pub modification_date: Option<DateTime<Utc>>,
    /// Content id emitted as `X-Attachment-Id`.
    pub id: Option<String>,
}

impl Attachment {
    /// Creates an attachment from in-memory data.
    ///
    /// The content type is guessed from the file name's extension.
    #[must_use]
    pub fn new(filename: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        let filename = filename.into();
        let data = data.into();
        let content_type = guess_content_type(&filename);

        Self {
            size: data.len() as u64,
            filename,
            content_type,
            data,
            creation_date: None,
            modification_date: None,
            id: None,
        }
    }

    /// Loads an attachment from disk, including its timestamps.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the path is not a readable regular file.
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let metadata = tokio::fs::metadata(path).await?;
        if !metadata.is_file() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{} is not a file", path.display()),
            )
            .into());
        }

        let filename = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("{} has no file name", path.display()),
                )
            })?;

        let data = tokio::fs::read(path).await?;
        tracing::debug!(path = %path.display(), size = data.len(), "Loaded attachment");

        let mut attachment = Self::new(filename, data);
        attachment.size = metadata.len();
        attachment.creation_date = metadata.created().ok().map(DateTime::<Utc>::from);
        attachment.modification_date = metadata.modified().ok().map(DateTime::<Utc>::from);

        Ok(attachment)
    }

    /// Overrides the guessed content type.
    #[must_use]
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// Sets the creation date.
    #[must_use]
    pub const fn with_creation_date(mut self, date: DateTime<Utc>) -> Self {
        self.creation_date = Some(date);
        self
    }

    /// Sets the modification date.
    #[must_use]
    pub const fn with_modification_date(mut self, date: DateTime<Utc>) -> Self {
        self.modification_date = Some(date);
        self
    }

    /// Sets the attachment id.
    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Drops both timestamps so they are not disclosed to recipients.
    #[must_use]
    pub const fn without_dates(mut self) -> Self {
        self.creation_date = None;
        self.modification_date = None;
        self
    }
}

fn guess_content_type(filename: &str) -> Option<String> {
    mime_guess::from_path(filename)
        .first_raw()
        .map(ToString::to_string)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_new_guesses_content_type() {
        let attachment = Attachment::new("report.pdf", b"%PDF".to_vec());
        assert_eq!(attachment.content_type.as_deref(), Some("application/pdf"));
        assert_eq!(attachment.size, 4);

        let attachment = Attachment::new("photo.png", vec![0u8; 10]);
        assert_eq!(attachment.content_type.as_deref(), Some("image/png"));
    }

    #[test]
    fn test_unknown_extension_has_no_content_type() {
        let attachment = Attachment::new("blob.unknownext", vec![1, 2, 3]);
        assert_eq!(attachment.content_type, None);

        let attachment = attachment.with_content_type("application/octet-stream");
        assert_eq!(
            attachment.content_type.as_deref(),
            Some("application/octet-stream")
        );
    }

    #[test]
    fn test_builders() {
        let date = Utc.with_ymd_and_hms(2023, 1, 2, 3, 4, 5).unwrap();
        let attachment = Attachment::new("a.txt", "hi")
            .with_creation_date(date)
            .with_modification_date(date)
            .with_id("a1");
        assert_eq!(attachment.creation_date, Some(date));
        assert_eq!(attachment.id.as_deref(), Some("a1"));

        let attachment = attachment.without_dates();
        assert_eq!(attachment.creation_date, None);
        assert_eq!(attachment.modification_date, None);
    }

    #[test]
    fn test_from_file() {
        let dir = std::env::temp_dir().join(format!("missive-mime-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("notes.txt");
        std::fs::write(&path, b"hello attachment").unwrap();

        let attachment = tokio_test::block_on(Attachment::from_file(&path)).unwrap();
        assert_eq!(attachment.filename, "notes.txt");
        assert_eq!(attachment.data, b"hello attachment");
        assert_eq!(attachment.size, 16);
        assert_eq!(attachment.content_type.as_deref(), Some("text/plain"));
        assert!(attachment.modification_date.is_some());

        let err = tokio_test::block_on(Attachment::from_file(&dir)).unwrap_err();
        assert!(matches!(err, crate::Error::Io(ref e) if e.kind() == io::ErrorKind::InvalidInput));

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
