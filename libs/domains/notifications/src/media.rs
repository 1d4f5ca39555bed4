//! Turns media references into local files for email attachment.
//!
//! Every resolved file lives in its own temporary directory owned by
//! [`ResolvedMedia`]; dropping the handle deletes the directory and its contents.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use reqwest::{Client, header::CONTENT_TYPE};
use tempfile::TempDir;
use tokio::{fs::File, io::AsyncWriteExt};
use tracing::{debug, instrument};
use url::Url;

use crate::config::MediaSettings;
use crate::error::MediaError;
use crate::models::Attachment;

/// File name used when the reference has no usable last path segment.
pub const FALLBACK_FILE_NAME: &str = "attachment";

const MAX_FILE_NAME_LEN: usize = 100;

/// Resolves a media reference into a local file.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MediaResolver: Send + Sync {
    async fn resolve(&self, reference: &str) -> Result<ResolvedMedia, MediaError>;
}

/// A media file on local storage, removed when dropped.
#[derive(Debug)]
pub struct ResolvedMedia {
    dir: TempDir,
    path: PathBuf,
    file_name: String,
    content_type: Option<String>,
}

impl ResolvedMedia {
    /// Creates an empty file named `file_name` in a fresh temporary directory
    /// under `root`, or under the system temp dir when `root` is `None`.
    pub async fn create(
        root: Option<&Path>,
        file_name: &str,
        content_type: Option<String>,
    ) -> Result<(Self, File), MediaError> {
        let root = root.map(Path::to_path_buf);
        let dir = tokio::task::spawn_blocking(move || {
            let mut builder = tempfile::Builder::new();
            builder.prefix("relay-media-");
            match root {
                Some(root) => builder.tempdir_in(root),
                None => builder.tempdir(),
            }
        })
        .await
        .map_err(|e| MediaError::WriteFailed(e.to_string()))??;
        let file_name = sanitize_file_name(file_name);
        let path = dir.path().join(&file_name);
        let file = File::create(&path).await?;

        Ok((
            Self {
                dir,
                path,
                file_name,
                content_type,
            },
            file,
        ))
    }

    /// Writes `bytes` into a new resolved file.
    pub async fn from_bytes(
        file_name: &str,
        content_type: Option<String>,
        bytes: &[u8],
    ) -> Result<Self, MediaError> {
        let (media, mut file) = Self::create(None, file_name, content_type).await?;
        file.write_all(bytes).await?;
        file.flush().await?;
        Ok(media)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    pub fn as_attachment(&self) -> Attachment {
        Attachment {
            path: self.path.clone(),
            file_name: self.file_name.clone(),
            content_type: self.content_type.clone(),
        }
    }
}

impl Drop for ResolvedMedia {
    fn drop(&mut self) {
        debug!(path = %self.dir.path().display(), "Releasing resolved media");
    }
}

/// Derives a safe local file name from the reference's last path segment.
pub fn file_name_from_url(url: &Url) -> String {
    let segment = url
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .unwrap_or_default();
    let decoded = urlencoding::decode(segment)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| segment.to_string());
    sanitize_file_name(&decoded)
}

fn sanitize_file_name(raw: &str) -> String {
    let cleaned: String = raw
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let trimmed = cleaned.trim_start_matches('.');

    if trimmed.trim_matches('_').is_empty() {
        return FALLBACK_FILE_NAME.to_string();
    }
    trimmed.chars().take(MAX_FILE_NAME_LEN).collect()
}

/// Downloads http(s) media with a timeout and a size cap.
#[derive(Debug, Clone)]
pub struct HttpMediaResolver {
    client: Client,
    max_bytes: u64,
    temp_root: Option<PathBuf>,
}

impl HttpMediaResolver {
    pub fn new(settings: &MediaSettings) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(settings.timeout).build()?;
        Ok(Self {
            client,
            max_bytes: settings.max_bytes,
            temp_root: settings.temp_root.clone(),
        })
    }

    fn parse_reference(reference: &str) -> Result<Url, MediaError> {
        let invalid = |reason: String| MediaError::InvalidReference {
            reference: reference.to_string(),
            reason,
        };
        let url = Url::parse(reference).map_err(|e| invalid(e.to_string()))?;
        match url.scheme() {
            "http" | "https" => Ok(url),
            other => Err(invalid(format!("unsupported scheme '{other}'"))),
        }
    }
}

#[async_trait]
impl MediaResolver for HttpMediaResolver {
    #[instrument(skip(self), fields(bytes = tracing::field::Empty))]
    async fn resolve(&self, reference: &str) -> Result<ResolvedMedia, MediaError> {
        let url = Self::parse_reference(reference)?;
        let fetch_failed = |reason: String| MediaError::FetchFailed {
            url: url.to_string(),
            reason,
        };
        let too_large = || MediaError::TooLarge {
            url: url.to_string(),
            limit: self.max_bytes,
        };

        let mut response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| fetch_failed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(fetch_failed(format!("remote returned {status}")));
        }
        if response.content_length().is_some_and(|len| len > self.max_bytes) {
            return Err(too_large());
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        // Dropping `media` on any early return below removes the partial download.
        let (media, mut file) = ResolvedMedia::create(
            self.temp_root.as_deref(),
            &file_name_from_url(&url),
            content_type,
        )
        .await?;

        let mut written: u64 = 0;
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| fetch_failed(e.to_string()))?
        {
            written += chunk.len() as u64;
            if written > self.max_bytes {
                return Err(too_large());
            }
            file.write_all(&chunk).await?;
        }
        file.flush().await?;

        tracing::Span::current().record("bytes", written);
        debug!(file = %media.file_name(), "Media resolved");
        Ok(media)
    }
}
