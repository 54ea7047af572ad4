//! Filesystem content archiver

use super::ContentArchiver;
use crate::error::{Result, UrlForgeError};
use async_trait::async_trait;
use reqwest::Url;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

const DEFAULT_FILE_NAME: &str = "content.html";

/// Stores each body in its own timestamped directory under a run root
#[derive(Debug, Clone)]
pub struct DirectoryArchiver {
    root: PathBuf,
}

impl DirectoryArchiver {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Create a fresh directory named by the current time, suffixing
    /// `-1`, `-2`, ... while the name is taken.
    async fn claim_dir(&self, url: &str) -> Result<PathBuf> {
        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|e| UrlForgeError::archive(e.to_string(), url))?;

        let stamp = chrono::Local::now().format("%Y%m%d%H%M%S%f").to_string();
        let mut attempt = 0u32;
        loop {
            let name = if attempt == 0 {
                stamp.clone()
            } else {
                format!("{}-{}", stamp, attempt)
            };
            let dir = self.root.join(name);
            match tokio::fs::create_dir(&dir).await {
                Ok(()) => return Ok(dir),
                Err(e) if e.kind() == ErrorKind::AlreadyExists => attempt += 1,
                Err(e) => return Err(UrlForgeError::archive(e.to_string(), url)),
            }
        }
    }
}

/// Name of the stored file: the last path segment when it carries an
/// extension, otherwise `content.html`
pub fn file_name_for(url: &str) -> String {
    Url::parse(url)
        .ok()
        .and_then(|parsed| {
            parsed
                .path_segments()
                .and_then(|segments| segments.last().map(str::to_string))
        })
        .filter(|segment| {
            Path::new(segment)
                .extension()
                .map_or(false, |ext| !ext.is_empty())
                && !segment.starts_with('.')
        })
        .unwrap_or_else(|| DEFAULT_FILE_NAME.to_string())
}

#[async_trait]
impl ContentArchiver for DirectoryArchiver {
    async fn archive(&self, url: &str, body: &[u8]) -> Result<PathBuf> {
        let dir = self.claim_dir(url).await?;
        let path = dir.join(file_name_for(url));
        tokio::fs::write(&path, body)
            .await
            .map_err(|e| UrlForgeError::archive(e.to_string(), url))?;

        tracing::debug!(url = %url, path = %path.display(), bytes = body.len(), "Archived content");
        Ok(path)
    }

    fn root(&self) -> &Path {
        &self.root
    }
}
