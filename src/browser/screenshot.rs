//! Screenshot persistence.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::url_utils;

/// Writes page captures below one directory.
///
/// Every capture gets its own file; existing files are never overwritten.
#[derive(Debug, Clone)]
pub struct ScreenshotStore {
    dir: PathBuf,
}

impl ScreenshotStore {
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File name for a capture of `url` taken at `at`.
    ///
    /// `<host>_<yyyymmdd-hhmmss>_<8 hex>.png`; characters outside
    /// `[A-Za-z0-9.-]` in the host become `_`.
    #[must_use]
    pub fn file_name(url: &str, at: DateTime<Utc>) -> String {
        let host: String = url_utils::host_of(url)
            .unwrap_or_else(|| "page".to_string())
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '.' || c == '-' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        let nonce = uuid::Uuid::new_v4().simple().to_string();
        format!("{host}_{}_{}.png", at.format("%Y%m%d-%H%M%S"), &nonce[..8])
    }

    /// Write `png` for `url`, creating the directory if needed.
    pub async fn save(&self, url: &str, png: &[u8]) -> Result<PathBuf> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.dir.join(Self::file_name(url, Utc::now()));
        tokio::fs::write(&path, png).await?;
        tracing::debug!(path = %path.display(), bytes = png.len(), "saved screenshot");
        Ok(path)
    }
}
