//! Read access to document and sample files under the content root.

use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use bytes::Bytes;
use thiserror::Error;
use time::OffsetDateTime;
use tokio::fs;

#[derive(Debug, Error)]
pub enum ContentFileError {
    #[error("invalid content path `{0}`")]
    InvalidPath(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// A file served verbatim.
#[derive(Debug, Clone)]
pub struct PlainFile {
    pub bytes: Bytes,
    pub modified: Option<OffsetDateTime>,
}

/// Filesystem-backed content files. Paths are relative to the root and may
/// use either separator.
#[derive(Debug, Clone)]
pub struct ContentFiles {
    root: PathBuf,
}

impl ContentFiles {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Reads a file as text, replacing invalid UTF-8. Missing files yield `None`.
    pub async fn read_text(&self, path: &str) -> Result<Option<String>, ContentFileError> {
        let absolute = self.resolve(path)?;
        match fs::read(&absolute).await {
            Ok(data) => Ok(Some(String::from_utf8_lossy(&data).into_owned())),
            Err(err) if is_missing(&err) => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    /// Reads a file together with its modification time.
    pub async fn read_plain(&self, path: &str) -> Result<Option<PlainFile>, ContentFileError> {
        let absolute = self.resolve(path)?;
        let data = match fs::read(&absolute).await {
            Ok(data) => data,
            Err(err) if is_missing(&err) => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        let modified = fs::metadata(&absolute)
            .await
            .and_then(|meta| meta.modified())
            .ok()
            .map(OffsetDateTime::from);

        Ok(Some(PlainFile {
            bytes: Bytes::from(data),
            modified,
        }))
    }

    pub async fn is_file(&self, path: &str) -> bool {
        match self.resolve(path) {
            Ok(absolute) => fs::metadata(absolute)
                .await
                .map(|meta| meta.is_file())
                .unwrap_or(false),
            Err(_) => false,
        }
    }

    fn resolve(&self, path: &str) -> Result<PathBuf, ContentFileError> {
        let normalized = path.replace('\\', "/");
        let relative = Path::new(&normalized);
        if relative.is_absolute()
            || relative
                .components()
                .any(|component| matches!(component, Component::ParentDir | Component::Prefix(_)))
        {
            return Err(ContentFileError::InvalidPath(path.to_string()));
        }

        Ok(self.root.join(relative))
    }
}

fn is_missing(err: &std::io::Error) -> bool {
    matches!(
        err.kind(),
        ErrorKind::NotFound | ErrorKind::NotADirectory | ErrorKind::IsADirectory
    )
}
