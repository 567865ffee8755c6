//! Offline batch writer that fills the page cache.

use std::io::Write;
use std::path::{Path, PathBuf};

use bytes::Bytes;
use thiserror::Error;
use tracing::{info, warn};

use super::keys::CacheKey;
use crate::application::render::{Page, RenderError, Renderer};
use crate::application::repos::{ContentStore, RepoError};
use crate::domain::entities::CategoryKind;
use crate::infra::files::ContentFiles;

#[derive(Debug, Error)]
pub enum CacheWriteError {
    #[error("cache I/O failed at `{path}`")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to render `{key}`")]
    Render {
        key: CacheKey,
        #[source]
        source: RenderError,
    },
    #[error(transparent)]
    Store(#[from] RepoError),
}

impl CacheWriteError {
    fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Counts of entries written by [`CacheWriter::build_all`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheBuildReport {
    pub singletons: usize,
    pub references: usize,
    pub documents: usize,
    pub reference_categories: usize,
    pub document_categories: usize,
    pub sample_categories: usize,
}

impl CacheBuildReport {
    pub fn total(&self) -> usize {
        self.singletons
            + self.references
            + self.documents
            + self.reference_categories
            + self.document_categories
            + self.sample_categories
    }

    fn count_category(&mut self, kind: CategoryKind) {
        match kind {
            CategoryKind::Reference => self.reference_categories += 1,
            CategoryKind::Document => self.document_categories += 1,
            CategoryKind::Sample => self.sample_categories += 1,
        }
    }
}

/// Writes cache entries under a root directory. Entries are replaced
/// atomically, so concurrent readers see either the old or the new file.
#[derive(Debug, Clone)]
pub struct CacheWriter {
    root: PathBuf,
}

impl CacheWriter {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Removes every entry under the root, keeping the root itself.
    pub async fn clear_all(&self) -> Result<usize, CacheWriteError> {
        let mut entries = match tokio::fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(err) => return Err(CacheWriteError::io(&self.root, err)),
        };

        let mut removed = 0;
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|err| CacheWriteError::io(&self.root, err))?
        {
            let path = entry.path();
            let file_type = entry
                .file_type()
                .await
                .map_err(|err| CacheWriteError::io(&path, err))?;
            let result = if file_type.is_dir() {
                tokio::fs::remove_dir_all(&path).await
            } else {
                tokio::fs::remove_file(&path).await
            };
            result.map_err(|err| CacheWriteError::io(&path, err))?;
            removed += 1;
        }

        info!(
            target = "ohdl::cache::writer",
            root = %self.root.display(),
            removed,
            "cache cleared"
        );
        Ok(removed)
    }

    /// Writes `bytes` for `key` via a temporary file and rename.
    pub async fn store(&self, key: &CacheKey, bytes: Bytes) -> Result<(), CacheWriteError> {
        let target = self.root.join(key.filename());
        tokio::task::spawn_blocking(move || write_atomic(&target, &bytes))
            .await
            .map_err(|err| CacheWriteError::io(&self.root, std::io::Error::other(err)))?
    }

    /// Renders and stores every page of the library.
    pub async fn build_all(
        &self,
        store: &dyn ContentStore,
        renderer: &dyn Renderer,
        files: &ContentFiles,
    ) -> Result<CacheBuildReport, CacheWriteError> {
        let mut report = CacheBuildReport::default();

        let singletons = [
            (CacheKey::Home, Page::Home),
            (CacheKey::FrameSet, Page::FrameSet { query: "" }),
            (CacheKey::VerInfo, Page::VerInfo),
            (CacheKey::Menu, Page::Menu { query: "" }),
            (CacheKey::OpenSearch, Page::OpenSearch),
            (CacheKey::FunctionList, Page::FunctionList),
        ];
        for (key, page) in singletons {
            self.render_and_store(renderer, key, page).await?;
            report.singletons += 1;
        }

        for entry in store.list_references().await? {
            let Some(reference) = store.find_reference_by_id(entry.id).await? else {
                continue;
            };
            self.render_and_store(
                renderer,
                CacheKey::Reference(reference.id),
                Page::Reference(&reference),
            )
            .await?;
            report.references += 1;
        }

        for document in store.list_documents(None).await? {
            let content = match files.read_text(&document.path).await {
                Ok(content) => content,
                Err(err) => {
                    warn!(
                        target = "ohdl::cache::writer",
                        path = %document.path,
                        error = %err,
                        "document file unreadable"
                    );
                    None
                }
            };
            let page = Page::Document {
                document: &document,
                content: content.as_deref(),
            };
            self.render_and_store(renderer, CacheKey::Document(document.id), page)
                .await?;
            report.documents += 1;
        }

        for kind in CategoryKind::ALL {
            for category in store.list_categories(kind).await? {
                self.render_and_store(
                    renderer,
                    CacheKey::category(&category),
                    Page::Category(&category),
                )
                .await?;
                report.count_category(kind);
            }
        }

        info!(
            target = "ohdl::cache::writer",
            root = %self.root.display(),
            total = report.total(),
            references = report.references,
            documents = report.documents,
            "cache build finished"
        );
        Ok(report)
    }

    async fn render_and_store(
        &self,
        renderer: &dyn Renderer,
        key: CacheKey,
        page: Page<'_>,
    ) -> Result<(), CacheWriteError> {
        let bytes = renderer
            .render(page)
            .await
            .map_err(|source| CacheWriteError::Render {
                key: key.clone(),
                source,
            })?;
        self.store(&key, bytes).await
    }
}

/// Requested mode for cache entries; the process umask still applies.
#[cfg(unix)]
const ENTRY_MODE: u32 = 0o644;

fn write_atomic(target: &Path, bytes: &[u8]) -> Result<(), CacheWriteError> {
    let parent = target.parent().ok_or_else(|| {
        CacheWriteError::io(
            target,
            std::io::Error::new(std::io::ErrorKind::InvalidInput, "cache entry has no parent"),
        )
    })?;
    std::fs::create_dir_all(parent).map_err(|err| CacheWriteError::io(parent, err))?;

    let mut temp = entry_builder()
        .tempfile_in(parent)
        .map_err(|err| CacheWriteError::io(parent, err))?;
    temp.write_all(bytes)
        .and_then(|()| temp.as_file().sync_all())
        .map_err(|err| CacheWriteError::io(temp.path(), err))?;
    temp.persist(target)
        .map_err(|err| CacheWriteError::io(target, err.error))?;
    Ok(())
}

/// Temp files default to owner-only; entries must stay readable by a server
/// running under another account.
fn entry_builder() -> tempfile::Builder<'static, 'static> {
    #[allow(unused_mut)]
    let mut builder = tempfile::Builder::new();
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        builder.permissions(std::fs::Permissions::from_mode(ENTRY_MODE));
    }
    builder
}
