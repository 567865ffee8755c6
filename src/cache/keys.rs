//! Cache key definitions.

use std::fmt;

use crate::domain::codec::escape_filename;
use crate::domain::entities::{Category, CategoryKind};

/// Identifies one precomputed page.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    Home,
    FrameSet,
    VerInfo,
    Menu,
    OpenSearch,
    FunctionList,
    /// A reference page by database id.
    Reference(i64),
    /// A document or sample page by database id.
    Document(i64),
    Category(CategoryKind, String),
}

impl CacheKey {
    pub fn category(category: &Category) -> Self {
        CacheKey::Category(category.kind(), category.name().to_string())
    }

    /// Path of the entry relative to the cache root, `/` separated.
    ///
    /// Distinct keys never share a filename: fixed names contain no `/`,
    /// ids are decimal, and category names go through [`escape_filename`].
    pub fn filename(&self) -> String {
        match self {
            CacheKey::Home => "home".to_string(),
            CacheKey::FrameSet => "frameset".to_string(),
            CacheKey::VerInfo => "verinfo".to_string(),
            CacheKey::Menu => "menu".to_string(),
            CacheKey::OpenSearch => "opensearch".to_string(),
            CacheKey::FunctionList => "function_list.js".to_string(),
            CacheKey::Reference(id) => format!("rid/{id}"),
            CacheKey::Document(id) => format!("did/{id}"),
            CacheKey::Category(kind, name) => {
                let dir = match kind {
                    CategoryKind::Reference => "refcat",
                    CategoryKind::Document => "doccat",
                    CategoryKind::Sample => "samcat",
                };
                format!("{dir}/{}", escape_filename(name))
            }
        }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.filename())
    }
}
