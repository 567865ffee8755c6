//! Rendering interface for library screens.
//!
//! The screen pipeline and the batch cache writer only see [`Renderer`]; the
//! askama-backed implementation lives in `presentation`.

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

use crate::application::repos::RepoError;
use crate::domain::entities::{Category, DocumentRecord, ReferenceRecord};

/// A page the renderer knows how to produce.
#[derive(Debug, Clone, Copy)]
pub enum Page<'a> {
    NotFound {
        uri: &'a str,
    },
    /// Frame layout; a non-empty query preloads the menu search.
    FrameSet {
        query: &'a str,
    },
    VerInfo,
    /// Menu index when `query` is empty, search results otherwise.
    Menu {
        query: &'a str,
    },
    OpenSearch,
    FunctionList,
    Home,
    Category(&'a Category),
    Reference(&'a ReferenceRecord),
    /// `content` is `None` when the backing file is missing.
    Document {
        document: &'a DocumentRecord,
        content: Option<&'a str>,
    },
}

impl Page<'_> {
    pub fn name(&self) -> &'static str {
        match self {
            Page::NotFound { .. } => "not_found",
            Page::FrameSet { .. } => "frameset",
            Page::VerInfo => "verinfo",
            Page::Menu { .. } => "menu",
            Page::OpenSearch => "opensearch",
            Page::FunctionList => "function_list",
            Page::Home => "home",
            Page::Category(_) => "category",
            Page::Reference(_) => "reference",
            Page::Document { .. } => "document",
        }
    }
}

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("template `{template}` failed to render: {message}")]
    Template {
        template: &'static str,
        message: String,
    },
    #[error(transparent)]
    Store(#[from] RepoError),
}

#[async_trait]
pub trait Renderer: Send + Sync {
    async fn render(&self, page: Page<'_>) -> Result<Bytes, RenderError>;
}
