//! The routed form of a request.

use crate::domain::entities::{Category, DocumentRecord, ReferenceRecord};

/// What a request resolved to. Produced once per request by the router and
/// consumed by the screen pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Nothing matched; carries the raw (undecoded) request path.
    NotFound(String),
    FrameSet(Option<String>),
    Menu(Option<String>),
    VerInfo,
    OpenSearch,
    FunctionListScript,
    Home,
    ReferenceCategory(Category),
    Reference(ReferenceRecord),
    DocCategory(Category),
    SampleCategory(Category),
    DocOrSample(DocumentRecord),
    /// Absolute redirect target, query string included.
    Moved(String),
    /// File path relative to the content root, and the raw request path
    /// used for the not-found screen when the file is missing.
    PlainText { path: String, uri: String },
}

impl Command {
    /// Short label used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            Command::NotFound(_) => "not_found",
            Command::FrameSet(_) => "frameset",
            Command::Menu(_) => "menu",
            Command::VerInfo => "verinfo",
            Command::OpenSearch => "opensearch",
            Command::FunctionListScript => "function_list",
            Command::Home => "home",
            Command::ReferenceCategory(_) => "reference_category",
            Command::Reference(_) => "reference",
            Command::DocCategory(_) => "doc_category",
            Command::SampleCategory(_) => "sample_category",
            Command::DocOrSample(_) => "document",
            Command::Moved(_) => "moved",
            Command::PlainText { .. } => "plain_text",
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Command::NotFound(_))
    }
}
