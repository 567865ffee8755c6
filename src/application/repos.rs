//! Repository traits describing the read-only content store.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::entities::{
    Category, CategoryKind, DocumentKind, DocumentRecord, ReferenceKey, ReferenceRecord,
    StoreStats,
};

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("resource not found")]
    NotFound,
    #[error("database timeout")]
    Timeout,
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }
}

/// Case-insensitive `prefix*suffix` name pattern.
///
/// Either side may be empty. The wildcard matches zero or more characters,
/// so prefix and suffix never overlap inside a matching name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamePattern {
    pub prefix: String,
    pub suffix: String,
}

impl NamePattern {
    pub fn new(prefix: impl Into<String>, suffix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            suffix: suffix.into(),
        }
    }

    /// ASCII case-insensitive match, the same folding SQLite applies to `LIKE`.
    pub fn matches(&self, name: &str) -> bool {
        let name = name.to_ascii_lowercase();
        let prefix = self.prefix.to_ascii_lowercase();
        let suffix = self.suffix.to_ascii_lowercase();
        name.len() >= prefix.len() + suffix.len()
            && name.starts_with(&prefix)
            && name.ends_with(&suffix)
    }
}

/// Inclusive bounds on a name's character count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LengthWindow {
    pub min: usize,
    pub max: usize,
}

impl LengthWindow {
    pub fn contains(&self, name: &str) -> bool {
        let len = name.chars().count();
        len >= self.min && len <= self.max
    }
}

/// One word of a search query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchTerm {
    pub word: String,
    pub negated: bool,
}

impl SearchTerm {
    /// Words starting with an ASCII character up to `z` must also begin at a
    /// word boundary of the searched text.
    pub fn requires_word_start(&self) -> bool {
        self.word.chars().next().is_some_and(|c| c <= 'z')
    }
}

/// Space separated search words; all must match, `-word` excludes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchQuery {
    terms: Vec<SearchTerm>,
}

impl SearchQuery {
    pub fn parse(raw: &str) -> Self {
        let terms = raw
            .split([' ', '\u{3000}'])
            .filter_map(|word| {
                let (negated, word) = match word.strip_prefix('-') {
                    Some(rest) => (true, rest),
                    None => (false, word),
                };
                (!word.is_empty()).then(|| SearchTerm {
                    word: word.to_string(),
                    negated,
                })
            })
            .collect();
        Self { terms }
    }

    pub fn terms(&self) -> &[SearchTerm] {
        &self.terms
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Words that should be emphasised in result pages.
    pub fn positive_words(&self) -> impl Iterator<Item = &str> {
        self.terms
            .iter()
            .filter(|term| !term.negated)
            .map(|term| term.word.as_str())
    }
}

#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Looks up a category by exact name.
    ///
    /// An empty reference category name always resolves, possibly to an empty
    /// default category. An empty document or sample category name resolves
    /// to the alphabetically first category of that kind, or to an empty
    /// default category when the kind has none.
    async fn find_category(
        &self,
        kind: CategoryKind,
        name: &str,
    ) -> Result<Option<Category>, RepoError>;

    async fn list_categories(&self, kind: CategoryKind) -> Result<Vec<Category>, RepoError>;

    /// Looks up a reference by module and name; the name compares exactly or
    /// case-insensitively.
    async fn find_reference(
        &self,
        module: &str,
        name: &str,
    ) -> Result<Option<ReferenceRecord>, RepoError>;

    async fn find_reference_by_id(&self, id: i64) -> Result<Option<ReferenceRecord>, RepoError>;

    async fn reference_key_by_name(&self, name: &str) -> Result<Option<ReferenceKey>, RepoError>;

    async fn list_references(&self) -> Result<Vec<ReferenceKey>, RepoError>;

    async fn category_references(&self, name: &str) -> Result<Vec<ReferenceRecord>, RepoError>;

    /// Looks up a document or sample by its `/` separated relative path.
    async fn find_document_by_path(
        &self,
        path: &str,
    ) -> Result<Option<DocumentRecord>, RepoError>;

    async fn list_documents(
        &self,
        kind: Option<DocumentKind>,
    ) -> Result<Vec<DocumentRecord>, RepoError>;

    async fn category_documents(
        &self,
        kind: DocumentKind,
        name: &str,
    ) -> Result<Vec<DocumentRecord>, RepoError>;

    async fn search_references(
        &self,
        query: &SearchQuery,
    ) -> Result<Vec<ReferenceRecord>, RepoError>;

    async fn search_documents(
        &self,
        kind: DocumentKind,
        query: &SearchQuery,
    ) -> Result<Vec<DocumentRecord>, RepoError>;

    /// Samples whose searchable text contains `name` as a whole word,
    /// ordered by title.
    async fn samples_mentioning(&self, name: &str) -> Result<Vec<DocumentRecord>, RepoError>;

    /// `/` separated path of an indexed file with the given basename.
    async fn file_path_by_basename(&self, basename: &str) -> Result<Option<String>, RepoError>;

    /// Number of references whose name or module equals `token`
    /// case-insensitively.
    async fn count_exact_reference_matches(&self, token: &str) -> Result<u64, RepoError>;

    /// Names matching any of `patterns` whose length lies in `window`,
    /// ordered case-insensitively.
    async fn search_token_matches(
        &self,
        patterns: &[NamePattern],
        window: LengthWindow,
    ) -> Result<Vec<String>, RepoError>;

    /// Current location of a moved path; `old` compares case-insensitively.
    async fn lookup_moved(&self, old: &str) -> Result<Option<String>, RepoError>;

    async fn list_moved_targets(&self) -> Result<Vec<String>, RepoError>;

    async fn stats(&self) -> Result<StoreStats, RepoError>;

    /// Loads every reference name into memory for fast name lookups.
    async fn build_name_index(&self) -> Result<(), RepoError>;

    async fn invalidate_name_index(&self);
}
