//! In-memory content store used by unit tests.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use crate::application::repos::{
    ContentStore, LengthWindow, NamePattern, RepoError, SearchQuery, SearchTerm,
};
use crate::domain::entities::{
    Category, CategoryKind, DocumentKind, DocumentRecord, ReferenceKey, ReferenceRecord,
    StoreStats,
};

#[derive(Default)]
pub(crate) struct MemoryStore {
    references: Vec<ReferenceRecord>,
    documents: Vec<DocumentRecord>,
    moved: Vec<(String, String)>,
    files: Vec<String>,
    failing: bool,
    calls: AtomicUsize,
}

pub(crate) fn reference(id: i64, module: &str, name: &str) -> ReferenceRecord {
    ReferenceRecord {
        id,
        name: name.to_string(),
        module: module.to_string(),
        summary: format!("{name} summary"),
        version: String::new(),
        date: String::new(),
        author: String::new(),
        group: String::new(),
        prm: String::new(),
        prm2: String::new(),
        inst: String::new(),
        sample: String::new(),
        href: String::new(),
        portinf: String::new(),
        port: String::new(),
        url: String::new(),
        kind: String::new(),
        note: String::new(),
        path: String::new(),
    }
}

pub(crate) fn document(
    id: i64,
    path: &str,
    kind: DocumentKind,
    title: &str,
    category: &str,
) -> DocumentRecord {
    DocumentRecord {
        id,
        path: path.to_string(),
        kind,
        title: title.to_string(),
        category: category.to_string(),
        summary: format!("{title} summary"),
    }
}

impl MemoryStore {
    pub(crate) fn with_references(mut self, references: Vec<ReferenceRecord>) -> Self {
        self.references = references;
        self
    }

    pub(crate) fn with_documents(mut self, documents: Vec<DocumentRecord>) -> Self {
        self.documents = documents;
        self
    }

    pub(crate) fn with_moved(mut self, old: &str, new: &str) -> Self {
        self.moved.push((old.to_lowercase(), new.to_string()));
        self
    }

    pub(crate) fn with_files(mut self, files: &[&str]) -> Self {
        self.files = files.iter().map(|path| path.to_string()).collect();
        self
    }

    pub(crate) fn failing(mut self) -> Self {
        self.failing = true;
        self
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn enter(&self) -> Result<(), RepoError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing {
            Err(RepoError::Persistence("store offline".into()))
        } else {
            Ok(())
        }
    }

    fn documents_of(&self, kind: DocumentKind) -> impl Iterator<Item = &DocumentRecord> {
        self.documents.iter().filter(move |doc| doc.kind == kind)
    }

    fn grouped(kind: CategoryKind, names: impl Iterator<Item = String>) -> Vec<Category> {
        let mut counts: Vec<(String, u64)> = Vec::new();
        for name in names {
            match counts.iter_mut().find(|(existing, _)| *existing == name) {
                Some((_, count)) => *count += 1,
                None => counts.push((name, 1)),
            }
        }
        counts.sort_by_key(|(name, _)| name.to_lowercase());
        counts
            .into_iter()
            .map(|(name, size)| Category::new(kind, name, size))
            .collect()
    }
}

fn term_matches(term: &SearchTerm, text: &str) -> bool {
    let haystack = format!(" {} ", text.to_lowercase());
    let needle = term.word.to_lowercase();
    if !term.requires_word_start() {
        return haystack.contains(&needle);
    }
    haystack.match_indices(&needle).any(|(index, _)| {
        haystack[..index]
            .chars()
            .next_back()
            .is_some_and(|c| !c.is_ascii_lowercase())
    })
}

fn query_matches(query: &SearchQuery, text: &str) -> bool {
    query
        .terms()
        .iter()
        .all(|term| term_matches(term, text) != term.negated)
}

#[async_trait]
impl ContentStore for MemoryStore {
    async fn find_category(
        &self,
        kind: CategoryKind,
        name: &str,
    ) -> Result<Option<Category>, RepoError> {
        self.enter()?;
        let categories = match kind {
            CategoryKind::Reference => Self::grouped(
                kind,
                self.references.iter().map(|r| r.module.clone()),
            ),
            CategoryKind::Document => Self::grouped(
                kind,
                self.documents_of(DocumentKind::Document)
                    .map(|d| d.category.clone()),
            ),
            CategoryKind::Sample => Self::grouped(
                kind,
                self.documents_of(DocumentKind::Sample)
                    .map(|d| d.category.clone()),
            ),
        };
        if let Some(found) = categories.iter().find(|c| c.name() == name) {
            return Ok(Some(found.clone()));
        }
        if !name.is_empty() {
            return Ok(None);
        }
        let fallback = match kind {
            CategoryKind::Reference => None,
            _ => categories.into_iter().next(),
        };
        Ok(Some(fallback.unwrap_or_else(|| Category::empty(kind))))
    }

    async fn list_categories(&self, kind: CategoryKind) -> Result<Vec<Category>, RepoError> {
        self.enter()?;
        Ok(match kind {
            CategoryKind::Reference => {
                Self::grouped(kind, self.references.iter().map(|r| r.module.clone()))
            }
            CategoryKind::Document => Self::grouped(
                kind,
                self.documents_of(DocumentKind::Document)
                    .map(|d| d.category.clone()),
            ),
            CategoryKind::Sample => Self::grouped(
                kind,
                self.documents_of(DocumentKind::Sample)
                    .map(|d| d.category.clone()),
            ),
        })
    }

    async fn find_reference(
        &self,
        module: &str,
        name: &str,
    ) -> Result<Option<ReferenceRecord>, RepoError> {
        self.enter()?;
        Ok(self
            .references
            .iter()
            .find(|r| {
                r.module == module && (r.name == name || r.name.to_lowercase() == name.to_lowercase())
            })
            .cloned())
    }

    async fn find_reference_by_id(&self, id: i64) -> Result<Option<ReferenceRecord>, RepoError> {
        self.enter()?;
        Ok(self.references.iter().find(|r| r.id == id).cloned())
    }

    async fn reference_key_by_name(&self, name: &str) -> Result<Option<ReferenceKey>, RepoError> {
        self.enter()?;
        let exact = self.references.iter().find(|r| r.name == name);
        let found = exact.or_else(|| {
            self.references
                .iter()
                .find(|r| r.name.to_lowercase() == name.to_lowercase())
        });
        Ok(found.map(ReferenceRecord::key))
    }

    async fn list_references(&self) -> Result<Vec<ReferenceKey>, RepoError> {
        self.enter()?;
        let mut keys: Vec<ReferenceKey> = self.references.iter().map(ReferenceRecord::key).collect();
        keys.sort_by_key(|k| k.name.to_lowercase());
        Ok(keys)
    }

    async fn category_references(&self, name: &str) -> Result<Vec<ReferenceRecord>, RepoError> {
        self.enter()?;
        let mut refs: Vec<ReferenceRecord> = self
            .references
            .iter()
            .filter(|r| r.module == name)
            .cloned()
            .collect();
        refs.sort_by_key(|r| r.name.to_lowercase());
        Ok(refs)
    }

    async fn find_document_by_path(
        &self,
        path: &str,
    ) -> Result<Option<DocumentRecord>, RepoError> {
        self.enter()?;
        let stored = path.replace('/', "\\");
        Ok(self.documents.iter().find(|d| d.path == stored).cloned())
    }

    async fn list_documents(
        &self,
        kind: Option<DocumentKind>,
    ) -> Result<Vec<DocumentRecord>, RepoError> {
        self.enter()?;
        Ok(self
            .documents
            .iter()
            .filter(|d| kind.is_none_or(|k| d.kind == k))
            .cloned()
            .collect())
    }

    async fn category_documents(
        &self,
        kind: DocumentKind,
        name: &str,
    ) -> Result<Vec<DocumentRecord>, RepoError> {
        self.enter()?;
        Ok(self
            .documents_of(kind)
            .filter(|d| d.category == name)
            .cloned()
            .collect())
    }

    async fn search_references(
        &self,
        query: &SearchQuery,
    ) -> Result<Vec<ReferenceRecord>, RepoError> {
        self.enter()?;
        Ok(self
            .references
            .iter()
            .filter(|r| query_matches(query, &format!("{} {} {}", r.name, r.module, r.summary)))
            .cloned()
            .collect())
    }

    async fn search_documents(
        &self,
        kind: DocumentKind,
        query: &SearchQuery,
    ) -> Result<Vec<DocumentRecord>, RepoError> {
        self.enter()?;
        Ok(self
            .documents_of(kind)
            .filter(|d| query_matches(query, &format!("{} {}", d.title, d.summary)))
            .cloned()
            .collect())
    }

    async fn samples_mentioning(&self, name: &str) -> Result<Vec<DocumentRecord>, RepoError> {
        self.enter()?;
        let mut samples: Vec<DocumentRecord> = self
            .documents_of(DocumentKind::Sample)
            .filter(|d| {
                format!(" {} ", d.summary)
                    .split(|c: char| !c.is_ascii_alphanumeric())
                    .any(|word| word == name)
            })
            .cloned()
            .collect();
        samples.sort_by_key(|d| d.title.to_lowercase());
        Ok(samples)
    }

    async fn file_path_by_basename(&self, basename: &str) -> Result<Option<String>, RepoError> {
        self.enter()?;
        let basename = basename.to_lowercase();
        Ok(self
            .files
            .iter()
            .find(|path| path.rsplit('/').next().is_some_and(|name| name.to_lowercase() == basename))
            .cloned())
    }

    async fn count_exact_reference_matches(&self, token: &str) -> Result<u64, RepoError> {
        self.enter()?;
        let token = token.to_lowercase();
        Ok(self
            .references
            .iter()
            .filter(|r| r.name.to_lowercase() == token || r.module.to_lowercase() == token)
            .count() as u64)
    }

    async fn search_token_matches(
        &self,
        patterns: &[NamePattern],
        window: LengthWindow,
    ) -> Result<Vec<String>, RepoError> {
        self.enter()?;
        let mut names: Vec<String> = self
            .references
            .iter()
            .filter(|r| window.contains(&r.name) && patterns.iter().any(|p| p.matches(&r.name)))
            .map(|r| r.name.clone())
            .collect();
        names.sort_by_key(|name| name.to_lowercase());
        Ok(names)
    }

    async fn lookup_moved(&self, old: &str) -> Result<Option<String>, RepoError> {
        self.enter()?;
        let old = old.to_lowercase();
        Ok(self
            .moved
            .iter()
            .find(|(stored, _)| *stored == old)
            .map(|(_, new)| new.clone()))
    }

    async fn list_moved_targets(&self) -> Result<Vec<String>, RepoError> {
        self.enter()?;
        Ok(self.moved.iter().map(|(_, new)| new.clone()).collect())
    }

    async fn stats(&self) -> Result<StoreStats, RepoError> {
        self.enter()?;
        Ok(StoreStats {
            engine_version: "memory".into(),
            references: self.references.len() as i64,
            documents: self.documents_of(DocumentKind::Document).count() as i64,
            samples: self.documents_of(DocumentKind::Sample).count() as i64,
            files: self.files.len() as i64,
            directories: 0,
        })
    }

    async fn build_name_index(&self) -> Result<(), RepoError> {
        self.enter()
    }

    async fn invalidate_name_index(&self) {}
}
