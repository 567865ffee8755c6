//! Domain entities mirrored from the library database.

use serde::Serialize;

/// Which family of categories a [`Category`] belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CategoryKind {
    Reference,
    Document,
    Sample,
}

impl CategoryKind {
    pub const ALL: [CategoryKind; 3] = [
        CategoryKind::Reference,
        CategoryKind::Document,
        CategoryKind::Sample,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            CategoryKind::Reference => "reference",
            CategoryKind::Document => "document",
            CategoryKind::Sample => "sample",
        }
    }

    /// Section heading shown on listing pages.
    pub fn label(self) -> &'static str {
        match self {
            CategoryKind::Reference => "リファレンス",
            CategoryKind::Document => "ドキュメント",
            CategoryKind::Sample => "サンプル",
        }
    }

    /// Display name of the unnamed category of this kind.
    pub fn default_name(self) -> &'static str {
        match self {
            CategoryKind::Reference => "標準機能",
            CategoryKind::Document | CategoryKind::Sample => "標準カテゴリ",
        }
    }
}

/// A named grouping of references, documents or samples.
///
/// The empty name denotes the default category of a kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Category {
    kind: CategoryKind,
    name: String,
    size: u64,
}

impl Category {
    pub fn new(kind: CategoryKind, name: impl Into<String>, size: u64) -> Self {
        Self {
            kind,
            name: name.into(),
            size,
        }
    }

    /// Default category with no members.
    pub fn empty(kind: CategoryKind) -> Self {
        Self::new(kind, String::new(), 0)
    }

    pub fn kind(&self) -> CategoryKind {
        self.kind
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn is_default(&self) -> bool {
        self.name.is_empty()
    }

    /// Name for display; the default category gets a placeholder.
    pub fn display_name(&self) -> &str {
        if self.name.is_empty() {
            self.kind.default_name()
        } else {
            &self.name
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReferenceRecord {
    pub id: i64,
    pub name: String,
    pub module: String,
    pub summary: String,
    pub version: String,
    pub date: String,
    pub author: String,
    pub group: String,
    pub prm: String,
    pub prm2: String,
    pub inst: String,
    pub sample: String,
    pub href: String,
    pub portinf: String,
    pub port: String,
    pub url: String,
    pub kind: String,
    pub note: String,
    pub path: String,
}

impl ReferenceRecord {
    /// Entries without a module belong to the built-in set.
    pub fn is_builtin(&self) -> bool {
        self.module.is_empty()
    }

    pub fn key(&self) -> ReferenceKey {
        ReferenceKey {
            id: self.id,
            module: self.module.clone(),
            name: self.name.clone(),
        }
    }
}

/// Value type of the reference name index.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ReferenceKey {
    pub id: i64,
    pub module: String,
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    Document,
    Sample,
}

impl DocumentKind {
    pub fn category_kind(self) -> CategoryKind {
        match self {
            DocumentKind::Document => CategoryKind::Document,
            DocumentKind::Sample => CategoryKind::Sample,
        }
    }

    /// Maps the stored `Type` column; `hsp` rows are samples.
    pub fn from_type_column(value: &str) -> Self {
        if value == "hsp" {
            DocumentKind::Sample
        } else {
            DocumentKind::Document
        }
    }
}

/// A document or sample page. `path` keeps the stored `\` separators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocumentRecord {
    pub id: i64,
    pub path: String,
    pub kind: DocumentKind,
    pub title: String,
    pub category: String,
    pub summary: String,
}

impl DocumentRecord {
    pub fn is_sample(&self) -> bool {
        self.kind == DocumentKind::Sample
    }

    /// Path with `/` separators, relative to the content root.
    pub fn relative_path(&self) -> String {
        self.path.replace('\\', "/")
    }
}

/// A renamed or relocated path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MovedEntry {
    pub old: String,
    pub new: String,
}

/// Corpus totals shown on the version page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    pub engine_version: String,
    pub references: i64,
    pub documents: i64,
    pub samples: i64,
    pub files: i64,
    pub directories: i64,
}
