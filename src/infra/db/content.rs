use async_trait::async_trait;
use sqlx::{QueryBuilder, Sqlite};

use crate::application::repos::{
    ContentStore, LengthWindow, NamePattern, RepoError, SearchQuery, SearchTerm,
};
use crate::domain::entities::{
    Category, CategoryKind, DocumentKind, DocumentRecord, ReferenceKey, ReferenceRecord,
    StoreStats,
};

use super::util::{escape_glob, escape_like, map_sqlx_error};
use super::{NameIndex, SqliteRepositories};

const REFERENCE_COLUMNS: &str = "ID AS id, COALESCE(Name, '') AS name, \
    COALESCE(Mod, '') AS module, COALESCE(Summary, '') AS summary, \
    COALESCE(Ver, '') AS version, COALESCE(Date, '') AS date, \
    COALESCE(Author, '') AS author, COALESCE(Group3, '') AS grp, \
    COALESCE(Prm, '') AS prm, COALESCE(Prm2, '') AS prm2, \
    COALESCE(Inst, '') AS inst, COALESCE(Sample, '') AS sample, \
    COALESCE(Href, '') AS href, COALESCE(Portinf, '') AS portinf, \
    COALESCE(Port, '') AS port, COALESCE(Url, '') AS url, \
    COALESCE(Type, '') AS kind, COALESCE(Note, '') AS note, \
    COALESCE(Path, '') AS path";

const DOCUMENT_COLUMNS: &str = "ID AS id, COALESCE(Path, '') AS path, \
    COALESCE(Type, '') AS doc_type, COALESCE(Title, '') AS title, \
    COALESCE(Catego, '') AS category, \
    COALESCE(substr(Search, SmryIdx, 250), '') AS summary";

/// Every textual reference field joined by spaces; the full-text target.
const REFERENCE_SEARCH_TARGET: &str = "(COALESCE(Name, '') || ' ' || \
    COALESCE(Summary, '') || ' ' || COALESCE(Mod, '') || ' ' || \
    COALESCE(Ver, '') || ' ' || COALESCE(Date, '') || ' ' || \
    COALESCE(Author, '') || ' ' || COALESCE(Group3, '') || ' ' || \
    COALESCE(Prm, '') || ' ' || COALESCE(Prm2, '') || ' ' || \
    COALESCE(Inst, '') || ' ' || COALESCE(Sample, '') || ' ' || \
    COALESCE(Href, '') || ' ' || COALESCE(Portinf, '') || ' ' || \
    COALESCE(Port, '') || ' ' || COALESCE(Url, '') || ' ' || \
    COALESCE(Type, '') || ' ' || COALESCE(Note, '') || ' ' || \
    COALESCE(Path, ''))";

const DOCUMENT_SEARCH_TARGET: &str = "COALESCE(Search, '')";

#[derive(sqlx::FromRow)]
struct ReferenceRow {
    id: i64,
    name: String,
    module: String,
    summary: String,
    version: String,
    date: String,
    author: String,
    grp: String,
    prm: String,
    prm2: String,
    inst: String,
    sample: String,
    href: String,
    portinf: String,
    port: String,
    url: String,
    kind: String,
    note: String,
    path: String,
}

impl From<ReferenceRow> for ReferenceRecord {
    fn from(row: ReferenceRow) -> Self {
        ReferenceRecord {
            id: row.id,
            name: row.name,
            module: row.module,
            summary: row.summary,
            version: row.version,
            date: row.date,
            author: row.author,
            group: row.grp,
            prm: row.prm,
            prm2: row.prm2,
            inst: row.inst,
            sample: row.sample,
            href: row.href,
            portinf: row.portinf,
            port: row.port,
            url: row.url,
            kind: row.kind,
            note: row.note,
            path: row.path,
        }
    }
}

#[derive(sqlx::FromRow)]
struct DocumentRow {
    id: i64,
    path: String,
    doc_type: String,
    title: String,
    category: String,
    summary: String,
}

impl From<DocumentRow> for DocumentRecord {
    fn from(row: DocumentRow) -> Self {
        DocumentRecord {
            id: row.id,
            kind: DocumentKind::from_type_column(&row.doc_type),
            path: row.path,
            title: row.title,
            category: row.category,
            summary: row.summary,
        }
    }
}

#[derive(sqlx::FromRow)]
struct KeyRow {
    id: i64,
    module: String,
    name: String,
}

impl From<KeyRow> for ReferenceKey {
    fn from(row: KeyRow) -> Self {
        ReferenceKey {
            id: row.id,
            module: row.module,
            name: row.name,
        }
    }
}

#[derive(sqlx::FromRow)]
struct CategoryRow {
    name: String,
    size: i64,
}

impl CategoryRow {
    fn into_category(self, kind: CategoryKind) -> Result<Category, RepoError> {
        let size = SqliteRepositories::convert_count(self.size)?;
        Ok(Category::new(kind, self.name, size))
    }
}

fn type_filter(kind: DocumentKind) -> &'static str {
    match kind {
        DocumentKind::Sample => "COALESCE(Type, '') = 'hsp'",
        DocumentKind::Document => "COALESCE(Type, '') != 'hsp'",
    }
}

fn document_kind(kind: CategoryKind) -> Option<DocumentKind> {
    match kind {
        CategoryKind::Reference => None,
        CategoryKind::Document => Some(DocumentKind::Document),
        CategoryKind::Sample => Some(DocumentKind::Sample),
    }
}

/// Appends one `AND [NOT] (...)` clause per search term.
fn push_search_terms(builder: &mut QueryBuilder<'_, Sqlite>, target: &str, terms: &[SearchTerm]) {
    for term in terms {
        builder.push(" AND ");
        if term.negated {
            builder.push("NOT ");
        }
        builder.push("(");
        builder.push(target);
        builder.push(" LIKE ");
        builder.push_bind(format!("%{}%", escape_like(&term.word)));
        builder.push(" ESCAPE '\\'");
        if term.requires_word_start() {
            builder.push(" AND lower(' ' || ");
            builder.push(target);
            builder.push(" || ' ') GLOB lower(");
            builder.push_bind(format!("*[^a-z]{}*", escape_glob(&term.word)));
            builder.push(")");
        }
        builder.push(")");
    }
}

impl SqliteRepositories {
    async fn find_reference_category(&self, name: &str) -> Result<Option<Category>, RepoError> {
        let row = sqlx::query_as::<_, CategoryRow>(
            "SELECT COALESCE(Mod, '') AS name, count(ID) AS size \
             FROM Help WHERE COALESCE(Mod, '') = ? GROUP BY COALESCE(Mod, '')",
        )
        .bind(name)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        match row {
            Some(row) => row.into_category(CategoryKind::Reference).map(Some),
            None if name.is_empty() => Ok(Some(Category::empty(CategoryKind::Reference))),
            None => Ok(None),
        }
    }

    async fn find_document_category(
        &self,
        kind: DocumentKind,
        name: &str,
    ) -> Result<Option<Category>, RepoError> {
        let category_kind = kind.category_kind();
        let sql = format!(
            "SELECT COALESCE(Catego, '') AS name, count(ID) AS size FROM Docs \
             WHERE {} AND COALESCE(Catego, '') = ? GROUP BY COALESCE(Catego, '')",
            type_filter(kind)
        );
        let row = sqlx::query_as::<_, CategoryRow>(&sql)
            .bind(name)
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        if let Some(row) = row {
            return row.into_category(category_kind).map(Some);
        }
        if !name.is_empty() {
            return Ok(None);
        }

        let sql = format!(
            "SELECT COALESCE(Catego, '') AS name, count(ID) AS size FROM Docs \
             WHERE {} GROUP BY COALESCE(Catego, '') \
             ORDER BY lower(COALESCE(Catego, '')) LIMIT 1",
            type_filter(kind)
        );
        let first = sqlx::query_as::<_, CategoryRow>(&sql)
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        match first {
            Some(row) => row.into_category(category_kind).map(Some),
            None => Ok(Some(Category::empty(category_kind))),
        }
    }

    async fn fetch_name_keys(&self) -> Result<Vec<ReferenceKey>, RepoError> {
        let rows = sqlx::query_as::<_, KeyRow>(
            "SELECT ID AS id, COALESCE(Mod, '') AS module, COALESCE(Name, '') AS name \
             FROM Help ORDER BY ID",
        )
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(ReferenceKey::from).collect())
    }

    async fn count(&self, sql: &str) -> Result<i64, RepoError> {
        sqlx::query_scalar::<_, i64>(sql)
            .fetch_one(self.pool())
            .await
            .map_err(map_sqlx_error)
    }
}

#[async_trait]
impl ContentStore for SqliteRepositories {
    async fn find_category(
        &self,
        kind: CategoryKind,
        name: &str,
    ) -> Result<Option<Category>, RepoError> {
        match document_kind(kind) {
            None => self.find_reference_category(name).await,
            Some(kind) => self.find_document_category(kind, name).await,
        }
    }

    async fn list_categories(&self, kind: CategoryKind) -> Result<Vec<Category>, RepoError> {
        let sql = match document_kind(kind) {
            None => "SELECT COALESCE(Mod, '') AS name, count(ID) AS size FROM Help \
                     GROUP BY COALESCE(Mod, '') ORDER BY lower(COALESCE(Mod, ''))"
                .to_string(),
            Some(doc_kind) => format!(
                "SELECT COALESCE(Catego, '') AS name, count(ID) AS size FROM Docs \
                 WHERE {} GROUP BY COALESCE(Catego, '') \
                 ORDER BY lower(COALESCE(Catego, ''))",
                type_filter(doc_kind)
            ),
        };

        let rows = sqlx::query_as::<_, CategoryRow>(&sql)
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        rows.into_iter()
            .map(|row| row.into_category(kind))
            .collect()
    }

    async fn find_reference(
        &self,
        module: &str,
        name: &str,
    ) -> Result<Option<ReferenceRecord>, RepoError> {
        let sql = format!(
            "SELECT {REFERENCE_COLUMNS} FROM Help \
             WHERE (Name = ? OR lower(Name) = lower(?)) AND COALESCE(Mod, '') = ? \
             ORDER BY Name = ? DESC, ID LIMIT 1"
        );
        let row = sqlx::query_as::<_, ReferenceRow>(&sql)
            .bind(name)
            .bind(name)
            .bind(module)
            .bind(name)
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(row.map(ReferenceRecord::from))
    }

    async fn find_reference_by_id(&self, id: i64) -> Result<Option<ReferenceRecord>, RepoError> {
        let sql = format!("SELECT {REFERENCE_COLUMNS} FROM Help WHERE ID = ?");
        let row = sqlx::query_as::<_, ReferenceRow>(&sql)
            .bind(id)
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(row.map(ReferenceRecord::from))
    }

    async fn reference_key_by_name(&self, name: &str) -> Result<Option<ReferenceKey>, RepoError> {
        if let Some(found) = self.indexed_key(name) {
            return Ok(found);
        }

        let row = sqlx::query_as::<_, KeyRow>(
            "SELECT ID AS id, COALESCE(Mod, '') AS module, COALESCE(Name, '') AS name \
             FROM Help WHERE Name = ? OR lower(Name) = lower(?) \
             ORDER BY Name = ? DESC, ID LIMIT 1",
        )
        .bind(name)
        .bind(name)
        .bind(name)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(ReferenceKey::from))
    }

    async fn list_references(&self) -> Result<Vec<ReferenceKey>, RepoError> {
        let rows = sqlx::query_as::<_, KeyRow>(
            "SELECT ID AS id, COALESCE(Mod, '') AS module, COALESCE(Name, '') AS name \
             FROM Help ORDER BY lower(Mod), lower(Group3), lower(Name)",
        )
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(ReferenceKey::from).collect())
    }

    async fn category_references(&self, name: &str) -> Result<Vec<ReferenceRecord>, RepoError> {
        let sql = format!(
            "SELECT {REFERENCE_COLUMNS} FROM Help WHERE COALESCE(Mod, '') = ? \
             ORDER BY lower(Group3), Group3, lower(Name)"
        );
        let rows = sqlx::query_as::<_, ReferenceRow>(&sql)
            .bind(name)
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(ReferenceRecord::from).collect())
    }

    async fn find_document_by_path(
        &self,
        path: &str,
    ) -> Result<Option<DocumentRecord>, RepoError> {
        let sql = format!("SELECT {DOCUMENT_COLUMNS} FROM Docs WHERE Path = ? LIMIT 1");
        let row = sqlx::query_as::<_, DocumentRow>(&sql)
            .bind(path.replace('/', "\\"))
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(row.map(DocumentRecord::from))
    }

    async fn list_documents(
        &self,
        kind: Option<DocumentKind>,
    ) -> Result<Vec<DocumentRecord>, RepoError> {
        let filter = kind.map(type_filter).unwrap_or("1 = 1");
        let sql = format!(
            "SELECT {DOCUMENT_COLUMNS} FROM Docs WHERE {filter} \
             ORDER BY lower(Catego), lower(Title)"
        );
        let rows = sqlx::query_as::<_, DocumentRow>(&sql)
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(DocumentRecord::from).collect())
    }

    async fn category_documents(
        &self,
        kind: DocumentKind,
        name: &str,
    ) -> Result<Vec<DocumentRecord>, RepoError> {
        let sql = format!(
            "SELECT {DOCUMENT_COLUMNS} FROM Docs \
             WHERE COALESCE(Catego, '') = ? AND {} \
             ORDER BY lower(Title), lower(Path)",
            type_filter(kind)
        );
        let rows = sqlx::query_as::<_, DocumentRow>(&sql)
            .bind(name)
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(DocumentRecord::from).collect())
    }

    async fn search_references(
        &self,
        query: &SearchQuery,
    ) -> Result<Vec<ReferenceRecord>, RepoError> {
        let mut builder: QueryBuilder<'_, Sqlite> =
            QueryBuilder::new(format!("SELECT {REFERENCE_COLUMNS} FROM Help WHERE 1 = 1"));
        push_search_terms(&mut builder, REFERENCE_SEARCH_TARGET, query.terms());
        builder.push(" ORDER BY lower(Mod), lower(Group3), Group3, lower(Name)");

        let rows = builder
            .build_query_as::<ReferenceRow>()
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(ReferenceRecord::from).collect())
    }

    async fn search_documents(
        &self,
        kind: DocumentKind,
        query: &SearchQuery,
    ) -> Result<Vec<DocumentRecord>, RepoError> {
        let mut builder: QueryBuilder<'_, Sqlite> = QueryBuilder::new(format!(
            "SELECT {DOCUMENT_COLUMNS} FROM Docs WHERE {}",
            type_filter(kind)
        ));
        push_search_terms(&mut builder, DOCUMENT_SEARCH_TARGET, query.terms());
        builder.push(" ORDER BY lower(Catego), lower(Title), lower(Path)");

        let rows = builder
            .build_query_as::<DocumentRow>()
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(DocumentRecord::from).collect())
    }

    async fn samples_mentioning(&self, name: &str) -> Result<Vec<DocumentRecord>, RepoError> {
        let sql = format!(
            "SELECT {DOCUMENT_COLUMNS} FROM Docs WHERE {} \
             AND Search LIKE ? ESCAPE '\\' AND Search GLOB ? ORDER BY lower(Title)",
            type_filter(DocumentKind::Sample)
        );
        let rows = sqlx::query_as::<_, DocumentRow>(&sql)
            .bind(format!("%{}%", escape_like(name)))
            .bind(format!("*[^0-9a-z]{}[^0-9a-z]*", escape_glob(name)))
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(DocumentRecord::from).collect())
    }

    async fn file_path_by_basename(&self, basename: &str) -> Result<Option<String>, RepoError> {
        let path = sqlx::query_scalar::<_, String>(
            "SELECT Path FROM Files WHERE Fn = lower(?) ORDER BY ID LIMIT 1",
        )
        .bind(basename)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(path.map(|path| path.replace('\\', "/")))
    }

    async fn count_exact_reference_matches(&self, token: &str) -> Result<u64, RepoError> {
        let pattern = escape_like(token);
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT count(*) FROM Help \
             WHERE Name LIKE ? ESCAPE '\\' OR Mod LIKE ? ESCAPE '\\'",
        )
        .bind(&pattern)
        .bind(&pattern)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Self::convert_count(count)
    }

    async fn search_token_matches(
        &self,
        patterns: &[NamePattern],
        window: LengthWindow,
    ) -> Result<Vec<String>, RepoError> {
        if patterns.is_empty() {
            return Ok(Vec::new());
        }

        let mut builder: QueryBuilder<'_, Sqlite> =
            QueryBuilder::new("SELECT COALESCE(Name, '') FROM Help WHERE (");
        let mut alternatives = builder.separated(" OR ");
        for pattern in patterns {
            alternatives.push("Name LIKE ");
            alternatives.push_bind_unseparated(format!(
                "{}%{}",
                escape_like(&pattern.prefix),
                escape_like(&pattern.suffix)
            ));
            alternatives.push_unseparated(" ESCAPE '\\'");
        }
        builder.push(") AND length(Name) BETWEEN ");
        builder.push_bind(window.min as i64);
        builder.push(" AND ");
        builder.push_bind(window.max as i64);
        builder.push(" ORDER BY lower(Name)");

        builder
            .build_query_scalar::<String>()
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)
    }

    async fn lookup_moved(&self, old: &str) -> Result<Option<String>, RepoError> {
        sqlx::query_scalar::<_, String>(
            "SELECT New FROM Moved WHERE Old = lower(?) ORDER BY ID LIMIT 1",
        )
        .bind(old)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)
    }

    async fn list_moved_targets(&self) -> Result<Vec<String>, RepoError> {
        sqlx::query_scalar::<_, String>("SELECT New FROM Moved ORDER BY ID")
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)
    }

    async fn stats(&self) -> Result<StoreStats, RepoError> {
        let engine_version = sqlx::query_scalar::<_, String>("SELECT sqlite_version()")
            .fetch_one(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(StoreStats {
            engine_version,
            references: self.count("SELECT count(ID) FROM Help").await?,
            documents: self
                .count("SELECT count(ID) FROM Docs WHERE COALESCE(Type, '') != 'hsp'")
                .await?,
            samples: self
                .count("SELECT count(ID) FROM Docs WHERE COALESCE(Type, '') = 'hsp'")
                .await?,
            files: self.count("SELECT count(ID) FROM Files").await?,
            directories: self.count("SELECT count(ID) FROM Dir").await?,
        })
    }

    async fn build_name_index(&self) -> Result<(), RepoError> {
        let keys = self.fetch_name_keys().await?;
        let size = keys.len();
        self.install_index(Some(NameIndex::from_keys(keys)));
        tracing::info!(target = "ohdl::db", names = size, "reference name index built");
        Ok(())
    }

    async fn invalidate_name_index(&self) {
        self.install_index(None);
    }
}
