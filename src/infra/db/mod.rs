//! SQLite-backed content store over the library database.

mod content;
mod util;

pub use util::map_sqlx_error;

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, PoisonError, RwLock};

use sqlx::{
    query,
    sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions},
};

use crate::application::repos::RepoError;
use crate::domain::entities::ReferenceKey;

/// In-memory reference name lookup, built on demand.
#[derive(Debug, Default)]
struct NameIndex {
    exact: HashMap<String, ReferenceKey>,
    folded: HashMap<String, ReferenceKey>,
}

impl NameIndex {
    fn from_keys(keys: Vec<ReferenceKey>) -> Self {
        let mut index = NameIndex::default();
        for key in keys {
            index
                .folded
                .entry(key.name.to_lowercase())
                .or_insert_with(|| key.clone());
            index.exact.entry(key.name.clone()).or_insert(key);
        }
        index
    }

    fn lookup(&self, name: &str) -> Option<ReferenceKey> {
        self.exact
            .get(name)
            .or_else(|| self.folded.get(&name.to_lowercase()))
            .cloned()
    }
}

#[derive(Clone)]
pub struct SqliteRepositories {
    pool: Arc<SqlitePool>,
    name_index: Arc<RwLock<Option<NameIndex>>>,
}

impl SqliteRepositories {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool: Arc::new(pool),
            name_index: Arc::new(RwLock::new(None)),
        }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Opens the library database read-only.
    pub async fn connect(path: &Path, max_connections: u32) -> Result<SqlitePool, sqlx::Error> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .read_only(true);
        SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await
    }

    pub async fn health_check(&self) -> Result<(), sqlx::Error> {
        query("SELECT 1").execute(self.pool()).await.map(|_| ())
    }

    fn indexed_key(&self, name: &str) -> Option<Option<ReferenceKey>> {
        let guard = self
            .name_index
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        guard.as_ref().map(|index| index.lookup(name))
    }

    fn install_index(&self, index: Option<NameIndex>) {
        let mut guard = self
            .name_index
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        *guard = index;
    }

    fn convert_count(value: i64) -> Result<u64, RepoError> {
        value
            .try_into()
            .map_err(|_| RepoError::from_persistence("count exceeds supported range"))
    }
}
