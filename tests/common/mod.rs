#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;

use ohdl::application::render::Renderer;
use ohdl::application::repos::ContentStore;
use ohdl::application::router::Router;
use ohdl::application::site::Site;
use ohdl::cache::CacheReader;
use ohdl::infra::db::SqliteRepositories;
use ohdl::infra::files::ContentFiles;
use ohdl::presentation::{TemplateRenderer, UriMapper};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use tempfile::TempDir;

pub const BASE_URI: &str = "http://localhost/";

const SCHEMA: &[&str] = &[
    "CREATE TABLE Help (ID INTEGER PRIMARY KEY, Name TEXT, Mod TEXT, Summary TEXT, Ver TEXT, \
     Date TEXT, Author TEXT, Group3 TEXT, Prm TEXT, Prm2 TEXT, Inst TEXT, Sample TEXT, \
     Href TEXT, Portinf TEXT, Port TEXT, Url TEXT, Type TEXT, Note TEXT, Path TEXT)",
    "CREATE TABLE Docs (ID INTEGER PRIMARY KEY, Path TEXT, Type TEXT, Title TEXT, \
     Catego TEXT, Search TEXT, SmryIdx INTEGER)",
    "CREATE TABLE Files (ID INTEGER PRIMARY KEY, Path TEXT, Fn TEXT)",
    "CREATE TABLE Dir (ID INTEGER PRIMARY KEY, Path TEXT)",
    "CREATE TABLE Moved (ID INTEGER PRIMARY KEY, Old TEXT, New TEXT)",
];

const ROWS: &[&str] = &[
    "INSERT INTO Help (ID, Name, Mod, Summary, Group3, Prm, Inst, Href, Port) VALUES \
     (1, 'mes', NULL, 'メッセージ表示', '画面制御', '\"strings\"', \
      '文字列を表示します。intro.txt も参照。', 'color', 'Win Let')",
    "INSERT INTO Help (ID, Name, Mod, Summary, Group3) VALUES \
     (2, 'color', '', 'カラー設定', '画面制御')",
    "INSERT INTO Help (ID, Name, Mod, Summary, Path) VALUES \
     (3, 'emes', 'hspext', '拡張メッセージ', 'common/hspext.as')",
    "INSERT INTO Docs VALUES \
     (10, 'doclib\\intro.txt', 'txt', 'Intro', '入門', 'Intro 最初に読む文書です。 mes の使い方', 7)",
    "INSERT INTO Docs VALUES \
     (11, 'sample\\demo\\hello.hsp', 'hsp', 'Hello', 'demo', 'Hello sample calls mes once', 7)",
    "INSERT INTO Files VALUES (1, 'doclib\\intro.txt', 'intro.txt')",
    "INSERT INTO Files VALUES (2, 'doclib\\extra.txt', 'extra.txt')",
    "INSERT INTO Dir VALUES (1, 'doclib')",
    "INSERT INTO Moved VALUES (1, 'docs/old.txt', 'doclib/intro.txt')",
];

const CONTENT: &[(&str, &str)] = &[
    ("doclib/intro.txt", "Intro\nmes を使って文字を表示します。\n"),
    ("doclib/extra.txt", "extra notes\n"),
    ("sample/demo/hello.hsp", "mes \"hello\"\nstop\n"),
];

/// A library database and content tree in temporary directories.
pub struct Library {
    pub dir: TempDir,
    pub store: Arc<SqliteRepositories>,
    pub renderer: Arc<TemplateRenderer>,
    pub files: ContentFiles,
}

impl Library {
    pub async fn create() -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let db_path = dir.path().join("hdlbase.xdb");
        seed_database(&db_path).await;

        let content_root = dir.path().join("content");
        for (path, text) in CONTENT {
            let target = content_root.join(path);
            std::fs::create_dir_all(target.parent().expect("parent")).expect("mkdir");
            std::fs::write(&target, text).expect("write content");
        }

        let pool = SqliteRepositories::connect(&db_path, 2)
            .await
            .expect("open library");
        let store = Arc::new(SqliteRepositories::new(pool));
        store.build_name_index().await.expect("name index");

        let dyn_store: Arc<dyn ContentStore> = store.clone();
        let renderer = Arc::new(TemplateRenderer::new(dyn_store, UriMapper::new(BASE_URI)));

        Self {
            dir,
            store,
            renderer,
            files: ContentFiles::new(content_root),
        }
    }

    pub fn db_path(&self) -> std::path::PathBuf {
        self.dir.path().join("hdlbase.xdb")
    }

    /// Runs `statement` through a separate read-write connection, standing in
    /// for an external tool updating the library file.
    pub async fn execute(&self, statement: &str) {
        let options = SqliteConnectOptions::new().filename(self.db_path());
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .expect("open writable connection");
        sqlx::query(statement)
            .execute(&pool)
            .await
            .unwrap_or_else(|err| panic!("execute `{statement}`: {err}"));
        pool.close().await;
    }

    pub fn cache_root(&self) -> std::path::PathBuf {
        self.dir.path().join("cache")
    }

    pub fn site(&self, cache: CacheReader) -> Site {
        let store: Arc<dyn ContentStore> = self.store.clone();
        let renderer: Arc<dyn Renderer> = self.renderer.clone();
        Site::new(
            store,
            renderer,
            Router::new("/", BASE_URI),
            cache,
            self.files.clone(),
        )
    }
}

async fn seed_database(path: &Path) {
    let options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await
        .expect("create database");
    for statement in SCHEMA.iter().chain(ROWS) {
        sqlx::query(statement)
            .execute(&pool)
            .await
            .unwrap_or_else(|err| panic!("seed `{statement}`: {err}"));
    }
    pool.close().await;
}
