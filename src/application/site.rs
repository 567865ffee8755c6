//! Per-request screen pipeline: route, consult the cache, render.

use std::sync::Arc;

use bytes::Bytes;
use time::OffsetDateTime;
use tracing::{debug, warn};
use url::Url;

use crate::{
    application::{
        error::AppError,
        highlight,
        render::{Page, Renderer},
        repos::ContentStore,
        router::Router,
    },
    cache::{CacheKey, CacheReader},
    domain::{codec::escape_html, command::Command, entities::DocumentRecord},
    infra::files::ContentFiles,
};

const HTML: &str = "text/html";
const UTF8: &str = "UTF-8";

/// The parts of an HTTP request the pipeline looks at.
#[derive(Debug, Clone, Default)]
pub struct IncomingRequest {
    /// Raw, still percent-encoded path.
    pub path: String,
    pub query: Option<String>,
    pub referer: Option<String>,
    pub host: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScreenStatus {
    Ok,
    NotFound,
    Moved,
}

/// A finished response, independent of the HTTP framework.
#[derive(Debug, Clone)]
pub struct Screen {
    pub status: ScreenStatus,
    pub content_type: &'static str,
    pub charset: Option<&'static str>,
    pub location: Option<String>,
    pub last_modified: Option<OffsetDateTime>,
    pub body: Bytes,
}

impl Screen {
    fn html(status: ScreenStatus, body: Bytes) -> Self {
        Self::typed(status, HTML, body)
    }

    fn typed(status: ScreenStatus, content_type: &'static str, body: Bytes) -> Self {
        Self {
            status,
            content_type,
            charset: Some(UTF8),
            location: None,
            last_modified: None,
            body,
        }
    }

    fn moved(uri: String) -> Self {
        let escaped = escape_html(&uri);
        let body = format!(
            "<title>Document Moved</title>\n<h1>Document Moved</h1>\n\
             <p><a href=\"{escaped}\">{escaped}</a></p>\n"
        );
        Self {
            location: Some(uri),
            ..Self::html(ScreenStatus::Moved, Bytes::from(body))
        }
    }
}

pub struct Site {
    store: Arc<dyn ContentStore>,
    renderer: Arc<dyn Renderer>,
    router: Router,
    cache: CacheReader,
    files: ContentFiles,
}

impl Site {
    pub fn new(
        store: Arc<dyn ContentStore>,
        renderer: Arc<dyn Renderer>,
        router: Router,
        cache: CacheReader,
        files: ContentFiles,
    ) -> Self {
        Self {
            store,
            renderer,
            router,
            cache,
            files,
        }
    }

    pub async fn resolve(&self, path: &str, query: Option<&str>) -> Command {
        self.router.resolve(self.store.as_ref(), path, query).await
    }

    pub async fn handle(&self, request: &IncomingRequest) -> Result<Screen, AppError> {
        let command = self.resolve(&request.path, request.query.as_deref()).await;
        debug!(
            target = "ohdl::site",
            path = %request.path,
            command = command.name(),
            "request resolved"
        );

        match command {
            Command::NotFound(uri) => self.not_found(&uri).await,
            Command::FrameSet(query) => {
                let query = query.unwrap_or_default();
                let body = if query.is_empty() {
                    self.cached(CacheKey::FrameSet, Page::FrameSet { query: "" })
                        .await?
                } else {
                    self.renderer.render(Page::FrameSet { query: &query }).await?
                };
                Ok(Screen::html(ScreenStatus::Ok, body))
            }
            Command::Menu(query) => {
                let query = query.as_deref().unwrap_or("").trim();
                if query.is_empty() {
                    let body = self.cached(CacheKey::Menu, Page::Menu { query: "" }).await?;
                    return Ok(Screen::html(ScreenStatus::Ok, body));
                }
                let body = self.renderer.render(Page::Menu { query }).await?;
                Ok(Screen::html(
                    ScreenStatus::Ok,
                    highlight::emphasize(&body, query),
                ))
            }
            Command::VerInfo => self.cached_html(CacheKey::VerInfo, Page::VerInfo).await,
            Command::Home => self.cached_html(CacheKey::Home, Page::Home).await,
            Command::OpenSearch => {
                let body = self.cached(CacheKey::OpenSearch, Page::OpenSearch).await?;
                Ok(Screen::typed(
                    ScreenStatus::Ok,
                    "application/opensearchdescription+xml",
                    body,
                ))
            }
            Command::FunctionListScript => {
                let body = self
                    .cached(CacheKey::FunctionList, Page::FunctionList)
                    .await?;
                Ok(Screen::typed(ScreenStatus::Ok, "text/javascript", body))
            }
            Command::ReferenceCategory(category)
            | Command::DocCategory(category)
            | Command::SampleCategory(category) => {
                self.cached_html(CacheKey::category(&category), Page::Category(&category))
                    .await
            }
            Command::Reference(reference) => {
                let body = self
                    .cached(CacheKey::Reference(reference.id), Page::Reference(&reference))
                    .await?;
                let keyword = self.referer_keyword(request, None).await;
                Ok(Screen::html(
                    ScreenStatus::Ok,
                    emphasize_with(body, keyword.as_deref()),
                ))
            }
            Command::DocOrSample(document) => {
                let content = self.document_content(&document).await;
                let status = if content.is_some() {
                    ScreenStatus::Ok
                } else {
                    ScreenStatus::NotFound
                };
                let page = Page::Document {
                    document: &document,
                    content: content.as_deref(),
                };
                let body = self.cached(CacheKey::Document(document.id), page).await?;
                let keyword = self.referer_keyword(request, Some(&document)).await;
                Ok(Screen::html(status, emphasize_with(body, keyword.as_deref())))
            }
            Command::Moved(uri) => Ok(Screen::moved(uri)),
            Command::PlainText { path, uri } => match self.files.read_plain(&path).await {
                Ok(Some(file)) => Ok(Screen {
                    charset: None,
                    last_modified: file.modified,
                    ..Screen::typed(ScreenStatus::Ok, "text/plain", file.bytes)
                }),
                Ok(None) => self.not_found(&uri).await,
                Err(err) => {
                    warn!(target = "ohdl::site", path = %path, error = %err, "plain file unreadable");
                    self.not_found(&uri).await
                }
            },
        }
    }

    async fn not_found(&self, uri: &str) -> Result<Screen, AppError> {
        let body = self.renderer.render(Page::NotFound { uri }).await?;
        Ok(Screen::html(ScreenStatus::NotFound, body))
    }

    async fn cached_html(&self, key: CacheKey, page: Page<'_>) -> Result<Screen, AppError> {
        let body = self.cached(key, page).await?;
        Ok(Screen::html(ScreenStatus::Ok, body))
    }

    /// Stored bytes for `key`, or a fresh rendering of `page`.
    async fn cached(&self, key: CacheKey, page: Page<'_>) -> Result<Bytes, AppError> {
        if let Some(bytes) = self.cache.read(&key).await {
            return Ok(bytes);
        }
        Ok(self.renderer.render(page).await?)
    }

    async fn document_content(&self, document: &DocumentRecord) -> Option<String> {
        self.files
            .read_text(&document.path)
            .await
            .unwrap_or_else(|err| {
                warn!(
                    target = "ohdl::site",
                    path = %document.path,
                    error = %err,
                    "document file unreadable"
                );
                None
            })
    }

    /// Recovers the search keyword a visitor arrived with from `Referer`.
    ///
    /// Only same-host referers count. A menu search yields its query; a
    /// sample opened from a reference page yields the reference name.
    async fn referer_keyword(
        &self,
        request: &IncomingRequest,
        document: Option<&DocumentRecord>,
    ) -> Option<String> {
        let referer = Url::parse(request.referer.as_deref()?).ok()?;
        if !same_origin(&referer, request.host.as_deref()?) {
            return None;
        }

        match self.resolve(referer.path(), referer.query()).await {
            Command::Reference(reference) if document.is_some_and(DocumentRecord::is_sample) => {
                Some(reference.name)
            }
            Command::Menu(query) => query,
            _ => None,
        }
    }
}

fn same_origin(referer: &Url, host: &str) -> bool {
    if !matches!(referer.scheme(), "http" | "https") {
        return false;
    }
    let Some(referer_host) = referer.host_str() else {
        return false;
    };
    referer_host == host
        || referer
            .port_or_known_default()
            .is_some_and(|port| format!("{referer_host}:{port}") == host)
}

fn emphasize_with(body: Bytes, keyword: Option<&str>) -> Bytes {
    match keyword.map(str::trim) {
        Some(keyword) if !keyword.is_empty() => highlight::emphasize(&body, keyword),
        _ => body,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::application::render::RenderError;
    use crate::application::test_support::{MemoryStore, document, reference};
    use crate::domain::entities::DocumentKind;

    /// Renders each page as `<body>name:detail</body>` and records calls.
    #[derive(Default)]
    struct EchoRenderer {
        rendered: Mutex<Vec<String>>,
    }

    impl EchoRenderer {
        fn rendered(&self) -> Vec<String> {
            self.rendered.lock().expect("lock").clone()
        }
    }

    #[async_trait]
    impl Renderer for EchoRenderer {
        async fn render(&self, page: Page<'_>) -> Result<Bytes, RenderError> {
            let detail = match page {
                Page::NotFound { uri } => uri.to_string(),
                Page::FrameSet { query } | Page::Menu { query } => query.to_string(),
                Page::Category(category) => category.name().to_string(),
                Page::Reference(reference) => reference.name.clone(),
                Page::Document { document, content } => {
                    format!("{}|{}", document.title, content.unwrap_or("-"))
                }
                _ => String::new(),
            };
            let label = format!("{}:{detail}", page.name());
            self.rendered.lock().expect("lock").push(label.clone());
            Ok(Bytes::from(format!("<body>{label}</body>")))
        }
    }

    struct Fixture {
        site: Site,
        renderer: Arc<EchoRenderer>,
        _content_dir: tempfile::TempDir,
        cache_dir: tempfile::TempDir,
    }

    fn fixture() -> Fixture {
        let content = tempfile::tempdir().expect("content dir");
        std::fs::create_dir_all(content.path().join("docs/misc")).expect("mkdir");
        std::fs::create_dir_all(content.path().join("sample/new")).expect("mkdir");
        std::fs::write(content.path().join("docs/misc/readme.txt"), "read me").expect("write");
        std::fs::write(content.path().join("sample/new/a.hsp"), "mes \"hi\"").expect("write");
        let cache = tempfile::tempdir().expect("cache dir");

        let store = MemoryStore::default()
            .with_references(vec![reference(1, "", "mes"), reference(2, "", "print")])
            .with_documents(vec![
                document(10, "docs\\misc\\readme.txt", DocumentKind::Document, "Readme", "Misc"),
                document(11, "sample\\new\\a.hsp", DocumentKind::Sample, "Sample A", "new"),
                document(12, "docs\\misc\\gone.txt", DocumentKind::Document, "Gone", "Misc"),
            ])
            .with_moved("old/readme.txt", "docs/misc/readme.txt");
        let renderer = Arc::new(EchoRenderer::default());
        let site = Site::new(
            Arc::new(store),
            renderer.clone(),
            Router::new("/", "http://localhost/"),
            CacheReader::disk(cache.path()),
            ContentFiles::new(content.path()),
        );
        Fixture {
            site,
            renderer,
            _content_dir: content,
            cache_dir: cache,
        }
    }

    fn request(path: &str, query: Option<&str>) -> IncomingRequest {
        IncomingRequest {
            path: path.to_string(),
            query: query.map(str::to_string),
            referer: None,
            host: Some("localhost".to_string()),
        }
    }

    fn body(screen: &Screen) -> String {
        String::from_utf8(screen.body.to_vec()).expect("utf-8")
    }

    #[tokio::test]
    async fn missing_plain_file_renders_not_found_for_raw_path() {
        let fx = fixture();
        let screen = fx
            .site
            .handle(&request("/docs/misc/foo.txt", None))
            .await
            .expect("screen");

        assert_eq!(screen.status, ScreenStatus::NotFound);
        assert_eq!(body(&screen), "<body>not_found:/docs/misc/foo.txt</body>");
    }

    #[tokio::test]
    async fn plain_files_are_served_with_modification_time() {
        let fx = fixture();
        let screen = fx
            .site
            .handle(&request("/docs/misc/readme.txt", Some("format=plain")))
            .await
            .expect("screen");

        assert_eq!(screen.status, ScreenStatus::Ok);
        assert_eq!(screen.content_type, "text/plain");
        assert!(screen.last_modified.is_some());
        assert_eq!(body(&screen), "read me");
    }

    #[tokio::test]
    async fn moved_paths_redirect_with_location() {
        let fx = fixture();
        let screen = fx
            .site
            .handle(&request("/OLD/Readme.txt", Some("x=1")))
            .await
            .expect("screen");

        assert_eq!(screen.status, ScreenStatus::Moved);
        let location = "http://localhost/docs/misc/readme.txt?x=1";
        assert_eq!(screen.location.as_deref(), Some(location));
        assert!(body(&screen).contains("<h1>Document Moved</h1>"));
        assert!(body(&screen).contains(&format!("<a href=\"{location}\">")));
    }

    #[tokio::test]
    async fn cached_pages_skip_the_renderer() {
        let fx = fixture();
        std::fs::write(fx.cache_dir.path().join("home"), "<body>cached home</body>").expect("seed");

        let screen = fx.site.handle(&request("/home/", None)).await.expect("screen");

        assert_eq!(body(&screen), "<body>cached home</body>");
        assert!(fx.renderer.rendered().is_empty());
    }

    #[tokio::test]
    async fn frameset_with_query_bypasses_cache() {
        let fx = fixture();
        std::fs::write(fx.cache_dir.path().join("frameset"), "cached").expect("seed");

        let plain = fx.site.handle(&request("/", None)).await.expect("screen");
        let searched = fx
            .site
            .handle(&request("/", Some("q=mes")))
            .await
            .expect("screen");

        assert_eq!(body(&plain), "cached");
        assert_eq!(body(&searched), "<body>frameset:mes</body>");
    }

    #[tokio::test]
    async fn menu_search_is_trimmed_and_highlighted() {
        let fx = fixture();
        let screen = fx
            .site
            .handle(&request("/menu/", Some("q=%20mes%20")))
            .await
            .expect("screen");

        let text = body(&screen);
        assert!(text.contains("menu:<span class=\"kwd\">mes</span>"));
        assert!(text.ends_with("<!-- KeywordEmphasis : mes -->\n"));
        assert_eq!(fx.renderer.rendered(), vec!["menu:mes".to_string()]);
    }

    #[tokio::test]
    async fn reference_highlights_keyword_from_menu_referer() {
        let fx = fixture();
        let mut req = request("/reference/_builtin/print/", None);
        req.referer = Some("http://localhost/menu/?q=print".to_string());

        let screen = fx.site.handle(&req).await.expect("screen");

        assert!(body(&screen).contains("reference:<span class=\"kwd\">print</span>"));
    }

    #[tokio::test]
    async fn foreign_referers_are_ignored() {
        let fx = fixture();
        let mut req = request("/reference/_builtin/print/", None);
        req.referer = Some("http://elsewhere.example/menu/?q=print".to_string());

        let screen = fx.site.handle(&req).await.expect("screen");

        assert_eq!(body(&screen), "<body>reference:print</body>");
    }

    #[tokio::test]
    async fn sample_opened_from_reference_highlights_its_name() {
        let fx = fixture();
        let mut req = request("/sample/new/a.hsp", None);
        req.host = Some("localhost:80".to_string());
        req.referer = Some("http://localhost/reference/_builtin/mes/".to_string());

        let screen = fx.site.handle(&req).await.expect("screen");

        assert_eq!(screen.status, ScreenStatus::Ok);
        let text = body(&screen);
        assert!(text.contains("<span class=\"kwd\">mes</span>"));
        assert!(text.contains("document:Sample A|"));
    }

    #[tokio::test]
    async fn document_without_file_is_rendered_as_not_found() {
        let fx = fixture();
        let screen = fx
            .site
            .handle(&request("/docs/misc/gone.txt", None))
            .await
            .expect("screen");

        assert_eq!(screen.status, ScreenStatus::NotFound);
        assert_eq!(body(&screen), "<body>document:Gone|-</body>");
    }

    #[test]
    fn same_origin_accepts_explicit_default_port() {
        let url = Url::parse("http://localhost/menu/").expect("url");
        assert!(same_origin(&url, "localhost"));
        assert!(same_origin(&url, "localhost:80"));
        assert!(!same_origin(&url, "localhost:8080"));
        let ftp = Url::parse("ftp://localhost/menu/").expect("url");
        assert!(!same_origin(&ftp, "localhost"));
    }
}
