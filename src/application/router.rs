//! Maps request paths onto [`Command`]s.
//!
//! Matching happens in two stages: [`classify`] decides which route a
//! decoded path belongs to without touching the store, then
//! [`Router::resolve`] performs the lookups the route needs and runs the
//! moved/plain fallback chain when nothing was found.

use metrics::counter;
use tracing::{debug, warn};

use crate::application::repos::{ContentStore, RepoError};
use crate::domain::codec::{decode, path_to_uri};
use crate::domain::command::Command;
use crate::domain::entities::CategoryKind;

const BUILTIN_SEGMENT: &str = "_builtin";

/// First-value-wins view over a query string.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams {
    pairs: Vec<(String, String)>,
}

impl QueryParams {
    pub fn parse(raw_query: Option<&str>) -> Self {
        let pairs = raw_query
            .map(|raw| {
                url::form_urlencoded::parse(raw.as_bytes())
                    .map(|(key, value)| (key.into_owned(), value.into_owned()))
                    .collect()
            })
            .unwrap_or_default();
        Self { pairs }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(candidate, _)| candidate == key)
            .map(|(_, value)| value.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Route {
    FrameSet,
    VerInfo,
    Menu,
    OpenSearch,
    FunctionList,
    Home,
    Category(CategoryKind, String),
    Reference { module: String, name: String },
    File,
    Unmatched,
}

/// Routes a prefix-stripped, decoded path. Earlier rules win.
fn classify(path: &str) -> Route {
    match path {
        "" => return Route::FrameSet,
        "verinfo" | "verinfo/" => return Route::VerInfo,
        "menu" | "menu/" => return Route::Menu,
        "opensearch" | "opensearch/" => return Route::OpenSearch,
        "function_list.js" => return Route::FunctionList,
        "home" | "home/" => return Route::Home,
        _ => {}
    }

    if let Some(rest) = strip_section(path, "reference") {
        let segments = split_segments(rest);
        match segments.as_deref() {
            Some([]) => return Route::Category(CategoryKind::Reference, String::new()),
            Some([module]) => {
                return Route::Category(CategoryKind::Reference, builtin_or(module));
            }
            Some([module, name]) => {
                return Route::Reference {
                    module: builtin_or(module),
                    name: (*name).to_string(),
                };
            }
            _ => {}
        }
    }

    if is_file_path(path) {
        return Route::File;
    }

    for (section, kind) in [
        ("docs", CategoryKind::Document),
        ("sample", CategoryKind::Sample),
    ] {
        if let Some(rest) = strip_section(path, section) {
            match split_segments(rest).as_deref() {
                Some([]) => return Route::Category(kind, String::new()),
                Some([name]) => return Route::Category(kind, (*name).to_string()),
                _ => {}
            }
        }
    }

    Route::Unmatched
}

/// `section`, `section/` or `section/...`; returns what follows the slash.
fn strip_section<'a>(path: &'a str, section: &str) -> Option<&'a str> {
    let rest = path.strip_prefix(section)?;
    if rest.is_empty() {
        Some("")
    } else {
        rest.strip_prefix('/')
    }
}

/// Splits `a/b/` into non-empty segments; an inner empty segment (`a//b`)
/// is not a valid route.
fn split_segments(rest: &str) -> Option<Vec<&str>> {
    let trimmed = rest.strip_suffix('/').unwrap_or(rest);
    if trimmed.is_empty() {
        return rest.is_empty().then(Vec::new);
    }
    let segments: Vec<&str> = trimmed.split('/').collect();
    segments
        .iter()
        .all(|segment| !segment.is_empty())
        .then_some(segments)
}

fn builtin_or(segment: &str) -> String {
    if segment == BUILTIN_SEGMENT {
        String::new()
    } else {
        segment.to_string()
    }
}

fn is_file_path(path: &str) -> bool {
    let text = path.ends_with(".txt")
        && (path.starts_with("docs/") || path.starts_with("doclib/"));
    let sample = path.ends_with(".hsp")
        && (path.starts_with("sample/") || path.starts_with("doclib/"));
    text || sample
}

fn has_plain_extension(path: &str) -> bool {
    path.ends_with(".hsp") || path.ends_with(".txt")
}

/// Resolves request targets against the content store.
#[derive(Debug, Clone)]
pub struct Router {
    base_path: String,
    base_uri: String,
}

impl Router {
    /// `base_path` is the URL prefix the site is mounted at (e.g. `/` or
    /// `/ohdl/`); `base_uri` is origin plus prefix.
    pub fn new(base_path: impl Into<String>, base_uri: impl Into<String>) -> Self {
        Self {
            base_path: base_path.into(),
            base_uri: base_uri.into(),
        }
    }

    pub fn base_path(&self) -> &str {
        &self.base_path
    }

    /// Absolute link to a moved path, carrying the original query string.
    pub fn moved_uri(&self, new_path: &str, raw_query: Option<&str>) -> String {
        let mut uri = format!("{}{}", self.base_uri, path_to_uri(new_path));
        if let Some(query) = raw_query {
            uri.push('?');
            uri.push_str(query);
        }
        uri
    }

    pub async fn resolve(
        &self,
        store: &dyn ContentStore,
        raw_path: &str,
        raw_query: Option<&str>,
    ) -> Command {
        let not_found = || Command::NotFound(raw_path.to_string());

        let decoded = match decode(raw_path) {
            Ok(decoded) => decoded,
            Err(err) => {
                debug!(target = "ohdl::router", raw_path, error = %err, "undecodable request path");
                return not_found();
            }
        };
        let Some(path) = decoded.strip_prefix(self.base_path.as_str()) else {
            return not_found();
        };

        let params = QueryParams::parse(raw_query);
        let search = || params.get("q").map(str::to_string);

        let command = match classify(path) {
            Route::FrameSet => Command::FrameSet(search()),
            Route::VerInfo => Command::VerInfo,
            Route::Menu => Command::Menu(search()),
            Route::OpenSearch => Command::OpenSearch,
            Route::FunctionList => Command::FunctionListScript,
            Route::Home => Command::Home,
            Route::Category(kind, name) => {
                match absent_on_error(store.find_category(kind, &name).await, path) {
                    Some(category) => match kind {
                        CategoryKind::Reference => Command::ReferenceCategory(category),
                        CategoryKind::Document => Command::DocCategory(category),
                        CategoryKind::Sample => Command::SampleCategory(category),
                    },
                    None => not_found(),
                }
            }
            Route::Reference { module, name } => {
                match absent_on_error(store.find_reference(&module, &name).await, path) {
                    Some(reference) => Command::Reference(reference),
                    None => not_found(),
                }
            }
            Route::File if params.get("format") == Some("plain") => Command::PlainText {
                path: path.to_string(),
                uri: raw_path.to_string(),
            },
            Route::File => match absent_on_error(store.find_document_by_path(path).await, path) {
                Some(document) => Command::DocOrSample(document),
                None => not_found(),
            },
            Route::Unmatched => not_found(),
        };

        if !command.is_not_found() {
            return command;
        }

        if let Some(new_path) = absent_on_error(store.lookup_moved(path).await, path) {
            counter!("ohdl_route_fallback_total", "kind" => "moved").increment(1);
            return Command::Moved(self.moved_uri(&new_path, raw_query));
        }

        if has_plain_extension(path) {
            counter!("ohdl_route_fallback_total", "kind" => "plain").increment(1);
            return Command::PlainText {
                path: path.to_string(),
                uri: raw_path.to_string(),
            };
        }

        command
    }
}

fn absent_on_error<T>(result: Result<Option<T>, RepoError>, path: &str) -> Option<T> {
    result.unwrap_or_else(|err| {
        warn!(target = "ohdl::router", path, error = %err, "store lookup failed");
        None
    })
}
