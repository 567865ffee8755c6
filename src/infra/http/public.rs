use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    extract::State,
    http::{
        HeaderMap, Request, StatusCode,
        header::{CONTENT_LANGUAGE, CONTENT_TYPE, HOST, LAST_MODIFIED, LOCATION, REFERER},
    },
    middleware,
    response::{IntoResponse, Response},
    routing::get,
};
use time::{OffsetDateTime, UtcOffset, format_description::BorrowedFormatItem, macros::format_description};
use tracing::error;

use crate::{
    application::{
        error::ErrorReport,
        site::{IncomingRequest, Screen, ScreenStatus, Site},
    },
    infra::db::SqliteRepositories,
};

use super::{
    library_health,
    middleware::{log_responses, set_request_context},
};

const HTTP_DATE: &[BorrowedFormatItem<'static>] = format_description!(
    "[weekday repr:short], [day] [month repr:short] [year] [hour]:[minute]:[second] GMT"
);

#[derive(Clone)]
pub struct HttpState {
    pub site: Arc<Site>,
    pub db: Arc<SqliteRepositories>,
}

pub fn build_router(state: HttpState) -> Router {
    Router::new()
        .route("/_health/db", get(database_health))
        .fallback(library_page)
        .with_state(state)
        .layer(middleware::from_fn(log_responses))
        .layer(middleware::from_fn(set_request_context))
}

async fn library_page(State(state): State<HttpState>, request: Request<Body>) -> Response {
    let headers = request.headers();
    let incoming = IncomingRequest {
        path: request.uri().path().to_string(),
        query: request.uri().query().map(str::to_string),
        referer: header_text(headers, REFERER),
        host: header_text(headers, HOST)
            .or_else(|| request.uri().authority().map(|authority| authority.to_string())),
    };

    match state.site.handle(&incoming).await {
        Ok(screen) => screen_response(screen),
        Err(err) => err.into_response(),
    }
}

async fn database_health(State(state): State<HttpState>) -> Response {
    library_health(&state.db).await
}

fn header_text(headers: &HeaderMap, name: axum::http::HeaderName) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
}

/// Converts a finished screen into an HTTP response.
pub fn screen_response(screen: Screen) -> Response {
    let status = match screen.status {
        ScreenStatus::Ok => StatusCode::OK,
        ScreenStatus::NotFound => StatusCode::NOT_FOUND,
        ScreenStatus::Moved => StatusCode::MOVED_PERMANENTLY,
    };
    let content_type = match screen.charset {
        Some(charset) => format!("{}; charset={charset}", screen.content_type),
        None => screen.content_type.to_string(),
    };

    let mut builder = Response::builder()
        .status(status)
        .header(CONTENT_TYPE, content_type)
        .header(CONTENT_LANGUAGE, "ja");
    if let Some(location) = screen.location.as_deref() {
        builder = builder.header(LOCATION, location);
    }
    if let Some(modified) = screen.last_modified.and_then(http_date) {
        builder = builder.header(LAST_MODIFIED, modified);
    }

    builder.body(Body::from(screen.body)).unwrap_or_else(|err| {
        error!(target = "ohdl::http::public", error = %err, "invalid response headers");
        let mut response = StatusCode::INTERNAL_SERVER_ERROR.into_response();
        ErrorReport::from_error(
            "infra::http::public::screen_response",
            StatusCode::INTERNAL_SERVER_ERROR,
            &err,
        )
        .attach(&mut response);
        response
    })
}

/// IMF-fixdate rendering used by `Last-Modified`.
fn http_date(moment: OffsetDateTime) -> Option<String> {
    moment.to_offset(UtcOffset::UTC).format(HTTP_DATE).ok()
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use time::macros::datetime;

    use super::*;

    fn screen(status: ScreenStatus) -> Screen {
        Screen {
            status,
            content_type: "text/html",
            charset: Some("UTF-8"),
            location: None,
            last_modified: None,
            body: Bytes::from_static(b"<body>x</body>"),
        }
    }

    #[test]
    fn html_screens_carry_charset_and_language() {
        let response = screen_response(screen(ScreenStatus::Ok));
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[CONTENT_TYPE],
            "text/html; charset=UTF-8"
        );
        assert_eq!(response.headers()[CONTENT_LANGUAGE], "ja");
    }

    #[test]
    fn moved_screens_set_location() {
        let response = screen_response(Screen {
            location: Some("http://localhost/docs/new.txt".into()),
            ..screen(ScreenStatus::Moved)
        });
        assert_eq!(response.status(), StatusCode::MOVED_PERMANENTLY);
        assert_eq!(response.headers()[LOCATION], "http://localhost/docs/new.txt");
    }

    #[test]
    fn plain_files_report_modification_time() {
        let response = screen_response(Screen {
            charset: None,
            content_type: "text/plain",
            last_modified: Some(datetime!(2009-03-07 12:34:56 +09:00)),
            ..screen(ScreenStatus::Ok)
        });
        assert_eq!(response.headers()[CONTENT_TYPE], "text/plain");
        assert_eq!(
            response.headers()[LAST_MODIFIED],
            "Sat, 07 Mar 2009 03:34:56 GMT"
        );
    }
}
