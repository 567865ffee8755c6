//! HTTP surface: the library fallback handler plus a database probe.

mod middleware;
mod public;

pub use public::{HttpState, build_router, screen_response};

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::application::error::ErrorReport;
use crate::infra::{db::SqliteRepositories, error::InfraError};

/// `204` while the library database answers a trivial query, `503` otherwise.
async fn library_health(repositories: &SqliteRepositories) -> Response {
    let Err(err) = repositories.health_check().await else {
        return StatusCode::NO_CONTENT.into_response();
    };

    let err = InfraError::from(err);
    let status = StatusCode::SERVICE_UNAVAILABLE;
    let mut response = (status, "library database unavailable").into_response();
    ErrorReport::from_error("infra::http::library_health", status, &err).attach(&mut response);
    response
}
