use std::error::Error as StdError;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::{
    application::{render::RenderError, repos::RepoError},
    cache::CacheWriteError,
    infra::error::InfraError,
};

/// Diagnostic detail attached to error responses for the response logger.
#[derive(Debug, Clone)]
pub struct ErrorReport {
    pub source: &'static str,
    pub status: StatusCode,
    pub messages: Vec<String>,
}

impl ErrorReport {
    pub fn from_error(source: &'static str, status: StatusCode, error: &dyn StdError) -> Self {
        let mut messages = Vec::new();
        messages.push(error.to_string());
        let mut current = error.source();
        while let Some(inner) = current {
            messages.push(inner.to_string());
            current = inner.source();
        }
        Self {
            source,
            status,
            messages,
        }
    }

    pub fn attach(self, response: &mut Response) {
        response.extensions_mut().insert(self);
    }
}

/// Top-level failure of a subcommand or a request.
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Render(#[from] RenderError),
    #[error(transparent)]
    Repo(#[from] RepoError),
    #[error(transparent)]
    Cache(#[from] CacheWriteError),
    #[error(transparent)]
    Infra(#[from] InfraError),
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl AppError {
    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::Unexpected(message.into())
    }

    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Repo(RepoError::NotFound) => StatusCode::NOT_FOUND,
            AppError::Repo(_) | AppError::Render(RenderError::Store(_)) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            AppError::Infra(err) if err.is_unavailable() => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Render(RenderError::Template { .. })
            | AppError::Cache(_)
            | AppError::Infra(_)
            | AppError::Unexpected(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn presentation_message(&self) -> &'static str {
        match self {
            AppError::Repo(RepoError::NotFound) => "Not Found",
            AppError::Repo(_) | AppError::Render(RenderError::Store(_)) => {
                "Library database temporarily unavailable"
            }
            AppError::Infra(err) if err.is_unavailable() => {
                "Library database temporarily unavailable"
            }
            AppError::Render(RenderError::Template { .. }) => "Page could not be rendered",
            AppError::Cache(_) => "Page cache could not be written",
            AppError::Infra(_) | AppError::Unexpected(_) => "Internal Server Error",
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = self.presentation_message();
        let report = ErrorReport::from_error("application::error::AppError", status, &self);
        let mut response = (status, message).into_response();
        report.attach(&mut response);
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_failures_map_to_server_errors() {
        let err = AppError::from(RenderError::Template {
            template: "menu.html",
            message: "boom".into(),
        });
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let report = response
            .extensions()
            .get::<ErrorReport>()
            .expect("report attached");
        assert!(report.messages[0].contains("menu.html"));
    }

    #[test]
    fn store_failures_map_to_unavailable() {
        let err = AppError::from(RepoError::from_persistence("disk I/O error"));
        assert_eq!(err.into_response().status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn report_collects_source_chain() {
        let err = CacheWriteError::Io {
            path: "cache/home".into(),
            source: std::io::Error::other("read-only file system"),
        };
        let report = ErrorReport::from_error("test", StatusCode::INTERNAL_SERVER_ERROR, &err);
        assert_eq!(report.messages.len(), 2);
        assert_eq!(report.messages[1], "read-only file system");
    }

    #[test]
    fn unreachable_library_is_unavailable_not_internal() {
        let err = AppError::from(InfraError::open_library(
            "hdlbase.xdb",
            sqlx::Error::PoolTimedOut,
        ));
        assert_eq!(err.into_response().status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
