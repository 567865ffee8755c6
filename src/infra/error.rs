use std::{io, net::SocketAddr, path::PathBuf};

use thiserror::Error;

use crate::config::LoadError;

/// Failures of the process-level adapters: library database, listener,
/// logging and configuration.
#[derive(Debug, Error)]
pub enum InfraError {
    #[error("cannot open library database `{}`", path.display())]
    OpenLibrary {
        path: PathBuf,
        #[source]
        source: sqlx::Error,
    },
    #[error("library database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("cannot listen on {addr}")]
    Listen {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("telemetry initialization failed: {0}")]
    Telemetry(String),
    #[error(transparent)]
    Configuration(#[from] LoadError),
}

impl InfraError {
    pub fn open_library(path: impl Into<PathBuf>, source: sqlx::Error) -> Self {
        Self::OpenLibrary {
            path: path.into(),
            source,
        }
    }

    pub fn listen(addr: SocketAddr, source: io::Error) -> Self {
        Self::Listen { addr, source }
    }

    /// Whether the failure is the database being unreachable rather than a
    /// local setup problem.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::OpenLibrary { .. } | Self::Database(_))
    }
}

#[cfg(test)]
mod tests {
    use std::error::Error as _;

    use super::*;

    #[test]
    fn open_failures_name_the_database_file() {
        let err = InfraError::open_library("data/hdlbase.xdb", sqlx::Error::PoolTimedOut);
        assert_eq!(
            err.to_string(),
            "cannot open library database `data/hdlbase.xdb`"
        );
        assert!(err.source().is_some());
        assert!(err.is_unavailable());
    }

    #[test]
    fn listener_failures_are_local() {
        let addr: SocketAddr = "127.0.0.1:3000".parse().expect("addr");
        let err = InfraError::listen(addr, io::Error::from(io::ErrorKind::AddrInUse));
        assert_eq!(err.to_string(), "cannot listen on 127.0.0.1:3000");
        assert!(!err.is_unavailable());
    }
}
