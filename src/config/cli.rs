use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, builder::BoolishValueParser};

/// Command-line arguments for the ohdl binary.
#[derive(Debug, Parser)]
#[command(name = "ohdl", version, about = "Online HSP Document Library server")]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "OHDL_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Serve the library over HTTP.
    Serve(Box<ServeArgs>),
    /// Render every page into the page cache.
    #[command(name = "build-cache")]
    BuildCache(BuildCacheArgs),
    /// Verify that every moved-path target resolves to a real page.
    #[command(name = "check-moved")]
    CheckMoved(CheckMovedArgs),
}

/// Overrides shared by every subcommand that opens the library.
#[derive(Debug, Args, Default, Clone)]
pub struct LibraryOverrides {
    /// Override the library database file.
    #[arg(long = "database-path", value_name = "PATH")]
    pub database_path: Option<PathBuf>,

    /// Override the public origin (scheme://host[:port]) used in absolute links.
    #[arg(long = "site-origin", value_name = "ORIGIN")]
    pub site_origin: Option<String>,

    /// Override the URL prefix the library is mounted at.
    #[arg(long = "site-base-path", value_name = "PATH")]
    pub site_base_path: Option<String>,

    /// Override the page cache directory.
    #[arg(long = "cache-directory", value_name = "PATH")]
    pub cache_directory: Option<PathBuf>,

    /// Override the directory documents and samples are read from.
    #[arg(long = "content-root", value_name = "PATH")]
    pub content_root: Option<PathBuf>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeArgs {
    #[command(flatten)]
    pub overrides: ServeOverrides,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeOverrides {
    #[command(flatten)]
    pub library: LibraryOverrides,

    /// Override the listener host.
    #[arg(long = "server-host", value_name = "HOST")]
    pub server_host: Option<String>,

    /// Override the listener port.
    #[arg(long = "server-port", value_name = "PORT")]
    pub server_port: Option<u16>,

    /// Override the graceful shutdown timeout.
    #[arg(long = "server-graceful-shutdown-seconds", value_name = "SECONDS")]
    pub server_graceful_shutdown_seconds: Option<u64>,

    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub log_json: Option<bool>,

    /// Override the database pool size.
    #[arg(long = "database-max-connections", value_name = "COUNT")]
    pub database_max_connections: Option<u32>,

    /// Serve from the page cache (false renders every request).
    #[arg(
        long = "cache-enabled",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub cache_enabled: Option<bool>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct BuildCacheArgs {
    #[command(flatten)]
    pub overrides: LibraryOverrides,

    /// Remove every existing cache entry before rebuilding.
    #[arg(long, action = clap::ArgAction::SetTrue)]
    pub clear: bool,
}

#[derive(Debug, Args, Default, Clone)]
pub struct CheckMovedArgs {
    #[command(flatten)]
    pub overrides: LibraryOverrides,
}
