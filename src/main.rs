use std::{process, sync::Arc};

use ohdl::{
    application::{
        error::AppError,
        render::Renderer,
        repos::ContentStore,
        router::Router,
        site::Site,
    },
    cache::{CacheReader, CacheWriter},
    config,
    domain::{codec::path_to_uri, command::Command},
    infra::{
        db::SqliteRepositories,
        error::InfraError,
        files::ContentFiles,
        http::{self, HttpState},
        telemetry,
    },
    presentation::{TemplateRenderer, UriMapper},
};
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli().map_err(InfraError::from)?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging)?;

    match command {
        config::Command::Serve(_) => run_serve(settings).await,
        config::Command::BuildCache(args) => run_build_cache(settings, args).await,
        config::Command::CheckMoved(_) => run_check_moved(settings).await,
    }
}

/// Shared handles every subcommand works with.
struct Library {
    repositories: Arc<SqliteRepositories>,
    store: Arc<dyn ContentStore>,
    renderer: Arc<TemplateRenderer>,
    router: Router,
    files: ContentFiles,
}

async fn open_library(settings: &config::Settings) -> Result<Library, AppError> {
    let pool = SqliteRepositories::connect(
        &settings.database.path,
        settings.database.max_connections.get(),
    )
    .await
    .map_err(|err| InfraError::open_library(&settings.database.path, err))?;

    let repositories = Arc::new(SqliteRepositories::new(pool));
    let store: Arc<dyn ContentStore> = repositories.clone();
    store.build_name_index().await?;

    let base_uri = settings.site.base_uri();
    let renderer = Arc::new(TemplateRenderer::new(
        store.clone(),
        UriMapper::new(base_uri.clone()),
    ));
    let router = Router::new(settings.site.base_path.clone(), base_uri);
    let files = ContentFiles::new(&settings.content.root);

    info!(
        target = "ohdl::startup",
        database = %settings.database.path.display(),
        content_root = %settings.content.root.display(),
        base_path = %settings.site.base_path,
        "library opened"
    );

    Ok(Library {
        repositories,
        store,
        renderer,
        router,
        files,
    })
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let library = open_library(&settings).await?;

    let cache = if settings.cache.enabled {
        CacheReader::disk(&settings.cache.directory)
    } else {
        CacheReader::Bypass
    };
    let renderer: Arc<dyn Renderer> = library.renderer.clone();
    let site = Site::new(
        library.store.clone(),
        renderer,
        library.router.clone(),
        cache,
        library.files.clone(),
    );

    let state = HttpState {
        site: Arc::new(site),
        db: library.repositories.clone(),
    };
    serve_http(&settings, state).await
}

async fn serve_http(settings: &config::Settings, state: HttpState) -> Result<(), AppError> {
    let router = http::build_router(state);
    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(|err| InfraError::listen(settings.server.addr, err))?;

    info!(
        target = "ohdl::http",
        addr = %settings.server.addr,
        cache_enabled = settings.cache.enabled,
        "listening"
    );

    let grace = settings.server.graceful_shutdown;
    axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            info!(
                target = "ohdl::http",
                grace_seconds = grace.as_secs(),
                "shutdown requested"
            );
            // Force the exit if in-flight requests outlive the grace period.
            tokio::spawn(async move {
                tokio::time::sleep(grace).await;
                warn!(target = "ohdl::http", "graceful shutdown timed out");
                process::exit(1);
            });
        })
        .await
        .map_err(|err| AppError::unexpected(format!("server error: {err}")))
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(target = "ohdl::http", error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}

async fn run_build_cache(
    settings: config::Settings,
    args: config::BuildCacheArgs,
) -> Result<(), AppError> {
    let library = open_library(&settings).await?;
    let writer = CacheWriter::new(&settings.cache.directory);

    if args.clear {
        let removed = writer.clear_all().await?;
        info!(
            target = "ohdl::build_cache",
            root = %writer.root().display(),
            removed,
            "cache cleared"
        );
    }

    let report = writer
        .build_all(
            library.store.as_ref(),
            library.renderer.as_ref(),
            &library.files,
        )
        .await?;

    println!(
        "cached {} pages ({} references, {} documents)",
        report.total(),
        report.references,
        report.documents
    );
    Ok(())
}

async fn run_check_moved(settings: config::Settings) -> Result<(), AppError> {
    let library = open_library(&settings).await?;
    let targets = library.store.list_moved_targets().await?;

    let mut ok = 0usize;
    let mut ng = 0usize;
    for target in targets {
        let request_path = format!("{}{}", library.router.base_path(), path_to_uri(&target));
        let command = library
            .router
            .resolve(library.store.as_ref(), &request_path, None)
            .await;

        let broken = match &command {
            Command::Moved(_) => true,
            Command::NotFound(_) | Command::PlainText { .. } => {
                !library.files.is_file(&target).await
            }
            _ => false,
        };

        if broken {
            println!("{request_path:?}: {}({command:?})", command.name());
            ng += 1;
        } else {
            ok += 1;
        }
    }

    println!("OK: {ok}, NG: {ng}");
    Ok(())
}
