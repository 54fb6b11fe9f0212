use std::{process, sync::Arc};

use eventfeed::{
    application::{
        auth::{ConfiguredTokens, TokenValidator},
        error::AppError,
        events::IngestCoordinator,
        repos::EventsRepo,
    },
    cache::CacheConfig,
    config,
    infra::{
        db::PostgresRepositories,
        error::InfraError,
        http::{self, ApiState},
        memory::InMemoryEventsRepo,
        telemetry,
    },
};
use sqlx::PgPool;
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
    let (cli_args, settings) = config::load_with_cli()
        .map_err(|err| AppError::unexpected(format!("failed to load configuration: {err}")))?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    match command {
        config::Command::Serve(_) => run_serve(settings).await,
        config::Command::Migrate(_) => run_migrate(settings).await,
    }
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let repo = init_repository(&settings).await?;
    let events = Arc::new(IngestCoordinator::new(
        repo,
        &CacheConfig::from(&settings.cache),
    ));

    let tokens = ConfiguredTokens::from_tokens(&settings.auth.tokens)
        .map(|tokens| Arc::new(tokens) as Arc<dyn TokenValidator>);
    if tokens.is_none() {
        warn!(
            target = "eventfeed::serve",
            "No API tokens configured; event endpoints accept unauthenticated requests"
        );
    }

    let router = http::build_router(ApiState { events, tokens });

    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;
    info!(
        target = "eventfeed::serve",
        addr = %settings.server.addr,
        "Listening"
    );

    axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|err| AppError::unexpected(format!("server error: {err}")))?;

    info!(target = "eventfeed::serve", "Server stopped");
    Ok(())
}

async fn run_migrate(settings: config::Settings) -> Result<(), AppError> {
    let database_url = settings.database.url.as_deref().ok_or_else(|| {
        InfraError::configuration(
            "database url is required (provide --database-url or set EVENTFEED__DATABASE__URL)",
        )
    })?;

    connect_and_migrate(database_url, 1).await?;
    info!(target = "eventfeed::migrate", "Migrations applied");
    Ok(())
}

async fn init_repository(settings: &config::Settings) -> Result<Arc<dyn EventsRepo>, AppError> {
    let Some(database_url) = settings.database.url.as_ref() else {
        warn!(
            target = "eventfeed::serve",
            "No database url configured; events are kept in memory and lost on exit"
        );
        return Ok(Arc::new(InMemoryEventsRepo::new()));
    };

    let pool = connect_and_migrate(database_url, settings.database.max_connections.get()).await?;
    Ok(Arc::new(PostgresRepositories::new(pool)))
}

async fn connect_and_migrate(database_url: &str, max_connections: u32) -> Result<PgPool, AppError> {
    let pool = PostgresRepositories::connect(database_url, max_connections)
        .await
        .map_err(InfraError::database)?;
    PostgresRepositories::run_migrations(&pool)
        .await
        .map_err(InfraError::migration)?;
    Ok(pool)
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!(target = "eventfeed::serve", "Shutdown signal received");
}
