use std::{process, sync::Arc};

use corvid::{
    application::{
        error::AppError,
        feed::FeedService,
        notifications::NotificationService,
        posts::PostService,
        profiles::ProfileService,
        repos::{
            NotificationsRepo, PostsRepo, PostsWriteRepo, SessionsRepo, UsersRepo, UsersWriteRepo,
        },
        sessions::SessionService,
    },
    cache::{CacheConfig, CacheInvalidator, CacheStore},
    config,
    infra::{
        db::PostgresRepositories,
        error::InfraError,
        http::{self, ApiRateLimiter, ApiState},
        telemetry,
    },
};
use tracing::{Dispatch, Level, debug, dispatcher, error, info};
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
    let (_cli_args, settings) = config::load_with_cli()
        .map_err(|err| AppError::unexpected(format!("failed to load configuration: {err}")))?;

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    let repositories = init_repositories(&settings).await?;
    let app = build_application_context(repositories, &settings);

    // Background maintenance: purge expired cache entries and sessions.
    let sweep_handle = spawn_sweeper(
        app.cache.clone(),
        app.sessions_repo.clone(),
        CacheConfig::from(&settings.cache).sweep_interval(),
    );

    let result = serve_http(&settings, app.api_state).await;

    sweep_handle.abort();
    let _ = sweep_handle.await;

    result
}

struct ApplicationContext {
    api_state: ApiState,
    cache: Arc<CacheStore>,
    sessions_repo: Arc<dyn SessionsRepo>,
}

async fn init_repositories(
    settings: &config::Settings,
) -> Result<Arc<PostgresRepositories>, AppError> {
    let database_url = settings
        .database
        .url
        .as_ref()
        .ok_or_else(|| InfraError::configuration("database url is not configured"))
        .map_err(AppError::from)?;

    let pool =
        PostgresRepositories::connect(database_url, settings.database.max_connections.get())
            .await
            .map_err(|err| AppError::from(InfraError::database(err.to_string())))?;

    PostgresRepositories::run_migrations(&pool)
        .await
        .map_err(|err| AppError::from(InfraError::database(err.to_string())))?;

    Ok(Arc::new(PostgresRepositories::new(pool)))
}

fn build_application_context(
    repositories: Arc<PostgresRepositories>,
    settings: &config::Settings,
) -> ApplicationContext {
    let users_repo: Arc<dyn UsersRepo> = repositories.clone();
    let users_write_repo: Arc<dyn UsersWriteRepo> = repositories.clone();
    let posts_repo: Arc<dyn PostsRepo> = repositories.clone();
    let posts_write_repo: Arc<dyn PostsWriteRepo> = repositories.clone();
    let notifications_repo: Arc<dyn NotificationsRepo> = repositories.clone();
    let sessions_repo: Arc<dyn SessionsRepo> = repositories.clone();

    let cache_config = CacheConfig::from(&settings.cache);
    let cache = Arc::new(CacheStore::new(&cache_config));
    let invalidator = CacheInvalidator::new(&cache_config, cache.clone());

    let sessions = Arc::new(SessionService::new(
        users_repo.clone(),
        users_write_repo.clone(),
        sessions_repo.clone(),
        invalidator.clone(),
        settings.auth.session_ttl,
    ));
    let feed = Arc::new(FeedService::new(
        posts_repo.clone(),
        users_repo.clone(),
        cache.clone(),
        cache_config.clone(),
    ));
    let posts = Arc::new(PostService::new(
        posts_repo.clone(),
        posts_write_repo.clone(),
        users_repo.clone(),
        invalidator.clone(),
    ));
    let profiles = Arc::new(ProfileService::new(
        users_repo.clone(),
        users_write_repo.clone(),
        cache.clone(),
        cache_config.clone(),
        invalidator.clone(),
    ));
    let notifications = Arc::new(NotificationService::new(notifications_repo.clone()));

    let rate_limiter = Arc::new(ApiRateLimiter::new(
        std::time::Duration::from_secs(u64::from(settings.api_rate_limit.window_seconds.get())),
        settings.api_rate_limit.max_requests.get(),
    ));

    let api_state = ApiState {
        sessions,
        feed,
        posts,
        profiles,
        notifications,
        db: repositories,
        rate_limiter,
    };

    ApplicationContext {
        api_state,
        cache,
        sessions_repo,
    }
}

fn spawn_sweeper(
    cache: Arc<CacheStore>,
    sessions: Arc<dyn SessionsRepo>,
    interval: std::time::Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.tick().await; // Skip the first immediate tick
        loop {
            ticker.tick().await;
            let purged = cache.purge_expired();
            if purged > 0 {
                debug!(purged, "swept expired cache entries");
            }
            match sessions.delete_expired().await {
                Ok(0) => {}
                Ok(deleted) => debug!(deleted, "swept expired sessions"),
                Err(err) => debug!(error = %err, "session sweep failed"),
            }
        }
    })
}

async fn serve_http(settings: &config::Settings, api_state: ApiState) -> Result<(), AppError> {
    let router = http::build_router(api_state, &settings.server);

    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;

    info!(addr = %settings.server.addr, "corvid listening");

    axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|err| AppError::unexpected(format!("server error: {err}")))?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(error = %err, "failed to listen for shutdown signal");
    }
}
