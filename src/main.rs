use std::{process, sync::Arc};

use bloghub::{
    application::error::AppError,
    application::{
        categories::CategoryService,
        posts::PostService,
        repos::{CategoriesRepo, CategoriesWriteRepo, PostsRepo, PostsWriteRepo, StoreHealth},
        sitemap::SitemapService,
        syndication::SyndicationService,
    },
    cache::{self, CacheAside, CacheConfig, CacheTrigger},
    config,
    infra::{
        db::PostgresRepositories,
        error::InfraError,
        http::{
            self, ApiState, HttpState, RateLimiter, ResponseLogConfig, RouterState,
            api::rate_limit::{self, RateLimitPolicies},
        },
        memory::InMemoryRepositories,
        redis as redis_infra, telemetry,
    },
};
use redis::aio::ConnectionManager;
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
    let repositories = init_repositories(&settings).await?;
    let redis = init_redis(&settings).await?;
    let router_state = build_router_state(&settings, repositories, redis.as_ref())?;
    serve_http(&settings, router_state).await
}

async fn run_migrate(settings: config::Settings) -> Result<(), AppError> {
    let database_url = settings
        .database
        .url
        .as_ref()
        .ok_or_else(|| InfraError::configuration("database url is not configured"))
        .map_err(AppError::from)?;

    let pool = PostgresRepositories::connect(database_url, settings.database.max_connections.get())
        .await
        .map_err(|err| AppError::from(InfraError::database(err.to_string())))?;

    PostgresRepositories::run_migrations(&pool)
        .await
        .map_err(|err| AppError::from(InfraError::database(err.to_string())))?;

    info!(target: "bloghub::migrate", "Migrations applied");
    Ok(())
}

/// Trait-object handles onto one storage backend.
struct Repositories {
    posts: Arc<dyn PostsRepo>,
    posts_write: Arc<dyn PostsWriteRepo>,
    categories: Arc<dyn CategoriesRepo>,
    categories_write: Arc<dyn CategoriesWriteRepo>,
    health: Arc<dyn StoreHealth>,
}

impl Repositories {
    fn from_store<R>(store: Arc<R>) -> Self
    where
        R: PostsRepo + PostsWriteRepo + CategoriesRepo + CategoriesWriteRepo + StoreHealth + 'static,
    {
        Self {
            posts: store.clone(),
            posts_write: store.clone(),
            categories: store.clone(),
            categories_write: store.clone(),
            health: store,
        }
    }
}

async fn init_repositories(settings: &config::Settings) -> Result<Repositories, AppError> {
    let Some(database_url) = settings.database.url.as_ref() else {
        warn!(
            target: "bloghub::startup",
            "database.url is not configured; using the in-memory store"
        );
        return Ok(Repositories::from_store(Arc::new(
            InMemoryRepositories::new(),
        )));
    };

    let pool = PostgresRepositories::connect(database_url, settings.database.max_connections.get())
        .await
        .map_err(|err| AppError::from(InfraError::database(err.to_string())))?;

    PostgresRepositories::run_migrations(&pool)
        .await
        .map_err(|err| AppError::from(InfraError::database(err.to_string())))?;

    Ok(Repositories::from_store(Arc::new(
        PostgresRepositories::new(pool),
    )))
}

async fn init_redis(settings: &config::Settings) -> Result<Option<ConnectionManager>, AppError> {
    if !settings.redis_required() {
        return Ok(None);
    }
    let url = settings
        .redis
        .url
        .as_deref()
        .ok_or_else(|| InfraError::configuration("redis url is not configured"))?;
    let conn = redis_infra::connect(url).await?;
    Ok(Some(conn))
}

fn build_router_state(
    settings: &config::Settings,
    repositories: Repositories,
    redis: Option<&ConnectionManager>,
) -> Result<RouterState, AppError> {
    let cache_config = CacheConfig::from(&settings.cache);
    let backend = cache::build_backend(&cache_config, redis)?;
    info!(
        target: "bloghub::startup",
        cache_backend = %cache_config.backend,
        rate_limit_backend = %settings.rate_limit.backend,
        "Backends selected"
    );

    let aside = CacheAside::new(backend.clone());
    let trigger = CacheTrigger::new(backend);

    let posts = Arc::new(PostService::new(
        repositories.posts.clone(),
        repositories.posts_write.clone(),
        aside.clone(),
        trigger.clone(),
    ));
    let categories = Arc::new(CategoryService::new(
        repositories.categories.clone(),
        repositories.categories_write.clone(),
        repositories.posts.clone(),
        aside,
        trigger.clone(),
    ));

    let store = rate_limit::build_store(settings.rate_limit.backend, redis)?;
    let rate_limiter = Arc::new(RateLimiter::new(
        store,
        RateLimitPolicies::from(&settings.rate_limit),
    ));

    let site_url = settings.site.public_url.clone();
    Ok(RouterState {
        http: HttpState {
            syndication: Arc::new(SyndicationService::new(
                repositories.posts.clone(),
                site_url.clone(),
            )),
            sitemap: Arc::new(SitemapService::new(repositories.posts, site_url)),
            health: repositories.health,
        },
        api: ApiState {
            posts,
            categories,
            cache: trigger,
            rate_limiter,
        },
    })
}

async fn serve_http(settings: &config::Settings, state: RouterState) -> Result<(), AppError> {
    let app = http::build_app(
        state,
        ResponseLogConfig {
            slow_request: settings.http.slow_request,
        },
    );

    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;
    info!(target: "bloghub::startup", addr = %settings.server.addr, "Listening");

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|err| AppError::unexpected(format!("server error: {err}")))?;

    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!(target: "bloghub::startup", "Shutdown requested");
    }
}
