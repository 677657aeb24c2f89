//! Configuration layer: typed settings with layered precedence (file → env → CLI).

use std::{
    fmt,
    net::SocketAddr,
    num::{NonZeroU32, NonZeroUsize},
    path::PathBuf,
    str::FromStr,
    time::Duration,
};

use clap::{Args, Parser, Subcommand, builder::BoolishValueParser};
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;
use url::Url;

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "bloghub";
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 3000;
const DEFAULT_DB_MAX_CONNECTIONS: u32 = 8;
const DEFAULT_CACHE_MEMORY_MAX_ENTRIES: usize = 1024;
const DEFAULT_SITE_URL: &str = "https://bloghub.vercel.app";
const DEFAULT_SLOW_REQUEST_MS: u64 = 1000;
const DEFAULT_QUERY_MAX_REQUESTS: u64 = 30;
const DEFAULT_QUERY_WINDOW_SECS: u64 = 10;
const DEFAULT_MUTATION_MAX_REQUESTS: u64 = 10;
const DEFAULT_MUTATION_WINDOW_SECS: u64 = 10;
const DEFAULT_STRICT_MAX_REQUESTS: u64 = 5;
const DEFAULT_STRICT_WINDOW_SECS: u64 = 60;

/// Command-line arguments for the BlogHub binary.
#[derive(Debug, Parser)]
#[command(name = "bloghub", version, about = "BlogHub blogging backend")]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "BLOGHUB_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run the HTTP API.
    Serve(Box<ServeArgs>),
    /// Apply pending database migrations and exit.
    Migrate(MigrateArgs),
}

#[derive(Debug, Args, Default, Clone)]
pub struct DatabaseOverride {
    /// Override the database connection URL.
    #[arg(long = "database-url", value_name = "URL")]
    pub database_url: Option<String>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeArgs {
    #[command(flatten)]
    pub overrides: ServeOverrides,
}

#[derive(Debug, Args, Default, Clone)]
pub struct MigrateArgs {
    #[command(flatten)]
    pub database: DatabaseOverride,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeOverrides {
    /// Override the listener host.
    #[arg(long = "server-host", value_name = "HOST")]
    pub server_host: Option<String>,

    /// Override the listener port.
    #[arg(long = "server-port", value_name = "PORT")]
    pub server_port: Option<u16>,

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

    /// Override the database connection URL.
    #[arg(long = "database-url", value_name = "URL")]
    pub database_url: Option<String>,

    /// Override the database pool size.
    #[arg(long = "database-max-connections", value_name = "COUNT")]
    pub database_max_connections: Option<u32>,

    /// Override the cache backend (disabled|memory|redis).
    #[arg(long = "cache-backend", value_name = "BACKEND")]
    pub cache_backend: Option<String>,

    /// Override the rate-limit backend (disabled|memory|redis).
    #[arg(long = "rate-limit-backend", value_name = "BACKEND")]
    pub rate_limit_backend: Option<String>,

    /// Override the Redis connection URL.
    #[arg(long = "redis-url", value_name = "URL")]
    pub redis_url: Option<String>,

    /// Override the public site URL used in feeds and the sitemap.
    #[arg(long = "site-public-url", value_name = "URL")]
    pub site_public_url: Option<String>,

    /// Override the slow-request warning threshold.
    #[arg(long = "http-slow-request-ms", value_name = "MILLIS")]
    pub http_slow_request_ms: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub logging: LoggingSettings,
    pub database: DatabaseSettings,
    pub cache: CacheSettings,
    pub rate_limit: RateLimitSettings,
    pub redis: RedisSettings,
    pub site: SiteSettings,
    pub http: HttpSettings,
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub addr: SocketAddr,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Debug, Clone)]
pub struct DatabaseSettings {
    /// `None` runs against the in-memory store.
    pub url: Option<String>,
    pub max_connections: NonZeroU32,
}

/// Where cache entries or rate-limit logs live.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Disabled,
    Memory,
    Redis,
}

impl FromStr for BackendKind {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "disabled" | "none" | "off" => Ok(Self::Disabled),
            "memory" => Ok(Self::Memory),
            "redis" => Ok(Self::Redis),
            other => Err(format!(
                "unknown backend `{other}` (expected disabled, memory or redis)"
            )),
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Disabled => "disabled",
            Self::Memory => "memory",
            Self::Redis => "redis",
        })
    }
}

#[derive(Debug, Clone)]
pub struct CacheSettings {
    pub backend: BackendKind,
    pub memory_max_entries: NonZeroUsize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClassLimitSettings {
    pub max_requests: NonZeroU32,
    pub window: Duration,
}

#[derive(Debug, Clone)]
pub struct RateLimitSettings {
    pub backend: BackendKind,
    pub query: ClassLimitSettings,
    pub mutation: ClassLimitSettings,
    pub strict: ClassLimitSettings,
}

#[derive(Debug, Clone)]
pub struct RedisSettings {
    pub url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct SiteSettings {
    /// Absolute URL without a trailing slash.
    pub public_url: String,
}

#[derive(Debug, Clone)]
pub struct HttpSettings {
    pub slow_request: Duration,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(Environment::with_prefix("BLOGHUB").separator("__"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;

    match cli.command.as_ref() {
        Some(Command::Serve(args)) => raw.apply_serve_overrides(&args.overrides),
        Some(Command::Migrate(args)) => raw.apply_database_override(&args.database),
        None => raw.apply_serve_overrides(&ServeOverrides::default()),
    }

    Settings::from_raw(raw)
}

pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    server: RawServerSettings,
    logging: RawLoggingSettings,
    database: RawDatabaseSettings,
    cache: RawCacheSettings,
    rate_limit: RawRateLimitSettings,
    redis: RawRedisSettings,
    site: RawSiteSettings,
    http: RawHttpSettings,
}

impl RawSettings {
    fn apply_serve_overrides(&mut self, overrides: &ServeOverrides) {
        if let Some(host) = overrides.server_host.as_ref() {
            self.server.host = Some(host.clone());
        }
        if let Some(port) = overrides.server_port {
            self.server.port = Some(port);
        }
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
        if let Some(url) = overrides.database_url.as_ref() {
            self.database.url = Some(url.clone());
        }
        if let Some(max) = overrides.database_max_connections {
            self.database.max_connections = Some(max);
        }
        if let Some(backend) = overrides.cache_backend.as_ref() {
            self.cache.backend = Some(backend.clone());
        }
        if let Some(backend) = overrides.rate_limit_backend.as_ref() {
            self.rate_limit.backend = Some(backend.clone());
        }
        if let Some(url) = overrides.redis_url.as_ref() {
            self.redis.url = Some(url.clone());
        }
        if let Some(url) = overrides.site_public_url.as_ref() {
            self.site.public_url = Some(url.clone());
        }
        if let Some(ms) = overrides.http_slow_request_ms {
            self.http.slow_request_ms = Some(ms);
        }
    }

    fn apply_database_override(&mut self, overrides: &DatabaseOverride) {
        if let Some(url) = overrides.database_url.as_ref() {
            self.database.url = Some(url.clone());
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            server,
            logging,
            database,
            cache,
            rate_limit,
            redis,
            site,
            http,
        } = raw;

        let server = build_server_settings(server)?;
        let logging = build_logging_settings(logging)?;
        let database = build_database_settings(database)?;
        let cache = build_cache_settings(cache)?;
        let rate_limit = build_rate_limit_settings(rate_limit)?;
        let redis = build_redis_settings(redis)?;
        let site = build_site_settings(site)?;
        let http = build_http_settings(http)?;

        let wants_redis =
            cache.backend == BackendKind::Redis || rate_limit.backend == BackendKind::Redis;
        if wants_redis && redis.url.is_none() {
            return Err(LoadError::invalid(
                "redis.url",
                "required when a redis backend is selected",
            ));
        }

        Ok(Self {
            server,
            logging,
            database,
            cache,
            rate_limit,
            redis,
            site,
            http,
        })
    }

    /// True when any subsystem needs a Redis connection.
    pub fn redis_required(&self) -> bool {
        self.cache.backend == BackendKind::Redis || self.rate_limit.backend == BackendKind::Redis
    }
}

fn build_server_settings(server: RawServerSettings) -> Result<ServerSettings, LoadError> {
    let host = server.host.unwrap_or_else(|| DEFAULT_HOST.to_string());

    let port = server.port.unwrap_or(DEFAULT_PORT);
    if port == 0 {
        return Err(LoadError::invalid(
            "server.port",
            "port must be greater than zero",
        ));
    }

    let addr = parse_socket_addr(&host, port)
        .map_err(|reason| LoadError::invalid("server.addr", reason))?;

    Ok(ServerSettings { addr })
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::INFO,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}

fn build_database_settings(database: RawDatabaseSettings) -> Result<DatabaseSettings, LoadError> {
    let url = non_blank(database.url);
    let max_connections = non_zero_u32(
        database
            .max_connections
            .unwrap_or(DEFAULT_DB_MAX_CONNECTIONS)
            .into(),
        "database.max_connections",
    )?;

    Ok(DatabaseSettings {
        url,
        max_connections,
    })
}

fn build_cache_settings(cache: RawCacheSettings) -> Result<CacheSettings, LoadError> {
    let backend = parse_backend(cache.backend, BackendKind::Memory, "cache.backend")?;
    let memory_max_entries = NonZeroUsize::new(
        cache
            .memory_max_entries
            .unwrap_or(DEFAULT_CACHE_MEMORY_MAX_ENTRIES),
    )
    .ok_or_else(|| LoadError::invalid("cache.memory_max_entries", "must be greater than zero"))?;

    Ok(CacheSettings {
        backend,
        memory_max_entries,
    })
}

fn build_rate_limit_settings(
    rate_limit: RawRateLimitSettings,
) -> Result<RateLimitSettings, LoadError> {
    let backend = parse_backend(rate_limit.backend, BackendKind::Memory, "rate_limit.backend")?;

    Ok(RateLimitSettings {
        backend,
        query: class_limit(
            rate_limit.query_max_requests,
            DEFAULT_QUERY_MAX_REQUESTS,
            "rate_limit.query_max_requests",
            rate_limit.query_window_seconds,
            DEFAULT_QUERY_WINDOW_SECS,
            "rate_limit.query_window_seconds",
        )?,
        mutation: class_limit(
            rate_limit.mutation_max_requests,
            DEFAULT_MUTATION_MAX_REQUESTS,
            "rate_limit.mutation_max_requests",
            rate_limit.mutation_window_seconds,
            DEFAULT_MUTATION_WINDOW_SECS,
            "rate_limit.mutation_window_seconds",
        )?,
        strict: class_limit(
            rate_limit.strict_max_requests,
            DEFAULT_STRICT_MAX_REQUESTS,
            "rate_limit.strict_max_requests",
            rate_limit.strict_window_seconds,
            DEFAULT_STRICT_WINDOW_SECS,
            "rate_limit.strict_window_seconds",
        )?,
    })
}

fn class_limit(
    max_requests: Option<u64>,
    default_max: u64,
    max_key: &'static str,
    window_seconds: Option<u64>,
    default_window: u64,
    window_key: &'static str,
) -> Result<ClassLimitSettings, LoadError> {
    let max_requests = non_zero_u32(max_requests.unwrap_or(default_max), max_key)?;
    let window_seconds = window_seconds.unwrap_or(default_window);
    if window_seconds == 0 {
        return Err(LoadError::invalid(window_key, "must be greater than zero"));
    }
    Ok(ClassLimitSettings {
        max_requests,
        window: Duration::from_secs(window_seconds),
    })
}

fn build_redis_settings(redis: RawRedisSettings) -> Result<RedisSettings, LoadError> {
    let url = non_blank(redis.url);
    if let Some(url) = url.as_deref() {
        let parsed =
            Url::parse(url).map_err(|err| LoadError::invalid("redis.url", err.to_string()))?;
        if !matches!(parsed.scheme(), "redis" | "rediss") {
            return Err(LoadError::invalid(
                "redis.url",
                "scheme must be redis or rediss",
            ));
        }
    }
    Ok(RedisSettings { url })
}

fn build_site_settings(site: RawSiteSettings) -> Result<SiteSettings, LoadError> {
    let raw = non_blank(site.public_url).unwrap_or_else(|| DEFAULT_SITE_URL.to_string());
    let parsed =
        Url::parse(&raw).map_err(|err| LoadError::invalid("site.public_url", err.to_string()))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(LoadError::invalid(
            "site.public_url",
            "scheme must be http or https",
        ));
    }

    Ok(SiteSettings {
        public_url: raw.trim_end_matches('/').to_string(),
    })
}

fn build_http_settings(http: RawHttpSettings) -> Result<HttpSettings, LoadError> {
    let slow_request_ms = http.slow_request_ms.unwrap_or(DEFAULT_SLOW_REQUEST_MS);
    if slow_request_ms == 0 {
        return Err(LoadError::invalid(
            "http.slow_request_ms",
            "must be greater than zero",
        ));
    }
    Ok(HttpSettings {
        slow_request: Duration::from_millis(slow_request_ms),
    })
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawServerSettings {
    host: Option<String>,
    port: Option<u16>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawDatabaseSettings {
    url: Option<String>,
    max_connections: Option<u32>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawCacheSettings {
    backend: Option<String>,
    memory_max_entries: Option<usize>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawRateLimitSettings {
    backend: Option<String>,
    query_max_requests: Option<u64>,
    query_window_seconds: Option<u64>,
    mutation_max_requests: Option<u64>,
    mutation_window_seconds: Option<u64>,
    strict_max_requests: Option<u64>,
    strict_window_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawRedisSettings {
    url: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSiteSettings {
    public_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawHttpSettings {
    slow_request_ms: Option<u64>,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.and_then(|value| {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    })
}

fn parse_backend(
    value: Option<String>,
    default: BackendKind,
    key: &'static str,
) -> Result<BackendKind, LoadError> {
    match non_blank(value) {
        Some(value) => BackendKind::from_str(&value).map_err(|reason| LoadError::invalid(key, reason)),
        None => Ok(default),
    }
}

fn parse_socket_addr(host: &str, port: u16) -> Result<SocketAddr, String> {
    let candidate = format!("{host}:{port}");
    candidate
        .parse()
        .map_err(|err| format!("invalid address `{candidate}`: {err}"))
}

fn non_zero_u32(value: u64, key: &'static str) -> Result<NonZeroU32, LoadError> {
    if value == 0 {
        return Err(LoadError::invalid(key, "must be greater than zero"));
    }
    let value_u32: u32 = value
        .try_into()
        .map_err(|_| LoadError::invalid(key, "value exceeds supported range for u32"))?;
    NonZeroU32::new(value_u32).ok_or_else(|| LoadError::invalid(key, "must be greater than zero"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let settings = Settings::from_raw(RawSettings::default()).expect("valid settings");

        assert_eq!(settings.server.addr.port(), DEFAULT_PORT);
        assert_eq!(settings.cache.backend, BackendKind::Memory);
        assert_eq!(settings.rate_limit.query.max_requests.get(), 30);
        assert_eq!(settings.rate_limit.query.window, Duration::from_secs(10));
        assert_eq!(settings.rate_limit.mutation.max_requests.get(), 10);
        assert_eq!(settings.rate_limit.strict.max_requests.get(), 5);
        assert_eq!(settings.rate_limit.strict.window, Duration::from_secs(60));
        assert_eq!(settings.site.public_url, "https://bloghub.vercel.app");
        assert_eq!(settings.http.slow_request, Duration::from_millis(1000));
        assert!(settings.database.url.is_none());
        assert!(!settings.redis_required());
    }

    #[test]
    fn cli_overrides_take_highest_precedence() {
        let mut raw = RawSettings::default();
        raw.server.port = Some(4000);
        raw.logging.level = Some("info".to_string());

        let overrides = ServeOverrides {
            server_port: Some(4321),
            log_level: Some("debug".to_string()),
            ..Default::default()
        };

        raw.apply_serve_overrides(&overrides);
        let settings = Settings::from_raw(raw).expect("valid settings");

        assert_eq!(settings.server.addr.port(), 4321);
        assert_eq!(settings.logging.level, LevelFilter::DEBUG);
    }

    #[test]
    fn cli_json_logging_enforces_format() {
        let mut raw = RawSettings::default();
        let overrides = ServeOverrides {
            log_json: Some(true),
            ..Default::default()
        };

        raw.apply_serve_overrides(&overrides);
        let settings = Settings::from_raw(raw).expect("valid settings");
        assert!(matches!(settings.logging.format, LogFormat::Json));
    }

    #[test]
    fn redis_backend_requires_url() {
        let mut raw = RawSettings::default();
        raw.cache.backend = Some("redis".to_string());

        let err = Settings::from_raw(raw.clone()).expect_err("missing url");
        assert!(matches!(err, LoadError::Invalid { key: "redis.url", .. }));

        raw.redis.url = Some("redis://127.0.0.1:6379".to_string());
        let settings = Settings::from_raw(raw).expect("valid settings");
        assert!(settings.redis_required());
    }

    #[test]
    fn unknown_backend_is_rejected() {
        let mut raw = RawSettings::default();
        raw.rate_limit.backend = Some("memcached".to_string());
        let err = Settings::from_raw(raw).expect_err("unknown backend");
        assert!(matches!(
            err,
            LoadError::Invalid {
                key: "rate_limit.backend",
                ..
            }
        ));
    }

    #[test]
    fn class_limits_can_be_overridden() {
        let mut raw = RawSettings::default();
        raw.rate_limit.strict_max_requests = Some(2);
        raw.rate_limit.strict_window_seconds = Some(5);
        let settings = Settings::from_raw(raw).expect("valid settings");
        assert_eq!(settings.rate_limit.strict.max_requests.get(), 2);
        assert_eq!(settings.rate_limit.strict.window, Duration::from_secs(5));
    }

    #[test]
    fn site_url_loses_trailing_slash_and_requires_http() {
        let mut raw = RawSettings::default();
        raw.site.public_url = Some("https://example.com/".to_string());
        let settings = Settings::from_raw(raw.clone()).expect("valid settings");
        assert_eq!(settings.site.public_url, "https://example.com");

        raw.site.public_url = Some("ftp://example.com".to_string());
        assert!(Settings::from_raw(raw).is_err());
    }

    #[test]
    fn zero_slow_request_threshold_is_rejected() {
        let mut raw = RawSettings::default();
        raw.http.slow_request_ms = Some(0);
        assert!(Settings::from_raw(raw).is_err());
    }
}
