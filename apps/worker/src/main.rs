//! Leasehold approval worker runtime.

#![forbid(unsafe_code)]

use std::env;
use std::sync::Arc;
use std::time::Duration;

use leasehold_application::{
    ApprovalPolicy, ApprovalService, AuditFailurePolicy, AuditLogger, Clock, NotificationPublisher,
    PermissionChecker, PermissionContextCache, ScopeResolver,
};
use leasehold_core::{AppError, AppResult, RequestContext};
use leasehold_domain::PermissionMatrix;
use leasehold_infrastructure::{
    ConsoleNotificationSink, HttpWebhookNotificationSink, InMemoryPermissionContextCache,
    PostgresApprovalRequestRepository, PostgresAuditRepository, PostgresAuthorizationRepository,
    QueuedNotificationPublisher, RedisPermissionContextCache, SystemClock,
};

use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const NOTIFICATION_WEBHOOK_MAX_ATTEMPTS: u8 = 3;
const NOTIFICATION_WEBHOOK_BACKOFF_MS: u64 = 250;
const SHUTDOWN_DRAIN_TIMEOUT: Duration = Duration::from_secs(10);
const MAX_REQUEST_TTL_HOURS: u32 = 24 * 366;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NotificationProvider {
    Console,
    Webhook,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ContextCacheProvider {
    Memory,
    Redis,
}

#[derive(Debug, Clone)]
struct WorkerConfig {
    database_url: String,
    request_ttl_hours: u32,
    sweep_interval_ms: u64,
    persistence_timeout_ms: u64,
    audit_failure_policy: AuditFailurePolicy,
    notification_provider: NotificationProvider,
    notification_webhook_url: Option<String>,
    notification_timeout_ms: u64,
    notification_queue_capacity: usize,
    context_cache_provider: ContextCacheProvider,
    redis_url: Option<String>,
    context_cache_ttl_seconds: u32,
}

struct WorkerRuntime {
    approval_service: ApprovalService,
    audit_logger: AuditLogger,
    clock: Arc<dyn Clock>,
    notification_drain: JoinHandle<()>,
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = WorkerConfig::load()?;
    let pool = connect_pool(config.database_url.as_str()).await?;

    sqlx::migrate!("../../crates/infrastructure/migrations")
        .run(&pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to run migrations: {error}")))?;

    let runtime = build_runtime(pool, &config)?;

    info!(
        request_ttl_hours = config.request_ttl_hours,
        sweep_interval_ms = config.sweep_interval_ms,
        persistence_timeout_ms = config.persistence_timeout_ms,
        notification_provider = ?config.notification_provider,
        context_cache = ?config.context_cache_provider,
        "leasehold-worker started"
    );

    let sweep_interval = Duration::from_millis(config.sweep_interval_ms);
    let persistence_timeout = Duration::from_millis(config.persistence_timeout_ms);

    loop {
        run_sweep(&runtime, persistence_timeout).await;

        tokio::select! {
            () = tokio::time::sleep(sweep_interval) => {}
            signal = tokio::signal::ctrl_c() => {
                if let Err(error) = signal {
                    warn!(error = %error, "failed to listen for shutdown signal");
                }
                break;
            }
        }
    }

    shutdown(runtime).await;
    Ok(())
}

async fn run_sweep(runtime: &WorkerRuntime, persistence_timeout: Duration) {
    let now = runtime.clock.now();
    let context = RequestContext::system().with_deadline(persistence_timeout);

    if let Err(error) = runtime.approval_service.expire_due(now, &context).await {
        warn!(error = %error, "approval expiry sweep failed");
    }

    let flushed = runtime.audit_logger.flush().await;
    if flushed > 0 {
        info!(flushed, "flushed buffered audit entries");
    }
}

async fn shutdown(runtime: WorkerRuntime) {
    let WorkerRuntime {
        approval_service,
        audit_logger,
        notification_drain,
        ..
    } = runtime;

    let flushed = audit_logger.flush().await;
    let still_buffered = audit_logger.buffered_len().await;
    if still_buffered > 0 {
        warn!(still_buffered, "audit entries left unwritten at shutdown");
    }

    // The drain task ends once the last publisher handle is gone.
    drop(approval_service);
    drop(audit_logger);

    if tokio::time::timeout(SHUTDOWN_DRAIN_TIMEOUT, notification_drain)
        .await
        .is_err()
    {
        warn!("notification outbox did not drain before shutdown");
    }

    info!(flushed, "leasehold-worker stopped");
}

async fn connect_pool(database_url: &str) -> AppResult<PgPool> {
    PgPoolOptions::new()
        .max_connections(5)
        .connect(database_url)
        .await
        .map_err(|error| AppError::Internal(format!("failed to connect to database: {error}")))
}

fn build_runtime(pool: PgPool, config: &WorkerConfig) -> AppResult<WorkerRuntime> {
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let authorization_repository = Arc::new(PostgresAuthorizationRepository::new(pool.clone()));
    let approval_repository = Arc::new(PostgresApprovalRequestRepository::new(pool.clone()));
    let audit_repository = Arc::new(PostgresAuditRepository::new(pool));

    let audit_logger = AuditLogger::new(audit_repository, config.audit_failure_policy)
        .with_append_timeout(Duration::from_millis(config.persistence_timeout_ms));
    let permission_checker = PermissionChecker::new(
        Arc::new(PermissionMatrix::standard()),
        authorization_repository.clone(),
        audit_logger.clone(),
        clock.clone(),
    );
    let scope_resolver = ScopeResolver::new(authorization_repository, clock.clone())
        .with_cache(build_context_cache(config)?, config.context_cache_ttl_seconds);

    let (notifier, notification_drain) = QueuedNotificationPublisher::spawn(
        build_notification_sink(config)?,
        config.notification_queue_capacity,
        Duration::from_millis(config.notification_timeout_ms),
    );

    let policy = ApprovalPolicy {
        request_ttl: chrono::Duration::hours(i64::from(config.request_ttl_hours)),
        ..ApprovalPolicy::default()
    };

    let approval_service = ApprovalService::new(
        permission_checker,
        scope_resolver,
        approval_repository,
        audit_logger.clone(),
        Arc::new(notifier),
        clock.clone(),
        policy,
    );

    Ok(WorkerRuntime {
        approval_service,
        audit_logger,
        clock,
        notification_drain,
    })
}

fn build_context_cache(config: &WorkerConfig) -> AppResult<Arc<dyn PermissionContextCache>> {
    match config.context_cache_provider {
        ContextCacheProvider::Memory => Ok(Arc::new(InMemoryPermissionContextCache::new())),
        ContextCacheProvider::Redis => {
            let redis_url = config.redis_url.as_deref().ok_or_else(|| {
                AppError::Validation(
                    "REDIS_URL is required when PERMISSION_CONTEXT_CACHE=redis".to_owned(),
                )
            })?;
            let client = redis::Client::open(redis_url).map_err(|error| {
                AppError::Validation(format!("invalid REDIS_URL '{redis_url}': {error}"))
            })?;

            Ok(Arc::new(RedisPermissionContextCache::new(
                client,
                "leasehold:permission_context",
            )))
        }
    }
}

fn build_notification_sink(config: &WorkerConfig) -> AppResult<Arc<dyn NotificationPublisher>> {
    match config.notification_provider {
        NotificationProvider::Console => Ok(Arc::new(ConsoleNotificationSink::new())),
        NotificationProvider::Webhook => {
            let endpoint = config.notification_webhook_url.clone().ok_or_else(|| {
                AppError::Validation(
                    "NOTIFICATION_WEBHOOK_URL is required when NOTIFICATION_PROVIDER=webhook"
                        .to_owned(),
                )
            })?;
            let http_client = reqwest::Client::builder()
                .timeout(Duration::from_millis(config.notification_timeout_ms))
                .build()
                .map_err(|error| {
                    AppError::Internal(format!("failed to build HTTP client: {error}"))
                })?;

            Ok(Arc::new(HttpWebhookNotificationSink::new(
                http_client,
                endpoint,
                NOTIFICATION_WEBHOOK_MAX_ATTEMPTS,
                NOTIFICATION_WEBHOOK_BACKOFF_MS,
            )))
        }
    }
}

impl WorkerConfig {
    fn load() -> AppResult<Self> {
        let database_url = required_env("DATABASE_URL")?;
        let request_ttl_hours = parse_env_u32("APPROVAL_REQUEST_TTL_HOURS", 168)?;
        let sweep_interval_ms = parse_env_u64("EXPIRY_SWEEP_INTERVAL_MS", 60_000)?;
        let persistence_timeout_ms = parse_env_u64("PERSISTENCE_TIMEOUT_MS", 5_000)?;
        let audit_buffer_capacity = parse_env_usize("AUDIT_BUFFER_CAPACITY", 1024)?;
        let audit_failure_policy = match optional_env("AUDIT_FAILURE_POLICY")
            .as_deref()
            .unwrap_or("buffer")
        {
            "drop" => AuditFailurePolicy::Drop,
            "buffer" => AuditFailurePolicy::Buffer {
                capacity: audit_buffer_capacity,
            },
            other => {
                return Err(AppError::Validation(format!(
                    "invalid AUDIT_FAILURE_POLICY value '{other}', expected 'drop' or 'buffer'"
                )));
            }
        };
        let notification_provider = match optional_env("NOTIFICATION_PROVIDER")
            .as_deref()
            .unwrap_or("console")
        {
            "console" => NotificationProvider::Console,
            "webhook" => NotificationProvider::Webhook,
            other => {
                return Err(AppError::Validation(format!(
                    "invalid NOTIFICATION_PROVIDER value '{other}', expected 'console' or 'webhook'"
                )));
            }
        };
        let notification_webhook_url = optional_env("NOTIFICATION_WEBHOOK_URL");
        let notification_timeout_ms = parse_env_u64("NOTIFICATION_TIMEOUT_MS", 3_000)?;
        let notification_queue_capacity = parse_env_usize("NOTIFICATION_QUEUE_CAPACITY", 256)?;
        let context_cache_provider = match optional_env("PERMISSION_CONTEXT_CACHE")
            .as_deref()
            .unwrap_or("memory")
        {
            "memory" => ContextCacheProvider::Memory,
            "redis" => ContextCacheProvider::Redis,
            other => {
                return Err(AppError::Validation(format!(
                    "invalid PERMISSION_CONTEXT_CACHE value '{other}', expected 'memory' or 'redis'"
                )));
            }
        };
        let redis_url = optional_env("REDIS_URL");
        let context_cache_ttl_seconds = parse_env_u32("PERMISSION_CONTEXT_CACHE_TTL_SECONDS", 30)?;

        if request_ttl_hours > MAX_REQUEST_TTL_HOURS {
            return Err(AppError::Validation(format!(
                "APPROVAL_REQUEST_TTL_HOURS must not exceed {MAX_REQUEST_TTL_HOURS}"
            )));
        }

        for (name, value) in [
            ("APPROVAL_REQUEST_TTL_HOURS", u64::from(request_ttl_hours)),
            ("EXPIRY_SWEEP_INTERVAL_MS", sweep_interval_ms),
            ("PERSISTENCE_TIMEOUT_MS", persistence_timeout_ms),
            ("NOTIFICATION_TIMEOUT_MS", notification_timeout_ms),
        ] {
            if value == 0 {
                return Err(AppError::Validation(format!(
                    "{name} must be greater than zero"
                )));
            }
        }

        if notification_queue_capacity == 0 {
            return Err(AppError::Validation(
                "NOTIFICATION_QUEUE_CAPACITY must be greater than zero".to_owned(),
            ));
        }

        Ok(Self {
            database_url,
            request_ttl_hours,
            sweep_interval_ms,
            persistence_timeout_ms,
            audit_failure_policy,
            notification_provider,
            notification_webhook_url,
            notification_timeout_ms,
            notification_queue_capacity,
            context_cache_provider,
            redis_url,
            context_cache_ttl_seconds,
        })
    }
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .init();
}

fn required_env(name: &str) -> AppResult<String> {
    env::var(name).map_err(|_| AppError::Validation(format!("{name} is required")))
}

fn optional_env(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|value| value.trim().to_owned())
        .filter(|value| !value.is_empty())
}

fn parse_env_usize(name: &str, default: usize) -> AppResult<usize> {
    match env::var(name) {
        Ok(value) => value.parse::<usize>().map_err(|error| {
            AppError::Validation(format!("invalid {name} value '{value}': {error}"))
        }),
        Err(_) => Ok(default),
    }
}

fn parse_env_u32(name: &str, default: u32) -> AppResult<u32> {
    match env::var(name) {
        Ok(value) => value.parse::<u32>().map_err(|error| {
            AppError::Validation(format!("invalid {name} value '{value}': {error}"))
        }),
        Err(_) => Ok(default),
    }
}

fn parse_env_u64(name: &str, default: u64) -> AppResult<u64> {
    match env::var(name) {
        Ok(value) => value.parse::<u64>().map_err(|error| {
            AppError::Validation(format!("invalid {name} value '{value}': {error}"))
        }),
        Err(_) => Ok(default),
    }
}
