//! Grantwatch detection worker runtime.
//!
//! Runs the detection scheduler and the notification dispatcher as two
//! periodic loops over one shared connection pool.

#![forbid(unsafe_code)]

use std::env;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use grantwatch_application::{
    DeliveryPolicy, DetectionOutcome, DetectionSchedule, DetectionService, MailTransport,
    NotificationService,
};
use grantwatch_core::{AppError, AppResult, ResourceId};
use grantwatch_domain::{PeriodPolicy, parse_week_start};
use grantwatch_infrastructure::{
    ConsoleMailTransport, HttpPermissionSource, InMemoryComparisonCache,
    PostgresBaselineRepository, PostgresChangeRepository, PostgresDetectionRunRepository,
    PostgresNotificationQueueRepository, PostgresRecipientRepository, SmtpMailConfig,
    SmtpMailTransport, SystemClock,
};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Clone)]
enum MailProviderConfig {
    Console,
    Smtp(SmtpMailConfig),
}

#[derive(Clone)]
struct WorkerConfig {
    database_url: String,
    source_base_url: String,
    source_bearer_token: Option<String>,
    detection_interval_seconds: Option<u64>,
    detection_cron: Option<String>,
    detection_concurrency: usize,
    detection_timeout_seconds: u64,
    detection_stale_seconds: u32,
    comparison_cache_ttl_seconds: u32,
    dispatch_interval_seconds: u64,
    delivery_batch_limit: usize,
    delivery_max_attempts: u32,
    delivery_backoff_base_seconds: u32,
    delivery_backoff_cap_seconds: u32,
    delivery_timeout_seconds: u32,
    delivery_stale_seconds: u32,
    period_boundary_hour: u32,
    period_week_start: String,
    mail_provider: MailProviderConfig,
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = WorkerConfig::load()?;
    let schedule = DetectionSchedule::from_settings(
        config.detection_interval_seconds,
        config.detection_cron.as_deref(),
    )?;
    let period_policy = PeriodPolicy::new(
        config.period_boundary_hour,
        parse_week_start(config.period_week_start.as_str())?,
    )?;

    let pool = connect_and_migrate(config.database_url.as_str()).await?;
    let detection_service = Arc::new(build_detection_service(pool.clone(), &config)?);
    let notification_service = Arc::new(build_notification_service(pool, &config, period_policy));

    info!(
        source_base_url = %config.source_base_url,
        detection_concurrency = config.detection_concurrency,
        detection_timeout_seconds = config.detection_timeout_seconds,
        dispatch_interval_seconds = config.dispatch_interval_seconds,
        delivery_batch_limit = config.delivery_batch_limit,
        "grantwatch-worker started"
    );

    let dispatcher_service = notification_service.clone();
    let dispatch_interval_seconds = config.dispatch_interval_seconds;
    let delivery_batch_limit = config.delivery_batch_limit;
    tokio::spawn(async move {
        dispatcher_loop(
            dispatcher_service,
            dispatch_interval_seconds,
            delivery_batch_limit,
        )
        .await;
    });

    loop {
        let Some(next_fire) = schedule.next_after(Utc::now()) else {
            return Err(AppError::Validation(
                "detection schedule yields no future fire time".to_owned(),
            ));
        };
        let wait = (next_fire - Utc::now()).to_std().unwrap_or(Duration::ZERO);
        tokio::time::sleep(wait).await;

        run_detection_tick(&detection_service, config.detection_concurrency).await;
    }
}

async fn connect_and_migrate(database_url: &str) -> AppResult<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(database_url)
        .await
        .map_err(|error| AppError::Store(format!("failed to connect to database: {error}")))?;

    sqlx::migrate!("../../crates/infrastructure/migrations")
        .run(&pool)
        .await
        .map_err(|error| AppError::Store(format!("failed to run migrations: {error}")))?;

    Ok(pool)
}

fn build_detection_service(pool: PgPool, config: &WorkerConfig) -> AppResult<DetectionService> {
    let http_client = reqwest::Client::builder()
        .timeout(Duration::from_secs(15))
        .build()
        .map_err(|error| AppError::Internal(format!("failed to build HTTP client: {error}")))?;

    let baselines = Arc::new(PostgresBaselineRepository::new(pool.clone()));
    let changes = Arc::new(PostgresChangeRepository::new(pool.clone()));
    let runs = Arc::new(PostgresDetectionRunRepository::new(pool));
    let source = Arc::new(HttpPermissionSource::new(
        http_client,
        config.source_base_url.clone(),
        config.source_bearer_token.clone(),
    ));

    Ok(DetectionService::new(
        baselines,
        changes,
        runs,
        source,
        Arc::new(SystemClock::new()),
    )
    .with_comparison_cache(
        Arc::new(InMemoryComparisonCache::new()),
        config.comparison_cache_ttl_seconds,
    )
    .with_cycle_timeout_seconds(config.detection_timeout_seconds)
    .with_stale_run_threshold_seconds(config.detection_stale_seconds))
}

fn build_notification_service(
    pool: PgPool,
    config: &WorkerConfig,
    period_policy: PeriodPolicy,
) -> NotificationService {
    let recipients = Arc::new(PostgresRecipientRepository::new(pool.clone()));
    let queue = Arc::new(PostgresNotificationQueueRepository::new(pool));
    let transport: Arc<dyn MailTransport> = match &config.mail_provider {
        MailProviderConfig::Console => Arc::new(ConsoleMailTransport::new()),
        MailProviderConfig::Smtp(smtp_config) => {
            Arc::new(SmtpMailTransport::new(smtp_config.clone()))
        }
    };
    let delivery_policy = DeliveryPolicy {
        max_attempts: config.delivery_max_attempts,
        backoff_base_seconds: config.delivery_backoff_base_seconds,
        backoff_cap_seconds: config.delivery_backoff_cap_seconds,
        attempt_timeout_seconds: config.delivery_timeout_seconds,
        stale_sending_seconds: config.delivery_stale_seconds,
    };

    NotificationService::new(recipients, queue, transport, Arc::new(SystemClock::new()))
        .with_period_policy(period_policy)
        .with_delivery_policy(delivery_policy)
}

async fn run_detection_tick(detection_service: &Arc<DetectionService>, concurrency: usize) {
    let resources = match detection_service.monitored_resources().await {
        Ok(resources) => resources,
        Err(error) => {
            warn!(error = %error, "failed to enumerate monitored resources");
            return;
        }
    };

    if resources.is_empty() {
        return;
    }

    info!(resource_count = resources.len(), "detection tick started");

    let semaphore = Arc::new(Semaphore::new(concurrency));
    let mut cycles = JoinSet::new();
    for resource_id in resources {
        let Ok(permit) = semaphore.clone().acquire_owned().await else {
            break;
        };
        let service = detection_service.clone();
        cycles.spawn(async move {
            let outcome = service.run_detection_now(&resource_id).await;
            drop(permit);
            (resource_id, outcome)
        });
    }

    while let Some(joined) = cycles.join_next().await {
        match joined {
            Ok((resource_id, Ok(outcome))) => log_detection_outcome(&resource_id, &outcome),
            Ok((resource_id, Err(error))) => {
                warn!(
                    resource_id = %resource_id,
                    error = %error,
                    "detection cycle could not record its run"
                );
            }
            Err(error) => {
                warn!(error = %error, "detection cycle task aborted");
            }
        }
    }
}

fn log_detection_outcome(resource_id: &ResourceId, outcome: &DetectionOutcome) {
    match outcome {
        DetectionOutcome::Completed {
            run_id,
            new_changes,
        } => {
            info!(
                resource_id = %resource_id,
                run_id = %run_id,
                new_changes = new_changes,
                "detection cycle completed"
            );
        }
        DetectionOutcome::NoActiveBaseline { run_id } => {
            info!(
                resource_id = %resource_id,
                run_id = %run_id,
                "resource has no active baseline"
            );
        }
        DetectionOutcome::AlreadyRunning => {
            info!(
                resource_id = %resource_id,
                "detection cycle already in flight, skipped"
            );
        }
        DetectionOutcome::Failed {
            run_id,
            kind,
            message,
        } => {
            warn!(
                resource_id = %resource_id,
                run_id = %run_id,
                kind = kind.as_str(),
                error = %message,
                "detection cycle failed"
            );
        }
    }
}

async fn dispatcher_loop(
    notification_service: Arc<NotificationService>,
    interval_seconds: u64,
    batch_limit: usize,
) {
    loop {
        tokio::time::sleep(Duration::from_secs(interval_seconds)).await;

        match notification_service.bundle_pending().await {
            Ok(0) => {}
            Ok(bundled) => info!(bundled = bundled, "notification bundles enqueued"),
            Err(error) => warn!(error = %error, "notification bundling tick failed"),
        }

        match notification_service.process_queue(batch_limit).await {
            Ok(report) if report.delivered + report.retried + report.failed > 0 => {
                info!(
                    delivered = report.delivered,
                    retried = report.retried,
                    failed = report.failed,
                    "notification delivery tick finished"
                );
            }
            Ok(_) => {}
            Err(error) => warn!(error = %error, "notification delivery tick failed"),
        }

        match notification_service.release_stale_sending().await {
            Ok(0) => {}
            Ok(released) => {
                warn!(
                    released = released,
                    "returned stale sending entries to pending"
                );
            }
            Err(error) => warn!(error = %error, "stale sending sweep failed"),
        }
    }
}

impl WorkerConfig {
    fn load() -> AppResult<Self> {
        let database_url = required_env("DATABASE_URL")?;
        let source_base_url = required_env("PERMISSION_SOURCE_BASE_URL")?
            .trim_end_matches('/')
            .to_owned();
        let source_bearer_token = env::var("PERMISSION_SOURCE_TOKEN")
            .ok()
            .map(|value| value.trim().to_owned())
            .filter(|value| !value.is_empty());

        let mut detection_interval_seconds = optional_env_u64("DETECTION_INTERVAL_SECONDS")?;
        let detection_cron = env::var("DETECTION_CRON")
            .ok()
            .map(|value| value.trim().to_owned())
            .filter(|value| !value.is_empty());
        if detection_interval_seconds.is_none() && detection_cron.is_none() {
            detection_interval_seconds = Some(3600);
        }

        let detection_concurrency = parse_env_usize("DETECTION_CONCURRENCY", 4)?;
        let detection_timeout_seconds = parse_env_u64("DETECTION_TIMEOUT_SECONDS", 300)?;
        let detection_stale_seconds = parse_env_u32("DETECTION_STALE_SECONDS", 900)?;
        let comparison_cache_ttl_seconds = parse_env_u32("COMPARISON_CACHE_TTL_SECONDS", 300)?;
        let dispatch_interval_seconds = parse_env_u64("DISPATCH_INTERVAL_SECONDS", 300)?;
        let delivery_batch_limit = parse_env_usize("DELIVERY_BATCH_LIMIT", 10)?;
        let delivery_max_attempts = parse_env_u32("DELIVERY_MAX_ATTEMPTS", 5)?;
        let delivery_backoff_base_seconds = parse_env_u32("DELIVERY_BACKOFF_BASE_SECONDS", 60)?;
        let delivery_backoff_cap_seconds = parse_env_u32("DELIVERY_BACKOFF_CAP_SECONDS", 3600)?;
        let delivery_timeout_seconds = parse_env_u32("DELIVERY_TIMEOUT_SECONDS", 30)?;
        let delivery_stale_seconds = parse_env_u32("DELIVERY_STALE_SECONDS", 900)?;
        let period_boundary_hour = parse_env_u32("PERIOD_BOUNDARY_HOUR", 8)?;
        let period_week_start =
            env::var("PERIOD_WEEK_START").unwrap_or_else(|_| "monday".to_owned());

        if detection_concurrency == 0 {
            return Err(AppError::Validation(
                "DETECTION_CONCURRENCY must be greater than zero".to_owned(),
            ));
        }

        if dispatch_interval_seconds == 0 {
            return Err(AppError::Validation(
                "DISPATCH_INTERVAL_SECONDS must be greater than zero".to_owned(),
            ));
        }

        if delivery_batch_limit == 0 {
            return Err(AppError::Validation(
                "DELIVERY_BATCH_LIMIT must be greater than zero".to_owned(),
            ));
        }

        if delivery_max_attempts == 0 {
            return Err(AppError::Validation(
                "DELIVERY_MAX_ATTEMPTS must be greater than zero".to_owned(),
            ));
        }

        let mail_provider = match env::var("EMAIL_PROVIDER")
            .unwrap_or_else(|_| "console".to_owned())
            .as_str()
        {
            "console" => MailProviderConfig::Console,
            "smtp" => {
                let port = required_env("SMTP_PORT")?
                    .parse::<u16>()
                    .map_err(|error| AppError::Validation(format!("invalid SMTP_PORT: {error}")))?;
                MailProviderConfig::Smtp(SmtpMailConfig {
                    host: required_env("SMTP_HOST")?,
                    port,
                    username: required_env("SMTP_USERNAME")?,
                    password: required_env("SMTP_PASSWORD")?,
                    from_address: required_env("SMTP_FROM_ADDRESS")?,
                })
            }
            other => {
                return Err(AppError::Validation(format!(
                    "EMAIL_PROVIDER must be either 'console' or 'smtp', got '{other}'"
                )));
            }
        };

        Ok(Self {
            database_url,
            source_base_url,
            source_bearer_token,
            detection_interval_seconds,
            detection_cron,
            detection_concurrency,
            detection_timeout_seconds,
            detection_stale_seconds,
            comparison_cache_ttl_seconds,
            dispatch_interval_seconds,
            delivery_batch_limit,
            delivery_max_attempts,
            delivery_backoff_base_seconds,
            delivery_backoff_cap_seconds,
            delivery_timeout_seconds,
            delivery_stale_seconds,
            period_boundary_hour,
            period_week_start,
            mail_provider,
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

fn optional_env_u64(name: &str) -> AppResult<Option<u64>> {
    match env::var(name) {
        Ok(value) => value
            .parse::<u64>()
            .map(Some)
            .map_err(|error| {
                AppError::Validation(format!("invalid {name} value '{value}': {error}"))
            }),
        Err(_) => Ok(None),
    }
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
