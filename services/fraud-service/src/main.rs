use actix_cors::Cors;
use actix_web::{middleware, web, App, HttpServer};
use anyhow::Context;
use dotenv::dotenv;
use fraud_engine::{
    AlertReviewService, FraudEngine, FraudRepository, InMemoryRepository, InProcessQueue,
    JobOptions, LogNotifier, Notifier, QueueDispatcher,
};
use fraud_service::{
    config::{Config, StorageBackend},
    database::{self, PgNotifier, PgRepository},
    handlers, AppState,
};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_FILTER: &str = "fraud_service=info,fraud_engine=info,actix_web=info";

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .json()
        .init();

    info!("Starting Fraud Service...");

    let config = Config::from_env().context("Failed to load configuration")?;
    let engine_config = config
        .engine_config()
        .context("Failed to load engine configuration")?;
    info!("Configuration loaded successfully");

    #[cfg(target_os = "linux")]
    prometheus::register(Box::new(
        prometheus::process_collector::ProcessCollector::for_self(),
    ))
    .context("Failed to register process metrics")?;

    let (repository, notifier, pool) = match config.storage.backend {
        StorageBackend::Postgres => {
            info!("Connecting to database");
            let pool = database::create_pool(&config.database.url, config.database.max_connections)
                .await
                .context("Database connection failed")?;
            database::health_check(&pool)
                .await
                .context("Database not accessible")?;
            info!("Database health check passed");

            (
                Arc::new(PgRepository::new(pool.clone())) as Arc<dyn FraudRepository>,
                Arc::new(PgNotifier::new(pool.clone())) as Arc<dyn Notifier>,
                Some(pool),
            )
        }
        StorageBackend::Memory => {
            warn!("Using in-memory storage; alerts do not survive a restart");
            (
                Arc::new(InMemoryRepository::new()) as Arc<dyn FraudRepository>,
                Arc::new(LogNotifier) as Arc<dyn Notifier>,
                None,
            )
        }
    };

    let engine = Arc::new(FraudEngine::new(repository.clone(), notifier, &engine_config));
    info!(rules = ?engine.registry().rule_names(), "Fraud rules registered");

    let queue = InProcessQueue::new(config.engine.queue_capacity);
    let workers = queue.start(engine, engine_config.queue.workers);
    let dispatcher = QueueDispatcher::new(
        Arc::new(queue.clone()),
        JobOptions::from(&engine_config.queue),
    );
    let review = AlertReviewService::new(repository, engine_config.alerts.clone());
    let state = web::Data::new(AppState::new(review, dispatcher, queue, pool));

    let server_config = config.server.clone();
    info!(
        "Starting HTTP server on {}:{}",
        server_config.host, server_config.port
    );

    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .wrap(
                Cors::default()
                    .allow_any_origin()
                    .allow_any_method()
                    .allow_any_header()
                    .max_age(3600),
            )
            .wrap(middleware::Logger::default())
            .configure(handlers::configure_routes)
    })
    .workers(server_config.workers)
    .bind((server_config.host, server_config.port))?
    .run()
    .await?;

    info!("HTTP server stopped; draining fraud check queue");
    workers.shutdown().await;
    Ok(())
}
