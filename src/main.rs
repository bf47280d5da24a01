use domain::notification::NotificationDispatcher;
use events::EventPublisher;
use fanout::{FanoutChannel, RedisFanout};
use log::*;
use migration::{Migrator, MigratorTrait};
use service::{config::Config, logging::Logger};
use sse::SseDomainEventHandler;
use std::sync::Arc;

#[tokio::main]
async fn main() {
    let config = Config::new();
    if let Err(e) = Logger::init_logger(&config) {
        eprintln!("Failed to initialize logger: {e}");
    }

    info!(
        "Starting up blind_notify [{}] on {}:{}...",
        config.runtime_env(),
        config.interface,
        config.port
    );

    let db = match service::init_database(&config).await {
        Ok(db) => Arc::new(db),
        Err(e) => {
            error!("Failed to establish database connection: {e}");
            std::process::exit(1);
        }
    };

    if let Err(e) = Migrator::up(db.as_ref(), None).await {
        error!("Failed to apply database migrations: {e}");
        std::process::exit(1);
    }

    let redis = match service::init_redis(&config) {
        Ok(client) => client,
        Err(e) => {
            error!("Invalid Redis configuration: {e}");
            std::process::exit(1);
        }
    };
    let fanout: Arc<dyn FanoutChannel> = Arc::new(RedisFanout::new(redis));

    let sse_manager = Arc::new(sse::Manager::new(config.sse_buffer_capacity));

    // Every instance delivers what any instance publishes
    let subscriber = fanout.subscribe(
        config.notification_topic(),
        Arc::new(SseDomainEventHandler::new(Arc::clone(&sse_manager))),
    );
    let heartbeat = Arc::clone(&sse_manager).spawn_heartbeat(config.heartbeat_interval());

    let event_publisher = Arc::new(EventPublisher::new().with_handler(Arc::new(
        NotificationDispatcher::new(
            Arc::clone(&db),
            Arc::clone(&fanout),
            config.notification_topic(),
        ),
    )));

    let service_state = service::AppState::new(config, &db);
    let app_state = web::AppState::new(service_state, &event_publisher, &sse_manager);

    if let Err(e) = web::init_server(app_state, shutdown_signal()).await {
        error!("Server error: {e}");
    }

    subscriber.abort();
    heartbeat.abort();
    info!("Shutdown complete");
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for the shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
}
