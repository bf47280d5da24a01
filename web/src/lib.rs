use axum::http::{
    header::{ACCEPT, AUTHORIZATION, CACHE_CONTROL},
    HeaderValue, Method,
};
use events::EventPublisher;
use log::*;
use sea_orm::DatabaseConnection;
use service::config::Config;
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;

mod controller;
mod error;
mod extractors;
pub mod router;
mod sse;

pub use error::{Error, Result};

/// Everything a request handler can reach: infrastructure from `service`, the
/// publisher that committed business writes hand their events to, and this
/// instance's stream registry.
#[derive(Clone)]
pub struct AppState {
    pub service_state: service::AppState,
    pub event_publisher: Arc<EventPublisher>,
    pub sse_manager: Arc<::sse::Manager>,
}

impl AppState {
    pub fn new(
        service_state: service::AppState,
        event_publisher: &Arc<EventPublisher>,
        sse_manager: &Arc<::sse::Manager>,
    ) -> Self {
        Self {
            service_state,
            event_publisher: Arc::clone(event_publisher),
            sse_manager: Arc::clone(sse_manager),
        }
    }

    pub fn db_conn_ref(&self) -> &DatabaseConnection {
        self.service_state.db_conn_ref()
    }

    pub fn config(&self) -> &Config {
        &self.service_state.config
    }
}

/// Serves the HTTP API until `shutdown` resolves. Open event streams are
/// dropped on shutdown, which unregisters their connections.
pub async fn init_server<F>(app_state: AppState, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let config = app_state.config();
    let address = format!("{}:{}", config.interface, config.port);
    let cors = cors_layer(config);

    let listener = TcpListener::bind(&address).await?;
    info!("Server listening on http://{address}");

    axum::serve(listener, router::define_routes(app_state).layer(cors))
        .with_graceful_shutdown(async move {
            shutdown.await;
            info!("Server shutting down...");
        })
        .await
}

fn cors_layer(config: &Config) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid allowed origin: {origin}");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::PATCH, Method::OPTIONS])
        .allow_headers([AUTHORIZATION, ACCEPT, CACHE_CONTROL])
        .allow_credentials(true)
}
