use crate::{
    controller::{event_controller, health_check_controller, notification_controller},
    sse::handler as sse_handler,
    AppState,
};
use axum::{
    routing::{get, patch, post},
    Router,
};

use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_rapidoc::RapiDoc;

// This is the global definition of our OpenAPI spec. To be a part
// of the rendered spec, a path and schema must be listed here.
#[derive(OpenApi)]
#[openapi(
        info(
            title = "Blind Notifications API"
        ),
        paths(
            health_check_controller::health_check,
            notification_controller::index,
            notification_controller::unread_count,
            notification_controller::mark_read,
            notification_controller::mark_all_read,
            sse_handler::sse_handler,
        ),
        components(
            schemas(
                domain::notifications::Model,
                domain::notification::Page,
                domain::notification_type::NotificationType,
                notification_controller::UnreadCount,
                notification_controller::MarkedRead,
            )
        ),
        modifiers(&SecurityAddon),
        tags(
            (name = "blind_notify", description = "Blind real-time notifications API")
        )
    )]
struct ApiDoc;

struct SecurityAddon;

// Access tokens are issued by the auth service and presented as bearer tokens.
impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            )
        }
    }
}

pub fn define_routes(app_state: AppState) -> Router {
    Router::new()
        .merge(health_routes())
        .merge(notification_routes(app_state.clone()))
        .merge(notification_stream_routes(app_state.clone()))
        .merge(event_routes(app_state))
        .merge(RapiDoc::with_openapi("/api-docs/openapi2.json", ApiDoc::openapi()).path("/rapidoc"))
}

fn health_routes() -> Router {
    Router::new().route("/health", get(health_check_controller::health_check))
}

fn notification_routes(app_state: AppState) -> Router {
    Router::new()
        .route("/notifications", get(notification_controller::index))
        .route(
            "/notifications/unread-count",
            get(notification_controller::unread_count),
        )
        .route(
            "/notifications/:id/read",
            patch(notification_controller::mark_read),
        )
        .route(
            "/notifications/read-all",
            patch(notification_controller::mark_all_read),
        )
        .with_state(app_state)
}

fn notification_stream_routes(app_state: AppState) -> Router {
    Router::new()
        .route("/notifications/stream", get(sse_handler::sse_handler))
        .with_state(app_state)
}

// Internal only: business services post committed events here. Left out of
// the OpenAPI document.
fn event_routes(app_state: AppState) -> Router {
    Router::new()
        .route("/events", post(event_controller::publish))
        .with_state(app_state)
}
