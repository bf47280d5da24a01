use crate::extractors::authenticated_user::AuthenticatedUser;
use crate::AppState;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::Stream;
use log::*;
use std::convert::Infallible;

/// GET open the authenticated user's notification stream
///
/// Opening a stream replaces any stream the same user already has open on
/// this instance; the older one receives `session-expired` and is closed.
#[utoipa::path(
    get,
    path = "/notifications/stream",
    responses(
        (status = 200, description = "Event stream of connected, heartbeat, notification and session-expired events", content_type = "text/event-stream"),
        (status = 401, description = "Unauthorized"),
        (status = 500, description = "The stream could not be registered")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub(crate) async fn sse_handler(
    AuthenticatedUser(user_id): AuthenticatedUser,
    State(app_state): State<AppState>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, (StatusCode, String)> {
    debug!("Establishing SSE connection for user {user_id}");

    let subscription = app_state.sse_manager.subscribe(user_id).map_err(|err| {
        error!("Failed to open SSE stream for user {user_id}: {err}");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            "INTERNAL SERVER ERROR".to_string(),
        )
    })?;

    trace!("Streaming connection {}", subscription.connection_id());

    Ok(Sse::new(subscription.into_stream()).keep_alive(KeepAlive::default()))
}
