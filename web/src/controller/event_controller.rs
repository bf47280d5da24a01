use crate::controller::ApiResponse;
use crate::extractors::internal_caller::InternalCaller;
use crate::{AppState, Error};
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use events::DomainEvent;
use serde::Serialize;

use log::*;

#[derive(Debug, Serialize)]
pub(crate) struct Accepted {
    pub(crate) accepted: usize,
}

/// POST events whose business transaction has already committed. They are
/// handed to the publisher in the order given.
pub async fn publish(
    _caller: InternalCaller,
    State(app_state): State<AppState>,
    Json(events): Json<Vec<DomainEvent>>,
) -> Result<impl IntoResponse, Error> {
    let accepted = events.len();
    debug!("POST {accepted} committed event(s)");

    app_state.event_publisher.publish_all(events).await;

    Ok((
        StatusCode::ACCEPTED,
        Json(ApiResponse::new(
            StatusCode::ACCEPTED.into(),
            Accepted { accepted },
        )),
    ))
}
