use crate::controller::ApiResponse;
use crate::extractors::authenticated_user::AuthenticatedUser;
use crate::{AppState, Error};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use domain::notification as NotificationApi;
use domain::Id;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use log::*;

#[derive(Debug, Default, Deserialize, IntoParams)]
pub(crate) struct IndexParams {
    /// Zero based page number
    pub(crate) page: Option<u64>,
    /// Page size, 1 to 100 (default 20)
    pub(crate) size: Option<u64>,
}

#[derive(Debug, Serialize, ToSchema)]
pub(crate) struct UnreadCount {
    pub(crate) count: u64,
}

#[derive(Debug, Serialize, ToSchema)]
pub(crate) struct MarkedRead {
    pub(crate) updated: u64,
}

/// GET the authenticated user's notifications, newest first
#[utoipa::path(
    get,
    path = "/notifications",
    params(IndexParams),
    responses(
        (status = 200, description = "Successfully retrieved a page of notifications", body = domain::notification::Page),
        (status = 401, description = "Unauthorized"),
        (status = 405, description = "Method not allowed")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn index(
    AuthenticatedUser(user_id): AuthenticatedUser,
    State(app_state): State<AppState>,
    Query(params): Query<IndexParams>,
) -> Result<impl IntoResponse, Error> {
    debug!("GET notifications for user {user_id}: {params:?}");

    let page =
        NotificationApi::list(app_state.db_conn_ref(), user_id, params.page, params.size).await?;

    debug!("Found {} of {} notification(s)", page.items.len(), page.total);

    Ok(Json(ApiResponse::new(StatusCode::OK.into(), page)))
}

/// GET how many of the authenticated user's notifications are unread
#[utoipa::path(
    get,
    path = "/notifications/unread-count",
    responses(
        (status = 200, description = "Successfully counted unread notifications", body = UnreadCount),
        (status = 401, description = "Unauthorized")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn unread_count(
    AuthenticatedUser(user_id): AuthenticatedUser,
    State(app_state): State<AppState>,
) -> Result<impl IntoResponse, Error> {
    let count = NotificationApi::unread_count(app_state.db_conn_ref(), user_id).await?;

    Ok(Json(ApiResponse::new(
        StatusCode::OK.into(),
        UnreadCount { count },
    )))
}

/// PATCH mark one of the authenticated user's notifications as read
#[utoipa::path(
    patch,
    path = "/notifications/{id}/read",
    params(
        ("id" = Uuid, Path, description = "Id of the notification to mark as read")
    ),
    responses(
        (status = 200, description = "Successfully marked the notification as read", body = domain::notifications::Model),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Notification not found")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn mark_read(
    AuthenticatedUser(user_id): AuthenticatedUser,
    State(app_state): State<AppState>,
    Path(id): Path<Id>,
) -> Result<impl IntoResponse, Error> {
    debug!("PATCH mark notification {id} read for user {user_id}");

    let notification = NotificationApi::mark_read(app_state.db_conn_ref(), user_id, id).await?;

    Ok(Json(ApiResponse::new(StatusCode::OK.into(), notification)))
}

/// PATCH mark every unread notification of the authenticated user as read
#[utoipa::path(
    patch,
    path = "/notifications/read-all",
    responses(
        (status = 200, description = "Successfully marked all notifications as read", body = MarkedRead),
        (status = 401, description = "Unauthorized")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn mark_all_read(
    AuthenticatedUser(user_id): AuthenticatedUser,
    State(app_state): State<AppState>,
) -> Result<impl IntoResponse, Error> {
    let updated = NotificationApi::mark_all_read(app_state.db_conn_ref(), user_id).await?;

    info!("Marked {updated} notification(s) read for user {user_id}");

    Ok(Json(ApiResponse::new(
        StatusCode::OK.into(),
        MarkedRead { updated },
    )))
}
