use crate::extractors::RejectionType;
use crate::AppState;
use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts, StatusCode},
};
use domain::{jwt, Id};
use log::*;

/// The user an `Authorization: Bearer <token>` header was issued to.
pub(crate) struct AuthenticatedUser(pub Id);

#[async_trait]
impl FromRequestParts<AppState> for AuthenticatedUser {
    type Rejection = RejectionType;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts).ok_or_else(|| {
            trace!("Request to {} carries no bearer token", parts.uri.path());
            unauthorized()
        })?;

        match jwt::verify_access_token(state.config().jwt_secret().as_bytes(), token) {
            Ok(user_id) => Ok(AuthenticatedUser(user_id)),
            Err(err) => {
                debug!("Rejecting request to {}: {err}", parts.uri.path());
                Err(unauthorized())
            }
        }
    }
}

fn bearer_token(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

fn unauthorized() -> RejectionType {
    (StatusCode::UNAUTHORIZED, "Unauthorized".to_string())
}
