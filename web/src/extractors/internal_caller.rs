use crate::extractors::RejectionType;
use crate::AppState;
use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{request::Parts, StatusCode},
};
use log::*;

pub(crate) const INTERNAL_API_KEY_HEADER: &str = "x-internal-api-key";

/// A backend service presenting the shared internal API key.
pub(crate) struct InternalCaller;

#[async_trait]
impl FromRequestParts<AppState> for InternalCaller {
    type Rejection = RejectionType;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let Some(expected) = state.config().internal_api_key() else {
            warn!(
                "Refusing request to {}: no internal API key is configured",
                parts.uri.path()
            );
            return Err((StatusCode::FORBIDDEN, "Forbidden".to_string()));
        };

        match presented_key(parts) {
            Some(key) if key == expected => Ok(InternalCaller),
            Some(_) => {
                warn!("Rejecting request to {}: wrong internal API key", parts.uri.path());
                Err(unauthorized())
            }
            None => {
                debug!("Request to {} carries no internal API key", parts.uri.path());
                Err(unauthorized())
            }
        }
    }
}

fn presented_key(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(INTERNAL_API_KEY_HEADER)?
        .to_str()
        .ok()
        .map(str::trim)
        .filter(|key| !key.is_empty())
}

fn unauthorized() -> RejectionType {
    (StatusCode::UNAUTHORIZED, "Unauthorized".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    fn parts_with(key: Option<&str>) -> Parts {
        let mut builder = Request::builder().uri("/events");
        if let Some(value) = key {
            builder = builder.header(INTERNAL_API_KEY_HEADER, value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[test]
    fn key_is_read_from_its_header() {
        assert_eq!(presented_key(&parts_with(Some(" k3y "))), Some("k3y"));
    }

    #[test]
    fn blank_or_missing_keys_are_ignored() {
        assert_eq!(presented_key(&parts_with(Some(""))), None);
        assert_eq!(presented_key(&parts_with(None)), None);
    }
}
