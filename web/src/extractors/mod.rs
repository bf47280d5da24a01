pub(crate) mod authenticated_user;
pub(crate) mod internal_caller;

use axum::http::StatusCode;

type RejectionType = (StatusCode, String);
