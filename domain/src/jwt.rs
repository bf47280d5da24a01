//! Verification of the access tokens clients present when opening a stream or
//! reading their notifications. Tokens are issued by the auth service; this
//! module only checks them.

use crate::error::Error;
use entity::Id;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use log::*;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
pub struct AccessClaims {
    /// The user the token was issued to
    pub sub: Id,
    pub exp: u64,
}

/// Checks signature and expiry of an HS256 access token and returns the user
/// it was issued to.
pub fn verify_access_token(secret: &[u8], token: &str) -> Result<Id, Error> {
    let validation = Validation::new(Algorithm::HS256);
    let data = decode::<AccessClaims>(token, &DecodingKey::from_secret(secret), &validation)
        .map_err(|err| {
            debug!("Rejected access token: {err}");
            err
        })?;
    Ok(data.claims.sub)
}
