//! Caller identity: consumed, never verified here.
//!
//! An upstream authentication layer is expected to put the verified user id in the
//! `X-User-ID` header. Creation paths require it; reads do not ask for it.

use crate::error::AppError;
use async_trait::async_trait;
use axum::{extract::FromRequestParts, http::request::Parts};

/// Header carrying the authenticated caller id.
pub const USER_ID_HEADER: &str = "X-User-ID";

pub trait IdentityProvider: Send + Sync {
    /// Id of the authenticated caller, or [`AppError::Unauthorized`].
    fn current_identity(&self) -> Result<String, AppError>;
}

/// Extractor for the optional caller id from the `X-User-ID` header.
#[derive(Clone, Debug)]
pub struct CallerId(pub Option<String>);

#[async_trait]
impl<S> FromRequestParts<S> for CallerId
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let value = parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|v: &axum::http::HeaderValue| v.to_str().ok())
            .map(|s: &str| s.trim().to_string())
            .filter(|s: &String| !s.is_empty());
        Ok(CallerId(value))
    }
}

impl IdentityProvider for CallerId {
    fn current_identity(&self) -> Result<String, AppError> {
        self.0.clone().ok_or(AppError::Unauthorized)
    }
}

/// Fixed identity, for jobs and tests that act as a known user.
#[derive(Clone, Debug)]
pub struct StaticIdentity(pub String);

impl IdentityProvider for StaticIdentity {
    fn current_identity(&self) -> Result<String, AppError> {
        Ok(self.0.clone())
    }
}
