//! Caller identity. Authentication happens upstream; the gatekeeper forwards the verified
//! identity in a header and handlers take it through the `CurrentUser` extractor.

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};

use crate::errors::AppError;
use crate::models::user::CurrentUser;

pub const IDENTITY_HEADER: &str = "x-authenticated-user";

#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let identity = parts
            .headers
            .get(IDENTITY_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| {
                tracing::warn!("No caller identity forwarded for {}", parts.uri.path());
                AppError::Unauthorized
            })?;

        Ok(CurrentUser {
            identity: identity.to_string(),
        })
    }
}
