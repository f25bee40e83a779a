use crate::domain::model::Session;
use crate::server::AppState;
use crate::utils::error::ListingError;
use axum::extract::FromRequestParts;
use axum::http::{header::AUTHORIZATION, request::Parts};

/// Mutating handlers take a `Session`. With no verifier configured every
/// request is anonymous; otherwise the bearer token must be accepted by the
/// identity provider.
impl FromRequestParts<AppState> for Session {
    type Rejection = ListingError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let Some(verifier) = state.verifier.as_ref() else {
            return Ok(Session::anonymous());
        };

        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .ok_or_else(|| ListingError::Unauthorized {
                reason: "missing bearer token".to_string(),
            })?;

        let session = verifier.verify(token).await?;
        tracing::debug!("Authenticated request for user {}", session.user_id);
        Ok(session)
    }
}
