use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use tracing::warn;

use super::claims::{Claims, SubjectKind};
use super::repo_types::{AccountStatus, User};
use super::services::JwtKeys;
use crate::error::ApiError;
use crate::state::AppState;

/// Pull the bearer token out of the Authorization header.
pub(crate) fn bearer_token(parts: &Parts) -> Result<&str, ApiError> {
    let auth = parts
        .headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| ApiError::unauthenticated("No token provided"))?;

    auth.strip_prefix("Bearer ")
        .or_else(|| auth.strip_prefix("bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| ApiError::unauthenticated("No token provided"))
}

/// Verify the bearer token for the given subject kind.
pub(crate) fn verified_claims(
    parts: &Parts,
    state: &AppState,
    kind: SubjectKind,
) -> Result<Claims, ApiError> {
    let token = bearer_token(parts)?;
    let keys = JwtKeys::from_ref(state);
    keys.verify(token, kind).map_err(|e| {
        warn!(error = %e, "invalid or expired token");
        ApiError::unauthenticated("Invalid token")
    })
}

/// The authenticated, active end user making the request.
pub struct CurrentUser(pub User);

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let claims = verified_claims(parts, state, SubjectKind::User)?;

        let user = User::find_by_id(&state.db, claims.sub)
            .await?
            .ok_or_else(|| ApiError::not_found("User not found"))?;

        if user.status != AccountStatus::Active {
            warn!(user_id = %user.id, status = user.status.as_str(), "inactive user rejected");
            return Err(ApiError::forbidden("Account is not active"));
        }

        Ok(CurrentUser(user))
    }
}
