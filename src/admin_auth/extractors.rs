use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use tracing::warn;

use super::repo_types::Admin;
use crate::auth::extractors::verified_claims;
use crate::auth::repo_types::AccountStatus;
use crate::auth::SubjectKind;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// The authenticated, active administrator making the request.
pub struct CurrentAdmin(pub Admin);

impl CurrentAdmin {
    /// Gate an action on a named permission.
    pub fn require(&self, permission: &str) -> ApiResult<()> {
        if self.0.has_permission(permission) {
            Ok(())
        } else {
            warn!(admin_id = %self.0.id, permission, "permission denied");
            Err(ApiError::forbidden(
                "You do not have permission to perform this action",
            ))
        }
    }
}

#[async_trait]
impl FromRequestParts<AppState> for CurrentAdmin {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let claims = verified_claims(parts, state, SubjectKind::Admin)?;

        let admin = Admin::find_by_id(&state.db, claims.sub)
            .await?
            .ok_or_else(|| ApiError::not_found("Admin not found"))?;

        if admin.status != AccountStatus::Active {
            warn!(admin_id = %admin.id, status = admin.status.as_str(), "inactive admin rejected");
            return Err(ApiError::forbidden("Account is not active"));
        }

        Ok(CurrentAdmin(admin))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::admin_auth::repo_types::{fixtures, permissions};

    #[test]
    fn require_checks_the_permission_set() {
        let admin = CurrentAdmin(fixtures::admin(&[permissions::VIEW_STATISTICS]));
        assert!(admin.require(permissions::VIEW_STATISTICS).is_ok());
        let err = admin.require(permissions::MANAGE_USERS).unwrap_err();
        assert!(matches!(err, ApiError::Forbidden(_)));
    }
}
