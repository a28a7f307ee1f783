use serde::Serialize;
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::auth::repo_types::AccountStatus;

/// Capability names an administrator can hold.
pub mod permissions {
    pub const MANAGE_USERS: &str = "manage_users";
    pub const VIEW_STATISTICS: &str = "view_statistics";

    pub const DEFAULT: [&str; 2] = [MANAGE_USERS, VIEW_STATISTICS];
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Admin {
    pub id: Uuid,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub role: String,
    pub permissions: Vec<String>,
    pub status: AccountStatus,
    #[serde(with = "time::serde::rfc3339::option")]
    pub last_login: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl Admin {
    pub fn has_permission(&self, permission: &str) -> bool {
        self.permissions.iter().any(|p| p == permission)
    }
}

#[derive(Debug, FromRow)]
pub struct AdminRow {
    pub id: Uuid,
    pub email: String,
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub role: String,
    pub permissions: Vec<String>,
    pub status: String,
    pub last_login: Option<OffsetDateTime>,
    pub created_at: OffsetDateTime,
}

pub const ADMIN_COLUMNS: &str =
    "id, email, password_hash, first_name, last_name, role, permissions, status, last_login, created_at";

impl TryFrom<AdminRow> for Admin {
    type Error = anyhow::Error;

    fn try_from(r: AdminRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: r.id,
            email: r.email,
            password_hash: r.password_hash,
            first_name: r.first_name,
            last_name: r.last_name,
            role: r.role,
            permissions: r.permissions,
            status: r.status.parse()?,
            last_login: r.last_login,
            created_at: r.created_at,
        })
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn permission_lookup_is_exact() {
        let a = fixtures::admin(&[permissions::VIEW_STATISTICS]);
        assert!(a.has_permission("view_statistics"));
        assert!(!a.has_permission("manage_users"));
        assert!(!a.has_permission("view_stat"));
    }

    #[test]
    fn admin_json_hides_password() {
        let json = serde_json::to_value(fixtures::admin(&permissions::DEFAULT)).unwrap();
        assert!(json.get("passwordHash").is_none());
        assert_eq!(json["permissions"][0], "manage_users");
        assert!(json["lastLogin"].is_null());
    }
}
