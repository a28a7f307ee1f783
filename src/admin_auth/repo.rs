use anyhow::Context;
use sqlx::PgPool;
use uuid::Uuid;

use super::repo_types::{Admin, AdminRow, ADMIN_COLUMNS};

pub struct NewAdmin<'a> {
    pub email: &'a str,
    pub password_hash: &'a str,
    pub first_name: &'a str,
    pub last_name: &'a str,
    pub role: &'a str,
    pub permissions: &'a [String],
}

impl Admin {
    pub async fn find_by_email(db: &PgPool, email: &str) -> anyhow::Result<Option<Admin>> {
        let sql = format!("SELECT {ADMIN_COLUMNS} FROM admins WHERE lower(email) = lower($1)");
        let row = sqlx::query_as::<_, AdminRow>(&sql)
            .bind(email)
            .fetch_optional(db)
            .await
            .context("find admin by email")?;
        row.map(Admin::try_from).transpose()
    }

    pub async fn find_by_id(db: &PgPool, id: Uuid) -> anyhow::Result<Option<Admin>> {
        let sql = format!("SELECT {ADMIN_COLUMNS} FROM admins WHERE id = $1");
        let row = sqlx::query_as::<_, AdminRow>(&sql)
            .bind(id)
            .fetch_optional(db)
            .await
            .context("find admin by id")?;
        row.map(Admin::try_from).transpose()
    }

    pub async fn create(db: &PgPool, new: NewAdmin<'_>) -> anyhow::Result<Admin> {
        let sql = format!(
            r#"
            INSERT INTO admins (id, email, password_hash, first_name, last_name, role, permissions)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {ADMIN_COLUMNS}
            "#
        );
        let row = sqlx::query_as::<_, AdminRow>(&sql)
            .bind(Uuid::new_v4())
            .bind(new.email)
            .bind(new.password_hash)
            .bind(new.first_name)
            .bind(new.last_name)
            .bind(new.role)
            .bind(new.permissions)
            .fetch_one(db)
            .await
            .context("insert admin")?;
        Admin::try_from(row)
    }

    /// Stamp `last_login` and return the refreshed record.
    pub async fn record_login(db: &PgPool, id: Uuid) -> anyhow::Result<Admin> {
        let sql = format!(
            "UPDATE admins SET last_login = now() WHERE id = $1 RETURNING {ADMIN_COLUMNS}"
        );
        let row = sqlx::query_as::<_, AdminRow>(&sql)
            .bind(id)
            .fetch_one(db)
            .await
            .context("record admin login")?;
        Admin::try_from(row)
    }
}
