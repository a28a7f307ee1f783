use crate::auth::repo_types::{AccountStatus, Preferences, Profile, User, UserRow, USER_COLUMNS};
use anyhow::Context;
use sqlx::PgPool;
use uuid::Uuid;

/// Fields written when an account is created.
pub struct NewUser<'a> {
    pub id: Uuid,
    pub email: &'a str,
    pub password_hash: &'a str,
    pub profile: &'a Profile,
}

/// Which picture columns a profile save replaces.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PictureWrites {
    pub profile_picture: bool,
    pub additional_pictures: bool,
}

/// Ordered reference lists on a profile that support removal by entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaList {
    AdditionalPictures,
    Photos,
}

impl MediaList {
    pub fn column(self) -> &'static str {
        match self {
            MediaList::AdditionalPictures => "additional_pictures",
            MediaList::Photos => "photos",
        }
    }
}

const SAVE_PROFILE_SET: &str = "first_name = $2, last_name = $3, date_of_birth = $4, gender = $5, \
     religion = $6, occupation = $7, location = $8, about = $9, \
     profile_picture = CASE WHEN $12 THEN $10 ELSE profile_picture END, \
     additional_pictures = CASE WHEN $13 THEN $11 ELSE additional_pictures END, \
     updated_at = now()";

pub(crate) fn rows_to_users(rows: Vec<UserRow>) -> anyhow::Result<Vec<User>> {
    rows.into_iter().map(User::try_from).collect()
}

impl User {
    /// Find a user by email, ignoring case.
    pub async fn find_by_email(db: &PgPool, email: &str) -> anyhow::Result<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE lower(email) = lower($1)");
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(email)
            .fetch_optional(db)
            .await
            .context("find user by email")?;
        row.map(User::try_from).transpose()
    }

    pub async fn find_by_id(db: &PgPool, id: Uuid) -> anyhow::Result<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(id)
            .fetch_optional(db)
            .await
            .context("find user by id")?;
        row.map(User::try_from).transpose()
    }

    /// Resolve ids in one round trip. Missing ids are skipped; order follows `ids`.
    pub async fn find_many(db: &PgPool, ids: &[Uuid]) -> anyhow::Result<Vec<User>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let sql = format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = ANY($1) \
             ORDER BY array_position($1, id)"
        );
        let rows = sqlx::query_as::<_, UserRow>(&sql)
            .bind(ids)
            .fetch_all(db)
            .await
            .context("find users by ids")?;
        rows_to_users(rows)
    }

    /// Create a new user with hashed password.
    pub async fn create(db: &PgPool, new: NewUser<'_>) -> anyhow::Result<User> {
        let p = new.profile;
        let sql = format!(
            r#"
            INSERT INTO users (id, email, password_hash, first_name, last_name, date_of_birth,
                               gender, religion, occupation, location, about, profile_picture,
                               additional_pictures, photos)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            RETURNING {USER_COLUMNS}
            "#
        );
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(new.id)
            .bind(new.email)
            .bind(new.password_hash)
            .bind(&p.first_name)
            .bind(&p.last_name)
            .bind(p.date_of_birth)
            .bind(p.gender.as_str())
            .bind(&p.religion)
            .bind(&p.occupation)
            .bind(&p.location)
            .bind(&p.about)
            .bind(&p.profile_picture)
            .bind(&p.additional_pictures)
            .bind(&p.photos)
            .fetch_one(db)
            .await
            .context("insert user")?;
        User::try_from(row)
    }

    pub async fn touch_last_active(db: &PgPool, id: Uuid) -> anyhow::Result<()> {
        sqlx::query("UPDATE users SET last_active = now() WHERE id = $1")
            .bind(id)
            .execute(db)
            .await
            .context("touch last_active")?;
        Ok(())
    }

    /// Overwrite the scalar profile columns and stamp `updated_at`. Picture columns are
    /// written only when `writes` says so; `photos` is never touched here.
    pub async fn save_profile(
        db: &PgPool,
        id: Uuid,
        p: &Profile,
        writes: PictureWrites,
    ) -> anyhow::Result<Option<User>> {
        let sql = format!("UPDATE users SET {SAVE_PROFILE_SET} WHERE id = $1 RETURNING {USER_COLUMNS}");
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(id)
            .bind(&p.first_name)
            .bind(&p.last_name)
            .bind(p.date_of_birth)
            .bind(p.gender.as_str())
            .bind(&p.religion)
            .bind(&p.occupation)
            .bind(&p.location)
            .bind(&p.about)
            .bind(&p.profile_picture)
            .bind(&p.additional_pictures)
            .bind(writes.profile_picture)
            .bind(writes.additional_pictures)
            .fetch_optional(db)
            .await
            .context("save profile")?;
        row.map(User::try_from).transpose()
    }

    /// Drop `reference` from one media list without rewriting the rest of the row.
    pub async fn remove_media(
        db: &PgPool,
        id: Uuid,
        list: MediaList,
        reference: &str,
    ) -> anyhow::Result<Option<User>> {
        let column = list.column();
        let sql = format!(
            "UPDATE users SET {column} = array_remove({column}, $2), updated_at = now() \
             WHERE id = $1 RETURNING {USER_COLUMNS}"
        );
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(id)
            .bind(reference)
            .fetch_optional(db)
            .await
            .with_context(|| format!("remove from {column}"))?;
        row.map(User::try_from).transpose()
    }

    /// Clear the profile picture if it still is `reference`.
    pub async fn clear_profile_picture(
        db: &PgPool,
        id: Uuid,
        reference: &str,
    ) -> anyhow::Result<Option<User>> {
        let sql = format!(
            r#"
            UPDATE users
               SET profile_picture = CASE WHEN profile_picture = $2 THEN NULL
                                          ELSE profile_picture END,
                   updated_at = now()
             WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        );
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(id)
            .bind(reference)
            .fetch_optional(db)
            .await
            .context("clear profile picture")?;
        row.map(User::try_from).transpose()
    }

    /// Append references to the photo list in a single statement.
    pub async fn append_photos(db: &PgPool, id: Uuid, urls: &[String]) -> anyhow::Result<Option<User>> {
        let sql = format!(
            "UPDATE users SET photos = photos || $2, updated_at = now() \
             WHERE id = $1 RETURNING {USER_COLUMNS}"
        );
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(id)
            .bind(urls)
            .fetch_optional(db)
            .await
            .context("append photos")?;
        row.map(User::try_from).transpose()
    }

    /// Admin edit: email, status, profile and preferences in one write.
    pub async fn save_account(db: &PgPool, user: &User) -> anyhow::Result<Option<User>> {
        let p = &user.profile;
        let Preferences {
            age_range,
            religion: pref_religion,
            location: pref_location,
        } = &user.preferences;
        let sql = format!(
            r#"
            UPDATE users
               SET email = $2, status = $3,
                   first_name = $4, last_name = $5, date_of_birth = $6, gender = $7,
                   religion = $8, occupation = $9, location = $10, about = $11,
                   pref_age_min = $12, pref_age_max = $13, pref_religion = $14,
                   pref_location = $15, updated_at = now()
             WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        );
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(user.id)
            .bind(&user.email)
            .bind(user.status.as_str())
            .bind(&p.first_name)
            .bind(&p.last_name)
            .bind(p.date_of_birth)
            .bind(p.gender.as_str())
            .bind(&p.religion)
            .bind(&p.occupation)
            .bind(&p.location)
            .bind(&p.about)
            .bind(age_range.min)
            .bind(age_range.max)
            .bind(pref_religion)
            .bind(pref_location)
            .fetch_optional(db)
            .await
            .context("save account")?;
        row.map(User::try_from).transpose()
    }

    pub async fn set_status(db: &PgPool, id: Uuid, status: AccountStatus) -> anyhow::Result<bool> {
        let res = sqlx::query("UPDATE users SET status = $2, updated_at = now() WHERE id = $1")
            .bind(id)
            .bind(status.as_str())
            .execute(db)
            .await
            .context("set user status")?;
        Ok(res.rows_affected() == 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profile_save_leaves_photos_to_targeted_statements() {
        assert!(!SAVE_PROFILE_SET.contains("photos"));
        assert!(SAVE_PROFILE_SET.contains("CASE WHEN $12 THEN $10 ELSE profile_picture END"));
        assert!(SAVE_PROFILE_SET.contains("CASE WHEN $13 THEN $11 ELSE additional_pictures END"));
    }

    #[test]
    fn media_lists_map_to_their_columns() {
        assert_eq!(MediaList::AdditionalPictures.column(), "additional_pictures");
        assert_eq!(MediaList::Photos.column(), "photos");
        assert_eq!(PictureWrites::default(), PictureWrites {
            profile_picture: false,
            additional_pictures: false,
        });
    }
}
