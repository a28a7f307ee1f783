use anyhow::Context;
use sqlx::PgPool;
use time::OffsetDateTime;
use uuid::Uuid;

use super::dto::MatchSummary;
use crate::auth::repo::rows_to_users;
use crate::auth::repo_types::{User, UserRow, USER_COLUMNS};

pub async fn count_users(db: &PgPool) -> anyhow::Result<i64> {
    let (n,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users")
        .fetch_one(db)
        .await
        .context("count users")?;
    Ok(n)
}

/// Raw `(status, count)` groups; the status column may be NULL on legacy rows.
pub async fn count_by_status(db: &PgPool) -> anyhow::Result<Vec<(Option<String>, i64)>> {
    sqlx::query_as("SELECT status, COUNT(*) FROM users GROUP BY status")
        .fetch_all(db)
        .await
        .context("count users by status")
}

/// Users created in `[start, end]`.
pub async fn count_created_between(
    db: &PgPool,
    start: OffsetDateTime,
    end: OffsetDateTime,
) -> anyhow::Result<i64> {
    let (n,): (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM users WHERE created_at >= $1 AND created_at <= $2")
            .bind(start)
            .bind(end)
            .fetch_one(db)
            .await
            .context("count users created in window")?;
    Ok(n)
}

/// One page of users, newest first, plus the total matching `pattern`.
/// `pattern` is an already-escaped ILIKE pattern; `None` matches everyone.
pub async fn list_users(
    db: &PgPool,
    pattern: Option<&str>,
    limit: i64,
    offset: i64,
) -> anyhow::Result<(Vec<User>, i64)> {
    const FILTER: &str = r#"($1::text IS NULL
            OR email ILIKE $1 ESCAPE '\'
            OR first_name ILIKE $1 ESCAPE '\'
            OR last_name ILIKE $1 ESCAPE '\')"#;

    let sql = format!(
        "SELECT {USER_COLUMNS} FROM users WHERE {FILTER} \
         ORDER BY created_at DESC, id DESC LIMIT $2 OFFSET $3"
    );
    let rows = sqlx::query_as::<_, UserRow>(&sql)
        .bind(pattern)
        .bind(limit)
        .bind(offset)
        .fetch_all(db)
        .await
        .context("list users")?;

    let count_sql = format!("SELECT COUNT(*) FROM users WHERE {FILTER}");
    let (total,): (i64,) = sqlx::query_as(&count_sql)
        .bind(pattern)
        .fetch_one(db)
        .await
        .context("count listed users")?;

    Ok((rows_to_users(rows)?, total))
}

/// Id, email and name of each existing user in `ids`, in `ids` order.
pub async fn match_summaries(db: &PgPool, ids: &[Uuid]) -> anyhow::Result<Vec<MatchSummary>> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }
    sqlx::query_as::<_, MatchSummary>(
        r#"
        SELECT id, email, first_name, last_name
          FROM users
         WHERE id = ANY($1)
         ORDER BY array_position($1, id)
        "#,
    )
    .bind(ids)
    .fetch_all(db)
    .await
    .context("load match summaries")
}

/// Every row a delete of `$1` touches: the user, the users it liked, and the users
/// whose `likes` or `matches` point at it. Locked in id order, like `matches::repo::like`.
const LOCK_DELETE_NEIGHBOURHOOD: &str = r#"
    SELECT id
      FROM users
     WHERE id = $1
        OR id = ANY(SELECT unnest(likes) FROM users WHERE id = $1)
        OR $1 = ANY(likes)
        OR $1 = ANY(matches)
     ORDER BY id
       FOR UPDATE
"#;

/// Delete a user and every edge pointing at it. Returns false if the user did not exist.
pub async fn delete_user_cascade(db: &PgPool, id: Uuid) -> anyhow::Result<bool> {
    let mut tx = db.begin().await.context("begin delete tx")?;

    let locked: Vec<(Uuid,)> = sqlx::query_as(LOCK_DELETE_NEIGHBOURHOOD)
        .bind(id)
        .fetch_all(&mut *tx)
        .await
        .context("lock rows touched by delete")?;
    if !locked.iter().any(|(locked_id,)| *locked_id == id) {
        tx.rollback().await.context("rollback delete tx")?;
        return Ok(false);
    }

    // re-read under the lock; a like that committed while we waited is included
    let (liked,): (Vec<Uuid>,) = sqlx::query_as("SELECT likes FROM users WHERE id = $1")
        .bind(id)
        .fetch_one(&mut *tx)
        .await
        .context("read likes of deleted user")?;

    // the deleted user's pending likes no longer count toward anyone
    sqlx::query(
        "UPDATE users SET likes_count = GREATEST(likes_count - 1, 0), updated_at = now() \
         WHERE id = ANY($1)",
    )
    .bind(&liked)
    .execute(&mut *tx)
    .await
    .context("uncount likes of deleted user")?;

    sqlx::query(
        r#"
        UPDATE users
           SET likes = array_remove(likes, $1),
               matches = array_remove(matches, $1),
               updated_at = now()
         WHERE $1 = ANY(likes) OR $1 = ANY(matches)
        "#,
    )
    .bind(id)
    .execute(&mut *tx)
    .await
    .context("drop edges to deleted user")?;

    sqlx::query("DELETE FROM users WHERE id = $1")
        .bind(id)
        .execute(&mut *tx)
        .await
        .context("delete user")?;

    tx.commit().await.context("commit delete tx")?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delete_locks_its_whole_neighbourhood_in_id_order() {
        let sql = LOCK_DELETE_NEIGHBOURHOOD.split_whitespace().collect::<Vec<_>>().join(" ");
        assert!(sql.ends_with("ORDER BY id FOR UPDATE"), "{sql}");
        for clause in [
            "id = $1",
            "unnest(likes) FROM users WHERE id = $1",
            "$1 = ANY(likes)",
            "$1 = ANY(matches)",
        ] {
            assert!(sql.contains(clause), "missing {clause}: {sql}");
        }
    }
}
