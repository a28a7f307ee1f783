use anyhow::Context;
use sqlx::PgPool;
use time::Date;
use uuid::Uuid;

use super::services::{apply_like, LikeEdges, LikeError, LikeOutcome};
use crate::auth::repo::rows_to_users;
use crate::auth::repo_types::{User, UserRow, USER_COLUMNS};

pub enum LikeResult {
    Applied {
        outcome: LikeOutcome,
        target_likes_count: i32,
    },
    ActorMissing,
    TargetMissing,
    Rejected(LikeError),
}

async fn write_edges(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    e: &LikeEdges,
) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        UPDATE users
           SET likes = $2, matches = $3, likes_count = $4, updated_at = now()
         WHERE id = $1
        "#,
    )
    .bind(e.id)
    .bind(&e.likes)
    .bind(&e.matches)
    .bind(e.likes_count)
    .execute(&mut **tx)
    .await
    .with_context(|| format!("write like edges for {}", e.id))?;
    Ok(())
}

/// Apply a like with both rows locked for the duration of one transaction.
///
/// Rows are locked in id order so opposing likes on the same pair queue up instead of deadlocking.
pub async fn like(db: &PgPool, actor_id: Uuid, target_id: Uuid) -> anyhow::Result<LikeResult> {
    if actor_id == target_id {
        return Ok(LikeResult::Rejected(LikeError::SelfLike));
    }

    let mut tx = db.begin().await.context("begin tx")?;

    let rows = sqlx::query_as::<_, LikeEdges>(
        r#"
        SELECT id, likes, matches, likes_count
          FROM users
         WHERE id = ANY($1)
         ORDER BY id
           FOR UPDATE
        "#,
    )
    .bind(&[actor_id, target_id][..])
    .fetch_all(&mut *tx)
    .await
    .context("lock like pair")?;

    let mut actor = None;
    let mut target = None;
    for row in rows {
        if row.id == actor_id {
            actor = Some(row);
        } else {
            target = Some(row);
        }
    }
    let Some(mut actor) = actor else {
        return Ok(LikeResult::ActorMissing);
    };
    let Some(mut target) = target else {
        return Ok(LikeResult::TargetMissing);
    };

    let outcome = match apply_like(&mut actor, &mut target) {
        Ok(o) => o,
        Err(e) => return Ok(LikeResult::Rejected(e)),
    };

    write_edges(&mut tx, &actor).await?;
    write_edges(&mut tx, &target).await?;
    tx.commit().await.context("commit tx")?;

    Ok(LikeResult::Applied {
        outcome,
        target_likes_count: target.likes_count,
    })
}

/// Candidates in creation order, filtered by birth-date window `(after, up_to]` and religion.
pub async fn potential_matches(
    db: &PgPool,
    excluded: &[Uuid],
    born_after: Date,
    born_up_to: Date,
    religion: Option<&str>,
) -> anyhow::Result<Vec<User>> {
    let sql = format!(
        r#"
        SELECT {USER_COLUMNS}
          FROM users
         WHERE NOT (id = ANY($1))
           AND date_of_birth > $2
           AND date_of_birth <= $3
           AND ($4::text IS NULL OR religion = $4)
         ORDER BY created_at ASC, id ASC
        "#
    );
    let rows = sqlx::query_as::<_, UserRow>(&sql)
        .bind(excluded)
        .bind(born_after)
        .bind(born_up_to)
        .bind(religion)
        .fetch_all(db)
        .await
        .context("query potential matches")?;
    rows_to_users(rows)
}
