use axum::{
    extract::{Path, Query, State},
    routing::{get, patch},
    Json, Router,
};
use time::OffsetDateTime;
use tracing::{info, instrument};
use uuid::Uuid;

use super::{
    dto::{
        AdminUserDetail, AdminUserUpdate, DailyTrend, StatsResponse, StatusUpdate, StatusUpdated,
        UsersPage, UsersQuery,
    },
    repo,
    services::{
        apply_update, fold_status_counts, like_pattern, page_count, page_offset, paging,
        trailing_days, TREND_DAYS,
    },
};
use crate::{
    admin_auth::{extractors::CurrentAdmin, repo_types::permissions},
    auth::repo_types::{AccountStatus, User},
    error::{ApiError, ApiResult},
    profile::dto::MessageResponse,
    state::AppState,
};

pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/admin/stats", get(stats))
        .route("/admin/users", get(list_users))
        .route(
            "/admin/users/:id",
            get(get_user).put(update_user).delete(delete_user),
        )
        .route("/admin/users/:id/status", patch(update_status))
}

async fn load_user(state: &AppState, id: Uuid) -> ApiResult<User> {
    User::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))
}

async fn detail(state: &AppState, user: User) -> ApiResult<AdminUserDetail> {
    let matches = repo::match_summaries(&state.db, &user.matches).await?;
    Ok(AdminUserDetail::new(user, matches))
}

#[instrument(skip_all)]
pub async fn stats(
    State(state): State<AppState>,
    admin: CurrentAdmin,
) -> ApiResult<Json<StatsResponse>> {
    admin.require(permissions::VIEW_STATISTICS)?;

    let (total_users, groups) = tokio::try_join!(
        repo::count_users(&state.db),
        repo::count_by_status(&state.db),
    )?;

    let windows = trailing_days(OffsetDateTime::now_utc(), state.config.report_offset(), TREND_DAYS);
    let mut daily_trends = Vec::with_capacity(windows.len());
    for w in windows {
        let count = repo::count_created_between(&state.db, w.start, w.end).await?;
        daily_trends.push(DailyTrend { date: w.date, count });
    }

    Ok(Json(StatsResponse {
        total_users,
        users_by_status: fold_status_counts(groups),
        daily_trends,
    }))
}

#[instrument(skip_all)]
pub async fn list_users(
    State(state): State<AppState>,
    admin: CurrentAdmin,
    Query(q): Query<UsersQuery>,
) -> ApiResult<Json<UsersPage>> {
    admin.require(permissions::MANAGE_USERS)?;

    let (page, limit) = paging(q.page.as_deref(), q.limit.as_deref());
    let pattern = q
        .search
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(like_pattern);

    let offset = page_offset(page, limit);
    let (users, total_users) = repo::list_users(&state.db, pattern.as_deref(), limit, offset).await?;

    Ok(Json(UsersPage {
        users,
        total_pages: page_count(total_users, limit),
        current_page: page,
        total_users,
    }))
}

#[instrument(skip(state, admin))]
pub async fn get_user(
    State(state): State<AppState>,
    admin: CurrentAdmin,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<AdminUserDetail>> {
    admin.require(permissions::MANAGE_USERS)?;
    let user = load_user(&state, id).await?;
    Ok(Json(detail(&state, user).await?))
}

#[instrument(skip(state, admin, payload))]
pub async fn update_user(
    State(state): State<AppState>,
    admin: CurrentAdmin,
    Path(id): Path<Uuid>,
    Json(payload): Json<AdminUserUpdate>,
) -> ApiResult<Json<AdminUserDetail>> {
    admin.require(permissions::MANAGE_USERS)?;

    let mut user = load_user(&state, id).await?;
    apply_update(&mut user, payload)?;

    let user = User::save_account(&state.db, &user)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    info!(admin_id = %admin.0.id, user_id = %user.id, "user updated by admin");
    Ok(Json(detail(&state, user).await?))
}

#[instrument(skip(state, admin, payload))]
pub async fn update_status(
    State(state): State<AppState>,
    admin: CurrentAdmin,
    Path(id): Path<Uuid>,
    Json(payload): Json<StatusUpdate>,
) -> ApiResult<Json<StatusUpdated>> {
    admin.require(permissions::MANAGE_USERS)?;

    let status: AccountStatus = payload
        .status
        .trim()
        .parse()
        .map_err(|_| ApiError::validation("Status must be active, inactive or suspended"))?;

    if !User::set_status(&state.db, id, status).await? {
        return Err(ApiError::not_found("User not found"));
    }

    info!(admin_id = %admin.0.id, user_id = %id, status = status.as_str(), "user status changed");
    Ok(Json(StatusUpdated {
        message: "User status updated successfully",
        status,
    }))
}

#[instrument(skip(state, admin))]
pub async fn delete_user(
    State(state): State<AppState>,
    admin: CurrentAdmin,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<MessageResponse>> {
    admin.require(permissions::MANAGE_USERS)?;

    if !repo::delete_user_cascade(&state.db, id).await? {
        return Err(ApiError::not_found("User not found"));
    }

    info!(admin_id = %admin.0.id, user_id = %id, "user deleted");
    Ok(Json(MessageResponse {
        message: "User deleted successfully",
    }))
}
