use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use time::{Date, OffsetDateTime};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::{
    dto::{
        Candidate, LikeResponse, LikedProfile, LikedProfilesResponse, MutualMatchesResponse,
        PotentialMatchesResponse, PotentialQuery, ProfileWithAge,
    },
    repo::{self, LikeResult},
    services::{excluded_ids, AgeFilter, LikeOutcome},
};
use crate::{
    auth::{extractors::CurrentUser, repo_types::User},
    error::{ApiError, ApiResult},
    state::AppState,
};

pub fn match_routes() -> Router<AppState> {
    Router::new()
        .route("/matches/potential", get(potential_matches))
        .route("/matches/like/:user_id", post(like_profile))
        .route("/matches/liked", get(liked_profiles))
        .route("/matches/mutual", get(mutual_matches))
}

fn today(state: &AppState) -> Date {
    OffsetDateTime::now_utc()
        .to_offset(state.config.report_offset())
        .date()
}

#[instrument(skip_all)]
pub async fn potential_matches(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Query(q): Query<PotentialQuery>,
) -> ApiResult<Json<PotentialMatchesResponse>> {
    let filter = AgeFilter::parse(q.min_age.as_deref(), q.max_age.as_deref())?;
    let religion = q.religion.as_deref().map(str::trim).filter(|r| !r.is_empty());

    let today = today(&state);
    let (born_after, born_up_to) = filter.birth_date_window(today);
    let users = repo::potential_matches(
        &state.db,
        &excluded_ids(&actor),
        born_after,
        born_up_to,
        religion,
    )
    .await?;

    let matches = users
        .into_iter()
        .map(|u| Candidate {
            id: u.id,
            profile: ProfileWithAge::new(u.profile, today),
        })
        .collect();
    Ok(Json(PotentialMatchesResponse { matches }))
}

#[instrument(skip_all)]
pub async fn like_profile(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Path(user_id): Path<Uuid>,
) -> ApiResult<Json<LikeResponse>> {
    match repo::like(&state.db, actor.id, user_id).await? {
        LikeResult::Applied {
            outcome,
            target_likes_count,
        } => {
            let is_match = outcome == LikeOutcome::Matched;
            info!(actor_id = %actor.id, target_id = %user_id, is_match, "profile liked");
            Ok(Json(LikeResponse {
                message: if is_match { "Match created!" } else { "Profile liked" },
                is_match,
                likes_count: target_likes_count,
            }))
        }
        LikeResult::Rejected(e) => {
            warn!(target_id = %user_id, reason = %e, "like rejected");
            Err(e.into())
        }
        LikeResult::ActorMissing | LikeResult::TargetMissing => {
            Err(ApiError::not_found("User not found"))
        }
    }
}

#[instrument(skip_all)]
pub async fn liked_profiles(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
) -> ApiResult<Json<LikedProfilesResponse>> {
    let today = today(&state);
    let liked_profiles: Vec<LikedProfile> = User::find_many(&state.db, &actor.likes)
        .await?
        .into_iter()
        .map(|u| LikedProfile::new(u, today))
        .collect();
    Ok(Json(LikedProfilesResponse {
        total_likes: liked_profiles.len(),
        liked_profiles,
    }))
}

#[instrument(skip_all)]
pub async fn mutual_matches(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
) -> ApiResult<Json<MutualMatchesResponse>> {
    let today = today(&state);
    let matches: Vec<LikedProfile> = User::find_many(&state.db, &actor.matches)
        .await?
        .into_iter()
        .map(|u| LikedProfile::new(u, today))
        .collect();
    Ok(Json(MutualMatchesResponse {
        total_matches: matches.len(),
        matches,
    }))
}
