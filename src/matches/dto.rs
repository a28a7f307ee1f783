use serde::{Deserialize, Serialize};
use time::Date;
use uuid::Uuid;

use super::services::age_on;
use crate::auth::repo_types::{Profile, User};

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PotentialQuery {
    pub min_age: Option<String>,
    pub max_age: Option<String>,
    pub religion: Option<String>,
}

/// Profile with the age derived at read time.
#[derive(Debug, Serialize)]
pub struct ProfileWithAge {
    #[serde(flatten)]
    pub profile: Profile,
    pub age: i32,
}

impl ProfileWithAge {
    pub fn new(profile: Profile, today: Date) -> Self {
        let age = age_on(profile.date_of_birth, today);
        Self { profile, age }
    }
}

#[derive(Debug, Serialize)]
pub struct Candidate {
    pub id: Uuid,
    pub profile: ProfileWithAge,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LikedProfile {
    pub id: Uuid,
    pub profile: ProfileWithAge,
    pub likes_count: i32,
}

impl LikedProfile {
    pub fn new(user: User, today: Date) -> Self {
        Self {
            id: user.id,
            profile: ProfileWithAge::new(user.profile, today),
            likes_count: user.likes_count,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PotentialMatchesResponse {
    pub matches: Vec<Candidate>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LikedProfilesResponse {
    pub liked_profiles: Vec<LikedProfile>,
    pub total_likes: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MutualMatchesResponse {
    pub matches: Vec<LikedProfile>,
    pub total_matches: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LikeResponse {
    pub message: &'static str,
    pub is_match: bool,
    pub likes_count: i32,
}
