use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::{Date, OffsetDateTime};
use uuid::Uuid;

use crate::auth::repo_types::{AccountStatus, Preferences, Profile, User};

time::serde::format_description!(day, Date, "[year]-[month]-[day]");

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct UsersByStatus {
    pub active: i64,
    pub inactive: i64,
    pub suspended: i64,
}

#[derive(Debug, Serialize)]
pub struct DailyTrend {
    #[serde(with = "day")]
    pub date: Date,
    pub count: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsResponse {
    pub total_users: i64,
    pub users_by_status: UsersByStatus,
    pub daily_trends: Vec<DailyTrend>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UsersQuery {
    pub page: Option<String>,
    pub limit: Option<String>,
    pub search: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UsersPage {
    pub users: Vec<User>,
    pub total_pages: i64,
    pub current_page: i64,
    pub total_users: i64,
}

/// A matched user as shown on the admin detail page.
#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct MatchSummary {
    pub id: Uuid,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminUserDetail {
    pub id: Uuid,
    pub email: String,
    pub profile: Profile,
    pub status: AccountStatus,
    pub likes: Vec<Uuid>,
    pub matches: Vec<MatchSummary>,
    pub likes_count: i32,
    pub preferences: Preferences,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub last_active: OffsetDateTime,
}

impl AdminUserDetail {
    pub fn new(user: User, matches: Vec<MatchSummary>) -> Self {
        Self {
            id: user.id,
            email: user.email,
            profile: user.profile,
            status: user.status,
            likes: user.likes,
            matches,
            likes_count: user.likes_count,
            preferences: user.preferences,
            created_at: user.created_at,
            updated_at: user.updated_at,
            last_active: user.last_active,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct AgeRangePatch {
    pub min: Option<i32>,
    pub max: Option<i32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreferencesPatch {
    pub age_range: Option<AgeRangePatch>,
    pub religion: Option<String>,
    pub location: Option<String>,
}

/// Body of `PUT /admin/users/:id`; every part is optional.
#[derive(Debug, Default, Deserialize)]
pub struct AdminUserUpdate {
    pub email: Option<String>,
    pub status: Option<String>,
    pub profile: Option<HashMap<String, serde_json::Value>>,
    pub preferences: Option<PreferencesPatch>,
}

#[derive(Debug, Deserialize)]
pub struct StatusUpdate {
    pub status: String,
}

#[derive(Debug, Serialize)]
pub struct StatusUpdated {
    pub message: &'static str,
    pub status: AccountStatus,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::repo_types::fixtures;
    use time::macros::date;

    #[test]
    fn detail_replaces_match_ids_with_summaries() {
        let user = fixtures::user("Ann");
        let peer = MatchSummary {
            id: Uuid::new_v4(),
            email: "bo@example.com".into(),
            first_name: "Bo".into(),
            last_name: "Lee".into(),
        };
        let json = serde_json::to_value(AdminUserDetail::new(user, vec![peer.clone()])).unwrap();
        assert_eq!(json["matches"][0]["firstName"], "Bo");
        assert_eq!(json["matches"][0]["id"], peer.id.to_string());
        assert!(json.get("passwordHash").is_none());
        assert_eq!(json["profile"]["dateOfBirth"], "1995-06-15");
    }

    #[test]
    fn daily_trend_dates_are_plain_days() {
        let json = serde_json::to_value(DailyTrend {
            date: date!(2026 - 01 - 05),
            count: 3,
        })
        .unwrap();
        assert_eq!(json, serde_json::json!({"date": "2026-01-05", "count": 3}));
    }
}
