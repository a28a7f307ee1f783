use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::repo_types::{Profile, User};
use crate::profile::services::ProfilePatch;

/// Request body for login.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Response returned after login or register.
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: PublicUser,
}

/// Public part of the user returned to the client.
#[derive(Debug, Serialize)]
pub struct PublicUser {
    pub id: Uuid,
    pub email: String,
    pub profile: Profile,
}

impl From<User> for PublicUser {
    fn from(u: User) -> Self {
        Self {
            id: u.id,
            email: u.email,
            profile: u.profile,
        }
    }
}

/// JSON body of `PUT /auth/profile`; `bio` is stored as `about`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfileRequest {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub location: Option<String>,
    pub bio: Option<String>,
}

fn non_empty(v: Option<String>) -> Option<String> {
    v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

impl From<UpdateProfileRequest> for ProfilePatch {
    fn from(r: UpdateProfileRequest) -> Self {
        ProfilePatch {
            first_name: non_empty(r.first_name),
            last_name: non_empty(r.last_name),
            location: non_empty(r.location),
            about: non_empty(r.bio),
            ..Default::default()
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ProfileUpdatedResponse {
    pub message: &'static str,
    pub user: PublicUser,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bio_maps_to_about_and_blanks_are_dropped() {
        let req: UpdateProfileRequest =
            serde_json::from_str(r#"{"firstName":"","bio":"likes hiking","location":" Goa "}"#)
                .unwrap();
        let patch = ProfilePatch::from(req);
        assert_eq!(patch.first_name, None);
        assert_eq!(patch.about.as_deref(), Some("likes hiking"));
        assert_eq!(patch.location.as_deref(), Some("Goa"));
        assert_eq!(patch.gender, None);
    }
}
