use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::{Date, OffsetDateTime};
use uuid::Uuid;

time::serde::format_description!(iso_date, Date, "[year]-[month]-[day]");

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
    Other,
}

impl Gender {
    pub fn as_str(&self) -> &'static str {
        match self {
            Gender::Male => "male",
            Gender::Female => "female",
            Gender::Other => "other",
        }
    }
}

impl FromStr for Gender {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "male" => Ok(Gender::Male),
            "female" => Ok(Gender::Female),
            "other" => Ok(Gender::Other),
            other => anyhow::bail!("unknown gender {other:?}"),
        }
    }
}

/// Account status shared by users and administrators.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountStatus {
    #[default]
    Active,
    Inactive,
    Suspended,
}

impl AccountStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountStatus::Active => "active",
            AccountStatus::Inactive => "inactive",
            AccountStatus::Suspended => "suspended",
        }
    }
}

impl FromStr for AccountStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(AccountStatus::Active),
            "inactive" => Ok(AccountStatus::Inactive),
            "suspended" => Ok(AccountStatus::Suspended),
            other => anyhow::bail!("unknown account status {other:?}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub first_name: String,
    pub last_name: String,
    #[serde(with = "iso_date")]
    pub date_of_birth: Date,
    pub gender: Gender,
    pub religion: Option<String>,
    pub occupation: Option<String>,
    pub location: Option<String>,
    pub about: Option<String>,
    pub profile_picture: Option<String>,
    pub additional_pictures: Vec<String>,
    pub photos: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgeRange {
    pub min: i32,
    pub max: i32,
}

impl Default for AgeRange {
    fn default() -> Self {
        Self { min: 18, max: 65 }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Preferences {
    pub age_range: AgeRange,
    pub religion: Option<String>,
    pub location: Option<String>,
}

/// User document as exposed to clients and handled by the services.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String, // Argon2 PHC string, never exposed
    pub profile: Profile,
    pub status: AccountStatus,
    pub likes: Vec<Uuid>,
    pub matches: Vec<Uuid>,
    pub likes_count: i32,
    pub preferences: Preferences,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub last_active: OffsetDateTime,
}

/// Flat `users` row.
#[derive(Debug, FromRow)]
pub struct UserRow {
    pub id: Uuid,
    pub email: String,
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub date_of_birth: Date,
    pub gender: String,
    pub religion: Option<String>,
    pub occupation: Option<String>,
    pub location: Option<String>,
    pub about: Option<String>,
    pub profile_picture: Option<String>,
    pub additional_pictures: Vec<String>,
    pub photos: Vec<String>,
    pub status: Option<String>,
    pub likes: Vec<Uuid>,
    pub matches: Vec<Uuid>,
    pub likes_count: i32,
    pub pref_age_min: i32,
    pub pref_age_max: i32,
    pub pref_religion: Option<String>,
    pub pref_location: Option<String>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
    pub last_active: OffsetDateTime,
}

pub const USER_COLUMNS: &str = "id, email, password_hash, first_name, last_name, date_of_birth, \
     gender, religion, occupation, location, about, profile_picture, additional_pictures, photos, \
     status, likes, matches, likes_count, pref_age_min, pref_age_max, pref_religion, \
     pref_location, created_at, updated_at, last_active";

impl TryFrom<UserRow> for User {
    type Error = anyhow::Error;

    fn try_from(r: UserRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: r.id,
            email: r.email,
            password_hash: r.password_hash,
            profile: Profile {
                first_name: r.first_name,
                last_name: r.last_name,
                date_of_birth: r.date_of_birth,
                gender: r.gender.parse()?,
                religion: r.religion,
                occupation: r.occupation,
                location: r.location,
                about: r.about,
                profile_picture: r.profile_picture,
                additional_pictures: r.additional_pictures,
                photos: r.photos,
            },
            status: match r.status {
                Some(s) => s.parse()?,
                None => AccountStatus::Active,
            },
            likes: r.likes,
            matches: r.matches,
            likes_count: r.likes_count,
            preferences: Preferences {
                age_range: AgeRange {
                    min: r.pref_age_min,
                    max: r.pref_age_max,
                },
                religion: r.pref_religion,
                location: r.pref_location,
            },
            created_at: r.created_at,
            updated_at: r.updated_at,
            last_active: r.last_active,
        })
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;
    use time::macros::{date, datetime};

    pub fn user(first_name: &str) -> User {
        User {
            id: Uuid::new_v4(),
            email: format!("{}@example.com", first_name.to_lowercase()),
            password_hash: "$argon2id$fake".into(),
            profile: Profile {
                first_name: first_name.into(),
                last_name: "Tester".into(),
                date_of_birth: date!(1995 - 06 - 15),
                gender: Gender::Other,
                religion: None,
                occupation: None,
                location: None,
                about: None,
                profile_picture: None,
                additional_pictures: Vec::new(),
                photos: Vec::new(),
            },
            status: AccountStatus::Active,
            likes: Vec::new(),
            matches: Vec::new(),
            likes_count: 0,
            preferences: Preferences::default(),
            created_at: datetime!(2024-01-01 0:00 UTC),
            updated_at: datetime!(2024-01-01 0:00 UTC),
            last_active: datetime!(2024-01-01 0:00 UTC),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_json_hides_password_and_uses_camel_case() {
        let u = fixtures::user("Asha");
        let json = serde_json::to_value(&u).unwrap();
        assert!(json.get("passwordHash").is_none());
        assert!(json.get("password_hash").is_none());
        assert_eq!(json["profile"]["firstName"], "Asha");
        assert_eq!(json["profile"]["dateOfBirth"], "1995-06-15");
        assert_eq!(json["status"], "active");
        assert_eq!(json["likesCount"], 0);
        assert_eq!(json["preferences"]["ageRange"]["min"], 18);
    }

    #[test]
    fn parses_enums_case_insensitively_where_user_facing() {
        assert_eq!("Female".parse::<Gender>().unwrap(), Gender::Female);
        assert!("robot".parse::<Gender>().is_err());
        assert_eq!("suspended".parse::<AccountStatus>().unwrap(), AccountStatus::Suspended);
        assert!("deleted".parse::<AccountStatus>().is_err());
    }
}
