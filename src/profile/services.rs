use std::collections::HashMap;

use time::Date;

use crate::auth::repo_types::{Gender, Profile};
use crate::auth::services::parse_birth_date;
use crate::error::{ApiError, ApiResult};

/// Partial profile update. `None` keeps the stored value.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ProfilePatch {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub date_of_birth: Option<Date>,
    pub gender: Option<Gender>,
    pub religion: Option<String>,
    pub occupation: Option<String>,
    pub location: Option<String>,
    pub about: Option<String>,
}

fn non_empty(v: Option<&str>) -> Option<String> {
    v.map(str::trim).filter(|s| !s.is_empty()).map(str::to_string)
}

impl ProfilePatch {
    /// Build from loosely-typed text fields (multipart or JSON). Empty values are ignored.
    pub fn from_fields(fields: &HashMap<String, String>) -> ApiResult<Self> {
        let get = |k: &str| non_empty(fields.get(k).map(String::as_str));
        let date_of_birth = match get("dateOfBirth") {
            Some(raw) => Some(
                parse_birth_date(&raw)
                    .ok_or_else(|| ApiError::validation("Invalid date of birth"))?,
            ),
            None => None,
        };
        let gender = match get("gender") {
            Some(raw) => Some(
                raw.parse::<Gender>()
                    .map_err(|_| ApiError::validation("Gender must be male, female or other"))?,
            ),
            None => None,
        };
        Ok(Self {
            first_name: get("firstName"),
            last_name: get("lastName"),
            date_of_birth,
            gender,
            religion: get("religion"),
            occupation: get("occupation"),
            location: get("location"),
            about: get("about"),
        })
    }

    /// Shallow merge into `profile`.
    pub fn apply(self, profile: &mut Profile) {
        if let Some(v) = self.first_name {
            profile.first_name = v;
        }
        if let Some(v) = self.last_name {
            profile.last_name = v;
        }
        if let Some(v) = self.date_of_birth {
            profile.date_of_birth = v;
        }
        if let Some(v) = self.gender {
            profile.gender = v;
        }
        if self.religion.is_some() {
            profile.religion = self.religion;
        }
        if self.occupation.is_some() {
            profile.occupation = self.occupation;
        }
        if self.location.is_some() {
            profile.location = self.location;
        }
        if self.about.is_some() {
            profile.about = self.about;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::repo_types::fixtures;
    use time::macros::date;

    fn fields(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn absent_fields_keep_prior_values() {
        let mut p = fixtures::user("Ravi").profile;
        p.religion = Some("Hindu".into());
        let before = p.clone();

        let patch = ProfilePatch::from_fields(&fields(&[("location", "Pune"), ("about", "  ")])).unwrap();
        patch.apply(&mut p);

        assert_eq!(p.location.as_deref(), Some("Pune"));
        assert_eq!(p.about, before.about);
        assert_eq!(p.religion, before.religion);
        assert_eq!(p.first_name, before.first_name);
        assert_eq!(p.date_of_birth, before.date_of_birth);
    }

    #[test]
    fn parses_typed_fields() {
        let patch = ProfilePatch::from_fields(&fields(&[
            ("dateOfBirth", "2000-01-31"),
            ("gender", "Male"),
            ("firstName", " Ravi "),
        ]))
        .unwrap();
        assert_eq!(patch.date_of_birth, Some(date!(2000 - 01 - 31)));
        assert_eq!(patch.gender, Some(Gender::Male));
        assert_eq!(patch.first_name.as_deref(), Some("Ravi"));
        assert_eq!(
            ProfilePatch::from_fields(&HashMap::new()).unwrap(),
            ProfilePatch::default()
        );
    }

    #[test]
    fn rejects_bad_date_and_gender() {
        assert!(matches!(
            ProfilePatch::from_fields(&fields(&[("dateOfBirth", "yesterday")])),
            Err(ApiError::Validation(_))
        ));
        assert!(matches!(
            ProfilePatch::from_fields(&fields(&[("gender", "unknown")])),
            Err(ApiError::Validation(_))
        ));
    }
}
