use serde::Serialize;
use sqlx::FromRow;
use thiserror::Error;
use time::{Date, Month};
use uuid::Uuid;

use crate::auth::repo_types::User;
use crate::error::{ApiError, ApiResult};

/// The like/match edges of one user, as locked for a like operation.
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct LikeEdges {
    pub id: Uuid,
    pub likes: Vec<Uuid>,
    pub matches: Vec<Uuid>,
    pub likes_count: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LikeOutcome {
    Liked,
    Matched,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum LikeError {
    #[error("You cannot like your own profile")]
    SelfLike,
    #[error("Profile already liked")]
    AlreadyLiked,
    #[error("Already matched")]
    AlreadyMatched,
}

impl From<LikeError> for ApiError {
    fn from(e: LikeError) -> Self {
        ApiError::validation(e.to_string())
    }
}

/// Record `actor` liking `target`, promoting to a match when `target` already likes `actor`.
///
/// Counters stay exact: a recorded like bumps the target's `likes_count`, and a promotion
/// uncounts both likes it retracts. `likes` and `matches` stay disjoint on both sides.
pub fn apply_like(actor: &mut LikeEdges, target: &mut LikeEdges) -> Result<LikeOutcome, LikeError> {
    if actor.id == target.id {
        return Err(LikeError::SelfLike);
    }
    if actor.likes.contains(&target.id) {
        return Err(LikeError::AlreadyLiked);
    }
    if actor.matches.contains(&target.id) {
        return Err(LikeError::AlreadyMatched);
    }

    actor.likes.push(target.id);
    target.likes_count += 1;

    if !target.likes.contains(&actor.id) {
        return Ok(LikeOutcome::Liked);
    }

    actor.likes.retain(|id| *id != target.id);
    target.likes_count -= 1;
    target.likes.retain(|id| *id != actor.id);
    actor.likes_count = (actor.likes_count - 1).max(0);

    actor.matches.push(target.id);
    target.matches.push(actor.id);
    Ok(LikeOutcome::Matched)
}

/// Ids a user must never be offered: themselves, anyone they like, anyone they matched.
pub fn excluded_ids(actor: &User) -> Vec<Uuid> {
    let mut ids = Vec::with_capacity(1 + actor.likes.len() + actor.matches.len());
    ids.push(actor.id);
    ids.extend(actor.likes.iter().copied());
    ids.extend(actor.matches.iter().copied());
    ids
}

/// Whole years between `dob` and `today`, counting a birthday only once it has arrived.
pub fn age_on(dob: Date, today: Date) -> i32 {
    let mut age = today.year() - dob.year();
    if (today.month() as u8, today.day()) < (dob.month() as u8, dob.day()) {
        age -= 1;
    }
    age
}

/// Same calendar day `years` earlier; Feb 29 falls back to Feb 28 in non-leap years.
fn years_before(date: Date, years: i32) -> Date {
    let year = date.year() - years;
    Date::from_calendar_date(year, date.month(), date.day())
        .or_else(|_| Date::from_calendar_date(year, Month::February, 28))
        .unwrap_or(Date::MIN)
}

/// Inclusive age bounds for candidate search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AgeFilter {
    pub min: i32,
    pub max: i32,
}

impl Default for AgeFilter {
    fn default() -> Self {
        Self { min: 0, max: 100 }
    }
}

impl AgeFilter {
    /// Parse optional query values; absent or blank values keep the defaults.
    pub fn parse(min: Option<&str>, max: Option<&str>) -> ApiResult<Self> {
        fn bound(raw: Option<&str>, default: i32, name: &str) -> ApiResult<i32> {
            match raw.map(str::trim).filter(|s| !s.is_empty()) {
                None => Ok(default),
                Some(s) => s
                    .parse::<i32>()
                    .ok()
                    .filter(|v| (0..=200).contains(v))
                    .ok_or_else(|| ApiError::validation(format!("{name} must be a whole number between 0 and 200"))),
            }
        }
        let d = AgeFilter::default();
        Ok(Self {
            min: bound(min, d.min, "minAge")?,
            max: bound(max, d.max, "maxAge")?,
        })
    }

    /// Birth dates whose age on `today` lies in `[min, max]`: `(after, up_to]`.
    pub fn birth_date_window(&self, today: Date) -> (Date, Date) {
        (years_before(today, self.max + 1), years_before(today, self.min))
    }

    pub fn admits(&self, dob: Date, today: Date) -> bool {
        let (after, up_to) = self.birth_date_window(today);
        dob > after && dob <= up_to
    }
}

#[cfg(test)]
mod like_tests {
    use super::*;

    fn edges() -> LikeEdges {
        LikeEdges {
            id: Uuid::new_v4(),
            likes: Vec::new(),
            matches: Vec::new(),
            likes_count: 0,
        }
    }

    #[test]
    fn one_sided_like_is_recorded_and_counted() {
        let (mut a, mut b) = (edges(), edges());
        assert_eq!(apply_like(&mut a, &mut b), Ok(LikeOutcome::Liked));
        assert_eq!(a.likes, vec![b.id]);
        assert_eq!(b.likes_count, 1);
        assert!(a.matches.is_empty() && b.matches.is_empty());
    }

    #[test]
    fn reciprocal_like_creates_a_match() {
        let (mut a, mut b) = (edges(), edges());
        apply_like(&mut a, &mut b).unwrap();
        assert_eq!(apply_like(&mut b, &mut a), Ok(LikeOutcome::Matched));

        assert!(b.matches.contains(&a.id));
        assert!(a.matches.contains(&b.id));
        assert!(!b.likes.contains(&a.id));
        assert!(!a.likes.contains(&b.id));
    }

    #[test]
    fn promotion_keeps_counters_exact() {
        let (mut a, mut b) = (edges(), edges());
        apply_like(&mut a, &mut b).unwrap();
        assert_eq!((a.likes_count, b.likes_count), (0, 1));

        // b reciprocates: both likes are retracted into the match, so nobody is counted
        apply_like(&mut b, &mut a).unwrap();
        assert_eq!((a.likes_count, b.likes_count), (0, 0));
    }

    #[test]
    fn counters_track_other_pending_likes() {
        let (mut a, mut b, mut c) = (edges(), edges(), edges());
        apply_like(&mut c, &mut b).unwrap();
        apply_like(&mut a, &mut b).unwrap();
        assert_eq!(b.likes_count, 2);
        apply_like(&mut b, &mut a).unwrap();
        assert_eq!(b.likes_count, 1, "c's like on b is still pending");
        assert_eq!(a.likes_count, 0);
    }

    #[test]
    fn likes_and_matches_stay_disjoint() {
        let (mut a, mut b) = (edges(), edges());
        apply_like(&mut a, &mut b).unwrap();
        apply_like(&mut b, &mut a).unwrap();
        for e in [&a, &b] {
            assert!(e.likes.iter().all(|id| !e.matches.contains(id)));
        }
    }

    #[test]
    fn second_like_without_reciprocation_is_rejected() {
        let (mut a, mut b) = (edges(), edges());
        apply_like(&mut a, &mut b).unwrap();
        let before = (a.clone(), b.clone());
        assert_eq!(apply_like(&mut a, &mut b), Err(LikeError::AlreadyLiked));
        assert_eq!((a, b), before, "rejection leaves both sides untouched");
    }

    #[test]
    fn liking_a_match_again_is_rejected() {
        let (mut a, mut b) = (edges(), edges());
        apply_like(&mut a, &mut b).unwrap();
        apply_like(&mut b, &mut a).unwrap();
        assert_eq!(apply_like(&mut a, &mut b), Err(LikeError::AlreadyMatched));
        assert_eq!(a.matches.len(), 1);
    }

    #[test]
    fn self_like_is_rejected() {
        let mut a = edges();
        let mut same = a.clone();
        assert_eq!(apply_like(&mut a, &mut same), Err(LikeError::SelfLike));
    }

    #[test]
    fn like_errors_are_validation_errors() {
        let err: ApiError = LikeError::AlreadyLiked.into();
        assert!(matches!(err, ApiError::Validation(ref m) if m == "Profile already liked"));
    }
}

#[cfg(test)]
mod candidate_tests {
    use super::*;
    use crate::auth::repo_types::fixtures;
    use time::macros::date;

    #[test]
    fn excluded_ids_cover_self_likes_and_matches() {
        let mut a = fixtures::user("A");
        let (liked, matched, stranger) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        a.likes.push(liked);
        a.matches.push(matched);
        let ex = excluded_ids(&a);
        assert!(ex.contains(&a.id));
        assert!(ex.contains(&liked));
        assert!(ex.contains(&matched));
        assert!(!ex.contains(&stranger));
    }

    #[test]
    fn age_counts_birthdays_only_once_reached() {
        let today = date!(2026 - 10 - 19);
        assert_eq!(age_on(date!(2000 - 10 - 19), today), 26);
        assert_eq!(age_on(date!(2000 - 10 - 20), today), 25);
        assert_eq!(age_on(date!(2000 - 01 - 01), today), 26);
        assert_eq!(age_on(date!(2026 - 10 - 19), today), 0);
    }

    #[test]
    fn window_boundaries_match_derived_age() {
        let today = date!(2026 - 10 - 19);
        let f = AgeFilter { min: 25, max: 30 };

        // turns max + 1 today: too old
        assert!(!f.admits(date!(1995 - 10 - 19), today));
        // one day short of max + 1: still max
        assert!(f.admits(date!(1995 - 10 - 20), today));
        // today - max years - 1 day: age max
        assert!(f.admits(date!(1996 - 10 - 18), today));
        // exactly min years old today: included
        assert!(f.admits(date!(2001 - 10 - 19), today));
        // one day younger than min: excluded
        assert!(!f.admits(date!(2001 - 10 - 20), today));

        for dob in [date!(1990 - 01 - 01), date!(1996 - 03 - 03), date!(2003 - 07 - 07)] {
            let age = age_on(dob, today);
            assert_eq!(f.admits(dob, today), (25..=30).contains(&age), "dob {dob}");
        }
    }

    #[test]
    fn leap_day_anchors_fall_back_to_feb_28() {
        let today = date!(2028 - 02 - 29);
        let f = AgeFilter { min: 0, max: 26 };
        let (after, _) = f.birth_date_window(today);
        assert_eq!(after, date!(2001 - 02 - 28));
        assert!(!f.admits(date!(2001 - 02 - 28), today));
        assert!(f.admits(date!(2001 - 03 - 01), today));
    }

    #[test]
    fn parse_defaults_and_rejects_garbage() {
        assert_eq!(AgeFilter::parse(None, None).unwrap(), AgeFilter { min: 0, max: 100 });
        assert_eq!(
            AgeFilter::parse(Some("21"), Some(" ")).unwrap(),
            AgeFilter { min: 21, max: 100 }
        );
        assert!(AgeFilter::parse(Some("abc"), None).is_err());
        assert!(AgeFilter::parse(None, Some("-4")).is_err());
    }
}
