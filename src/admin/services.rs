use std::collections::HashMap;

use serde_json::Value;
use time::{Date, Duration, OffsetDateTime, UtcOffset};
use tracing::warn;

use super::dto::{AdminUserUpdate, PreferencesPatch, UsersByStatus};
use crate::auth::repo_types::{AccountStatus, User};
use crate::error::{ApiError, ApiResult};
use crate::profile::services::ProfilePatch;

pub const TREND_DAYS: i64 = 7;
pub const DEFAULT_PAGE_SIZE: i64 = 10;

/// One local calendar day, both ends inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayWindow {
    pub date: Date,
    pub start: OffsetDateTime,
    pub end: OffsetDateTime,
}

impl DayWindow {
    pub fn for_date(date: Date, offset: UtcOffset) -> Self {
        let start = date.midnight().assume_offset(offset);
        let end = start + Duration::days(1) - Duration::milliseconds(1);
        Self { date, start, end }
    }
}

/// The trailing `days` local days ending today, oldest first.
pub fn trailing_days(now: OffsetDateTime, offset: UtcOffset, days: i64) -> Vec<DayWindow> {
    let today = now.to_offset(offset).date();
    (0..days)
        .rev()
        .map(|back| DayWindow::for_date(today - Duration::days(back), offset))
        .collect()
}

/// Fold grouped status counts; a missing status counts as active.
pub fn fold_status_counts(rows: Vec<(Option<String>, i64)>) -> UsersByStatus {
    let mut out = UsersByStatus::default();
    for (status, count) in rows {
        let status = match status.as_deref() {
            None => AccountStatus::Active,
            Some(raw) => match raw.parse::<AccountStatus>() {
                Ok(s) => s,
                Err(_) => {
                    warn!(status = raw, count, "unknown status bucket ignored");
                    continue;
                }
            },
        };
        match status {
            AccountStatus::Active => out.active += count,
            AccountStatus::Inactive => out.inactive += count,
            AccountStatus::Suspended => out.suspended += count,
        }
    }
    out
}

/// Page and page size from raw query values; garbage falls back to defaults, both are at least 1.
pub fn paging(page: Option<&str>, limit: Option<&str>) -> (i64, i64) {
    let parse = |raw: Option<&str>, default: i64| {
        raw.and_then(|s| s.trim().parse::<i64>().ok())
            .unwrap_or(default)
            .max(1)
    };
    (parse(page, 1), parse(limit, DEFAULT_PAGE_SIZE))
}

/// Rows to skip before `page`; saturates instead of overflowing.
pub fn page_offset(page: i64, limit: i64) -> i64 {
    (page - 1).max(0).saturating_mul(limit)
}

/// Ceiling of `total / limit`; `limit` is at least 1.
pub fn page_count(total: i64, limit: i64) -> i64 {
    if total <= 0 {
        return 0;
    }
    (total - 1) / limit.max(1) + 1
}

/// `%term%` with LIKE metacharacters escaped by backslash.
pub fn like_pattern(term: &str) -> String {
    let mut out = String::with_capacity(term.len() + 2);
    out.push('%');
    for c in term.chars() {
        if matches!(c, '\\' | '%' | '_') {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('%');
    out
}

fn profile_fields(raw: HashMap<String, Value>) -> ApiResult<HashMap<String, String>> {
    let mut fields = HashMap::with_capacity(raw.len());
    for (key, value) in raw {
        match value {
            Value::Null => {}
            Value::String(s) => {
                fields.insert(key, s);
            }
            Value::Number(n) => {
                fields.insert(key, n.to_string());
            }
            _ => return Err(ApiError::validation(format!("profile.{key} must be a string"))),
        }
    }
    Ok(fields)
}

fn apply_preferences(user: &mut User, patch: PreferencesPatch) -> ApiResult<()> {
    let prefs = &mut user.preferences;
    if let Some(range) = patch.age_range {
        let min = range.min.unwrap_or(prefs.age_range.min);
        let max = range.max.unwrap_or(prefs.age_range.max);
        if min < 0 || min > max {
            return Err(ApiError::validation("Invalid age range"));
        }
        prefs.age_range.min = min;
        prefs.age_range.max = max;
    }
    if patch.religion.is_some() {
        prefs.religion = patch.religion;
    }
    if patch.location.is_some() {
        prefs.location = patch.location;
    }
    Ok(())
}

/// Shallow-merge an admin edit into `user`. Nothing is written on error.
pub fn apply_update(user: &mut User, update: AdminUserUpdate) -> ApiResult<()> {
    let mut next = user.clone();

    if let Some(email) = update.email.as_deref().map(str::trim).filter(|e| !e.is_empty()) {
        if !email.contains('@') {
            return Err(ApiError::validation("Invalid email format"));
        }
        next.email = email.to_lowercase();
    }
    if let Some(status) = update.status.as_deref().filter(|s| !s.is_empty()) {
        next.status = status
            .parse()
            .map_err(|_| ApiError::validation("Status must be active, inactive or suspended"))?;
    }
    if let Some(raw) = update.profile {
        ProfilePatch::from_fields(&profile_fields(raw)?)?.apply(&mut next.profile);
    }
    if let Some(prefs) = update.preferences {
        apply_preferences(&mut next, prefs)?;
    }

    *user = next;
    Ok(())
}
