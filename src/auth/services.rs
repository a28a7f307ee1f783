pub(crate) use crate::auth::claims::{Claims, SubjectKind};
use crate::config::JwtConfig;
use crate::state::AppState;
use argon2::{password_hash::SaltString, Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use axum::extract::FromRef;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use lazy_static::lazy_static;
use rand::rngs::OsRng;
use regex::Regex;
use std::time::Duration;
use time::{Date, Duration as TimeDuration, OffsetDateTime};
use tracing::{debug, error};
use uuid::Uuid;

pub const MIN_PASSWORD_LEN: usize = 6;

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Accepts `YYYY-MM-DD`, or an RFC 3339 timestamp whose date part is kept.
pub(crate) fn parse_birth_date(raw: &str) -> Option<Date> {
    let raw = raw.trim();
    let ymd = time::macros::format_description!("[year]-[month]-[day]");
    Date::parse(raw, &ymd).ok().or_else(|| {
        OffsetDateTime::parse(raw, &time::format_description::well_known::Rfc3339)
            .ok()
            .map(|t| t.date())
    })
}

pub fn hash_password(plain: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let hash = argon2
        .hash_password(plain.as_bytes(), &salt)
        .map_err(|e| {
            error!(error = %e, "argon2 hash_password error");
            anyhow::anyhow!(e.to_string())
        })?
        .to_string();
    Ok(hash)
}

pub fn verify_password(plain: &str, hash: &str) -> anyhow::Result<bool> {
    let parsed = PasswordHash::new(hash).map_err(|e| {
        error!(error = %e, "argon2 parse hash error");
        anyhow::anyhow!(e.to_string())
    })?;
    Ok(Argon2::default()
        .verify_password(plain.as_bytes(), &parsed)
        .is_ok())
}

/// Holds JWT signing and verification keys with config data.
#[derive(Clone)]
pub struct JwtKeys {
    pub encoding: EncodingKey,
    pub decoding: DecodingKey,
    pub issuer: String,
    pub audience: String,
    pub user_ttl: Duration,
    pub admin_ttl: Duration,
}

/// Non-positive values collapse to zero; `AppConfig::validate` keeps real configs in range.
fn ttl_from_minutes(minutes: i64) -> Duration {
    Duration::from_secs(u64::try_from(minutes).unwrap_or(0).saturating_mul(60))
}

impl FromRef<AppState> for JwtKeys {
    fn from_ref(state: &AppState) -> Self {
        let JwtConfig {
            secret,
            issuer,
            audience,
            user_ttl_minutes,
            admin_ttl_minutes,
        } = state.config.jwt.clone();
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            issuer,
            audience,
            user_ttl: ttl_from_minutes(user_ttl_minutes),
            admin_ttl: ttl_from_minutes(admin_ttl_minutes),
        }
    }
}

impl JwtKeys {
    /// The only place tokens are minted.
    pub fn sign(&self, subject: Uuid, kind: SubjectKind) -> anyhow::Result<String> {
        let now = OffsetDateTime::now_utc();
        let ttl = match kind {
            SubjectKind::User => self.user_ttl,
            SubjectKind::Admin => self.admin_ttl,
        };
        let exp = now + TimeDuration::seconds(ttl.as_secs() as i64);
        let claims = Claims {
            sub: subject,
            iat: now.unix_timestamp() as usize,
            exp: exp.unix_timestamp() as usize,
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            kind,
        };
        let token = encode(&Header::default(), &claims, &self.encoding)?;
        debug!(subject = %subject, kind = ?kind, "jwt signed");
        Ok(token)
    }

    pub fn verify(&self, token: &str, expected: SubjectKind) -> anyhow::Result<Claims> {
        let mut validation = Validation::default();
        validation.set_audience(std::slice::from_ref(&self.audience));
        validation.set_issuer(std::slice::from_ref(&self.issuer));
        let data = decode::<Claims>(token, &self.decoding, &validation)?;
        if data.claims.kind != expected {
            anyhow::bail!("token issued for {:?}, expected {:?}", data.claims.kind, expected);
        }
        debug!(subject = %data.claims.sub, kind = ?data.claims.kind, "jwt verified");
        Ok(data.claims)
    }
}

#[cfg(test)]
mod password_tests {
    use super::*;

    #[test]
    fn hash_and_verify_roundtrip() {
        let password = "Secur3P@ssw0rd!";
        let hash = hash_password(password).expect("hashing should succeed");
        assert_ne!(hash, password);
        assert!(!hash.contains(password));
        assert!(verify_password(password, &hash).expect("verify should succeed"));
    }

    #[test]
    fn verify_rejects_wrong_password() {
        let password = "correct-horse-battery-staple";
        let hash = hash_password(password).expect("hashing should succeed");
        assert!(!verify_password("wrong-password", &hash).expect("verify should not error"));
        assert!(!verify_password("Correct-horse-battery-staple", &hash).unwrap());
    }

    #[test]
    fn same_password_hashes_differently() {
        let a = hash_password("samesame").unwrap();
        let b = hash_password("samesame").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn verify_errors_on_malformed_hash() {
        let err = verify_password("anything", "not-a-valid-hash").unwrap_err();
        assert!(!err.to_string().is_empty());
    }
}

#[cfg(test)]
mod validation_tests {
    use super::*;
    use time::macros::date;

    #[test]
    fn email_shapes() {
        assert!(is_valid_email("a@b.co"));
        assert!(!is_valid_email("a@b"));
        assert!(!is_valid_email("no-at.example.com"));
        assert!(!is_valid_email("sp ace@x.com"));
        assert_eq!(normalize_email("  Mixed@Case.COM "), "mixed@case.com");
    }

    #[test]
    fn birth_date_formats() {
        assert_eq!(parse_birth_date("1990-02-03"), Some(date!(1990 - 02 - 03)));
        assert_eq!(
            parse_birth_date("1990-02-03T00:00:00Z"),
            Some(date!(1990 - 02 - 03))
        );
        assert_eq!(parse_birth_date("03/02/1990"), None);
        assert_eq!(parse_birth_date("1990-02-30"), None);
    }
}

#[cfg(test)]
mod jwt_tests {
    use super::*;

    fn make_keys() -> JwtKeys {
        let state = AppState::fake();
        JwtKeys::from_ref(&state)
    }

    #[tokio::test]
    async fn sign_and_verify_user_token() {
        let keys = make_keys();
        let user_id = Uuid::new_v4();
        let token = keys.sign(user_id, SubjectKind::User).expect("sign");
        let claims = keys.verify(&token, SubjectKind::User).expect("verify token");
        assert_eq!(claims.sub, user_id);
        assert_eq!(claims.iss, "test-issuer");
        assert_eq!(claims.aud, "test-aud");
        assert_eq!(claims.exp - claims.iat, 7 * 24 * 60 * 60);
    }

    #[tokio::test]
    async fn admin_tokens_live_one_day() {
        let keys = make_keys();
        let token = keys.sign(Uuid::new_v4(), SubjectKind::Admin).expect("sign");
        let claims = keys.verify(&token, SubjectKind::Admin).expect("verify");
        assert_eq!(claims.exp - claims.iat, 24 * 60 * 60);
    }

    #[test]
    fn ttl_conversion_never_overflows() {
        assert_eq!(ttl_from_minutes(-5), Duration::ZERO);
        assert_eq!(ttl_from_minutes(90), Duration::from_secs(5400));
        assert_eq!(ttl_from_minutes(i64::MAX), Duration::from_secs(u64::MAX));
    }

    #[tokio::test]
    async fn kinds_do_not_cross() {
        let keys = make_keys();
        let user_token = keys.sign(Uuid::new_v4(), SubjectKind::User).unwrap();
        let admin_token = keys.sign(Uuid::new_v4(), SubjectKind::Admin).unwrap();
        assert!(keys.verify(&user_token, SubjectKind::Admin).is_err());
        assert!(keys.verify(&admin_token, SubjectKind::User).is_err());
    }

    #[tokio::test]
    async fn verify_rejects_expired_token() {
        let keys = make_keys();
        // default validation leeway is 60 seconds, so forge an older token directly
        let now = OffsetDateTime::now_utc().unix_timestamp() as usize;
        let claims = Claims {
            sub: Uuid::new_v4(),
            iat: now - 3600,
            exp: now - 1800,
            iss: keys.issuer.clone(),
            aud: keys.audience.clone(),
            kind: SubjectKind::User,
        };
        let stale = encode(&Header::default(), &claims, &keys.encoding).unwrap();
        assert!(keys.verify(&stale, SubjectKind::User).is_err());
    }

    #[tokio::test]
    async fn verify_rejects_foreign_secret() {
        let keys = make_keys();
        let mut other = make_keys();
        other.encoding = EncodingKey::from_secret(b"someone-else");
        let token = other.sign(Uuid::new_v4(), SubjectKind::User).unwrap();
        assert!(keys.verify(&token, SubjectKind::User).is_err());
    }
}
