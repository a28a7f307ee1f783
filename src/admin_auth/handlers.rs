use axum::{
    extract::{FromRef, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::{info, instrument, warn};

use super::{
    dto::{AdminAuthResponse, AdminLoginRequest, AdminRegisterRequest},
    extractors::CurrentAdmin,
    repo::NewAdmin,
    repo_types::{permissions, Admin},
};
use crate::{
    auth::{
        repo_types::AccountStatus,
        services::{
            hash_password, is_valid_email, normalize_email, verify_password, JwtKeys,
            MIN_PASSWORD_LEN,
        },
        SubjectKind,
    },
    error::{ApiError, ApiResult},
    state::AppState,
};

pub fn admin_auth_routes() -> Router<AppState> {
    Router::new()
        .route("/admin-auth/register", post(register))
        .route("/admin-auth/login", post(login))
        .route("/admin-auth/me", get(get_me))
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<AdminRegisterRequest>,
) -> ApiResult<(StatusCode, Json<AdminAuthResponse>)> {
    if payload.admin_key != state.config.admin_registration_key {
        warn!("admin registration with wrong key");
        return Err(ApiError::forbidden("Invalid admin registration key"));
    }

    let email = normalize_email(&payload.email);
    if !is_valid_email(&email) {
        return Err(ApiError::validation("Invalid email"));
    }
    if payload.password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ApiError::validation(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    let (first_name, last_name) = (payload.first_name.trim(), payload.last_name.trim());
    if first_name.is_empty() || last_name.is_empty() {
        return Err(ApiError::validation("firstName and lastName are required"));
    }

    if Admin::find_by_email(&state.db, &email).await?.is_some() {
        warn!(email = %email, "admin email already registered");
        return Err(ApiError::Duplicate("Email already registered".into()));
    }

    let hash = hash_password(&payload.password)?;
    let role = payload
        .role
        .as_deref()
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .unwrap_or("admin");
    let perms: Vec<String> = permissions::DEFAULT.iter().map(|p| p.to_string()).collect();

    let admin = Admin::create(
        &state.db,
        NewAdmin {
            email: &email,
            password_hash: &hash,
            first_name,
            last_name,
            role,
            permissions: &perms,
        },
    )
    .await?;

    let token = JwtKeys::from_ref(&state).sign(admin.id, SubjectKind::Admin)?;

    info!(admin_id = %admin.id, role = %admin.role, "admin registered");
    Ok((
        StatusCode::CREATED,
        Json(AdminAuthResponse {
            success: None,
            token,
            admin,
        }),
    ))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<AdminLoginRequest>,
) -> ApiResult<Json<AdminAuthResponse>> {
    let email = normalize_email(&payload.email);

    let Some(admin) = Admin::find_by_email(&state.db, &email).await? else {
        warn!(email = %email, "admin login unknown email");
        return Err(ApiError::unauthenticated("Invalid credentials"));
    };

    if !verify_password(&payload.password, &admin.password_hash)? {
        warn!(admin_id = %admin.id, "admin login invalid password");
        return Err(ApiError::unauthenticated("Invalid credentials"));
    }

    if admin.status != AccountStatus::Active {
        return Err(ApiError::forbidden("Account is not active"));
    }

    let admin = Admin::record_login(&state.db, admin.id).await?;
    let token = JwtKeys::from_ref(&state).sign(admin.id, SubjectKind::Admin)?;

    info!(admin_id = %admin.id, "admin logged in");
    Ok(Json(AdminAuthResponse {
        success: Some(true),
        token,
        admin,
    }))
}

#[instrument(skip_all)]
pub async fn get_me(CurrentAdmin(admin): CurrentAdmin) -> Json<Admin> {
    Json(admin)
}
