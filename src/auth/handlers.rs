use axum::{
    extract::{DefaultBodyLimit, FromRef, Multipart, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::{
    auth::{
        claims::SubjectKind,
        dto::{AuthResponse, LoginRequest, ProfileUpdatedResponse, PublicUser, UpdateProfileRequest},
        extractors::CurrentUser,
        repo::{NewUser, PictureWrites},
        repo_types::{AccountStatus, Profile, User},
        services::{
            hash_password, is_valid_email, normalize_email, verify_password, JwtKeys,
            MIN_PASSWORD_LEN,
        },
    },
    error::{ApiError, ApiResult},
    media::services::{
        collect_multipart, delete_replaced, upload_many, Accept, FileField, MAX_FILE_BYTES,
    },
    profile::services::ProfilePatch,
    state::AppState,
};

const REGISTER_FILES: [FileField; 2] = [
    FileField {
        name: "profilePicture",
        max_count: 1,
        accept: Accept::ProfileImage,
    },
    FileField {
        name: "postPictures",
        max_count: 4,
        accept: Accept::ProfileImage,
    },
];

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/auth/register",
            post(register).layer(DefaultBodyLimit::max(6 * MAX_FILE_BYTES)),
        )
        .route("/auth/login", post(login))
}

pub fn me_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/me", get(get_me))
        .route("/auth/profile", put(update_profile))
}

#[instrument(skip(state, mp))]
pub async fn register(
    State(state): State<AppState>,
    mp: Multipart,
) -> ApiResult<(StatusCode, Json<AuthResponse>)> {
    let mut form = collect_multipart(mp, &REGISTER_FILES).await?;

    let email = normalize_email(form.text("email").unwrap_or_default());
    if !is_valid_email(&email) {
        warn!(email = %email, "invalid email");
        return Err(ApiError::validation("Invalid email"));
    }

    let password = form.text.get("password").cloned().unwrap_or_default();
    if password.chars().count() < MIN_PASSWORD_LEN {
        warn!("password too short");
        return Err(ApiError::validation(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }

    let patch = ProfilePatch::from_fields(&form.text)?;
    let (Some(first_name), Some(last_name), Some(date_of_birth), Some(gender)) = (
        patch.first_name,
        patch.last_name,
        patch.date_of_birth,
        patch.gender,
    ) else {
        return Err(ApiError::validation(
            "firstName, lastName, dateOfBirth and gender are required",
        ));
    };

    if User::find_by_email(&state.db, &email).await?.is_some() {
        warn!(email = %email, "email already registered");
        return Err(ApiError::Duplicate("Email already registered".into()));
    }

    let hash = hash_password(&password)?;

    let user_id = Uuid::new_v4();
    let profile_picture = upload_many(&state, "profiles", user_id, form.take_files("profilePicture"))
        .await?
        .into_iter()
        .next();
    let additional_pictures =
        upload_many(&state, "profiles", user_id, form.take_files("postPictures")).await?;

    let profile = Profile {
        first_name,
        last_name,
        date_of_birth,
        gender,
        religion: patch.religion,
        occupation: patch.occupation,
        location: patch.location,
        about: patch.about,
        profile_picture,
        additional_pictures,
        photos: Vec::new(),
    };

    let created = User::create(
        &state.db,
        NewUser {
            id: user_id,
            email: &email,
            password_hash: &hash,
            profile: &profile,
        },
    )
    .await;
    let user = match created {
        Ok(u) => u,
        Err(e) => {
            error!(error = %e, "create user failed");
            let uploaded: Vec<String> = profile
                .profile_picture
                .iter()
                .chain(profile.additional_pictures.iter())
                .cloned()
                .collect();
            delete_replaced(&state, &uploaded).await;
            return Err(e.into());
        }
    };

    let token = JwtKeys::from_ref(&state).sign(user.id, SubjectKind::User)?;

    info!(user_id = %user.id, "user registered");
    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            token,
            user: user.into(),
        }),
    ))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> ApiResult<Json<AuthResponse>> {
    let email = normalize_email(&payload.email);

    let Some(user) = User::find_by_email(&state.db, &email).await? else {
        warn!(email = %email, "login unknown email");
        return Err(ApiError::unauthenticated("Invalid credentials"));
    };

    if !verify_password(&payload.password, &user.password_hash)? {
        warn!(user_id = %user.id, "login invalid password");
        return Err(ApiError::unauthenticated("Invalid credentials"));
    }

    if user.status != AccountStatus::Active {
        warn!(user_id = %user.id, status = user.status.as_str(), "login on inactive account");
        return Err(ApiError::forbidden("Account is not active"));
    }

    User::touch_last_active(&state.db, user.id).await?;

    let token = JwtKeys::from_ref(&state).sign(user.id, SubjectKind::User)?;

    info!(user_id = %user.id, "user logged in");
    Ok(Json(AuthResponse {
        token,
        user: user.into(),
    }))
}

#[instrument(skip_all)]
pub async fn get_me(CurrentUser(user): CurrentUser) -> Json<User> {
    Json(user)
}

#[instrument(skip_all)]
pub async fn update_profile(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(payload): Json<UpdateProfileRequest>,
) -> ApiResult<Json<ProfileUpdatedResponse>> {
    let mut profile = user.profile;
    ProfilePatch::from(payload).apply(&mut profile);

    let user = User::save_profile(&state.db, user.id, &profile, PictureWrites::default())
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    Ok(Json(ProfileUpdatedResponse {
        message: "Profile updated successfully",
        user: PublicUser::from(user),
    }))
}
