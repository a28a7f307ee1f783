use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, State},
    routing::{delete, get},
    Json, Router,
};
use tracing::{info, instrument};

use super::{
    dto::{MessageResponse, PhotosResponse},
    services::ProfilePatch,
};
use crate::{
    auth::{
        dto::{ProfileUpdatedResponse, PublicUser},
        extractors::CurrentUser,
        repo::{MediaList, PictureWrites},
        repo_types::{Profile, User},
    },
    error::{ApiError, ApiResult},
    media::services::{
        collect_multipart, delete_reference, delete_replaced, upload_many, Accept, FileField,
        MAX_FILE_BYTES,
    },
    state::AppState,
};

const PROFILE_FILES: [FileField; 2] = [
    FileField {
        name: "profilePicture",
        max_count: 1,
        accept: Accept::ProfileImage,
    },
    FileField {
        name: "additionalPictures",
        max_count: 4,
        accept: Accept::ProfileImage,
    },
];

const PHOTO_FILES: [FileField; 1] = [FileField {
    name: "photos",
    max_count: 10,
    accept: Accept::AnyImage,
}];

pub fn profile_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/profile",
            get(get_profile)
                .put(update_profile)
                .layer(DefaultBodyLimit::max(6 * MAX_FILE_BYTES)),
        )
        .route("/profile/picture", delete(delete_profile_picture))
        .route("/profile/pictures/:index", delete(delete_additional_picture))
        .route(
            "/profile/photos",
            get(list_photos)
                .post(add_photos)
                .layer(DefaultBodyLimit::max(11 * MAX_FILE_BYTES)),
        )
        .route("/profile/photos/:index", delete(delete_photo))
}

fn list_entry_missing(list: MediaList) -> ApiError {
    match list {
        MediaList::AdditionalPictures => ApiError::not_found("Picture not found"),
        MediaList::Photos => ApiError::not_found("Photo not found"),
    }
}

fn list_of(profile: &Profile, list: MediaList) -> &[String] {
    match list {
        MediaList::AdditionalPictures => &profile.additional_pictures,
        MediaList::Photos => &profile.photos,
    }
}

fn parse_index(raw: &str) -> ApiResult<usize> {
    raw.trim()
        .parse::<usize>()
        .map_err(|_| ApiError::validation("Index must be a non-negative integer"))
}

/// Delete the stored object first, then drop that reference from the list; later entries
/// shift down. Only the one list entry is written, so concurrent appends survive.
async fn remove_reference(
    state: &AppState,
    user: User,
    list: MediaList,
    raw_index: &str,
) -> ApiResult<User> {
    let index = parse_index(raw_index)?;
    let Some(reference) = list_of(&user.profile, list).get(index).cloned() else {
        return Err(list_entry_missing(list));
    };

    delete_reference(state, &reference).await?;

    let updated = User::remove_media(&state.db, user.id, list, &reference)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;
    info!(user_id = %updated.id, index, list = list.column(), "media reference removed");
    Ok(updated)
}

#[instrument(skip_all)]
pub async fn get_profile(CurrentUser(user): CurrentUser) -> Json<User> {
    Json(user)
}

#[instrument(skip_all)]
pub async fn update_profile(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    mp: Multipart,
) -> ApiResult<Json<ProfileUpdatedResponse>> {
    let mut form = collect_multipart(mp, &PROFILE_FILES).await?;
    let patch = ProfilePatch::from_fields(&form.text)?;

    let mut profile = user.profile;
    let mut replaced = Vec::new();

    let picture = form.take_files("profilePicture");
    let extra = form.take_files("additionalPictures");
    let writes = PictureWrites {
        profile_picture: !picture.is_empty(),
        additional_pictures: !extra.is_empty(),
    };

    if writes.profile_picture {
        let url = upload_many(&state, "profiles", user.id, picture).await?.into_iter().next();
        if let Some(old) = std::mem::replace(&mut profile.profile_picture, url) {
            replaced.push(old);
        }
    }

    if writes.additional_pictures {
        let urls = upload_many(&state, "profiles", user.id, extra).await?;
        replaced.extend(std::mem::replace(&mut profile.additional_pictures, urls));
    }

    patch.apply(&mut profile);
    let user = User::save_profile(&state.db, user.id, &profile, writes)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    delete_replaced(&state, &replaced).await;

    Ok(Json(ProfileUpdatedResponse {
        message: "Profile updated successfully",
        user: PublicUser::from(user),
    }))
}

#[instrument(skip_all)]
pub async fn delete_profile_picture(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> ApiResult<Json<MessageResponse>> {
    if let Some(reference) = user.profile.profile_picture.as_deref() {
        delete_reference(&state, reference).await?;
        User::clear_profile_picture(&state.db, user.id, reference)
            .await?
            .ok_or_else(|| ApiError::not_found("User not found"))?;
    }

    Ok(Json(MessageResponse {
        message: "Profile picture deleted successfully",
    }))
}

#[instrument(skip_all)]
pub async fn delete_additional_picture(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(index): Path<String>,
) -> ApiResult<Json<MessageResponse>> {
    remove_reference(&state, user, MediaList::AdditionalPictures, &index).await?;
    Ok(Json(MessageResponse {
        message: "Picture deleted successfully",
    }))
}

#[instrument(skip_all)]
pub async fn add_photos(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    mp: Multipart,
) -> ApiResult<Json<PhotosResponse>> {
    let mut form = collect_multipart(mp, &PHOTO_FILES).await?;
    let files = form.take_files("photos");
    if files.is_empty() {
        return Err(ApiError::validation("No files uploaded"));
    }

    let urls = upload_many(&state, "photos", user.id, files).await?;
    let user = User::append_photos(&state.db, user.id, &urls)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    info!(user_id = %user.id, added = urls.len(), "photos uploaded");
    Ok(Json(PhotosResponse {
        message: Some("Photos uploaded successfully"),
        photos: user.profile.photos,
    }))
}

#[instrument(skip_all)]
pub async fn list_photos(CurrentUser(user): CurrentUser) -> Json<PhotosResponse> {
    Json(PhotosResponse {
        message: None,
        photos: user.profile.photos,
    })
}

#[instrument(skip_all)]
pub async fn delete_photo(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(index): Path<String>,
) -> ApiResult<Json<PhotosResponse>> {
    let user = remove_reference(&state, user, MediaList::Photos, &index).await?;
    Ok(Json(PhotosResponse {
        message: Some("Photo deleted successfully"),
        photos: user.profile.photos,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::build_app;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use tower::ServiceExt;

    #[test]
    fn index_must_be_a_position() {
        assert_eq!(parse_index("2").unwrap(), 2);
        assert!(matches!(parse_index("-1"), Err(ApiError::Validation(_))));
        assert!(matches!(parse_index("first"), Err(ApiError::Validation(_))));
    }

    #[test]
    fn media_lists_read_the_right_profile_field() {
        let mut profile = crate::auth::repo_types::fixtures::user("P").profile;
        profile.additional_pictures = vec!["a".into()];
        profile.photos = vec!["p1".into(), "p2".into()];
        assert_eq!(list_of(&profile, MediaList::AdditionalPictures), ["a".to_string()]);
        assert_eq!(list_of(&profile, MediaList::Photos).len(), 2);
        assert!(matches!(
            list_entry_missing(MediaList::Photos),
            ApiError::NotFound(ref m) if m == "Photo not found"
        ));
    }

    #[tokio::test]
    async fn profile_routes_reject_anonymous_callers() {
        for (method, uri) in [
            ("GET", "/api/profile"),
            ("DELETE", "/api/profile/picture"),
            ("DELETE", "/api/profile/pictures/0"),
            ("GET", "/api/profile/photos"),
            ("DELETE", "/api/profile/photos/1"),
        ] {
            let res = build_app(AppState::fake())
                .oneshot(Request::builder().method(method).uri(uri).body(Body::empty()).unwrap())
                .await
                .unwrap();
            assert_eq!(res.status(), StatusCode::UNAUTHORIZED, "{method} {uri}");
        }
    }
}
