use std::collections::HashMap;

use anyhow::Context;
use axum::extract::Multipart;
use bytes::Bytes;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

pub const MAX_FILE_BYTES: usize = 5 * 1024 * 1024;

/// Which formats a file field accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Accept {
    /// jpg, jpeg or png only.
    ProfileImage,
    /// Any `image/*` upload.
    AnyImage,
}

/// One multipart file field a route accepts.
#[derive(Debug, Clone, Copy)]
pub struct FileField {
    pub name: &'static str,
    pub max_count: usize,
    pub accept: Accept,
}

pub struct UploadItem {
    pub body: Bytes,
    pub content_type: String,
    pub file_name: Option<String>,
}

/// Text fields and files of a parsed multipart body.
#[derive(Default)]
pub struct MultipartForm {
    pub text: HashMap<String, String>,
    pub files: HashMap<&'static str, Vec<UploadItem>>,
}

impl MultipartForm {
    /// Non-empty, trimmed text value.
    pub fn text(&self, name: &str) -> Option<&str> {
        self.text
            .get(name)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    pub fn take_files(&mut self, name: &str) -> Vec<UploadItem> {
        self.files.remove(name).unwrap_or_default()
    }
}

/// Drain a multipart body, enforcing per-field counts, the size cap and accepted formats.
pub async fn collect_multipart(mut mp: Multipart, fields: &[FileField]) -> ApiResult<MultipartForm> {
    let mut form = MultipartForm::default();
    loop {
        let field = match mp.next_field().await {
            Ok(Some(f)) => f,
            Ok(None) => break,
            Err(e) => return Err(ApiError::validation(format!("Malformed upload: {}", e.body_text()))),
        };
        let name = field.name().unwrap_or_default().to_string();

        if field.file_name().is_none() {
            let value = field
                .text()
                .await
                .map_err(|e| ApiError::validation(format!("Malformed upload: {}", e.body_text())))?;
            form.text.insert(name, value);
            continue;
        }

        let Some(spec) = fields.iter().find(|f| f.name == name) else {
            return Err(ApiError::validation(format!("Unexpected file field: {name}")));
        };
        let file_name = field.file_name().map(|s| s.to_string());
        let content_type = field
            .content_type()
            .map(|s| s.to_string())
            .unwrap_or_else(|| "application/octet-stream".into());
        let body = field
            .bytes()
            .await
            .map_err(|e| ApiError::validation(format!("Malformed upload: {}", e.body_text())))?;

        let item = UploadItem {
            body,
            content_type,
            file_name,
        };
        validate_upload(&item, spec.accept)?;

        let slot = form.files.entry(spec.name).or_default();
        if slot.len() == spec.max_count {
            return Err(ApiError::validation(format!(
                "Too many files for {} (max {})",
                spec.name, spec.max_count
            )));
        }
        slot.push(item);
    }
    Ok(form)
}

pub fn validate_upload(item: &UploadItem, accept: Accept) -> ApiResult<()> {
    if item.body.len() > MAX_FILE_BYTES {
        return Err(ApiError::validation(
            "File size is too large. Maximum size is 5MB",
        ));
    }
    let ok = match accept {
        Accept::ProfileImage => ext_for(item).is_some_and(|ext| ext == "jpg" || ext == "png"),
        Accept::AnyImage => item.content_type.starts_with("image/") || ext_for(item).is_some(),
    };
    if !ok {
        return Err(ApiError::validation(match accept {
            Accept::ProfileImage => "Only jpg, jpeg and png images are allowed",
            Accept::AnyImage => "Only image uploads are allowed",
        }));
    }
    Ok(())
}

fn ext_from_mime(ct: &str) -> Option<&'static str> {
    match ct {
        "image/jpeg" | "image/jpg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/webp" => Some("webp"),
        "image/gif" => Some("gif"),
        "image/heic" => Some("heic"),
        _ => None,
    }
}

fn ext_from_name(name: &str) -> Option<&'static str> {
    let (_, ext) = name.rsplit_once('.')?;
    match ext.to_ascii_lowercase().as_str() {
        "jpg" | "jpeg" => Some("jpg"),
        "png" => Some("png"),
        "webp" => Some("webp"),
        "gif" => Some("gif"),
        "heic" => Some("heic"),
        _ => None,
    }
}

fn ext_for(item: &UploadItem) -> Option<&'static str> {
    ext_from_mime(&item.content_type).or_else(|| item.file_name.as_deref().and_then(ext_from_name))
}

/// Store every item under `{folder}/{owner}/{uuid}.{ext}` and return their public URLs, in order.
pub async fn upload_many(
    st: &AppState,
    folder: &str,
    owner: Uuid,
    items: Vec<UploadItem>,
) -> anyhow::Result<Vec<String>> {
    let mut urls = Vec::with_capacity(items.len());
    for item in items {
        let ext = ext_for(&item).unwrap_or("bin");
        let key = format!("{}/{}/{}.{}", folder, owner, Uuid::new_v4(), ext);
        st.storage
            .put_object(&key, item.body, &item.content_type)
            .await
            .with_context(|| format!("put_object {}", key))?;
        debug!(%key, "media stored");
        urls.push(st.storage.public_url(&key));
    }
    Ok(urls)
}

/// Delete the object behind a stored reference. References the store did not mint are skipped.
pub async fn delete_reference(st: &AppState, reference: &str) -> anyhow::Result<()> {
    match st.storage.key_from_url(reference) {
        Some(key) => st
            .storage
            .delete_object(key)
            .await
            .with_context(|| format!("delete_object {}", key)),
        None => {
            warn!(%reference, "media reference outside the store; nothing to delete");
            Ok(())
        }
    }
}

/// Delete replaced objects after the document no longer points at them. Failures only log.
pub async fn delete_replaced(st: &AppState, references: &[String]) {
    for reference in references {
        if let Err(e) = delete_reference(st, reference).await {
            warn!(error = %e, %reference, "could not delete replaced media");
        }
    }
}

#[cfg(test)]
mod media_tests {
    use super::*;
    use crate::state::fake::{FakeStorage, PUBLIC_BASE};
    use crate::storage::StorageClient;
    use std::sync::Arc;

    fn item(ct: &str, name: Option<&str>, len: usize) -> UploadItem {
        UploadItem {
            body: Bytes::from(vec![0u8; len]),
            content_type: ct.into(),
            file_name: name.map(|s| s.to_string()),
        }
    }

    #[test]
    fn test_ext_from_mime() {
        assert_eq!(ext_from_mime("image/jpeg"), Some("jpg"));
        assert_eq!(ext_from_mime("image/jpg"), Some("jpg"));
        assert_eq!(ext_from_mime("image/png"), Some("png"));
        assert_eq!(ext_from_mime("application/octet-stream"), None);
    }

    #[test]
    fn profile_images_are_limited_to_jpg_and_png() {
        assert!(validate_upload(&item("image/jpeg", None, 10), Accept::ProfileImage).is_ok());
        assert!(validate_upload(&item("image/png", None, 10), Accept::ProfileImage).is_ok());
        assert!(validate_upload(
            &item("application/octet-stream", Some("me.JPEG"), 10),
            Accept::ProfileImage
        )
        .is_ok());
        assert!(validate_upload(&item("image/webp", None, 10), Accept::ProfileImage).is_err());
        assert!(validate_upload(&item("image/gif", Some("a.gif"), 10), Accept::ProfileImage).is_err());
    }

    #[test]
    fn generic_photos_accept_any_image() {
        assert!(validate_upload(&item("image/webp", None, 10), Accept::AnyImage).is_ok());
        assert!(validate_upload(&item("image/x-unknown", None, 10), Accept::AnyImage).is_ok());
        assert!(validate_upload(&item("text/plain", Some("notes.txt"), 10), Accept::AnyImage).is_err());
    }

    #[test]
    fn oversized_files_are_rejected() {
        assert!(validate_upload(&item("image/png", None, MAX_FILE_BYTES), Accept::ProfileImage).is_ok());
        let err = validate_upload(&item("image/png", None, MAX_FILE_BYTES + 1), Accept::ProfileImage)
            .unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
        assert!(err.to_string().contains("5MB"));
    }

    #[tokio::test]
    async fn upload_then_delete_reference() {
        let storage = Arc::new(FakeStorage::default());
        let state = AppState::fake_with_storage(storage.clone());
        let owner = Uuid::new_v4();

        let urls = upload_many(
            &state,
            "profiles",
            owner,
            vec![item("image/png", None, 3), item("image/jpeg", None, 4)],
        )
        .await
        .unwrap();
        assert_eq!(urls.len(), 2);
        assert!(urls[0].starts_with(PUBLIC_BASE));
        assert!(urls[0].ends_with(".png"));
        assert!(urls[1].contains(&owner.to_string()));
        assert_eq!(storage.objects.lock().unwrap().len(), 2);

        delete_reference(&state, &urls[0]).await.unwrap();
        assert_eq!(storage.objects.lock().unwrap().len(), 1);

        // foreign references are ignored rather than failing the request
        delete_reference(&state, "https://elsewhere.net/x.png").await.unwrap();
        assert_eq!(storage.deleted.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn delete_replaced_swallows_failures() {
        let key = "profiles/u/1.png".to_string();
        let storage = Arc::new(FakeStorage {
            fail_deletes: vec![key.clone()],
            ..Default::default()
        });
        let state = AppState::fake_with_storage(storage.clone());
        let refs = vec![
            storage.public_url(&key),
            storage.public_url("profiles/u/2.png"),
        ];
        delete_replaced(&state, &refs).await;
        assert_eq!(*storage.deleted.lock().unwrap(), vec!["profiles/u/2.png".to_string()]);
    }
}
