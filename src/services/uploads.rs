use axum::extract::multipart::{Field, Multipart};
use chrono::Utc;
use rand::distributions::{Alphanumeric, DistString};
use rand::rngs::OsRng;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use strict_path::{PathBoundary, StrictPath};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::config::UploadConfig;
use crate::database::models::{PdfRef, UploadDescriptor, VisaType};
use crate::error::ApiError;
use crate::middleware::Identity;
use crate::state::AppState;
use crate::types::{Access, UploadPurpose};

/// Marker for paths confined to the configured upload root
#[derive(Debug, Clone, Copy)]
pub struct UploadRoot;

#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("File exceeds the {limit} byte limit")]
    TooLarge { limit: usize },

    #[error("Unsupported file type '{0}'; only images and PDF files are accepted")]
    UnsupportedType(String),

    #[error("No file was provided")]
    MissingFile,

    #[error("Invalid file name '{0}'")]
    InvalidName(String),

    #[error("Upload root unavailable: {0}")]
    Root(String),

    #[error("Upload storage failed: {0}")]
    Storage(#[from] std::io::Error),

    #[error("Upload task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// A file read out of a multipart body, not yet stored
#[derive(Debug, Clone)]
pub struct IncomingFile {
    pub original_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// Multipart body split into file parts and plain text fields
#[derive(Debug, Default)]
pub struct UploadForm {
    pub files: Vec<IncomingFile>,
    pub fields: HashMap<String, String>,
}

/// Files on disk under a `strict-path` boundary
#[derive(Clone)]
pub struct UploadStore {
    boundary: PathBoundary<UploadRoot>,
    max_file_bytes: usize,
}

impl UploadStore {
    pub fn new(config: &UploadConfig) -> Result<Self, UploadError> {
        let boundary = PathBoundary::<UploadRoot>::try_new_create(&config.root)
            .map_err(|err| UploadError::Root(err.to_string()))?;
        Ok(Self {
            boundary,
            max_file_bytes: config.max_file_bytes,
        })
    }

    pub fn max_file_bytes(&self) -> usize {
        self.max_file_bytes
    }

    fn resolve(&self, relative: &str) -> Result<StrictPath<UploadRoot>, UploadError> {
        self.boundary
            .strict_join(relative)
            .map_err(|_| UploadError::InvalidName(relative.to_string()))
    }

    /// Size and type checks. Nothing is written when this fails.
    pub fn check(&self, file: &IncomingFile) -> Result<(), UploadError> {
        if file.bytes.is_empty() {
            return Err(UploadError::MissingFile);
        }
        if file.bytes.len() > self.max_file_bytes {
            return Err(UploadError::TooLarge { limit: self.max_file_bytes });
        }
        if !accepted_type(&file.content_type) {
            return Err(UploadError::UnsupportedType(file.content_type.clone()));
        }
        Ok(())
    }

    /// Write the file under a freshly generated name and describe it
    pub async fn save(
        &self,
        file: &IncomingFile,
        owner_id: Uuid,
        purpose: UploadPurpose,
    ) -> Result<UploadDescriptor, UploadError> {
        self.check(file)?;

        let generated_name = generate_name(&file.original_name, &file.content_type);
        let path = self.resolve(&generated_name)?;

        let checksum = format!("{:x}", Sha256::digest(&file.bytes));
        let bytes = file.bytes.clone();
        tokio::task::spawn_blocking(move || {
            path.create_parent_dir_all()?;
            path.write(&bytes)
        })
        .await??;

        Ok(UploadDescriptor {
            generated_name: generated_name.clone(),
            original_name: file.original_name.clone(),
            storage_path: generated_name.clone(),
            size: file.bytes.len() as u64,
            mime_type: file.content_type.clone(),
            checksum,
            owner_id,
            purpose,
            created_at: Utc::now(),
        })
    }

    pub async fn read(&self, storage_path: &str) -> Result<Vec<u8>, UploadError> {
        let path = self.resolve(storage_path)?.unstrict();
        Ok(tokio::fs::read(path).await?)
    }

    pub async fn remove(&self, storage_path: &str) -> Result<(), UploadError> {
        let path = self.resolve(storage_path)?;
        tokio::task::spawn_blocking(move || path.remove_file()).await??;
        Ok(())
    }
}

/// `type/subtype` without parameters, lower-cased
pub fn mime_essence(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

pub fn is_pdf(content_type: &str) -> bool {
    mime_essence(content_type) == "application/pdf"
}

pub fn accepted_type(content_type: &str) -> bool {
    let essence = mime_essence(content_type);
    essence == "application/pdf" || (essence.starts_with("image/") && essence.len() > "image/".len())
}

/// `<unix-millis>-<16 alphanumerics>.<ext>`
pub fn generate_name(original_name: &str, content_type: &str) -> String {
    let suffix = Alphanumeric.sample_string(&mut OsRng, 16);
    format!(
        "{}-{}.{}",
        Utc::now().timestamp_millis(),
        suffix,
        extension_for(original_name, content_type)
    )
}

fn extension_for(original_name: &str, content_type: &str) -> String {
    let from_name = original_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .filter(|ext| !ext.is_empty() && ext.len() <= 8 && ext.chars().all(|c| c.is_ascii_alphanumeric()));
    if let Some(ext) = from_name {
        return ext;
    }

    match mime_essence(content_type).as_str() {
        "application/pdf" => "pdf".to_string(),
        "image/jpeg" => "jpg".to_string(),
        "image/png" => "png".to_string(),
        "image/gif" => "gif".to_string(),
        "image/webp" => "webp".to_string(),
        _ => "bin".to_string(),
    }
}

async fn read_field(mut field: Field<'_>, limit: usize) -> Result<IncomingFile, ApiError> {
    let original_name = field.file_name().unwrap_or("upload").to_string();
    let content_type = field
        .content_type()
        .unwrap_or("application/octet-stream")
        .to_string();

    let mut bytes = Vec::new();
    while let Some(chunk) = field.chunk().await? {
        if bytes.len() + chunk.len() > limit {
            return Err(UploadError::TooLarge { limit }.into());
        }
        bytes.extend_from_slice(&chunk);
    }

    Ok(IncomingFile {
        original_name,
        content_type,
        bytes,
    })
}

/// Drain a multipart body, capping every file part at `limit` bytes
pub async fn read_form(mut multipart: Multipart, limit: usize) -> Result<UploadForm, ApiError> {
    let mut form = UploadForm::default();
    while let Some(field) = multipart.next_field().await? {
        if field.file_name().is_some() {
            form.files.push(read_field(field, limit).await?);
        } else {
            let name = field.name().unwrap_or_default().to_string();
            let value = field.text().await?;
            form.fields.insert(name, value);
        }
    }
    Ok(form)
}

/// Store the file and its descriptor. The file is removed again if the
/// descriptor cannot be recorded.
pub async fn record_upload(
    state: &AppState,
    owner: &Identity,
    file: &IncomingFile,
    purpose: UploadPurpose,
) -> Result<UploadDescriptor, ApiError> {
    let descriptor = match state.uploads.save(file, owner.id(), purpose).await {
        Ok(descriptor) => descriptor,
        Err(err) => {
            warn!(user_id = %owner.id(), mime = %file.content_type, size = file.bytes.len(), "upload rejected: {}", err);
            return Err(err.into());
        }
    };

    match state.store.insert_upload(descriptor.clone()).await {
        Ok(stored) => {
            info!(user_id = %owner.id(), file = %stored.generated_name, size = stored.size, "stored upload");
            Ok(stored)
        }
        Err(err) => {
            if let Err(cleanup) = state.uploads.remove(&descriptor.storage_path).await {
                error!(file = %descriptor.generated_name, "failed to remove orphaned upload: {}", cleanup);
            }
            Err(err.into())
        }
    }
}

pub async fn upload_document(state: &AppState, owner: &Identity, form: UploadForm) -> Result<UploadDescriptor, ApiError> {
    let mut files = form.files.into_iter();
    let file = files.next().ok_or(UploadError::MissingFile)?;
    if files.next().is_some() {
        return Err(ApiError::bad_request("Upload one document per request"));
    }
    record_upload(state, owner, &file, UploadPurpose::Document).await
}

/// Attach one or more requirement PDFs to a visa type
pub async fn upload_requirements(state: &AppState, actor: &Identity, form: UploadForm) -> Result<VisaType, ApiError> {
    let visa_type_id: Uuid = form
        .fields
        .get("visa_type_id")
        .ok_or_else(|| ApiError::field_error("visa_type_id", "visa_type_id is required"))?
        .trim()
        .parse()
        .map_err(|_| ApiError::field_error("visa_type_id", "visa_type_id must be a UUID"))?;

    if state.store.find_visa_type(visa_type_id).await?.is_none() {
        return Err(ApiError::not_found("Visa type not found"));
    }
    if form.files.is_empty() {
        return Err(UploadError::MissingFile.into());
    }
    if let Some(file) = form.files.iter().find(|f| !is_pdf(&f.content_type)) {
        return Err(UploadError::UnsupportedType(file.content_type.clone()).into());
    }
    for file in &form.files {
        state.uploads.check(file)?;
    }

    let mut stored = Vec::with_capacity(form.files.len());
    for file in &form.files {
        match record_upload(state, actor, file, UploadPurpose::Requirement).await {
            Ok(upload) => stored.push(upload),
            Err(err) => {
                discard(state, &stored).await;
                return Err(err);
            }
        }
    }

    let pdfs = stored
        .iter()
        .map(|upload| PdfRef {
            file_name: upload.generated_name.clone(),
            original_name: upload.original_name.clone(),
            uploaded_at: upload.created_at,
        })
        .collect();

    match state.store.append_visa_type_pdfs(visa_type_id, pdfs, actor.id()).await {
        Ok(entry) => {
            info!(actor = %actor.id(), visa_type = %entry.id, files = entry.pdf_files.len(), "attached requirement files");
            Ok(entry)
        }
        Err(err) => {
            discard(state, &stored).await;
            Err(err.into())
        }
    }
}

/// Best-effort removal of uploads that never got attached
async fn discard(state: &AppState, uploads: &[UploadDescriptor]) {
    for upload in uploads {
        if let Err(err) = state.store.delete_upload(&upload.generated_name).await {
            error!(file = %upload.generated_name, "failed to drop descriptor of unattached upload: {}", err);
        }
        if let Err(err) = state.uploads.remove(&upload.storage_path).await {
            error!(file = %upload.generated_name, "failed to remove unattached upload: {}", err);
        }
    }
    if !uploads.is_empty() {
        warn!(count = uploads.len(), "rolled back partially stored requirement upload");
    }
}

/// Descriptor plus file contents, after the access check
pub async fn open(state: &AppState, caller: &Identity, name: &str) -> Result<(UploadDescriptor, Vec<u8>), ApiError> {
    let upload = state
        .store
        .find_upload(name)
        .await?
        .ok_or_else(|| ApiError::not_found("File not found"))?;

    let allowed = match upload.purpose {
        UploadPurpose::Document => upload.owner_id == caller.id() || caller.is_admin(),
        UploadPurpose::Requirement => Access::Subscriber.permits(caller.role()),
    };
    if !allowed {
        warn!(user_id = %caller.id(), file = %name, "download denied");
        return Err(ApiError::forbidden("You do not have access to this file"));
    }

    let bytes = state.uploads.read(&upload.storage_path).await?;
    Ok((upload, bytes))
}

pub async fn delete(state: &AppState, caller: &Identity, name: &str) -> Result<(), ApiError> {
    let upload = state
        .store
        .find_upload(name)
        .await?
        .ok_or_else(|| ApiError::not_found("File not found"))?;

    if upload.owner_id != caller.id() && !caller.is_admin() {
        return Err(ApiError::forbidden("You do not have access to this file"));
    }

    // Descriptor first: the store refuses documents a submitted application still needs
    state.store.delete_upload(name).await?;
    if let Err(err) = state.uploads.remove(&upload.storage_path).await {
        match err {
            UploadError::Storage(ref io) if io.kind() == std::io::ErrorKind::NotFound => {
                warn!(file = %name, "upload already missing on disk");
            }
            other => {
                error!(file = %name, "descriptor dropped but file removal failed");
                return Err(other.into());
            }
        }
    }
    info!(user_id = %caller.id(), file = %name, "deleted upload");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::models::{
        Application, ApplicationContent, ApplicationDocument, ApplicationFilter, Appointment,
        AppointmentFilter, DashboardStats, NewUser, StatusEntry, User, UserChanges, UserFilter,
        VisaTypeQuery,
    };
    use crate::database::{DatabaseError, MemoryStore, Store, StoreResult};
    use crate::services::applications::{self, CreateApplicationRequest, SubmitRequest};
    use crate::services::catalog::{get_requirements, RequirementsView};
    use crate::testing::TestContext;
    use crate::types::{ApplicationStatus, Role, VisaCategory};
    use async_trait::async_trait;
    use chrono::DateTime;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    fn pdf(size: usize) -> IncomingFile {
        IncomingFile {
            original_name: "passport.pdf".to_string(),
            content_type: "application/pdf".to_string(),
            bytes: vec![b'%'; size],
        }
    }

    fn files_under(root: &std::path::Path) -> usize {
        fn walk(dir: &std::path::Path, count: &mut usize) {
            if let Ok(entries) = std::fs::read_dir(dir) {
                for entry in entries.flatten() {
                    let path = entry.path();
                    if path.is_dir() {
                        walk(&path, count);
                    } else {
                        *count += 1;
                    }
                }
            }
        }
        let mut count = 0;
        walk(root, &mut count);
        count
    }

    #[test]
    fn accepts_images_and_pdf_only() {
        assert!(accepted_type("application/pdf"));
        assert!(accepted_type("image/png"));
        assert!(accepted_type("image/jpeg; charset=binary"));
        assert!(!accepted_type("image/"));
        assert!(!accepted_type("text/plain"));
        assert!(!accepted_type("application/zip"));
    }

    #[test]
    fn generated_names_follow_the_pattern() {
        let name = generate_name("scan.PDF", "application/pdf");
        let (millis, rest) = name.split_once('-').unwrap();
        assert!(millis.parse::<i64>().is_ok());
        let (suffix, ext) = rest.split_once('.').unwrap();
        assert_eq!(suffix.len(), 16);
        assert!(suffix.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_eq!(ext, "pdf");

        assert!(generate_name("noext", "image/png").ends_with(".png"));
        assert_ne!(generate_name("a.pdf", "application/pdf"), generate_name("a.pdf", "application/pdf"));
    }

    #[tokio::test]
    async fn oversized_pdf_leaves_nothing_behind() {
        let ctx = TestContext::new().await;
        let (user, _) = ctx.user(Role::NonSubscriber).await;

        let err = record_upload(&ctx.state, &Identity { user }, &pdf(15 * 1024 * 1024), UploadPurpose::Document)
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 413);
        assert_eq!(err.error_code(), "UPLOAD_REJECTED");
        assert_eq!(files_under(ctx.upload_root()), 0);
    }

    #[tokio::test]
    async fn wrong_type_is_rejected() {
        let ctx = TestContext::new().await;
        let (user, _) = ctx.user(Role::NonSubscriber).await;
        let file = IncomingFile {
            original_name: "notes.txt".to_string(),
            content_type: "text/plain".to_string(),
            bytes: b"hello".to_vec(),
        };

        let err = record_upload(&ctx.state, &Identity { user }, &file, UploadPurpose::Document)
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 415);
        assert_eq!(files_under(ctx.upload_root()), 0);
    }

    #[tokio::test]
    async fn documents_are_private_to_owner_and_admin() {
        let ctx = TestContext::new().await;
        let (owner, _) = ctx.user(Role::NonSubscriber).await;
        let (other, _) = ctx.user(Role::Subscriber).await;
        let (admin, _) = ctx.user(Role::Admin).await;
        let owner = Identity { user: owner };

        let stored = record_upload(&ctx.state, &owner, &pdf(1024), UploadPurpose::Document).await.unwrap();
        assert_eq!(stored.size, 1024);
        assert_eq!(stored.checksum.len(), 64);
        assert!(ctx.state.store.find_upload(&stored.generated_name).await.unwrap().is_some());

        let (_, bytes) = open(&ctx.state, &owner, &stored.generated_name).await.unwrap();
        assert_eq!(bytes.len(), 1024);
        assert!(open(&ctx.state, &Identity { user: admin }, &stored.generated_name).await.is_ok());

        let err = open(&ctx.state, &Identity { user: other.clone() }, &stored.generated_name)
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 403);
        let err = delete(&ctx.state, &Identity { user: other }, &stored.generated_name)
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 403);

        delete(&ctx.state, &owner, &stored.generated_name).await.unwrap();
        assert!(ctx.state.store.find_upload(&stored.generated_name).await.unwrap().is_none());
        assert_eq!(files_under(ctx.upload_root()), 0);
    }

    #[tokio::test]
    async fn names_cannot_escape_the_root() {
        let ctx = TestContext::new().await;
        assert!(matches!(
            ctx.state.uploads.read("../../etc/passwd").await,
            Err(UploadError::InvalidName(_))
        ));
    }

    #[tokio::test]
    async fn requirement_pdfs_attach_to_visa_type() {
        let ctx = TestContext::new().await;
        let (admin, _) = ctx.user(Role::Admin).await;
        let (member, _) = ctx.user(Role::NonSubscriber).await;
        let (subscriber, _) = ctx.user(Role::Subscriber).await;
        let admin = Identity { user: admin };
        let visa = ctx.visa_type("Japan", "JP", VisaCategory::Business, vec![]).await;

        let mut form = UploadForm::default();
        form.fields.insert("visa_type_id".to_string(), visa.id.to_string());
        form.files = vec![pdf(2048), pdf(4096)];
        let updated = upload_requirements(&ctx.state, &admin, form).await.unwrap();
        assert_eq!(updated.pdf_files.len(), 2);

        let name = &updated.pdf_files[0].file_name;
        assert!(open(&ctx.state, &Identity { user: subscriber }, name).await.is_ok());
        let err = open(&ctx.state, &Identity { user: member }, name).await.unwrap_err();
        assert_eq!(err.status_code(), 403);
    }

    #[tokio::test]
    async fn requirement_upload_rejects_images() {
        let ctx = TestContext::new().await;
        let (admin, _) = ctx.user(Role::Admin).await;
        let visa = ctx.visa_type("Japan", "JP", VisaCategory::Business, vec![]).await;

        let mut form = UploadForm::default();
        form.fields.insert("visa_type_id".to_string(), visa.id.to_string());
        form.files = vec![IncomingFile {
            original_name: "photo.png".to_string(),
            content_type: "image/png".to_string(),
            bytes: vec![1; 16],
        }];
        let err = upload_requirements(&ctx.state, &Identity { user: admin }, form).await.unwrap_err();
        assert_eq!(err.status_code(), 415);
        assert_eq!(files_under(ctx.upload_root()), 0);
    }

    #[test]
    fn pdf_check_ignores_case_and_parameters() {
        assert_eq!(mime_essence("Application/PDF; name=x"), "application/pdf");
        assert!(is_pdf("Application/PDF"));
        assert!(!is_pdf("application/pdfx"));
        assert!(accepted_type("IMAGE/PNG"));
    }

    #[tokio::test]
    async fn requirement_upload_accepts_mixed_case_pdf_type() {
        let ctx = TestContext::new().await;
        let (admin, _) = ctx.user(Role::Admin).await;
        let visa = ctx.visa_type("Japan", "JP", VisaCategory::Business, vec![]).await;

        let mut form = UploadForm::default();
        form.fields.insert("visa_type_id".to_string(), visa.id.to_string());
        form.files = vec![IncomingFile {
            content_type: "Application/PDF".to_string(),
            ..pdf(512)
        }];
        let updated = upload_requirements(&ctx.state, &Identity { user: admin }, form).await.unwrap();
        assert_eq!(updated.pdf_files.len(), 1);
    }

    #[tokio::test]
    async fn deleting_a_requirement_pdf_detaches_it() {
        let ctx = TestContext::new().await;
        let (admin, _) = ctx.user(Role::Admin).await;
        let (subscriber, _) = ctx.user(Role::Subscriber).await;
        let admin = Identity { user: admin };
        let visa = ctx.visa_type("Japan", "JP", VisaCategory::Business, vec![]).await;

        let mut form = UploadForm::default();
        form.fields.insert("visa_type_id".to_string(), visa.id.to_string());
        form.files = vec![pdf(1024), pdf(2048)];
        let updated = upload_requirements(&ctx.state, &admin, form).await.unwrap();
        let gone = updated.pdf_files[0].file_name.clone();
        let kept = updated.pdf_files[1].file_name.clone();

        delete(&ctx.state, &admin, &gone).await.unwrap();

        let view = get_requirements(&ctx.state, visa.id, Role::Subscriber).await.unwrap();
        let RequirementsView::Detailed(view) = view else {
            panic!("subscriber should get the detailed tier");
        };
        let advertised: Vec<&str> = view.pdf_files.iter().map(|p| p.file_name.as_str()).collect();
        assert_eq!(advertised, vec![kept.as_str()]);

        let subscriber = Identity { user: subscriber };
        assert!(open(&ctx.state, &subscriber, &kept).await.is_ok());
        assert_eq!(files_under(ctx.upload_root()), 1);
    }

    #[tokio::test]
    async fn documents_of_submitted_applications_cannot_be_deleted() {
        let ctx = TestContext::new().await;
        let (owner, _) = ctx.user(Role::NonSubscriber).await;
        let owner = Identity { user: owner };
        let visa = ctx.visa_type("France", "FR", VisaCategory::Tourism, vec![]).await;

        let passport = record_upload(&ctx.state, &owner, &pdf(1024), UploadPurpose::Document).await.unwrap();
        let spare = record_upload(&ctx.state, &owner, &pdf(1024), UploadPurpose::Document).await.unwrap();

        let mut req = create_request(visa.id);
        req.documents = vec![ApplicationDocument {
            document_type: "passport".to_string(),
            file_name: passport.generated_name.clone(),
        }];
        req.submit = true;
        applications::create(&ctx.state, &owner, req).await.unwrap();

        let err = delete(&ctx.state, &owner, &passport.generated_name).await.unwrap_err();
        assert_eq!(err.status_code(), 409);
        assert!(ctx.state.store.find_upload(&passport.generated_name).await.unwrap().is_some());
        assert!(open(&ctx.state, &owner, &passport.generated_name).await.is_ok());

        delete(&ctx.state, &owner, &spare.generated_name).await.unwrap();
    }

    #[tokio::test]
    async fn draft_documents_can_be_deleted_but_then_block_submission() {
        let ctx = TestContext::new().await;
        let (owner, _) = ctx.user(Role::NonSubscriber).await;
        let owner = Identity { user: owner };
        let visa = ctx.visa_type("France", "FR", VisaCategory::Tourism, vec![]).await;

        let passport = record_upload(&ctx.state, &owner, &pdf(1024), UploadPurpose::Document).await.unwrap();
        let mut req = create_request(visa.id);
        req.documents = vec![ApplicationDocument {
            document_type: "passport".to_string(),
            file_name: passport.generated_name.clone(),
        }];
        let draft = applications::create(&ctx.state, &owner, req).await.unwrap();
        assert_eq!(draft.status, ApplicationStatus::Draft);

        delete(&ctx.state, &owner, &passport.generated_name).await.unwrap();
        assert_eq!(files_under(ctx.upload_root()), 0);

        let err = applications::submit(&ctx.state, &owner, draft.id, SubmitRequest::default())
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 400);
    }

    #[tokio::test]
    async fn failed_requirement_batch_leaves_nothing_behind() {
        let store = Arc::new(RefusesSecondUpload::default());
        let ctx = TestContext::with_store(store.clone());
        let (admin, _) = ctx.user(Role::Admin).await;
        let visa = ctx.visa_type("Japan", "JP", VisaCategory::Business, vec![]).await;

        let mut form = UploadForm::default();
        form.fields.insert("visa_type_id".to_string(), visa.id.to_string());
        form.files = vec![pdf(1024), pdf(2048), pdf(4096)];
        assert!(upload_requirements(&ctx.state, &Identity { user: admin }, form).await.is_err());

        assert_eq!(files_under(ctx.upload_root()), 0);
        let recorded = store.recorded.lock().unwrap().clone();
        assert_eq!(recorded.len(), 1);
        for name in recorded {
            assert!(store.inner.find_upload(&name).await.unwrap().is_none());
        }
        let visa = ctx.state.store.find_visa_type(visa.id).await.unwrap().unwrap();
        assert!(visa.pdf_files.is_empty());
    }

    fn create_request(visa_type_id: Uuid) -> CreateApplicationRequest {
        serde_json::from_value(serde_json::json!({
            "visa_type_id": visa_type_id,
            "personal_info": {
                "first_name": "Alice",
                "last_name": "Martin",
                "date_of_birth": "1990-04-12",
                "nationality": "Canadian",
                "passport_number": "AB123456",
                "passport_expiry": "2031-01-01",
                "email": "alice@example.com"
            },
            "travel_info": {
                "purpose": "Holiday",
                "arrival_date": "2027-06-01",
                "departure_date": "2027-06-20"
            }
        }))
        .unwrap()
    }

    /// Memory store whose second descriptor insert fails
    #[derive(Default)]
    struct RefusesSecondUpload {
        inner: MemoryStore,
        inserts: AtomicUsize,
        recorded: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Store for RefusesSecondUpload {
        async fn ping(&self) -> StoreResult<()> {
            self.inner.ping().await
        }
        async fn close(&self) {
            self.inner.close().await
        }
        async fn insert_user(&self, user: NewUser) -> StoreResult<User> {
            self.inner.insert_user(user).await
        }
        async fn find_user(&self, id: Uuid) -> StoreResult<Option<User>> {
            self.inner.find_user(id).await
        }
        async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
            self.inner.find_user_by_email(email).await
        }
        async fn list_users(&self, filter: &UserFilter) -> StoreResult<Vec<User>> {
            self.inner.list_users(filter).await
        }
        async fn update_user(&self, id: Uuid, changes: UserChanges) -> StoreResult<User> {
            self.inner.update_user(id, changes).await
        }
        async fn insert_visa_type(&self, entry: VisaType) -> StoreResult<VisaType> {
            self.inner.insert_visa_type(entry).await
        }
        async fn replace_visa_type(&self, entry: VisaType) -> StoreResult<VisaType> {
            self.inner.replace_visa_type(entry).await
        }
        async fn append_visa_type_pdfs(&self, id: Uuid, pdfs: Vec<PdfRef>, actor: Uuid) -> StoreResult<VisaType> {
            self.inner.append_visa_type_pdfs(id, pdfs, actor).await
        }
        async fn find_visa_type(&self, id: Uuid) -> StoreResult<Option<VisaType>> {
            self.inner.find_visa_type(id).await
        }
        async fn list_visa_types(&self, query: &VisaTypeQuery) -> StoreResult<Vec<VisaType>> {
            self.inner.list_visa_types(query).await
        }
        async fn next_application_sequence(&self, year: i32) -> StoreResult<u64> {
            self.inner.next_application_sequence(year).await
        }
        async fn insert_application(&self, application: Application) -> StoreResult<Application> {
            self.inner.insert_application(application).await
        }
        async fn find_application(&self, id: Uuid) -> StoreResult<Option<Application>> {
            self.inner.find_application(id).await
        }
        async fn list_applications(&self, filter: &ApplicationFilter) -> StoreResult<Vec<Application>> {
            self.inner.list_applications(filter).await
        }
        async fn update_application_content(
            &self,
            id: Uuid,
            content: ApplicationContent,
            expected: ApplicationStatus,
        ) -> StoreResult<Application> {
            self.inner.update_application_content(id, content, expected).await
        }
        async fn append_status(
            &self,
            id: Uuid,
            entry: StatusEntry,
            expected: Option<ApplicationStatus>,
        ) -> StoreResult<Application> {
            self.inner.append_status(id, entry, expected).await
        }
        async fn insert_upload(&self, upload: UploadDescriptor) -> StoreResult<UploadDescriptor> {
            if self.inserts.fetch_add(1, Ordering::SeqCst) == 1 {
                return Err(DatabaseError::QueryError("insert refused".to_string()));
            }
            self.recorded.lock().unwrap().push(upload.generated_name.clone());
            self.inner.insert_upload(upload).await
        }
        async fn find_upload(&self, generated_name: &str) -> StoreResult<Option<UploadDescriptor>> {
            self.inner.find_upload(generated_name).await
        }
        async fn delete_upload(&self, generated_name: &str) -> StoreResult<bool> {
            self.inner.delete_upload(generated_name).await
        }
        async fn insert_appointment(&self, appointment: Appointment) -> StoreResult<Appointment> {
            self.inner.insert_appointment(appointment).await
        }
        async fn list_appointments(&self, filter: &AppointmentFilter) -> StoreResult<Vec<Appointment>> {
            self.inner.list_appointments(filter).await
        }
        async fn dashboard_stats(&self, now: DateTime<Utc>) -> StoreResult<DashboardStats> {
            self.inner.dashboard_stats(now).await
        }
    }
}
