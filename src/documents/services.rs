use bytes::Bytes;
use tracing::{info, warn};
use uuid::Uuid;

use crate::audit;
use crate::auth::repo as users_repo;
use crate::auth::repo_types::User;
use crate::documents::dto::ShareRequest;
use crate::documents::repo;
use crate::documents::repo_types::{Document, Share};
use crate::error::AppError;
use crate::state::AppState;
use crate::storage::{is_allowed_content_type, upload_key, MAX_UPLOAD_BYTES};

/// Presigned download links handed out to recipients stay valid this long.
const DOWNLOAD_LINK_SECONDS: u64 = 24 * 60 * 60;

pub struct UploadRequest {
    pub title: String,
    pub description: Option<String>,
    pub document_type: Option<String>,
    pub file_name: String,
    pub content_type: String,
    pub body: Bytes,
}

/// Validate the upload, store the object, persist the metadata row, and
/// leave an audit trail entry.
pub async fn upload_document(
    state: &AppState,
    user: &User,
    req: UploadRequest,
) -> Result<Document, AppError> {
    if req.title.trim().is_empty() {
        return Err(AppError::Validation("Title is required".into()));
    }
    if !is_allowed_content_type(&req.content_type) {
        return Err(AppError::Validation(
            "Invalid file type. Only PDF, JPEG, PNG, and Word documents are allowed".into(),
        ));
    }
    if req.body.len() > MAX_UPLOAD_BYTES {
        return Err(AppError::Validation("File exceeds the 10 MB limit".into()));
    }
    if req.body.is_empty() {
        return Err(AppError::Validation("Uploaded file is empty".into()));
    }

    let key = upload_key(&req.file_name);
    state
        .storage
        .put_object(&key, req.body, &req.content_type)
        .await
        .map_err(|e| AppError::ExternalService(format!("File storage failed: {e}")))?;

    let doc = repo::insert(
        &state.db,
        user.id,
        req.title.trim(),
        req.description.as_deref(),
        &key,
        req.document_type.as_deref(),
    )
    .await?;

    audit::record(
        &state.db,
        user.id,
        Some(doc.id),
        "upload",
        Some(&format!("Uploaded {}", doc.title)),
    )
    .await?;

    info!(user_id = %user.id, document_id = %doc.id, "document uploaded");
    Ok(doc)
}

/// Persist a share grant and notify the recipient.
///
/// The share row and its audit entry commit atomically. The notification goes
/// out after the commit; a delivery failure is surfaced to the caller but the
/// committed share is kept.
pub async fn share_document(
    state: &AppState,
    user: &User,
    req: ShareRequest,
) -> Result<Share, AppError> {
    if req.permissions.is_empty() {
        return Err(AppError::Validation(
            "At least one permission is required".into(),
        ));
    }
    if let Some(expiry) = req.expiry_date {
        if expiry <= time::OffsetDateTime::now_utc() {
            return Err(AppError::Validation("Expiry date is in the past".into()));
        }
    }

    let doc = repo::find_by_id_and_owner(&state.db, req.document_id, user.id)
        .await?
        .ok_or_else(|| AppError::NotFound("Document not found".into()))?;

    let recipient_email = req.shared_with.trim().to_lowercase();
    let recipient = users_repo::find_by_email(&state.db, &recipient_email)
        .await?
        .ok_or_else(|| AppError::NotFound("User with this email not found".into()))?;

    let mut tx = state.db.begin().await.map_err(anyhow::Error::from)?;
    let share = repo::insert_share(
        &mut *tx,
        doc.id,
        user.id,
        recipient.id,
        &req.permissions,
        req.expiry_date,
    )
    .await?;
    audit::record(
        &mut *tx,
        user.id,
        Some(doc.id),
        "share",
        Some(&format!("Shared {} with {}", doc.title, recipient.email)),
    )
    .await?;
    tx.commit().await.map_err(anyhow::Error::from)?;

    info!(
        share_id = %share.id,
        document_id = %doc.id,
        recipient_id = %recipient.id,
        "document shared"
    );

    let download_url = state
        .storage
        .presign_get(&doc.storage_key, DOWNLOAD_LINK_SECONDS)
        .await
        .map_err(|e| AppError::ExternalService(format!("Sharing saved but link failed: {e}")))?;

    if let Err(e) = state
        .mailer
        .send_share_notification(
            &user.name,
            &recipient.email,
            &doc.title,
            &req.permissions,
            &download_url,
        )
        .await
    {
        warn!(error = %e, share_id = %share.id, "share notification failed");
        return Err(AppError::ExternalService(
            "Sharing saved but the notification email failed".into(),
        ));
    }

    Ok(share)
}

/// Delete a document the user owns. Shares, audit rows, and the metadata row
/// go in one transaction; object deletion afterwards is best-effort.
pub async fn delete_document(
    state: &AppState,
    user: &User,
    document_id: Uuid,
) -> Result<(), AppError> {
    let doc = repo::find_by_id_and_owner(&state.db, document_id, user.id)
        .await?
        .ok_or_else(|| AppError::NotFound("Document not found".into()))?;

    let mut tx = state.db.begin().await.map_err(anyhow::Error::from)?;
    repo::delete_shares_for_document(&mut *tx, doc.id).await?;
    audit::delete_for_document(&mut *tx, doc.id).await?;
    repo::delete_by_id(&mut *tx, doc.id).await?;
    // The document row is gone, so this entry carries the title only.
    audit::record(
        &mut *tx,
        user.id,
        None,
        "delete",
        Some(&format!("Deleted {}", doc.title)),
    )
    .await?;
    tx.commit().await.map_err(anyhow::Error::from)?;

    if let Err(e) = state.storage.delete_object(&doc.storage_key).await {
        warn!(error = %e, key = %doc.storage_key, "stored object deletion failed");
    }

    info!(user_id = %user.id, document_id = %doc.id, "document deleted");
    Ok(())
}

/// Presigned URL for a document the user can access (owner or active share).
pub async fn download_url(
    state: &AppState,
    user: &User,
    document_id: Uuid,
) -> Result<String, AppError> {
    let doc = repo::find_accessible(&state.db, document_id, user.id)
        .await?
        .ok_or_else(|| AppError::NotFound("Document not found".into()))?;

    let url = state
        .storage
        .presign_get(&doc.storage_key, 600)
        .await
        .map_err(|e| AppError::ExternalService(format!("Presign failed: {e}")))?;

    audit::record(
        &state.db,
        user.id,
        Some(doc.id),
        "download",
        None,
    )
    .await?;
    Ok(url)
}
