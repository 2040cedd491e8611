use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::StatusCode,
    response::{IntoResponse, Redirect},
    routing::{delete, get, post},
    Json, Router,
};
use serde_json::json;
use tracing::instrument;
use uuid::Uuid;

use crate::{
    auth::services::CurrentUser,
    documents::{
        dto::{DashboardResponse, ShareListResponse, ShareRequest, ShareResponse, SharedViewResponse},
        repo,
        services::{self, UploadRequest},
    },
    error::AppError,
    state::AppState,
    storage::MAX_UPLOAD_BYTES,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(dashboard))
        .route("/share", post(share))
        .route("/share/:id", get(share_list))
        .route("/shared/:share_id", get(shared_view))
        .route("/:id/download", get(download))
        .route("/:id", delete(delete_document))
        .merge(
            Router::new()
                .route("/upload", post(upload))
                // Multipart overhead on top of the 10 MB file cap.
                .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES + 1024 * 1024)),
        )
}

#[instrument(skip(state, user), fields(user_id = %user.0.id))]
pub async fn dashboard(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Json<DashboardResponse>, AppError> {
    let owned = repo::list_by_owner(&state.db, user.0.id).await?;
    let shared_with_me = repo::list_shared_with(&state.db, user.0.id).await?;
    Ok(Json(DashboardResponse {
        owned,
        shared_with_me,
    }))
}

#[instrument(skip(state, user, mp), fields(user_id = %user.0.id))]
pub async fn upload(
    State(state): State<AppState>,
    user: CurrentUser,
    mut mp: Multipart,
) -> Result<impl IntoResponse, AppError> {
    let mut title = String::new();
    let mut description: Option<String> = None;
    let mut document_type: Option<String> = None;
    let mut file: Option<(String, String, bytes::Bytes)> = None;

    loop {
        // Stream errors (bad boundary, truncated body) must surface, not
        // end the loop as if the form were complete.
        let field = match mp.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => return Err(AppError::Validation(format!("Malformed upload: {e}"))),
        };
        let name = field.name().map(|s| s.to_string()).unwrap_or_default();
        match name.as_str() {
            "title" => {
                title = field
                    .text()
                    .await
                    .map_err(|_| AppError::Validation("Malformed form field".into()))?;
            }
            "description" => {
                description = Some(
                    field
                        .text()
                        .await
                        .map_err(|_| AppError::Validation("Malformed form field".into()))?,
                );
            }
            "document_type" => {
                document_type = Some(
                    field
                        .text()
                        .await
                        .map_err(|_| AppError::Validation("Malformed form field".into()))?,
                );
            }
            "document" => {
                let file_name = field
                    .file_name()
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| "document".into());
                let content_type = field
                    .content_type()
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| "application/octet-stream".into());
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::Validation(format!("Could not read uploaded file: {e}")))?;
                file = Some((file_name, content_type, data));
            }
            _ => {}
        }
    }

    let (file_name, content_type, body) = file.ok_or_else(|| {
        AppError::Validation("No file uploaded. Please select a file to upload".into())
    })?;

    let doc = services::upload_document(
        &state,
        &user.0,
        UploadRequest {
            title,
            description,
            document_type,
            file_name,
            content_type,
            body,
        },
    )
    .await?;

    Ok((StatusCode::CREATED, Json(doc)))
}

#[instrument(skip(state, user, payload), fields(user_id = %user.0.id))]
pub async fn share(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(payload): Json<ShareRequest>,
) -> Result<impl IntoResponse, AppError> {
    let share = services::share_document(&state, &user.0, payload).await?;
    Ok((StatusCode::CREATED, Json(ShareResponse { share })))
}

#[instrument(skip(state, user), fields(user_id = %user.0.id))]
pub async fn share_list(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ShareListResponse>, AppError> {
    let document = repo::find_by_id_and_owner(&state.db, id, user.0.id)
        .await?
        .ok_or_else(|| AppError::NotFound("Document not found".into()))?;
    let shares = repo::shares_for_document(&state.db, document.id).await?;
    Ok(Json(ShareListResponse { document, shares }))
}

#[instrument(skip(state, user), fields(user_id = %user.0.id))]
pub async fn shared_view(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(share_id): Path<Uuid>,
) -> Result<Json<SharedViewResponse>, AppError> {
    let document = repo::find_active_share(&state.db, share_id, user.0.id)
        .await?
        .ok_or_else(|| AppError::Forbidden("Access denied or share expired".into()))?;

    let download_url = state
        .storage
        .presign_get(&document.storage_key, 600)
        .await
        .map_err(|e| AppError::ExternalService(format!("Presign failed: {e}")))?;

    crate::audit::record(&state.db, user.0.id, Some(document.id), "view", None).await?;

    Ok(Json(SharedViewResponse {
        document,
        download_url,
    }))
}

#[instrument(skip(state, user), fields(user_id = %user.0.id))]
pub async fn download(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let url = services::download_url(&state, &user.0, id).await?;
    Ok(Redirect::temporary(&url))
}

#[instrument(skip(state, user), fields(user_id = %user.0.id))]
pub async fn delete_document(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    services::delete_document(&state, &user.0, id).await?;
    Ok(Json(json!({ "message": "Document deleted" })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::extract::FromRequest;
    use axum::http::Request;
    use crate::auth::repo_types::User;

    fn test_user() -> User {
        User {
            id: Uuid::new_v4(),
            name: "Alice".into(),
            email: "alice@x.com".into(),
            password_hash: "hash".into(),
            identity_number: "123456789012".into(),
            created_at: time::OffsetDateTime::now_utc(),
        }
    }

    async fn multipart_from(body: &'static str) -> Multipart {
        let req = Request::builder()
            .header(
                "content-type",
                "multipart/form-data; boundary=XBOUNDARY",
            )
            .body(Body::from(body))
            .unwrap();
        Multipart::from_request(req, &()).await.unwrap()
    }

    #[tokio::test]
    async fn upload_surfaces_malformed_multipart() {
        // No closing boundary: the stream ends mid-field.
        let mp = multipart_from(
            "--XBOUNDARY\r\n\
             Content-Disposition: form-data; name=\"document\"; filename=\"a.pdf\"\r\n\
             Content-Type: application/pdf\r\n\r\n\
             partial",
        )
        .await;

        let result = upload(State(AppState::fake()), CurrentUser(test_user()), mp).await;
        match result {
            Err(AppError::Validation(msg)) => {
                // A broken stream is its own error, not "no file".
                assert_ne!(msg, "No file uploaded. Please select a file to upload");
            }
            Err(e) => panic!("expected validation error, got {e}"),
            Ok(_) => panic!("malformed multipart accepted"),
        }
    }

    #[tokio::test]
    async fn upload_without_file_reports_missing_file() {
        let mp = multipart_from(
            "--XBOUNDARY\r\n\
             Content-Disposition: form-data; name=\"title\"\r\n\r\n\
             My doc\r\n\
             --XBOUNDARY--\r\n",
        )
        .await;

        let result = upload(State(AppState::fake()), CurrentUser(test_user()), mp).await;
        match result {
            Err(AppError::Validation(msg)) => {
                assert_eq!(msg, "No file uploaded. Please select a file to upload");
            }
            Err(e) => panic!("expected validation error, got {e}"),
            Ok(_) => panic!("upload without a file accepted"),
        }
    }
}
