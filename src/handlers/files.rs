use axum::{
    extract::{Multipart, Query, State},
    http::StatusCode,
    response::Json,
};
use serde::Deserialize;
use std::time::Duration;
use uuid::Uuid;

use crate::{
    auth::Principal,
    database::queries::FileQueries,
    errors::{AppError, Result},
    guard, identity,
    handlers::AppState,
    models::{DownloadUrlResponse, FileRecord, UploadResponse, User},
};

#[derive(Debug, Deserialize)]
pub struct FileIdParams {
    pub id: Option<String>,
}

/// Storage keys are namespaced by owner and prefixed with a millisecond
/// timestamp so concurrent uploads of the same filename never collide.
fn object_key(owner_email: &str, file_name: &str) -> String {
    let folder: String = owner_email
        .chars()
        .map(|c| if c == '@' || c == '.' { '_' } else { c })
        .collect();
    format!("{}/{}-{}", folder, chrono::Utc::now().timestamp_millis(), file_name)
}

fn parse_file_id(params: &FileIdParams) -> Result<Uuid> {
    let id = params
        .id
        .as_deref()
        .ok_or_else(|| AppError::Validation("Missing file ID".to_string()))?;
    Uuid::parse_str(id).map_err(|_| AppError::Validation("Invalid file ID".to_string()))
}

/// Resolves the local user for read paths. Unlike upload/register this does
/// not upsert: a session without a synced row is a 404, not a new account.
async fn local_user(state: &AppState, principal: &Principal) -> Result<User> {
    crate::database::queries::UserQueries::find_by_clerk_id(
        state.database.pool(),
        &principal.clerk_id,
    )
    .await?
    .ok_or(AppError::NotFound)
}

pub async fn upload(
    State(state): State<AppState>,
    principal: Principal,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>> {
    let user = identity::sync_user(state.database.pool(), &principal).await?;

    let mut uploaded: Option<(String, Option<String>, Vec<u8>)> = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|_| AppError::Validation("Malformed multipart body".to_string()))?
    {
        if field.name() == Some("file") {
            let file_name = field.file_name().unwrap_or("upload").to_string();
            let content_type = field.content_type().map(str::to_string);
            let data = field
                .bytes()
                .await
                .map_err(|_| AppError::Validation("Malformed multipart body".to_string()))?;
            uploaded = Some((file_name, content_type, data.to_vec()));
        }
    }

    let (file_name, content_type, data) =
        uploaded.ok_or_else(|| AppError::Validation("No file uploaded".to_string()))?;
    let size = data.len() as i64;
    let s3_key = object_key(&user.email, &file_name);

    // Bytes first, metadata second. A catalog row must never exist without
    // its object, so a failed insert triggers a compensating delete and at
    // worst leaves an orphaned object rather than a dangling record.
    state
        .storage
        .put_object(&s3_key, data, content_type.as_deref())
        .await?;

    let file = match FileQueries::create(
        state.database.pool(),
        &file_name,
        user.id,
        size,
        content_type.as_deref(),
        &s3_key,
    )
    .await
    {
        Ok(file) => file,
        Err(e) => {
            if let Err(cleanup) = state.storage.delete_object(&s3_key).await {
                tracing::error!(
                    key = %s3_key,
                    error = %cleanup,
                    "Compensating delete failed; object orphaned in storage"
                );
            }
            return Err(e);
        }
    };

    tracing::info!(file_id = %file.id, owner = %user.id, size_bytes = size, "File uploaded");
    Ok(Json(UploadResponse {
        success: true,
        file,
    }))
}

pub async fn list(
    State(state): State<AppState>,
    principal: Principal,
) -> Result<Json<Vec<FileRecord>>> {
    let user = local_user(&state, &principal).await?;
    let files = FileQueries::list_by_owner(state.database.pool(), user.id).await?;
    Ok(Json(files))
}

pub async fn download(
    Query(params): Query<FileIdParams>,
    State(state): State<AppState>,
    principal: Principal,
) -> Result<Json<DownloadUrlResponse>> {
    let file_id = parse_file_id(&params)?;
    let user = local_user(&state, &principal).await?;
    let file = guard::authorize(state.database.pool(), user.id, file_id).await?;

    let url = state
        .storage
        .issue_retrieval_url(
            &file.s3_key,
            Duration::from_secs(state.config.download_url_ttl_secs),
        )
        .await?;

    Ok(Json(DownloadUrlResponse { url }))
}

pub async fn delete(
    Query(params): Query<FileIdParams>,
    State(state): State<AppState>,
    principal: Principal,
) -> Result<(StatusCode, &'static str)> {
    let file_id = parse_file_id(&params)?;
    let user = local_user(&state, &principal).await?;
    let file = guard::authorize(state.database.pool(), user.id, file_id).await?;

    // Storage first: if this fails the metadata stays, pointing at an object
    // that still exists. The reverse order could leave a record with no bytes.
    state.storage.delete_object(&file.s3_key).await?;

    let removed = FileQueries::delete_by_id(state.database.pool(), file.id).await?;
    if !removed {
        // Lost the race with a concurrent delete of the same file.
        return Err(AppError::NotFound);
    }

    tracing::info!(file_id = %file.id, owner = %user.id, "File deleted");
    Ok((StatusCode::OK, "File deleted successfully"))
}
