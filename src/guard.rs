//! File Access Guard: the single ownership check in front of every
//! file-touching operation. A file that does not exist and a file owned by
//! someone else produce the same NotFound, so callers cannot probe for the
//! existence of other users' files.

use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    database::queries::FileQueries,
    errors::{AppError, Result},
    models::FileRecord,
};

/// Fetches the file and verifies ownership. Mandatory before reading bytes,
/// issuing a retrieval URL, or deleting metadata.
pub async fn authorize(pool: &PgPool, local_user_id: Uuid, file_id: Uuid) -> Result<FileRecord> {
    let file = FileQueries::find_by_id(pool, file_id)
        .await?
        .ok_or(AppError::NotFound)?;

    if file.owner_id != local_user_id {
        tracing::debug!(
            file_id = %file_id,
            requester = %local_user_id,
            "Ownership check failed"
        );
        return Err(AppError::NotFound);
    }

    Ok(file)
}
