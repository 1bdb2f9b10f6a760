use sqlx::PgPool;
use uuid::Uuid;

use crate::errors::Result;
use crate::models::{FileRecord, User};

pub struct UserQueries;

impl UserQueries {
    /// Create-or-update keyed on the external identity. Last write wins on
    /// email and name, so interleaved webhook and interactive-login syncs
    /// converge regardless of arrival order.
    pub async fn upsert_by_clerk_id(
        pool: &PgPool,
        clerk_id: &str,
        email: &str,
        name: Option<&str>,
    ) -> Result<User> {
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (clerk_id, email, name)
            VALUES ($1, $2, $3)
            ON CONFLICT (clerk_id) DO UPDATE
                SET email = EXCLUDED.email,
                    name = EXCLUDED.name,
                    updated_at = NOW()
            RETURNING id, clerk_id, email, name, created_at, updated_at
            "#,
        )
        .bind(clerk_id)
        .bind(email)
        .bind(name)
        .fetch_one(pool)
        .await?;

        Ok(user)
    }

    pub async fn find_by_clerk_id(pool: &PgPool, clerk_id: &str) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, clerk_id, email, name, created_at, updated_at FROM users WHERE clerk_id = $1",
        )
        .bind(clerk_id)
        .fetch_optional(pool)
        .await?;

        Ok(user)
    }
}

pub struct FileQueries;

impl FileQueries {
    /// Called only after the corresponding object is confirmed written to
    /// storage; id, version and timestamp are assigned here.
    pub async fn create(
        pool: &PgPool,
        name: &str,
        owner_id: Uuid,
        size: i64,
        mime_type: Option<&str>,
        s3_key: &str,
    ) -> Result<FileRecord> {
        let file = sqlx::query_as::<_, FileRecord>(
            r#"
            INSERT INTO files (name, owner_id, size, mime_type, s3_key)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, name, owner_id, size, mime_type, s3_key, version, created_at
            "#,
        )
        .bind(name)
        .bind(owner_id)
        .bind(size)
        .bind(mime_type)
        .bind(s3_key)
        .fetch_one(pool)
        .await?;

        Ok(file)
    }

    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<FileRecord>> {
        let file = sqlx::query_as::<_, FileRecord>(
            r#"
            SELECT id, name, owner_id, size, mime_type, s3_key, version, created_at
            FROM files
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await?;

        Ok(file)
    }

    pub async fn list_by_owner(pool: &PgPool, owner_id: Uuid) -> Result<Vec<FileRecord>> {
        let files = sqlx::query_as::<_, FileRecord>(
            r#"
            SELECT id, name, owner_id, size, mime_type, s3_key, version, created_at
            FROM files
            WHERE owner_id = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(owner_id)
        .fetch_all(pool)
        .await?;

        Ok(files)
    }

    /// Returns false when no row was removed, so a second delete of the same
    /// file surfaces as NotFound rather than an error.
    pub async fn delete_by_id(pool: &PgPool, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM files WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
