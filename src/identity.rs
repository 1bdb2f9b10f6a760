//! Identity Sync: reconciles an externally authenticated principal into the
//! local user table. This is the only code path that writes user rows; the
//! interactive handlers and the webhook both go through it, so the two
//! arrival paths converge to the same stored state.

use sqlx::PgPool;

use crate::{
    auth::Principal,
    database::queries::UserQueries,
    errors::{AppError, Result},
    models::User,
};

/// Create-or-update keyed on the identity key. Idempotent: repeating the call
/// with an unchanged principal leaves the row unchanged in effect, and
/// out-of-order deliveries settle on the most recently applied snapshot.
pub async fn sync_user(pool: &PgPool, principal: &Principal) -> Result<User> {
    let email = principal
        .primary_email()
        .ok_or_else(|| AppError::Validation("Missing primary email".to_string()))?;

    let name = principal.display_name();

    let user = UserQueries::upsert_by_clerk_id(pool, &principal.clerk_id, email, name.as_deref())
        .await?;

    tracing::debug!(clerk_id = %user.clerk_id, user_id = %user.id, "User synced with database");
    Ok(user)
}
