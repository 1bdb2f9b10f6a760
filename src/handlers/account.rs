use axum::{extract::State, response::Json};

use crate::{
    auth::Principal, errors::Result, handlers::AppState, identity, models::RegisterResponse,
};

/// Synchronizes the authenticated identity into the local user table and
/// returns the local id. Safe to call repeatedly; the upsert is idempotent.
pub async fn register(
    State(state): State<AppState>,
    principal: Principal,
) -> Result<Json<RegisterResponse>> {
    let user = identity::sync_user(state.database.pool(), &principal).await?;

    Ok(Json(RegisterResponse {
        success: true,
        db_user_id: user.id,
        clerk_id: user.clerk_id,
    }))
}
