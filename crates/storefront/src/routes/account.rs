//! Account self-service route handlers.
//!
//! These routes require authentication.

use axum::extract::State;
use tower_sessions::Session;
use tracing::instrument;

use crate::error::{ApiJson, ApiResponse, Result};
use crate::middleware::{RequireAuth, set_current_user};
use crate::models::{CurrentUser, User};
use crate::services::AuthService;
use crate::services::auth::{PasswordChange, ProfileUpdate};
use crate::state::AppState;

/// GET /api/account
#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn show(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<ApiResponse<User>> {
    let user = AuthService::new(state.pool()).get_user(user.id).await?;
    Ok(ApiResponse::ok(user))
}

/// Update name and/or email.
///
/// PATCH /api/account
#[instrument(skip(state, session, user, body), fields(user_id = %user.id))]
pub async fn update(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(user): RequireAuth,
    ApiJson(body): ApiJson<ProfileUpdate>,
) -> Result<ApiResponse<User>> {
    let updated = AuthService::new(state.pool())
        .update_profile(user.id, &body)
        .await?;
    // Keep the session copy in step with the new name.
    set_current_user(&session, &CurrentUser::from(&updated)).await?;
    Ok(ApiResponse::ok(updated))
}

/// POST /api/account/password
#[instrument(skip(state, session, user, body), fields(user_id = %user.id))]
pub async fn change_password(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(user): RequireAuth,
    ApiJson(body): ApiJson<PasswordChange>,
) -> Result<ApiResponse<()>> {
    AuthService::new(state.pool())
        .change_password(user.id, &body)
        .await?;
    session.cycle_id().await?;
    Ok(ApiResponse::ok(()))
}
