//! Authentication route handlers.
//!
//! Phone + password login backed by a session cookie. The session ID is
//! cycled whenever the logged-in user changes.

use axum::{extract::State, http::StatusCode};
use tower_sessions::Session;
use tracing::instrument;

use crate::error::{ApiJson, ApiResponse, Result, clear_sentry_user, set_sentry_user};
use crate::middleware::{RequireAuth, clear_current_user, set_current_user};
use crate::models::{CurrentUser, User};
use crate::services::AuthService;
use crate::services::auth::{Credentials, Registration};
use crate::state::AppState;

/// Start an authenticated session for `user`.
async fn start_session(session: &Session, user: &User) -> Result<()> {
    session.cycle_id().await?;
    set_current_user(session, &CurrentUser::from(user)).await?;
    set_sentry_user(&user.id, Some(&user.name));
    Ok(())
}

/// Create an account and log it in.
///
/// POST /api/auth/register
#[instrument(skip(state, session, body))]
pub async fn register(
    State(state): State<AppState>,
    session: Session,
    ApiJson(body): ApiJson<Registration>,
) -> Result<(StatusCode, ApiResponse<User>)> {
    let user = AuthService::new(state.pool()).register(&body).await?;
    start_session(&session, &user).await?;
    Ok((StatusCode::CREATED, ApiResponse::ok(user)))
}

/// Log in with phone and password.
///
/// POST /api/auth/login
#[instrument(skip(state, session, body))]
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    ApiJson(body): ApiJson<Credentials>,
) -> Result<ApiResponse<User>> {
    let user = AuthService::new(state.pool()).login(&body).await.inspect_err(|e| {
        tracing::warn!(error = %e, "Login failed");
    })?;
    start_session(&session, &user).await?;
    tracing::info!(user_id = %user.id, "User logged in");
    Ok(ApiResponse::ok(user))
}

/// End the session.
///
/// POST /api/auth/logout
#[instrument(skip(session))]
pub async fn logout(session: Session) -> Result<ApiResponse<()>> {
    clear_current_user(&session).await?;
    session.flush().await?;
    clear_sentry_user();
    Ok(ApiResponse::ok(()))
}

/// The logged-in user's account.
///
/// GET /api/auth/me
#[instrument(skip(state, current), fields(user_id = %current.id))]
pub async fn me(
    State(state): State<AppState>,
    RequireAuth(current): RequireAuth,
) -> Result<ApiResponse<User>> {
    let user = AuthService::new(state.pool()).get_user(current.id).await?;
    Ok(ApiResponse::ok(user))
}
