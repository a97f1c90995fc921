use axum::extract::State;
use tracing::info;

use super::Json;
use crate::auth::AuthUser;
use crate::dto::{LoginRequest, LoginResponse, VerifyResponse};
use crate::error::{Error, Result};
use crate::state::AppState;
use crate::stores::UserProfile;

const BAD_CREDENTIALS: &str = "Credenciales inválidas";

/// `POST /api/auth/login`
pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<LoginResponse>> {
    let (email, password) = request.credentials()?;

    let user = state
        .users
        .find_by_email(&email)
        .await?
        .ok_or_else(|| Error::Unauthorized(BAD_CREDENTIALS.to_string()))?;
    if !user.active {
        return Err(Error::Unauthorized("Usuario desactivado".to_string()));
    }
    if !state.users.verify_password(&user, &password) {
        return Err(Error::Unauthorized(BAD_CREDENTIALS.to_string()));
    }

    let user = UserProfile::from(user);
    let token = state.tokens.issue(&user)?;
    info!(user_id = %user.id, role = user.role.as_str(), "login");
    Ok(Json(LoginResponse { user, token }))
}

/// `GET /api/auth/verify`: checks the token and returns the user as it is
/// stored now, not as the token remembers it.
pub async fn verify(
    State(state): State<AppState>,
    AuthUser(claimed): AuthUser,
) -> Result<Json<VerifyResponse>> {
    let user = state
        .users
        .find_by_id(&claimed.id)
        .await?
        .ok_or_else(|| Error::Unauthorized("Usuario no encontrado".to_string()))?;
    Ok(Json(VerifyResponse { user: user.into() }))
}
