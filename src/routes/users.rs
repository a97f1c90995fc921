use axum::{extract::State, http::StatusCode};
use tracing::info;

use super::{Json, Path};
use crate::auth::{require_admin, AdminUser, AuthUser};
use crate::dto::{CreateUserRequest, MessageResponse, UpdateUserRequest};
use crate::error::{Error, Result};
use crate::state::AppState;
use crate::stores::UserProfile;

const NOT_FOUND: &str = "Usuario no encontrado";

pub async fn list(
    State(state): State<AppState>,
    _caller: AuthUser,
) -> Result<Json<Vec<UserProfile>>> {
    let users = state.users.find_all().await?;
    Ok(Json(users.iter().map(UserProfile::from).collect()))
}

pub async fn get(
    State(state): State<AppState>,
    _caller: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<UserProfile>> {
    let user = state
        .users
        .find_by_id(&id)
        .await?
        .ok_or_else(|| Error::not_found(NOT_FOUND))?;
    Ok(Json(user.into()))
}

pub async fn create(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Json(request): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<UserProfile>)> {
    let user = state.users.create(request.into_new_user()?).await?;
    info!(user_id = %user.id, by = %admin.id, "user created");
    Ok((StatusCode::CREATED, Json(user.into())))
}

pub async fn update(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<String>,
    Json(request): Json<UpdateUserRequest>,
) -> Result<Json<UserProfile>> {
    let user = state
        .users
        .update(&id, request.into())
        .await?
        .ok_or_else(|| Error::not_found(NOT_FOUND))?;
    info!(user_id = %user.id, by = %admin.id, "user updated");
    Ok(Json(user.into()))
}

/// Self-deletion is refused before the role is even looked at.
pub async fn delete(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>> {
    if id == caller.id {
        return Err(Error::validation("No puedes eliminarte a ti mismo"));
    }
    require_admin(&caller)?;

    if !state.users.delete(&id).await? {
        return Err(Error::not_found(NOT_FOUND));
    }
    info!(user_id = %id, by = %caller.id, "user deleted");
    Ok(Json(MessageResponse::new("Usuario eliminado correctamente")))
}
