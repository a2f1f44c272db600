use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use tracing::instrument;
use uuid::Uuid;

use crate::{
    auth::{
        dto::RegisterRequest,
        extractors::CurrentUser,
        password::hash_password,
        services::{self, is_valid_email},
    },
    error::ApiError,
    state::AppState,
    users::{
        dto::{ChangePasswordRequest, MessageResponse, UpdateUserRequest, UserResponse},
        repo,
    },
};

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/users", post(create_user).get(list_users))
        .route("/users/me", get(get_me).delete(delete_me))
        .route("/users/change-password", post(change_password))
        .route(
            "/users/:id",
            get(get_user).put(update_user).delete(delete_user),
        )
}

#[instrument(skip(state, payload))]
pub async fn create_user(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<Json<UserResponse>, ApiError> {
    let user = services::register(&state, payload).await?;
    Ok(Json(user.into()))
}

#[instrument(skip(state, current))]
pub async fn list_users(
    State(state): State<AppState>,
    current: CurrentUser,
) -> Result<Json<Vec<UserResponse>>, ApiError> {
    current.require_admin()?;
    let users = repo::list_all(&state.db).await?;
    Ok(Json(users.into_iter().map(UserResponse::from).collect()))
}

#[instrument(skip(current))]
pub async fn get_me(current: CurrentUser) -> Json<UserResponse> {
    Json(current.0.into())
}

#[instrument(skip(state))]
pub async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<UserResponse>, ApiError> {
    let user = repo::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".into()))?;
    Ok(Json(user.into()))
}

#[instrument(skip(state, current, payload))]
pub async fn update_user(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    current: CurrentUser,
    Json(mut payload): Json<UpdateUserRequest>,
) -> Result<Json<UserResponse>, ApiError> {
    let actor = current.require_owner_or_admin(id)?;

    if payload.role.is_some() && !actor.role.is_admin() {
        return Err(ApiError::Forbidden("Only admins can change roles".into()));
    }
    if let Some(email) = payload.email.as_mut() {
        *email = email.trim().to_lowercase();
        if !is_valid_email(email) {
            return Err(ApiError::BadRequest("Invalid email".into()));
        }
    }
    if let Some(username) = payload.username.as_deref() {
        if username.len() < 3 || username.len() > 50 {
            return Err(ApiError::BadRequest(
                "Username must be 3-50 characters".into(),
            ));
        }
    }
    let password_hash = match payload.password.as_deref() {
        Some(plain) if plain.len() < 8 => {
            return Err(ApiError::BadRequest("Password too short".into()))
        }
        Some(plain) => Some(hash_password(plain)?),
        None => None,
    };

    let updated = repo::update(
        &state.db,
        id,
        payload.username.as_deref(),
        payload.email.as_deref(),
        password_hash.as_deref(),
        payload.role,
    )
    .await?
    .ok_or_else(|| ApiError::NotFound("User not found".into()))?;
    Ok(Json(updated.into()))
}

#[instrument(skip(state, current))]
pub async fn delete_user(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    current: CurrentUser,
) -> Result<Json<MessageResponse>, ApiError> {
    current.require_admin()?;
    services::delete_account(&state, id).await?;
    Ok(Json(MessageResponse {
        message: format!("User {id} deleted successfully"),
    }))
}

#[instrument(skip(state, current, payload))]
pub async fn change_password(
    State(state): State<AppState>,
    current: CurrentUser,
    Json(payload): Json<ChangePasswordRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    services::change_password(
        &state,
        &current.0,
        &payload.old_password,
        &payload.new_password,
    )
    .await?;
    Ok(Json(MessageResponse {
        message: "Password changed successfully".into(),
    }))
}

#[instrument(skip(state, current))]
pub async fn delete_me(
    State(state): State<AppState>,
    current: CurrentUser,
) -> Result<Json<MessageResponse>, ApiError> {
    let id = current.0.id;
    services::delete_account(&state, id).await?;
    Ok(Json(MessageResponse {
        message: "Account deleted successfully".into(),
    }))
}
