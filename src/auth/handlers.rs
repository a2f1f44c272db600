use axum::{extract::State, routing::post, Form, Json, Router};
use tracing::instrument;

use crate::{
    auth::{
        dto::{AccessToken, LoginRequest, RefreshRequest, RegisterRequest, TokenPair},
        services,
    },
    error::ApiError,
    state::AppState,
    users::dto::{MessageResponse, UserResponse},
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/refresh", post(refresh))
        .route("/auth/logout", post(logout))
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<Json<UserResponse>, ApiError> {
    let user = services::register(&state, payload).await?;
    Ok(Json(user.into()))
}

#[instrument(skip(state, form))]
pub async fn login(
    State(state): State<AppState>,
    Form(form): Form<LoginRequest>,
) -> Result<Json<TokenPair>, ApiError> {
    let tokens = services::login(&state, &form.username, &form.password).await?;
    Ok(Json(tokens))
}

#[instrument(skip(state, payload))]
pub async fn refresh(
    State(state): State<AppState>,
    Json(payload): Json<RefreshRequest>,
) -> Result<Json<AccessToken>, ApiError> {
    let token = services::refresh_access(&state, &payload.refresh_token).await?;
    Ok(Json(token))
}

#[instrument(skip(state, payload))]
pub async fn logout(
    State(state): State<AppState>,
    Json(payload): Json<RefreshRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    services::logout(&state, &payload.refresh_token).await?;
    Ok(Json(MessageResponse {
        message: "Logged out successfully".into(),
    }))
}
