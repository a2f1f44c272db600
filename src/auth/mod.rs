use crate::state::AppState;
use axum::Router;

pub mod dto;
pub(crate) mod extractors;
pub mod handlers;
pub mod jwt;
pub mod password;
pub mod refresh;
pub mod services;

pub fn router() -> Router<AppState> {
    handlers::auth_routes()
}
