use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use tracing::warn;
use uuid::Uuid;

use crate::{
    auth::jwt::JwtKeys,
    error::ApiError,
    state::AppState,
    users::repo::{self, User},
};

/// Authenticated request identity: a bearer access token resolved to a live
/// user row.
pub struct CurrentUser(pub User);

fn unauthorized() -> ApiError {
    ApiError::Unauthorized("Could not validate credentials".into())
}

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .ok_or_else(unauthorized)?;

        let token = header
            .strip_prefix("Bearer ")
            .or_else(|| header.strip_prefix("bearer "))
            .ok_or_else(unauthorized)?;

        let keys = JwtKeys::from_ref(state);
        let claims = keys.verify(token).map_err(|_| {
            warn!("invalid or expired access token");
            unauthorized()
        })?;

        // A deleted account holding a still-valid token reads the same as a
        // bad token from the outside. Storage failures stay storage failures.
        match repo::find_by_username(&state.db, &claims.sub).await? {
            Some(user) => Ok(CurrentUser(user)),
            None => Err(unauthorized()),
        }
    }
}

impl CurrentUser {
    pub fn require_admin(self) -> Result<User, ApiError> {
        if self.0.role.is_admin() {
            Ok(self.0)
        } else {
            Err(ApiError::Forbidden(
                "Only admins can access this resource".into(),
            ))
        }
    }

    pub fn require_owner_or_admin(self, target_id: Uuid) -> Result<User, ApiError> {
        if self.0.role.is_admin() || self.0.id == target_id {
            Ok(self.0)
        } else {
            Err(ApiError::Forbidden(
                "You do not have permission to access this resource".into(),
            ))
        }
    }
}
