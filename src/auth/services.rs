use axum::extract::FromRef;
use lazy_static::lazy_static;
use regex::Regex;
use time::Duration as TimeDuration;
use tracing::info;
use uuid::Uuid;

use crate::{
    auth::{
        dto::{AccessToken, RegisterRequest, TokenPair},
        jwt::JwtKeys,
        password::{hash_password, verify_password},
        refresh::{self, RedeemError},
    },
    error::ApiError,
    state::AppState,
    users::repo::{self, User},
};

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

/// Internal outcome of the auth flows, with full detail. Handlers narrow it
/// through `From<AuthError> for ApiError` before anything reaches a client.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("invalid email")]
    InvalidEmail,
    #[error("username must be 3-50 characters")]
    InvalidUsername,
    #[error("password too short")]
    PasswordTooShort,
    #[error("username already registered")]
    UsernameTaken,
    #[error("email already registered")]
    EmailTaken,
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("refresh token not found")]
    InvalidRefreshToken,
    #[error("refresh token expired")]
    ExpiredRefreshToken,
    #[error("token not found")]
    TokenNotFound,
    #[error("incorrect old password")]
    WrongOldPassword,
    #[error("user not found")]
    UserNotFound,
    #[error(transparent)]
    Storage(#[from] sqlx::Error),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl From<RedeemError> for AuthError {
    fn from(err: RedeemError) -> Self {
        match err {
            RedeemError::Invalid => AuthError::InvalidRefreshToken,
            RedeemError::Expired => AuthError::ExpiredRefreshToken,
            RedeemError::Db(e) => AuthError::Storage(e),
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidEmail => ApiError::BadRequest("Invalid email".into()),
            AuthError::InvalidUsername => {
                ApiError::BadRequest("Username must be 3-50 characters".into())
            }
            AuthError::PasswordTooShort => ApiError::BadRequest("Password too short".into()),
            AuthError::UsernameTaken => ApiError::Conflict("Username already registered".into()),
            AuthError::EmailTaken => ApiError::Conflict("Email already registered".into()),
            AuthError::InvalidCredentials => ApiError::Unauthorized("Invalid credentials".into()),
            // One message for both: the client learns nothing about whether
            // the token ever existed.
            AuthError::InvalidRefreshToken | AuthError::ExpiredRefreshToken => {
                ApiError::Unauthorized("Invalid refresh token".into())
            }
            AuthError::TokenNotFound => ApiError::NotFound("Token not found".into()),
            AuthError::WrongOldPassword => ApiError::BadRequest("Incorrect old password".into()),
            AuthError::UserNotFound => ApiError::NotFound("User not found".into()),
            AuthError::Storage(e) => ApiError::from(e),
            AuthError::Internal(e) => ApiError::Internal(e),
        }
    }
}

pub async fn register(state: &AppState, mut req: RegisterRequest) -> Result<User, AuthError> {
    req.email = req.email.trim().to_lowercase();

    if !is_valid_email(&req.email) {
        return Err(AuthError::InvalidEmail);
    }
    if req.username.len() < 3 || req.username.len() > 50 {
        return Err(AuthError::InvalidUsername);
    }
    if req.password.len() < 8 {
        return Err(AuthError::PasswordTooShort);
    }

    if repo::find_by_username(&state.db, &req.username)
        .await?
        .is_some()
    {
        return Err(AuthError::UsernameTaken);
    }
    if repo::find_by_email(&state.db, &req.email).await?.is_some() {
        return Err(AuthError::EmailTaken);
    }

    let hash = hash_password(&req.password)?;
    let role = req.role.unwrap_or_default();
    let user = repo::create(&state.db, &req.username, &req.email, &hash, role).await?;
    info!(user_id = %user.id, username = %user.username, "user registered");
    Ok(user)
}

pub async fn login(state: &AppState, username: &str, password: &str) -> Result<TokenPair, AuthError> {
    let user = match repo::find_by_username(&state.db, username).await? {
        Some(user) => user,
        // Unknown username and wrong password produce the same error, so
        // login cannot be used to enumerate accounts.
        None => return Err(AuthError::InvalidCredentials),
    };
    if !verify_password(password, &user.password_hash) {
        return Err(AuthError::InvalidCredentials);
    }

    let keys = JwtKeys::from_ref(state);
    let access_token = keys.sign_access(&user.username, user.role)?;
    let refresh_token = refresh::issue(
        &state.db,
        user.id,
        TimeDuration::days(state.config.auth.refresh_ttl_days),
    )
    .await?;

    info!(user_id = %user.id, username = %user.username, "user logged in");
    Ok(TokenPair::bearer(access_token, refresh_token))
}

/// Exchange a refresh token for a new access token. The refresh token is
/// not rotated; it stays valid until expiry or logout.
pub async fn refresh_access(state: &AppState, refresh_token: &str) -> Result<AccessToken, AuthError> {
    let user_id = refresh::redeem(&state.db, refresh_token).await?;
    // Role is read back from the directory so a role change takes effect on
    // the next refresh, not at the original login.
    let user = repo::find_by_id(&state.db, user_id)
        .await?
        .ok_or(AuthError::InvalidRefreshToken)?;

    let keys = JwtKeys::from_ref(state);
    let access_token = keys.sign_access(&user.username, user.role)?;
    Ok(AccessToken::bearer(access_token))
}

pub async fn logout(state: &AppState, refresh_token: &str) -> Result<(), AuthError> {
    if refresh::revoke(&state.db, refresh_token).await? {
        Ok(())
    } else {
        Err(AuthError::TokenNotFound)
    }
}

pub async fn change_password(
    state: &AppState,
    user: &User,
    old_password: &str,
    new_password: &str,
) -> Result<(), AuthError> {
    if !verify_password(old_password, &user.password_hash) {
        return Err(AuthError::WrongOldPassword);
    }
    if new_password.len() < 8 {
        return Err(AuthError::PasswordTooShort);
    }

    let hash = hash_password(new_password)?;
    repo::update(&state.db, user.id, None, None, Some(&hash), None)
        .await?
        .ok_or(AuthError::UserNotFound)?;

    // Every open session must log in again with the new password.
    let revoked = refresh::revoke_all_for_user(&state.db, user.id).await?;
    info!(user_id = %user.id, revoked, "password changed");
    Ok(())
}

/// Revoke first, delete second. The FK on refresh_tokens makes the reverse
/// order fail, and a crash between the steps leaves a tokenless user rather
/// than tokens for a user that no longer exists.
pub async fn delete_account(state: &AppState, target_id: Uuid) -> Result<(), AuthError> {
    let revoked = refresh::revoke_all_for_user(&state.db, target_id).await?;
    if !repo::delete(&state.db, target_id).await? {
        return Err(AuthError::UserNotFound);
    }
    info!(user_id = %target_id, revoked, "account deleted");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    #[test]
    fn email_validation() {
        assert!(is_valid_email("alice@example.com"));
        assert!(is_valid_email("a.b+c@sub.domain.io"));
        assert!(!is_valid_email("alice"));
        assert!(!is_valid_email("alice@"));
        assert!(!is_valid_email("@example.com"));
        assert!(!is_valid_email("a b@example.com"));
        assert!(!is_valid_email("alice@nodot"));
    }

    #[test]
    fn invalid_and_expired_refresh_narrow_to_the_same_response() {
        let invalid = ApiError::from(AuthError::InvalidRefreshToken);
        let expired = ApiError::from(AuthError::ExpiredRefreshToken);
        assert_eq!(invalid.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(expired.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(invalid.to_string(), expired.to_string());
    }

    #[test]
    fn redeem_errors_keep_their_detail_internally() {
        assert!(matches!(
            AuthError::from(RedeemError::Invalid),
            AuthError::InvalidRefreshToken
        ));
        assert!(matches!(
            AuthError::from(RedeemError::Expired),
            AuthError::ExpiredRefreshToken
        ));
    }

    #[test]
    fn boundary_statuses() {
        assert_eq!(
            ApiError::from(AuthError::UsernameTaken).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::from(AuthError::EmailTaken).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::from(AuthError::InvalidCredentials).status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ApiError::from(AuthError::TokenNotFound).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::from(AuthError::WrongOldPassword).status(),
            StatusCode::BAD_REQUEST
        );
    }
}
