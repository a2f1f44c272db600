use serde::{Deserialize, Serialize};

use crate::users::repo::Role;

/// Request body for user registration.
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    pub role: Option<Role>, // defaults to `user`
}

/// Form body for login.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// Request body carrying a refresh token (refresh and logout).
#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// Response returned after login.
#[derive(Debug, Serialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
}

impl TokenPair {
    pub fn bearer(access_token: String, refresh_token: String) -> Self {
        Self {
            access_token,
            refresh_token,
            token_type: "bearer".into(),
        }
    }
}

/// Response returned after refresh.
#[derive(Debug, Serialize)]
pub struct AccessToken {
    pub access_token: String,
    pub token_type: String,
}

impl AccessToken {
    pub fn bearer(access_token: String) -> Self {
        Self {
            access_token,
            token_type: "bearer".into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_pair_serializes_bearer_type() {
        let pair = TokenPair::bearer("acc".into(), "ref".into());
        let json = serde_json::to_string(&pair).unwrap();
        assert!(json.contains(r#""token_type":"bearer""#));
        assert!(json.contains(r#""access_token":"acc""#));
        assert!(json.contains(r#""refresh_token":"ref""#));
    }

    #[test]
    fn register_request_role_is_optional() {
        let req: RegisterRequest = serde_json::from_str(
            r#"{"username":"alice","email":"a@x.com","password":"password1"}"#,
        )
        .unwrap();
        assert!(req.role.is_none());

        let req: RegisterRequest = serde_json::from_str(
            r#"{"username":"root","email":"r@x.com","password":"password1","role":"admin"}"#,
        )
        .unwrap();
        assert_eq!(req.role, Some(Role::Admin));
    }
}
