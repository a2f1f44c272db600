use std::time::Duration;

use axum::extract::FromRef;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use time::{Duration as TimeDuration, OffsetDateTime};
use tracing::debug;

use crate::{state::AppState, users::repo::Role};

/// Claim set embedded in every access token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // username
    pub role: Role,
    pub exp: usize, // expires at (unix timestamp)
}

/// HS256 signing material plus the configured access-token lifetime.
#[derive(Clone)]
pub struct JwtKeys {
    pub encoding: EncodingKey,
    pub decoding: DecodingKey,
    pub access_ttl: Duration,
}

impl FromRef<AppState> for JwtKeys {
    fn from_ref(state: &AppState) -> Self {
        let auth = &state.config.auth;
        Self {
            encoding: EncodingKey::from_secret(auth.jwt_secret.as_bytes()),
            decoding: DecodingKey::from_secret(auth.jwt_secret.as_bytes()),
            access_ttl: Duration::from_secs((auth.access_ttl_minutes as u64) * 60),
        }
    }
}

impl JwtKeys {
    pub fn sign(&self, username: &str, role: Role, ttl: Duration) -> anyhow::Result<String> {
        let exp = OffsetDateTime::now_utc() + TimeDuration::seconds(ttl.as_secs() as i64);
        let claims = Claims {
            sub: username.to_owned(),
            role,
            exp: exp.unix_timestamp() as usize,
        };
        let token = encode(&Header::default(), &claims, &self.encoding)?;
        debug!(username, role = ?role, "jwt signed");
        Ok(token)
    }

    pub fn sign_access(&self, username: &str, role: Role) -> anyhow::Result<String> {
        self.sign(username, role, self.access_ttl)
    }

    /// Signature and expiry only. Malformed, tampered and expired tokens all
    /// fail the same way; callers cannot tell them apart.
    pub fn verify(&self, token: &str) -> anyhow::Result<Claims> {
        let mut validation = Validation::default();
        validation.leeway = 0;
        let data = decode::<Claims>(token, &self.decoding, &validation)?;
        Ok(data.claims)
    }
}
