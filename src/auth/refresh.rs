use base64ct::{Base64UrlUnpadded, Encoding};
use rand::{rngs::OsRng, RngCore};
use sqlx::{FromRow, PgPool};
use time::{Duration, OffsetDateTime};
use tracing::debug;
use uuid::Uuid;

/// Bytes of entropy in a token value before encoding.
const TOKEN_BYTES: usize = 64;

#[derive(Debug, Clone, FromRow)]
pub struct RefreshToken {
    pub token: String,
    pub user_id: Uuid,
    pub expires_at: OffsetDateTime,
}

/// Internal outcome of a redeem attempt. The HTTP boundary collapses
/// `Invalid` and `Expired` into one response.
#[derive(Debug, thiserror::Error)]
pub enum RedeemError {
    #[error("refresh token not found")]
    Invalid,
    #[error("refresh token expired")]
    Expired,
    #[error(transparent)]
    Db(#[from] sqlx::Error),
}

fn generate_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    OsRng.fill_bytes(&mut bytes);
    Base64UrlUnpadded::encode_string(&bytes)
}

/// Mint and persist an opaque token for `user_id`. The token column is the
/// primary key, so a generator collision surfaces as a unique violation
/// rather than silently overwriting another session.
pub async fn issue(db: &PgPool, user_id: Uuid, ttl: Duration) -> Result<String, sqlx::Error> {
    let token = generate_token();
    let expires_at = OffsetDateTime::now_utc() + ttl;
    sqlx::query("INSERT INTO refresh_tokens (token, user_id, expires_at) VALUES ($1, $2, $3)")
        .bind(&token)
        .bind(user_id)
        .bind(expires_at)
        .execute(db)
        .await?;
    debug!(user_id = %user_id, "refresh token issued");
    Ok(token)
}

/// Exchange a token for its owning user id. Expired tokens are deleted on
/// detection; the delete is conditioned on `expires_at` so concurrent
/// redeems of the same token cannot race each other.
pub async fn redeem(db: &PgPool, token: &str) -> Result<Uuid, RedeemError> {
    let found = sqlx::query_as::<_, RefreshToken>(
        "SELECT token, user_id, expires_at FROM refresh_tokens WHERE token = $1",
    )
    .bind(token)
    .fetch_optional(db)
    .await?;

    let Some(stored) = found else {
        return Err(RedeemError::Invalid);
    };

    if stored.expires_at < OffsetDateTime::now_utc() {
        sqlx::query("DELETE FROM refresh_tokens WHERE token = $1 AND expires_at < now()")
            .bind(token)
            .execute(db)
            .await?;
        debug!(user_id = %stored.user_id, "expired refresh token removed");
        return Err(RedeemError::Expired);
    }

    Ok(stored.user_id)
}

/// Delete exactly one token; returns whether it existed.
pub async fn revoke(db: &PgPool, token: &str) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM refresh_tokens WHERE token = $1")
        .bind(token)
        .execute(db)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Delete every token owned by `user_id`; used on password change and
/// account deletion.
pub async fn revoke_all_for_user(db: &PgPool, user_id: Uuid) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM refresh_tokens WHERE user_id = $1")
        .bind(user_id)
        .execute(db)
        .await?;
    debug!(user_id = %user_id, revoked = result.rows_affected(), "refresh tokens revoked");
    Ok(result.rows_affected())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn generated_tokens_encode_full_entropy() {
        // 64 bytes -> 86 chars of unpadded base64url
        let token = generate_token();
        assert_eq!(token.len(), 86);
    }

    #[test]
    fn generated_tokens_are_unique() {
        let tokens: HashSet<String> = (0..128).map(|_| generate_token()).collect();
        assert_eq!(tokens.len(), 128);
    }

    #[test]
    fn generated_tokens_are_url_safe() {
        let token = generate_token();
        assert!(token
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }
}
