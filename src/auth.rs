//! Password hashing, API tokens and the request extractors that resolve them.
//!
//! Clients authenticate with `Authorization: Token <key>` (`Bearer` is accepted
//! too). A user holds at most one token; logging in again returns the same key
//! until it is revoked by logout.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts},
};
use serde::Serialize;
use sqlx::{Row, SqlitePool};

use crate::error::{AppError, AppResult};
use crate::state::AppState;

/// Hash a password with Argon2id and a random salt.
pub fn hash_password(password: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| AppError::Internal(anyhow::anyhow!("password hashing failed: {}", e)))
}

/// Verify a password against a stored Argon2 hash.
pub fn verify_password(password: &str, hash: &str) -> AppResult<bool> {
    let parsed = PasswordHash::new(hash)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("stored password hash is invalid: {}", e)))?;
    Ok(Argon2::default().verify_password(password.as_bytes(), &parsed).is_ok())
}

fn generate_token() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

/// Returns the user's token, creating one if none exists.
pub async fn issue_token(db: &SqlitePool, user_id: i64) -> AppResult<String> {
    if let Some(key) = sqlx::query_scalar::<_, String>("SELECT key FROM auth_tokens WHERE user_id = ?1")
        .bind(user_id)
        .fetch_optional(db)
        .await?
    {
        return Ok(key);
    }
    let key = generate_token();
    sqlx::query("INSERT INTO auth_tokens (key, user_id) VALUES (?1, ?2)")
        .bind(&key)
        .bind(user_id)
        .execute(db)
        .await?;
    Ok(key)
}

pub async fn revoke_token(db: &SqlitePool, user_id: i64) -> AppResult<()> {
    sqlx::query("DELETE FROM auth_tokens WHERE user_id = ?1").bind(user_id).execute(db).await?;
    Ok(())
}

/// The authenticated user behind a request.
#[derive(Debug, Clone, Serialize)]
pub struct CurrentUser {
    pub id: i64,
    pub email: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub is_admin: bool,
}

/// Extracts the token key from an Authorization header value.
pub fn parse_authorization(value: &str) -> Option<&str> {
    let (scheme, key) = value.trim().split_once(' ')?;
    if !(scheme.eq_ignore_ascii_case("token") || scheme.eq_ignore_ascii_case("bearer")) {
        return None;
    }
    let key = key.trim();
    if key.is_empty() {
        None
    } else {
        Some(key)
    }
}

async fn user_for_token(db: &SqlitePool, key: &str) -> AppResult<Option<CurrentUser>> {
    let row = sqlx::query(
        r#"SELECT u.id, u.email, u.username, u.first_name, u.last_name, u.is_admin
           FROM auth_tokens t JOIN users u ON u.id = t.user_id
           WHERE t.key = ?1"#,
    )
    .bind(key)
    .fetch_optional(db)
    .await?;
    Ok(row.map(|r| CurrentUser {
        id: r.get("id"),
        email: r.get("email"),
        username: r.get("username"),
        first_name: r.get("first_name"),
        last_name: r.get("last_name"),
        is_admin: r.get::<i64, _>("is_admin") != 0,
    }))
}

/// Resolves the Authorization header. `Ok(None)` when no header is sent; a
/// header that doesn't resolve to a user is rejected.
async fn resolve(parts: &Parts, state: &AppState) -> AppResult<Option<CurrentUser>> {
    let Some(value) = parts.headers.get(header::AUTHORIZATION) else {
        return Ok(None);
    };
    let key = value
        .to_str()
        .ok()
        .and_then(parse_authorization)
        .ok_or_else(|| AppError::Unauthorized("Malformed Authorization header".to_string()))?;
    match user_for_token(&state.db, key).await? {
        Some(user) => Ok(Some(user)),
        None => Err(AppError::Unauthorized("Invalid token".to_string())),
    }
}

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        resolve(parts, state)
            .await?
            .ok_or_else(|| AppError::Unauthorized("Authentication credentials were not provided".to_string()))
    }
}

/// Like [`CurrentUser`] but anonymous requests are let through.
#[derive(Debug, Clone, Default)]
pub struct MaybeUser(pub Option<CurrentUser>);

impl MaybeUser {
    pub fn id(&self) -> Option<i64> {
        self.0.as_ref().map(|u| u.id)
    }
}

impl FromRequestParts<AppState> for MaybeUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        Ok(MaybeUser(resolve(parts, state).await?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify() {
        let hash = hash_password("s3cret-pass").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("s3cret-pass", &hash).unwrap());
        assert!(!verify_password("wrong", &hash).unwrap());
    }

    #[test]
    fn test_hashes_are_salted() {
        assert_ne!(hash_password("same").unwrap(), hash_password("same").unwrap());
    }

    #[test]
    fn test_parse_authorization() {
        assert_eq!(parse_authorization("Token abc123"), Some("abc123"));
        assert_eq!(parse_authorization("Bearer abc123"), Some("abc123"));
        assert_eq!(parse_authorization("token   abc123 "), Some("abc123"));
        assert_eq!(parse_authorization("Basic abc123"), None);
        assert_eq!(parse_authorization("Token "), None);
        assert_eq!(parse_authorization("abc123"), None);
    }

    #[test]
    fn test_generated_tokens_are_unique() {
        let a = generate_token();
        assert_eq!(a.len(), 32);
        assert_ne!(a, generate_token());
    }
}
