/// API token authentication
///
/// Tokens are `mv_` followed by 64 hex characters. Only the SHA-256 of the full
/// token is stored; the plaintext is shown once at registration or rotation.

use crate::api::AppState;
use crate::error::AppError;
use crate::marketplace::User;
use axum::{extract::FromRequestParts, http::request::Parts};
use rand::RngCore;
use sha2::{Digest, Sha256};

pub const TOKEN_PREFIX: &str = "mv_";
const TOKEN_BYTES: usize = 32;

/// Generate a new token, returning (plaintext, hash)
pub fn generate_token() -> (String, String) {
    let mut random_bytes = [0u8; TOKEN_BYTES];
    rand::thread_rng().fill_bytes(&mut random_bytes);

    let token = format!("{}{}", TOKEN_PREFIX, hex::encode(random_bytes));
    let hash = hash_token(&token);
    (token, hash)
}

pub fn hash_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

fn bearer_token(parts: &Parts) -> Option<&str> {
    let header = parts.headers.get(axum::http::header::AUTHORIZATION)?;
    let value = header.to_str().ok()?;
    let token = value.strip_prefix("Bearer ").or_else(|| value.strip_prefix("bearer "))?;
    Some(token.trim()).filter(|t| !t.is_empty())
}

async fn resolve_user(state: &AppState, token: &str) -> Result<User, AppError> {
    if !token.starts_with(TOKEN_PREFIX) {
        return Err(AppError::Unauthorized);
    }

    let user = state
        .market
        .users
        .by_token_hash(&hash_token(token))
        .await?
        .ok_or(AppError::Unauthorized)?;

    if user.is_banned() {
        return Err(AppError::forbidden(format!(
            "account suspended: {}",
            user.ban_reason.as_deref().unwrap_or("no reason given")
        )));
    }

    Ok(user)
}

/// Extractor for an authenticated, non-banned user
#[derive(Debug, Clone)]
pub struct AuthUser(pub User);

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts).ok_or(AppError::Unauthorized)?;
        Ok(AuthUser(resolve_user(state, token).await?))
    }
}

/// Extractor for routes open to guests; a present but invalid token is still rejected
#[derive(Debug, Clone)]
pub struct MaybeUser(pub Option<User>);

impl FromRequestParts<AppState> for MaybeUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        match bearer_token(parts) {
            Some(token) => Ok(MaybeUser(Some(resolve_user(state, token).await?))),
            None => Ok(MaybeUser(None)),
        }
    }
}

/// Extractor for administrators
#[derive(Debug, Clone)]
pub struct AdminUser(pub User);

impl FromRequestParts<AppState> for AdminUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let AuthUser(user) = AuthUser::from_request_parts(parts, state).await?;
        if !user.is_admin() {
            return Err(AppError::forbidden("administrator access required"));
        }
        Ok(AdminUser(user))
    }
}
