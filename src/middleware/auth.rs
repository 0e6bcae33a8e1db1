use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts},
};
use jsonwebtoken::{DecodingKey, Validation, decode};
use secrecy::ExposeSecret;
use uuid::Uuid;

use crate::{dto::auth::Claims, error::AppError, state::AppState};

pub const ROLE_ADMIN: &str = "admin";
pub const ROLE_USER: &str = "user";

/// The authenticated principal. Every core operation takes it explicitly.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub role: String,
}

impl AuthUser {
    pub fn is_admin(&self) -> bool {
        self.role == ROLE_ADMIN
    }
}

pub fn ensure_role(user: &AuthUser, role: &str) -> Result<(), AppError> {
    if user.role != role {
        return Err(AppError::Forbidden);
    }
    Ok(())
}

pub fn ensure_admin(user: &AuthUser) -> Result<(), AppError> {
    ensure_role(user, ROLE_ADMIN)
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get(header::AUTHORIZATION)
            .ok_or(AppError::Unauthorized("missing Authorization header"))?;

        let auth_str = auth_header
            .to_str()
            .map_err(|_| AppError::Unauthorized("invalid Authorization header"))?;

        let token = auth_str
            .strip_prefix("Bearer ")
            .map(str::trim)
            .ok_or(AppError::Unauthorized("invalid Authorization scheme"))?;

        decode_token(token, state.config.jwt_secret.expose_secret())
    }
}

pub fn decode_token(token: &str, secret: &str) -> Result<AuthUser, AppError> {
    let decoded = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|_| AppError::Unauthorized("invalid or expired token"))?;

    Ok(AuthUser {
        user_id: decoded.claims.sub,
        role: decoded.claims.role,
    })
}
