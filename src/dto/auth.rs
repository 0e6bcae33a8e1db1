use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Deserialize, ToSchema)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LoginResponse {
    /// Ready to send as the `Authorization` header value.
    pub token: String,
}

/// JWT payload. `role` is checked by `ensure_admin` on privileged routes.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Claims {
    pub sub: Uuid,
    pub role: String,
    pub iat: usize,
    pub exp: usize,
}

impl Claims {
    pub fn new(user_id: Uuid, role: impl Into<String>, issued_at: DateTime<Utc>, ttl: Duration) -> Self {
        Self {
            sub: user_id,
            role: role.into(),
            iat: issued_at.timestamp() as usize,
            exp: (issued_at + ttl).timestamp() as usize,
        }
    }
}
