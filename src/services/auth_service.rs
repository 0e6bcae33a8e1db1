use argon2::{
    Argon2, PasswordHasher,
    password_hash::{PasswordHash, PasswordVerifier, SaltString},
};
use chrono::{Duration, Utc};
use jsonwebtoken::{EncodingKey, Header, encode};
use password_hash::rand_core::OsRng;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set};
use secrecy::ExposeSecret;
use uuid::Uuid;

use crate::{
    audit,
    dto::auth::{Claims, LoginRequest, LoginResponse, RegisterRequest},
    entity::{Users, users},
    error::{AppError, AppResult},
    middleware::auth::ROLE_USER,
    models::User,
    response::{ApiResponse, Meta},
    state::AppState,
};

const MIN_PASSWORD_LEN: usize = 8;

pub async fn register_user(
    state: &AppState,
    payload: RegisterRequest,
) -> AppResult<ApiResponse<User>> {
    let email = payload.email.trim().to_lowercase();
    if !email.contains('@') {
        return Err(AppError::Validation("email is invalid".to_string()));
    }
    if payload.password.len() < MIN_PASSWORD_LEN {
        return Err(AppError::Validation(format!(
            "password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }

    let exist = Users::find()
        .filter(users::Column::Email.eq(email.as_str()))
        .one(&state.orm)
        .await?;
    if exist.is_some() {
        return Err(AppError::Validation("Email is already taken".to_string()));
    }

    let password_hash = hash_password(&payload.password)?;
    let user = users::ActiveModel {
        id: Set(Uuid::new_v4()),
        email: Set(email),
        password_hash: Set(password_hash),
        created_at: Set(Utc::now().into()),
        role: Set(ROLE_USER.to_string()),
    }
    .insert(&state.orm)
    .await?;

    audit::record(
        &state.orm,
        user.id,
        "user_register",
        "users",
        serde_json::json!({ "user_id": user.id }),
    )
    .await;

    Ok(ApiResponse::success("User created", User::from(user), None))
}

pub async fn login_user(
    state: &AppState,
    payload: LoginRequest,
) -> AppResult<ApiResponse<LoginResponse>> {
    let email = payload.email.trim().to_lowercase();
    let user = Users::find()
        .filter(users::Column::Email.eq(email.as_str()))
        .one(&state.orm)
        .await?
        .ok_or(AppError::Unauthorized("invalid email or password"))?;

    let parsed_hash = PasswordHash::new(&user.password_hash)
        .map_err(|_| AppError::Internal(anyhow::anyhow!("Invalid password hash")))?;
    if Argon2::default()
        .verify_password(payload.password.as_bytes(), &parsed_hash)
        .is_err()
    {
        return Err(AppError::Unauthorized("invalid email or password"));
    }

    let ttl = Duration::try_hours(state.config.jwt_ttl_hours)
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("Failed to set expiration")))?;
    let claims = Claims::new(user.id, user.role.clone(), Utc::now(), ttl);

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(state.config.jwt_secret.expose_secret().as_bytes()),
    )
    .map_err(|e| AppError::Internal(anyhow::anyhow!(e.to_string())))?;

    audit::record(
        &state.orm,
        user.id,
        "user_login",
        "users",
        serde_json::json!({ "user_id": user.id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Logged in",
        LoginResponse {
            token: format!("Bearer {token}"),
        },
        Some(Meta::empty()),
    ))
}

pub fn hash_password(password: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| AppError::Internal(anyhow::anyhow!(e.to_string())))?
        .to_string();
    Ok(hash)
}
