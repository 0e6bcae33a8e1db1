use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::{
    entity::sea_orm_active_enums::OrderStatus,
    response::{ApiResponse, Meta},
};

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("Insufficient stock for product {product_id}: only {available} left")]
    InsufficientStock { product_id: Uuid, available: i32 },

    #[error("Cart is empty")]
    EmptyCart,

    #[error("Coupon has expired")]
    Expired,

    #[error("Coupon has already been redeemed")]
    AlreadyRedeemed,

    #[error("Order cannot move from {from} to {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    #[error("Payment not completed (gateway status: {0})")]
    PaymentIncomplete(String),

    #[error("Payment gateway unavailable, retry later")]
    GatewayUnavailable(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(&'static str),

    #[error("Forbidden")]
    Forbidden,

    #[error("Internal Server Error")]
    Orm(#[from] sea_orm::DbErr),

    #[error("Internal Server Error")]
    Internal(#[from] anyhow::Error),
}

#[derive(Serialize)]
struct ErrorData {
    error: String,
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_)
            | AppError::InsufficientStock { .. }
            | AppError::EmptyCart
            | AppError::Expired
            | AppError::AlreadyRedeemed => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::InvalidTransition { .. } => StatusCode::CONFLICT,
            AppError::PaymentIncomplete(_) => StatusCode::PAYMENT_REQUIRED,
            AppError::GatewayUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::Orm(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match &self {
            AppError::Orm(err) => tracing::error!(error = %err, "database failure"),
            AppError::Internal(err) => tracing::error!(error = ?err, "internal failure"),
            AppError::GatewayUnavailable(detail) => {
                tracing::warn!(detail = %detail, "payment gateway unavailable")
            }
            _ => {}
        }

        let status = self.status_code();
        let message = self.to_string();
        let body = ApiResponse {
            message: message.clone(),
            data: Some(ErrorData { error: message }),
            meta: Some(Meta::empty()),
        };

        (status, axum::Json(body)).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
