//! Payment gateway seam. The order workflow only sees [`PaymentGateway`];
//! [`razorpay::RazorpayGateway`] is the production implementation.

use std::{future::Future, time::Duration};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::error::AppError;

pub mod razorpay;

/// Remote payment record created for one order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentIntent {
    pub intent_id: String,
    pub amount: i64,
    pub currency: String,
    /// Public key the client hands to the hosted checkout.
    pub client_key: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentStatus {
    Created,
    Attempted,
    Paid,
    #[serde(other)]
    Unknown,
}

impl IntentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            IntentStatus::Created => "created",
            IntentStatus::Attempted => "attempted",
            IntentStatus::Paid => "paid",
            IntentStatus::Unknown => "unknown",
        }
    }
}

/// What the gateway itself reports about an intent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntentState {
    pub status: IntentStatus,
    /// Our order id as recorded on the intent when it was created.
    pub receipt_order_id: Option<String>,
}

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("gateway call timed out after {0:?}")]
    Timeout(Duration),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("gateway rejected request ({status}): {body}")]
    Rejected { status: u16, body: String },
}

impl From<GatewayError> for AppError {
    fn from(err: GatewayError) -> Self {
        AppError::GatewayUnavailable(err.to_string())
    }
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_intent(
        &self,
        order_id: Uuid,
        amount: i64,
        currency: &str,
    ) -> Result<PaymentIntent, GatewayError>;

    async fn fetch_intent_status(&self, intent_id: &str) -> Result<IntentState, GatewayError>;

    /// Checks the signature the hosted checkout hands back to the client.
    fn verify_signature(&self, intent_id: &str, payment_id: &str, signature: &str) -> bool;
}

/// Bounds a gateway call; an elapsed deadline becomes [`GatewayError::Timeout`].
pub async fn with_timeout<T, F>(limit: Duration, call: F) -> Result<T, GatewayError>
where
    F: Future<Output = Result<T, GatewayError>>,
{
    tokio::time::timeout(limit, call)
        .await
        .map_err(|_| GatewayError::Timeout(limit))?
}
