use async_trait::async_trait;
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use uuid::Uuid;

use super::{GatewayError, IntentState, IntentStatus, PaymentGateway, PaymentIntent};
use crate::config::PaymentConfig;

type HmacSha256 = Hmac<Sha256>;

/// Razorpay Orders API client.
#[derive(Clone)]
pub struct RazorpayGateway {
    client: reqwest::Client,
    base_url: String,
    key_id: String,
    key_secret: SecretString,
}

#[derive(Debug, Serialize)]
struct CreateOrderBody<'a> {
    amount: i64,
    currency: &'a str,
    receipt: String,
}

#[derive(Debug, Deserialize)]
struct RazorpayOrder {
    id: String,
    amount: i64,
    currency: String,
    status: IntentStatus,
    receipt: Option<String>,
}

impl RazorpayGateway {
    pub fn new(config: &PaymentConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            client,
            base_url: config.base_url.clone(),
            key_id: config.key_id.clone(),
            key_secret: config.key_secret.clone(),
        })
    }

    async fn read_order(response: reqwest::Response) -> Result<RazorpayOrder, GatewayError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GatewayError::Rejected {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response.json::<RazorpayOrder>().await?)
    }
}

#[async_trait]
impl PaymentGateway for RazorpayGateway {
    #[tracing::instrument(skip(self), fields(gateway = "razorpay"))]
    async fn create_intent(
        &self,
        order_id: Uuid,
        amount: i64,
        currency: &str,
    ) -> Result<PaymentIntent, GatewayError> {
        let body = CreateOrderBody {
            amount,
            currency,
            receipt: order_id.to_string(),
        };
        let response = self
            .client
            .post(format!("{}/orders", self.base_url))
            .basic_auth(&self.key_id, Some(self.key_secret.expose_secret()))
            .json(&body)
            .send()
            .await?;
        let order = Self::read_order(response).await?;

        Ok(PaymentIntent {
            intent_id: order.id,
            amount: order.amount,
            currency: order.currency,
            client_key: self.key_id.clone(),
        })
    }

    #[tracing::instrument(skip(self), fields(gateway = "razorpay"))]
    async fn fetch_intent_status(&self, intent_id: &str) -> Result<IntentState, GatewayError> {
        let response = self
            .client
            .get(format!("{}/orders/{}", self.base_url, intent_id))
            .basic_auth(&self.key_id, Some(self.key_secret.expose_secret()))
            .send()
            .await?;
        let order = Self::read_order(response).await?;

        Ok(IntentState {
            status: order.status,
            receipt_order_id: order.receipt,
        })
    }

    fn verify_signature(&self, intent_id: &str, payment_id: &str, signature: &str) -> bool {
        signature_matches(
            self.key_secret.expose_secret(),
            intent_id,
            payment_id,
            signature,
        )
    }
}

/// Razorpay signs `"{order_id}|{payment_id}"` with the key secret.
pub fn signature_matches(secret: &str, intent_id: &str, payment_id: &str, signature: &str) -> bool {
    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(format!("{intent_id}|{payment_id}").as_bytes());

    let Ok(provided) = hex::decode(signature.trim()) else {
        return false;
    };
    mac.verify_slice(&provided).is_ok()
}
