use std::{env, time::Duration};

use anyhow::Context;
use secrecy::SecretString;

const DEFAULT_RAZORPAY_BASE_URL: &str = "https://api.razorpay.com/v1";

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub jwt_secret: SecretString,
    pub jwt_ttl_hours: i64,
    pub payment: PaymentConfig,
}

/// Credentials and limits for the hosted payment gateway.
#[derive(Debug, Clone)]
pub struct PaymentConfig {
    pub key_id: String,
    pub key_secret: SecretString,
    pub base_url: String,
    pub currency: String,
    pub timeout: Duration,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = env::var("DATABASE_URL").context("DATABASE_URL is not set")?;
        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .ok()
            .and_then(|p| p.parse::<u16>().ok())
            .unwrap_or(3000);
        let jwt_secret = env::var("JWT_SECRET").context("JWT_SECRET is not set")?;
        let jwt_ttl_hours = env::var("JWT_TTL_HOURS")
            .ok()
            .and_then(|h| h.parse::<i64>().ok())
            .unwrap_or(24);

        Ok(Self {
            port,
            database_url,
            host,
            jwt_secret: SecretString::from(jwt_secret),
            jwt_ttl_hours,
            payment: PaymentConfig::from_env()?,
        })
    }
}

impl PaymentConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let key_id = env::var("RAZORPAY_KEY_ID").context("RAZORPAY_KEY_ID is not set")?;
        let key_secret =
            env::var("RAZORPAY_KEY_SECRET").context("RAZORPAY_KEY_SECRET is not set")?;
        let base_url = env::var("RAZORPAY_BASE_URL")
            .unwrap_or_else(|_| DEFAULT_RAZORPAY_BASE_URL.to_string());
        let currency = env::var("PAYMENT_CURRENCY").unwrap_or_else(|_| "INR".to_string());
        let timeout_secs = env::var("PAYMENT_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(10);

        Ok(Self {
            key_id,
            key_secret: SecretString::from(key_secret),
            base_url: base_url.trim_end_matches('/').to_string(),
            currency,
            timeout: Duration::from_secs(timeout_secs),
        })
    }
}
