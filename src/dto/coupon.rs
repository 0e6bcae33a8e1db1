use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::{entity::sea_orm_active_enums::CouponKind, models::Coupon};

#[derive(Debug, Deserialize, ToSchema)]
pub struct ApplyCouponRequest {
    pub code: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ApplyCouponResponse {
    pub code: String,
    pub cart_total: i64,
    pub discount: i64,
    pub final_total: i64,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateCouponRequest {
    pub code: String,
    pub kind: CouponKind,
    pub value: i64,
    pub max_discount: Option<i64>,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CouponList {
    pub items: Vec<Coupon>,
}
