use chrono::{DateTime, Utc};
use sea_orm::FromJsonQueryResult;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::entity::{
    coupons, order_items, orders, products, return_requests,
    sea_orm_active_enums::{
        CouponKind, OrderStatus, PaymentMethod, PaymentStatus, ReturnReason, ReturnStatus,
    },
    users,
};

/// Size tokens a product is offered in, stored as a JSON array.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, FromJsonQueryResult)]
#[serde(transparent)]
pub struct SizeList(pub Vec<String>);

impl SizeList {
    pub fn offers(&self, size: &str) -> bool {
        self.0.is_empty() || self.0.iter().any(|s| s.eq_ignore_ascii_case(size))
    }
}

/// Delivery address copied onto the order at placement time.
#[derive(
    Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, FromJsonQueryResult, ToSchema,
)]
pub struct ShippingAddress {
    #[serde(default)]
    pub street: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub pincode: String,
    #[serde(default)]
    pub country: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
    pub role: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Product {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub image: Option<String>,
    pub price: i64,
    pub stock: i32,
    pub sold: i32,
    #[schema(value_type = Vec<String>)]
    pub sizes: SizeList,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Coupon {
    pub id: Uuid,
    pub code: String,
    pub kind: CouponKind,
    pub value: i64,
    pub max_discount: Option<i64>,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Order {
    pub id: Uuid,
    pub user_id: Uuid,
    pub shipping_address: ShippingAddress,
    pub payment_method: PaymentMethod,
    pub payment_status: PaymentStatus,
    pub order_status: OrderStatus,
    pub is_paid: bool,
    pub subtotal_amount: i64,
    pub discount_amount: i64,
    pub total_amount: i64,
    pub coupon_code: Option<String>,
    pub gateway_order_id: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OrderLine {
    pub id: Uuid,
    pub order_id: Uuid,
    pub product_id: Uuid,
    pub name: String,
    pub size: String,
    pub color: String,
    pub quantity: i32,
    pub unit_price: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ReturnRequest {
    pub id: Uuid,
    pub order_id: Uuid,
    pub user_id: Uuid,
    pub product_id: Uuid,
    pub size: String,
    pub color: String,
    pub reason: ReturnReason,
    pub status: ReturnStatus,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<users::Model> for User {
    fn from(model: users::Model) -> Self {
        Self {
            id: model.id,
            email: model.email,
            password_hash: model.password_hash,
            created_at: model.created_at.with_timezone(&Utc),
            role: model.role,
        }
    }
}

impl From<products::Model> for Product {
    fn from(model: products::Model) -> Self {
        Self {
            id: model.id,
            name: model.name,
            description: model.description,
            image: model.image,
            price: model.price,
            stock: model.stock,
            sold: model.sold,
            sizes: model.sizes,
            created_at: model.created_at.with_timezone(&Utc),
        }
    }
}

impl From<coupons::Model> for Coupon {
    fn from(model: coupons::Model) -> Self {
        Self {
            id: model.id,
            code: model.code,
            kind: model.kind,
            value: model.value,
            max_discount: model.max_discount,
            expires_at: model.expires_at.with_timezone(&Utc),
            created_at: model.created_at.with_timezone(&Utc),
        }
    }
}

impl From<orders::Model> for Order {
    fn from(model: orders::Model) -> Self {
        Self {
            id: model.id,
            user_id: model.user_id,
            shipping_address: model.shipping_address,
            payment_method: model.payment_method,
            is_paid: model.payment_status == PaymentStatus::Paid,
            payment_status: model.payment_status,
            order_status: model.order_status,
            subtotal_amount: model.subtotal_amount,
            discount_amount: model.discount_amount,
            total_amount: model.total_amount,
            coupon_code: model.coupon_code,
            gateway_order_id: model.gateway_order_id,
            paid_at: model.paid_at.map(|dt| dt.with_timezone(&Utc)),
            created_at: model.created_at.with_timezone(&Utc),
            updated_at: model.updated_at.with_timezone(&Utc),
        }
    }
}

impl From<order_items::Model> for OrderLine {
    fn from(model: order_items::Model) -> Self {
        Self {
            id: model.id,
            order_id: model.order_id,
            product_id: model.product_id,
            name: model.name,
            size: model.size,
            color: model.color,
            quantity: model.quantity,
            unit_price: model.unit_price,
        }
    }
}

impl From<return_requests::Model> for ReturnRequest {
    fn from(model: return_requests::Model) -> Self {
        Self {
            id: model.id,
            order_id: model.order_id,
            user_id: model.user_id,
            product_id: model.product_id,
            size: model.size,
            color: model.color,
            reason: model.reason,
            status: model.status,
            note: model.note,
            created_at: model.created_at.with_timezone(&Utc),
            updated_at: model.updated_at.with_timezone(&Utc),
        }
    }
}
