use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::{Order, OrderLine, ShippingAddress};

#[derive(Debug, Deserialize, ToSchema)]
pub struct PlaceOrderRequest {
    pub shipping_address: ShippingAddress,
    pub coupon_code: Option<String>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct OrderItemRequest {
    pub product_id: Uuid,
    pub size: String,
    pub color: String,
    pub quantity: i32,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct PlaceOnlineOrderRequest {
    pub order_items: Vec<OrderItemRequest>,
    pub shipping_address: ShippingAddress,
    pub total_amount: i64,
    pub coupon_code: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OnlinePaymentResponse {
    pub order_id: Uuid,
    pub razorpay_order_id: String,
    pub amount: i64,
    pub currency: String,
    pub key_id: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct VerifyPaymentRequest {
    pub razorpay_order_id: String,
    pub razorpay_payment_id: Option<String>,
    pub razorpay_signature: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct VerifyPaymentResponse {
    pub order_id: Uuid,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CancelOrderRequest {
    pub order_id: Uuid,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderWithItems {
    pub order: Order,
    pub items: Vec<OrderLine>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderList {
    pub items: Vec<OrderWithItems>,
}
