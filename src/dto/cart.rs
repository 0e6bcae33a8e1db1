use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Deserialize, ToSchema)]
pub struct AddToCartRequest {
    pub product_id: Uuid,
    pub size: String,
    pub color: String,
    pub quantity: i32,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateCartRequest {
    pub product_id: Uuid,
    pub new_quantity: i32,
    pub new_size: String,
    pub new_color: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RemoveFromCartRequest {
    pub product_id: Uuid,
    pub size: String,
    pub color: String,
}

/// Live product details joined onto a cart line for display.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CartProduct {
    pub name: String,
    pub image: Option<String>,
    pub stock: i32,
    pub price: i64,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CartLineView {
    pub product_id: Uuid,
    pub size: String,
    pub color: String,
    pub quantity: i32,
    pub unit_price: i64,
    pub subtotal: i64,
    /// `None` when the product has since been removed from the catalog.
    pub product: Option<CartProduct>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CartView {
    pub id: Uuid,
    pub user_id: Uuid,
    pub items: Vec<CartLineView>,
    pub total_items: i32,
    pub total_price: i64,
    pub updated_at: DateTime<Utc>,
}
