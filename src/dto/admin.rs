use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    entity::sea_orm_active_enums::OrderStatus,
    models::{Order, Product},
};

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateOrderStatusRequest {
    pub order_id: Uuid,
    pub status: OrderStatus,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderSummary {
    pub total_revenue: i64,
    pub order_count: i64,
    pub product_count: i64,
    pub recent_orders: Vec<Order>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct InventoryAdjustRequest {
    pub delta: i32,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LowStockList {
    pub items: Vec<Product>,
}
