use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    entity::sea_orm_active_enums::{ReturnReason, ReturnStatus},
    models::ReturnRequest,
};

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateReturnRequest {
    pub order_id: Uuid,
    pub product_id: Uuid,
    pub size: String,
    pub color: String,
    pub reason: ReturnReason,
    pub note: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateReturnStatusRequest {
    pub status: ReturnStatus,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ReturnList {
    pub items: Vec<ReturnRequest>,
}
