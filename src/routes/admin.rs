use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{get, patch},
};
use uuid::Uuid;

use crate::{
    dto::{
        admin::{InventoryAdjustRequest, LowStockList},
        returns::UpdateReturnStatusRequest,
    },
    error::AppResult,
    middleware::auth::AuthUser,
    models::{Product, ReturnRequest},
    response::ApiResponse,
    routes::params::LowStockQuery,
    services::{admin_service, return_service},
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/inventory/low-stock", get(list_low_stock))
        .route("/inventory/{id}", patch(adjust_inventory))
        .route("/returns/{id}", patch(update_return_status))
}

#[utoipa::path(
    get,
    path = "/api/admin/inventory/low-stock",
    params(
        ("threshold" = Option<i32>, Query, description = "Stock threshold, default 5"),
        ("page" = Option<i64>, Query, description = "Page number, default 1"),
        ("per_page" = Option<i64>, Query, description = "Items per page, default 20")
    ),
    responses(
        (status = 200, description = "List low stock products", body = ApiResponse<LowStockList>),
        (status = 403, description = "Forbidden")
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn list_low_stock(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<LowStockQuery>,
) -> AppResult<Json<ApiResponse<LowStockList>>> {
    let resp = admin_service::list_low_stock(&state, &user, query).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    patch,
    path = "/api/admin/inventory/{id}",
    params(
        ("id" = Uuid, Path, description = "Product ID")
    ),
    request_body = InventoryAdjustRequest,
    responses(
        (status = 200, description = "Adjust inventory", body = ApiResponse<Product>),
        (status = 400, description = "Invalid adjustment"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Not Found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn adjust_inventory(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<InventoryAdjustRequest>,
) -> AppResult<Json<ApiResponse<Product>>> {
    let resp = admin_service::adjust_inventory(&state, &user, id, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    patch,
    path = "/api/admin/returns/{id}",
    params(
        ("id" = Uuid, Path, description = "Return request ID")
    ),
    request_body = UpdateReturnStatusRequest,
    responses(
        (status = 200, description = "Move a return request through review", body = ApiResponse<ReturnRequest>),
        (status = 400, description = "Transition not allowed"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Not Found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn update_return_status(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateReturnStatusRequest>,
) -> AppResult<Json<ApiResponse<ReturnRequest>>> {
    let resp = return_service::update_return_status(&state, &user, id, payload).await?;
    Ok(Json(resp))
}
