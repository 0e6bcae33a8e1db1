use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, FromQueryResult, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
    sea_query::{Expr, LockType},
};
use uuid::Uuid;

use crate::{
    audit,
    dto::{
        admin::{InventoryAdjustRequest, LowStockList, OrderSummary, UpdateOrderStatusRequest},
        orders::OrderList,
    },
    entity::{Orders, Products, orders, products},
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_admin},
    models::{Order, Product},
    response::{ApiResponse, Meta},
    routes::params::{LowStockQuery, OrderListQuery},
    services::order_service,
    state::AppState,
};

const DEFAULT_LOW_STOCK_THRESHOLD: i32 = 5;
const RECENT_ORDERS: u64 = 5;

pub async fn list_all_orders(
    state: &AppState,
    user: &AuthUser,
    query: OrderListQuery,
) -> AppResult<ApiResponse<OrderList>> {
    ensure_admin(user)?;
    order_service::list_orders_where(&state.orm, Condition::all(), query).await
}

pub async fn update_order_status(
    state: &AppState,
    user: &AuthUser,
    payload: UpdateOrderStatusRequest,
) -> AppResult<ApiResponse<Order>> {
    ensure_admin(user)?;

    let txn = state.orm.begin().await?;
    let existing = Orders::find_by_id(payload.order_id)
        .lock(LockType::Update)
        .one(&txn)
        .await?
        .ok_or(AppError::NotFound("order"))?;
    let from = existing.order_status;
    let order = order_service::transition(&txn, existing, payload.status).await?;
    txn.commit().await?;

    audit::record(
        &state.orm,
        user.user_id,
        "order_status_update",
        "orders",
        serde_json::json!({ "order_id": order.id, "from": from, "to": order.order_status }),
    )
    .await;

    Ok(ApiResponse::success(
        "Order updated",
        Order::from(order),
        Some(Meta::empty()),
    ))
}

#[derive(Debug, FromQueryResult)]
struct RevenueRow {
    revenue: i64,
}

pub async fn order_summary(
    state: &AppState,
    user: &AuthUser,
) -> AppResult<ApiResponse<OrderSummary>> {
    ensure_admin(user)?;

    // SUM over BIGINT is NUMERIC on Postgres.
    let total_revenue = Orders::find()
        .select_only()
        .column_as(
            Expr::cust("CAST(COALESCE(SUM(total_amount), 0) AS BIGINT)"),
            "revenue",
        )
        .into_model::<RevenueRow>()
        .one(&state.orm)
        .await?
        .map_or(0, |row| row.revenue);

    let order_count = Orders::find().count(&state.orm).await? as i64;
    let product_count = Products::find().count(&state.orm).await? as i64;
    let recent_orders = Orders::find()
        .order_by_desc(orders::Column::CreatedAt)
        .limit(RECENT_ORDERS)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(Order::from)
        .collect();

    Ok(ApiResponse::success(
        "Order summary",
        OrderSummary {
            total_revenue,
            order_count,
            product_count,
            recent_orders,
        },
        Some(Meta::empty()),
    ))
}

pub async fn list_low_stock(
    state: &AppState,
    user: &AuthUser,
    query: LowStockQuery,
) -> AppResult<ApiResponse<LowStockList>> {
    ensure_admin(user)?;
    let threshold = query.threshold.unwrap_or(DEFAULT_LOW_STOCK_THRESHOLD);
    let (page, limit, offset) = query.pagination().normalize();

    let finder = Products::find()
        .filter(products::Column::Stock.lte(threshold))
        .order_by_asc(products::Column::Stock)
        .order_by_desc(products::Column::CreatedAt);

    let total = finder.clone().count(&state.orm).await? as i64;

    let items = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(Product::from)
        .collect();

    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success("Low stock", LowStockList { items }, Some(meta)))
}

pub async fn adjust_inventory(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: InventoryAdjustRequest,
) -> AppResult<ApiResponse<Product>> {
    ensure_admin(user)?;
    if payload.delta == 0 {
        return Err(AppError::Validation("delta must not be 0".into()));
    }

    let txn = state.orm.begin().await?;
    let product = Products::find_by_id(id)
        .lock(LockType::Update)
        .one(&txn)
        .await?
        .ok_or(AppError::NotFound("product"))?;

    let new_stock = product.stock.saturating_add(payload.delta);
    if new_stock < 0 {
        return Err(AppError::Validation("stock cannot be negative".into()));
    }

    let mut active: products::ActiveModel = product.into();
    active.stock = Set(new_stock);
    let updated = active.update(&txn).await?;

    txn.commit().await?;

    audit::record(
        &state.orm,
        user.user_id,
        "inventory_adjust",
        "products",
        serde_json::json!({ "product_id": updated.id, "delta": payload.delta }),
    )
    .await;

    Ok(ApiResponse::success(
        "Inventory updated",
        Product::from(updated),
        Some(Meta::empty()),
    ))
}
