use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, Set,
};
use uuid::Uuid;

use crate::{
    audit,
    domain::returns::check_return_transition,
    dto::returns::{CreateReturnRequest, ReturnList, UpdateReturnStatusRequest},
    entity::{
        OrderItems, Orders, ReturnRequests, order_items, orders, return_requests,
        sea_orm_active_enums::{OrderStatus, ReturnStatus},
    },
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_admin},
    models::ReturnRequest,
    response::{ApiResponse, Meta},
    state::AppState,
};

/// Owners may ask to return a line of a delivered order, once per line
/// unless an earlier request was rejected.
pub async fn create_return(
    state: &AppState,
    user: &AuthUser,
    payload: CreateReturnRequest,
) -> AppResult<ApiResponse<ReturnRequest>> {
    let size = payload.size.trim();
    let color = payload.color.trim();

    let order = Orders::find()
        .filter(orders::Column::Id.eq(payload.order_id))
        .filter(orders::Column::UserId.eq(user.user_id))
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound("order"))?;
    if order.order_status != OrderStatus::Delivered {
        return Err(AppError::Validation(
            "returns are only accepted for delivered orders".to_string(),
        ));
    }

    let has_line = OrderItems::find()
        .filter(order_items::Column::OrderId.eq(order.id))
        .filter(order_items::Column::ProductId.eq(payload.product_id))
        .filter(order_items::Column::Size.eq(size))
        .filter(order_items::Column::Color.eq(color))
        .count(&state.orm)
        .await?
        > 0;
    if !has_line {
        return Err(AppError::NotFound("order item"));
    }

    let open = ReturnRequests::find()
        .filter(return_requests::Column::OrderId.eq(order.id))
        .filter(return_requests::Column::ProductId.eq(payload.product_id))
        .filter(return_requests::Column::Size.eq(size))
        .filter(return_requests::Column::Color.eq(color))
        .filter(return_requests::Column::Status.ne(ReturnStatus::Rejected))
        .count(&state.orm)
        .await?;
    if open > 0 {
        return Err(AppError::Validation(
            "a return for this item already exists".to_string(),
        ));
    }

    let now = Utc::now();
    let request = return_requests::ActiveModel {
        id: Set(Uuid::new_v4()),
        order_id: Set(order.id),
        user_id: Set(user.user_id),
        product_id: Set(payload.product_id),
        size: Set(size.to_string()),
        color: Set(color.to_string()),
        reason: Set(payload.reason),
        status: Set(ReturnStatus::Requested),
        note: Set(payload.note),
        created_at: Set(now.into()),
        updated_at: Set(now.into()),
    }
    .insert(&state.orm)
    .await?;

    tracing::info!(return_id = %request.id, order_id = %order.id, "return requested");
    audit::record(
        &state.orm,
        user.user_id,
        "return_create",
        "return_requests",
        serde_json::json!({ "return_id": request.id, "order_id": order.id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Return requested",
        ReturnRequest::from(request),
        Some(Meta::empty()),
    ))
}

pub async fn list_returns(
    state: &AppState,
    user: &AuthUser,
) -> AppResult<ApiResponse<ReturnList>> {
    let items = ReturnRequests::find()
        .filter(return_requests::Column::UserId.eq(user.user_id))
        .order_by_desc(return_requests::Column::CreatedAt)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(ReturnRequest::from)
        .collect();
    Ok(ApiResponse::success("Returns", ReturnList { items }, Some(Meta::empty())))
}

pub async fn update_return_status(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateReturnStatusRequest,
) -> AppResult<ApiResponse<ReturnRequest>> {
    ensure_admin(user)?;
    let existing = ReturnRequests::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound("return request"))?;
    check_return_transition(existing.status, payload.status)?;

    let mut active: return_requests::ActiveModel = existing.into();
    active.status = Set(payload.status);
    active.updated_at = Set(Utc::now().into());
    let updated = active.update(&state.orm).await?;

    audit::record(
        &state.orm,
        user.user_id,
        "return_status_update",
        "return_requests",
        serde_json::json!({ "return_id": updated.id, "status": updated.status }),
    )
    .await;

    Ok(ApiResponse::success(
        "Return updated",
        ReturnRequest::from(updated),
        Some(Meta::empty()),
    ))
}
