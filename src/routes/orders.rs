use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{get, post},
};
use uuid::Uuid;

use crate::{
    dto::{
        admin::{OrderSummary, UpdateOrderStatusRequest},
        orders::{
            CancelOrderRequest, OnlinePaymentResponse, OrderList, OrderWithItems,
            PlaceOnlineOrderRequest, PlaceOrderRequest, VerifyPaymentRequest,
            VerifyPaymentResponse,
        },
    },
    error::AppResult,
    middleware::auth::AuthUser,
    models::Order,
    response::ApiResponse,
    routes::params::OrderListQuery,
    services::{admin_service, order_service},
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/placeOrder", post(place_order))
        .route("/placeOrderRazorpay", post(place_order_razorpay))
        .route("/verifyRazorpay", post(verify_razorpay))
        .route("/getUserOrders", get(get_user_orders))
        .route("/cancel", post(cancel_order))
        .route("/list", get(list_orders))
        .route("/status", post(update_status))
        .route("/summary", get(order_summary))
        .route("/{id}", get(get_order))
}

#[utoipa::path(
    post,
    path = "/api/order/placeOrder",
    request_body = PlaceOrderRequest,
    responses(
        (status = 200, description = "Place a cash-on-delivery order from the cart", body = ApiResponse<OrderWithItems>),
        (status = 400, description = "Invalid address, empty cart, coupon rejected or insufficient stock"),
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn place_order(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<PlaceOrderRequest>,
) -> AppResult<Json<ApiResponse<OrderWithItems>>> {
    let resp = order_service::place_order(&state, &user, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/order/placeOrderRazorpay",
    request_body = PlaceOnlineOrderRequest,
    responses(
        (status = 200, description = "Create a pending order and a gateway payment", body = ApiResponse<OnlinePaymentResponse>),
        (status = 400, description = "Invalid address, items or total"),
        (status = 503, description = "Payment gateway unavailable; the order stays pending"),
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn place_order_razorpay(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<PlaceOnlineOrderRequest>,
) -> AppResult<Json<ApiResponse<OnlinePaymentResponse>>> {
    let resp = order_service::place_order_online(&state, &user, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/order/verifyRazorpay",
    request_body = VerifyPaymentRequest,
    responses(
        (status = 200, description = "Payment confirmed; repeat calls succeed", body = ApiResponse<VerifyPaymentResponse>),
        (status = 400, description = "Signature or receipt mismatch"),
        (status = 402, description = "Payment not completed"),
        (status = 404, description = "Order not found"),
        (status = 503, description = "Payment gateway unavailable"),
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn verify_razorpay(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<VerifyPaymentRequest>,
) -> AppResult<Json<ApiResponse<VerifyPaymentResponse>>> {
    let resp = order_service::verify_payment(&state, &user, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/order/getUserOrders",
    params(
        ("page" = Option<i64>, Query, description = "Page number, default 1"),
        ("per_page" = Option<i64>, Query, description = "Items per page, default 20"),
        ("status" = Option<String>, Query, description = "Filter by order status"),
        ("sort_order" = Option<String>, Query, description = "Sort order: asc, desc")
    ),
    responses(
        (status = 200, description = "Orders of the current user", body = ApiResponse<OrderList>)
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn get_user_orders(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<OrderListQuery>,
) -> AppResult<Json<ApiResponse<OrderList>>> {
    let resp = order_service::list_user_orders(&state, &user, query).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/order/{id}",
    params(
        ("id" = Uuid, Path, description = "Order ID")
    ),
    responses(
        (status = 200, description = "Order with its lines", body = ApiResponse<OrderWithItems>),
        (status = 404, description = "Order not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn get_order(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<OrderWithItems>>> {
    let resp = order_service::get_order(&state, &user, id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/order/cancel",
    request_body = CancelOrderRequest,
    responses(
        (status = 200, description = "Cancel a pending order", body = ApiResponse<Order>),
        (status = 404, description = "Order not found"),
        (status = 409, description = "Order is past Pending"),
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn cancel_order(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<CancelOrderRequest>,
) -> AppResult<Json<ApiResponse<Order>>> {
    let resp = order_service::cancel_order(&state, &user, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/order/list",
    params(
        ("page" = Option<i64>, Query, description = "Page number, default 1"),
        ("per_page" = Option<i64>, Query, description = "Items per page, default 20"),
        ("status" = Option<String>, Query, description = "Filter by order status"),
        ("sort_order" = Option<String>, Query, description = "Sort order: asc, desc")
    ),
    responses(
        (status = 200, description = "All orders (admin only)", body = ApiResponse<OrderList>),
        (status = 403, description = "Forbidden"),
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn list_orders(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<OrderListQuery>,
) -> AppResult<Json<ApiResponse<OrderList>>> {
    let resp = admin_service::list_all_orders(&state, &user, query).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/order/status",
    request_body = UpdateOrderStatusRequest,
    responses(
        (status = 200, description = "Update order status (admin only)", body = ApiResponse<Order>),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Order not found"),
        (status = 409, description = "Transition not allowed"),
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn update_status(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<UpdateOrderStatusRequest>,
) -> AppResult<Json<ApiResponse<Order>>> {
    let resp = admin_service::update_order_status(&state, &user, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/order/summary",
    responses(
        (status = 200, description = "Revenue, counts and recent orders (admin only)", body = ApiResponse<OrderSummary>),
        (status = 403, description = "Forbidden"),
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn order_summary(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<ApiResponse<OrderSummary>>> {
    let resp = admin_service::order_summary(&state, &user).await?;
    Ok(Json(resp))
}
