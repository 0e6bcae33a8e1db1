use axum::{
    Json, Router,
    extract::State,
    routing::{get, post},
};

use crate::{
    dto::coupon::{ApplyCouponRequest, ApplyCouponResponse, CouponList, CreateCouponRequest},
    error::AppResult,
    middleware::auth::AuthUser,
    models::Coupon,
    response::ApiResponse,
    services::coupon_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/apply", post(apply_coupon))
        .route("/create", post(create_coupon))
        .route("/list", get(list_coupons))
}

#[utoipa::path(
    post,
    path = "/api/coupon/apply",
    request_body = ApplyCouponRequest,
    responses(
        (status = 200, description = "Preview the discount on the current cart", body = ApiResponse<ApplyCouponResponse>),
        (status = 400, description = "Coupon expired, already redeemed, or cart empty"),
        (status = 404, description = "Coupon not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Coupon"
)]
pub async fn apply_coupon(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<ApplyCouponRequest>,
) -> AppResult<Json<ApiResponse<ApplyCouponResponse>>> {
    let resp = coupon_service::apply_coupon(&state, &user, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/coupon/create",
    request_body = CreateCouponRequest,
    responses(
        (status = 200, description = "Create coupon (admin only)", body = ApiResponse<Coupon>),
        (status = 400, description = "Invalid rule or duplicate code"),
        (status = 403, description = "Forbidden"),
    ),
    security(("bearer_auth" = [])),
    tag = "Coupon"
)]
pub async fn create_coupon(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<CreateCouponRequest>,
) -> AppResult<Json<ApiResponse<Coupon>>> {
    let resp = coupon_service::create_coupon(&state, &user, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/coupon/list",
    responses(
        (status = 200, description = "All coupons (admin only)", body = ApiResponse<CouponList>),
        (status = 403, description = "Forbidden"),
    ),
    security(("bearer_auth" = [])),
    tag = "Coupon"
)]
pub async fn list_coupons(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<ApiResponse<CouponList>>> {
    let resp = coupon_service::list_coupons(&state, &user).await?;
    Ok(Json(resp))
}
