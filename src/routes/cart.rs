use axum::{Json, Router, extract::State, routing::post};

use crate::{
    dto::cart::{AddToCartRequest, CartView, RemoveFromCartRequest, UpdateCartRequest},
    error::AppResult,
    middleware::auth::AuthUser,
    response::ApiResponse,
    services::cart_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/add", post(add_to_cart))
        .route("/update", post(update_cart))
        .route("/get", post(get_cart))
        .route("/remove", post(remove_from_cart))
}

#[utoipa::path(
    post,
    path = "/api/cart/add",
    request_body = AddToCartRequest,
    responses(
        (status = 200, description = "Add a variant to the cart, merging with an existing line", body = ApiResponse<CartView>),
        (status = 400, description = "Invalid quantity or size, or insufficient stock"),
        (status = 404, description = "Product not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Cart"
)]
pub async fn add_to_cart(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<AddToCartRequest>,
) -> AppResult<Json<ApiResponse<CartView>>> {
    let resp = cart_service::add_item(&state, &user, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/cart/update",
    request_body = UpdateCartRequest,
    responses(
        (status = 200, description = "Change quantity or variant of a cart line", body = ApiResponse<CartView>),
        (status = 400, description = "Insufficient stock"),
        (status = 404, description = "Cart or cart item not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Cart"
)]
pub async fn update_cart(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<UpdateCartRequest>,
) -> AppResult<Json<ApiResponse<CartView>>> {
    let resp = cart_service::update_item(&state, &user, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/cart/get",
    responses(
        (status = 200, description = "Current cart with product details", body = ApiResponse<CartView>),
        (status = 404, description = "No cart yet"),
    ),
    security(("bearer_auth" = [])),
    tag = "Cart"
)]
pub async fn get_cart(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<ApiResponse<CartView>>> {
    let resp = cart_service::get_cart(&state, &user).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/cart/remove",
    request_body = RemoveFromCartRequest,
    responses(
        (status = 200, description = "Remove one cart line", body = ApiResponse<CartView>),
        (status = 404, description = "Cart item not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Cart"
)]
pub async fn remove_from_cart(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<RemoveFromCartRequest>,
) -> AppResult<Json<ApiResponse<CartView>>> {
    let resp = cart_service::remove_item(&state, &user, payload).await?;
    Ok(Json(resp))
}
