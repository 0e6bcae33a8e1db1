use axum::Router;

use crate::state::AppState;

pub mod admin;
pub mod auth;
pub mod cart;
pub mod coupon;
pub mod doc;
pub mod health;
pub mod orders;
pub mod params;
pub mod products;
pub mod returns;

// Build the API router without binding state; it will be provided at the top level.
pub fn create_api_router() -> Router<AppState> {
    Router::new()
        .nest("/products", products::router())
        .nest("/auth", auth::router())
        .nest("/cart", cart::router())
        .nest("/coupon", coupon::router())
        .nest("/order", orders::router())
        .nest("/returns", returns::router())
        .nest("/admin", admin::router())
}
