mod common;

use common::{address, admin, create_product, customer, setup, stock_of};
use storefront_api::{
    dto::{
        admin::{InventoryAdjustRequest, UpdateOrderStatusRequest},
        cart::AddToCartRequest,
        orders::{CancelOrderRequest, OrderWithItems, PlaceOrderRequest},
    },
    entity::sea_orm_active_enums::{OrderStatus, PaymentMethod, PaymentStatus},
    error::AppError,
    middleware::auth::AuthUser,
    models::Order,
    routes::params::{LowStockQuery, OrderListQuery},
    services::{admin_service, cart_service, order_service},
    state::AppState,
};
use uuid::Uuid;

async fn add(state: &AppState, user: &AuthUser, product_id: Uuid, quantity: i32) {
    cart_service::add_item(
        state,
        user,
        AddToCartRequest {
            product_id,
            size: "M".into(),
            color: "black".into(),
            quantity,
        },
    )
    .await
    .expect("add to cart");
}

async fn checkout(state: &AppState, user: &AuthUser) -> Result<OrderWithItems, AppError> {
    order_service::place_order(
        state,
        user,
        PlaceOrderRequest {
            shipping_address: address(),
            coupon_code: None,
        },
    )
    .await
    .map(|resp| resp.data.expect("order"))
}

async fn set_status(
    state: &AppState,
    user: &AuthUser,
    order_id: Uuid,
    status: OrderStatus,
) -> Result<Order, AppError> {
    admin_service::update_order_status(state, user, UpdateOrderStatusRequest { order_id, status })
        .await
        .map(|resp| resp.data.expect("order"))
}

#[tokio::test]
async fn cod_checkout_commits_stock_and_clears_cart() {
    let app = setup().await;
    let user = customer(&app.state).await;
    let tee = create_product(&app.state, "Tee", 100, 5, &[]).await;
    let cap = create_product(&app.state, "Cap", 40, 3, &[]).await;

    add(&app.state, &user, tee.id, 2).await;
    add(&app.state, &user, cap.id, 1).await;

    let placed = checkout(&app.state, &user).await.unwrap();
    let order = &placed.order;
    assert_eq!(order.payment_method, PaymentMethod::Cod);
    assert_eq!(order.payment_status, PaymentStatus::Pending);
    assert_eq!(order.order_status, OrderStatus::Pending);
    assert!(!order.is_paid);
    assert_eq!(order.subtotal_amount, 240);
    assert_eq!(order.discount_amount, 0);
    assert_eq!(order.total_amount, 240);
    assert_eq!(order.shipping_address, address());

    assert_eq!(placed.items.len(), 2);
    assert_eq!(placed.items[0].name, "Tee");
    assert_eq!(placed.items[0].quantity, 2);
    assert_eq!(placed.items[0].unit_price, 100);

    assert_eq!(stock_of(&app.state, tee.id).await, (3, 2));
    assert_eq!(stock_of(&app.state, cap.id).await, (2, 1));

    let cart = cart_service::get_cart(&app.state, &user)
        .await
        .unwrap()
        .data
        .unwrap();
    assert!(cart.items.is_empty());
    assert_eq!(cart.total_items, 0);
    assert_eq!(cart.total_price, 0);
}

#[tokio::test]
async fn checkout_needs_an_address_and_a_cart() {
    let app = setup().await;
    let user = customer(&app.state).await;
    let tee = create_product(&app.state, "Tee", 100, 5, &[]).await;

    let err = checkout(&app.state, &user).await.unwrap_err();
    assert!(matches!(err, AppError::EmptyCart));

    add(&app.state, &user, tee.id, 1).await;
    let mut bad = address();
    bad.pincode = "56A001".into();
    let err = order_service::place_order(
        &app.state,
        &user,
        PlaceOrderRequest {
            shipping_address: bad,
            coupon_code: None,
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));
    assert_eq!(stock_of(&app.state, tee.id).await, (5, 0));

    checkout(&app.state, &user).await.unwrap();
    let err = checkout(&app.state, &user).await.unwrap_err();
    assert!(matches!(err, AppError::EmptyCart));
}

#[tokio::test]
async fn stock_shortfall_at_checkout_rolls_back_every_line() {
    let app = setup().await;
    let user = customer(&app.state).await;
    let boss = admin(&app.state).await;
    let tee = create_product(&app.state, "Tee", 100, 5, &[]).await;
    let cap = create_product(&app.state, "Cap", 40, 3, &[]).await;

    add(&app.state, &user, tee.id, 2).await;
    add(&app.state, &user, cap.id, 3).await;
    admin_service::adjust_inventory(&app.state, &boss, cap.id, InventoryAdjustRequest { delta: -2 })
        .await
        .unwrap();

    let err = checkout(&app.state, &user).await.unwrap_err();
    match err {
        AppError::InsufficientStock {
            product_id,
            available,
        } => {
            assert_eq!(product_id, cap.id);
            assert_eq!(available, 1);
        }
        other => panic!("unexpected error: {other:?}"),
    }

    assert_eq!(stock_of(&app.state, tee.id).await, (5, 0));
    assert_eq!(stock_of(&app.state, cap.id).await, (1, 0));
    let cart = cart_service::get_cart(&app.state, &user)
        .await
        .unwrap()
        .data
        .unwrap();
    assert_eq!(cart.items.len(), 2);

    let orders = order_service::list_user_orders(&app.state, &user, OrderListQuery::default())
        .await
        .unwrap()
        .data
        .unwrap();
    assert!(orders.items.is_empty());
}

#[tokio::test]
async fn last_unit_goes_to_exactly_one_buyer() {
    let app = setup().await;
    let first = customer(&app.state).await;
    let second = customer(&app.state).await;
    let lamp = create_product(&app.state, "Lamp", 700, 1, &[]).await;

    add(&app.state, &first, lamp.id, 1).await;
    add(&app.state, &second, lamp.id, 1).await;

    let (a, b) = tokio::join!(checkout(&app.state, &first), checkout(&app.state, &second));
    let outcomes = [a.is_ok(), b.is_ok()];
    assert_eq!(outcomes.iter().filter(|ok| **ok).count(), 1);
    let failure = if a.is_err() { a.unwrap_err() } else { b.unwrap_err() };
    assert!(matches!(
        failure,
        AppError::InsufficientStock { available: 0, .. }
    ));
    assert_eq!(stock_of(&app.state, lamp.id).await, (0, 1));
}

#[tokio::test]
async fn admin_moves_orders_forward_only() {
    let app = setup().await;
    let user = customer(&app.state).await;
    let boss = admin(&app.state).await;
    let tee = create_product(&app.state, "Tee", 100, 5, &[]).await;

    add(&app.state, &user, tee.id, 1).await;
    let order_id = checkout(&app.state, &user).await.unwrap().order.id;

    let err = set_status(&app.state, &user, order_id, OrderStatus::Shipped)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden));

    let order = set_status(&app.state, &boss, order_id, OrderStatus::Processing)
        .await
        .unwrap();
    assert_eq!(order.order_status, OrderStatus::Processing);

    let order = set_status(&app.state, &boss, order_id, OrderStatus::Processing)
        .await
        .unwrap();
    assert_eq!(order.order_status, OrderStatus::Processing);

    set_status(&app.state, &boss, order_id, OrderStatus::Shipped)
        .await
        .unwrap();
    let err = set_status(&app.state, &boss, order_id, OrderStatus::Pending)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        AppError::InvalidTransition {
            from: OrderStatus::Shipped,
            to: OrderStatus::Pending
        }
    ));

    set_status(&app.state, &boss, order_id, OrderStatus::Delivered)
        .await
        .unwrap();
    let err = set_status(&app.state, &boss, order_id, OrderStatus::Cancelled)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidTransition { .. }));
    assert_eq!(stock_of(&app.state, tee.id).await, (4, 1));

    let err = set_status(&app.state, &boss, Uuid::new_v4(), OrderStatus::Shipped)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound("order")));
}

#[tokio::test]
async fn cancelling_restores_committed_stock_once() {
    let app = setup().await;
    let user = customer(&app.state).await;
    let boss = admin(&app.state).await;
    let tee = create_product(&app.state, "Tee", 100, 5, &[]).await;

    add(&app.state, &user, tee.id, 3).await;
    let order_id = checkout(&app.state, &user).await.unwrap().order.id;
    assert_eq!(stock_of(&app.state, tee.id).await, (2, 3));

    set_status(&app.state, &boss, order_id, OrderStatus::Processing)
        .await
        .unwrap();
    let order = set_status(&app.state, &boss, order_id, OrderStatus::Cancelled)
        .await
        .unwrap();
    assert_eq!(order.order_status, OrderStatus::Cancelled);
    assert_eq!(stock_of(&app.state, tee.id).await, (5, 0));

    set_status(&app.state, &boss, order_id, OrderStatus::Cancelled)
        .await
        .unwrap();
    assert_eq!(stock_of(&app.state, tee.id).await, (5, 0));
}

#[tokio::test]
async fn owners_cancel_only_pending_orders() {
    let app = setup().await;
    let user = customer(&app.state).await;
    let stranger = customer(&app.state).await;
    let boss = admin(&app.state).await;
    let tee = create_product(&app.state, "Tee", 100, 5, &[]).await;

    add(&app.state, &user, tee.id, 1).await;
    let first = checkout(&app.state, &user).await.unwrap().order.id;
    add(&app.state, &user, tee.id, 1).await;
    let second = checkout(&app.state, &user).await.unwrap().order.id;
    assert_eq!(stock_of(&app.state, tee.id).await, (3, 2));

    let err = order_service::cancel_order(&app.state, &stranger, CancelOrderRequest { order_id: first })
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound("order")));

    let cancelled = order_service::cancel_order(&app.state, &user, CancelOrderRequest { order_id: first })
        .await
        .unwrap()
        .data
        .unwrap();
    assert_eq!(cancelled.order_status, OrderStatus::Cancelled);
    assert_eq!(stock_of(&app.state, tee.id).await, (4, 1));

    set_status(&app.state, &boss, second, OrderStatus::Processing)
        .await
        .unwrap();
    let err = order_service::cancel_order(&app.state, &user, CancelOrderRequest { order_id: second })
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        AppError::InvalidTransition {
            from: OrderStatus::Processing,
            to: OrderStatus::Cancelled
        }
    ));
}

#[tokio::test]
async fn customers_only_see_their_own_orders() {
    let app = setup().await;
    let user = customer(&app.state).await;
    let stranger = customer(&app.state).await;
    let boss = admin(&app.state).await;
    let tee = create_product(&app.state, "Tee", 100, 10, &[]).await;

    add(&app.state, &user, tee.id, 1).await;
    let kept = checkout(&app.state, &user).await.unwrap().order.id;
    add(&app.state, &user, tee.id, 2).await;
    let dropped = checkout(&app.state, &user).await.unwrap().order.id;
    order_service::cancel_order(&app.state, &user, CancelOrderRequest { order_id: dropped })
        .await
        .unwrap();

    let mine = order_service::list_user_orders(&app.state, &user, OrderListQuery::default())
        .await
        .unwrap();
    let meta = mine.meta.clone().unwrap();
    assert_eq!(meta.total, Some(2));
    assert_eq!(meta.page, Some(1));
    assert_eq!(meta.per_page, Some(20));
    let mine = mine.data.unwrap();
    assert_eq!(mine.items.len(), 2);
    assert!(mine.items.iter().all(|o| o.items.len() == 1));

    let cancelled = order_service::list_user_orders(
        &app.state,
        &user,
        OrderListQuery {
            status: Some(OrderStatus::Cancelled),
            ..Default::default()
        },
    )
    .await
    .unwrap()
    .data
    .unwrap();
    assert_eq!(cancelled.items.len(), 1);
    assert_eq!(cancelled.items[0].order.id, dropped);

    let theirs = order_service::list_user_orders(&app.state, &stranger, OrderListQuery::default())
        .await
        .unwrap()
        .data
        .unwrap();
    assert!(theirs.items.is_empty());

    let fetched = order_service::get_order(&app.state, &user, kept)
        .await
        .unwrap()
        .data
        .unwrap();
    assert_eq!(fetched.order.id, kept);
    assert_eq!(fetched.items[0].quantity, 1);

    let err = order_service::get_order(&app.state, &stranger, kept)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound("order")));

    let err = admin_service::list_all_orders(&app.state, &user, OrderListQuery::default())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden));
    let all = admin_service::list_all_orders(&app.state, &boss, OrderListQuery::default())
        .await
        .unwrap()
        .data
        .unwrap();
    assert_eq!(all.items.len(), 2);
}

#[tokio::test]
async fn summary_and_low_stock_reports() {
    let app = setup().await;
    let user = customer(&app.state).await;
    let boss = admin(&app.state).await;
    let tee = create_product(&app.state, "Tee", 100, 10, &[]).await;
    let cap = create_product(&app.state, "Cap", 40, 4, &[]).await;

    add(&app.state, &user, tee.id, 2).await;
    checkout(&app.state, &user).await.unwrap();
    add(&app.state, &user, cap.id, 1).await;
    checkout(&app.state, &user).await.unwrap();

    let err = admin_service::order_summary(&app.state, &user).await.unwrap_err();
    assert!(matches!(err, AppError::Forbidden));

    let summary = admin_service::order_summary(&app.state, &boss)
        .await
        .unwrap()
        .data
        .unwrap();
    assert_eq!(summary.total_revenue, 240);
    assert_eq!(summary.order_count, 2);
    assert_eq!(summary.product_count, 2);
    assert_eq!(summary.recent_orders.len(), 2);

    let low = admin_service::list_low_stock(&app.state, &boss, LowStockQuery::default())
        .await
        .unwrap()
        .data
        .unwrap();
    assert_eq!(low.items.len(), 1);
    assert_eq!(low.items[0].id, cap.id);
    assert_eq!(low.items[0].stock, 3);

    let low = admin_service::list_low_stock(
        &app.state,
        &boss,
        LowStockQuery {
            threshold: Some(8),
            ..Default::default()
        },
    )
    .await
    .unwrap()
    .data
    .unwrap();
    assert_eq!(low.items.len(), 2);
    assert_eq!(low.items[0].id, cap.id);
}

#[tokio::test]
async fn inventory_adjustments_never_go_negative() {
    let app = setup().await;
    let boss = admin(&app.state).await;
    let user = customer(&app.state).await;
    let tee = create_product(&app.state, "Tee", 100, 2, &[]).await;

    let err = admin_service::adjust_inventory(&app.state, &user, tee.id, InventoryAdjustRequest { delta: 5 })
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden));

    let err = admin_service::adjust_inventory(&app.state, &boss, tee.id, InventoryAdjustRequest { delta: -3 })
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));
    let err = admin_service::adjust_inventory(&app.state, &boss, tee.id, InventoryAdjustRequest { delta: 0 })
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    let product = admin_service::adjust_inventory(&app.state, &boss, tee.id, InventoryAdjustRequest { delta: 8 })
        .await
        .unwrap()
        .data
        .unwrap();
    assert_eq!(product.stock, 10);
    assert_eq!(stock_of(&app.state, tee.id).await, (10, 0));
}
