mod common;

use common::{CLIENT_KEY, StubGateway, address, create_coupon, create_product, customer, set_price, setup, stock_of};
use storefront_api::{
    dto::{
        cart::AddToCartRequest,
        orders::{
            CancelOrderRequest, OnlinePaymentResponse, OrderItemRequest, PlaceOnlineOrderRequest,
            VerifyPaymentRequest, VerifyPaymentResponse,
        },
    },
    entity::sea_orm_active_enums::{CouponKind, OrderStatus, PaymentMethod, PaymentStatus},
    error::AppError,
    middleware::auth::AuthUser,
    models::Order,
    routes::params::OrderListQuery,
    services::{cart_service, order_service},
    state::AppState,
};
use uuid::Uuid;

fn item(product_id: Uuid, quantity: i32) -> OrderItemRequest {
    OrderItemRequest {
        product_id,
        size: "M".into(),
        color: "black".into(),
        quantity,
    }
}

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

async fn place(
    state: &AppState,
    user: &AuthUser,
    items: Vec<OrderItemRequest>,
    total_amount: i64,
) -> Result<OnlinePaymentResponse, AppError> {
    order_service::place_order_online(
        state,
        user,
        PlaceOnlineOrderRequest {
            order_items: items,
            shipping_address: address(),
            total_amount,
            coupon_code: None,
        },
    )
    .await
    .map(|resp| resp.data.expect("payment"))
}

async fn verify(
    state: &AppState,
    user: &AuthUser,
    intent_id: &str,
) -> Result<VerifyPaymentResponse, AppError> {
    verify_signed(state, user, intent_id, None, None).await
}

async fn verify_signed(
    state: &AppState,
    user: &AuthUser,
    intent_id: &str,
    payment_id: Option<&str>,
    signature: Option<&str>,
) -> Result<VerifyPaymentResponse, AppError> {
    order_service::verify_payment(
        state,
        user,
        VerifyPaymentRequest {
            razorpay_order_id: intent_id.into(),
            razorpay_payment_id: payment_id.map(str::to_string),
            razorpay_signature: signature.map(str::to_string),
        },
    )
    .await
    .map(|resp| resp.data.expect("verification"))
}

async fn order_of(state: &AppState, user: &AuthUser, order_id: Uuid) -> Order {
    order_service::get_order(state, user, order_id)
        .await
        .expect("load order")
        .data
        .expect("order")
        .order
}

#[tokio::test]
async fn online_order_waits_for_payment_before_taking_stock() {
    let app = setup().await;
    let user = customer(&app.state).await;
    let tee = create_product(&app.state, "Tee", 100, 5, &[]).await;
    add(&app.state, &user, tee.id, 2).await;

    let payment = place(&app.state, &user, vec![item(tee.id, 2)], 200)
        .await
        .unwrap();
    assert_eq!(payment.amount, 200);
    assert_eq!(payment.currency, "INR");
    assert_eq!(payment.key_id, CLIENT_KEY);
    assert_eq!(
        app.gateway.receipt_of(&payment.razorpay_order_id),
        Some(payment.order_id.to_string())
    );

    let order = order_of(&app.state, &user, payment.order_id).await;
    assert_eq!(order.payment_method, PaymentMethod::Razorpay);
    assert_eq!(order.payment_status, PaymentStatus::Pending);
    assert_eq!(order.order_status, OrderStatus::Pending);
    assert_eq!(
        order.gateway_order_id.as_deref(),
        Some(payment.razorpay_order_id.as_str())
    );
    assert_eq!(stock_of(&app.state, tee.id).await, (5, 0));

    let cart = cart_service::get_cart(&app.state, &user)
        .await
        .unwrap()
        .data
        .unwrap();
    assert_eq!(cart.total_items, 2);
}

#[tokio::test]
async fn verification_commits_stock_once_and_is_repeatable() {
    let app = setup().await;
    let user = customer(&app.state).await;
    let tee = create_product(&app.state, "Tee", 100, 5, &[]).await;
    add(&app.state, &user, tee.id, 2).await;

    let payment = place(&app.state, &user, vec![item(tee.id, 2)], 200)
        .await
        .unwrap();

    let err = verify(&app.state, &user, &payment.razorpay_order_id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::PaymentIncomplete(ref status) if status == "created"));
    assert_eq!(stock_of(&app.state, tee.id).await, (5, 0));

    app.gateway.mark_paid(&payment.razorpay_order_id);
    let verified = verify(&app.state, &user, &payment.razorpay_order_id)
        .await
        .unwrap();
    assert_eq!(verified.order_id, payment.order_id);

    let order = order_of(&app.state, &user, payment.order_id).await;
    assert_eq!(order.payment_status, PaymentStatus::Paid);
    assert!(order.is_paid);
    assert!(order.paid_at.is_some());
    assert_eq!(stock_of(&app.state, tee.id).await, (3, 2));

    let cart = cart_service::get_cart(&app.state, &user)
        .await
        .unwrap()
        .data
        .unwrap();
    assert!(cart.items.is_empty());

    verify(&app.state, &user, &payment.razorpay_order_id)
        .await
        .unwrap();
    assert_eq!(stock_of(&app.state, tee.id).await, (3, 2));
}

#[tokio::test]
async fn client_total_must_match_server_total() {
    let app = setup().await;
    let user = customer(&app.state).await;
    let tee = create_product(&app.state, "Tee", 100, 5, &[]).await;

    let err = place(&app.state, &user, vec![item(tee.id, 2)], 150)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    let orders = order_service::list_user_orders(&app.state, &user, OrderListQuery::default())
        .await
        .unwrap()
        .data
        .unwrap();
    assert!(orders.items.is_empty());

    let err = place(&app.state, &user, Vec::new(), 0).await.unwrap_err();
    assert!(matches!(err, AppError::EmptyCart));

    let err = place(&app.state, &user, vec![item(tee.id, 6)], 600)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InsufficientStock { available: 5, .. }));
}

#[tokio::test]
async fn carted_lines_keep_their_price_and_duplicates_merge() {
    let app = setup().await;
    let user = customer(&app.state).await;
    let tee = create_product(&app.state, "Tee", 100, 10, &[]).await;
    let cap = create_product(&app.state, "Cap", 40, 10, &[]).await;
    add(&app.state, &user, tee.id, 2).await;
    set_price(&app.state, tee.id, 150).await;

    // Tee from the cart at 100, cap straight from the catalog at 40.
    let payment = place(
        &app.state,
        &user,
        vec![item(tee.id, 1), item(cap.id, 1), item(tee.id, 1)],
        240,
    )
    .await
    .unwrap();
    assert_eq!(payment.amount, 240);

    let placed = order_service::get_order(&app.state, &user, payment.order_id)
        .await
        .unwrap()
        .data
        .unwrap();
    assert_eq!(placed.items.len(), 2);
    let tee_line = placed
        .items
        .iter()
        .find(|line| line.product_id == tee.id)
        .unwrap();
    assert_eq!(tee_line.quantity, 2);
    assert_eq!(tee_line.unit_price, 100);
}

#[tokio::test]
async fn online_order_with_coupon_charges_the_discounted_total() {
    let app = setup().await;
    let user = customer(&app.state).await;
    let tee = create_product(&app.state, "Tee", 500, 10, &[]).await;
    create_coupon(&app.state, "TENOFF", CouponKind::Percentage, 10, None, chrono::Duration::days(1)).await;

    let payment = order_service::place_order_online(
        &app.state,
        &user,
        PlaceOnlineOrderRequest {
            order_items: vec![item(tee.id, 2)],
            shipping_address: address(),
            total_amount: 900,
            coupon_code: Some("tenoff".into()),
        },
    )
    .await
    .unwrap()
    .data
    .unwrap();
    assert_eq!(payment.amount, 900);

    let order = order_of(&app.state, &user, payment.order_id).await;
    assert_eq!(order.subtotal_amount, 1000);
    assert_eq!(order.discount_amount, 100);
    assert_eq!(order.coupon_code.as_deref(), Some("TENOFF"));
}

#[tokio::test]
async fn receipt_mismatch_is_rejected() {
    let app = setup().await;
    let user = customer(&app.state).await;
    let tee = create_product(&app.state, "Tee", 100, 5, &[]).await;

    let payment = place(&app.state, &user, vec![item(tee.id, 1)], 100)
        .await
        .unwrap();
    app.gateway.mark_paid(&payment.razorpay_order_id);
    app.gateway
        .set_receipt(&payment.razorpay_order_id, &Uuid::new_v4().to_string());

    let err = verify(&app.state, &user, &payment.razorpay_order_id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));
    let order = order_of(&app.state, &user, payment.order_id).await;
    assert_eq!(order.payment_status, PaymentStatus::Pending);
    assert_eq!(stock_of(&app.state, tee.id).await, (5, 0));
}

#[tokio::test]
async fn gateway_outage_closes_the_order_as_failed() {
    let app = setup().await;
    let user = customer(&app.state).await;
    let tee = create_product(&app.state, "Tee", 100, 5, &[]).await;

    app.gateway.set_unavailable(true);
    let err = place(&app.state, &user, vec![item(tee.id, 1)], 100)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::GatewayUnavailable(_)));

    app.gateway.set_unavailable(false);
    app.gateway.set_hang(true);
    let err = place(&app.state, &user, vec![item(tee.id, 1)], 100)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::GatewayUnavailable(_)));

    let orders = order_service::list_user_orders(&app.state, &user, OrderListQuery::default())
        .await
        .unwrap()
        .data
        .unwrap();
    assert_eq!(orders.items.len(), 2);
    for placed in &orders.items {
        assert_eq!(placed.order.order_status, OrderStatus::Cancelled);
        assert_eq!(placed.order.payment_status, PaymentStatus::Failed);
        assert!(placed.order.gateway_order_id.is_none());
    }
    assert_eq!(stock_of(&app.state, tee.id).await, (5, 0));

    app.gateway.set_hang(false);
    let retry = place(&app.state, &user, vec![item(tee.id, 1)], 100)
        .await
        .unwrap();
    let order = order_of(&app.state, &user, retry.order_id).await;
    assert_eq!(order.order_status, OrderStatus::Pending);
    assert_eq!(order.payment_status, PaymentStatus::Pending);
}

#[tokio::test]
async fn coupon_survives_a_gateway_outage() {
    let app = setup().await;
    let user = customer(&app.state).await;
    let tee = create_product(&app.state, "Tee", 500, 10, &[]).await;
    create_coupon(&app.state, "TENOFF", CouponKind::Percentage, 10, None, chrono::Duration::days(1)).await;

    let request = || PlaceOnlineOrderRequest {
        order_items: vec![item(tee.id, 2)],
        shipping_address: address(),
        total_amount: 900,
        coupon_code: Some("tenoff".into()),
    };

    app.gateway.set_unavailable(true);
    let err = order_service::place_order_online(&app.state, &user, request())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::GatewayUnavailable(_)));

    app.gateway.set_unavailable(false);
    let payment = order_service::place_order_online(&app.state, &user, request())
        .await
        .unwrap()
        .data
        .unwrap();
    assert_eq!(payment.amount, 900);
    let order = order_of(&app.state, &user, payment.order_id).await;
    assert_eq!(order.discount_amount, 100);
    assert_eq!(order.coupon_code.as_deref(), Some("TENOFF"));

    let err = order_service::place_order_online(&app.state, &user, request())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::AlreadyRedeemed));
}

#[tokio::test]
async fn cancellation_during_verification_is_not_overridden() {
    let app = setup().await;
    let user = customer(&app.state).await;
    let tee = create_product(&app.state, "Tee", 100, 5, &[]).await;

    let payment = place(&app.state, &user, vec![item(tee.id, 2)], 200)
        .await
        .unwrap();
    app.gateway.mark_paid(&payment.razorpay_order_id);
    app.gateway
        .cancel_during_fetch(app.state.orm.clone(), payment.order_id);

    let err = verify(&app.state, &user, &payment.razorpay_order_id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    let order = order_of(&app.state, &user, payment.order_id).await;
    assert_eq!(order.order_status, OrderStatus::Cancelled);
    assert_eq!(order.payment_status, PaymentStatus::Pending);
    assert!(order.paid_at.is_none());
    assert_eq!(stock_of(&app.state, tee.id).await, (5, 0));
}

#[tokio::test]
async fn verification_during_outage_changes_nothing() {
    let app = setup().await;
    let user = customer(&app.state).await;
    let tee = create_product(&app.state, "Tee", 100, 5, &[]).await;

    let payment = place(&app.state, &user, vec![item(tee.id, 1)], 100)
        .await
        .unwrap();
    app.gateway.mark_paid(&payment.razorpay_order_id);
    app.gateway.set_unavailable(true);

    let err = verify(&app.state, &user, &payment.razorpay_order_id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::GatewayUnavailable(_)));
    assert_eq!(stock_of(&app.state, tee.id).await, (5, 0));

    app.gateway.set_unavailable(false);
    verify(&app.state, &user, &payment.razorpay_order_id)
        .await
        .unwrap();
    assert_eq!(stock_of(&app.state, tee.id).await, (4, 1));
}

#[tokio::test]
async fn checkout_signature_is_checked_when_sent() {
    let app = setup().await;
    let user = customer(&app.state).await;
    let tee = create_product(&app.state, "Tee", 100, 5, &[]).await;

    let payment = place(&app.state, &user, vec![item(tee.id, 1)], 100)
        .await
        .unwrap();
    let intent = payment.razorpay_order_id.as_str();
    app.gateway.mark_paid(intent);

    let err = verify_signed(&app.state, &user, intent, Some("pay_1"), Some("forged"))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    let err = verify_signed(&app.state, &user, intent, Some("pay_1"), None)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));
    assert_eq!(stock_of(&app.state, tee.id).await, (5, 0));

    let signature = StubGateway::signature_for(intent, "pay_1");
    verify_signed(&app.state, &user, intent, Some("pay_1"), Some(&signature))
        .await
        .unwrap();
    assert_eq!(stock_of(&app.state, tee.id).await, (4, 1));
}

#[tokio::test]
async fn verification_is_scoped_to_the_buyer() {
    let app = setup().await;
    let user = customer(&app.state).await;
    let stranger = customer(&app.state).await;
    let tee = create_product(&app.state, "Tee", 100, 5, &[]).await;

    let payment = place(&app.state, &user, vec![item(tee.id, 1)], 100)
        .await
        .unwrap();
    app.gateway.mark_paid(&payment.razorpay_order_id);

    let err = verify(&app.state, &stranger, &payment.razorpay_order_id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound("order")));

    let err = verify(&app.state, &user, "order_unknown").await.unwrap_err();
    assert!(matches!(err, AppError::NotFound("order")));
}

#[tokio::test]
async fn cancelled_online_order_cannot_be_paid() {
    let app = setup().await;
    let user = customer(&app.state).await;
    let tee = create_product(&app.state, "Tee", 100, 5, &[]).await;

    let payment = place(&app.state, &user, vec![item(tee.id, 1)], 100)
        .await
        .unwrap();
    order_service::cancel_order(
        &app.state,
        &user,
        CancelOrderRequest {
            order_id: payment.order_id,
        },
    )
    .await
    .unwrap();
    assert_eq!(stock_of(&app.state, tee.id).await, (5, 0));

    app.gateway.mark_paid(&payment.razorpay_order_id);
    let err = verify(&app.state, &user, &payment.razorpay_order_id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));
    assert_eq!(stock_of(&app.state, tee.id).await, (5, 0));
}

#[tokio::test]
async fn late_payment_for_sold_out_stock_still_records_payment() {
    let app = setup().await;
    let first = customer(&app.state).await;
    let second = customer(&app.state).await;
    let lamp = create_product(&app.state, "Lamp", 700, 1, &[]).await;

    let a = place(&app.state, &first, vec![item(lamp.id, 1)], 700)
        .await
        .unwrap();
    let b = place(&app.state, &second, vec![item(lamp.id, 1)], 700)
        .await
        .unwrap();
    app.gateway.mark_paid(&a.razorpay_order_id);
    app.gateway.mark_paid(&b.razorpay_order_id);

    verify(&app.state, &first, &a.razorpay_order_id).await.unwrap();
    verify(&app.state, &second, &b.razorpay_order_id).await.unwrap();

    assert_eq!(stock_of(&app.state, lamp.id).await, (0, 1));
    let order = order_of(&app.state, &second, b.order_id).await;
    assert_eq!(order.payment_status, PaymentStatus::Paid);
}
