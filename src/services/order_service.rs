use std::collections::HashMap;

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DatabaseTransaction, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Select, Set, TransactionTrait,
    sea_query::{Expr, LockType},
};
use uuid::Uuid;

use crate::{
    audit,
    domain::{
        address::validate_address,
        cart::{Line, recompute_totals},
        coupon::compute_discount,
        order::check_transition,
    },
    dto::orders::{
        CancelOrderRequest, OnlinePaymentResponse, OrderItemRequest, OrderList, OrderWithItems,
        PlaceOnlineOrderRequest, PlaceOrderRequest, VerifyPaymentRequest, VerifyPaymentResponse,
    },
    entity::{
        Carts, OrderItems, Orders, Products, carts, coupons, order_items, orders, products,
        sea_orm_active_enums::{OrderStatus, PaymentMethod, PaymentStatus},
    },
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::{Order, OrderLine, ShippingAddress},
    payment::{IntentStatus, with_timeout},
    response::{ApiResponse, Meta},
    routes::params::{OrderListQuery, SortOrder},
    services::{cart_service, coupon_service},
    state::AppState,
};

/// Cash-on-delivery checkout. Stock is committed here, all-or-nothing.
pub async fn place_order(
    state: &AppState,
    user: &AuthUser,
    payload: PlaceOrderRequest,
) -> AppResult<ApiResponse<OrderWithItems>> {
    validate_address(&payload.shipping_address)?;

    let txn = state.orm.begin().await?;
    let cart = cart_service::lock_cart(&txn, user.user_id)
        .await?
        .ok_or(AppError::EmptyCart)?;
    let lines = cart_service::load_lines(&txn, cart.id).await?;
    if lines.is_empty() {
        return Err(AppError::EmptyCart);
    }

    let subtotal = recompute_totals(&lines).total_price;
    let coupon = resolve_coupon(&txn, user.user_id, payload.coupon_code.as_deref()).await?;
    let discount = discount_for(coupon.as_ref(), subtotal);

    for line in &lines {
        if !take_stock(&txn, line.product_id, line.quantity).await? {
            let available = current_stock(&txn, line.product_id).await?;
            tracing::info!(
                product_id = %line.product_id,
                wanted = line.quantity,
                available,
                "checkout rejected, stock moved since the item was carted"
            );
            return Err(AppError::InsufficientStock {
                product_id: line.product_id,
                available,
            });
        }
    }

    let order = insert_order(
        &txn,
        NewOrder {
            user_id: user.user_id,
            shipping_address: payload.shipping_address,
            payment_method: PaymentMethod::Cod,
            subtotal,
            discount,
            coupon_code: coupon.as_ref().map(|c| c.code.clone()),
            stock_committed: true,
        },
    )
    .await?;
    let items = insert_order_items(&txn, order.id, &lines).await?;
    if let Some(coupon) = &coupon {
        coupon_service::record_redemption(&txn, coupon.id, user.user_id, order.id).await?;
    }
    cart_service::clear(&txn, user.user_id).await?;
    txn.commit().await?;

    tracing::info!(
        order_id = %order.id,
        user_id = %user.user_id,
        total = order.total_amount,
        "cash on delivery order placed"
    );
    audit::record(
        &state.orm,
        user.user_id,
        "order_place_cod",
        "orders",
        serde_json::json!({ "order_id": order.id, "total_amount": order.total_amount }),
    )
    .await;

    Ok(ApiResponse::success(
        "Order placed",
        OrderWithItems {
            order: Order::from(order),
            items,
        },
        Some(Meta::empty()),
    ))
}

/// Online checkout. The order is persisted as Pending before the gateway is
/// contacted; stock is only committed once payment is verified.
pub async fn place_order_online(
    state: &AppState,
    user: &AuthUser,
    payload: PlaceOnlineOrderRequest,
) -> AppResult<ApiResponse<OnlinePaymentResponse>> {
    validate_address(&payload.shipping_address)?;
    let requested = merge_requested(&payload.order_items)?;
    if requested.is_empty() {
        return Err(AppError::EmptyCart);
    }

    let txn = state.orm.begin().await?;
    let cart_lines = match Carts::find()
        .filter(carts::Column::UserId.eq(user.user_id))
        .one(&txn)
        .await?
    {
        Some(cart) => cart_service::load_lines(&txn, cart.id).await?,
        None => Vec::new(),
    };

    let mut lines = Vec::with_capacity(requested.len());
    for item in requested {
        let product = Products::find_by_id(item.product_id)
            .one(&txn)
            .await?
            .ok_or(AppError::NotFound("product"))?;
        if item.quantity > product.stock {
            return Err(AppError::InsufficientStock {
                product_id: product.id,
                available: product.stock.max(0),
            });
        }
        let unit_price = cart_lines
            .iter()
            .find(|line| line.is_variant(item.product_id, &item.size, &item.color))
            .map_or(product.price, |line| line.unit_price);
        lines.push(Line {
            product_id: item.product_id,
            size: item.size,
            color: item.color,
            quantity: item.quantity,
            unit_price,
        });
    }

    let subtotal = recompute_totals(&lines).total_price;
    let coupon = resolve_coupon(&txn, user.user_id, payload.coupon_code.as_deref()).await?;
    let discount = discount_for(coupon.as_ref(), subtotal);
    let expected = subtotal - discount;
    if payload.total_amount != expected {
        return Err(AppError::Validation(format!(
            "total_amount {} does not match order total {expected}",
            payload.total_amount
        )));
    }

    let order = insert_order(
        &txn,
        NewOrder {
            user_id: user.user_id,
            shipping_address: payload.shipping_address,
            payment_method: PaymentMethod::Razorpay,
            subtotal,
            discount,
            coupon_code: coupon.as_ref().map(|c| c.code.clone()),
            stock_committed: false,
        },
    )
    .await?;
    insert_order_items(&txn, order.id, &lines).await?;
    if let Some(coupon) = &coupon {
        coupon_service::record_redemption(&txn, coupon.id, user.user_id, order.id).await?;
    }
    txn.commit().await?;

    let payment = &state.config.payment;
    let intent = match with_timeout(
        payment.timeout,
        state
            .gateway
            .create_intent(order.id, order.total_amount, &payment.currency),
    )
    .await
    {
        Ok(intent) => intent,
        Err(err) => {
            let order_id = order.id;
            if let Err(undo) = abandon_online_order(state, order).await {
                tracing::error!(order_id = %order_id, error = %undo, "failed to close order after gateway error");
            }
            return Err(err.into());
        }
    };

    let order_id = order.id;
    let mut active: orders::ActiveModel = order.into();
    active.gateway_order_id = Set(Some(intent.intent_id.clone()));
    active.updated_at = Set(Utc::now().into());
    let order = active.update(&state.orm).await.map_err(|err| {
        tracing::warn!(
            order_id = %order_id,
            gateway_order_id = %intent.intent_id,
            error = %err,
            "payment intent created but not linked to its order"
        );
        err
    })?;

    tracing::info!(
        order_id = %order.id,
        gateway_order_id = %intent.intent_id,
        amount = intent.amount,
        "online order created, awaiting payment"
    );
    audit::record(
        &state.orm,
        user.user_id,
        "order_place_online",
        "orders",
        serde_json::json!({ "order_id": order.id, "gateway_order_id": intent.intent_id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Payment initiated",
        OnlinePaymentResponse {
            order_id: order.id,
            razorpay_order_id: intent.intent_id,
            amount: intent.amount,
            currency: intent.currency,
            key_id: intent.client_key,
        },
        Some(Meta::empty()),
    ))
}

/// Confirms an online payment with the gateway. Safe to repeat: an order that
/// is already paid is reported as verified without touching anything.
pub async fn verify_payment(
    state: &AppState,
    user: &AuthUser,
    payload: VerifyPaymentRequest,
) -> AppResult<ApiResponse<VerifyPaymentResponse>> {
    let intent_id = payload.razorpay_order_id.trim();
    let order = Orders::find()
        .filter(orders::Column::GatewayOrderId.eq(intent_id))
        .filter(orders::Column::UserId.eq(user.user_id))
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound("order"))?;

    if order.payment_status == PaymentStatus::Paid {
        return Ok(verified(order.id));
    }
    if order.order_status == OrderStatus::Cancelled {
        return Err(AppError::Validation("order has been cancelled".to_string()));
    }

    match (
        payload.razorpay_payment_id.as_deref(),
        payload.razorpay_signature.as_deref(),
    ) {
        (Some(payment_id), Some(signature)) => {
            if !state
                .gateway
                .verify_signature(intent_id, payment_id, signature)
            {
                tracing::warn!(order_id = %order.id, "payment signature mismatch");
                return Err(AppError::Validation("invalid payment signature".to_string()));
            }
        }
        (None, None) => {}
        _ => {
            return Err(AppError::Validation(
                "razorpay_payment_id and razorpay_signature must be sent together".to_string(),
            ));
        }
    }

    let remote = with_timeout(
        state.config.payment.timeout,
        state.gateway.fetch_intent_status(intent_id),
    )
    .await?;

    let order_ref = order.id.to_string();
    if remote.receipt_order_id.as_deref() != Some(order_ref.as_str()) {
        tracing::warn!(
            order_id = %order.id,
            receipt = ?remote.receipt_order_id,
            "gateway receipt does not match order"
        );
        return Err(AppError::Validation(
            "payment does not belong to this order".to_string(),
        ));
    }
    if remote.status != IntentStatus::Paid {
        return Err(AppError::PaymentIncomplete(remote.status.as_str().to_string()));
    }

    let txn = state.orm.begin().await?;
    let order = Orders::find_by_id(order.id)
        .lock(LockType::Update)
        .one(&txn)
        .await?
        .ok_or(AppError::NotFound("order"))?;
    if order.payment_status == PaymentStatus::Paid {
        txn.commit().await?;
        return Ok(verified(order.id));
    }
    if order.order_status == OrderStatus::Cancelled {
        tracing::warn!(order_id = %order.id, gateway_order_id = %intent_id, "payment reported for a cancelled order");
        return Err(AppError::Validation("order has been cancelled".to_string()));
    }

    let items = OrderItems::find()
        .filter(order_items::Column::OrderId.eq(order.id))
        .all(&txn)
        .await?;
    for item in &items {
        if !take_stock(&txn, item.product_id, item.quantity).await? {
            // Payment is already captured; fulfilment sorts out the shortfall.
            tracing::warn!(
                order_id = %order.id,
                product_id = %item.product_id,
                quantity = item.quantity,
                "paid order line oversold, stock not deducted"
            );
        }
    }

    let now = Utc::now();
    let order_id = order.id;
    let mut active: orders::ActiveModel = order.into();
    active.payment_status = Set(PaymentStatus::Paid);
    active.paid_at = Set(Some(now.into()));
    active.stock_committed = Set(true);
    active.updated_at = Set(now.into());
    active.update(&txn).await?;
    cart_service::clear(&txn, user.user_id).await?;
    txn.commit().await?;

    tracing::info!(order_id = %order_id, gateway_order_id = %intent_id, "payment verified");
    audit::record(
        &state.orm,
        user.user_id,
        "order_paid",
        "orders",
        serde_json::json!({ "order_id": order_id, "gateway_order_id": intent_id }),
    )
    .await;

    Ok(verified(order_id))
}

pub async fn list_user_orders(
    state: &AppState,
    user: &AuthUser,
    query: OrderListQuery,
) -> AppResult<ApiResponse<OrderList>> {
    let condition = Condition::all().add(orders::Column::UserId.eq(user.user_id));
    list_orders_where(&state.orm, condition, query).await
}

pub async fn get_order(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<OrderWithItems>> {
    let order = Orders::find()
        .filter(
            Condition::all()
                .add(orders::Column::UserId.eq(user.user_id))
                .add(orders::Column::Id.eq(id)),
        )
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound("order"))?;

    let items = lines_of(&state.orm, order.id).await?;
    Ok(ApiResponse::ok(OrderWithItems {
        order: Order::from(order),
        items,
    }))
}

/// Owners may withdraw an order until it leaves Pending.
pub async fn cancel_order(
    state: &AppState,
    user: &AuthUser,
    payload: CancelOrderRequest,
) -> AppResult<ApiResponse<Order>> {
    let txn = state.orm.begin().await?;
    let order = Orders::find()
        .filter(orders::Column::Id.eq(payload.order_id))
        .filter(orders::Column::UserId.eq(user.user_id))
        .lock(LockType::Update)
        .one(&txn)
        .await?
        .ok_or(AppError::NotFound("order"))?;

    if order.order_status != OrderStatus::Pending {
        return Err(AppError::InvalidTransition {
            from: order.order_status,
            to: OrderStatus::Cancelled,
        });
    }
    if order.payment_status == PaymentStatus::Paid {
        return Err(AppError::Validation(
            "paid orders can only be cancelled by an administrator".to_string(),
        ));
    }

    let order = transition(&txn, order, OrderStatus::Cancelled).await?;
    txn.commit().await?;

    audit::record(
        &state.orm,
        user.user_id,
        "order_cancel",
        "orders",
        serde_json::json!({ "order_id": order.id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Order cancelled",
        Order::from(order),
        Some(Meta::empty()),
    ))
}

/// Closes an online order whose payment intent could not be created. The
/// coupon it consumed is handed back so the customer can retry.
async fn abandon_online_order(state: &AppState, order: orders::Model) -> AppResult<()> {
    let txn = state.orm.begin().await?;
    coupon_service::release_redemption(&txn, order.id).await?;
    let order = transition(&txn, order, OrderStatus::Cancelled).await?;

    let mut active: orders::ActiveModel = order.into();
    active.payment_status = Set(PaymentStatus::Failed);
    active.updated_at = Set(Utc::now().into());
    let order = active.update(&txn).await?;
    txn.commit().await?;

    tracing::warn!(order_id = %order.id, "online order closed, payment gateway unavailable");
    Ok(())
}

/// Applies a validated status change. Cancelling an order whose stock was
/// committed hands the units back to the catalog.
pub(crate) async fn transition(
    txn: &DatabaseTransaction,
    order: orders::Model,
    to: OrderStatus,
) -> AppResult<orders::Model> {
    let from = order.order_status;
    check_transition(from, to)?;
    if from == to {
        return Ok(order);
    }

    let restock = to == OrderStatus::Cancelled && order.stock_committed;
    if restock {
        let items = OrderItems::find()
            .filter(order_items::Column::OrderId.eq(order.id))
            .all(txn)
            .await?;
        for item in &items {
            return_stock(txn, item.product_id, item.quantity).await?;
        }
    }

    let mut active: orders::ActiveModel = order.into();
    active.order_status = Set(to);
    if restock {
        active.stock_committed = Set(false);
    }
    active.updated_at = Set(Utc::now().into());
    let order = active.update(txn).await?;

    tracing::info!(order_id = %order.id, %from, %to, restock, "order status changed");
    Ok(order)
}

pub(crate) async fn list_orders_where<C: ConnectionTrait>(
    db: &C,
    mut condition: Condition,
    query: OrderListQuery,
) -> AppResult<ApiResponse<OrderList>> {
    let (page, limit, offset) = query.pagination().normalize();
    if let Some(status) = query.status {
        condition = condition.add(orders::Column::OrderStatus.eq(status));
    }

    let finder: Select<Orders> = Orders::find().filter(condition);
    let finder = match query.sort_order.unwrap_or(SortOrder::Desc) {
        SortOrder::Asc => finder.order_by_asc(orders::Column::CreatedAt),
        SortOrder::Desc => finder.order_by_desc(orders::Column::CreatedAt),
    };

    let total = finder.clone().count(db).await? as i64;
    let orders = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(db)
        .await?;

    let ids: Vec<Uuid> = orders.iter().map(|o| o.id).collect();
    let mut lines_by_order: HashMap<Uuid, Vec<OrderLine>> = HashMap::new();
    if !ids.is_empty() {
        for item in OrderItems::find()
            .filter(order_items::Column::OrderId.is_in(ids))
            .all(db)
            .await?
        {
            lines_by_order
                .entry(item.order_id)
                .or_default()
                .push(OrderLine::from(item));
        }
    }

    let items = orders
        .into_iter()
        .map(|order| OrderWithItems {
            items: lines_by_order.remove(&order.id).unwrap_or_default(),
            order: Order::from(order),
        })
        .collect();

    Ok(ApiResponse::success(
        "Orders",
        OrderList { items },
        Some(Meta::new(page, limit, total)),
    ))
}

pub(crate) async fn lines_of<C: ConnectionTrait>(db: &C, order_id: Uuid) -> AppResult<Vec<OrderLine>> {
    let lines = OrderItems::find()
        .filter(order_items::Column::OrderId.eq(order_id))
        .all(db)
        .await?
        .into_iter()
        .map(OrderLine::from)
        .collect();
    Ok(lines)
}

fn verified(order_id: Uuid) -> ApiResponse<VerifyPaymentResponse> {
    ApiResponse::success(
        "Payment verified",
        VerifyPaymentResponse { order_id },
        Some(Meta::empty()),
    )
}

/// Collapses repeated variants and rejects non-positive quantities.
fn merge_requested(items: &[OrderItemRequest]) -> AppResult<Vec<OrderItemRequest>> {
    let mut merged: Vec<OrderItemRequest> = Vec::with_capacity(items.len());
    for item in items {
        if item.quantity < 1 {
            return Err(AppError::Validation(
                "quantity must be greater than 0".to_string(),
            ));
        }
        let size = item.size.trim();
        let color = item.color.trim();
        match merged
            .iter_mut()
            .find(|m| m.product_id == item.product_id && m.size == size && m.color == color)
        {
            Some(existing) => existing.quantity = existing.quantity.saturating_add(item.quantity),
            None => merged.push(OrderItemRequest {
                product_id: item.product_id,
                size: size.to_string(),
                color: color.to_string(),
                quantity: item.quantity,
            }),
        }
    }
    Ok(merged)
}

async fn resolve_coupon(
    txn: &DatabaseTransaction,
    user_id: Uuid,
    code: Option<&str>,
) -> AppResult<Option<coupons::Model>> {
    match code.map(str::trim).filter(|c| !c.is_empty()) {
        Some(code) => Ok(Some(
            coupon_service::find_redeemable(txn, user_id, code).await?,
        )),
        None => Ok(None),
    }
}

fn discount_for(coupon: Option<&coupons::Model>, subtotal: i64) -> i64 {
    coupon.map_or(0, |c| {
        compute_discount(&coupon_service::rule_of(c), subtotal).discount
    })
}

/// Decrement-if-sufficient. Returns false when the product has fewer than
/// `quantity` units left.
async fn take_stock<C: ConnectionTrait>(db: &C, product_id: Uuid, quantity: i32) -> AppResult<bool> {
    let result = Products::update_many()
        .col_expr(
            products::Column::Stock,
            Expr::col(products::Column::Stock).sub(quantity),
        )
        .col_expr(
            products::Column::Sold,
            Expr::col(products::Column::Sold).add(quantity),
        )
        .filter(products::Column::Id.eq(product_id))
        .filter(products::Column::Stock.gte(quantity))
        .exec(db)
        .await?;
    Ok(result.rows_affected == 1)
}

async fn return_stock<C: ConnectionTrait>(db: &C, product_id: Uuid, quantity: i32) -> AppResult<()> {
    Products::update_many()
        .col_expr(
            products::Column::Stock,
            Expr::col(products::Column::Stock).add(quantity),
        )
        .col_expr(
            products::Column::Sold,
            Expr::col(products::Column::Sold).sub(quantity),
        )
        .filter(products::Column::Id.eq(product_id))
        .exec(db)
        .await?;
    Ok(())
}

async fn current_stock<C: ConnectionTrait>(db: &C, product_id: Uuid) -> AppResult<i32> {
    let stock = Products::find_by_id(product_id)
        .one(db)
        .await?
        .map_or(0, |p| p.stock.max(0));
    Ok(stock)
}

struct NewOrder {
    user_id: Uuid,
    shipping_address: ShippingAddress,
    payment_method: PaymentMethod,
    subtotal: i64,
    discount: i64,
    coupon_code: Option<String>,
    stock_committed: bool,
}

async fn insert_order(txn: &DatabaseTransaction, new: NewOrder) -> AppResult<orders::Model> {
    let now = Utc::now();
    let order = orders::ActiveModel {
        id: Set(Uuid::new_v4()),
        user_id: Set(new.user_id),
        shipping_address: Set(new.shipping_address),
        payment_method: Set(new.payment_method),
        payment_status: Set(PaymentStatus::Pending),
        order_status: Set(OrderStatus::Pending),
        subtotal_amount: Set(new.subtotal),
        discount_amount: Set(new.discount),
        total_amount: Set(new.subtotal - new.discount),
        coupon_code: Set(new.coupon_code),
        gateway_order_id: Set(None),
        stock_committed: Set(new.stock_committed),
        paid_at: Set(None),
        created_at: Set(now.into()),
        updated_at: Set(now.into()),
    }
    .insert(txn)
    .await?;
    Ok(order)
}

/// Copies lines onto the order with the product name as it reads today.
async fn insert_order_items(
    txn: &DatabaseTransaction,
    order_id: Uuid,
    lines: &[Line],
) -> AppResult<Vec<OrderLine>> {
    let ids: Vec<Uuid> = lines.iter().map(|line| line.product_id).collect();
    let names: HashMap<Uuid, String> = Products::find()
        .filter(products::Column::Id.is_in(ids))
        .all(txn)
        .await?
        .into_iter()
        .map(|p| (p.id, p.name))
        .collect();

    let now = Utc::now();
    let mut items = Vec::with_capacity(lines.len());
    for line in lines {
        let item = order_items::ActiveModel {
            id: Set(Uuid::new_v4()),
            order_id: Set(order_id),
            product_id: Set(line.product_id),
            name: Set(names.get(&line.product_id).cloned().unwrap_or_default()),
            size: Set(line.size.clone()),
            color: Set(line.color.clone()),
            quantity: Set(line.quantity),
            unit_price: Set(line.unit_price),
            created_at: Set(now.into()),
        }
        .insert(txn)
        .await?;
        items.push(OrderLine::from(item));
    }
    Ok(items)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(product_id: Uuid, size: &str, quantity: i32) -> OrderItemRequest {
        OrderItemRequest {
            product_id,
            size: size.to_string(),
            color: "black".to_string(),
            quantity,
        }
    }

    #[test]
    fn repeated_variants_are_merged() {
        let id = Uuid::new_v4();
        let merged =
            merge_requested(&[request(id, "M", 1), request(id, " M ", 2), request(id, "L", 1)])
                .unwrap();
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].quantity, 3);
        assert_eq!(merged[1].size, "L");
    }

    #[test]
    fn zero_quantity_request_is_rejected() {
        let err = merge_requested(&[request(Uuid::new_v4(), "M", 0)]).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }
}
