use std::collections::HashMap;

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseTransaction, EntityTrait, QueryFilter,
    QueryOrder, QuerySelect, Set, TransactionTrait,
    sea_query::{LockType, OnConflict},
};
use uuid::Uuid;

use crate::{
    audit,
    domain::cart::{self as rules, Line, StockView},
    dto::cart::{
        AddToCartRequest, CartLineView, CartProduct, CartView, RemoveFromCartRequest,
        UpdateCartRequest,
    },
    entity::{CartItems, Carts, Products, cart_items, carts, products},
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    response::{ApiResponse, Meta},
    state::AppState,
};

pub async fn add_item(
    state: &AppState,
    user: &AuthUser,
    payload: AddToCartRequest,
) -> AppResult<ApiResponse<CartView>> {
    let size = payload.size.trim();
    let color = payload.color.trim();

    let txn = state.orm.begin().await?;
    let cart = lock_or_create_cart(&txn, user.user_id).await?;

    let product = Products::find_by_id(payload.product_id)
        .one(&txn)
        .await?
        .ok_or(AppError::NotFound("product"))?;
    ensure_size_offered(&product, size)?;

    let mut lines = load_lines(&txn, cart.id).await?;
    rules::add_line(
        &mut lines,
        &StockView {
            product_id: product.id,
            price: product.price,
            stock: product.stock,
        },
        size,
        color,
        payload.quantity,
    )?;
    let cart = persist_lines(&txn, cart, &lines).await?;
    txn.commit().await?;

    tracing::debug!(
        user_id = %user.user_id,
        product_id = %product.id,
        quantity = payload.quantity,
        "cart item added"
    );
    audit::record(
        &state.orm,
        user.user_id,
        "cart_add",
        "carts",
        serde_json::json!({ "product_id": product.id, "size": size, "color": color, "quantity": payload.quantity }),
    )
    .await;

    let view = cart_view(&state.orm, cart, lines).await?;
    Ok(ApiResponse::success("Item added to cart", view, Some(Meta::empty())))
}

pub async fn update_item(
    state: &AppState,
    user: &AuthUser,
    payload: UpdateCartRequest,
) -> AppResult<ApiResponse<CartView>> {
    let size = payload.new_size.trim();
    let color = payload.new_color.trim();

    let txn = state.orm.begin().await?;
    let cart = lock_cart(&txn, user.user_id)
        .await?
        .ok_or(AppError::NotFound("cart"))?;
    let mut lines = load_lines(&txn, cart.id).await?;

    let available = if payload.new_quantity > 0 {
        let product = Products::find_by_id(payload.product_id)
            .one(&txn)
            .await?
            .ok_or(AppError::NotFound("product"))?;
        ensure_size_offered(&product, size)?;
        product.stock
    } else {
        0
    };

    rules::update_line(
        &mut lines,
        payload.product_id,
        size,
        color,
        payload.new_quantity,
        available,
    )?;
    let cart = persist_lines(&txn, cart, &lines).await?;
    txn.commit().await?;

    audit::record(
        &state.orm,
        user.user_id,
        "cart_update",
        "carts",
        serde_json::json!({ "product_id": payload.product_id, "size": size, "color": color, "quantity": payload.new_quantity }),
    )
    .await;

    let view = cart_view(&state.orm, cart, lines).await?;
    Ok(ApiResponse::success("Cart updated", view, Some(Meta::empty())))
}

pub async fn remove_item(
    state: &AppState,
    user: &AuthUser,
    payload: RemoveFromCartRequest,
) -> AppResult<ApiResponse<CartView>> {
    let txn = state.orm.begin().await?;
    let cart = lock_cart(&txn, user.user_id)
        .await?
        .ok_or(AppError::NotFound("cart"))?;
    let mut lines = load_lines(&txn, cart.id).await?;
    rules::remove_line(
        &mut lines,
        payload.product_id,
        payload.size.trim(),
        payload.color.trim(),
    )?;
    let cart = persist_lines(&txn, cart, &lines).await?;
    txn.commit().await?;

    audit::record(
        &state.orm,
        user.user_id,
        "cart_remove",
        "carts",
        serde_json::json!({ "product_id": payload.product_id }),
    )
    .await;

    let view = cart_view(&state.orm, cart, lines).await?;
    Ok(ApiResponse::success("Removed from cart", view, Some(Meta::empty())))
}

/// A user without a cart row gets `NotFound`; an emptied cart is returned
/// with zero totals.
pub async fn get_cart(state: &AppState, user: &AuthUser) -> AppResult<ApiResponse<CartView>> {
    let cart = Carts::find()
        .filter(carts::Column::UserId.eq(user.user_id))
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound("cart"))?;
    let lines = load_lines(&state.orm, cart.id).await?;
    let view = cart_view(&state.orm, cart, lines).await?;
    Ok(ApiResponse::ok(view))
}

/// Empties the user's cart inside the caller's transaction. Missing carts
/// are left missing.
pub(crate) async fn clear(txn: &DatabaseTransaction, user_id: Uuid) -> AppResult<()> {
    if let Some(cart) = lock_cart(txn, user_id).await? {
        persist_lines(txn, cart, &[]).await?;
    }
    Ok(())
}

/// Serializes cart writers for one user. The row is created on first use so
/// there is always something to lock.
pub(crate) async fn lock_or_create_cart(
    txn: &DatabaseTransaction,
    user_id: Uuid,
) -> AppResult<carts::Model> {
    let now = Utc::now();
    Carts::insert(carts::ActiveModel {
        id: Set(Uuid::new_v4()),
        user_id: Set(user_id),
        total_items: Set(0),
        total_price: Set(0),
        created_at: Set(now.into()),
        updated_at: Set(now.into()),
    })
    .on_conflict(
        OnConflict::column(carts::Column::UserId)
            .do_nothing()
            .to_owned(),
    )
    .exec_without_returning(txn)
    .await?;

    lock_cart(txn, user_id)
        .await?
        .ok_or(AppError::NotFound("cart"))
}

pub(crate) async fn lock_cart(
    txn: &DatabaseTransaction,
    user_id: Uuid,
) -> AppResult<Option<carts::Model>> {
    let cart = Carts::find()
        .filter(carts::Column::UserId.eq(user_id))
        .lock(LockType::Update)
        .one(txn)
        .await?;
    Ok(cart)
}

pub(crate) async fn load_lines<C: ConnectionTrait>(db: &C, cart_id: Uuid) -> AppResult<Vec<Line>> {
    let lines = CartItems::find()
        .filter(cart_items::Column::CartId.eq(cart_id))
        .order_by_asc(cart_items::Column::Position)
        .all(db)
        .await?
        .into_iter()
        .map(|item| Line {
            product_id: item.product_id,
            size: item.size,
            color: item.color,
            quantity: item.quantity,
            unit_price: item.unit_price,
        })
        .collect();
    Ok(lines)
}

/// Rewrites the cart's lines and the totals derived from them.
async fn persist_lines(
    txn: &DatabaseTransaction,
    cart: carts::Model,
    lines: &[Line],
) -> AppResult<carts::Model> {
    CartItems::delete_many()
        .filter(cart_items::Column::CartId.eq(cart.id))
        .exec(txn)
        .await?;

    let now = Utc::now();
    if !lines.is_empty() {
        let rows = lines
            .iter()
            .enumerate()
            .map(|(position, line)| cart_items::ActiveModel {
                id: Set(Uuid::new_v4()),
                cart_id: Set(cart.id),
                product_id: Set(line.product_id),
                size: Set(line.size.clone()),
                color: Set(line.color.clone()),
                quantity: Set(line.quantity),
                unit_price: Set(line.unit_price),
                position: Set(position as i32),
                created_at: Set(now.into()),
            });
        CartItems::insert_many(rows)
            .exec_without_returning(txn)
            .await?;
    }

    let totals = rules::recompute_totals(lines);
    let mut active: carts::ActiveModel = cart.into();
    active.total_items = Set(totals.total_items);
    active.total_price = Set(totals.total_price);
    active.updated_at = Set(now.into());
    Ok(active.update(txn).await?)
}

fn ensure_size_offered(product: &products::Model, size: &str) -> AppResult<()> {
    if product.sizes.offers(size) {
        Ok(())
    } else {
        Err(AppError::Validation(format!(
            "size {size} is not offered for {}",
            product.name
        )))
    }
}

/// Resolves live product details for each line.
async fn cart_view<C: ConnectionTrait>(
    db: &C,
    cart: carts::Model,
    lines: Vec<Line>,
) -> AppResult<CartView> {
    let ids: Vec<Uuid> = lines.iter().map(|line| line.product_id).collect();
    let products: HashMap<Uuid, products::Model> = if ids.is_empty() {
        HashMap::new()
    } else {
        Products::find()
            .filter(products::Column::Id.is_in(ids))
            .all(db)
            .await?
            .into_iter()
            .map(|p| (p.id, p))
            .collect()
    };

    let items = lines
        .into_iter()
        .map(|line| CartLineView {
            subtotal: line.subtotal(),
            product: products.get(&line.product_id).map(|p| CartProduct {
                name: p.name.clone(),
                image: p.image.clone(),
                stock: p.stock,
                price: p.price,
            }),
            product_id: line.product_id,
            size: line.size,
            color: line.color,
            quantity: line.quantity,
            unit_price: line.unit_price,
        })
        .collect();

    Ok(CartView {
        id: cart.id,
        user_id: cart.user_id,
        items,
        total_items: cart.total_items,
        total_price: cart.total_price,
        updated_at: cart.updated_at.with_timezone(&Utc),
    })
}

/// Stored total of the user's cart; a missing or empty cart is `EmptyCart`.
pub(crate) async fn cart_total<C: ConnectionTrait>(db: &C, user_id: Uuid) -> AppResult<i64> {
    let cart = Carts::find()
        .filter(carts::Column::UserId.eq(user_id))
        .one(db)
        .await?
        .ok_or(AppError::EmptyCart)?;
    if cart.total_items == 0 {
        return Err(AppError::EmptyCart);
    }
    Ok(cart.total_price)
}
