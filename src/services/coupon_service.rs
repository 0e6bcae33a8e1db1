use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseTransaction, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, Set,
    sea_query::OnConflict,
};
use uuid::Uuid;

use crate::{
    audit,
    domain::coupon::{self as rules, CouponRule, Discount},
    dto::coupon::{ApplyCouponRequest, ApplyCouponResponse, CouponList, CreateCouponRequest},
    entity::{CouponRedemptions, Coupons, coupon_redemptions, coupons},
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_admin},
    models::Coupon,
    response::{ApiResponse, Meta},
    services::cart_service,
    state::AppState,
};

/// Previews a discount against the user's current cart. Nothing is
/// redeemed here; redemption happens when an order is placed.
pub async fn apply_coupon(
    state: &AppState,
    user: &AuthUser,
    payload: ApplyCouponRequest,
) -> AppResult<ApiResponse<ApplyCouponResponse>> {
    let coupon = find_redeemable(&state.orm, user.user_id, &payload.code).await?;
    let cart_total = cart_service::cart_total(&state.orm, user.user_id).await?;
    let Discount {
        discount,
        final_total,
    } = rules::compute_discount(&rule_of(&coupon), cart_total);

    Ok(ApiResponse::success(
        "Coupon applied",
        ApplyCouponResponse {
            code: coupon.code,
            cart_total,
            discount,
            final_total,
        },
        Some(Meta::empty()),
    ))
}

pub async fn create_coupon(
    state: &AppState,
    user: &AuthUser,
    payload: CreateCouponRequest,
) -> AppResult<ApiResponse<Coupon>> {
    ensure_admin(user)?;
    let code = rules::normalize_code(&payload.code);
    if code.is_empty() {
        return Err(AppError::Validation("code is required".to_string()));
    }
    rules::validate_rule(&CouponRule {
        kind: payload.kind,
        value: payload.value,
        max_discount: payload.max_discount,
    })?;

    let taken = Coupons::find()
        .filter(coupons::Column::Code.eq(code.as_str()))
        .count(&state.orm)
        .await?;
    if taken > 0 {
        return Err(AppError::Validation(format!("coupon {code} already exists")));
    }

    let coupon = coupons::ActiveModel {
        id: Set(Uuid::new_v4()),
        code: Set(code),
        kind: Set(payload.kind),
        value: Set(payload.value),
        max_discount: Set(payload.max_discount),
        expires_at: Set(payload.expires_at.into()),
        created_at: Set(Utc::now().into()),
    }
    .insert(&state.orm)
    .await?;

    audit::record(
        &state.orm,
        user.user_id,
        "coupon_create",
        "coupons",
        serde_json::json!({ "coupon_id": coupon.id, "code": coupon.code }),
    )
    .await;

    Ok(ApiResponse::success(
        "Coupon created",
        Coupon::from(coupon),
        Some(Meta::empty()),
    ))
}

pub async fn list_coupons(
    state: &AppState,
    user: &AuthUser,
) -> AppResult<ApiResponse<CouponList>> {
    ensure_admin(user)?;
    let items = Coupons::find()
        .order_by_desc(coupons::Column::CreatedAt)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(Coupon::from)
        .collect();
    Ok(ApiResponse::success("Coupons", CouponList { items }, Some(Meta::empty())))
}

/// Looks up a coupon by code and checks expiry, then prior use by `user_id`.
pub(crate) async fn find_redeemable<C: ConnectionTrait>(
    db: &C,
    user_id: Uuid,
    code: &str,
) -> AppResult<coupons::Model> {
    let coupon = Coupons::find()
        .filter(coupons::Column::Code.eq(rules::normalize_code(code)))
        .one(db)
        .await?
        .ok_or(AppError::NotFound("coupon"))?;

    let already_redeemed = CouponRedemptions::find()
        .filter(coupon_redemptions::Column::CouponId.eq(coupon.id))
        .filter(coupon_redemptions::Column::UserId.eq(user_id))
        .count(db)
        .await?
        > 0;

    rules::check_redeemable(
        coupon.expires_at.with_timezone(&Utc),
        Utc::now(),
        already_redeemed,
    )?;
    Ok(coupon)
}

/// Marks the coupon used by `user_id` for `order_id`. The unique
/// (coupon, user) key decides a race between two placements.
pub(crate) async fn record_redemption(
    txn: &DatabaseTransaction,
    coupon_id: Uuid,
    user_id: Uuid,
    order_id: Uuid,
) -> AppResult<()> {
    let inserted = CouponRedemptions::insert(coupon_redemptions::ActiveModel {
        id: Set(Uuid::new_v4()),
        coupon_id: Set(coupon_id),
        user_id: Set(user_id),
        order_id: Set(order_id),
        created_at: Set(Utc::now().into()),
    })
    .on_conflict(
        OnConflict::columns([
            coupon_redemptions::Column::CouponId,
            coupon_redemptions::Column::UserId,
        ])
        .do_nothing()
        .to_owned(),
    )
    .exec_without_returning(txn)
    .await?;

    if inserted == 0 {
        return Err(AppError::AlreadyRedeemed);
    }
    Ok(())
}

/// Drops the redemption tied to `order_id`, if any.
pub(crate) async fn release_redemption(txn: &DatabaseTransaction, order_id: Uuid) -> AppResult<()> {
    CouponRedemptions::delete_many()
        .filter(coupon_redemptions::Column::OrderId.eq(order_id))
        .exec(txn)
        .await?;
    Ok(())
}

pub(crate) fn rule_of(coupon: &coupons::Model) -> CouponRule {
    CouponRule {
        kind: coupon.kind,
        value: coupon.value,
        max_discount: coupon.max_discount,
    }
}
