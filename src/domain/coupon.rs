use chrono::{DateTime, Utc};

use crate::{
    entity::sea_orm_active_enums::CouponKind,
    error::{AppError, AppResult},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CouponRule {
    pub kind: CouponKind,
    pub value: i64,
    pub max_discount: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Discount {
    pub discount: i64,
    pub final_total: i64,
}

pub fn normalize_code(code: &str) -> String {
    code.trim().to_uppercase()
}

/// Expiry is checked before usage so an expired coupon fails the same way
/// for everyone.
pub fn check_redeemable(
    expires_at: DateTime<Utc>,
    now: DateTime<Utc>,
    already_redeemed: bool,
) -> AppResult<()> {
    if now > expires_at {
        return Err(AppError::Expired);
    }
    if already_redeemed {
        return Err(AppError::AlreadyRedeemed);
    }
    Ok(())
}

pub fn compute_discount(rule: &CouponRule, cart_total: i64) -> Discount {
    let cart_total = cart_total.max(0);
    let raw = match rule.kind {
        CouponKind::Percentage => cart_total * rule.value / 100,
        CouponKind::Flat => rule.value,
    };
    let capped = rule.max_discount.map_or(raw, |cap| raw.min(cap));
    let discount = capped.clamp(0, cart_total);
    Discount {
        discount,
        final_total: cart_total - discount,
    }
}

pub fn validate_rule(rule: &CouponRule) -> AppResult<()> {
    match rule.kind {
        CouponKind::Percentage if !(1..=100).contains(&rule.value) => {
            return Err(AppError::Validation(
                "percentage must be between 1 and 100".to_string(),
            ));
        }
        CouponKind::Flat if rule.value <= 0 => {
            return Err(AppError::Validation(
                "flat discount must be greater than 0".to_string(),
            ));
        }
        _ => {}
    }
    if matches!(rule.max_discount, Some(cap) if cap <= 0) {
        return Err(AppError::Validation(
            "max_discount must be greater than 0".to_string(),
        ));
    }
    Ok(())
}
