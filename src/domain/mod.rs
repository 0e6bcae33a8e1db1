//! Pure storefront rules. Nothing in here touches the database; services
//! load state, call into these functions and persist the result.

pub mod address;
pub mod cart;
pub mod coupon;
pub mod order;
pub mod returns;
