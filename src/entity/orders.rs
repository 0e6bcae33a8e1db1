use sea_orm::entity::prelude::*;

use super::sea_orm_active_enums::{OrderStatus, PaymentMethod, PaymentStatus};
use crate::models::ShippingAddress;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "orders")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub user_id: Uuid,
    #[sea_orm(column_type = "JsonBinary")]
    pub shipping_address: ShippingAddress,
    pub payment_method: PaymentMethod,
    pub payment_status: PaymentStatus,
    pub order_status: OrderStatus,
    pub subtotal_amount: i64,
    pub discount_amount: i64,
    pub total_amount: i64,
    pub coupon_code: Option<String>,
    #[sea_orm(unique)]
    pub gateway_order_id: Option<String>,
    /// Whether this order's quantities are currently deducted from stock.
    pub stock_committed: bool,
    pub paid_at: Option<DateTimeWithTimeZone>,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::users::Entity",
        from = "Column::UserId",
        to = "super::users::Column::Id"
    )]
    Users,
    #[sea_orm(has_many = "super::order_items::Entity")]
    OrderItems,
    #[sea_orm(has_many = "super::coupon_redemptions::Entity")]
    CouponRedemptions,
    #[sea_orm(has_many = "super::return_requests::Entity")]
    ReturnRequests,
}

impl Related<super::users::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Users.def()
    }
}

impl Related<super::order_items::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::OrderItems.def()
    }
}

impl Related<super::coupon_redemptions::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::CouponRedemptions.def()
    }
}

impl Related<super::return_requests::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ReturnRequests.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
