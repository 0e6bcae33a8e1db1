use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Users::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Users::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Users::Email).string().not_null().unique_key())
                    .col(ColumnDef::new(Users::PasswordHash).string().not_null())
                    .col(
                        ColumnDef::new(Users::Role)
                            .string_len(20)
                            .not_null()
                            .default("user"),
                    )
                    .col(timestamp(Users::CreatedAt))
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Products::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Products::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Products::Name).string().not_null().unique_key())
                    .col(ColumnDef::new(Products::Description).text().null())
                    .col(ColumnDef::new(Products::Image).string().null())
                    .col(ColumnDef::new(Products::Price).big_integer().not_null())
                    .col(
                        ColumnDef::new(Products::Stock)
                            .integer()
                            .not_null()
                            .default(0)
                            .check(Expr::col(Products::Stock).gte(0)),
                    )
                    .col(ColumnDef::new(Products::Sold).integer().not_null().default(0))
                    .col(ColumnDef::new(Products::Sizes).json_binary().not_null())
                    .col(timestamp(Products::CreatedAt))
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Carts::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Carts::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Carts::UserId).uuid().not_null().unique_key())
                    .col(ColumnDef::new(Carts::TotalItems).integer().not_null().default(0))
                    .col(ColumnDef::new(Carts::TotalPrice).big_integer().not_null().default(0))
                    .col(timestamp(Carts::CreatedAt))
                    .col(timestamp(Carts::UpdatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_carts_user")
                            .from(Carts::Table, Carts::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(CartItems::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(CartItems::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(CartItems::CartId).uuid().not_null())
                    .col(ColumnDef::new(CartItems::ProductId).uuid().not_null())
                    .col(ColumnDef::new(CartItems::Size).string_len(20).not_null())
                    .col(ColumnDef::new(CartItems::Color).string_len(40).not_null())
                    .col(ColumnDef::new(CartItems::Quantity).integer().not_null())
                    .col(ColumnDef::new(CartItems::UnitPrice).big_integer().not_null())
                    .col(ColumnDef::new(CartItems::Position).integer().not_null())
                    .col(timestamp(CartItems::CreatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_cart_items_cart")
                            .from(CartItems::Table, CartItems::CartId)
                            .to(Carts::Table, Carts::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_cart_items_product")
                            .from(CartItems::Table, CartItems::ProductId)
                            .to(Products::Table, Products::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("uq_cart_items_variant")
                    .table(CartItems::Table)
                    .col(CartItems::CartId)
                    .col(CartItems::ProductId)
                    .col(CartItems::Size)
                    .col(CartItems::Color)
                    .unique()
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Coupons::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Coupons::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Coupons::Code).string_len(40).not_null().unique_key())
                    .col(ColumnDef::new(Coupons::Kind).string_len(20).not_null())
                    .col(ColumnDef::new(Coupons::Value).big_integer().not_null())
                    .col(ColumnDef::new(Coupons::MaxDiscount).big_integer().null())
                    .col(
                        ColumnDef::new(Coupons::ExpiresAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(timestamp(Coupons::CreatedAt))
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Orders::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Orders::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Orders::UserId).uuid().not_null())
                    .col(ColumnDef::new(Orders::ShippingAddress).json_binary().not_null())
                    .col(ColumnDef::new(Orders::PaymentMethod).string_len(20).not_null())
                    .col(ColumnDef::new(Orders::PaymentStatus).string_len(20).not_null())
                    .col(ColumnDef::new(Orders::OrderStatus).string_len(20).not_null())
                    .col(ColumnDef::new(Orders::SubtotalAmount).big_integer().not_null())
                    .col(
                        ColumnDef::new(Orders::DiscountAmount)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(Orders::TotalAmount).big_integer().not_null())
                    .col(ColumnDef::new(Orders::CouponCode).string_len(40).null())
                    .col(
                        ColumnDef::new(Orders::GatewayOrderId)
                            .string_len(64)
                            .null()
                            .unique_key(),
                    )
                    .col(
                        ColumnDef::new(Orders::StockCommitted)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(Orders::PaidAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(timestamp(Orders::CreatedAt))
                    .col(timestamp(Orders::UpdatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_orders_user")
                            .from(Orders::Table, Orders::UserId)
                            .to(Users::Table, Users::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_orders_user_created")
                    .table(Orders::Table)
                    .col(Orders::UserId)
                    .col(Orders::CreatedAt)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(OrderItems::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(OrderItems::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(OrderItems::OrderId).uuid().not_null())
                    .col(ColumnDef::new(OrderItems::ProductId).uuid().not_null())
                    .col(ColumnDef::new(OrderItems::Name).string().not_null())
                    .col(ColumnDef::new(OrderItems::Size).string_len(20).not_null())
                    .col(ColumnDef::new(OrderItems::Color).string_len(40).not_null())
                    .col(ColumnDef::new(OrderItems::Quantity).integer().not_null())
                    .col(ColumnDef::new(OrderItems::UnitPrice).big_integer().not_null())
                    .col(timestamp(OrderItems::CreatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_order_items_order")
                            .from(OrderItems::Table, OrderItems::OrderId)
                            .to(Orders::Table, Orders::Id),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_order_items_product")
                            .from(OrderItems::Table, OrderItems::ProductId)
                            .to(Products::Table, Products::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(CouponRedemptions::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(CouponRedemptions::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(CouponRedemptions::CouponId).uuid().not_null())
                    .col(ColumnDef::new(CouponRedemptions::UserId).uuid().not_null())
                    .col(ColumnDef::new(CouponRedemptions::OrderId).uuid().not_null())
                    .col(timestamp(CouponRedemptions::CreatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_coupon_redemptions_coupon")
                            .from(CouponRedemptions::Table, CouponRedemptions::CouponId)
                            .to(Coupons::Table, Coupons::Id),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_coupon_redemptions_order")
                            .from(CouponRedemptions::Table, CouponRedemptions::OrderId)
                            .to(Orders::Table, Orders::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("uq_coupon_redemptions_user")
                    .table(CouponRedemptions::Table)
                    .col(CouponRedemptions::CouponId)
                    .col(CouponRedemptions::UserId)
                    .unique()
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(ReturnRequests::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(ReturnRequests::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(ReturnRequests::OrderId).uuid().not_null())
                    .col(ColumnDef::new(ReturnRequests::UserId).uuid().not_null())
                    .col(ColumnDef::new(ReturnRequests::ProductId).uuid().not_null())
                    .col(ColumnDef::new(ReturnRequests::Size).string_len(20).not_null())
                    .col(ColumnDef::new(ReturnRequests::Color).string_len(40).not_null())
                    .col(ColumnDef::new(ReturnRequests::Reason).string_len(30).not_null())
                    .col(ColumnDef::new(ReturnRequests::Status).string_len(20).not_null())
                    .col(ColumnDef::new(ReturnRequests::Note).text().null())
                    .col(timestamp(ReturnRequests::CreatedAt))
                    .col(timestamp(ReturnRequests::UpdatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_return_requests_order")
                            .from(ReturnRequests::Table, ReturnRequests::OrderId)
                            .to(Orders::Table, Orders::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(AuditLogs::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(AuditLogs::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(AuditLogs::UserId).uuid().null())
                    .col(ColumnDef::new(AuditLogs::Action).string().not_null())
                    .col(ColumnDef::new(AuditLogs::Resource).string().null())
                    .col(ColumnDef::new(AuditLogs::Metadata).json_binary().null())
                    .col(timestamp(AuditLogs::CreatedAt))
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(AuditLogs::Table).if_exists().to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(ReturnRequests::Table).if_exists().to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(CouponRedemptions::Table).if_exists().to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(OrderItems::Table).if_exists().to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Orders::Table).if_exists().to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Coupons::Table).if_exists().to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(CartItems::Table).if_exists().to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Carts::Table).if_exists().to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Products::Table).if_exists().to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Users::Table).if_exists().to_owned())
            .await
    }
}

fn timestamp<T: IntoIden>(column: T) -> ColumnDef {
    ColumnDef::new(column)
        .timestamp_with_time_zone()
        .not_null()
        .default(Expr::current_timestamp())
        .to_owned()
}

#[derive(DeriveIden)]
enum Users {
    Table,
    Id,
    Email,
    PasswordHash,
    Role,
    CreatedAt,
}

#[derive(DeriveIden)]
enum Products {
    Table,
    Id,
    Name,
    Description,
    Image,
    Price,
    Stock,
    Sold,
    Sizes,
    CreatedAt,
}

#[derive(DeriveIden)]
enum Carts {
    Table,
    Id,
    UserId,
    TotalItems,
    TotalPrice,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum CartItems {
    Table,
    Id,
    CartId,
    ProductId,
    Size,
    Color,
    Quantity,
    UnitPrice,
    Position,
    CreatedAt,
}

#[derive(DeriveIden)]
enum Coupons {
    Table,
    Id,
    Code,
    Kind,
    Value,
    MaxDiscount,
    ExpiresAt,
    CreatedAt,
}

#[derive(DeriveIden)]
enum CouponRedemptions {
    Table,
    Id,
    CouponId,
    UserId,
    OrderId,
    CreatedAt,
}

#[derive(DeriveIden)]
enum Orders {
    Table,
    Id,
    UserId,
    ShippingAddress,
    PaymentMethod,
    PaymentStatus,
    OrderStatus,
    SubtotalAmount,
    DiscountAmount,
    TotalAmount,
    CouponCode,
    GatewayOrderId,
    StockCommitted,
    PaidAt,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum OrderItems {
    Table,
    Id,
    OrderId,
    ProductId,
    Name,
    Size,
    Color,
    Quantity,
    UnitPrice,
    CreatedAt,
}

#[derive(DeriveIden)]
enum ReturnRequests {
    Table,
    Id,
    OrderId,
    UserId,
    ProductId,
    Size,
    Color,
    Reason,
    Status,
    Note,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum AuditLogs {
    Table,
    Id,
    UserId,
    Action,
    Resource,
    Metadata,
    CreatedAt,
}
