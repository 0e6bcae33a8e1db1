use utoipa::{
    Modify, OpenApi,
    openapi::{
        self,
        OpenApi as OpenApiSpec,
        security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    },
};
use utoipa_scalar::{Scalar, Servable};

use crate::{
    dto::{
        admin::{InventoryAdjustRequest, LowStockList, OrderSummary, UpdateOrderStatusRequest},
        auth::{LoginRequest, LoginResponse, RegisterRequest},
        cart::{
            AddToCartRequest, CartLineView, CartProduct, CartView, RemoveFromCartRequest,
            UpdateCartRequest,
        },
        coupon::{ApplyCouponRequest, ApplyCouponResponse, CouponList, CreateCouponRequest},
        orders::{
            CancelOrderRequest, OnlinePaymentResponse, OrderItemRequest, OrderList,
            OrderWithItems, PlaceOnlineOrderRequest, PlaceOrderRequest, VerifyPaymentRequest,
            VerifyPaymentResponse,
        },
        products::{CreateProductRequest, ProductList, UpdateProductRequest},
        returns::{CreateReturnRequest, ReturnList, UpdateReturnStatusRequest},
    },
    entity::sea_orm_active_enums::{
        CouponKind, OrderStatus, PaymentMethod, PaymentStatus, ReturnReason, ReturnStatus,
    },
    models::{Coupon, Order, OrderLine, Product, ReturnRequest, ShippingAddress, User},
    response::{ApiResponse, Meta},
    routes::{admin, auth, cart, coupon, health, orders, params, products, returns},
};

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health_check,
        auth::login,
        auth::register,
        products::list_products,
        products::get_product,
        products::create_product,
        products::update_product,
        cart::add_to_cart,
        cart::update_cart,
        cart::get_cart,
        cart::remove_from_cart,
        coupon::apply_coupon,
        coupon::create_coupon,
        coupon::list_coupons,
        orders::place_order,
        orders::place_order_razorpay,
        orders::verify_razorpay,
        orders::get_user_orders,
        orders::get_order,
        orders::cancel_order,
        orders::list_orders,
        orders::update_status,
        orders::order_summary,
        returns::create_return,
        returns::list_returns,
        admin::list_low_stock,
        admin::adjust_inventory,
        admin::update_return_status
    ),
    components(
        schemas(
            User,
            Product,
            Coupon,
            Order,
            OrderLine,
            ReturnRequest,
            ShippingAddress,
            OrderStatus,
            PaymentStatus,
            PaymentMethod,
            CouponKind,
            ReturnReason,
            ReturnStatus,
            RegisterRequest,
            LoginRequest,
            LoginResponse,
            AddToCartRequest,
            UpdateCartRequest,
            RemoveFromCartRequest,
            CartView,
            CartLineView,
            CartProduct,
            ApplyCouponRequest,
            ApplyCouponResponse,
            CreateCouponRequest,
            CouponList,
            PlaceOrderRequest,
            OrderItemRequest,
            PlaceOnlineOrderRequest,
            OnlinePaymentResponse,
            VerifyPaymentRequest,
            VerifyPaymentResponse,
            CancelOrderRequest,
            OrderWithItems,
            OrderList,
            UpdateOrderStatusRequest,
            OrderSummary,
            InventoryAdjustRequest,
            LowStockList,
            CreateProductRequest,
            UpdateProductRequest,
            ProductList,
            CreateReturnRequest,
            UpdateReturnStatusRequest,
            ReturnList,
            params::Pagination,
            params::ProductQuery,
            params::OrderListQuery,
            params::LowStockQuery,
            Meta,
            ApiResponse<Product>,
            ApiResponse<ProductList>,
            ApiResponse<CartView>,
            ApiResponse<OrderWithItems>,
            ApiResponse<OrderList>,
            ApiResponse<OnlinePaymentResponse>
        )
    ),
    security(
        ("bearer_auth" = [])
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Health check endpoint"),
        (name = "Auth", description = "Authentication endpoints"),
        (name = "Products", description = "Product catalog endpoints"),
        (name = "Cart", description = "Cart endpoints"),
        (name = "Coupon", description = "Coupon endpoints"),
        (name = "Orders", description = "Order and payment endpoints"),
        (name = "Returns", description = "Return request endpoints"),
        (name = "Admin", description = "Admin endpoints"),
    )
)]
pub struct ApiDoc;

pub fn scalar_docs() -> Scalar<OpenApiSpec> {
    Scalar::with_url("/docs", ApiDoc::openapi())
}
