#![allow(dead_code)]

use std::{
    collections::HashMap,
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{ActiveModelTrait, ConnectOptions, Database, DatabaseConnection, EntityTrait, Set};
use secrecy::SecretString;
use storefront_api::{
    config::{AppConfig, PaymentConfig},
    db::run_migrations,
    entity::{
        Products, coupons, orders, products,
        sea_orm_active_enums::{CouponKind, OrderStatus},
        users,
    },
    middleware::auth::AuthUser,
    models::{ShippingAddress, SizeList},
    payment::{GatewayError, IntentState, IntentStatus, PaymentGateway, PaymentIntent},
    state::AppState,
};
use uuid::Uuid;

pub const CLIENT_KEY: &str = "rzp_test_key";

/// In-process gateway. Intents start as `created` until a test marks them paid.
#[derive(Default)]
pub struct StubGateway {
    intents: Mutex<HashMap<String, IntentState>>,
    counter: AtomicUsize,
    unavailable: AtomicBool,
    hang: AtomicBool,
    cancel_on_fetch: Mutex<Option<(DatabaseConnection, Uuid)>>,
}

impl StubGateway {
    pub fn mark_paid(&self, intent_id: &str) {
        if let Some(state) = self.intents.lock().unwrap().get_mut(intent_id) {
            state.status = IntentStatus::Paid;
        }
    }

    pub fn set_receipt(&self, intent_id: &str, receipt: &str) {
        if let Some(state) = self.intents.lock().unwrap().get_mut(intent_id) {
            state.receipt_order_id = Some(receipt.to_string());
        }
    }

    pub fn receipt_of(&self, intent_id: &str) -> Option<String> {
        self.intents
            .lock()
            .unwrap()
            .get(intent_id)
            .and_then(|state| state.receipt_order_id.clone())
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn set_hang(&self, hang: bool) {
        self.hang.store(hang, Ordering::SeqCst);
    }

    /// The next status lookup cancels `order_id` before answering, as if an
    /// admin had cancelled it while the gateway call was in flight.
    pub fn cancel_during_fetch(&self, db: DatabaseConnection, order_id: Uuid) {
        *self.cancel_on_fetch.lock().unwrap() = Some((db, order_id));
    }

    pub fn signature_for(intent_id: &str, payment_id: &str) -> String {
        format!("sig:{intent_id}|{payment_id}")
    }

    async fn gate(&self) -> Result<(), GatewayError> {
        if self.hang.load(Ordering::SeqCst) {
            tokio::time::sleep(Duration::from_secs(30)).await;
        }
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(GatewayError::Rejected {
                status: 503,
                body: "gateway down".into(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl PaymentGateway for StubGateway {
    async fn create_intent(
        &self,
        order_id: Uuid,
        amount: i64,
        currency: &str,
    ) -> Result<PaymentIntent, GatewayError> {
        self.gate().await?;
        let n = self.counter.fetch_add(1, Ordering::SeqCst);
        let intent_id = format!("order_stub_{n}");
        self.intents.lock().unwrap().insert(
            intent_id.clone(),
            IntentState {
                status: IntentStatus::Created,
                receipt_order_id: Some(order_id.to_string()),
            },
        );
        Ok(PaymentIntent {
            intent_id,
            amount,
            currency: currency.to_string(),
            client_key: CLIENT_KEY.to_string(),
        })
    }

    async fn fetch_intent_status(&self, intent_id: &str) -> Result<IntentState, GatewayError> {
        self.gate().await?;
        let cancel = self.cancel_on_fetch.lock().unwrap().take();
        if let Some((db, order_id)) = cancel {
            orders::ActiveModel {
                id: Set(order_id),
                order_status: Set(OrderStatus::Cancelled),
                ..Default::default()
            }
            .update(&db)
            .await
            .expect("cancel order mid-call");
        }
        self.intents
            .lock()
            .unwrap()
            .get(intent_id)
            .cloned()
            .ok_or(GatewayError::Rejected {
                status: 404,
                body: "no such order".into(),
            })
    }

    fn verify_signature(&self, intent_id: &str, payment_id: &str, signature: &str) -> bool {
        signature == Self::signature_for(intent_id, payment_id)
    }
}

pub struct TestApp {
    pub state: AppState,
    pub gateway: Arc<StubGateway>,
}

pub fn test_config() -> AppConfig {
    AppConfig {
        database_url: "sqlite::memory:".to_string(),
        host: "127.0.0.1".to_string(),
        port: 0,
        jwt_secret: SecretString::from("test-jwt-secret".to_string()),
        jwt_ttl_hours: 1,
        payment: PaymentConfig {
            key_id: CLIENT_KEY.to_string(),
            key_secret: SecretString::from("test_secret".to_string()),
            base_url: "http://127.0.0.1:9".to_string(),
            currency: "INR".to_string(),
            timeout: Duration::from_millis(200),
        },
    }
}

/// Fresh in-memory database with the production schema. One pooled
/// connection keeps the database alive for the whole test.
pub async fn setup() -> TestApp {
    let config = test_config();
    let mut options = ConnectOptions::new(config.database_url.clone());
    options
        .max_connections(1)
        .min_connections(1)
        .sqlx_logging(false);
    let orm = Database::connect(options).await.expect("connect sqlite");
    run_migrations(&orm).await.expect("run migrations");

    let gateway = Arc::new(StubGateway::default());
    let state = AppState {
        orm,
        config: Arc::new(config),
        gateway: gateway.clone(),
    };
    TestApp { state, gateway }
}

pub async fn create_user(state: &AppState, role: &str) -> AuthUser {
    let id = Uuid::new_v4();
    users::ActiveModel {
        id: Set(id),
        email: Set(format!("{id}@example.com")),
        password_hash: Set("not-a-real-hash".into()),
        created_at: Set(Utc::now().into()),
        role: Set(role.into()),
    }
    .insert(&state.orm)
    .await
    .expect("insert user");

    AuthUser {
        user_id: id,
        role: role.into(),
    }
}

pub async fn customer(state: &AppState) -> AuthUser {
    create_user(state, "user").await
}

pub async fn admin(state: &AppState) -> AuthUser {
    create_user(state, "admin").await
}

pub async fn create_product(
    state: &AppState,
    name: &str,
    price: i64,
    stock: i32,
    sizes: &[&str],
) -> products::Model {
    products::ActiveModel {
        id: Set(Uuid::new_v4()),
        name: Set(name.into()),
        description: Set(None),
        image: Set(Some(format!("https://cdn.example.com/{name}.jpg"))),
        price: Set(price),
        stock: Set(stock),
        sold: Set(0),
        sizes: Set(SizeList(sizes.iter().map(|s| s.to_string()).collect())),
        created_at: Set(Utc::now().into()),
    }
    .insert(&state.orm)
    .await
    .expect("insert product")
}

/// (stock, sold)
pub async fn stock_of(state: &AppState, product_id: Uuid) -> (i32, i32) {
    let product = Products::find_by_id(product_id)
        .one(&state.orm)
        .await
        .expect("load product")
        .expect("product exists");
    (product.stock, product.sold)
}

pub async fn set_price(state: &AppState, product_id: Uuid, price: i64) {
    let product = Products::find_by_id(product_id)
        .one(&state.orm)
        .await
        .expect("load product")
        .expect("product exists");
    let mut active: products::ActiveModel = product.into();
    active.price = Set(price);
    active.update(&state.orm).await.expect("update price");
}

pub async fn create_coupon(
    state: &AppState,
    code: &str,
    kind: CouponKind,
    value: i64,
    max_discount: Option<i64>,
    expires_in: chrono::Duration,
) -> coupons::Model {
    let now = Utc::now();
    coupons::ActiveModel {
        id: Set(Uuid::new_v4()),
        code: Set(code.into()),
        kind: Set(kind),
        value: Set(value),
        max_discount: Set(max_discount),
        expires_at: Set((now + expires_in).into()),
        created_at: Set(now.into()),
    }
    .insert(&state.orm)
    .await
    .expect("insert coupon")
}

pub fn address() -> ShippingAddress {
    ShippingAddress {
        street: "12 MG Road".into(),
        city: "Bengaluru".into(),
        state: "Karnataka".into(),
        pincode: "560001".into(),
        country: "India".into(),
    }
}
