use chrono::{Duration, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set,
};
use storefront_api::{
    db::{create_orm_conn, run_migrations},
    entity::{
        Coupons, Products, Users, coupons, products,
        sea_orm_active_enums::CouponKind,
        users,
    },
    middleware::auth::{ROLE_ADMIN, ROLE_USER},
    models::SizeList,
    services::auth_service::hash_password,
};
use uuid::Uuid;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt().with_target(false).init();

    let database_url = std::env::var("DATABASE_URL")?;
    let orm = create_orm_conn(&database_url).await?;
    run_migrations(&orm).await?;

    let admin_id = ensure_user(&orm, "admin@example.com", "admin123", ROLE_ADMIN).await?;
    let user_id = ensure_user(&orm, "user@example.com", "user1234", ROLE_USER).await?;
    seed_products(&orm).await?;
    seed_coupon(&orm).await?;

    tracing::info!(%admin_id, %user_id, "seed completed");
    Ok(())
}

async fn ensure_user(
    orm: &DatabaseConnection,
    email: &str,
    password: &str,
    role: &str,
) -> anyhow::Result<Uuid> {
    if let Some(existing) = Users::find()
        .filter(users::Column::Email.eq(email))
        .one(orm)
        .await?
    {
        if existing.role != role {
            let mut active: users::ActiveModel = existing.into();
            active.role = Set(role.to_string());
            let updated = active.update(orm).await?;
            return Ok(updated.id);
        }
        return Ok(existing.id);
    }

    let password_hash =
        hash_password(password).map_err(|e| anyhow::anyhow!("hashing password: {e}"))?;
    let user = users::ActiveModel {
        id: Set(Uuid::new_v4()),
        email: Set(email.to_string()),
        password_hash: Set(password_hash),
        created_at: Set(Utc::now().into()),
        role: Set(role.to_string()),
    }
    .insert(orm)
    .await?;

    tracing::info!(email, role, "user created");
    Ok(user.id)
}

async fn seed_products(orm: &DatabaseConnection) -> anyhow::Result<()> {
    let catalog: [(&str, &str, i64, i32, &[&str]); 4] = [
        ("Classic Crew Tee", "Heavyweight cotton t-shirt", 49900, 50, &["S", "M", "L", "XL"]),
        ("Relaxed Denim Jacket", "Washed denim with brass buttons", 249900, 20, &["M", "L"]),
        ("Canvas Tote", "Everyday carry-all", 79900, 100, &[]),
        ("Merino Beanie", "Fine-knit winter beanie", 59900, 75, &[]),
    ];

    for (name, description, price, stock, sizes) in catalog {
        let exists = Products::find()
            .filter(products::Column::Name.eq(name))
            .one(orm)
            .await?
            .is_some();
        if exists {
            continue;
        }

        products::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(name.to_string()),
            description: Set(Some(description.to_string())),
            image: Set(None),
            price: Set(price),
            stock: Set(stock),
            sold: Set(0),
            sizes: Set(SizeList(sizes.iter().map(|s| s.to_string()).collect())),
            created_at: Set(Utc::now().into()),
        }
        .insert(orm)
        .await?;
    }

    tracing::info!("products seeded");
    Ok(())
}

async fn seed_coupon(orm: &DatabaseConnection) -> anyhow::Result<()> {
    let exists = Coupons::find()
        .filter(coupons::Column::Code.eq("WELCOME10"))
        .one(orm)
        .await?
        .is_some();
    if exists {
        return Ok(());
    }

    let now = Utc::now();
    coupons::ActiveModel {
        id: Set(Uuid::new_v4()),
        code: Set("WELCOME10".to_string()),
        kind: Set(CouponKind::Percentage),
        value: Set(10),
        max_discount: Set(Some(50000)),
        expires_at: Set((now + Duration::days(90)).into()),
        created_at: Set(now.into()),
    }
    .insert(orm)
    .await?;

    tracing::info!("coupon WELCOME10 seeded");
    Ok(())
}
