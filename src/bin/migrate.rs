use storefront_api::db::{create_orm_conn, run_migrations};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt().with_target(false).init();

    let database_url = std::env::var("DATABASE_URL")?;
    let orm = create_orm_conn(&database_url).await?;
    run_migrations(&orm).await?;
    tracing::info!("migrations applied");
    Ok(())
}
