use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Set,
    sea_query::{Expr, Func},
};
use uuid::Uuid;

use crate::{
    audit,
    dto::products::{CreateProductRequest, ProductList, UpdateProductRequest},
    entity::{Products, products},
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_admin},
    models::{Product, SizeList},
    response::{ApiResponse, Meta},
    routes::params::{ProductQuery, ProductSortBy, SortOrder},
    state::AppState,
};

pub async fn list_products(
    state: &AppState,
    query: ProductQuery,
) -> AppResult<ApiResponse<ProductList>> {
    let (page, limit, offset) = query.pagination().normalize();
    let mut condition = Condition::all();

    if let Some(search) = query.q.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        let pattern = format!("%{}%", search.to_lowercase());
        condition = condition.add(
            Expr::expr(Func::lower(Expr::col(products::Column::Name))).like(pattern),
        );
    }
    if let Some(min_price) = query.min_price {
        condition = condition.add(products::Column::Price.gte(min_price));
    }
    if let Some(max_price) = query.max_price {
        condition = condition.add(products::Column::Price.lte(max_price));
    }

    let sort_col = match query.sort_by.unwrap_or(ProductSortBy::CreatedAt) {
        ProductSortBy::CreatedAt => products::Column::CreatedAt,
        ProductSortBy::Price => products::Column::Price,
        ProductSortBy::Name => products::Column::Name,
    };

    let finder = Products::find().filter(condition);
    let finder = match query.sort_order.unwrap_or(SortOrder::Desc) {
        SortOrder::Asc => finder.order_by_asc(sort_col),
        SortOrder::Desc => finder.order_by_desc(sort_col),
    };

    let total = finder.clone().count(&state.orm).await? as i64;

    let items = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(Product::from)
        .collect();

    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success("Products", ProductList { items }, Some(meta)))
}

pub async fn get_product(state: &AppState, id: Uuid) -> AppResult<ApiResponse<Product>> {
    let product = Products::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound("product"))?;
    Ok(ApiResponse::ok(Product::from(product)))
}

pub async fn create_product(
    state: &AppState,
    user: &AuthUser,
    payload: CreateProductRequest,
) -> AppResult<ApiResponse<Product>> {
    ensure_admin(user)?;
    let name = payload.name.trim().to_string();
    if name.is_empty() {
        return Err(AppError::Validation("name is required".into()));
    }
    validate_amounts(Some(payload.price), Some(payload.stock))?;

    let product = products::ActiveModel {
        id: Set(Uuid::new_v4()),
        name: Set(name),
        description: Set(payload.description),
        image: Set(payload.image),
        price: Set(payload.price),
        stock: Set(payload.stock),
        sold: Set(0),
        sizes: Set(normalize_sizes(payload.sizes)),
        created_at: Set(Utc::now().into()),
    }
    .insert(&state.orm)
    .await?;

    audit::record(
        &state.orm,
        user.user_id,
        "product_create",
        "products",
        serde_json::json!({ "product_id": product.id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Product created",
        Product::from(product),
        Some(Meta::empty()),
    ))
}

pub async fn update_product(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateProductRequest,
) -> AppResult<ApiResponse<Product>> {
    ensure_admin(user)?;
    validate_amounts(payload.price, payload.stock)?;

    let existing = Products::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound("product"))?;

    let mut active: products::ActiveModel = existing.into();
    if let Some(name) = payload.name.map(|n| n.trim().to_string()) {
        if name.is_empty() {
            return Err(AppError::Validation("name must not be empty".into()));
        }
        active.name = Set(name);
    }
    if let Some(description) = payload.description {
        active.description = Set(Some(description));
    }
    if let Some(image) = payload.image {
        active.image = Set(Some(image));
    }
    if let Some(price) = payload.price {
        active.price = Set(price);
    }
    if let Some(stock) = payload.stock {
        active.stock = Set(stock);
    }
    if let Some(sizes) = payload.sizes {
        active.sizes = Set(normalize_sizes(sizes));
    }

    let product = active.update(&state.orm).await?;

    audit::record(
        &state.orm,
        user.user_id,
        "product_update",
        "products",
        serde_json::json!({ "product_id": product.id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Updated",
        Product::from(product),
        Some(Meta::empty()),
    ))
}

fn validate_amounts(price: Option<i64>, stock: Option<i32>) -> AppResult<()> {
    if matches!(price, Some(p) if p < 0) {
        return Err(AppError::Validation("price must not be negative".into()));
    }
    if matches!(stock, Some(s) if s < 0) {
        return Err(AppError::Validation("stock must not be negative".into()));
    }
    Ok(())
}

fn normalize_sizes(sizes: Vec<String>) -> SizeList {
    let mut out: Vec<String> = Vec::with_capacity(sizes.len());
    for size in sizes {
        let size = size.trim().to_uppercase();
        if !size.is_empty() && !out.contains(&size) {
            out.push(size);
        }
    }
    SizeList(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sizes_are_trimmed_uppercased_and_deduplicated() {
        let sizes = normalize_sizes(vec![" m".into(), "M".into(), "".into(), "xl".into()]);
        assert_eq!(sizes, SizeList(vec!["M".into(), "XL".into()]));
    }

    #[test]
    fn negative_price_or_stock_is_rejected() {
        assert!(validate_amounts(Some(-1), None).is_err());
        assert!(validate_amounts(None, Some(-3)).is_err());
        assert!(validate_amounts(Some(0), Some(0)).is_ok());
    }
}
