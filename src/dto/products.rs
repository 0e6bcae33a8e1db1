use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::models::Product;

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateProductRequest {
    pub name: String,
    pub description: Option<String>,
    pub image: Option<String>,
    pub price: i64,
    pub stock: i32,
    #[serde(default)]
    pub sizes: Vec<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateProductRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub image: Option<String>,
    pub price: Option<i64>,
    pub stock: Option<i32>,
    pub sizes: Option<Vec<String>>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ProductList {
    pub items: Vec<Product>,
}
