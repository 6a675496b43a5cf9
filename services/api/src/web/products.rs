//! services/api/src/web/products.rs
//!
//! Catalog endpoints. Reads are public, changes are admin-only.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shop_core::{NewProduct, Product, ProductChanges, ProductQuery};
use std::sync::Arc;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::error::ApiError;
use crate::web::rest::MessageResponse;
use crate::web::state::AppState;

//=========================================================================================
// Request/Response Types
//=========================================================================================

#[derive(Deserialize, IntoParams, Default)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct ProductListParams {
    /// Case-insensitive match against name and description.
    pub keyword: Option<String>,
    pub category: Option<String>,
    #[param(value_type = Option<String>)]
    pub min_price: Option<Decimal>,
    #[param(value_type = Option<String>)]
    pub max_price: Option<Decimal>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

impl From<ProductListParams> for ProductQuery {
    fn from(params: ProductListParams) -> Self {
        let defaults = ProductQuery::default();
        Self {
            keyword: params.keyword,
            category: params.category,
            min_price: params.min_price,
            max_price: params.max_price,
            page: params.page.unwrap_or(defaults.page),
            limit: params.limit.unwrap_or(defaults.limit),
        }
    }
}

#[derive(Deserialize, ToSchema)]
pub struct CreateProductRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category: String,
    #[schema(value_type = String)]
    pub price: Decimal,
    #[serde(default)]
    pub stock: i32,
}

/// Every field is optional; absent fields keep their stored value.
#[derive(Deserialize, ToSchema, Default)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProductRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    #[schema(value_type = Option<String>)]
    pub price: Option<Decimal>,
    pub stock: Option<i32>,
    pub is_active: Option<bool>,
}

impl From<UpdateProductRequest> for ProductChanges {
    fn from(req: UpdateProductRequest) -> Self {
        Self {
            name: req.name,
            description: req.description,
            category: req.category,
            price: req.price,
            stock: req.stock,
            is_active: req.is_active,
        }
    }
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProductResponse {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub category: String,
    #[schema(value_type = String)]
    pub price: Decimal,
    pub stock: i32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl From<Product> for ProductResponse {
    fn from(p: Product) -> Self {
        Self {
            id: p.id,
            name: p.name,
            description: p.description,
            category: p.category,
            price: p.price,
            stock: p.stock,
            is_active: p.is_active,
            created_at: p.created_at,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct ProductListResponse {
    pub success: bool,
    pub count: usize,
    pub total: u64,
    pub page: u32,
    pub limit: u32,
    pub data: Vec<ProductResponse>,
}

#[derive(Serialize, ToSchema)]
pub struct ProductEnvelope {
    pub success: bool,
    pub data: ProductResponse,
}

//=========================================================================================
// Handlers
//=========================================================================================

/// GET /api/products - Active products, filtered and paged
#[utoipa::path(
    get,
    path = "/api/products",
    params(ProductListParams),
    responses(
        (status = 200, description = "One page of products", body = ProductListResponse)
    ),
    tag = "products"
)]
pub async fn list_products_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ProductListParams>,
) -> Result<impl IntoResponse, ApiError> {
    let page = state.catalog.list_products(params.into()).await?;
    Ok(Json(ProductListResponse {
        success: true,
        count: page.products.len(),
        total: page.total,
        page: page.page,
        limit: page.limit,
        data: page.products.into_iter().map(ProductResponse::from).collect(),
    }))
}

/// GET /api/products/{id} - A single product
#[utoipa::path(
    get,
    path = "/api/products/{id}",
    params(("id" = Uuid, Path, description = "Product id")),
    responses(
        (status = 200, description = "The product", body = ProductEnvelope),
        (status = 404, description = "Product not found")
    ),
    tag = "products"
)]
pub async fn get_product_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let product = state.catalog.get_product(id).await?;
    Ok(Json(ProductEnvelope {
        success: true,
        data: product.into(),
    }))
}

/// POST /api/products - Add a product to the catalog (admin)
#[utoipa::path(
    post,
    path = "/api/products",
    request_body = CreateProductRequest,
    responses(
        (status = 201, description = "Product created", body = ProductEnvelope),
        (status = 400, description = "Invalid product"),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Not an admin")
    ),
    security(("bearer" = [])),
    tag = "products"
)]
pub async fn create_product_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateProductRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let product = state
        .catalog
        .create_product(NewProduct {
            name: req.name,
            description: req.description,
            category: req.category,
            price: req.price,
            stock: req.stock,
        })
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(ProductEnvelope {
            success: true,
            data: product.into(),
        }),
    ))
}

/// PUT /api/products/{id} - Change a product's details, price or stock (admin)
#[utoipa::path(
    put,
    path = "/api/products/{id}",
    params(("id" = Uuid, Path, description = "Product id")),
    request_body = UpdateProductRequest,
    responses(
        (status = 200, description = "Updated product", body = ProductEnvelope),
        (status = 400, description = "Invalid product"),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Not an admin"),
        (status = 404, description = "Product not found")
    ),
    security(("bearer" = [])),
    tag = "products"
)]
pub async fn update_product_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateProductRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let product = state.catalog.update_product(id, req.into()).await?;
    Ok(Json(ProductEnvelope {
        success: true,
        data: product.into(),
    }))
}

/// DELETE /api/products/{id} - Take a product out of the catalog (admin)
///
/// The row is kept and marked inactive so existing orders still resolve it.
#[utoipa::path(
    delete,
    path = "/api/products/{id}",
    params(("id" = Uuid, Path, description = "Product id")),
    responses(
        (status = 200, description = "Product removed", body = MessageResponse),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Not an admin"),
        (status = 404, description = "Product not found")
    ),
    security(("bearer" = [])),
    tag = "products"
)]
pub async fn delete_product_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    state.catalog.deactivate_product(id).await?;
    Ok(Json(MessageResponse::ok("Product removed")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_paging_falls_back_to_defaults() {
        let query = ProductQuery::from(ProductListParams {
            category: Some("books".into()),
            ..Default::default()
        });
        assert_eq!(query.page, 1);
        assert_eq!(query.limit, 10);
        assert_eq!(query.category.as_deref(), Some("books"));
    }

    #[test]
    fn update_request_reads_camel_case() {
        let req: UpdateProductRequest =
            serde_json::from_str(r#"{"price": "12.50", "isActive": false}"#).unwrap();
        let changes = ProductChanges::from(req);
        assert_eq!(changes.price, Some(Decimal::new(1250, 2)));
        assert_eq!(changes.is_active, Some(false));
        assert!(changes.name.is_none());
        assert!(changes.stock.is_none());
    }
}
