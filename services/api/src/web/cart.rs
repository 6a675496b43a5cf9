//! services/api/src/web/cart.rs
//!
//! Cart endpoints for the signed-in account.

use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shop_core::{AddItem, Cart, CoreError, LineItem, SelectedVariant};
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::ApiError;
use crate::web::middleware::AuthContext;
use crate::web::state::AppState;

//=========================================================================================
// Request/Response Types
//=========================================================================================

#[derive(Serialize, Deserialize, ToSchema, Clone)]
pub struct VariantPayload {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub value: String,
    #[schema(value_type = Option<String>)]
    pub price: Option<Decimal>,
}

impl From<VariantPayload> for SelectedVariant {
    fn from(v: VariantPayload) -> Self {
        Self {
            name: v.name,
            value: v.value,
            price: v.price,
        }
    }
}

impl From<&SelectedVariant> for VariantPayload {
    fn from(v: &SelectedVariant) -> Self {
        Self {
            name: v.name.clone(),
            value: v.value.clone(),
            price: v.price,
        }
    }
}

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AddToCartRequest {
    pub product_id: Uuid,
    #[serde(default = "default_quantity")]
    pub quantity: i64,
    pub selected_variant: Option<VariantPayload>,
}

fn default_quantity() -> i64 {
    1
}

#[derive(Deserialize, ToSchema)]
pub struct UpdateQuantityRequest {
    pub quantity: i64,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CartItemResponse {
    pub id: Uuid,
    pub product_id: Uuid,
    pub product_name: Option<String>,
    pub quantity: u32,
    #[schema(value_type = String)]
    pub price: Decimal,
    pub selected_variant: Option<VariantPayload>,
    #[schema(value_type = String)]
    pub subtotal: Decimal,
}

impl From<&LineItem> for CartItemResponse {
    fn from(line: &LineItem) -> Self {
        Self {
            id: line.id,
            product_id: line.product_id,
            product_name: line.product_name.clone(),
            quantity: line.quantity,
            price: line.unit_price,
            selected_variant: line.selected_variant.as_ref().map(VariantPayload::from),
            subtotal: line.subtotal().unwrap_or_default(),
        }
    }
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CartData {
    pub items: Vec<CartItemResponse>,
    #[schema(value_type = String)]
    pub total_amount: Decimal,
    pub updated_at: DateTime<Utc>,
}

#[derive(Serialize, ToSchema)]
pub struct CartResponse {
    pub success: bool,
    pub data: CartData,
}

impl From<Cart> for CartResponse {
    fn from(cart: Cart) -> Self {
        Self {
            success: true,
            data: CartData {
                items: cart.items().iter().map(CartItemResponse::from).collect(),
                total_amount: cart.total_amount(),
                updated_at: cart.updated_at(),
            },
        }
    }
}

/// Negative or oversized quantities are rejected the same way zero is.
fn quantity(value: i64) -> Result<u32, ApiError> {
    u32::try_from(value).map_err(|_| CoreError::InvalidQuantity.into())
}

//=========================================================================================
// Handlers
//=========================================================================================

/// GET /api/cart - The caller's cart, created empty on first access
#[utoipa::path(
    get,
    path = "/api/cart",
    responses(
        (status = 200, description = "The cart", body = CartResponse),
        (status = 401, description = "Not authenticated")
    ),
    security(("bearer" = [])),
    tag = "cart"
)]
pub async fn get_cart_handler(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
) -> Result<impl IntoResponse, ApiError> {
    let cart = state.carts.get_or_create_cart(auth.account_id).await?;
    Ok(Json(CartResponse::from(cart)))
}

/// POST /api/cart - Add a product, merging with an existing line for it
#[utoipa::path(
    post,
    path = "/api/cart",
    request_body = AddToCartRequest,
    responses(
        (status = 200, description = "Updated cart", body = CartResponse),
        (status = 400, description = "Invalid quantity or not enough stock"),
        (status = 404, description = "Product not found"),
        (status = 409, description = "Cart is being modified concurrently")
    ),
    security(("bearer" = [])),
    tag = "cart"
)]
pub async fn add_to_cart_handler(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<AddToCartRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let request = AddItem {
        product_id: req.product_id,
        quantity: quantity(req.quantity)?,
        selected_variant: req.selected_variant.map(SelectedVariant::from),
    };
    let cart = state.carts.add_item(auth.account_id, request).await?;
    Ok(Json(CartResponse::from(cart)))
}

/// PUT /api/cart/{item_id} - Set a line's quantity
#[utoipa::path(
    put,
    path = "/api/cart/{item_id}",
    request_body = UpdateQuantityRequest,
    params(("item_id" = Uuid, Path, description = "The cart line to change")),
    responses(
        (status = 200, description = "Updated cart", body = CartResponse),
        (status = 400, description = "Quantity must be at least 1"),
        (status = 404, description = "Cart line not found")
    ),
    security(("bearer" = [])),
    tag = "cart"
)]
pub async fn update_cart_item_handler(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Path(item_id): Path<Uuid>,
    Json(req): Json<UpdateQuantityRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let cart = state
        .carts
        .set_quantity(auth.account_id, item_id, quantity(req.quantity)?)
        .await?;
    Ok(Json(CartResponse::from(cart)))
}

/// DELETE /api/cart/{item_id} - Remove a line
#[utoipa::path(
    delete,
    path = "/api/cart/{item_id}",
    params(("item_id" = Uuid, Path, description = "The cart line to remove")),
    responses(
        (status = 200, description = "Updated cart", body = CartResponse),
        (status = 401, description = "Not authenticated")
    ),
    security(("bearer" = [])),
    tag = "cart"
)]
pub async fn remove_cart_item_handler(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Path(item_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let cart = state.carts.remove_item(auth.account_id, item_id).await?;
    Ok(Json(CartResponse::from(cart)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quantity_rejects_negative_values() {
        assert_eq!(quantity(3).unwrap(), 3);
        assert!(matches!(
            quantity(-1),
            Err(ApiError::Core(CoreError::InvalidQuantity))
        ));
        assert!(quantity(i64::from(u32::MAX) + 1).is_err());
    }

    #[test]
    fn add_request_defaults_quantity_to_one() {
        let req: AddToCartRequest = serde_json::from_value(serde_json::json!({
            "productId": Uuid::nil(),
            "selectedVariant": { "name": "Size", "value": "L", "price": "12.50" }
        }))
        .unwrap();
        assert_eq!(req.quantity, 1);
        let variant = SelectedVariant::from(req.selected_variant.unwrap());
        assert_eq!(variant.price, Some(Decimal::new(1250, 2)));
    }
}
