//! services/api/src/web/orders.rs
//!
//! Checkout and order history for the signed-in account, plus the admin views.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shop_core::{CoreError, Order, OrderStatus, ShippingInfo};
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::ApiError;
use crate::web::cart::CartItemResponse;
use crate::web::middleware::AuthContext;
use crate::web::state::AppState;

//=========================================================================================
// Request/Response Types
//=========================================================================================

#[derive(Serialize, Deserialize, ToSchema, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ShippingPayload {
    pub address: String,
    pub city: String,
    pub postal_code: String,
    pub country: String,
    pub phone: Option<String>,
}

impl From<ShippingPayload> for ShippingInfo {
    fn from(s: ShippingPayload) -> Self {
        Self {
            address: s.address,
            city: s.city,
            postal_code: s.postal_code,
            country: s.country,
            phone: s.phone,
        }
    }
}

impl From<ShippingInfo> for ShippingPayload {
    fn from(s: ShippingInfo) -> Self {
        Self {
            address: s.address,
            city: s.city,
            postal_code: s.postal_code,
            country: s.country,
            phone: s.phone,
        }
    }
}

/// Lines and prices come from the caller's cart, never from the request.
#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PlaceOrderRequest {
    pub shipping_info: ShippingPayload,
}

#[derive(Deserialize, ToSchema)]
pub struct UpdateOrderStatusRequest {
    /// One of `processing`, `shipped`, `delivered` (case-insensitive).
    pub status: String,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OrderResponse {
    pub id: Uuid,
    pub account_id: Uuid,
    pub items: Vec<CartItemResponse>,
    #[schema(value_type = String)]
    pub total_amount: Decimal,
    pub shipping_info: ShippingPayload,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub delivered_at: Option<DateTime<Utc>>,
}

impl From<Order> for OrderResponse {
    fn from(order: Order) -> Self {
        Self {
            id: order.id,
            account_id: order.account_id,
            items: order.items.iter().map(CartItemResponse::from).collect(),
            total_amount: order.total_amount,
            shipping_info: order.shipping.into(),
            status: order.status.as_str().to_string(),
            created_at: order.created_at,
            delivered_at: order.delivered_at,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct OrderEnvelope {
    pub success: bool,
    pub order: OrderResponse,
}

impl From<Order> for OrderEnvelope {
    fn from(order: Order) -> Self {
        Self {
            success: true,
            order: order.into(),
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct OrderListResponse {
    pub success: bool,
    pub count: usize,
    pub data: Vec<OrderResponse>,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AdminOrderListResponse {
    pub success: bool,
    /// Sum of every order's total.
    #[schema(value_type = String)]
    pub total_amount: Decimal,
    pub count: usize,
    pub data: Vec<OrderResponse>,
}

//=========================================================================================
// Handlers
//=========================================================================================

/// POST /api/orders - Check out the caller's cart
#[utoipa::path(
    post,
    path = "/api/orders",
    request_body = PlaceOrderRequest,
    responses(
        (status = 201, description = "Order placed and cart emptied", body = OrderEnvelope),
        (status = 400, description = "Empty cart, missing shipping details or not enough stock"),
        (status = 401, description = "Not authenticated"),
        (status = 404, description = "A product in the cart is no longer sold"),
        (status = 409, description = "Cart is being modified concurrently")
    ),
    security(("bearer" = [])),
    tag = "orders"
)]
pub async fn place_order_handler(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<PlaceOrderRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let order = state
        .orders
        .place_order(auth.account_id, req.shipping_info.into())
        .await?;
    Ok((StatusCode::CREATED, Json(OrderEnvelope::from(order))))
}

/// GET /api/orders/myorders - The caller's orders, newest first
#[utoipa::path(
    get,
    path = "/api/orders/myorders",
    responses(
        (status = 200, description = "The caller's orders", body = OrderListResponse),
        (status = 401, description = "Not authenticated")
    ),
    security(("bearer" = [])),
    tag = "orders"
)]
pub async fn my_orders_handler(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
) -> Result<impl IntoResponse, ApiError> {
    let orders = state.orders.my_orders(auth.account_id).await?;
    Ok(Json(OrderListResponse {
        success: true,
        count: orders.len(),
        data: orders.into_iter().map(OrderResponse::from).collect(),
    }))
}

/// GET /api/orders/{id} - One order, readable by its owner or an admin
#[utoipa::path(
    get,
    path = "/api/orders/{id}",
    params(("id" = Uuid, Path, description = "Order id")),
    responses(
        (status = 200, description = "The order", body = OrderEnvelope),
        (status = 401, description = "Not authenticated"),
        (status = 404, description = "Order not found")
    ),
    security(("bearer" = [])),
    tag = "orders"
)]
pub async fn get_order_handler(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let order = state.orders.get_order(auth.account_id, auth.role, id).await?;
    Ok(Json(OrderEnvelope::from(order)))
}

/// GET /api/orders - Every order with the summed total (admin)
#[utoipa::path(
    get,
    path = "/api/orders",
    responses(
        (status = 200, description = "All orders", body = AdminOrderListResponse),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Not an admin")
    ),
    security(("bearer" = [])),
    tag = "orders"
)]
pub async fn list_orders_handler(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    let (orders, total_amount) = state.orders.list_orders().await?;
    Ok(Json(AdminOrderListResponse {
        success: true,
        total_amount,
        count: orders.len(),
        data: orders.into_iter().map(OrderResponse::from).collect(),
    }))
}

/// PUT /api/orders/{id} - Move an order along (admin)
#[utoipa::path(
    put,
    path = "/api/orders/{id}",
    params(("id" = Uuid, Path, description = "Order id")),
    request_body = UpdateOrderStatusRequest,
    responses(
        (status = 200, description = "Updated order", body = OrderEnvelope),
        (status = 400, description = "Unknown status or order already delivered"),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Not an admin"),
        (status = 404, description = "Order not found")
    ),
    security(("bearer" = [])),
    tag = "orders"
)]
pub async fn update_order_status_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateOrderStatusRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let status = OrderStatus::parse(&req.status).ok_or_else(|| {
        CoreError::Validation(format!(
            "'{}' is not one of processing, shipped, delivered",
            req.status
        ))
    })?;
    let order = state.orders.update_status(id, status).await?;
    Ok(Json(OrderEnvelope::from(order)))
}
