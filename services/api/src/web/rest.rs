//! services/api/src/web/rest.rs
//!
//! Contains the master definition for the OpenAPI specification and the
//! response types shared by several handler modules.

use serde::Serialize;
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi, ToSchema,
};

use crate::web::{auth, cart, orders, products};

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        auth::register_handler,
        auth::verify_otp_handler,
        auth::login_handler,
        auth::me_handler,
        auth::update_profile_handler,
        auth::change_password_handler,
        cart::get_cart_handler,
        cart::add_to_cart_handler,
        cart::update_cart_item_handler,
        cart::remove_cart_item_handler,
        products::list_products_handler,
        products::get_product_handler,
        products::create_product_handler,
        products::update_product_handler,
        products::delete_product_handler,
        orders::place_order_handler,
        orders::my_orders_handler,
        orders::get_order_handler,
        orders::list_orders_handler,
        orders::update_order_status_handler,
    ),
    components(
        schemas(
            MessageResponse,
            auth::RegisterRequest,
            auth::VerifyOtpRequest,
            auth::LoginRequest,
            auth::UpdateProfileRequest,
            auth::ChangePasswordRequest,
            auth::UserResponse,
            auth::AuthResponse,
            auth::UserEnvelope,
            cart::VariantPayload,
            cart::AddToCartRequest,
            cart::UpdateQuantityRequest,
            cart::CartItemResponse,
            cart::CartData,
            cart::CartResponse,
            products::CreateProductRequest,
            products::ProductResponse,
            products::ProductListResponse,
            products::ProductEnvelope,
            products::UpdateProductRequest,
            orders::ShippingPayload,
            orders::PlaceOrderRequest,
            orders::UpdateOrderStatusRequest,
            orders::OrderResponse,
            orders::OrderEnvelope,
            orders::OrderListResponse,
            orders::AdminOrderListResponse,
        )
    ),
    modifiers(&BearerAuth),
    tags(
        (name = "auth", description = "Signup with email OTP, login and profile."),
        (name = "cart", description = "The signed-in account's shopping cart."),
        (name = "products", description = "The product catalog."),
        (name = "orders", description = "Checkout and order history.")
    )
)]
pub struct ApiDoc;

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer",
                SecurityScheme::Http(HttpBuilder::new().scheme(HttpAuthScheme::Bearer).build()),
            );
        }
    }
}

//=========================================================================================
// Shared Response Types
//=========================================================================================

/// A bare acknowledgement.
#[derive(Serialize, ToSchema)]
pub struct MessageResponse {
    pub success: bool,
    pub message: String,
}

impl MessageResponse {
    pub fn ok(message: &str) -> Self {
        Self {
            success: true,
            message: message.to_string(),
        }
    }
}
