pub mod auth;
pub mod cart;
pub mod middleware;
pub mod orders;
pub mod products;
pub mod rest;
pub mod state;

use std::sync::Arc;

use axum::{
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post, put},
    Router,
};

pub use middleware::{require_admin, require_auth, AuthContext};
pub use rest::ApiDoc;
pub use state::{AppState, Ports};

/// Builds every `/api` route with its authentication layers applied.
///
/// Docs, CORS and tracing are layered on by the binary.
pub fn router(app_state: Arc<AppState>) -> Router {
    let public_routes = Router::new()
        .route("/api/auth/register", post(auth::register_handler))
        .route("/api/auth/verify-otp", post(auth::verify_otp_handler))
        .route("/api/auth/login", post(auth::login_handler))
        .route("/api/products", get(products::list_products_handler))
        .route("/api/products/{id}", get(products::get_product_handler));

    let protected_routes = Router::new()
        .route("/api/auth/me", get(auth::me_handler))
        .route("/api/auth/profile", put(auth::update_profile_handler))
        .route(
            "/api/auth/change-password",
            put(auth::change_password_handler),
        )
        .route(
            "/api/cart",
            get(cart::get_cart_handler).post(cart::add_to_cart_handler),
        )
        .route(
            "/api/cart/{item_id}",
            put(cart::update_cart_item_handler).delete(cart::remove_cart_item_handler),
        )
        .route("/api/orders", post(orders::place_order_handler))
        .route("/api/orders/myorders", get(orders::my_orders_handler))
        .route("/api/orders/{id}", get(orders::get_order_handler))
        .route_layer(from_fn_with_state(app_state.clone(), require_auth));

    // Layers run outside-in, so require_auth sees the request first.
    let admin_routes = Router::new()
        .route("/api/products", post(products::create_product_handler))
        .route(
            "/api/products/{id}",
            put(products::update_product_handler).delete(products::delete_product_handler),
        )
        .route("/api/orders", get(orders::list_orders_handler))
        .route("/api/orders/{id}", put(orders::update_order_status_handler))
        .route_layer(from_fn(require_admin))
        .route_layer(from_fn_with_state(app_state.clone(), require_auth));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .merge(admin_routes)
        .with_state(app_state)
}
