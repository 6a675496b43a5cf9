//! End-to-end tests of the HTTP surface against in-memory ports.

use std::str::FromStr;
use std::sync::Arc;

use api_lib::adapters::HmacTokenService;
use api_lib::web::{self, AppState, Ports};
use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use chrono::Duration;
use rust_decimal::Decimal;
use secrecy::SecretString;
use serde_json::{json, Value};
use shop_core::memory::{
    InMemoryDatabase, InMemoryPendingStore, ManualClock, PlainHasher, RecordingMailer,
    ScriptedOtpGenerator,
};
use shop_core::{CartStockPolicy, DatabaseService, NewAccount, Role};
use tower::ServiceExt;
use uuid::Uuid;

struct TestApp {
    router: Router,
    db: Arc<InMemoryDatabase>,
    pending: Arc<InMemoryPendingStore>,
    mailer: Arc<RecordingMailer>,
    clock: Arc<ManualClock>,
}

impl TestApp {
    fn new(codes: &[&str]) -> Self {
        let db = Arc::new(InMemoryDatabase::default());
        let pending = Arc::new(InMemoryPendingStore::default());
        let mailer = Arc::new(RecordingMailer::default());
        let clock = Arc::new(ManualClock::default());
        let tokens = Arc::new(HmacTokenService::new(
            SecretString::from("an-hmac-key-that-is-32-bytes-lon".to_string()),
            Duration::days(30),
            clock.clone(),
        ));

        let ports = Ports {
            db: db.clone(),
            pending: pending.clone(),
            mailer: mailer.clone(),
            hasher: Arc::new(PlainHasher),
            otp: Arc::new(ScriptedOtpGenerator::new(codes)),
            tokens,
            clock: clock.clone(),
        };
        let state = AppState::new(ports, Duration::minutes(10), CartStockPolicy::Requested);

        Self {
            router: web::router(Arc::new(state)),
            db,
            pending,
            mailer,
            clock,
        }
    }

    async fn send(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    /// Registers and verifies an account, returning its token and id.
    async fn signed_up(&self, email: &str, otp: &str) -> (String, Uuid) {
        let (status, _) = self
            .send(
                Method::POST,
                "/api/auth/register",
                None,
                Some(json!({ "name": "Ann", "email": email, "password": "secret1" })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, body) = self
            .send(
                Method::POST,
                "/api/auth/verify-otp",
                None,
                Some(json!({ "email": email, "otp": otp })),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        let token = body["token"].as_str().unwrap().to_string();
        let id = Uuid::parse_str(body["user"]["id"].as_str().unwrap()).unwrap();
        (token, id)
    }

    async fn admin_token(&self, email: &str, otp: &str) -> String {
        let (_, id) = self.signed_up(email, otp).await;
        self.db.set_role(id, Role::Admin);
        let (status, body) = self
            .send(
                Method::POST,
                "/api/auth/login",
                None,
                Some(json!({ "email": email, "password": "secret1" })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        body["token"].as_str().unwrap().to_string()
    }

    async fn seed_product(&self, price: i64, stock: i32) -> Uuid {
        self.db
            .create_product(shop_core::NewProduct {
                name: "Mug".into(),
                description: "A mug".into(),
                category: "kitchen".into(),
                price: Decimal::from(price),
                stock,
            })
            .await
            .unwrap()
            .id
    }
}

fn decimal(value: &Value) -> Decimal {
    Decimal::from_str(value.as_str().unwrap()).unwrap()
}

//=========================================================================================
// Registration
//=========================================================================================

#[tokio::test]
async fn register_then_verify_returns_a_working_token() {
    let app = TestApp::new(&["123456"]);

    let (status, body) = app
        .send(
            Method::POST,
            "/api/auth/register",
            None,
            Some(json!({ "name": "Ann", "email": "  Ann@Example.com ", "password": "secret1" })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["success"], true);

    let sent = app.mailer.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, "ann@example.com");
    assert!(sent[0].text.contains("123456"));

    let (status, body) = app
        .send(
            Method::POST,
            "/api/auth/verify-otp",
            None,
            Some(json!({ "email": "ann@example.com", "otp": "123456" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["isVerified"], true);
    assert_eq!(body["user"]["role"], "user");
    assert!(body["user"].get("password").is_none());
    assert!(app.pending.is_empty());

    let token = body["token"].as_str().unwrap();
    let (status, body) = app.send(Method::GET, "/api/auth/me", Some(token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["email"], "ann@example.com");
    assert_eq!(body["user"]["name"], "Ann");
}

#[tokio::test]
async fn resubmitting_a_pending_signup_resends_with_200() {
    let app = TestApp::new(&["111111", "222222"]);
    let register = json!({ "name": "Ann", "email": "ann@example.com", "password": "secret1" });

    let (first, _) = app
        .send(Method::POST, "/api/auth/register", None, Some(register.clone()))
        .await;
    let (second, _) = app
        .send(Method::POST, "/api/auth/register", None, Some(register))
        .await;
    assert_eq!(first, StatusCode::CREATED);
    assert_eq!(second, StatusCode::OK);
    assert_eq!(app.mailer.sent().len(), 2);

    // Only the newest code is accepted.
    let (status, _) = app
        .send(
            Method::POST,
            "/api/auth/verify-otp",
            None,
            Some(json!({ "email": "ann@example.com", "otp": "111111" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = app
        .send(
            Method::POST,
            "/api/auth/verify-otp",
            None,
            Some(json!({ "email": "ann@example.com", "otp": "222222" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn wrong_and_expired_codes_are_rejected_alike() {
    let app = TestApp::new(&["123456"]);
    app.send(
        Method::POST,
        "/api/auth/register",
        None,
        Some(json!({ "name": "Ann", "email": "ann@example.com", "password": "secret1" })),
    )
    .await;

    let (status, wrong) = app
        .send(
            Method::POST,
            "/api/auth/verify-otp",
            None,
            Some(json!({ "email": "ann@example.com", "otp": "654321" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(wrong["success"], false);

    app.clock.advance(Duration::minutes(11));
    let (status, expired) = app
        .send(
            Method::POST,
            "/api/auth/verify-otp",
            None,
            Some(json!({ "email": "ann@example.com", "otp": "123456" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(wrong["message"], expired["message"]);
}

#[tokio::test]
async fn verify_without_a_pending_signup_is_rejected() {
    let app = TestApp::new(&["123456"]);
    let (status, body) = app
        .send(
            Method::POST,
            "/api/auth/verify-otp",
            None,
            Some(json!({ "email": "nobody@example.com", "otp": "123456" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "No pending registration found for this email");
}

#[tokio::test]
async fn registering_an_existing_account_is_rejected() {
    let app = TestApp::new(&["123456"]);
    app.signed_up("ann@example.com", "123456").await;

    let (status, body) = app
        .send(
            Method::POST,
            "/api/auth/register",
            None,
            Some(json!({ "name": "Ann", "email": "ANN@example.com", "password": "secret1" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "User already exists");
    assert_eq!(app.mailer.sent().len(), 1);
}

#[tokio::test]
async fn failed_dispatch_leaves_no_pending_signup() {
    let app = TestApp::new(&["123456"]);
    app.mailer.fail_next();

    let (status, body) = app
        .send(
            Method::POST,
            "/api/auth/register",
            None,
            Some(json!({ "name": "Ann", "email": "ann@example.com", "password": "secret1" })),
        )
        .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["success"], false);
    assert!(app.pending.is_empty());
}

#[tokio::test]
async fn invalid_signup_input_is_a_bad_request() {
    let app = TestApp::new(&["123456"]);
    let (status, _) = app
        .send(
            Method::POST,
            "/api/auth/register",
            None,
            Some(json!({ "name": "Ann", "email": "not-an-email", "password": "secret1" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .send(
            Method::POST,
            "/api/auth/register",
            None,
            Some(json!({ "email": "ann@example.com", "password": "secret1" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(app.mailer.sent().is_empty());
}

//=========================================================================================
// Accounts
//=========================================================================================

#[tokio::test]
async fn login_and_password_change() {
    let app = TestApp::new(&["123456"]);
    let (token, _) = app.signed_up("ann@example.com", "123456").await;

    let (status, _) = app
        .send(
            Method::POST,
            "/api/auth/login",
            None,
            Some(json!({ "email": "ann@example.com", "password": "wrong-one" })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app
        .send(
            Method::PUT,
            "/api/auth/change-password",
            Some(&token),
            Some(json!({ "currentPassword": "secret1", "newPassword": "secret2" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app
        .send(
            Method::POST,
            "/api/auth/login",
            None,
            Some(json!({ "email": "ann@example.com", "password": "secret2" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["token"].is_string());
}

#[tokio::test]
async fn profile_update_changes_the_name() {
    let app = TestApp::new(&["123456"]);
    let (token, _) = app.signed_up("ann@example.com", "123456").await;

    let (status, body) = app
        .send(
            Method::PUT,
            "/api/auth/profile",
            Some(&token),
            Some(json!({ "name": "Annie" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["name"], "Annie");
}

#[tokio::test]
async fn protected_routes_require_a_valid_token() {
    let app = TestApp::new(&["123456"]);

    let (status, body) = app.send(Method::GET, "/api/cart", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["success"], false);

    let (status, _) = app
        .send(Method::GET, "/api/auth/me", Some("forged.token"), None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn expired_tokens_are_rejected() {
    let app = TestApp::new(&["123456"]);
    let (token, _) = app.signed_up("ann@example.com", "123456").await;

    app.clock.advance(Duration::days(31));
    let (status, _) = app.send(Method::GET, "/api/cart", Some(&token), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

//=========================================================================================
// Catalog
//=========================================================================================

#[tokio::test]
async fn only_admins_create_products() {
    let app = TestApp::new(&["111111", "222222"]);
    let (user_token, _) = app.signed_up("ann@example.com", "111111").await;
    let admin_token = app.admin_token("boss@example.com", "222222").await;
    let product = json!({ "name": "Mug", "category": "kitchen", "price": "12.50", "stock": 3 });

    let (status, _) = app
        .send(Method::POST, "/api/products", None, Some(product.clone()))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app
        .send(Method::POST, "/api/products", Some(&user_token), Some(product.clone()))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app
        .send(Method::POST, "/api/products", Some(&admin_token), Some(product))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(decimal(&body["data"]["price"]), Decimal::new(1250, 2));

    let id = body["data"]["id"].as_str().unwrap().to_string();
    let (status, body) = app
        .send(Method::GET, &format!("/api/products/{id}"), None, None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["name"], "Mug");
}

#[tokio::test]
async fn product_listing_filters_and_pages() {
    let app = TestApp::new(&["123456"]);
    for _ in 0..3 {
        app.seed_product(10, 5).await;
    }
    app.db
        .create_product(shop_core::NewProduct {
            name: "Novel".into(),
            description: "A book".into(),
            category: "books".into(),
            price: Decimal::from(20),
            stock: 1,
        })
        .await
        .unwrap();

    let (status, body) = app
        .send(Method::GET, "/api/products?category=kitchen&limit=2", None, None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 3);
    assert_eq!(body["count"], 2);
    assert_eq!(body["limit"], 2);

    let (_, body) = app
        .send(Method::GET, "/api/products?minPrice=15", None, None)
        .await;
    assert_eq!(body["total"], 1);
    assert_eq!(body["data"][0]["name"], "Novel");

    let (status, _) = app
        .send(Method::GET, &format!("/api/products/{}", Uuid::new_v4()), None, None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

//=========================================================================================
// Cart
//=========================================================================================

#[tokio::test]
async fn cart_lifecycle_keeps_the_total_in_step() {
    let app = TestApp::new(&["123456"]);
    let (token, _) = app.signed_up("ann@example.com", "123456").await;
    let product_id = app.seed_product(10, 5).await;

    let (status, body) = app.send(Method::GET, "/api/cart", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["items"].as_array().unwrap().len(), 0);
    assert_eq!(decimal(&body["data"]["totalAmount"]), Decimal::ZERO);

    let (status, body) = app
        .send(
            Method::POST,
            "/api/cart",
            Some(&token),
            Some(json!({ "productId": product_id, "quantity": 2 })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(decimal(&body["data"]["totalAmount"]), Decimal::from(20));

    let (_, body) = app
        .send(
            Method::POST,
            "/api/cart",
            Some(&token),
            Some(json!({ "productId": product_id, "quantity": 3 })),
        )
        .await;
    let items = body["data"]["items"].as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["quantity"], 5);
    assert_eq!(items[0]["productName"], "Mug");
    assert_eq!(decimal(&body["data"]["totalAmount"]), Decimal::from(50));

    let item_id = items[0]["id"].as_str().unwrap().to_string();
    let (status, body) = app
        .send(
            Method::PUT,
            &format!("/api/cart/{item_id}"),
            Some(&token),
            Some(json!({ "quantity": 1 })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(decimal(&body["data"]["totalAmount"]), Decimal::from(10));

    let (status, body) = app
        .send(Method::DELETE, &format!("/api/cart/{item_id}"), Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["data"]["items"].as_array().unwrap().is_empty());
    assert_eq!(decimal(&body["data"]["totalAmount"]), Decimal::ZERO);
}

#[tokio::test]
async fn cart_rejections_map_to_client_errors() {
    let app = TestApp::new(&["123456"]);
    let (token, _) = app.signed_up("ann@example.com", "123456").await;
    let product_id = app.seed_product(10, 5).await;

    let (status, body) = app
        .send(
            Method::POST,
            "/api/cart",
            Some(&token),
            Some(json!({ "productId": product_id, "quantity": 6 })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Insufficient stock");

    let (status, _) = app
        .send(
            Method::POST,
            "/api/cart",
            Some(&token),
            Some(json!({ "productId": Uuid::new_v4(), "quantity": 1 })),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app
        .send(
            Method::POST,
            "/api/cart",
            Some(&token),
            Some(json!({ "productId": product_id, "quantity": -1 })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .send(
            Method::PUT,
            &format!("/api/cart/{}", Uuid::new_v4()),
            Some(&token),
            Some(json!({ "quantity": 2 })),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn sustained_cart_contention_is_a_conflict() {
    let app = TestApp::new(&["123456"]);
    let (token, _) = app.signed_up("ann@example.com", "123456").await;
    let product_id = app.seed_product(10, 5).await;
    app.send(Method::GET, "/api/cart", Some(&token), None).await;

    app.db.fail_next_cart_saves(shop_core::cart::MAX_CART_ATTEMPTS);
    let (status, _) = app
        .send(
            Method::POST,
            "/api/cart",
            Some(&token),
            Some(json!({ "productId": product_id, "quantity": 1 })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn out_of_range_variant_prices_are_rejected() {
    let app = TestApp::new(&["123456"]);
    let (token, _) = app.signed_up("ann@example.com", "123456").await;
    let product_id = app.seed_product(10, 5).await;

    for (quantity, price) in [(2, "79228162514264337593543950335"), (3, "-10")] {
        let (status, body) = app
            .send(
                Method::POST,
                "/api/cart",
                Some(&token),
                Some(json!({
                    "productId": product_id,
                    "quantity": quantity,
                    "selectedVariant": { "name": "size", "value": "XL", "price": price }
                })),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
    }

    let (status, body) = app.send(Method::GET, "/api/cart", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["data"]["items"].as_array().unwrap().is_empty());
    assert_eq!(decimal(&body["data"]["totalAmount"]), Decimal::ZERO);
}

#[tokio::test]
async fn oversized_product_price_is_a_bad_request() {
    let app = TestApp::new(&["123456"]);
    let admin_token = app.admin_token("boss@example.com", "123456").await;

    let (status, _) = app
        .send(
            Method::POST,
            "/api/products",
            Some(&admin_token),
            Some(json!({ "name": "Yacht", "price": "10000000000", "stock": 1 })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

//=========================================================================================
// Catalog administration
//=========================================================================================

#[tokio::test]
async fn admins_update_and_remove_products() {
    let app = TestApp::new(&["111111", "222222"]);
    let (user_token, _) = app.signed_up("ann@example.com", "111111").await;
    let admin_token = app.admin_token("boss@example.com", "222222").await;
    let product_id = app.seed_product(10, 1).await;
    let uri = format!("/api/products/{product_id}");
    let add_three = json!({ "productId": product_id, "quantity": 3 });

    let (status, _) = app
        .send(Method::POST, "/api/cart", Some(&user_token), Some(add_three.clone()))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .send(Method::PUT, &uri, Some(&user_token), Some(json!({ "stock": 10 })))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app
        .send(
            Method::PUT,
            &uri,
            Some(&admin_token),
            Some(json!({ "stock": 10, "price": "12.50" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["stock"], 10);
    assert_eq!(decimal(&body["data"]["price"]), Decimal::new(1250, 2));
    assert_eq!(body["data"]["name"], "Mug");

    let (status, body) = app
        .send(Method::POST, "/api/cart", Some(&user_token), Some(add_three))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(decimal(&body["data"]["totalAmount"]), Decimal::new(3750, 2));

    let (status, _) = app.send(Method::DELETE, &uri, Some(&user_token), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = app.send(Method::DELETE, &uri, Some(&admin_token), None).await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = app.send(Method::GET, "/api/products", None, None).await;
    assert_eq!(body["total"], 0);
    let (status, _) = app.send(Method::GET, &uri, None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = app
        .send(
            Method::POST,
            "/api/cart",
            Some(&user_token),
            Some(json!({ "productId": product_id, "quantity": 1 })),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app
        .send(
            Method::PUT,
            &format!("/api/products/{}", Uuid::new_v4()),
            Some(&admin_token),
            Some(json!({ "stock": 1 })),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

//=========================================================================================
// Orders
//=========================================================================================

fn shipping() -> Value {
    json!({
        "shippingInfo": {
            "address": "1 Main St",
            "city": "Springfield",
            "postalCode": "12345",
            "country": "US"
        }
    })
}

#[tokio::test]
async fn checkout_turns_the_cart_into_an_order() {
    let app = TestApp::new(&["111111", "222222", "333333"]);
    let (token, account_id) = app.signed_up("ann@example.com", "111111").await;
    let (other_token, _) = app.signed_up("bob@example.com", "222222").await;
    let admin_token = app.admin_token("boss@example.com", "333333").await;
    let product_id = app.seed_product(10, 5).await;

    app.send(
        Method::POST,
        "/api/cart",
        Some(&token),
        Some(json!({ "productId": product_id, "quantity": 2 })),
    )
    .await;

    let (status, body) = app
        .send(Method::POST, "/api/orders", Some(&token), Some(shipping()))
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["order"]["status"], "processing");
    assert_eq!(body["order"]["accountId"], account_id.to_string());
    assert_eq!(decimal(&body["order"]["totalAmount"]), Decimal::from(20));
    assert_eq!(body["order"]["shippingInfo"]["postalCode"], "12345");
    let order_id = body["order"]["id"].as_str().unwrap().to_string();

    let (_, body) = app.send(Method::GET, "/api/cart", Some(&token), None).await;
    assert!(body["data"]["items"].as_array().unwrap().is_empty());
    let product = app.db.get_product_by_id(product_id).await.unwrap().unwrap();
    assert_eq!(product.stock, 3);

    let (status, body) = app
        .send(Method::GET, "/api/orders/myorders", Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 1);
    assert_eq!(body["data"][0]["id"], order_id);

    let uri = format!("/api/orders/{order_id}");
    let (status, _) = app.send(Method::GET, &uri, Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = app.send(Method::GET, &uri, Some(&other_token), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = app.send(Method::GET, &uri, Some(&admin_token), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app
        .send(Method::GET, "/api/orders/myorders", Some(&other_token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 0);
}

#[tokio::test]
async fn checkout_needs_items_and_an_address() {
    let app = TestApp::new(&["123456"]);
    let (token, _) = app.signed_up("ann@example.com", "123456").await;

    let (status, body) = app
        .send(Method::POST, "/api/orders", Some(&token), Some(shipping()))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Cart is empty");

    let product_id = app.seed_product(10, 5).await;
    app.send(
        Method::POST,
        "/api/cart",
        Some(&token),
        Some(json!({ "productId": product_id, "quantity": 1 })),
    )
    .await;
    let mut incomplete = shipping();
    incomplete["shippingInfo"]["address"] = json!("");
    let (status, _) = app
        .send(Method::POST, "/api/orders", Some(&token), Some(incomplete))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app.send(Method::POST, "/api/orders", None, Some(shipping())).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn admins_list_and_advance_orders() {
    let app = TestApp::new(&["111111", "222222"]);
    let (token, _) = app.signed_up("ann@example.com", "111111").await;
    let admin_token = app.admin_token("boss@example.com", "222222").await;
    let product_id = app.seed_product(10, 5).await;
    app.send(
        Method::POST,
        "/api/cart",
        Some(&token),
        Some(json!({ "productId": product_id, "quantity": 1 })),
    )
    .await;
    let (_, body) = app
        .send(Method::POST, "/api/orders", Some(&token), Some(shipping()))
        .await;
    let uri = format!("/api/orders/{}", body["order"]["id"].as_str().unwrap());

    let (status, _) = app.send(Method::GET, "/api/orders", Some(&token), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, body) = app
        .send(Method::GET, "/api/orders", Some(&admin_token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 1);
    assert_eq!(decimal(&body["totalAmount"]), Decimal::from(10));

    let (status, _) = app
        .send(Method::PUT, &uri, Some(&admin_token), Some(json!({ "status": "Lost" })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, body) = app
        .send(Method::PUT, &uri, Some(&admin_token), Some(json!({ "status": "Delivered" })))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["order"]["status"], "delivered");
    assert!(body["order"]["deliveredAt"].is_string());

    let (status, body) = app
        .send(Method::PUT, &uri, Some(&admin_token), Some(json!({ "status": "shipped" })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "You have already delivered this order");
}

#[tokio::test]
async fn unverified_login_is_unauthorized() {
    let app = TestApp::new(&["123456"]);
    app.db
        .create_account(NewAccount {
            name: "Ann".into(),
            email: "ann@example.com".into(),
            password_hash: "plain:secret1".into(),
            role: Role::User,
            is_verified: false,
        })
        .await
        .unwrap();

    let (status, body) = app
        .send(
            Method::POST,
            "/api/auth/login",
            None,
            Some(json!({ "email": "ann@example.com", "password": "secret1" })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Please verify your email before logging in.");
}
