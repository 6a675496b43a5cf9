//! crates/shop_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the shop's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of specific external implementations like databases or mail relays.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::{
    Account, AccountCredentials, Cart, NewAccount, NewProduct, Order, OrderStatus,
    PendingRegistration, Product, ProductChanges, ProductPage, ProductQuery, Role, SessionClaims,
};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., database, network).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    /// A uniqueness constraint or optimistic version check failed.
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
    #[error("Unauthorized")]
    Unauthorized,
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

#[async_trait]
pub trait DatabaseService: Send + Sync {
    // --- Accounts ---
    /// Fails with `Conflict` when the email is already taken.
    async fn create_account(&self, account: NewAccount) -> PortResult<Account>;

    async fn find_account_by_email(&self, email: &str) -> PortResult<Option<AccountCredentials>>;

    async fn get_account_by_id(&self, account_id: Uuid) -> PortResult<Account>;

    async fn get_credentials_by_id(&self, account_id: Uuid) -> PortResult<AccountCredentials>;

    async fn update_account_name(&self, account_id: Uuid, name: &str) -> PortResult<Account>;

    async fn update_password_hash(&self, account_id: Uuid, password_hash: &str) -> PortResult<()>;

    // --- Catalog ---
    async fn get_product_by_id(&self, product_id: Uuid) -> PortResult<Option<Product>>;

    async fn list_products(&self, query: &ProductQuery) -> PortResult<ProductPage>;

    async fn create_product(&self, product: NewProduct) -> PortResult<Product>;

    /// Applies the fields set in `changes`. `NotFound` for an unknown id.
    async fn update_product(
        &self,
        product_id: Uuid,
        changes: &ProductChanges,
    ) -> PortResult<Product>;

    // --- Carts ---
    async fn find_cart_by_account(&self, account_id: Uuid) -> PortResult<Option<Cart>>;

    /// Compare-and-swap on `cart.version()`.
    ///
    /// Version 0 inserts a new cart; any other version updates only if the stored
    /// version still matches. Returns the cart carrying its new version, or
    /// `Conflict` when another writer got there first.
    async fn save_cart(&self, cart: &Cart) -> PortResult<Cart>;

    // --- Orders ---
    /// Stores `order`, takes its quantities out of stock and saves `emptied_cart`,
    /// all or nothing.
    ///
    /// The cart is saved with the same compare-and-swap as `save_cart`. `Conflict`
    /// when the cart version moved or a product no longer has the stock.
    async fn place_order(&self, order: &Order, emptied_cart: &Cart) -> PortResult<Order>;

    /// Newest first.
    async fn list_orders_for_account(&self, account_id: Uuid) -> PortResult<Vec<Order>>;

    /// Every order, newest first.
    async fn list_orders(&self) -> PortResult<Vec<Order>>;

    async fn get_order(&self, order_id: Uuid) -> PortResult<Option<Order>>;

    async fn update_order_status(
        &self,
        order_id: Uuid,
        status: OrderStatus,
        delivered_at: Option<DateTime<Utc>>,
    ) -> PortResult<Order>;
}

/// Temporary holding area for unverified signups, keyed by email.
#[async_trait]
pub trait PendingRegistrationStore: Send + Sync {
    async fn get(&self, email: &str) -> PortResult<Option<PendingRegistration>>;

    /// Inserts or overwrites the record for `pending.email`.
    async fn put(&self, pending: PendingRegistration) -> PortResult<()>;

    async fn remove(&self, email: &str) -> PortResult<Option<PendingRegistration>>;
}

/// An outbound email with both plain-text and HTML bodies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMail {
    pub to: String,
    pub subject: String,
    pub text: String,
    pub html: String,
}

#[async_trait]
pub trait MailService: Send + Sync {
    /// Hands a message to the relay.
    async fn send_mail(&self, mail: OutgoingMail) -> PortResult<()>;
}

pub trait TokenService: Send + Sync {
    /// Issues a signed session token bound to an account and role.
    fn issue(&self, account_id: Uuid, role: Role) -> PortResult<String>;

    /// Checks signature and expiry, returning the embedded claims.
    fn verify(&self, token: &str) -> PortResult<SessionClaims>;
}

pub trait CredentialHasher: Send + Sync {
    fn hash(&self, password: &str) -> PortResult<String>;

    /// `Ok(false)` for a well-formed hash that does not match.
    fn verify(&self, password: &str, password_hash: &str) -> PortResult<bool>;
}

pub trait OtpGenerator: Send + Sync {
    /// Produces a 6-digit numeric code.
    fn generate(&self) -> String;
}

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
