//! services/api/src/web/state.rs
//!
//! Defines the application's shared state.

use std::sync::Arc;

use chrono::Duration;
use shop_core::ports::{
    Clock, CredentialHasher, DatabaseService, MailService, OtpGenerator,
    PendingRegistrationStore, TokenService,
};
use shop_core::{
    AccountService, CartService, CartStockPolicy, CatalogService, OrderService, RegistrationService,
};

//=========================================================================================
// Ports (Concrete Adapters Chosen at Startup)
//=========================================================================================

/// Every adapter the core services need, chosen once at startup.
#[derive(Clone)]
pub struct Ports {
    pub db: Arc<dyn DatabaseService>,
    pub pending: Arc<dyn PendingRegistrationStore>,
    pub mailer: Arc<dyn MailService>,
    pub hasher: Arc<dyn CredentialHasher>,
    pub otp: Arc<dyn OtpGenerator>,
    pub tokens: Arc<dyn TokenService>,
    pub clock: Arc<dyn Clock>,
}

//=========================================================================================
// AppState (Shared Across All Requests)
//=========================================================================================

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub registration: RegistrationService,
    pub accounts: AccountService,
    pub carts: CartService,
    pub catalog: CatalogService,
    pub orders: OrderService,
    pub tokens: Arc<dyn TokenService>,
}

impl AppState {
    /// Wires the core services on top of the given adapters.
    pub fn new(ports: Ports, otp_ttl: Duration, stock_policy: CartStockPolicy) -> Self {
        Self {
            registration: RegistrationService {
                db: ports.db.clone(),
                pending: ports.pending,
                mailer: ports.mailer,
                hasher: ports.hasher.clone(),
                otp: ports.otp,
                tokens: ports.tokens.clone(),
                clock: ports.clock.clone(),
                otp_ttl,
            },
            accounts: AccountService {
                db: ports.db.clone(),
                hasher: ports.hasher,
                tokens: ports.tokens.clone(),
            },
            carts: CartService {
                db: ports.db.clone(),
                clock: ports.clock.clone(),
                stock_policy,
            },
            catalog: CatalogService {
                db: ports.db.clone(),
            },
            orders: OrderService {
                db: ports.db,
                clock: ports.clock,
            },
            tokens: ports.tokens,
        }
    }
}
