pub mod accounts;
pub mod cart;
pub mod catalog;
pub mod domain;
pub mod error;
pub mod orders;
pub mod ports;
pub mod registration;

#[cfg(any(test, feature = "test-support"))]
pub mod memory;

pub use accounts::AccountService;
pub use cart::{AddItem, CartService, CartStockPolicy};
pub use catalog::CatalogService;
pub use domain::{
    is_valid_price, Account, AccountCredentials, AmountOutOfRange, AuthenticatedAccount, Cart,
    LineItem, NewAccount, NewProduct, Order, OrderStatus, PendingRegistration, Product,
    ProductChanges, ProductPage, ProductQuery, Role, SelectedVariant, SessionClaims, ShippingInfo,
    MAX_TOTAL, MAX_UNIT_PRICE,
};
pub use error::{CoreError, CoreResult};
pub use orders::OrderService;
pub use ports::{
    Clock, CredentialHasher, DatabaseService, MailService, OtpGenerator, OutgoingMail,
    PendingRegistrationStore, PortError, PortResult, SystemClock, TokenService,
};
pub use registration::{RegistrationOutcome, RegistrationService};
