//! crates/shop_core/src/error.rs
//!
//! Errors surfaced by the core services to their callers.

use uuid::Uuid;

use crate::domain::AmountOutOfRange;
use crate::ports::PortError;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("User already exists")]
    DuplicateAccount,

    #[error("No pending registration found for this email")]
    NoPendingRegistration,

    /// Wrong code and expired code are deliberately indistinguishable.
    #[error("Invalid or expired OTP")]
    InvalidOrExpiredOtp,

    #[error("Product not found")]
    ProductNotFound,

    #[error("Insufficient stock")]
    InsufficientStock { requested: u32, available: i32 },

    #[error("Email could not be sent")]
    EmailDispatchFailure(#[source] PortError),

    #[error("Quantity must be at least 1")]
    InvalidQuantity,

    #[error("Cart item not found")]
    LineItemNotFound(Uuid),

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Please verify your email before logging in.")]
    EmailNotVerified,

    #[error("{0}")]
    Validation(String),

    #[error("Cart is being modified concurrently, please retry")]
    CartContention,

    #[error(transparent)]
    AmountOutOfRange(#[from] AmountOutOfRange),

    #[error("Cart is empty")]
    EmptyCart,

    #[error("Order not found")]
    OrderNotFound,

    #[error("You have already delivered this order")]
    OrderAlreadyDelivered,

    #[error(transparent)]
    Port(#[from] PortError),
}

pub type CoreResult<T> = Result<T, CoreError>;
