//! crates/shop_core/src/domain.rs
//!
//! Defines the pure, core data structures for the shop.
//! These structs are independent of any database or serialization format.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

//=========================================================================================
// Accounts
//=========================================================================================

/// The role attached to an account and carried inside its session token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Role {
    #[default]
    User,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "user" => Some(Role::User),
            "admin" => Some(Role::Admin),
            _ => None,
        }
    }
}

/// A durable customer account - used throughout the app.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub is_verified: bool,
    pub created_at: DateTime<Utc>,
}

// Only used internally for login and password changes - contains sensitive data
#[derive(Debug, Clone)]
pub struct AccountCredentials {
    pub account: Account,
    pub password_hash: String,
}

/// The fields needed to persist a brand new account.
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    pub is_verified: bool,
}

/// An unconfirmed signup waiting for its one-time code.
///
/// Never persisted durably. At most one exists per email; a repeated signup
/// rotates `otp` and `otp_expiry` in place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingRegistration {
    pub email: String,
    pub name: String,
    pub password_hash: String,
    pub otp: String,
    pub otp_expiry: DateTime<Utc>,
}

impl PendingRegistration {
    /// True when `otp` matches and the code has not expired at `now`.
    pub fn accepts(&self, otp: &str, now: DateTime<Utc>) -> bool {
        self.otp == otp && now <= self.otp_expiry
    }
}

/// A signed session token together with the account it was issued for.
#[derive(Debug, Clone)]
pub struct AuthenticatedAccount {
    pub token: String,
    pub account: Account,
}

/// The identity carried by a verified session token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionClaims {
    pub account_id: Uuid,
    pub role: Role,
    pub expires_at: DateTime<Utc>,
}

//=========================================================================================
// Catalog
//=========================================================================================

/// A catalog product, the authoritative source for price and stock.
#[derive(Debug, Clone, PartialEq)]
pub struct Product {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub category: String,
    pub price: Decimal,
    pub stock: i32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// Largest price a product or variant may carry, the range of `NUMERIC(12, 2)`.
pub const MAX_UNIT_PRICE: Decimal = Decimal::from_parts(0xD4A5_0FFF, 0xE8, 0, false, 2);

/// Largest cart or order total, the range of `NUMERIC(14, 2)`.
pub const MAX_TOTAL: Decimal = Decimal::from_parts(0x107A_3FFF, 0x5AF3, 0, false, 2);

pub fn is_valid_price(price: Decimal) -> bool {
    price >= Decimal::ZERO && price <= MAX_UNIT_PRICE
}

#[derive(Debug, Clone)]
pub struct NewProduct {
    pub name: String,
    pub description: String,
    pub category: String,
    pub price: Decimal,
    pub stock: i32,
}

/// A partial product update. `None` leaves the field as it is.
#[derive(Debug, Clone, Default)]
pub struct ProductChanges {
    pub name: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub price: Option<Decimal>,
    pub stock: Option<i32>,
    pub is_active: Option<bool>,
}

impl ProductChanges {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.description.is_none()
            && self.category.is_none()
            && self.price.is_none()
            && self.stock.is_none()
            && self.is_active.is_none()
    }
}

/// Filters and paging for catalog listings.
#[derive(Debug, Clone, PartialEq)]
pub struct ProductQuery {
    pub keyword: Option<String>,
    pub category: Option<String>,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
    pub page: u32,
    pub limit: u32,
}

impl Default for ProductQuery {
    fn default() -> Self {
        Self {
            keyword: None,
            category: None,
            min_price: None,
            max_price: None,
            page: 1,
            limit: 10,
        }
    }
}

impl ProductQuery {
    pub fn offset(&self) -> u64 {
        u64::from(self.page.saturating_sub(1)) * u64::from(self.limit)
    }
}

#[derive(Debug, Clone)]
pub struct ProductPage {
    pub products: Vec<Product>,
    pub total: u64,
    pub page: u32,
    pub limit: u32,
}

//=========================================================================================
// Cart
//=========================================================================================

/// The variant a shopper picked for a line, optionally overriding the price.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedVariant {
    pub name: String,
    pub value: String,
    pub price: Option<Decimal>,
}

/// One entry in a cart. `unit_price` is locked in when the line is created.
#[derive(Debug, Clone, PartialEq)]
pub struct LineItem {
    pub id: Uuid,
    pub product_id: Uuid,
    pub product_name: Option<String>,
    pub quantity: u32,
    pub unit_price: Decimal,
    pub selected_variant: Option<SelectedVariant>,
}

impl LineItem {
    /// Variant price if one was selected with a price, else the stored unit price.
    pub fn effective_price(&self) -> Decimal {
        self.selected_variant
            .as_ref()
            .and_then(|v| v.price)
            .unwrap_or(self.unit_price)
    }

    /// `None` when the price is outside `0..=MAX_UNIT_PRICE` or the product overflows.
    pub fn subtotal(&self) -> Option<Decimal> {
        let price = self.effective_price();
        if !is_valid_price(price) {
            return None;
        }
        price.checked_mul(Decimal::from(self.quantity))
    }
}

/// A cart or order total fell outside `0..=MAX_TOTAL`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("Cart total is out of the allowed range")]
pub struct AmountOutOfRange;

/// Sum of every line's subtotal, bounded by `MAX_TOTAL`.
pub fn total_of(items: &[LineItem]) -> Result<Decimal, AmountOutOfRange> {
    let total = items.iter().try_fold(Decimal::ZERO, |acc, item| {
        item.subtotal().and_then(|subtotal| acc.checked_add(subtotal))
    });
    match total {
        Some(total) if total <= MAX_TOTAL => Ok(total),
        _ => Err(AmountOutOfRange),
    }
}

/// A shopper's cart. One per account.
///
/// Items are only reachable through methods that recompute `total_amount`,
/// so a `Cart` value never carries a stale or out-of-range total. A mutation
/// that would push the total out of range leaves the cart untouched.
#[derive(Debug, Clone, PartialEq)]
pub struct Cart {
    account_id: Uuid,
    items: Vec<LineItem>,
    total_amount: Decimal,
    version: i64,
    updated_at: DateTime<Utc>,
}

impl Cart {
    /// A fresh, never-saved cart. Version 0 means "not yet persisted".
    pub fn empty(account_id: Uuid, now: DateTime<Utc>) -> Self {
        Self {
            account_id,
            items: Vec::new(),
            total_amount: Decimal::ZERO,
            version: 0,
            updated_at: now,
        }
    }

    /// Rebuilds a cart loaded from storage. The total is recomputed, not trusted.
    pub fn restore(
        account_id: Uuid,
        items: Vec<LineItem>,
        version: i64,
        updated_at: DateTime<Utc>,
    ) -> Result<Self, AmountOutOfRange> {
        let total_amount = total_of(&items)?;
        Ok(Self {
            account_id,
            items,
            total_amount,
            version,
            updated_at,
        })
    }

    pub fn account_id(&self) -> Uuid {
        self.account_id
    }

    pub fn items(&self) -> &[LineItem] {
        &self.items
    }

    pub fn total_amount(&self) -> Decimal {
        self.total_amount
    }

    pub fn version(&self) -> i64 {
        self.version
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn line_for_product(&self, product_id: Uuid) -> Option<&LineItem> {
        self.items.iter().find(|item| item.product_id == product_id)
    }

    /// Merges into the existing line for the product, or appends `line`.
    /// Returns the id of the line that now holds the quantity.
    pub fn add_line(
        &mut self,
        line: LineItem,
        now: DateTime<Utc>,
    ) -> Result<Uuid, AmountOutOfRange> {
        let mut items = self.items.clone();
        let line_id = match items
            .iter_mut()
            .find(|item| item.product_id == line.product_id)
        {
            Some(existing) => {
                existing.quantity = existing.quantity.saturating_add(line.quantity);
                existing.id
            }
            None => {
                let id = line.id;
                items.push(line);
                id
            }
        };
        self.commit(items, now)?;
        Ok(line_id)
    }

    /// Replaces a line's quantity. Returns false if the line does not exist.
    pub fn set_quantity(
        &mut self,
        line_id: Uuid,
        quantity: u32,
        now: DateTime<Utc>,
    ) -> Result<bool, AmountOutOfRange> {
        let mut items = self.items.clone();
        match items.iter_mut().find(|item| item.id == line_id) {
            Some(item) => item.quantity = quantity,
            None => return Ok(false),
        }
        self.commit(items, now)?;
        Ok(true)
    }

    /// Drops a line. Returns false if nothing was removed.
    pub fn remove_line(
        &mut self,
        line_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<bool, AmountOutOfRange> {
        if !self.items.iter().any(|item| item.id == line_id) {
            return Ok(false);
        }
        let items = self
            .items
            .iter()
            .filter(|item| item.id != line_id)
            .cloned()
            .collect();
        self.commit(items, now)?;
        Ok(true)
    }

    /// Empties the cart, keeping its version for the next compare-and-swap.
    pub fn clear(&mut self, now: DateTime<Utc>) {
        self.items.clear();
        self.total_amount = Decimal::ZERO;
        self.updated_at = now;
    }

    /// Sum of `effective_price * quantity` over every line.
    pub fn computed_total(&self) -> Result<Decimal, AmountOutOfRange> {
        total_of(&self.items)
    }

    /// Used by storage adapters after a successful compare-and-swap.
    pub fn with_version(mut self, version: i64) -> Self {
        self.version = version;
        self
    }

    fn commit(&mut self, items: Vec<LineItem>, now: DateTime<Utc>) -> Result<(), AmountOutOfRange> {
        self.total_amount = total_of(&items)?;
        self.items = items;
        self.updated_at = now;
        Ok(())
    }
}

//=========================================================================================
// Orders
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OrderStatus {
    #[default]
    Processing,
    Shipped,
    Delivered,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Processing => "processing",
            OrderStatus::Shipped => "shipped",
            OrderStatus::Delivered => "delivered",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "processing" => Some(OrderStatus::Processing),
            "shipped" => Some(OrderStatus::Shipped),
            "delivered" => Some(OrderStatus::Delivered),
            _ => None,
        }
    }
}

/// Where an order ships to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShippingInfo {
    pub address: String,
    pub city: String,
    pub postal_code: String,
    pub country: String,
    pub phone: Option<String>,
}

/// A placed order. Its lines and total are a snapshot of the cart at checkout.
#[derive(Debug, Clone, PartialEq)]
pub struct Order {
    pub id: Uuid,
    pub account_id: Uuid,
    pub items: Vec<LineItem>,
    pub total_amount: Decimal,
    pub shipping: ShippingInfo,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
    pub delivered_at: Option<DateTime<Utc>>,
}

impl Order {
    /// Snapshots `cart` into a new order in the `Processing` state.
    pub fn from_cart(cart: &Cart, shipping: ShippingInfo, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            account_id: cart.account_id(),
            items: cart.items().to_vec(),
            total_amount: cart.total_amount(),
            shipping,
            status: OrderStatus::Processing,
            created_at: now,
            delivered_at: None,
        }
    }
}
