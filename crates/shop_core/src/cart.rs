//! crates/shop_core/src/cart.rs
//!
//! Per-account carts with a total that is recomputed on every mutation.
//!
//! Writes go through an optimistic compare-and-swap on the cart version: a
//! mutation re-reads and re-applies itself when another writer saved first, so
//! concurrent adds for the same account are never silently dropped.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::domain::{is_valid_price, Cart, LineItem, SelectedVariant};
use crate::error::{CoreError, CoreResult};
use crate::ports::{Clock, DatabaseService, PortError};

/// How many times a mutation is re-applied after losing a version race.
pub const MAX_CART_ATTEMPTS: usize = 5;

/// Which quantity is compared against product stock when adding to a cart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CartStockPolicy {
    /// Only the quantity in the current request.
    #[default]
    Requested,
    /// The line's quantity after merging the request into it.
    Cumulative,
}

impl CartStockPolicy {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "requested" => Some(Self::Requested),
            "cumulative" => Some(Self::Cumulative),
            _ => None,
        }
    }
}

/// A request to put some quantity of a product into a cart.
#[derive(Debug, Clone)]
pub struct AddItem {
    pub product_id: Uuid,
    pub quantity: u32,
    pub selected_variant: Option<SelectedVariant>,
}

#[derive(Clone)]
pub struct CartService {
    pub db: Arc<dyn DatabaseService>,
    pub clock: Arc<dyn Clock>,
    pub stock_policy: CartStockPolicy,
}

impl CartService {
    /// Returns the account's cart, creating and persisting an empty one on first access.
    pub async fn get_or_create_cart(&self, account_id: Uuid) -> CoreResult<Cart> {
        if let Some(cart) = self.db.find_cart_by_account(account_id).await? {
            return Ok(cart);
        }

        let cart = Cart::empty(account_id, self.clock.now());
        match self.db.save_cart(&cart).await {
            Ok(saved) => {
                debug!(account_id = %account_id, "Created cart");
                Ok(saved)
            }
            // Lost the creation race; whoever won has the cart now.
            Err(PortError::Conflict(_)) => self
                .db
                .find_cart_by_account(account_id)
                .await?
                .ok_or_else(|| {
                    CoreError::Port(PortError::NotFound(format!(
                        "Cart for account {account_id} not found"
                    )))
                }),
            Err(e) => Err(e.into()),
        }
    }

    /// Adds a product to the cart, merging into an existing line for the same product.
    ///
    /// The unit price is fixed now: the variant's price if it has one, else the
    /// product's current price.
    pub async fn add_item(&self, account_id: Uuid, request: AddItem) -> CoreResult<Cart> {
        if request.quantity < 1 {
            return Err(CoreError::InvalidQuantity);
        }
        if let Some(price) = request.selected_variant.as_ref().and_then(|v| v.price) {
            if !is_valid_price(price) {
                return Err(CoreError::Validation(
                    "Variant price must be between 0 and 9999999999.99".to_string(),
                ));
            }
        }

        let product = self
            .db
            .get_product_by_id(request.product_id)
            .await?
            .filter(|product| product.is_active)
            .ok_or(CoreError::ProductNotFound)?;

        let unit_price = request
            .selected_variant
            .as_ref()
            .and_then(|v| v.price)
            .unwrap_or(product.price);
        let policy = self.stock_policy;

        let cart = self
            .mutate(account_id, |cart, now| {
                let already = cart
                    .line_for_product(product.id)
                    .map_or(0, |line| line.quantity);
                let needed = match policy {
                    CartStockPolicy::Requested => request.quantity,
                    CartStockPolicy::Cumulative => already.saturating_add(request.quantity),
                };
                if i64::from(product.stock) < i64::from(needed) {
                    return Err(CoreError::InsufficientStock {
                        requested: needed,
                        available: product.stock,
                    });
                }

                cart.add_line(
                    LineItem {
                        id: Uuid::new_v4(),
                        product_id: product.id,
                        product_name: Some(product.name.clone()),
                        quantity: request.quantity,
                        unit_price,
                        selected_variant: request.selected_variant.clone(),
                    },
                    now,
                )?;
                Ok(true)
            })
            .await?;

        info!(
            account_id = %account_id,
            product_id = %product.id,
            quantity = request.quantity,
            total = %cart.total_amount(),
            "Added item to cart"
        );
        Ok(cart)
    }

    /// Replaces a line's quantity. Zero is rejected rather than treated as removal.
    pub async fn set_quantity(
        &self,
        account_id: Uuid,
        line_id: Uuid,
        quantity: u32,
    ) -> CoreResult<Cart> {
        if quantity < 1 {
            return Err(CoreError::InvalidQuantity);
        }

        self.mutate(account_id, |cart, now| {
            if cart.set_quantity(line_id, quantity, now)? {
                Ok(true)
            } else {
                Err(CoreError::LineItemNotFound(line_id))
            }
        })
        .await
    }

    /// Deletes a line. Removing a line that is not there returns the cart unchanged.
    pub async fn remove_item(&self, account_id: Uuid, line_id: Uuid) -> CoreResult<Cart> {
        self.mutate(account_id, |cart, now| Ok(cart.remove_line(line_id, now)?))
            .await
    }

    /// Read-apply-save loop. `apply` returns whether it changed the cart;
    /// unchanged carts are returned without a write.
    async fn mutate<F>(&self, account_id: Uuid, mut apply: F) -> CoreResult<Cart>
    where
        F: FnMut(&mut Cart, DateTime<Utc>) -> CoreResult<bool> + Send,
    {
        for attempt in 1..=MAX_CART_ATTEMPTS {
            let mut cart = self.get_or_create_cart(account_id).await?;
            if !apply(&mut cart, self.clock.now())? {
                return Ok(cart);
            }

            match self.db.save_cart(&cart).await {
                Ok(saved) => return Ok(saved),
                Err(PortError::Conflict(reason)) => {
                    debug!(account_id = %account_id, attempt, reason = %reason, "Cart version conflict");
                }
                Err(e) => return Err(e.into()),
            }
        }

        warn!(account_id = %account_id, "Giving up on contended cart");
        Err(CoreError::CartContention)
    }
}
