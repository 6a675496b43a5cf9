//! crates/shop_core/src/orders.rs
//!
//! Checkout and order tracking.
//!
//! Placing an order snapshots the cart, takes the quantities out of stock and
//! empties the cart in one storage call. Like cart writes, it re-reads and
//! retries when the cart version moved underneath it.

use std::sync::Arc;

use rust_decimal::Decimal;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::cart::MAX_CART_ATTEMPTS;
use crate::domain::{AmountOutOfRange, Order, OrderStatus, Role, ShippingInfo};
use crate::error::{CoreError, CoreResult};
use crate::ports::{Clock, DatabaseService, PortError};

#[derive(Clone)]
pub struct OrderService {
    pub db: Arc<dyn DatabaseService>,
    pub clock: Arc<dyn Clock>,
}

impl OrderService {
    /// Turns the account's cart into an order and leaves the cart empty.
    pub async fn place_order(&self, account_id: Uuid, shipping: ShippingInfo) -> CoreResult<Order> {
        let shipping = validate_shipping(shipping)?;

        for attempt in 1..=MAX_CART_ATTEMPTS {
            let cart = match self.db.find_cart_by_account(account_id).await? {
                Some(cart) if !cart.is_empty() => cart,
                _ => return Err(CoreError::EmptyCart),
            };

            for item in cart.items() {
                let product = self
                    .db
                    .get_product_by_id(item.product_id)
                    .await?
                    .filter(|product| product.is_active)
                    .ok_or(CoreError::ProductNotFound)?;
                if i64::from(product.stock) < i64::from(item.quantity) {
                    return Err(CoreError::InsufficientStock {
                        requested: item.quantity,
                        available: product.stock,
                    });
                }
            }

            let now = self.clock.now();
            let order = Order::from_cart(&cart, shipping.clone(), now);
            let mut emptied = cart;
            emptied.clear(now);

            match self.db.place_order(&order, &emptied).await {
                Ok(order) => {
                    info!(
                        account_id = %account_id,
                        order_id = %order.id,
                        total = %order.total_amount,
                        "Placed order"
                    );
                    return Ok(order);
                }
                Err(PortError::Conflict(reason)) => {
                    debug!(account_id = %account_id, attempt, reason = %reason, "Order placement conflict");
                }
                Err(e) => return Err(e.into()),
            }
        }

        warn!(account_id = %account_id, "Giving up on contended checkout");
        Err(CoreError::CartContention)
    }

    pub async fn my_orders(&self, account_id: Uuid) -> CoreResult<Vec<Order>> {
        Ok(self.db.list_orders_for_account(account_id).await?)
    }

    /// Owners and admins can read an order. Anyone else gets `OrderNotFound`.
    pub async fn get_order(&self, account_id: Uuid, role: Role, order_id: Uuid) -> CoreResult<Order> {
        self.db
            .get_order(order_id)
            .await?
            .filter(|order| role == Role::Admin || order.account_id == account_id)
            .ok_or(CoreError::OrderNotFound)
    }

    /// Every order with the sum of their totals.
    pub async fn list_orders(&self) -> CoreResult<(Vec<Order>, Decimal)> {
        let orders = self.db.list_orders().await?;
        let revenue = orders
            .iter()
            .try_fold(Decimal::ZERO, |acc, order| acc.checked_add(order.total_amount))
            .ok_or(AmountOutOfRange)?;
        Ok((orders, revenue))
    }

    /// Moves an order to `status`. Delivered orders are final.
    pub async fn update_status(&self, order_id: Uuid, status: OrderStatus) -> CoreResult<Order> {
        let order = self
            .db
            .get_order(order_id)
            .await?
            .ok_or(CoreError::OrderNotFound)?;
        if order.status == OrderStatus::Delivered {
            return Err(CoreError::OrderAlreadyDelivered);
        }

        let delivered_at = (status == OrderStatus::Delivered).then(|| self.clock.now());
        let order = match self
            .db
            .update_order_status(order_id, status, delivered_at)
            .await
        {
            Ok(order) => order,
            Err(PortError::NotFound(_)) => return Err(CoreError::OrderNotFound),
            Err(e) => return Err(e.into()),
        };
        info!(order_id = %order.id, status = order.status.as_str(), "Updated order status");
        Ok(order)
    }
}

fn validate_shipping(shipping: ShippingInfo) -> CoreResult<ShippingInfo> {
    let shipping = ShippingInfo {
        address: shipping.address.trim().to_string(),
        city: shipping.city.trim().to_string(),
        postal_code: shipping.postal_code.trim().to_string(),
        country: shipping.country.trim().to_string(),
        phone: shipping
            .phone
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty()),
    };
    if shipping.address.is_empty()
        || shipping.city.is_empty()
        || shipping.postal_code.is_empty()
        || shipping.country.is_empty()
    {
        return Err(CoreError::Validation(
            "Please provide address, city, postal code and country".to_string(),
        ));
    }
    Ok(shipping)
}
