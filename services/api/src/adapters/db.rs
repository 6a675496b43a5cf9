//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete implementation
//! of the `DatabaseService` port from the `core` crate. It handles all interactions
//! with the PostgreSQL database using `sqlx`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shop_core::domain::{
    Account, AccountCredentials, Cart, LineItem, NewAccount, NewProduct, Order, OrderStatus,
    Product, ProductChanges, ProductPage, ProductQuery, Role, SelectedVariant, ShippingInfo,
};
use shop_core::ports::{DatabaseService, PortError, PortResult};
use sqlx::{types::Json, FromRow, PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the `DatabaseService` port.
#[derive(Clone)]
pub struct DbAdapter {
    pool: PgPool,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }
}

fn unexpected(e: sqlx::Error) -> PortError {
    PortError::Unexpected(e.to_string())
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

const ACCOUNT_COLUMNS: &str = "id, name, email, password_hash, role, is_verified, created_at";
const PRODUCT_COLUMNS: &str = "id, name, description, category, price, stock, is_active, created_at";
const CART_COLUMNS: &str = "account_id, items, version, updated_at";
const ORDER_COLUMNS: &str =
    "id, account_id, items, shipping, total_amount, status, created_at, delivered_at";

#[derive(FromRow)]
struct AccountRecord {
    id: Uuid,
    name: String,
    email: String,
    password_hash: String,
    role: String,
    is_verified: bool,
    created_at: DateTime<Utc>,
}
impl AccountRecord {
    fn to_domain(self) -> PortResult<AccountCredentials> {
        let role = Role::parse(&self.role).ok_or_else(|| {
            PortError::Unexpected(format!("Account {} has unknown role '{}'", self.id, self.role))
        })?;
        Ok(AccountCredentials {
            account: Account {
                id: self.id,
                name: self.name,
                email: self.email,
                role,
                is_verified: self.is_verified,
                created_at: self.created_at,
            },
            password_hash: self.password_hash,
        })
    }
}

#[derive(FromRow)]
struct ProductRecord {
    id: Uuid,
    name: String,
    description: String,
    category: String,
    price: Decimal,
    stock: i32,
    is_active: bool,
    created_at: DateTime<Utc>,
}
impl ProductRecord {
    fn to_domain(self) -> Product {
        Product {
            id: self.id,
            name: self.name,
            description: self.description,
            category: self.category,
            price: self.price,
            stock: self.stock,
            is_active: self.is_active,
            created_at: self.created_at,
        }
    }
}

/// Line items are stored as a JSONB array on the cart row.
#[derive(Serialize, Deserialize)]
struct LineItemRecord {
    id: Uuid,
    product_id: Uuid,
    #[serde(default)]
    product_name: Option<String>,
    quantity: u32,
    unit_price: Decimal,
    #[serde(default)]
    selected_variant: Option<VariantRecord>,
}

#[derive(Serialize, Deserialize)]
struct VariantRecord {
    name: String,
    value: String,
    price: Option<Decimal>,
}

impl LineItemRecord {
    fn from_domain(item: &LineItem) -> Self {
        Self {
            id: item.id,
            product_id: item.product_id,
            product_name: item.product_name.clone(),
            quantity: item.quantity,
            unit_price: item.unit_price,
            selected_variant: item.selected_variant.as_ref().map(|v| VariantRecord {
                name: v.name.clone(),
                value: v.value.clone(),
                price: v.price,
            }),
        }
    }

    fn to_domain(self) -> LineItem {
        LineItem {
            id: self.id,
            product_id: self.product_id,
            product_name: self.product_name,
            quantity: self.quantity,
            unit_price: self.unit_price,
            selected_variant: self.selected_variant.map(|v| SelectedVariant {
                name: v.name,
                value: v.value,
                price: v.price,
            }),
        }
    }
}

#[derive(FromRow)]
struct CartRecord {
    account_id: Uuid,
    items: Json<Vec<LineItemRecord>>,
    version: i64,
    updated_at: DateTime<Utc>,
}
impl CartRecord {
    fn to_domain(self) -> PortResult<Cart> {
        let items = self.items.0.into_iter().map(LineItemRecord::to_domain).collect();
        Cart::restore(self.account_id, items, self.version, self.updated_at).map_err(|e| {
            PortError::Unexpected(format!("Cart for account {}: {e}", self.account_id))
        })
    }
}

#[derive(Serialize, Deserialize)]
struct ShippingRecord {
    address: String,
    city: String,
    postal_code: String,
    country: String,
    #[serde(default)]
    phone: Option<String>,
}

impl ShippingRecord {
    fn from_domain(shipping: &ShippingInfo) -> Self {
        Self {
            address: shipping.address.clone(),
            city: shipping.city.clone(),
            postal_code: shipping.postal_code.clone(),
            country: shipping.country.clone(),
            phone: shipping.phone.clone(),
        }
    }

    fn to_domain(self) -> ShippingInfo {
        ShippingInfo {
            address: self.address,
            city: self.city,
            postal_code: self.postal_code,
            country: self.country,
            phone: self.phone,
        }
    }
}

#[derive(FromRow)]
struct OrderRecord {
    id: Uuid,
    account_id: Uuid,
    items: Json<Vec<LineItemRecord>>,
    shipping: Json<ShippingRecord>,
    total_amount: Decimal,
    status: String,
    created_at: DateTime<Utc>,
    delivered_at: Option<DateTime<Utc>>,
}
impl OrderRecord {
    fn to_domain(self) -> PortResult<Order> {
        let status = OrderStatus::parse(&self.status).ok_or_else(|| {
            PortError::Unexpected(format!("Order {} has unknown status '{}'", self.id, self.status))
        })?;
        Ok(Order {
            id: self.id,
            account_id: self.account_id,
            items: self.items.0.into_iter().map(LineItemRecord::to_domain).collect(),
            total_amount: self.total_amount,
            shipping: self.shipping.0.to_domain(),
            status,
            created_at: self.created_at,
            delivered_at: self.delivered_at,
        })
    }
}

fn line_item_records(items: &[LineItem]) -> Json<Vec<LineItemRecord>> {
    Json(items.iter().map(LineItemRecord::from_domain).collect())
}

fn push_product_filters(builder: &mut QueryBuilder<'_, Postgres>, query: &ProductQuery) {
    builder.push(" WHERE is_active = TRUE");
    if let Some(keyword) = &query.keyword {
        let pattern = format!("%{}%", escape_like(keyword));
        builder
            .push(" AND (name ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR description ILIKE ")
            .push_bind(pattern)
            .push(")");
    }
    if let Some(category) = &query.category {
        builder.push(" AND category = ").push_bind(category.clone());
    }
    if let Some(min) = query.min_price {
        builder.push(" AND price >= ").push_bind(min);
    }
    if let Some(max) = query.max_price {
        builder.push(" AND price <= ").push_bind(max);
    }
}

fn escape_like(input: &str) -> String {
    input
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

//=========================================================================================
// `DatabaseService` Trait Implementation
//=========================================================================================

#[async_trait]
impl DatabaseService for DbAdapter {
    async fn create_account(&self, account: NewAccount) -> PortResult<Account> {
        let sql = format!(
            "INSERT INTO accounts (id, name, email, password_hash, role, is_verified) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING {ACCOUNT_COLUMNS}"
        );
        let record = sqlx::query_as::<_, AccountRecord>(&sql)
            .bind(Uuid::new_v4())
            .bind(&account.name)
            .bind(&account.email)
            .bind(&account.password_hash)
            .bind(account.role.as_str())
            .bind(account.is_verified)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| match e {
                sqlx::Error::Database(db) if db.is_unique_violation() => {
                    PortError::Conflict(format!("Email {} already registered", account.email))
                }
                e => unexpected(e),
            })?;
        Ok(record.to_domain()?.account)
    }

    async fn find_account_by_email(&self, email: &str) -> PortResult<Option<AccountCredentials>> {
        let sql = format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE email = $1");
        sqlx::query_as::<_, AccountRecord>(&sql)
            .bind(email)
            .fetch_optional(&self.pool)
            .await
            .map_err(unexpected)?
            .map(AccountRecord::to_domain)
            .transpose()
    }

    async fn get_account_by_id(&self, account_id: Uuid) -> PortResult<Account> {
        Ok(self.get_credentials_by_id(account_id).await?.account)
    }

    async fn get_credentials_by_id(&self, account_id: Uuid) -> PortResult<AccountCredentials> {
        let sql = format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE id = $1");
        let record = sqlx::query_as::<_, AccountRecord>(&sql)
            .bind(account_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| match e {
                sqlx::Error::RowNotFound => {
                    PortError::NotFound(format!("Account {} not found", account_id))
                }
                _ => unexpected(e),
            })?;
        record.to_domain()
    }

    async fn update_account_name(&self, account_id: Uuid, name: &str) -> PortResult<Account> {
        let sql = format!("UPDATE accounts SET name = $1 WHERE id = $2 RETURNING {ACCOUNT_COLUMNS}");
        let record = sqlx::query_as::<_, AccountRecord>(&sql)
            .bind(name)
            .bind(account_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(unexpected)?
            .ok_or_else(|| PortError::NotFound(format!("Account {} not found", account_id)))?;
        Ok(record.to_domain()?.account)
    }

    async fn update_password_hash(&self, account_id: Uuid, password_hash: &str) -> PortResult<()> {
        let result = sqlx::query("UPDATE accounts SET password_hash = $1 WHERE id = $2")
            .bind(password_hash)
            .bind(account_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!("Account {} not found", account_id)));
        }
        Ok(())
    }

    async fn get_product_by_id(&self, product_id: Uuid) -> PortResult<Option<Product>> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1");
        let record = sqlx::query_as::<_, ProductRecord>(&sql)
            .bind(product_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(record.map(ProductRecord::to_domain))
    }

    async fn list_products(&self, query: &ProductQuery) -> PortResult<ProductPage> {
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM products");
        push_product_filters(&mut count, query);
        let total: i64 = count
            .build_query_scalar::<i64>()
            .fetch_one(&self.pool)
            .await
            .map_err(unexpected)?;

        let mut select = QueryBuilder::<Postgres>::new(format!("SELECT {PRODUCT_COLUMNS} FROM products"));
        push_product_filters(&mut select, query);
        select
            .push(" ORDER BY created_at DESC LIMIT ")
            .push_bind(i64::from(query.limit))
            .push(" OFFSET ")
            .push_bind(i64::try_from(query.offset()).unwrap_or(i64::MAX));
        let records = select
            .build_query_as::<ProductRecord>()
            .fetch_all(&self.pool)
            .await
            .map_err(unexpected)?;

        Ok(ProductPage {
            products: records.into_iter().map(ProductRecord::to_domain).collect(),
            total: u64::try_from(total).unwrap_or_default(),
            page: query.page,
            limit: query.limit,
        })
    }

    async fn create_product(&self, product: NewProduct) -> PortResult<Product> {
        let sql = format!(
            "INSERT INTO products (id, name, description, category, price, stock) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING {PRODUCT_COLUMNS}"
        );
        let record = sqlx::query_as::<_, ProductRecord>(&sql)
            .bind(Uuid::new_v4())
            .bind(&product.name)
            .bind(&product.description)
            .bind(&product.category)
            .bind(product.price)
            .bind(product.stock)
            .fetch_one(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(record.to_domain())
    }

    async fn update_product(
        &self,
        product_id: Uuid,
        changes: &ProductChanges,
    ) -> PortResult<Product> {
        let sql = format!(
            "UPDATE products SET name = COALESCE($2, name), description = COALESCE($3, description), \
             category = COALESCE($4, category), price = COALESCE($5, price), \
             stock = COALESCE($6, stock), is_active = COALESCE($7, is_active) \
             WHERE id = $1 RETURNING {PRODUCT_COLUMNS}"
        );
        let record = sqlx::query_as::<_, ProductRecord>(&sql)
            .bind(product_id)
            .bind(changes.name.as_deref())
            .bind(changes.description.as_deref())
            .bind(changes.category.as_deref())
            .bind(changes.price)
            .bind(changes.stock)
            .bind(changes.is_active)
            .fetch_optional(&self.pool)
            .await
            .map_err(unexpected)?
            .ok_or_else(|| PortError::NotFound(format!("Product {} not found", product_id)))?;
        Ok(record.to_domain())
    }

    async fn find_cart_by_account(&self, account_id: Uuid) -> PortResult<Option<Cart>> {
        let sql = format!("SELECT {CART_COLUMNS} FROM carts WHERE account_id = $1");
        let record = sqlx::query_as::<_, CartRecord>(&sql)
            .bind(account_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(unexpected)?;
        record.map(CartRecord::to_domain).transpose()
    }

    async fn save_cart(&self, cart: &Cart) -> PortResult<Cart> {
        let items = line_item_records(cart.items());

        let record = if cart.version() == 0 {
            let sql = format!(
                "INSERT INTO carts (account_id, items, total_amount, version, updated_at) \
                 VALUES ($1, $2, $3, 1, $4) ON CONFLICT (account_id) DO NOTHING \
                 RETURNING {CART_COLUMNS}"
            );
            sqlx::query_as::<_, CartRecord>(&sql)
                .bind(cart.account_id())
                .bind(items)
                .bind(cart.total_amount())
                .bind(cart.updated_at())
                .fetch_optional(&self.pool)
                .await
        } else {
            let sql = format!(
                "UPDATE carts SET items = $2, total_amount = $3, updated_at = $4, version = version + 1 \
                 WHERE account_id = $1 AND version = $5 RETURNING {CART_COLUMNS}"
            );
            sqlx::query_as::<_, CartRecord>(&sql)
                .bind(cart.account_id())
                .bind(items)
                .bind(cart.total_amount())
                .bind(cart.updated_at())
                .bind(cart.version())
                .fetch_optional(&self.pool)
                .await
        }
        .map_err(unexpected)?;

        record
            .ok_or_else(|| {
                PortError::Conflict(format!(
                    "Cart for account {} changed since version {}",
                    cart.account_id(),
                    cart.version()
                ))
            })?
            .to_domain()
    }

    async fn place_order(&self, order: &Order, emptied_cart: &Cart) -> PortResult<Order> {
        // Dropping `tx` on an early return rolls everything back.
        let mut tx = self.pool.begin().await.map_err(unexpected)?;

        let cart = sqlx::query(
            "UPDATE carts SET items = $3, total_amount = $4, updated_at = $5, version = version + 1 \
             WHERE account_id = $1 AND version = $2",
        )
        .bind(emptied_cart.account_id())
        .bind(emptied_cart.version())
        .bind(line_item_records(emptied_cart.items()))
        .bind(emptied_cart.total_amount())
        .bind(emptied_cart.updated_at())
        .execute(&mut *tx)
        .await
        .map_err(unexpected)?;
        if cart.rows_affected() == 0 {
            return Err(PortError::Conflict(format!(
                "Cart for account {} changed since version {}",
                emptied_cart.account_id(),
                emptied_cart.version()
            )));
        }

        for item in &order.items {
            let quantity = i32::try_from(item.quantity).map_err(|_| {
                PortError::Conflict(format!("Quantity {} exceeds any stock", item.quantity))
            })?;
            let stock = sqlx::query(
                "UPDATE products SET stock = stock - $2 \
                 WHERE id = $1 AND is_active = TRUE AND stock >= $2",
            )
            .bind(item.product_id)
            .bind(quantity)
            .execute(&mut *tx)
            .await
            .map_err(unexpected)?;
            if stock.rows_affected() == 0 {
                return Err(PortError::Conflict(format!(
                    "Product {} no longer has the stock",
                    item.product_id
                )));
            }
        }

        let sql = format!(
            "INSERT INTO orders (id, account_id, items, shipping, total_amount, status, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING {ORDER_COLUMNS}"
        );
        let record = sqlx::query_as::<_, OrderRecord>(&sql)
            .bind(order.id)
            .bind(order.account_id)
            .bind(line_item_records(&order.items))
            .bind(Json(ShippingRecord::from_domain(&order.shipping)))
            .bind(order.total_amount)
            .bind(order.status.as_str())
            .bind(order.created_at)
            .fetch_one(&mut *tx)
            .await
            .map_err(unexpected)?;

        tx.commit().await.map_err(unexpected)?;
        record.to_domain()
    }

    async fn list_orders_for_account(&self, account_id: Uuid) -> PortResult<Vec<Order>> {
        let sql = format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE account_id = $1 ORDER BY created_at DESC"
        );
        sqlx::query_as::<_, OrderRecord>(&sql)
            .bind(account_id)
            .fetch_all(&self.pool)
            .await
            .map_err(unexpected)?
            .into_iter()
            .map(OrderRecord::to_domain)
            .collect()
    }

    async fn list_orders(&self) -> PortResult<Vec<Order>> {
        let sql = format!("SELECT {ORDER_COLUMNS} FROM orders ORDER BY created_at DESC");
        sqlx::query_as::<_, OrderRecord>(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(unexpected)?
            .into_iter()
            .map(OrderRecord::to_domain)
            .collect()
    }

    async fn get_order(&self, order_id: Uuid) -> PortResult<Option<Order>> {
        let sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1");
        sqlx::query_as::<_, OrderRecord>(&sql)
            .bind(order_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(unexpected)?
            .map(OrderRecord::to_domain)
            .transpose()
    }

    async fn update_order_status(
        &self,
        order_id: Uuid,
        status: OrderStatus,
        delivered_at: Option<DateTime<Utc>>,
    ) -> PortResult<Order> {
        let sql = format!(
            "UPDATE orders SET status = $2, delivered_at = $3 WHERE id = $1 RETURNING {ORDER_COLUMNS}"
        );
        sqlx::query_as::<_, OrderRecord>(&sql)
            .bind(order_id)
            .bind(status.as_str())
            .bind(delivered_at)
            .fetch_optional(&self.pool)
            .await
            .map_err(unexpected)?
            .ok_or_else(|| PortError::NotFound(format!("Order {} not found", order_id)))?
            .to_domain()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn like_patterns_are_escaped() {
        assert_eq!(escape_like("50%_off\\"), "50\\%\\_off\\\\");
    }

    #[test]
    fn line_items_survive_the_jsonb_shape() {
        let item = LineItem {
            id: Uuid::new_v4(),
            product_id: Uuid::new_v4(),
            product_name: Some("Widget".into()),
            quantity: 3,
            unit_price: Decimal::new(999, 2),
            selected_variant: Some(SelectedVariant {
                name: "color".into(),
                value: "red".into(),
                price: None,
            }),
        };
        let json = serde_json::to_value(LineItemRecord::from_domain(&item)).unwrap();
        let back: LineItemRecord = serde_json::from_value(json).unwrap();
        assert_eq!(back.to_domain(), item);
    }

    #[test]
    fn legacy_line_items_without_optional_fields_load() {
        let json = serde_json::json!({
            "id": Uuid::nil(),
            "product_id": Uuid::nil(),
            "quantity": 1,
            "unit_price": "4.50"
        });
        let record: LineItemRecord = serde_json::from_value(json).unwrap();
        let item = record.to_domain();
        assert!(item.product_name.is_none());
        assert_eq!(item.subtotal(), Some(Decimal::new(450, 2)));
    }

    #[test]
    fn shipping_without_phone_loads() {
        let json = serde_json::json!({
            "address": "1 Main St",
            "city": "Springfield",
            "postal_code": "12345",
            "country": "US"
        });
        let record: ShippingRecord = serde_json::from_value(json).unwrap();
        let shipping = record.to_domain();
        assert_eq!(shipping.city, "Springfield");
        assert!(shipping.phone.is_none());
    }
}
