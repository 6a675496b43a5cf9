//! crates/shop_core/src/memory.rs
//!
//! In-process implementations of every port, for tests and local experiments.
//! Compiled for this crate's tests and for dependents that enable `test-support`.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::domain::{
    Account, AccountCredentials, Cart, NewAccount, NewProduct, Order, OrderStatus,
    PendingRegistration, Product, ProductChanges, ProductPage, ProductQuery, Role, SessionClaims,
};
use crate::ports::{
    Clock, CredentialHasher, DatabaseService, MailService, OtpGenerator, OutgoingMail,
    PendingRegistrationStore, PortError, PortResult, TokenService,
};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

//=========================================================================================
// Database
//=========================================================================================

#[derive(Default)]
struct Tables {
    accounts: HashMap<Uuid, AccountCredentials>,
    products: HashMap<Uuid, Product>,
    carts: HashMap<Uuid, Cart>,
    orders: HashMap<Uuid, Order>,
}

impl Tables {
    fn next_cart_version(&self, cart: &Cart) -> PortResult<i64> {
        let stored = self.carts.get(&cart.account_id()).map(Cart::version);
        match (cart.version(), stored) {
            (0, None) => Ok(1),
            (version, Some(current)) if version != 0 && version == current => Ok(version + 1),
            (version, stored) => Err(PortError::Conflict(format!(
                "Cart version {version} is stale (stored {stored:?})"
            ))),
        }
    }
}

fn newest_first(mut orders: Vec<Order>) -> Vec<Order> {
    orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    orders
}

/// A `DatabaseService` backed by hash maps, with the same uniqueness and
/// version semantics as the PostgreSQL adapter.
#[derive(Default)]
pub struct InMemoryDatabase {
    tables: Mutex<Tables>,
    forced_cart_conflicts: AtomicUsize,
}

impl InMemoryDatabase {
    /// Makes the next `n` cart saves fail as if another writer won the race.
    pub fn fail_next_cart_saves(&self, n: usize) {
        self.forced_cart_conflicts.store(n, Ordering::SeqCst);
    }

    pub fn set_product_price(&self, product_id: Uuid, price: Decimal) {
        if let Some(product) = lock(&self.tables).products.get_mut(&product_id) {
            product.price = price;
        }
    }

    pub fn set_product_stock(&self, product_id: Uuid, stock: i32) {
        if let Some(product) = lock(&self.tables).products.get_mut(&product_id) {
            product.stock = stock;
        }
    }

    pub fn set_role(&self, account_id: Uuid, role: Role) {
        if let Some(credentials) = lock(&self.tables).accounts.get_mut(&account_id) {
            credentials.account.role = role;
        }
    }

    fn take_forced_conflict(&self) -> bool {
        self.forced_cart_conflicts
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl DatabaseService for InMemoryDatabase {
    async fn create_account(&self, account: NewAccount) -> PortResult<Account> {
        let mut tables = lock(&self.tables);
        if tables
            .accounts
            .values()
            .any(|c| c.account.email == account.email)
        {
            return Err(PortError::Conflict(format!(
                "Email {} already registered",
                account.email
            )));
        }

        let created = Account {
            id: Uuid::new_v4(),
            name: account.name,
            email: account.email,
            role: account.role,
            is_verified: account.is_verified,
            created_at: Utc::now(),
        };
        tables.accounts.insert(
            created.id,
            AccountCredentials {
                account: created.clone(),
                password_hash: account.password_hash,
            },
        );
        Ok(created)
    }

    async fn find_account_by_email(&self, email: &str) -> PortResult<Option<AccountCredentials>> {
        Ok(lock(&self.tables)
            .accounts
            .values()
            .find(|c| c.account.email == email)
            .cloned())
    }

    async fn get_account_by_id(&self, account_id: Uuid) -> PortResult<Account> {
        Ok(self.get_credentials_by_id(account_id).await?.account)
    }

    async fn get_credentials_by_id(&self, account_id: Uuid) -> PortResult<AccountCredentials> {
        lock(&self.tables)
            .accounts
            .get(&account_id)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("Account {account_id} not found")))
    }

    async fn update_account_name(&self, account_id: Uuid, name: &str) -> PortResult<Account> {
        let mut tables = lock(&self.tables);
        let credentials = tables
            .accounts
            .get_mut(&account_id)
            .ok_or_else(|| PortError::NotFound(format!("Account {account_id} not found")))?;
        credentials.account.name = name.to_string();
        Ok(credentials.account.clone())
    }

    async fn update_password_hash(&self, account_id: Uuid, password_hash: &str) -> PortResult<()> {
        let mut tables = lock(&self.tables);
        let credentials = tables
            .accounts
            .get_mut(&account_id)
            .ok_or_else(|| PortError::NotFound(format!("Account {account_id} not found")))?;
        credentials.password_hash = password_hash.to_string();
        Ok(())
    }

    async fn get_product_by_id(&self, product_id: Uuid) -> PortResult<Option<Product>> {
        Ok(lock(&self.tables).products.get(&product_id).cloned())
    }

    async fn list_products(&self, query: &ProductQuery) -> PortResult<ProductPage> {
        let keyword = query.keyword.as_ref().map(|k| k.to_lowercase());
        let mut matching: Vec<Product> = lock(&self.tables)
            .products
            .values()
            .filter(|p| p.is_active)
            .filter(|p| {
                keyword.as_ref().map_or(true, |k| {
                    p.name.to_lowercase().contains(k) || p.description.to_lowercase().contains(k)
                })
            })
            .filter(|p| query.category.as_ref().map_or(true, |c| &p.category == c))
            .filter(|p| query.min_price.map_or(true, |min| p.price >= min))
            .filter(|p| query.max_price.map_or(true, |max| p.price <= max))
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let total = matching.len() as u64;
        let products = matching
            .into_iter()
            .skip(usize::try_from(query.offset()).unwrap_or(usize::MAX))
            .take(query.limit as usize)
            .collect();

        Ok(ProductPage {
            products,
            total,
            page: query.page,
            limit: query.limit,
        })
    }

    async fn create_product(&self, product: NewProduct) -> PortResult<Product> {
        let created = Product {
            id: Uuid::new_v4(),
            name: product.name,
            description: product.description,
            category: product.category,
            price: product.price,
            stock: product.stock,
            is_active: true,
            created_at: Utc::now(),
        };
        lock(&self.tables)
            .products
            .insert(created.id, created.clone());
        Ok(created)
    }

    async fn update_product(
        &self,
        product_id: Uuid,
        changes: &ProductChanges,
    ) -> PortResult<Product> {
        let mut tables = lock(&self.tables);
        let product = tables
            .products
            .get_mut(&product_id)
            .ok_or_else(|| PortError::NotFound(format!("Product {product_id} not found")))?;
        if let Some(name) = &changes.name {
            product.name = name.clone();
        }
        if let Some(description) = &changes.description {
            product.description = description.clone();
        }
        if let Some(category) = &changes.category {
            product.category = category.clone();
        }
        if let Some(price) = changes.price {
            product.price = price;
        }
        if let Some(stock) = changes.stock {
            product.stock = stock;
        }
        if let Some(is_active) = changes.is_active {
            product.is_active = is_active;
        }
        Ok(product.clone())
    }

    async fn find_cart_by_account(&self, account_id: Uuid) -> PortResult<Option<Cart>> {
        Ok(lock(&self.tables).carts.get(&account_id).cloned())
    }

    async fn save_cart(&self, cart: &Cart) -> PortResult<Cart> {
        if self.take_forced_conflict() {
            return Err(PortError::Conflict("forced cart conflict".to_string()));
        }

        let mut tables = lock(&self.tables);
        let next_version = tables.next_cart_version(cart)?;

        let saved = cart.clone().with_version(next_version);
        tables.carts.insert(saved.account_id(), saved.clone());
        Ok(saved)
    }

    async fn place_order(&self, order: &Order, emptied_cart: &Cart) -> PortResult<Order> {
        if self.take_forced_conflict() {
            return Err(PortError::Conflict("forced cart conflict".to_string()));
        }

        let mut tables = lock(&self.tables);
        let next_version = tables.next_cart_version(emptied_cart)?;
        for item in &order.items {
            let available = tables
                .products
                .get(&item.product_id)
                .filter(|p| p.is_active)
                .map_or(0, |p| i64::from(p.stock));
            if available < i64::from(item.quantity) {
                return Err(PortError::Conflict(format!(
                    "Product {} no longer has the stock",
                    item.product_id
                )));
            }
        }

        for item in &order.items {
            if let Some(product) = tables.products.get_mut(&item.product_id) {
                product.stock -= i32::try_from(item.quantity).unwrap_or(i32::MAX);
            }
        }
        let saved = emptied_cart.clone().with_version(next_version);
        tables.carts.insert(saved.account_id(), saved);
        tables.orders.insert(order.id, order.clone());
        Ok(order.clone())
    }

    async fn list_orders_for_account(&self, account_id: Uuid) -> PortResult<Vec<Order>> {
        let orders = lock(&self.tables)
            .orders
            .values()
            .filter(|o| o.account_id == account_id)
            .cloned()
            .collect();
        Ok(newest_first(orders))
    }

    async fn list_orders(&self) -> PortResult<Vec<Order>> {
        let orders = lock(&self.tables).orders.values().cloned().collect();
        Ok(newest_first(orders))
    }

    async fn get_order(&self, order_id: Uuid) -> PortResult<Option<Order>> {
        Ok(lock(&self.tables).orders.get(&order_id).cloned())
    }

    async fn update_order_status(
        &self,
        order_id: Uuid,
        status: OrderStatus,
        delivered_at: Option<DateTime<Utc>>,
    ) -> PortResult<Order> {
        let mut tables = lock(&self.tables);
        let order = tables
            .orders
            .get_mut(&order_id)
            .ok_or_else(|| PortError::NotFound(format!("Order {order_id} not found")))?;
        order.status = status;
        order.delivered_at = delivered_at;
        Ok(order.clone())
    }
}

//=========================================================================================
// Pending registrations
//=========================================================================================

/// A pending store without eviction; expiry is left to the verifier's clock check.
#[derive(Default)]
pub struct InMemoryPendingStore {
    entries: Mutex<HashMap<String, PendingRegistration>>,
}

impl InMemoryPendingStore {
    pub fn len(&self) -> usize {
        lock(&self.entries).len()
    }

    pub fn is_empty(&self) -> bool {
        lock(&self.entries).is_empty()
    }
}

#[async_trait]
impl PendingRegistrationStore for InMemoryPendingStore {
    async fn get(&self, email: &str) -> PortResult<Option<PendingRegistration>> {
        Ok(lock(&self.entries).get(email).cloned())
    }

    async fn put(&self, pending: PendingRegistration) -> PortResult<()> {
        lock(&self.entries).insert(pending.email.clone(), pending);
        Ok(())
    }

    async fn remove(&self, email: &str) -> PortResult<Option<PendingRegistration>> {
        Ok(lock(&self.entries).remove(email))
    }
}

//=========================================================================================
// Mail, codes, clock, credentials
//=========================================================================================

/// Captures outgoing mail instead of sending it.
#[derive(Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<OutgoingMail>>,
    fail_next: AtomicBool,
}

impl RecordingMailer {
    pub fn sent(&self) -> Vec<OutgoingMail> {
        lock(&self.sent).clone()
    }

    /// The next send fails with a relay error and records nothing.
    pub fn fail_next(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl MailService for RecordingMailer {
    async fn send_mail(&self, mail: OutgoingMail) -> PortResult<()> {
        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(PortError::Unexpected("mail relay unavailable".to_string()));
        }
        lock(&self.sent).push(mail);
        Ok(())
    }
}

/// Hands out a fixed sequence of codes, then repeats the last one.
pub struct ScriptedOtpGenerator {
    codes: Mutex<VecDeque<String>>,
    last: Mutex<String>,
}

impl ScriptedOtpGenerator {
    pub fn new(codes: &[&str]) -> Self {
        Self {
            codes: Mutex::new(codes.iter().map(|c| c.to_string()).collect()),
            last: Mutex::new("000000".to_string()),
        }
    }
}

impl OtpGenerator for ScriptedOtpGenerator {
    fn generate(&self) -> String {
        let mut last = lock(&self.last);
        if let Some(next) = lock(&self.codes).pop_front() {
            *last = next;
        }
        last.clone()
    }
}

/// A clock that only moves when told to.
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl Default for ManualClock {
    fn default() -> Self {
        Self {
            now: Mutex::new(Utc::now()),
        }
    }
}

impl ManualClock {
    pub fn advance(&self, by: Duration) {
        let mut now = lock(&self.now);
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *lock(&self.now)
    }
}

/// Reversible "hashing" so tests can skip argon2's cost.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainHasher;

impl CredentialHasher for PlainHasher {
    fn hash(&self, password: &str) -> PortResult<String> {
        Ok(format!("plain:{password}"))
    }

    fn verify(&self, password: &str, password_hash: &str) -> PortResult<bool> {
        password_hash
            .strip_prefix("plain:")
            .map(|stored| stored == password)
            .ok_or_else(|| PortError::Unexpected("not a plain hash".to_string()))
    }
}

/// Tokens of the form `<account id>:<role>`, never expiring.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnsignedTokens;

impl TokenService for UnsignedTokens {
    fn issue(&self, account_id: Uuid, role: Role) -> PortResult<String> {
        Ok(format!("{account_id}:{}", role.as_str()))
    }

    fn verify(&self, token: &str) -> PortResult<SessionClaims> {
        let (id, role) = token.split_once(':').ok_or(PortError::Unauthorized)?;
        Ok(SessionClaims {
            account_id: Uuid::parse_str(id).map_err(|_| PortError::Unauthorized)?,
            role: Role::parse(role).ok_or(PortError::Unauthorized)?,
            expires_at: DateTime::<Utc>::MAX_UTC,
        })
    }
}
