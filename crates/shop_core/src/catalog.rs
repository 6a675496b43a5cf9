//! crates/shop_core/src/catalog.rs
//!
//! Product lookup and listing, plus the admin-side create, update and soft delete.

use std::sync::Arc;

use rust_decimal::Decimal;
use tracing::info;
use uuid::Uuid;

use crate::domain::{is_valid_price, NewProduct, Product, ProductChanges, ProductPage, ProductQuery};
use crate::error::{CoreError, CoreResult};
use crate::ports::{DatabaseService, PortError};

pub const MAX_PAGE_SIZE: u32 = 100;

#[derive(Clone)]
pub struct CatalogService {
    pub db: Arc<dyn DatabaseService>,
}

impl CatalogService {
    /// Active products, newest first. Paging values are clamped to sane bounds.
    pub async fn list_products(&self, mut query: ProductQuery) -> CoreResult<ProductPage> {
        query.page = query.page.max(1);
        query.limit = query.limit.clamp(1, MAX_PAGE_SIZE);
        query.keyword = query
            .keyword
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty());
        query.category = query
            .category
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty());

        Ok(self.db.list_products(&query).await?)
    }

    /// Deactivated products are reported as missing.
    pub async fn get_product(&self, product_id: Uuid) -> CoreResult<Product> {
        self.db
            .get_product_by_id(product_id)
            .await?
            .filter(|product| product.is_active)
            .ok_or(CoreError::ProductNotFound)
    }

    pub async fn create_product(&self, product: NewProduct) -> CoreResult<Product> {
        validate_name(&product.name)?;
        validate_price(product.price)?;
        validate_stock(product.stock)?;

        let product = self.db.create_product(product).await?;
        info!(product_id = %product.id, name = %product.name, "Created product");
        Ok(product)
    }

    /// Applies the fields present in `changes`. An empty change set returns the
    /// product as stored.
    pub async fn update_product(
        &self,
        product_id: Uuid,
        changes: ProductChanges,
    ) -> CoreResult<Product> {
        if let Some(name) = &changes.name {
            validate_name(name)?;
        }
        if let Some(price) = changes.price {
            validate_price(price)?;
        }
        if let Some(stock) = changes.stock {
            validate_stock(stock)?;
        }

        if changes.is_empty() {
            return self
                .db
                .get_product_by_id(product_id)
                .await?
                .ok_or(CoreError::ProductNotFound);
        }

        let product = match self.db.update_product(product_id, &changes).await {
            Ok(product) => product,
            Err(PortError::NotFound(_)) => return Err(CoreError::ProductNotFound),
            Err(e) => return Err(e.into()),
        };
        info!(product_id = %product.id, active = product.is_active, "Updated product");
        Ok(product)
    }

    /// Soft delete: the product stays stored for past orders but leaves the catalog.
    pub async fn deactivate_product(&self, product_id: Uuid) -> CoreResult<Product> {
        self.update_product(
            product_id,
            ProductChanges {
                is_active: Some(false),
                ..ProductChanges::default()
            },
        )
        .await
    }
}

fn validate_name(name: &str) -> CoreResult<()> {
    if name.trim().is_empty() {
        return Err(CoreError::Validation("Product name is required".to_string()));
    }
    Ok(())
}

fn validate_price(price: Decimal) -> CoreResult<()> {
    if !is_valid_price(price) {
        return Err(CoreError::Validation(
            "Price must be between 0 and 9999999999.99".to_string(),
        ));
    }
    Ok(())
}

fn validate_stock(stock: i32) -> CoreResult<()> {
    if stock < 0 {
        return Err(CoreError::Validation("Stock cannot be negative".to_string()));
    }
    Ok(())
}
