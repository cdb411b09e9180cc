//! Catalog service.

use std::sync::Arc;

use async_trait::async_trait;
use mockall::automock;
use tracing::info;

use crate::{
    auth::{AdminPolicy, Capability, UserId},
    database::Db,
    domain::catalog::{
        errors::CatalogServiceError,
        models::{ColorOption, NewProduct, Product, ProductId, ProductUpdate, SizeOption},
        repository::PgCatalogRepository,
    },
};

#[derive(Debug, Clone)]
pub struct PgCatalogService {
    db: Db,
    repository: PgCatalogRepository,
    policy: Arc<AdminPolicy>,
}

impl PgCatalogService {
    #[must_use]
    pub fn new(db: Db, policy: Arc<AdminPolicy>) -> Self {
        Self {
            db,
            repository: PgCatalogRepository::new(),
            policy,
        }
    }
}

/// Reject listings the storefront could never sell: a product must have a
/// name, at least one color and size, and a resolvable price for every size.
fn validate_listing(
    name: &str,
    price: Option<u64>,
    sizes: &[SizeOption],
    colors: &[ColorOption],
) -> Result<(), CatalogServiceError> {
    if name.trim().is_empty() {
        return Err(CatalogServiceError::MissingRequiredData);
    }

    if sizes.is_empty() || colors.is_empty() {
        return Err(CatalogServiceError::MissingRequiredData);
    }

    if sizes.iter().any(|size| size.price.or(price).is_none()) {
        return Err(CatalogServiceError::InvalidData);
    }

    Ok(())
}

#[async_trait]
impl CatalogService for PgCatalogService {
    async fn list_products(&self) -> Result<Vec<Product>, CatalogServiceError> {
        let mut tx = self.db.begin_transaction().await?;

        let products = self.repository.list_products(&mut tx).await?;

        tx.commit().await?;

        Ok(products)
    }

    async fn get_product(&self, product: ProductId) -> Result<Product, CatalogServiceError> {
        let mut tx = self.db.begin_transaction().await?;

        let product = self.repository.get_product(&mut tx, product).await?;

        tx.commit().await?;

        Ok(product)
    }

    #[tracing::instrument(
        name = "catalog.service.create_product",
        skip(self, product),
        fields(actor = %actor, product_id = %product.id),
        err
    )]
    async fn create_product(
        &self,
        actor: UserId,
        product: NewProduct,
    ) -> Result<Product, CatalogServiceError> {
        self.policy.require(actor, Capability::ManageCatalog)?;

        validate_listing(&product.name, product.price, &product.sizes, &product.colors)?;

        let mut tx = self.db.begin_transaction().await?;

        let created = self.repository.create_product(&mut tx, product).await?;

        tx.commit().await?;

        info!(product_id = %created.id, name = %created.name, "created product");

        Ok(created)
    }

    #[tracing::instrument(
        name = "catalog.service.update_product",
        skip(self, update),
        fields(actor = %actor, product_id = %product),
        err
    )]
    async fn update_product(
        &self,
        actor: UserId,
        product: ProductId,
        update: ProductUpdate,
    ) -> Result<Product, CatalogServiceError> {
        self.policy.require(actor, Capability::ManageCatalog)?;

        validate_listing(&update.name, update.price, &update.sizes, &update.colors)?;

        let mut tx = self.db.begin_transaction().await?;

        let updated = self
            .repository
            .update_product(&mut tx, product, update)
            .await?;

        tx.commit().await?;

        info!(product_id = %updated.id, "updated product");

        Ok(updated)
    }

    #[tracing::instrument(
        name = "catalog.service.delete_product",
        skip(self),
        fields(actor = %actor, product_id = %product),
        err
    )]
    async fn delete_product(
        &self,
        actor: UserId,
        product: ProductId,
    ) -> Result<(), CatalogServiceError> {
        self.policy.require(actor, Capability::ManageCatalog)?;

        let mut tx = self.db.begin_transaction().await?;

        let rows_affected = self.repository.delete_product(&mut tx, product).await?;

        if rows_affected == 0 {
            return Err(CatalogServiceError::NotFound);
        }

        tx.commit().await?;

        info!(product_id = %product, "deleted product");

        Ok(())
    }
}

#[automock]
#[async_trait]
pub trait CatalogService: Send + Sync {
    /// Retrieve every live product, newest first.
    async fn list_products(&self) -> Result<Vec<Product>, CatalogServiceError>;

    /// Retrieve a single product.
    async fn get_product(&self, product: ProductId) -> Result<Product, CatalogServiceError>;

    /// Create a product listing. Admin only.
    async fn create_product(
        &self,
        actor: UserId,
        product: NewProduct,
    ) -> Result<Product, CatalogServiceError>;

    /// Replace a product's listing data. Admin only.
    async fn update_product(
        &self,
        actor: UserId,
        product: ProductId,
        update: ProductUpdate,
    ) -> Result<Product, CatalogServiceError>;

    /// Soft-delete a product. Admin only.
    async fn delete_product(
        &self,
        actor: UserId,
        product: ProductId,
    ) -> Result<(), CatalogServiceError>;
}
