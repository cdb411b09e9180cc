//! Carts service.
//!
//! Every mutation commits before the caller gets the resulting snapshot
//! back, so a read issued after a mutation always observes it.

use std::sync::Arc;

use async_trait::async_trait;
use mockall::automock;

use crate::{
    auth::UserId,
    database::Db,
    domain::{
        carts::{
            errors::CartsServiceError,
            models::{CartSnapshot, VariantKey, VariantSelection},
            repository::PgCartRepository,
        },
        catalog::PgCatalogRepository,
    },
    subscriptions::{FeedRegistry, Subscription},
};

#[derive(Debug, Clone)]
pub struct PgCartsService {
    db: Db,
    repository: PgCartRepository,
    catalog: PgCatalogRepository,
    feeds: Arc<FeedRegistry<UserId, CartSnapshot>>,
}

impl PgCartsService {
    #[must_use]
    pub fn new(db: Db, feeds: Arc<FeedRegistry<UserId, CartSnapshot>>) -> Self {
        Self {
            db,
            repository: PgCartRepository::new(),
            catalog: PgCatalogRepository::new(),
            feeds,
        }
    }
}

#[async_trait]
impl CartsService for PgCartsService {
    #[tracing::instrument(
        name = "carts.service.add_variant",
        skip(self, selection),
        fields(user = %user, product_id = %selection.product),
        err
    )]
    async fn add_variant(
        &self,
        user: UserId,
        selection: VariantSelection,
    ) -> Result<CartSnapshot, CartsServiceError> {
        if selection.quantity == 0 {
            return Err(CartsServiceError::InvalidQuantity);
        }

        let mut tx = self.db.begin_transaction().await?;

        let product = self.catalog.get_product(&mut tx, selection.product).await?;

        if !product.has_color(&selection.color) {
            return Err(CartsServiceError::UnknownVariant);
        }

        let unit_price = product
            .unit_price(&selection.size)
            .ok_or(CartsServiceError::UnknownVariant)?;

        self.repository
            .merge_line(&mut tx, user, &selection.key(), unit_price, selection.quantity)
            .await?;

        let snapshot = self.repository.snapshot(&mut tx, user).await?;

        tx.commit().await?;

        self.feeds.publish(user, snapshot.clone());

        Ok(snapshot)
    }

    async fn change_quantity(
        &self,
        user: UserId,
        key: &VariantKey,
        delta: i32,
    ) -> Result<CartSnapshot, CartsServiceError> {
        let mut tx = self.db.begin_transaction().await?;

        self.repository
            .adjust_quantity(&mut tx, user, key, delta)
            .await?;

        let snapshot = self.repository.snapshot(&mut tx, user).await?;

        tx.commit().await?;

        self.feeds.publish(user, snapshot.clone());

        Ok(snapshot)
    }

    async fn remove_variant(
        &self,
        user: UserId,
        key: &VariantKey,
    ) -> Result<CartSnapshot, CartsServiceError> {
        let mut tx = self.db.begin_transaction().await?;

        self.repository.remove_line(&mut tx, user, key).await?;

        let snapshot = self.repository.snapshot(&mut tx, user).await?;

        tx.commit().await?;

        self.feeds.publish(user, snapshot.clone());

        Ok(snapshot)
    }

    async fn snapshot(&self, user: UserId) -> Result<CartSnapshot, CartsServiceError> {
        let mut tx = self.db.begin_transaction().await?;

        let snapshot = self.repository.snapshot(&mut tx, user).await?;

        tx.commit().await?;

        Ok(snapshot)
    }

    async fn clear(&self, user: UserId) -> Result<(), CartsServiceError> {
        let mut tx = self.db.begin_transaction().await?;

        self.repository.clear(&mut tx, user).await?;

        tx.commit().await?;

        self.feeds.publish(user, CartSnapshot::empty());

        Ok(())
    }

    fn subscribe(&self, user: UserId) -> Subscription<CartSnapshot> {
        self.feeds.subscribe(user)
    }
}

#[automock]
#[async_trait]
pub trait CartsService: Send + Sync {
    /// Add a variant to the shopper's cart, merging with an existing line
    /// with the same (product, color, size) key. The unit price is resolved
    /// here, at selection time.
    async fn add_variant(
        &self,
        user: UserId,
        selection: VariantSelection,
    ) -> Result<CartSnapshot, CartsServiceError>;

    /// Apply a quantity delta. A resulting quantity of zero or less removes
    /// the line; an unknown key is a no-op.
    async fn change_quantity(
        &self,
        user: UserId,
        key: &VariantKey,
        delta: i32,
    ) -> Result<CartSnapshot, CartsServiceError>;

    /// Remove a line unconditionally. An unknown key is a no-op.
    async fn remove_variant(
        &self,
        user: UserId,
        key: &VariantKey,
    ) -> Result<CartSnapshot, CartsServiceError>;

    /// The current cart state.
    async fn snapshot(&self, user: UserId) -> Result<CartSnapshot, CartsServiceError>;

    /// Remove every line.
    async fn clear(&self, user: UserId) -> Result<(), CartsServiceError>;

    /// Subscribe to the shopper's cart snapshots. A fresh snapshot is
    /// published after every committed mutation.
    fn subscribe(&self, user: UserId) -> Subscription<CartSnapshot>;
}
