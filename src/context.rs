//! App Context

use std::sync::Arc;

use thiserror::Error;

use crate::{
    auth::AdminPolicy,
    database::{self, Db},
    domain::{
        carts::{CartsService, PgCartsService},
        catalog::{CatalogService, PgCatalogService},
        checkout::{CheckoutService, PgCheckoutService},
        coupons::{CouponsService, PgCouponsService},
        orders::{OrdersService, PgOrdersService},
    },
    subscriptions::FeedRegistry,
};

#[derive(Debug, Error)]
pub enum AppInitError {
    #[error("failed to connect to database")]
    Database(#[source] sqlx::Error),
}

#[derive(Clone)]
pub struct AppContext {
    pub catalog: Arc<dyn CatalogService>,
    pub carts: Arc<dyn CartsService>,
    pub coupons: Arc<dyn CouponsService>,
    pub orders: Arc<dyn OrdersService>,
    pub checkout: Arc<dyn CheckoutService>,
}

impl AppContext {
    /// Build application context from a database URL.
    ///
    /// # Errors
    ///
    /// Returns an error when establishing a database connection fails.
    pub async fn from_database_url(
        url: &str,
        policy: AdminPolicy,
    ) -> Result<Self, AppInitError> {
        let pool = database::connect(url)
            .await
            .map_err(AppInitError::Database)?;

        let db = Db::new(pool);
        let policy = Arc::new(policy);
        let cart_feeds = Arc::new(FeedRegistry::new());

        Ok(Self {
            catalog: Arc::new(PgCatalogService::new(db.clone(), Arc::clone(&policy))),
            carts: Arc::new(PgCartsService::new(db.clone(), Arc::clone(&cart_feeds))),
            coupons: Arc::new(PgCouponsService::new(db.clone(), Arc::clone(&policy))),
            orders: Arc::new(PgOrdersService::new(db.clone(), policy)),
            checkout: Arc::new(PgCheckoutService::new(db, cart_feeds)),
        })
    }
}
