//! Orders service.
//!
//! Orders are created by the checkout engine; this service only reads them
//! and advances their status. Nothing here (or anywhere else) can rewrite a
//! persisted order's items or amounts.

use std::sync::Arc;

use async_trait::async_trait;
use mockall::automock;
use tracing::info;

use crate::{
    auth::{AdminPolicy, Capability, UserId},
    database::Db,
    domain::orders::{
        errors::OrdersServiceError,
        models::{Order, OrderId},
        repository::PgOrdersRepository,
        status::OrderStatus,
    },
};

#[derive(Debug, Clone)]
pub struct PgOrdersService {
    db: Db,
    repository: PgOrdersRepository,
    policy: Arc<AdminPolicy>,
}

impl PgOrdersService {
    #[must_use]
    pub fn new(db: Db, policy: Arc<AdminPolicy>) -> Self {
        Self {
            db,
            repository: PgOrdersRepository::new(),
            policy,
        }
    }
}

#[async_trait]
impl OrdersService for PgOrdersService {
    async fn get_order(&self, order: OrderId) -> Result<Order, OrdersServiceError> {
        let mut tx = self.db.begin_transaction().await?;

        let order = self.repository.get_order(&mut tx, order).await?;

        tx.commit().await?;

        Ok(order)
    }

    async fn list_orders_for_user(&self, user: UserId) -> Result<Vec<Order>, OrdersServiceError> {
        let mut tx = self.db.begin_transaction().await?;

        let orders = self.repository.list_orders_for_user(&mut tx, user).await?;

        tx.commit().await?;

        Ok(orders)
    }

    async fn list_all_orders(&self, actor: UserId) -> Result<Vec<Order>, OrdersServiceError> {
        self.policy.require(actor, Capability::AdvanceOrders)?;

        let mut tx = self.db.begin_transaction().await?;

        let orders = self.repository.list_all_orders(&mut tx).await?;

        tx.commit().await?;

        Ok(orders)
    }

    #[tracing::instrument(
        name = "orders.service.advance_status",
        skip(self),
        fields(actor = %actor, order_id = %order, to = %to),
        err
    )]
    async fn advance_status(
        &self,
        actor: UserId,
        order: OrderId,
        to: OrderStatus,
    ) -> Result<Order, OrdersServiceError> {
        self.policy.require(actor, Capability::AdvanceOrders)?;

        let mut tx = self.db.begin_transaction().await?;

        let current = self.repository.get_order(&mut tx, order).await?;

        if !current.status.can_advance_to(to) {
            return Err(OrdersServiceError::InvalidTransition {
                from: current.status,
                to,
            });
        }

        let rows_affected = self
            .repository
            .advance_status(&mut tx, order, current.status, to)
            .await?;

        if rows_affected == 0 {
            // Lost a race with another transition since the read above.
            return Err(OrdersServiceError::InvalidTransition {
                from: current.status,
                to,
            });
        }

        tx.commit().await?;

        info!(order_id = %order, from = %current.status, to = %to, "advanced order status");

        Ok(Order {
            status: to,
            ..current
        })
    }
}

#[automock]
#[async_trait]
pub trait OrdersService: Send + Sync {
    /// Retrieve a single order.
    async fn get_order(&self, order: OrderId) -> Result<Order, OrdersServiceError>;

    /// A shopper's own orders, newest first.
    async fn list_orders_for_user(&self, user: UserId) -> Result<Vec<Order>, OrdersServiceError>;

    /// Every order, newest first. Admin only.
    async fn list_all_orders(&self, actor: UserId) -> Result<Vec<Order>, OrdersServiceError>;

    /// Advance an order one step along
    /// `pending → confirmed → shipped → delivered`. Admin only.
    async fn advance_status(
        &self,
        actor: UserId,
        order: OrderId,
        to: OrderStatus,
    ) -> Result<Order, OrdersServiceError>;
}
