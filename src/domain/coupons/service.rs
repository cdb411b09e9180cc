//! Coupons service.

use std::sync::Arc;

use async_trait::async_trait;
use mockall::automock;
use tracing::info;

use crate::{
    auth::{AdminPolicy, Capability, UserId},
    database::Db,
    domain::coupons::{
        errors::CouponsServiceError,
        models::{Coupon, NewCoupon, Redemption},
        repository::PgCouponsRepository,
    },
};

#[derive(Debug, Clone)]
pub struct PgCouponsService {
    db: Db,
    repository: PgCouponsRepository,
    policy: Arc<AdminPolicy>,
}

impl PgCouponsService {
    #[must_use]
    pub fn new(db: Db, policy: Arc<AdminPolicy>) -> Self {
        Self {
            db,
            repository: PgCouponsRepository::new(),
            policy,
        }
    }
}

#[async_trait]
impl CouponsService for PgCouponsService {
    async fn list_coupons(&self, actor: UserId) -> Result<Vec<Coupon>, CouponsServiceError> {
        self.policy.require(actor, Capability::ManageCoupons)?;

        let mut tx = self.db.begin_transaction().await?;

        let coupons = self.repository.list_coupons(&mut tx).await?;

        tx.commit().await?;

        Ok(coupons)
    }

    #[tracing::instrument(
        name = "coupons.service.create_coupon",
        skip(self, coupon),
        fields(actor = %actor, code = %coupon.code),
        err
    )]
    async fn create_coupon(
        &self,
        actor: UserId,
        coupon: NewCoupon,
    ) -> Result<Coupon, CouponsServiceError> {
        self.policy.require(actor, Capability::ManageCoupons)?;

        if coupon.code.trim().is_empty() {
            return Err(CouponsServiceError::MissingRequiredData);
        }

        if coupon.discount_percentage == 0 || coupon.discount_percentage > 100 {
            return Err(CouponsServiceError::InvalidData);
        }

        let mut tx = self.db.begin_transaction().await?;

        let created = self.repository.create_coupon(&mut tx, coupon).await?;

        tx.commit().await?;

        info!(coupon_id = %created.id, code = %created.code, "created coupon");

        Ok(created)
    }

    #[tracing::instrument(
        name = "coupons.service.delete_coupon",
        skip(self),
        fields(actor = %actor, code = %code),
        err
    )]
    async fn delete_coupon(&self, actor: UserId, code: &str) -> Result<(), CouponsServiceError> {
        self.policy.require(actor, Capability::ManageCoupons)?;

        let mut tx = self.db.begin_transaction().await?;

        let rows_affected = self.repository.delete_coupon(&mut tx, code).await?;

        if rows_affected == 0 {
            return Err(CouponsServiceError::NotFound);
        }

        tx.commit().await?;

        info!(code = %code, "deleted coupon");

        Ok(())
    }

    #[tracing::instrument(
        name = "coupons.service.redeem",
        skip(self),
        fields(user = %user, code = %code),
        err
    )]
    async fn redeem(
        &self,
        user: UserId,
        code: &str,
        subtotal: u64,
    ) -> Result<Redemption, CouponsServiceError> {
        let mut tx = self.db.begin_transaction().await?;

        let redemption = self.repository.redeem(&mut tx, user, code, subtotal).await?;

        tx.commit().await?;

        info!(
            coupon_id = %redemption.coupon,
            discount = redemption.discount,
            "redeemed coupon"
        );

        Ok(redemption)
    }
}

#[automock]
#[async_trait]
pub trait CouponsService: Send + Sync {
    /// Retrieve all coupons, newest first. Admin only.
    async fn list_coupons(&self, actor: UserId) -> Result<Vec<Coupon>, CouponsServiceError>;

    /// Create a coupon. Admin only.
    async fn create_coupon(
        &self,
        actor: UserId,
        coupon: NewCoupon,
    ) -> Result<Coupon, CouponsServiceError>;

    /// Delete a coupon by code. Admin only.
    async fn delete_coupon(&self, actor: UserId, code: &str) -> Result<(), CouponsServiceError>;

    /// Redeem `code` for `user` against `subtotal`: at most one redemption
    /// per (user, coupon), budget decremented exactly once per success, both
    /// in one atomic step.
    async fn redeem(
        &self,
        user: UserId,
        code: &str,
        subtotal: u64,
    ) -> Result<Redemption, CouponsServiceError>;
}
