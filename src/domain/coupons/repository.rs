//! Coupons Repository

use jiff_sqlx::Timestamp as SqlxTimestamp;
use sqlx::{
    FromRow, Postgres, Row, Transaction,
    error::{DatabaseError, ErrorKind},
    postgres::PgRow,
    query, query_as, query_scalar,
};

use crate::{
    auth::UserId,
    database::{encode_amount, try_get_amount},
    domain::coupons::{
        errors::CouponsServiceError,
        models::{Coupon, CouponId, NewCoupon, Redemption},
    },
};

const LIST_COUPONS_SQL: &str = "\
    SELECT uuid, code, discount_percentage, quantity, created_at
    FROM coupons
    ORDER BY created_at DESC";

const CREATE_COUPON_SQL: &str = "\
    INSERT INTO coupons (uuid, code, discount_percentage, quantity)
    VALUES ($1, $2, $3, $4)
    RETURNING uuid, code, discount_percentage, quantity, created_at";

const DELETE_COUPON_SQL: &str = "DELETE FROM coupons WHERE code = $1";

// The row lock serializes concurrent redemptions of the same coupon; the
// depletion and prior-use checks that follow are race-free behind it.
const LOCK_COUPON_SQL: &str = "\
    SELECT uuid, code, discount_percentage, quantity, created_at
    FROM coupons
    WHERE code = $1
    FOR UPDATE";

const USAGE_EXISTS_SQL: &str = "\
    SELECT EXISTS (
        SELECT 1 FROM coupon_usages WHERE user_id = $1 AND coupon_uuid = $2
    )";

const DECREMENT_SQL: &str = "\
    UPDATE coupons
    SET quantity = quantity - 1
    WHERE uuid = $1
      AND quantity > 0";

const RECORD_USAGE_SQL: &str = "\
    INSERT INTO coupon_usages (user_id, coupon_uuid)
    VALUES ($1, $2)";

#[derive(Debug, Clone, Default)]
pub(crate) struct PgCouponsRepository;

impl PgCouponsRepository {
    #[must_use]
    pub(crate) fn new() -> Self {
        Self
    }

    pub(crate) async fn list_coupons(
        &self,
        tx: &mut Transaction<'_, Postgres>,
    ) -> Result<Vec<Coupon>, sqlx::Error> {
        query_as::<Postgres, Coupon>(LIST_COUPONS_SQL)
            .fetch_all(&mut **tx)
            .await
    }

    pub(crate) async fn create_coupon(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        coupon: NewCoupon,
    ) -> Result<Coupon, sqlx::Error> {
        query_as::<Postgres, Coupon>(CREATE_COUPON_SQL)
            .bind(coupon.id.into_uuid())
            .bind(&coupon.code)
            .bind(i16::from(coupon.discount_percentage))
            .bind(encode_amount(coupon.quantity, "quantity")?)
            .fetch_one(&mut **tx)
            .await
    }

    pub(crate) async fn delete_coupon(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        code: &str,
    ) -> Result<u64, sqlx::Error> {
        let rows_affected = query(DELETE_COUPON_SQL)
            .bind(code)
            .execute(&mut **tx)
            .await?
            .rows_affected();

        Ok(rows_affected)
    }

    /// Redeem `code` for `user` against `subtotal` inside the caller's
    /// transaction: lock the coupon row, check depletion and prior use,
    /// decrement the budget and record the usage. The caller's commit makes
    /// all of it visible, or none of it.
    pub(crate) async fn redeem(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        user: UserId,
        code: &str,
        subtotal: u64,
    ) -> Result<Redemption, CouponsServiceError> {
        let coupon = query_as::<Postgres, Coupon>(LOCK_COUPON_SQL)
            .bind(code)
            .fetch_optional(&mut **tx)
            .await?
            .ok_or(CouponsServiceError::NotFound)?;

        if coupon.quantity == 0 {
            return Err(CouponsServiceError::Depleted);
        }

        let already_used = query_scalar::<Postgres, bool>(USAGE_EXISTS_SQL)
            .bind(user.into_uuid())
            .bind(coupon.id.into_uuid())
            .fetch_one(&mut **tx)
            .await?;

        if already_used {
            return Err(CouponsServiceError::AlreadyUsed);
        }

        let rows_affected = query(DECREMENT_SQL)
            .bind(coupon.id.into_uuid())
            .execute(&mut **tx)
            .await?
            .rows_affected();

        if rows_affected == 0 {
            return Err(CouponsServiceError::Depleted);
        }

        query(RECORD_USAGE_SQL)
            .bind(user.into_uuid())
            .bind(coupon.id.into_uuid())
            .execute(&mut **tx)
            .await
            .map_err(usage_insert_error)?;

        Ok(Redemption {
            coupon: coupon.id,
            code: coupon.code.clone(),
            discount_percentage: coupon.discount_percentage,
            discount: coupon.discount_for(subtotal),
        })
    }
}

/// The usage record's primary key is the "already used" witness; a unique
/// violation on insert means a prior redemption, not a duplicate coupon.
fn usage_insert_error(error: sqlx::Error) -> CouponsServiceError {
    if matches!(
        error.as_database_error().map(DatabaseError::kind),
        Some(ErrorKind::UniqueViolation)
    ) {
        CouponsServiceError::AlreadyUsed
    } else {
        error.into()
    }
}

impl<'r> FromRow<'r, PgRow> for Coupon {
    fn from_row(row: &'r PgRow) -> sqlx::Result<Self> {
        let percentage: i16 = row.try_get("discount_percentage")?;
        let discount_percentage =
            u8::try_from(percentage).map_err(|e| sqlx::Error::ColumnDecode {
                index: "discount_percentage".to_string(),
                source: Box::new(e),
            })?;

        Ok(Self {
            id: CouponId::from_uuid(row.try_get("uuid")?),
            code: row.try_get("code")?,
            discount_percentage,
            quantity: try_get_amount(row, "quantity")?,
            created_at: row.try_get::<SqlxTimestamp, _>("created_at")?.to_jiff(),
        })
    }
}
