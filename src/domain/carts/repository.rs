//! Cart Repository
//!
//! One persisted cart per shopper, one row per (product, color, size) line.

use sqlx::{FromRow, Postgres, Row, Transaction, postgres::PgRow, query, query_as};
use uuid::Uuid;

use crate::{
    auth::UserId,
    database::{encode_amount, try_get_amount},
    domain::{
        carts::models::{CartLine, CartSnapshot, VariantKey},
        catalog::models::ProductId,
    },
};

const SNAPSHOT_SQL: &str = "\
    SELECT ci.product_uuid, p.name, ci.color, ci.size, ci.unit_price, ci.quantity
    FROM cart_items ci
    JOIN products p ON p.uuid = ci.product_uuid
    WHERE ci.user_id = $1
    ORDER BY ci.created_at, ci.uuid";

const MERGE_LINE_SQL: &str = "\
    INSERT INTO cart_items (uuid, user_id, product_uuid, color, size, unit_price, quantity)
    VALUES ($1, $2, $3, $4, $5, $6, $7)
    ON CONFLICT (user_id, product_uuid, color, size)
    DO UPDATE SET quantity = cart_items.quantity + EXCLUDED.quantity,
                  updated_at = now()";

const ADJUST_QUANTITY_SQL: &str = "\
    UPDATE cart_items
    SET quantity = quantity + $5,
        updated_at = now()
    WHERE user_id = $1
      AND product_uuid = $2
      AND color = $3
      AND size = $4
      AND quantity + $5 >= 1";

const REMOVE_LINE_SQL: &str = "\
    DELETE FROM cart_items
    WHERE user_id = $1
      AND product_uuid = $2
      AND color = $3
      AND size = $4";

const CLEAR_SQL: &str = "DELETE FROM cart_items WHERE user_id = $1";

#[derive(Debug, Clone, Default)]
pub(crate) struct PgCartRepository;

impl PgCartRepository {
    #[must_use]
    pub(crate) fn new() -> Self {
        Self
    }

    pub(crate) async fn snapshot(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        user: UserId,
    ) -> Result<CartSnapshot, sqlx::Error> {
        let lines = query_as::<Postgres, CartLine>(SNAPSHOT_SQL)
            .bind(user.into_uuid())
            .fetch_all(&mut **tx)
            .await?;

        Ok(CartSnapshot { lines })
    }

    /// Insert a priced line, or fold its quantity into the existing line with
    /// the same (product, color, size) key. A merged line keeps the unit
    /// price it was first selected at.
    pub(crate) async fn merge_line(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        user: UserId,
        key: &VariantKey,
        unit_price: u64,
        quantity: u32,
    ) -> Result<(), sqlx::Error> {
        query(MERGE_LINE_SQL)
            .bind(Uuid::now_v7())
            .bind(user.into_uuid())
            .bind(key.product.into_uuid())
            .bind(&key.color)
            .bind(&key.size)
            .bind(encode_amount(unit_price, "unit_price")?)
            .bind(i32::try_from(quantity).unwrap_or(i32::MAX))
            .execute(&mut **tx)
            .await?;

        Ok(())
    }

    /// Apply a quantity delta to the line with `key`. A line whose quantity
    /// would drop below one is removed instead; an unknown key is a no-op.
    pub(crate) async fn adjust_quantity(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        user: UserId,
        key: &VariantKey,
        delta: i32,
    ) -> Result<(), sqlx::Error> {
        let rows_affected = query(ADJUST_QUANTITY_SQL)
            .bind(user.into_uuid())
            .bind(key.product.into_uuid())
            .bind(&key.color)
            .bind(&key.size)
            .bind(delta)
            .execute(&mut **tx)
            .await?
            .rows_affected();

        if rows_affected == 0 {
            // Either the key is absent (no-op) or the delta drove the
            // quantity to zero or below (remove the line).
            self.remove_line(tx, user, key).await?;
        }

        Ok(())
    }

    pub(crate) async fn remove_line(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        user: UserId,
        key: &VariantKey,
    ) -> Result<u64, sqlx::Error> {
        let rows_affected = query(REMOVE_LINE_SQL)
            .bind(user.into_uuid())
            .bind(key.product.into_uuid())
            .bind(&key.color)
            .bind(&key.size)
            .execute(&mut **tx)
            .await?
            .rows_affected();

        Ok(rows_affected)
    }

    pub(crate) async fn clear(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        user: UserId,
    ) -> Result<u64, sqlx::Error> {
        let rows_affected = query(CLEAR_SQL)
            .bind(user.into_uuid())
            .execute(&mut **tx)
            .await?
            .rows_affected();

        Ok(rows_affected)
    }
}

impl<'r> FromRow<'r, PgRow> for CartLine {
    fn from_row(row: &'r PgRow) -> sqlx::Result<Self> {
        let quantity: i32 = row.try_get("quantity")?;
        let quantity = u32::try_from(quantity).map_err(|e| sqlx::Error::ColumnDecode {
            index: "quantity".to_string(),
            source: Box::new(e),
        })?;

        Ok(Self {
            product: ProductId::from_uuid(row.try_get("product_uuid")?),
            name: row.try_get("name")?,
            color: row.try_get("color")?,
            size: row.try_get("size")?,
            unit_price: try_get_amount(row, "unit_price")?,
            quantity,
        })
    }
}
