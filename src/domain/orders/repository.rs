//! Orders Repository
//!
//! Orders are append-only from the shopper side. The only UPDATE this module
//! knows is the compare-and-set on `status`; no statement can touch the
//! snapshotted items or amounts after insert.

use jiff_sqlx::Timestamp as SqlxTimestamp;
use serde_json::Value;
use sqlx::{FromRow, Postgres, Row, Transaction, postgres::PgRow, query, query_as};

use crate::{
    auth::UserId,
    database::{encode_amount, try_get_amount},
    domain::orders::{
        models::{NewOrder, Order, OrderId, OrderItem},
        status::OrderStatus,
    },
};

const INSERT_ORDER_SQL: &str = "\
    INSERT INTO orders
        (uuid, reference, user_id, payer, phone, memo, items,
         subtotal, discount, total, status)
    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
    RETURNING uuid, reference, user_id, payer, phone, memo, items,
              subtotal, discount, total, status, created_at";

const GET_ORDER_SQL: &str = "\
    SELECT uuid, reference, user_id, payer, phone, memo, items,
           subtotal, discount, total, status, created_at
    FROM orders
    WHERE uuid = $1";

const LIST_FOR_USER_SQL: &str = "\
    SELECT uuid, reference, user_id, payer, phone, memo, items,
           subtotal, discount, total, status, created_at
    FROM orders
    WHERE user_id = $1
    ORDER BY created_at DESC, uuid DESC";

const LIST_ALL_SQL: &str = "\
    SELECT uuid, reference, user_id, payer, phone, memo, items,
           subtotal, discount, total, status, created_at
    FROM orders
    ORDER BY created_at DESC, uuid DESC";

// Compare-and-set: the WHERE clause pins the expected current status, so a
// concurrent transition makes this affect zero rows instead of double-moving.
const ADVANCE_STATUS_SQL: &str = "\
    UPDATE orders
    SET status = $3
    WHERE uuid = $1
      AND status = $2";

#[derive(Debug, Clone, Default)]
pub(crate) struct PgOrdersRepository;

impl PgOrdersRepository {
    #[must_use]
    pub(crate) fn new() -> Self {
        Self
    }

    pub(crate) async fn insert_order(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        order: &NewOrder,
    ) -> Result<Order, sqlx::Error> {
        let items = serde_json::to_value(&order.items).map_err(|e| sqlx::Error::ColumnDecode {
            index: "items".to_string(),
            source: Box::new(e),
        })?;

        query_as::<Postgres, Order>(INSERT_ORDER_SQL)
            .bind(order.id.into_uuid())
            .bind(&order.reference)
            .bind(order.user.map(UserId::into_uuid))
            .bind(&order.payer)
            .bind(&order.phone)
            .bind(&order.memo)
            .bind(items)
            .bind(encode_amount(order.subtotal, "subtotal")?)
            .bind(encode_amount(order.discount, "discount")?)
            .bind(encode_amount(order.total, "total")?)
            .bind(OrderStatus::INITIAL.as_str())
            .fetch_one(&mut **tx)
            .await
    }

    pub(crate) async fn get_order(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        order: OrderId,
    ) -> Result<Order, sqlx::Error> {
        query_as::<Postgres, Order>(GET_ORDER_SQL)
            .bind(order.into_uuid())
            .fetch_one(&mut **tx)
            .await
    }

    pub(crate) async fn list_orders_for_user(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        user: UserId,
    ) -> Result<Vec<Order>, sqlx::Error> {
        query_as::<Postgres, Order>(LIST_FOR_USER_SQL)
            .bind(user.into_uuid())
            .fetch_all(&mut **tx)
            .await
    }

    pub(crate) async fn list_all_orders(
        &self,
        tx: &mut Transaction<'_, Postgres>,
    ) -> Result<Vec<Order>, sqlx::Error> {
        query_as::<Postgres, Order>(LIST_ALL_SQL)
            .fetch_all(&mut **tx)
            .await
    }

    pub(crate) async fn advance_status(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        order: OrderId,
        from: OrderStatus,
        to: OrderStatus,
    ) -> Result<u64, sqlx::Error> {
        let rows_affected = query(ADVANCE_STATUS_SQL)
            .bind(order.into_uuid())
            .bind(from.as_str())
            .bind(to.as_str())
            .execute(&mut **tx)
            .await?
            .rows_affected();

        Ok(rows_affected)
    }
}

impl<'r> FromRow<'r, PgRow> for Order {
    fn from_row(row: &'r PgRow) -> sqlx::Result<Self> {
        let items: Value = row.try_get("items")?;
        let items: Vec<OrderItem> =
            serde_json::from_value(items).map_err(|e| sqlx::Error::ColumnDecode {
                index: "items".to_string(),
                source: Box::new(e),
            })?;

        let status: String = row.try_get("status")?;
        let status = status
            .parse::<OrderStatus>()
            .map_err(|e| sqlx::Error::ColumnDecode {
                index: "status".to_string(),
                source: Box::new(e),
            })?;

        Ok(Self {
            id: OrderId::from_uuid(row.try_get("uuid")?),
            reference: row.try_get("reference")?,
            user: row
                .try_get::<Option<uuid::Uuid>, _>("user_id")?
                .map(UserId::from_uuid),
            payer: row.try_get("payer")?,
            phone: row.try_get("phone")?,
            memo: row.try_get("memo")?,
            items,
            subtotal: try_get_amount(row, "subtotal")?,
            discount: try_get_amount(row, "discount")?,
            total: try_get_amount(row, "total")?,
            status,
            created_at: row.try_get::<SqlxTimestamp, _>("created_at")?.to_jiff(),
        })
    }
}
