//! Catalog Repository

use serde_json::Value;
use sqlx::{FromRow, Postgres, Row, Transaction, postgres::PgRow, query, query_as, query_scalar};

use crate::{
    database::{encode_amount, try_get_amount},
    domain::catalog::models::{NewProduct, Product, ProductId, ProductUpdate},
};

const LIST_PRODUCTS_SQL: &str = "\
    SELECT uuid, name, description, price, sizes, colors, shipping_fee_exempt,
           created_at, updated_at, deleted_at
    FROM products
    WHERE deleted_at IS NULL
    ORDER BY created_at DESC, uuid DESC";

const GET_PRODUCT_SQL: &str = "\
    SELECT uuid, name, description, price, sizes, colors, shipping_fee_exempt,
           created_at, updated_at, deleted_at
    FROM products
    WHERE uuid = $1
      AND deleted_at IS NULL";

const CREATE_PRODUCT_SQL: &str = "\
    INSERT INTO products (uuid, name, description, price, sizes, colors, shipping_fee_exempt)
    VALUES ($1, $2, $3, $4, $5, $6, $7)
    RETURNING uuid, name, description, price, sizes, colors, shipping_fee_exempt,
              created_at, updated_at, deleted_at";

const UPDATE_PRODUCT_SQL: &str = "\
    UPDATE products
    SET name = $2,
        description = $3,
        price = $4,
        sizes = $5,
        colors = $6,
        shipping_fee_exempt = $7,
        updated_at = now()
    WHERE uuid = $1
      AND deleted_at IS NULL
    RETURNING uuid, name, description, price, sizes, colors, shipping_fee_exempt,
              created_at, updated_at, deleted_at";

const DELETE_PRODUCT_SQL: &str = "\
    UPDATE products
    SET deleted_at = now(),
        updated_at = now()
    WHERE uuid = $1
      AND deleted_at IS NULL";

const SHIPPING_FLAG_SQL: &str = "\
    SELECT shipping_fee_exempt
    FROM products
    WHERE uuid = $1
      AND deleted_at IS NULL";

#[derive(Debug, Clone, Default)]
pub(crate) struct PgCatalogRepository;

impl PgCatalogRepository {
    #[must_use]
    pub(crate) fn new() -> Self {
        Self
    }

    pub(crate) async fn list_products(
        &self,
        tx: &mut Transaction<'_, Postgres>,
    ) -> Result<Vec<Product>, sqlx::Error> {
        query_as::<Postgres, Product>(LIST_PRODUCTS_SQL)
            .fetch_all(&mut **tx)
            .await
    }

    pub(crate) async fn get_product(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        product: ProductId,
    ) -> Result<Product, sqlx::Error> {
        query_as::<Postgres, Product>(GET_PRODUCT_SQL)
            .bind(product.into_uuid())
            .fetch_one(&mut **tx)
            .await
    }

    pub(crate) async fn create_product(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        product: NewProduct,
    ) -> Result<Product, sqlx::Error> {
        query_as::<Postgres, Product>(CREATE_PRODUCT_SQL)
            .bind(product.id.into_uuid())
            .bind(&product.name)
            .bind(&product.description)
            .bind(encode_price(product.price)?)
            .bind(encode_options(&product.sizes)?)
            .bind(encode_options(&product.colors)?)
            .bind(product.shipping_fee_exempt)
            .fetch_one(&mut **tx)
            .await
    }

    pub(crate) async fn update_product(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        product: ProductId,
        update: ProductUpdate,
    ) -> Result<Product, sqlx::Error> {
        query_as::<Postgres, Product>(UPDATE_PRODUCT_SQL)
            .bind(product.into_uuid())
            .bind(&update.name)
            .bind(&update.description)
            .bind(encode_price(update.price)?)
            .bind(encode_options(&update.sizes)?)
            .bind(encode_options(&update.colors)?)
            .bind(update.shipping_fee_exempt)
            .fetch_one(&mut **tx)
            .await
    }

    pub(crate) async fn delete_product(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        product: ProductId,
    ) -> Result<u64, sqlx::Error> {
        let rows_affected = query(DELETE_PRODUCT_SQL)
            .bind(product.into_uuid())
            .execute(&mut **tx)
            .await?
            .rows_affected();

        Ok(rows_affected)
    }

    /// Fetch a product's shipping exemption flag. `None` when the product is
    /// missing or deleted; the caller decides what that means.
    pub(crate) async fn shipping_fee_exempt(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        product: ProductId,
    ) -> Result<Option<bool>, sqlx::Error> {
        query_scalar::<Postgres, bool>(SHIPPING_FLAG_SQL)
            .bind(product.into_uuid())
            .fetch_optional(&mut **tx)
            .await
    }
}

fn encode_price(price: Option<u64>) -> Result<Option<i64>, sqlx::Error> {
    price.map(|p| encode_amount(p, "price")).transpose()
}

fn encode_options<T: serde::Serialize>(options: &[T]) -> Result<Value, sqlx::Error> {
    serde_json::to_value(options).map_err(|e| sqlx::Error::Encode(Box::new(e)))
}

fn decode_options<T: serde::de::DeserializeOwned>(
    row: &PgRow,
    col: &str,
) -> Result<T, sqlx::Error> {
    let value: Value = row.try_get(col)?;

    serde_json::from_value(value).map_err(|e| sqlx::Error::ColumnDecode {
        index: col.to_string(),
        source: Box::new(e),
    })
}

impl<'r> FromRow<'r, PgRow> for Product {
    fn from_row(row: &'r PgRow) -> sqlx::Result<Self> {
        use jiff_sqlx::Timestamp as SqlxTimestamp;

        let price = row
            .try_get::<Option<i64>, _>("price")?
            .map(|_| try_get_amount(row, "price"))
            .transpose()?;

        Ok(Self {
            id: ProductId::from_uuid(row.try_get("uuid")?),
            name: row.try_get("name")?,
            description: row.try_get("description")?,
            price,
            sizes: decode_options(row, "sizes")?,
            colors: decode_options(row, "colors")?,
            shipping_fee_exempt: row.try_get("shipping_fee_exempt")?,
            created_at: row.try_get::<SqlxTimestamp, _>("created_at")?.to_jiff(),
            updated_at: row.try_get::<SqlxTimestamp, _>("updated_at")?.to_jiff(),
            deleted_at: row
                .try_get::<Option<SqlxTimestamp>, _>("deleted_at")?
                .map(SqlxTimestamp::to_jiff),
        })
    }
}
