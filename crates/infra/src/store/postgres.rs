//! Postgres-backed variant store.
//!
//! Schema lives in `migrations/0001_product_variants.sql` and can be applied with
//! [`PostgresVariantStore::migrate`].
//!
//! ## Error Mapping
//!
//! | SQLx Error | PostgreSQL Error Code | StoreError | Scenario |
//! |------------|----------------------|------------|----------|
//! | Database (unique violation) | `23505` | `Conflict` | Second variant for the same `(product_id, combination_key)` |
//! | Database (foreign key violation) | `23503` | `NotFound` | Value inserted for an option that was deleted meanwhile |
//! | Database (check constraint violation) | `23514` | `Validation` | e.g. negative price |
//! | Database (other) | Any other | `Backend` | Other database errors |
//! | Other | N/A | `Backend` | Pool closed, network errors, etc. |
//!
//! Variant pairs carry no foreign keys to options or values, so deleting an option
//! never rewrites the identity of the variants that referenced it.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};
use tracing::instrument;
use uuid::Uuid;

use catalog_core::{OptionId, OptionValueId, ProductId, VariantId};
use catalog_variants::{
    CombinationKey, OptionPair, OptionValue, ProductOption, Variant, VariantDetails,
};

use super::r#trait::{StoreError, VariantStore};

const SCHEMA: &str = include_str!("../../migrations/0001_product_variants.sql");

/// Postgres-backed variant store.
///
/// Uses the SQLx connection pool, so it is `Send + Sync` and cheap to clone.
#[derive(Debug, Clone)]
pub struct PostgresVariantStore {
    pool: Arc<PgPool>,
}

impl PostgresVariantStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    /// Apply the schema (idempotent).
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::raw_sql(SCHEMA)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("migrate", e))?;
        Ok(())
    }
}

fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());
            match db_err.code().as_deref() {
                Some("23505") => StoreError::Conflict(msg),
                Some("23503") => StoreError::NotFound {
                    entity: "referenced row",
                    id: msg,
                },
                Some("23514") => StoreError::Validation(msg),
                _ => StoreError::Backend(msg),
            }
        }
        sqlx::Error::PoolClosed => {
            StoreError::Backend(format!("connection pool closed in {}", operation))
        }
        _ => StoreError::Backend(format!("sqlx error in {}: {}", operation, err)),
    }
}

fn price_to_db(price: Option<u64>) -> Result<Option<i64>, StoreError> {
    price
        .map(|p| {
            i64::try_from(p)
                .map_err(|_| StoreError::Validation(format!("price {p} is out of range")))
        })
        .transpose()
}

#[derive(Debug)]
struct OptionRow {
    id: Uuid,
    product_id: Uuid,
    name: String,
    position: i32,
}

impl<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow> for OptionRow {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        Ok(OptionRow {
            id: row.try_get("id")?,
            product_id: row.try_get("product_id")?,
            name: row.try_get("name")?,
            position: row.try_get("position")?,
        })
    }
}

impl From<OptionRow> for ProductOption {
    fn from(row: OptionRow) -> Self {
        ProductOption {
            id: OptionId::from_uuid(row.id),
            product_id: ProductId::from_uuid(row.product_id),
            name: row.name,
            position: row.position,
            values: Vec::new(),
        }
    }
}

#[derive(Debug)]
struct ValueRow {
    id: Uuid,
    option_id: Uuid,
    text: String,
    position: i32,
}

impl<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow> for ValueRow {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        Ok(ValueRow {
            id: row.try_get("id")?,
            option_id: row.try_get("option_id")?,
            text: row.try_get("text")?,
            position: row.try_get("position")?,
        })
    }
}

impl From<ValueRow> for OptionValue {
    fn from(row: ValueRow) -> Self {
        OptionValue {
            id: OptionValueId::from_uuid(row.id),
            option_id: OptionId::from_uuid(row.option_id),
            text: row.text,
            position: row.position,
        }
    }
}

#[derive(Debug)]
struct VariantRow {
    id: Uuid,
    product_id: Uuid,
    is_available: bool,
    sku: Option<String>,
    price: Option<i64>,
    image_ref: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow> for VariantRow {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        Ok(VariantRow {
            id: row.try_get("id")?,
            product_id: row.try_get("product_id")?,
            is_available: row.try_get("is_available")?,
            sku: row.try_get("sku")?,
            price: row.try_get("price")?,
            image_ref: row.try_get("image_ref")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

impl VariantRow {
    fn into_variant(self, pairs: Vec<OptionPair>) -> Result<Variant, StoreError> {
        let price = self
            .price
            .map(|p| {
                u64::try_from(p).map_err(|_| {
                    StoreError::Backend(format!("variant {} has a negative price", self.id))
                })
            })
            .transpose()?;
        Ok(Variant {
            id: VariantId::from_uuid(self.id),
            product_id: ProductId::from_uuid(self.product_id),
            key: CombinationKey::new(pairs),
            is_available: self.is_available,
            details: VariantDetails {
                sku: self.sku,
                price,
                image_ref: self.image_ref,
            },
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

fn decode<'r, T>(operation: &str, row: &'r sqlx::postgres::PgRow) -> Result<T, StoreError>
where
    T: sqlx::FromRow<'r, sqlx::postgres::PgRow>,
{
    T::from_row(row)
        .map_err(|e| StoreError::Backend(format!("failed to decode row in {operation}: {e}")))
}

#[async_trait::async_trait]
impl VariantStore for PostgresVariantStore {
    #[instrument(skip(self), fields(product_id = %product_id), err)]
    async fn load_options(&self, product_id: ProductId) -> Result<Vec<ProductOption>, StoreError> {
        let option_rows = sqlx::query(
            r#"
            SELECT id, product_id, name, position
            FROM product_options
            WHERE product_id = $1
            ORDER BY position ASC, id ASC
            "#,
        )
        .bind(product_id.as_uuid())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("load_options", e))?;

        let value_rows = sqlx::query(
            r#"
            SELECT v.id, v.option_id, v.text, v.position
            FROM product_option_values v
            JOIN product_options o ON o.id = v.option_id
            WHERE o.product_id = $1
            ORDER BY v.position ASC, v.id ASC
            "#,
        )
        .bind(product_id.as_uuid())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("load_option_values", e))?;

        let mut values_by_option: HashMap<OptionId, Vec<OptionValue>> = HashMap::new();
        for row in &value_rows {
            let value: OptionValue = decode::<ValueRow>("load_option_values", row)?.into();
            values_by_option.entry(value.option_id).or_default().push(value);
        }

        let mut options = Vec::with_capacity(option_rows.len());
        for row in &option_rows {
            let mut option: ProductOption = decode::<OptionRow>("load_options", row)?.into();
            option.values = values_by_option.remove(&option.id).unwrap_or_default();
            options.push(option);
        }
        Ok(options)
    }

    #[instrument(skip(self), fields(product_id = %product_id), err)]
    async fn create_option(
        &self,
        product_id: ProductId,
        name: &str,
    ) -> Result<ProductOption, StoreError> {
        let row = sqlx::query(
            r#"
            INSERT INTO product_options (id, product_id, name, position)
            VALUES (
                $1, $2, $3,
                COALESCE((SELECT MAX(position) + 1 FROM product_options WHERE product_id = $2), 0)
            )
            RETURNING id, product_id, name, position
            "#,
        )
        .bind(OptionId::new().as_uuid())
        .bind(product_id.as_uuid())
        .bind(name)
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("create_option", e))?;

        Ok(decode::<OptionRow>("create_option", &row)?.into())
    }

    #[instrument(skip(self), fields(option_id = %option_id), err)]
    async fn delete_option(&self, option_id: OptionId) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM product_options WHERE id = $1")
            .bind(option_id.as_uuid())
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("delete_option", e))?;
        if result.rows_affected() == 0 {
            return Err(StoreError::not_found("option", option_id));
        }
        Ok(())
    }

    #[instrument(skip(self), fields(option_id = %option_id), err)]
    async fn create_option_value(
        &self,
        option_id: OptionId,
        text: &str,
    ) -> Result<OptionValue, StoreError> {
        let row = sqlx::query(
            r#"
            INSERT INTO product_option_values (id, option_id, text, position)
            VALUES (
                $1, $2, $3,
                COALESCE((SELECT MAX(position) + 1 FROM product_option_values WHERE option_id = $2), 0)
            )
            RETURNING id, option_id, text, position
            "#,
        )
        .bind(OptionValueId::new().as_uuid())
        .bind(option_id.as_uuid())
        .bind(text)
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| match map_sqlx_error("create_option_value", e) {
            StoreError::NotFound { .. } => StoreError::not_found("option", option_id),
            other => other,
        })?;

        Ok(decode::<ValueRow>("create_option_value", &row)?.into())
    }

    #[instrument(skip(self), fields(value_id = %value_id), err)]
    async fn delete_option_value(&self, value_id: OptionValueId) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM product_option_values WHERE id = $1")
            .bind(value_id.as_uuid())
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("delete_option_value", e))?;
        if result.rows_affected() == 0 {
            return Err(StoreError::not_found("option value", value_id));
        }
        Ok(())
    }

    #[instrument(
        skip(self, positions),
        fields(product_id = %product_id, count = positions.len()),
        err
    )]
    async fn set_option_positions(
        &self,
        product_id: ProductId,
        positions: &[(OptionId, i32)],
    ) -> Result<(), StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("set_option_positions", e))?;

        for (option_id, position) in positions {
            let result = sqlx::query(
                "UPDATE product_options SET position = $1 WHERE id = $2 AND product_id = $3",
            )
            .bind(position)
            .bind(option_id.as_uuid())
            .bind(product_id.as_uuid())
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("set_option_positions", e))?;
            if result.rows_affected() == 0 {
                return Err(StoreError::not_found("option", option_id));
            }
        }

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("set_option_positions", e))
    }

    #[instrument(
        skip(self, positions),
        fields(option_id = %option_id, count = positions.len()),
        err
    )]
    async fn set_value_positions(
        &self,
        option_id: OptionId,
        positions: &[(OptionValueId, i32)],
    ) -> Result<(), StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("set_value_positions", e))?;

        for (value_id, position) in positions {
            let result = sqlx::query(
                "UPDATE product_option_values SET position = $1 WHERE id = $2 AND option_id = $3",
            )
            .bind(position)
            .bind(value_id.as_uuid())
            .bind(option_id.as_uuid())
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("set_value_positions", e))?;
            if result.rows_affected() == 0 {
                return Err(StoreError::not_found("option value", value_id));
            }
        }

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("set_value_positions", e))
    }

    #[instrument(skip(self), fields(product_id = %product_id), err)]
    async fn load_variants(&self, product_id: ProductId) -> Result<Vec<Variant>, StoreError> {
        let variant_rows = sqlx::query(
            r#"
            SELECT id, product_id, is_available, sku, price, image_ref, created_at, updated_at
            FROM product_variants
            WHERE product_id = $1
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(product_id.as_uuid())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("load_variants", e))?;

        let pair_rows = sqlx::query(
            r#"
            SELECT vv.variant_id, vv.option_id, vv.value_id
            FROM product_variant_values vv
            JOIN product_variants v ON v.id = vv.variant_id
            WHERE v.product_id = $1
            "#,
        )
        .bind(product_id.as_uuid())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("load_variant_values", e))?;

        let mut pairs_by_variant: HashMap<Uuid, Vec<OptionPair>> = HashMap::new();
        for row in &pair_rows {
            let read = |column: &str| -> Result<Uuid, StoreError> {
                row.try_get(column).map_err(|e| {
                    StoreError::Backend(format!("failed to decode variant pair: {e}"))
                })
            };
            pairs_by_variant
                .entry(read("variant_id")?)
                .or_default()
                .push(OptionPair::new(
                    OptionId::from_uuid(read("option_id")?),
                    OptionValueId::from_uuid(read("value_id")?),
                ));
        }

        let mut variants = Vec::with_capacity(variant_rows.len());
        for row in &variant_rows {
            let variant_row = decode::<VariantRow>("load_variants", row)?;
            let pairs = pairs_by_variant.remove(&variant_row.id).unwrap_or_default();
            variants.push(variant_row.into_variant(pairs)?);
        }
        Ok(variants)
    }

    #[instrument(skip(self, key), fields(product_id = %product_id, key = %key), err)]
    async fn create_variant(
        &self,
        product_id: ProductId,
        key: &CombinationKey,
    ) -> Result<Variant, StoreError> {
        let variant = Variant::new(product_id, key.clone(), Utc::now());

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("create_variant", e))?;

        sqlx::query(
            r#"
            INSERT INTO product_variants
                (id, product_id, combination_key, is_available, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $5)
            "#,
        )
        .bind(variant.id.as_uuid())
        .bind(product_id.as_uuid())
        .bind(key.to_string())
        .bind(variant.is_available)
        .bind(variant.created_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("create_variant", e))?;

        for pair in key.pairs() {
            sqlx::query(
                r#"
                INSERT INTO product_variant_values (variant_id, option_id, value_id)
                VALUES ($1, $2, $3)
                "#,
            )
            .bind(variant.id.as_uuid())
            .bind(pair.option_id.as_uuid())
            .bind(pair.value_id.as_uuid())
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("create_variant_values", e))?;
        }

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("create_variant", e))?;
        Ok(variant)
    }

    #[instrument(skip(self), fields(variant_id = %variant_id), err)]
    async fn update_variant_availability(
        &self,
        variant_id: VariantId,
        is_available: bool,
    ) -> Result<(), StoreError> {
        let result = sqlx::query(
            "UPDATE product_variants SET is_available = $2, updated_at = now() WHERE id = $1",
        )
        .bind(variant_id.as_uuid())
        .bind(is_available)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("update_variant_availability", e))?;
        if result.rows_affected() == 0 {
            return Err(StoreError::not_found("variant", variant_id));
        }
        Ok(())
    }

    #[instrument(skip(self, details), fields(variant_id = %variant_id), err)]
    async fn update_variant_details(
        &self,
        variant_id: VariantId,
        details: &VariantDetails,
    ) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE product_variants
            SET sku = $2, price = $3, image_ref = $4, updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(variant_id.as_uuid())
        .bind(details.sku.as_deref())
        .bind(price_to_db(details.price)?)
        .bind(details.image_ref.as_deref())
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("update_variant_details", e))?;
        if result.rows_affected() == 0 {
            return Err(StoreError::not_found("variant", variant_id));
        }
        Ok(())
    }

    #[instrument(
        skip(self, variant_ids),
        fields(product_id = %product_id, count = variant_ids.len()),
        err
    )]
    async fn set_all_variants_availability(
        &self,
        product_id: ProductId,
        variant_ids: &[VariantId],
        is_available: bool,
    ) -> Result<usize, StoreError> {
        let ids: Vec<Uuid> = variant_ids.iter().map(|id| *id.as_uuid()).collect();
        let result = sqlx::query(
            r#"
            UPDATE product_variants
            SET is_available = $3, updated_at = now()
            WHERE product_id = $1 AND id = ANY($2)
            "#,
        )
        .bind(product_id.as_uuid())
        .bind(&ids)
        .bind(is_available)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("set_all_variants_availability", e))?;
        Ok(result.rows_affected() as usize)
    }

    #[instrument(skip(self), fields(variant_id = %variant_id), err)]
    async fn delete_variant(&self, variant_id: VariantId) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM product_variants WHERE id = $1")
            .bind(variant_id.as_uuid())
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("delete_variant", e))?;
        if result.rows_affected() == 0 {
            return Err(StoreError::not_found("variant", variant_id));
        }
        Ok(())
    }
}
