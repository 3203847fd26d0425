use std::sync::Arc;

use thiserror::Error;
use tracing::debug;

use catalog_core::{OptionId, OptionValueId, ProductId, VariantId};
use catalog_variants::{CombinationKey, OptionValue, ProductOption, Variant, VariantDetails};

/// Storage operation error.
///
/// These are **infrastructure errors** as opposed to domain errors (validation,
/// invariants). Every one of them is local to the row being written and can be retried
/// on its own.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// A uniqueness constraint was hit (e.g. a second variant for the same combination).
    #[error("conflict: {0}")]
    Conflict(String),

    #[error("invalid data: {0}")]
    Validation(String),

    #[error("storage backend error: {0}")]
    Backend(String),
}

impl StoreError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }
}

/// Request/response persistence for one product's options, values and variants.
///
/// ## Semantics
///
/// - `load_options` returns options with their values nested, both sorted by position.
/// - `create_option`/`create_option_value` append at the end (next free position).
/// - Deleting an option deletes its values. Variants are never touched by option or
///   value deletion: they keep their original pairs and surface as orphans.
/// - `create_variant` must reject a second variant with the same key for the same
///   product ([`StoreError::Conflict`]).
/// - `set_all_variants_availability` is scoped to the ids given (the matched variants),
///   never to every row of the product.
#[async_trait::async_trait]
pub trait VariantStore: Send + Sync {
    async fn load_options(&self, product_id: ProductId) -> Result<Vec<ProductOption>, StoreError>;

    async fn create_option(
        &self,
        product_id: ProductId,
        name: &str,
    ) -> Result<ProductOption, StoreError>;

    async fn delete_option(&self, option_id: OptionId) -> Result<(), StoreError>;

    async fn create_option_value(
        &self,
        option_id: OptionId,
        text: &str,
    ) -> Result<OptionValue, StoreError>;

    async fn delete_option_value(&self, value_id: OptionValueId) -> Result<(), StoreError>;

    /// Rewrite option positions for a product.
    async fn set_option_positions(
        &self,
        product_id: ProductId,
        positions: &[(OptionId, i32)],
    ) -> Result<(), StoreError>;

    /// Rewrite value positions within an option.
    async fn set_value_positions(
        &self,
        option_id: OptionId,
        positions: &[(OptionValueId, i32)],
    ) -> Result<(), StoreError>;

    async fn load_variants(&self, product_id: ProductId) -> Result<Vec<Variant>, StoreError>;

    async fn create_variant(
        &self,
        product_id: ProductId,
        key: &CombinationKey,
    ) -> Result<Variant, StoreError>;

    async fn update_variant_availability(
        &self,
        variant_id: VariantId,
        is_available: bool,
    ) -> Result<(), StoreError>;

    async fn update_variant_details(
        &self,
        variant_id: VariantId,
        details: &VariantDetails,
    ) -> Result<(), StoreError>;

    /// Bulk availability update. Returns the number of rows updated.
    ///
    /// The default issues one `update_variant_availability` per id and stops at the
    /// first failure; backends with a set-based update should override it.
    async fn set_all_variants_availability(
        &self,
        product_id: ProductId,
        variant_ids: &[VariantId],
        is_available: bool,
    ) -> Result<usize, StoreError> {
        debug!(%product_id, count = variant_ids.len(), is_available, "bulk availability update");
        for id in variant_ids {
            self.update_variant_availability(*id, is_available).await?;
        }
        Ok(variant_ids.len())
    }

    async fn delete_variant(&self, variant_id: VariantId) -> Result<(), StoreError>;
}

#[async_trait::async_trait]
impl<S> VariantStore for Arc<S>
where
    S: VariantStore + ?Sized,
{
    async fn load_options(&self, product_id: ProductId) -> Result<Vec<ProductOption>, StoreError> {
        (**self).load_options(product_id).await
    }

    async fn create_option(
        &self,
        product_id: ProductId,
        name: &str,
    ) -> Result<ProductOption, StoreError> {
        (**self).create_option(product_id, name).await
    }

    async fn delete_option(&self, option_id: OptionId) -> Result<(), StoreError> {
        (**self).delete_option(option_id).await
    }

    async fn create_option_value(
        &self,
        option_id: OptionId,
        text: &str,
    ) -> Result<OptionValue, StoreError> {
        (**self).create_option_value(option_id, text).await
    }

    async fn delete_option_value(&self, value_id: OptionValueId) -> Result<(), StoreError> {
        (**self).delete_option_value(value_id).await
    }

    async fn set_option_positions(
        &self,
        product_id: ProductId,
        positions: &[(OptionId, i32)],
    ) -> Result<(), StoreError> {
        (**self).set_option_positions(product_id, positions).await
    }

    async fn set_value_positions(
        &self,
        option_id: OptionId,
        positions: &[(OptionValueId, i32)],
    ) -> Result<(), StoreError> {
        (**self).set_value_positions(option_id, positions).await
    }

    async fn load_variants(&self, product_id: ProductId) -> Result<Vec<Variant>, StoreError> {
        (**self).load_variants(product_id).await
    }

    async fn create_variant(
        &self,
        product_id: ProductId,
        key: &CombinationKey,
    ) -> Result<Variant, StoreError> {
        (**self).create_variant(product_id, key).await
    }

    async fn update_variant_availability(
        &self,
        variant_id: VariantId,
        is_available: bool,
    ) -> Result<(), StoreError> {
        (**self).update_variant_availability(variant_id, is_available).await
    }

    async fn update_variant_details(
        &self,
        variant_id: VariantId,
        details: &VariantDetails,
    ) -> Result<(), StoreError> {
        (**self).update_variant_details(variant_id, details).await
    }

    async fn set_all_variants_availability(
        &self,
        product_id: ProductId,
        variant_ids: &[VariantId],
        is_available: bool,
    ) -> Result<usize, StoreError> {
        (**self)
            .set_all_variants_availability(product_id, variant_ids, is_available)
            .await
    }

    async fn delete_variant(&self, variant_id: VariantId) -> Result<(), StoreError> {
        (**self).delete_variant(variant_id).await
    }
}
