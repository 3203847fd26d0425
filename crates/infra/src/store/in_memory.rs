use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::Utc;

use catalog_core::{OptionId, OptionValueId, ProductId, VariantId};
use catalog_variants::option::{next_option_position, normalize_options};
use catalog_variants::{CombinationKey, OptionValue, ProductOption, Variant, VariantDetails};

use super::r#trait::{StoreError, VariantStore};

#[derive(Debug, Default)]
struct State {
    options: HashMap<OptionId, ProductOption>,
    variants: HashMap<VariantId, Variant>,
}

impl State {
    fn product_options(&self, product_id: ProductId) -> Vec<ProductOption> {
        self.options
            .values()
            .filter(|o| o.product_id == product_id)
            .cloned()
            .collect()
    }

    fn option_of_value(&mut self, value_id: OptionValueId) -> Option<&mut ProductOption> {
        self.options
            .values_mut()
            .find(|o| o.values.iter().any(|v| v.id == value_id))
    }
}

/// In-memory variant store.
///
/// Intended for tests/dev. Not optimized for performance.
#[derive(Debug, Default)]
pub struct InMemoryVariantStore {
    state: RwLock<State>,
}

impl InMemoryVariantStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, State>, StoreError> {
        self.state
            .read()
            .map_err(|_| StoreError::Backend("lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, State>, StoreError> {
        self.state
            .write()
            .map_err(|_| StoreError::Backend("lock poisoned".to_string()))
    }
}

#[async_trait::async_trait]
impl VariantStore for InMemoryVariantStore {
    async fn load_options(&self, product_id: ProductId) -> Result<Vec<ProductOption>, StoreError> {
        let state = self.read()?;
        Ok(normalize_options(state.product_options(product_id)))
    }

    async fn create_option(
        &self,
        product_id: ProductId,
        name: &str,
    ) -> Result<ProductOption, StoreError> {
        let mut state = self.write()?;
        let position = next_option_position(&state.product_options(product_id));
        let option = ProductOption {
            id: OptionId::new(),
            product_id,
            name: name.to_string(),
            position,
            values: Vec::new(),
        };
        state.options.insert(option.id, option.clone());
        Ok(option)
    }

    async fn delete_option(&self, option_id: OptionId) -> Result<(), StoreError> {
        let mut state = self.write()?;
        state
            .options
            .remove(&option_id)
            .map(|_| ())
            .ok_or_else(|| StoreError::not_found("option", option_id))
    }

    async fn create_option_value(
        &self,
        option_id: OptionId,
        text: &str,
    ) -> Result<OptionValue, StoreError> {
        let mut state = self.write()?;
        let option = state
            .options
            .get_mut(&option_id)
            .ok_or_else(|| StoreError::not_found("option", option_id))?;
        let value = OptionValue {
            id: OptionValueId::new(),
            option_id,
            text: text.to_string(),
            position: option.next_value_position(),
        };
        option.values.push(value.clone());
        Ok(value)
    }

    async fn delete_option_value(&self, value_id: OptionValueId) -> Result<(), StoreError> {
        let mut state = self.write()?;
        let option = state
            .option_of_value(value_id)
            .ok_or_else(|| StoreError::not_found("option value", value_id))?;
        option.values.retain(|v| v.id != value_id);
        Ok(())
    }

    async fn set_option_positions(
        &self,
        product_id: ProductId,
        positions: &[(OptionId, i32)],
    ) -> Result<(), StoreError> {
        let mut state = self.write()?;
        // Validate everything before touching anything.
        for (option_id, _) in positions {
            match state.options.get(option_id) {
                Some(o) if o.product_id == product_id => {}
                _ => return Err(StoreError::not_found("option", option_id)),
            }
        }
        for (option_id, position) in positions {
            if let Some(option) = state.options.get_mut(option_id) {
                option.position = *position;
            }
        }
        Ok(())
    }

    async fn set_value_positions(
        &self,
        option_id: OptionId,
        positions: &[(OptionValueId, i32)],
    ) -> Result<(), StoreError> {
        let mut state = self.write()?;
        let option = state
            .options
            .get_mut(&option_id)
            .ok_or_else(|| StoreError::not_found("option", option_id))?;
        if let Some((missing, _)) = positions
            .iter()
            .find(|(id, _)| option.value(*id).is_none())
        {
            return Err(StoreError::not_found("option value", missing));
        }
        for value in &mut option.values {
            if let Some((_, position)) = positions.iter().find(|(id, _)| *id == value.id) {
                value.position = *position;
            }
        }
        Ok(())
    }

    async fn load_variants(&self, product_id: ProductId) -> Result<Vec<Variant>, StoreError> {
        let state = self.read()?;
        let mut variants: Vec<Variant> = state
            .variants
            .values()
            .filter(|v| v.product_id == product_id)
            .cloned()
            .collect();
        variants.sort_by_key(|v| (v.created_at, v.id));
        Ok(variants)
    }

    async fn create_variant(
        &self,
        product_id: ProductId,
        key: &CombinationKey,
    ) -> Result<Variant, StoreError> {
        let mut state = self.write()?;
        if state
            .variants
            .values()
            .any(|v| v.product_id == product_id && v.key() == key)
        {
            return Err(StoreError::Conflict(format!(
                "variant already exists for combination {key}"
            )));
        }
        let variant = Variant::new(product_id, key.clone(), Utc::now());
        state.variants.insert(variant.id, variant.clone());
        Ok(variant)
    }

    async fn update_variant_availability(
        &self,
        variant_id: VariantId,
        is_available: bool,
    ) -> Result<(), StoreError> {
        let mut state = self.write()?;
        let variant = state
            .variants
            .get_mut(&variant_id)
            .ok_or_else(|| StoreError::not_found("variant", variant_id))?;
        variant.is_available = is_available;
        variant.updated_at = Utc::now();
        Ok(())
    }

    async fn update_variant_details(
        &self,
        variant_id: VariantId,
        details: &VariantDetails,
    ) -> Result<(), StoreError> {
        let mut state = self.write()?;
        let variant = state
            .variants
            .get_mut(&variant_id)
            .ok_or_else(|| StoreError::not_found("variant", variant_id))?;
        variant.details = details.clone();
        variant.updated_at = Utc::now();
        Ok(())
    }

    async fn delete_variant(&self, variant_id: VariantId) -> Result<(), StoreError> {
        let mut state = self.write()?;
        state
            .variants
            .remove(&variant_id)
            .map(|_| ())
            .ok_or_else(|| StoreError::not_found("variant", variant_id))
    }
}
