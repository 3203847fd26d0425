//! JSON product snapshots for seeding a store (dev tooling and the CLI).
//!
//! ```json
//! {
//!   "options": [
//!     { "name": "Size", "values": ["S", "M"] },
//!     { "name": "Color", "values": ["Red", "Blue"] }
//!   ],
//!   "variants": [
//!     { "values": { "Size": "S", "Color": "Red" }, "is_available": true, "sku": "TEE-S-RED" }
//!   ]
//! }
//! ```
//!
//! Variants are matched to options by name and to values by text. A name or text that
//! does not exist in `options` still produces a variant, paired with fresh ids, so it
//! shows up as an orphan with integrity warnings.

use std::collections::{BTreeMap, HashMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::info;

use catalog_core::{DomainError, DomainResult, OptionId, OptionValueId, ProductId};
use catalog_variants::option::{validate_option_name, validate_value_text};
use catalog_variants::{CombinationKey, OptionPair, VariantDetails};

use crate::store::{StoreError, VariantStore};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductSnapshot {
    /// Generated when absent.
    #[serde(default)]
    pub product_id: Option<ProductId>,
    #[serde(default)]
    pub options: Vec<OptionSnapshot>,
    #[serde(default)]
    pub variants: Vec<VariantSnapshot>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionSnapshot {
    pub name: String,
    #[serde(default)]
    pub values: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariantSnapshot {
    /// Option name to value text.
    pub values: BTreeMap<String, String>,
    #[serde(default)]
    pub is_available: bool,
    #[serde(default)]
    pub sku: Option<String>,
    #[serde(default)]
    pub price: Option<u64>,
    #[serde(default)]
    pub image_ref: Option<String>,
}

impl VariantSnapshot {
    fn details(&self) -> VariantDetails {
        VariantDetails {
            sku: self.sku.clone(),
            price: self.price,
            image_ref: self.image_ref.clone(),
        }
        .normalized()
    }
}

impl ProductSnapshot {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Option names must be non-empty and unique per product (case-insensitive), and
    /// value texts non-empty.
    pub fn validate(&self) -> DomainResult<()> {
        let mut seen = HashSet::new();
        for option in &self.options {
            let name = validate_option_name(&option.name)?;
            if !seen.insert(name.to_lowercase()) {
                return Err(DomainError::conflict(format!(
                    "option '{name}' appears more than once"
                )));
            }
            for text in &option.values {
                validate_value_text(text)?;
            }
        }
        Ok(())
    }
}

/// Write `snapshot` into `store` and return the product id it was stored under.
///
/// The snapshot is validated before anything is written.
pub async fn import_snapshot<S>(
    store: &S,
    snapshot: &ProductSnapshot,
) -> Result<ProductId, StoreError>
where
    S: VariantStore + ?Sized,
{
    snapshot
        .validate()
        .map_err(|e| StoreError::Validation(e.to_string()))?;
    let product_id = snapshot.product_id.unwrap_or_default();

    let mut option_ids: HashMap<&str, OptionId> = HashMap::new();
    let mut value_ids: HashMap<(OptionId, &str), OptionValueId> = HashMap::new();
    for option in &snapshot.options {
        let created = store.create_option(product_id, option.name.trim()).await?;
        option_ids.insert(option.name.trim(), created.id);
        for text in &option.values {
            let value = store.create_option_value(created.id, text.trim()).await?;
            value_ids.entry((created.id, text.trim())).or_insert(value.id);
        }
    }

    for variant in &snapshot.variants {
        let pairs = variant.values.iter().map(|(name, text)| {
            let option_id = option_ids
                .get(name.trim())
                .copied()
                .unwrap_or_else(OptionId::new);
            let value_id = value_ids
                .get(&(option_id, text.trim()))
                .copied()
                .unwrap_or_else(OptionValueId::new);
            OptionPair::new(option_id, value_id)
        });
        let key = CombinationKey::new(pairs);

        let created = store.create_variant(product_id, &key).await?;
        let details = variant.details();
        if details != VariantDetails::default() {
            store.update_variant_details(created.id, &details).await?;
        }
        if variant.is_available {
            store.update_variant_availability(created.id, true).await?;
        }
    }

    info!(
        %product_id,
        options = snapshot.options.len(),
        variants = snapshot.variants.len(),
        "snapshot imported"
    );
    Ok(product_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryVariantStore;
    use catalog_variants::{IntegrityWarning, normalize_options, reconcile_snapshot};

    const TEE: &str = r#"{
        "options": [
            { "name": "Size", "values": ["S", "M"] },
            { "name": "Color", "values": ["Red", "Blue"] }
        ],
        "variants": [
            { "values": { "Size": "S", "Color": "Red" }, "is_available": true, "sku": "TEE-S-RED", "price": 1999 },
            { "values": { "Size": "M", "Color": "Blue" } },
            { "values": { "Size": "M", "Fabric": "Wool" } }
        ]
    }"#;

    #[tokio::test]
    async fn import_links_variants_by_name_and_text() {
        let snapshot = ProductSnapshot::from_json(TEE).unwrap();
        let store = InMemoryVariantStore::new();
        let product_id = import_snapshot(&store, &snapshot).await.unwrap();

        let options = normalize_options(store.load_options(product_id).await.unwrap());
        let variants = store.load_variants(product_id).await.unwrap();
        assert_eq!(options.len(), 2);
        assert_eq!(variants.len(), 3);

        let reconciliation = reconcile_snapshot(&options, &variants);
        assert_eq!(reconciliation.matched().count(), 2);
        assert_eq!(reconciliation.available_count(), 1);
        assert_eq!(reconciliation.orphans.len(), 1);
        assert!(
            reconciliation
                .warnings
                .iter()
                .any(|w| matches!(w, IntegrityWarning::UnknownOption { .. }))
        );

        let s_red = reconciliation
            .combinations
            .iter()
            .find(|c| c.label() == "S / Red")
            .and_then(|c| c.variant.as_ref())
            .unwrap();
        assert_eq!(s_red.details.sku.as_deref(), Some("TEE-S-RED"));
        assert_eq!(s_red.details.price, Some(1999));
    }

    #[tokio::test]
    async fn explicit_product_id_is_kept() {
        let product_id = ProductId::new();
        let snapshot = ProductSnapshot {
            product_id: Some(product_id),
            ..ProductSnapshot::default()
        };
        let store = InMemoryVariantStore::new();
        assert_eq!(import_snapshot(&store, &snapshot).await.unwrap(), product_id);
    }

    #[tokio::test]
    async fn duplicate_option_names_are_rejected_before_writing() {
        let snapshot = ProductSnapshot::from_json(
            r#"{
                "options": [
                    { "name": "Size", "values": ["S"] },
                    { "name": " size ", "values": ["M"] }
                ]
            }"#,
        )
        .unwrap();
        assert!(matches!(snapshot.validate(), Err(DomainError::Conflict(_))));

        let store = InMemoryVariantStore::new();
        let product_id = ProductId::new();
        let snapshot = ProductSnapshot {
            product_id: Some(product_id),
            ..snapshot
        };
        assert!(matches!(
            import_snapshot(&store, &snapshot).await,
            Err(StoreError::Validation(_))
        ));
        assert!(store.load_options(product_id).await.unwrap().is_empty());
    }

    #[test]
    fn blank_names_and_values_are_rejected() {
        let blank_name = ProductSnapshot {
            options: vec![OptionSnapshot {
                name: "  ".to_string(),
                values: vec!["S".to_string()],
            }],
            ..ProductSnapshot::default()
        };
        assert!(matches!(blank_name.validate(), Err(DomainError::Validation(_))));

        let blank_value = ProductSnapshot {
            options: vec![OptionSnapshot {
                name: "Size".to_string(),
                values: vec![" ".to_string()],
            }],
            ..ProductSnapshot::default()
        };
        assert!(matches!(blank_value.validate(), Err(DomainError::Validation(_))));
    }

    #[test]
    fn malformed_json_is_an_error() {
        assert!(ProductSnapshot::from_json("{ \"options\": 3 }").is_err());
    }
}
