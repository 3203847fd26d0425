//! Persisted variants: one realized combination plus operator-editable fields.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use catalog_core::{Entity, ProductId, VariantId};

use crate::combination::{CombinationKey, OptionPair};

/// SKU, price override and image reference.
///
/// Edited as one unit, independently of availability. Never part of identity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariantDetails {
    pub sku: Option<String>,
    /// Price override in smallest currency unit (e.g. cents).
    pub price: Option<u64>,
    pub image_ref: Option<String>,
}

impl VariantDetails {
    /// Trim text fields; blank text is treated as "not set".
    pub fn normalized(self) -> Self {
        Self {
            sku: blank_to_none(self.sku),
            price: self.price,
            image_ref: blank_to_none(self.image_ref),
        }
    }
}

fn blank_to_none(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// A persisted variant.
///
/// Created only through materialization of a generated combination; its key is never
/// rewritten afterwards, so a variant whose option or value is later deleted keeps its
/// original pairs and becomes an orphan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Variant {
    pub id: VariantId,
    pub product_id: ProductId,
    pub key: CombinationKey,
    #[serde(default)]
    pub is_available: bool,
    #[serde(default)]
    pub details: VariantDetails,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Entity for Variant {
    type Id = VariantId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

impl Variant {
    /// A fresh, unavailable variant for `key`.
    pub fn new(product_id: ProductId, key: CombinationKey, now: DateTime<Utc>) -> Self {
        Self {
            id: VariantId::new(),
            product_id,
            key,
            is_available: false,
            details: VariantDetails::default(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn key(&self) -> &CombinationKey {
        &self.key
    }

    pub fn pairs(&self) -> &[OptionPair] {
        self.key.pairs()
    }
}
