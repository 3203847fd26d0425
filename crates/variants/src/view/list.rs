//! Flat list projection: one row per generated combination.

use serde::Serialize;

use catalog_core::VariantId;

use crate::combination::CombinationKey;
use crate::reconcile::{ReconciledCombination, Reconciliation};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RowStatus {
    /// No variant has been generated for this combination yet.
    NotGenerated,
    Available,
    Unavailable,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ListRow {
    pub key: CombinationKey,
    pub label: String,
    /// `(option name, value text)` in option order.
    pub values: Vec<(String, String)>,
    pub status: RowStatus,
    pub variant_id: Option<VariantId>,
    pub sku: Option<String>,
    pub price: Option<u64>,
    pub image_ref: Option<String>,
}

impl ListRow {
    /// Availability and detail controls exist only for generated variants.
    pub fn is_editable(&self) -> bool {
        self.variant_id.is_some()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ListView {
    pub rows: Vec<ListRow>,
    pub generated: usize,
    pub available: usize,
    pub orphaned: usize,
}

impl ListView {
    pub fn total(&self) -> usize {
        self.rows.len()
    }

    pub fn not_generated(&self) -> usize {
        self.rows.len() - self.generated
    }
}

fn row(combination: &ReconciledCombination) -> ListRow {
    let status = match (&combination.variant, combination.is_available) {
        (None, _) => RowStatus::NotGenerated,
        (Some(_), true) => RowStatus::Available,
        (Some(_), false) => RowStatus::Unavailable,
    };
    let details = combination.variant.as_ref().map(|v| &v.details);

    ListRow {
        key: combination.key().clone(),
        label: combination.label(),
        values: combination
            .combination
            .entries()
            .iter()
            .map(|e| (e.option_name.clone(), e.value_text.clone()))
            .collect(),
        status,
        variant_id: combination.variant_id(),
        sku: details.and_then(|d| d.sku.clone()),
        price: details.and_then(|d| d.price),
        image_ref: details.and_then(|d| d.image_ref.clone()),
    }
}

/// Rows in generation order, plus summary counts.
pub fn project_list(reconciliation: &Reconciliation) -> ListView {
    let rows: Vec<ListRow> = reconciliation.combinations.iter().map(row).collect();
    ListView {
        generated: rows.iter().filter(|r| r.variant_id.is_some()).count(),
        available: rows
            .iter()
            .filter(|r| r.status == RowStatus::Available)
            .count(),
        orphaned: reconciliation.orphans.len(),
        rows,
    }
}
