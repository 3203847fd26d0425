//! Operator actions expressed as persistence intents.
//!
//! Planners here decide *what* should be written; executing the intents against a
//! store (and re-reconciling afterwards) is the caller's job. Planning never touches
//! identity: only materialization creates variants, and it only ever creates them for
//! keys the generator produced.

use serde::Serialize;

use catalog_core::{DomainError, DomainResult, ProductId, VariantId};

use crate::combination::CombinationKey;
use crate::reconcile::ReconciledCombination;
use crate::variant::VariantDetails;

/// A single write the storage collaborator should perform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "intent", rename_all = "snake_case")]
pub enum VariantIntent {
    /// Materialize a variant for an unmatched combination.
    Create {
        product_id: ProductId,
        key: CombinationKey,
        label: String,
    },
    SetAvailability {
        variant_id: VariantId,
        is_available: bool,
        label: String,
    },
    UpdateDetails {
        variant_id: VariantId,
        details: VariantDetails,
        label: String,
    },
}

impl VariantIntent {
    /// Human label of the combination this intent affects.
    pub fn label(&self) -> &str {
        match self {
            VariantIntent::Create { label, .. }
            | VariantIntent::SetAvailability { label, .. }
            | VariantIntent::UpdateDetails { label, .. } => label,
        }
    }
}

fn linked_variant(combination: &ReconciledCombination, action: &str) -> DomainResult<VariantId> {
    combination.variant_id().ok_or_else(|| {
        DomainError::invariant(format!(
            "cannot {action} '{}': no variant has been generated for this combination",
            combination.label()
        ))
    })
}

/// One `Create` per unmatched combination; matched combinations are left alone.
///
/// Running this against a fully materialized reconciliation yields nothing, which is
/// what makes "generate variants" idempotent.
pub fn plan_materialization(
    product_id: ProductId,
    combinations: &[ReconciledCombination],
) -> Vec<VariantIntent> {
    combinations
        .iter()
        .filter(|c| !c.is_matched())
        .map(|c| VariantIntent::Create {
            product_id,
            key: c.key().clone(),
            label: c.label(),
        })
        .collect()
}

/// Flip availability of a matched combination.
///
/// Refused on an unmatched combination: there is nothing to toggle until the variant
/// is materialized.
pub fn plan_toggle(combination: &ReconciledCombination) -> DomainResult<VariantIntent> {
    let variant_id = linked_variant(combination, "toggle availability of")?;
    Ok(VariantIntent::SetAvailability {
        variant_id,
        is_available: !combination.is_available,
        label: combination.label(),
    })
}

/// Replace SKU, price override and image reference of a matched combination.
pub fn plan_details(
    combination: &ReconciledCombination,
    details: VariantDetails,
) -> DomainResult<VariantIntent> {
    let variant_id = linked_variant(combination, "edit details of")?;
    Ok(VariantIntent::UpdateDetails {
        variant_id,
        details: details.normalized(),
        label: combination.label(),
    })
}

/// Set availability on every matched combination whose flag differs from the target.
///
/// Unmatched combinations are skipped; materializing them first is a separate,
/// explicit step.
pub fn plan_bulk_availability(
    combinations: &[ReconciledCombination],
    is_available: bool,
) -> Vec<VariantIntent> {
    combinations
        .iter()
        .filter_map(|c| {
            let variant_id = c.variant_id()?;
            (c.is_available != is_available).then(|| VariantIntent::SetAvailability {
                variant_id,
                is_available,
                label: c.label(),
            })
        })
        .collect()
}
