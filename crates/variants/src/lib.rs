//! Option/variant combination engine.
//!
//! This crate derives every combination of a product's option values, reconciles that
//! derived set against the variants already persisted for the product, and plans the
//! operator's writes (materialize, toggle availability, edit details). It is implemented
//! purely as deterministic domain logic (no IO, no storage); executing the plans is left
//! to a storage collaborator.

pub mod combination;
pub mod intent;
pub mod limits;
pub mod option;
pub mod reconcile;
pub mod variant;
pub mod view;

pub use combination::{
    Combination, CombinationEntry, CombinationKey, OptionPair, combination_count, describe_key,
    generate,
};
pub use intent::{
    VariantIntent, plan_bulk_availability, plan_details, plan_materialization, plan_toggle,
};
pub use limits::{CombinationLimits, LimitCheck};
pub use option::{OptionValue, ProductOption, normalize_options};
pub use reconcile::{
    IntegrityWarning, ReconciledCombination, Reconciliation, audit_variants, matches, reconcile,
    reconcile_snapshot,
};
pub use variant::{Variant, VariantDetails};
