//! Product options and their values.
//!
//! An option is an ordered, named axis of choice (e.g. "Size"); each of its values is
//! one discrete choice (e.g. "Large"). Identity is always by id: two values in the
//! same option may share display text.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use catalog_core::{DomainError, DomainResult, Entity, OptionId, OptionValueId, ProductId};

/// One discrete choice within an option.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionValue {
    pub id: OptionValueId,
    pub option_id: OptionId,
    pub text: String,
    pub position: i32,
}

/// A named axis of product configuration, carrying its materialized values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductOption {
    pub id: OptionId,
    pub product_id: ProductId,
    pub name: String,
    pub position: i32,
    #[serde(default)]
    pub values: Vec<OptionValue>,
}

impl Entity for OptionValue {
    type Id = OptionValueId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

impl Entity for ProductOption {
    type Id = OptionId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

impl ProductOption {
    pub fn value(&self, value_id: OptionValueId) -> Option<&OptionValue> {
        self.values.iter().find(|v| v.id == value_id)
    }

    pub fn has_values(&self) -> bool {
        !self.values.is_empty()
    }

    /// Position to assign to a value appended at the end of this option.
    pub fn next_value_position(&self) -> i32 {
        self.values.iter().map(|v| v.position + 1).max().unwrap_or(0)
    }
}

/// Sort options and their values by `(position, id)`.
///
/// Stored positions may have gaps or ties; the id tiebreak keeps generation
/// deterministic regardless of the order rows came back from storage.
pub fn normalize_options(mut options: Vec<ProductOption>) -> Vec<ProductOption> {
    options.sort_by_key(|o| (o.position, o.id));
    for option in &mut options {
        option.values.sort_by_key(|v| (v.position, v.id));
    }
    options
}

/// Position to assign to an option appended at the end of the product.
pub fn next_option_position(options: &[ProductOption]) -> i32 {
    options.iter().map(|o| o.position + 1).max().unwrap_or(0)
}

pub fn find_option(options: &[ProductOption], option_id: OptionId) -> Option<&ProductOption> {
    options.iter().find(|o| o.id == option_id)
}

/// Locate the option owning `value_id`.
pub fn find_value(
    options: &[ProductOption],
    value_id: OptionValueId,
) -> Option<(&ProductOption, &OptionValue)> {
    options
        .iter()
        .find_map(|o| o.value(value_id).map(|v| (o, v)))
}

/// Validate and trim an option name.
pub fn validate_option_name(name: &str) -> DomainResult<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(DomainError::validation("option name cannot be empty"));
    }
    Ok(trimmed.to_string())
}

/// Validate and trim the display text of an option value.
pub fn validate_value_text(text: &str) -> DomainResult<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(DomainError::validation("option value cannot be empty"));
    }
    Ok(trimmed.to_string())
}

/// Option names are unique per product (case-insensitive).
pub fn ensure_unique_option_name(options: &[ProductOption], name: &str) -> DomainResult<()> {
    let wanted = name.trim().to_lowercase();
    if options.iter().any(|o| o.name.trim().to_lowercase() == wanted) {
        return Err(DomainError::conflict(format!(
            "option '{}' already exists",
            name.trim()
        )));
    }
    Ok(())
}

/// Turn a requested ordering into dense `(id, position)` assignments.
///
/// `requested` must be a permutation of the ids of `current`: no duplicates, nothing
/// missing.
pub fn dense_positions<E>(current: &[E], requested: &[E::Id]) -> DomainResult<Vec<(E::Id, i32)>>
where
    E: Entity,
    E::Id: Copy + core::fmt::Display,
{
    if current.len() != requested.len() {
        return Err(DomainError::validation(format!(
            "reorder must list every entry exactly once (expected {}, got {})",
            current.len(),
            requested.len()
        )));
    }

    let known: HashSet<E::Id> = current.iter().map(|entity| *entity.id()).collect();
    let mut seen = HashSet::with_capacity(requested.len());
    for id in requested {
        if !known.contains(id) {
            return Err(DomainError::validation(format!("unknown entry in reorder: {id}")));
        }
        if !seen.insert(*id) {
            return Err(DomainError::validation(format!("duplicate entry in reorder: {id}")));
        }
    }

    Ok(requested
        .iter()
        .enumerate()
        .map(|(idx, id)| (*id, idx as i32))
        .collect())
}
