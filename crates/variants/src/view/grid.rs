//! Two-axis grid projection.
//!
//! The first two options that have values become the row and column axes. With more
//! options a single `(row, column)` cell would stand for several combinations, so the
//! projection requires a fixed value for every remaining option and refuses otherwise.

use std::collections::{BTreeMap, HashMap};

use serde::Serialize;
use thiserror::Error;

use catalog_core::{OptionId, OptionValueId, VariantId};

use crate::combination::{CombinationKey, OptionPair};
use crate::option::ProductOption;
use crate::reconcile::{ReconciledCombination, Reconciliation};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GridError {
    #[error("grid view needs at least two options with values (found {found})")]
    NotEnoughOptions { found: usize },

    #[error("grid view is ambiguous; choose a value for: {}", .unfixed.join(", "))]
    AmbiguousSlice { unfixed: Vec<String> },

    #[error("grid filter does not match the current options: {0}")]
    UnknownFilterValue(String),
}

/// Fixed values for the options beyond the two grid axes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GridFilter {
    fixed: BTreeMap<OptionId, OptionValueId>,
}

impl GridFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fix(mut self, option_id: OptionId, value_id: OptionValueId) -> Self {
        self.fixed.insert(option_id, value_id);
        self
    }

    pub fn get(&self, option_id: OptionId) -> Option<OptionValueId> {
        self.fixed.get(&option_id).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.fixed.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GridAxis {
    pub option_id: OptionId,
    pub option_name: String,
    pub values: Vec<(OptionValueId, String)>,
}

impl GridAxis {
    fn from_option(option: &ProductOption) -> Self {
        Self {
            option_id: option.id,
            option_name: option.name.clone(),
            values: option
                .values
                .iter()
                .map(|v| (v.id, v.text.clone()))
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GridCell {
    pub row: OptionValueId,
    pub column: OptionValueId,
    pub key: CombinationKey,
    pub variant_id: Option<VariantId>,
    pub is_available: bool,
}

impl GridCell {
    pub fn is_generated(&self) -> bool {
        self.variant_id.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GridView {
    pub rows: GridAxis,
    pub columns: GridAxis,
    /// `(option name, value text)` held fixed to produce this slice.
    pub fixed: Vec<(String, String)>,
    /// `cells[row][column]`, in axis order.
    pub cells: Vec<Vec<GridCell>>,
}

impl GridView {
    /// True when other options exist and this grid is one slice of them.
    pub fn is_slice(&self) -> bool {
        !self.fixed.is_empty()
    }

    pub fn cell(&self, row: OptionValueId, column: OptionValueId) -> Option<&GridCell> {
        let r = self.rows.values.iter().position(|(id, _)| *id == row)?;
        let c = self.columns.values.iter().position(|(id, _)| *id == column)?;
        self.cells.get(r)?.get(c)
    }
}

/// Project `reconciliation` onto the first two populated options.
pub fn project_grid(
    options: &[ProductOption],
    reconciliation: &Reconciliation,
    filter: &GridFilter,
) -> Result<GridView, GridError> {
    let populated: Vec<&ProductOption> = options.iter().filter(|o| o.has_values()).collect();
    let [row_option, column_option, rest @ ..] = populated.as_slice() else {
        return Err(GridError::NotEnoughOptions {
            found: populated.len(),
        });
    };

    for (option_id, value_id) in &filter.fixed {
        let Some(option) = rest.iter().find(|o| o.id == *option_id) else {
            return Err(GridError::UnknownFilterValue(format!(
                "option {option_id} is not an option outside the grid axes"
            )));
        };
        if option.value(*value_id).is_none() {
            return Err(GridError::UnknownFilterValue(format!(
                "value {value_id} does not belong to option '{}'",
                option.name
            )));
        }
    }

    let unfixed: Vec<String> = rest
        .iter()
        .filter(|o| filter.get(o.id).is_none())
        .map(|o| o.name.clone())
        .collect();
    if !unfixed.is_empty() {
        return Err(GridError::AmbiguousSlice { unfixed });
    }

    let mut fixed_pairs = Vec::with_capacity(rest.len());
    let mut fixed = Vec::with_capacity(rest.len());
    for option in rest {
        if let Some(value) = filter.get(option.id).and_then(|id| option.value(id)) {
            fixed_pairs.push(OptionPair::new(option.id, value.id));
            fixed.push((option.name.clone(), value.text.clone()));
        }
    }

    let by_key: HashMap<&CombinationKey, &ReconciledCombination> = reconciliation
        .combinations
        .iter()
        .map(|c| (c.key(), c))
        .collect();

    let cells = row_option
        .values
        .iter()
        .map(|row| {
            column_option
                .values
                .iter()
                .map(|column| {
                    let key = CombinationKey::new(
                        [
                            OptionPair::new(row_option.id, row.id),
                            OptionPair::new(column_option.id, column.id),
                        ]
                        .into_iter()
                        .chain(fixed_pairs.iter().copied()),
                    );
                    let linked = by_key.get(&key);
                    GridCell {
                        row: row.id,
                        column: column.id,
                        variant_id: linked.and_then(|c| c.variant_id()),
                        is_available: linked.is_some_and(|c| c.is_available),
                        key,
                    }
                })
                .collect()
        })
        .collect();

    Ok(GridView {
        rows: GridAxis::from_option(row_option),
        columns: GridAxis::from_option(column_option),
        fixed,
        cells,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::option::OptionValue;
    use crate::reconcile::reconcile_snapshot;
    use crate::variant::Variant;
    use catalog_core::ProductId;
    use chrono::Utc;

    fn option(product_id: ProductId, name: &str, position: i32, values: &[&str]) -> ProductOption {
        let id = OptionId::new();
        ProductOption {
            id,
            product_id,
            name: name.to_string(),
            position,
            values: values
                .iter()
                .enumerate()
                .map(|(idx, text)| OptionValue {
                    id: OptionValueId::new(),
                    option_id: id,
                    text: text.to_string(),
                    position: idx as i32,
                })
                .collect(),
        }
    }

    fn size_color(product_id: ProductId) -> Vec<ProductOption> {
        vec![
            option(product_id, "Size", 0, &["S", "M"]),
            option(product_id, "Color", 1, &["Red", "Blue", "Green"]),
        ]
    }

    #[test]
    fn cells_align_with_axes() {
        let product_id = ProductId::new();
        let options = size_color(product_id);
        let empty = reconcile_snapshot(&options, &[]);

        let target = empty
            .combinations
            .iter()
            .find(|c| c.label() == "M / Green")
            .unwrap();
        let mut variant = Variant::new(product_id, target.key().clone(), Utc::now());
        variant.is_available = true;

        let reconciliation = reconcile_snapshot(&options, &[variant.clone()]);
        let grid = project_grid(&options, &reconciliation, &GridFilter::new()).unwrap();

        assert_eq!(grid.rows.option_name, "Size");
        assert_eq!(grid.columns.option_name, "Color");
        assert_eq!(grid.cells.len(), 2);
        assert!(grid.cells.iter().all(|row| row.len() == 3));
        assert!(!grid.is_slice());

        let m = options[0].values[1].id;
        let green = options[1].values[2].id;
        let cell = grid.cell(m, green).unwrap();
        assert_eq!(cell.variant_id, Some(variant.id));
        assert!(cell.is_available);
        assert_eq!(
            grid.cells.iter().flatten().filter(|c| c.is_generated()).count(),
            1
        );
    }

    #[test]
    fn fewer_than_two_populated_options_is_rejected() {
        let product_id = ProductId::new();
        let options = vec![
            option(product_id, "Size", 0, &["S"]),
            option(product_id, "Color", 1, &[]),
        ];
        let reconciliation = reconcile_snapshot(&options, &[]);
        assert_eq!(
            project_grid(&options, &reconciliation, &GridFilter::new()),
            Err(GridError::NotEnoughOptions { found: 1 })
        );
    }

    #[test]
    fn third_option_requires_a_fixed_value() {
        let product_id = ProductId::new();
        let mut options = size_color(product_id);
        options.push(option(product_id, "Material", 2, &["Cotton", "Linen"]));
        let reconciliation = reconcile_snapshot(&options, &[]);

        let err = project_grid(&options, &reconciliation, &GridFilter::new()).unwrap_err();
        assert_eq!(
            err,
            GridError::AmbiguousSlice {
                unfixed: vec!["Material".to_string()]
            }
        );
        assert!(err.to_string().contains("Material"));

        let linen = options[2].values[1].id;
        let filter = GridFilter::new().fix(options[2].id, linen);
        let grid = project_grid(&options, &reconciliation, &filter).unwrap();
        assert!(grid.is_slice());
        assert_eq!(grid.fixed, vec![("Material".to_string(), "Linen".to_string())]);
        assert!(grid.cells.iter().flatten().all(|c| c.key.len() == 3));
        assert!(
            grid.cells
                .iter()
                .flatten()
                .all(|c| reconciliation.find(&c.key).is_some())
        );
    }

    #[test]
    fn filter_must_name_a_non_axis_option_and_its_own_value() {
        let product_id = ProductId::new();
        let mut options = size_color(product_id);
        options.push(option(product_id, "Material", 2, &["Cotton"]));
        let reconciliation = reconcile_snapshot(&options, &[]);

        let on_axis = GridFilter::new().fix(options[0].id, options[0].values[0].id);
        assert!(matches!(
            project_grid(&options, &reconciliation, &on_axis),
            Err(GridError::UnknownFilterValue(_))
        ));

        let wrong_value = GridFilter::new().fix(options[2].id, options[1].values[0].id);
        assert!(matches!(
            project_grid(&options, &reconciliation, &wrong_value),
            Err(GridError::UnknownFilterValue(_))
        ));
    }
}
