//! Presentation projections over a [`crate::Reconciliation`].
//!
//! Both views are pure functions of the reconciled set; neither keeps state of its
//! own nor repeats any matching logic.

pub mod grid;
pub mod list;

pub use grid::{GridAxis, GridCell, GridError, GridFilter, GridView, project_grid};
pub use list::{ListRow, ListView, RowStatus, project_list};
