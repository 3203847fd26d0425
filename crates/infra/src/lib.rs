//! Infrastructure layer: variant storage, configuration and the editing session.

pub mod batch;
pub mod config;
pub mod editor;
pub mod snapshot;
pub mod store;

mod integration_tests;

pub use batch::{BatchFailure, BatchItem, BatchOperation, BatchReport, Notice, NoticeLevel};
pub use config::{CatalogConfig, EditorConfig, OrphanPolicy};
pub use editor::{BulkAvailabilityOutcome, EditorError, VariantEditor};
pub use snapshot::{ProductSnapshot, import_snapshot};
pub use store::{InMemoryVariantStore, PostgresVariantStore, StoreError, VariantStore};
