//! Storage collaborator boundary for options, values and variants.
//!
//! The engine holds no durable state; everything persisted lives behind
//! [`VariantStore`]. Implementations are scoped per product: nothing is shared across
//! products.

pub mod in_memory;
pub mod postgres;
pub mod r#trait;

pub use in_memory::InMemoryVariantStore;
pub use postgres::PostgresVariantStore;
pub use r#trait::{StoreError, VariantStore};
