//! Entity trait: identity + continuity across state changes.

/// Entity marker + minimal interface.
///
/// Options, option values and variants are entities: two records with the same
/// identifier are the same record even when their display text, position or
/// editable fields differ.
pub trait Entity {
    /// Strongly-typed entity identifier.
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug;

    /// Returns the entity identifier.
    fn id(&self) -> &Self::Id;
}
