//! Matching generated combinations against persisted variants.
//!
//! Reconciliation is a pure function of `(combinations, variants)`:
//! - a combination is **matched** when exactly one persisted variant carries the same
//!   key (same pairs as a set, same pair count);
//! - a combination with no such variant is **unmatched** and is a candidate for
//!   materialization;
//! - a persisted variant matching no combination is an **orphan**. Orphans are not part
//!   of the reconciled list; they are reported separately so the caller can decide what
//!   to do with them.

use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};

use serde::Serialize;

use catalog_core::{OptionId, OptionValueId, VariantId};

use crate::combination::{Combination, CombinationKey, generate};
use crate::option::{ProductOption, find_option, find_value};
use crate::variant::Variant;

/// A generated combination plus its link to a persisted variant, if any.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReconciledCombination {
    pub combination: Combination,
    pub variant: Option<Variant>,
    /// Mirrors the linked variant; always `false` when unmatched.
    pub is_available: bool,
}

impl ReconciledCombination {
    pub fn is_matched(&self) -> bool {
        self.variant.is_some()
    }

    pub fn variant_id(&self) -> Option<VariantId> {
        self.variant.as_ref().map(|v| v.id)
    }

    pub fn key(&self) -> &CombinationKey {
        self.combination.key()
    }

    pub fn label(&self) -> String {
        self.combination.label()
    }
}

/// Data-integrity findings about persisted variants.
///
/// None of these abort reconciliation; the affected variants simply stay unmatched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum IntegrityWarning {
    /// A pair names an option that no longer exists.
    UnknownOption {
        variant_id: VariantId,
        option_id: OptionId,
    },
    /// A pair names a value that no longer exists.
    UnknownValue {
        variant_id: VariantId,
        option_id: OptionId,
        value_id: OptionValueId,
    },
    /// A pair's value belongs to a different option than the one it is paired with.
    ForeignValue {
        variant_id: VariantId,
        option_id: OptionId,
        value_id: OptionValueId,
        owner_id: OptionId,
    },
    /// The same option appears more than once in a variant's pairs.
    DuplicateOption {
        variant_id: VariantId,
        option_id: OptionId,
    },
    /// Two persisted variants share a key; `kept` is the one linked.
    DuplicateVariant {
        variant_id: VariantId,
        kept: VariantId,
    },
}

impl IntegrityWarning {
    pub fn variant_id(&self) -> VariantId {
        match self {
            IntegrityWarning::UnknownOption { variant_id, .. }
            | IntegrityWarning::UnknownValue { variant_id, .. }
            | IntegrityWarning::ForeignValue { variant_id, .. }
            | IntegrityWarning::DuplicateOption { variant_id, .. }
            | IntegrityWarning::DuplicateVariant { variant_id, .. } => *variant_id,
        }
    }
}

impl core::fmt::Display for IntegrityWarning {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            IntegrityWarning::UnknownOption {
                variant_id,
                option_id,
            } => write!(f, "variant {variant_id} references unknown option {option_id}"),
            IntegrityWarning::UnknownValue {
                variant_id,
                option_id,
                value_id,
            } => write!(
                f,
                "variant {variant_id} references unknown value {value_id} of option {option_id}"
            ),
            IntegrityWarning::ForeignValue {
                variant_id,
                option_id,
                value_id,
                owner_id,
            } => write!(
                f,
                "variant {variant_id} pairs option {option_id} with value {value_id} owned by option {owner_id}"
            ),
            IntegrityWarning::DuplicateOption {
                variant_id,
                option_id,
            } => write!(f, "variant {variant_id} lists option {option_id} more than once"),
            IntegrityWarning::DuplicateVariant { variant_id, kept } => {
                write!(f, "variant {variant_id} duplicates the key of variant {kept}")
            }
        }
    }
}

/// Result of one reconciliation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Reconciliation {
    /// One entry per generated combination, in generation order.
    pub combinations: Vec<ReconciledCombination>,
    /// Persisted variants matching no current combination, oldest first.
    pub orphans: Vec<Variant>,
    pub warnings: Vec<IntegrityWarning>,
}

impl Reconciliation {
    pub fn matched(&self) -> impl Iterator<Item = &ReconciledCombination> {
        self.combinations.iter().filter(|c| c.is_matched())
    }

    pub fn unmatched(&self) -> impl Iterator<Item = &ReconciledCombination> {
        self.combinations.iter().filter(|c| !c.is_matched())
    }

    pub fn unmatched_count(&self) -> usize {
        self.unmatched().count()
    }

    pub fn available_count(&self) -> usize {
        self.combinations.iter().filter(|c| c.is_available).count()
    }

    pub fn find(&self, key: &CombinationKey) -> Option<&ReconciledCombination> {
        self.combinations.iter().find(|c| c.key() == key)
    }
}

/// The matching predicate: identical pair sets with identical pair counts.
///
/// The explicit length check means a variant created before an option was added (a
/// strict subset of today's combination) can never match.
pub fn matches(variant: &Variant, combination: &Combination) -> bool {
    let (a, b) = (variant.key(), combination.key());
    a.len() == b.len() && a == b
}

/// Link every combination to the persisted variant carrying its key.
///
/// When several variants share a key, the oldest (by `created_at`, then id) is linked
/// and the rest are reported as orphans with a [`IntegrityWarning::DuplicateVariant`].
pub fn reconcile(combinations: &[Combination], variants: &[Variant]) -> Reconciliation {
    let mut ordered: Vec<&Variant> = variants.iter().collect();
    ordered.sort_by_key(|v| (v.created_at, v.id));

    let mut warnings = Vec::new();
    let mut by_key: HashMap<&CombinationKey, &Variant> = HashMap::with_capacity(ordered.len());
    for variant in ordered.iter().copied() {
        match by_key.entry(variant.key()) {
            Entry::Occupied(kept) => warnings.push(IntegrityWarning::DuplicateVariant {
                variant_id: variant.id,
                kept: kept.get().id,
            }),
            Entry::Vacant(slot) => {
                slot.insert(variant);
            }
        }
    }

    let mut linked: HashSet<VariantId> = HashSet::new();
    let reconciled = combinations
        .iter()
        .map(|combination| {
            let variant = by_key
                .get(combination.key())
                .copied()
                .filter(|v| matches(v, combination))
                .cloned();
            if let Some(v) = &variant {
                linked.insert(v.id);
            }
            ReconciledCombination {
                combination: combination.clone(),
                is_available: variant.as_ref().is_some_and(|v| v.is_available),
                variant,
            }
        })
        .collect();

    let orphans = ordered
        .into_iter()
        .filter(|v| !linked.contains(&v.id))
        .cloned()
        .collect();

    Reconciliation {
        combinations: reconciled,
        orphans,
        warnings,
    }
}

/// Check persisted variants against the current options.
pub fn audit_variants(options: &[ProductOption], variants: &[Variant]) -> Vec<IntegrityWarning> {
    let mut warnings = Vec::new();

    for variant in variants {
        let mut seen = HashSet::new();
        for pair in variant.pairs() {
            if !seen.insert(pair.option_id) {
                warnings.push(IntegrityWarning::DuplicateOption {
                    variant_id: variant.id,
                    option_id: pair.option_id,
                });
            }

            let Some(option) = find_option(options, pair.option_id) else {
                warnings.push(IntegrityWarning::UnknownOption {
                    variant_id: variant.id,
                    option_id: pair.option_id,
                });
                continue;
            };

            if option.value(pair.value_id).is_some() {
                continue;
            }

            match find_value(options, pair.value_id) {
                Some((owner, _)) => warnings.push(IntegrityWarning::ForeignValue {
                    variant_id: variant.id,
                    option_id: pair.option_id,
                    value_id: pair.value_id,
                    owner_id: owner.id,
                }),
                None => warnings.push(IntegrityWarning::UnknownValue {
                    variant_id: variant.id,
                    option_id: pair.option_id,
                    value_id: pair.value_id,
                }),
            }
        }
    }

    warnings
}

/// Generate, reconcile and audit in one pass over a snapshot.
///
/// `options` are used in the order given; callers normally pass them through
/// [`crate::option::normalize_options`] first.
pub fn reconcile_snapshot(options: &[ProductOption], variants: &[Variant]) -> Reconciliation {
    let combinations = generate(options);
    let mut reconciliation = reconcile(&combinations, variants);
    let mut audit = audit_variants(options, variants);
    audit.append(&mut reconciliation.warnings);
    reconciliation.warnings = audit;
    reconciliation
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::combination::OptionPair;
    use crate::option::OptionValue;
    use catalog_core::ProductId;
    use chrono::{Duration, Utc};

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

    fn size_and_color() -> (ProductId, Vec<ProductOption>) {
        let product_id = ProductId::new();
        let options = vec![
            option(product_id, "Size", 0, &["S", "M"]),
            option(product_id, "Color", 1, &["Red", "Blue"]),
        ];
        (product_id, options)
    }

    fn materialize_all(product_id: ProductId, combinations: &[Combination]) -> Vec<Variant> {
        let now = Utc::now();
        combinations
            .iter()
            .enumerate()
            .map(|(idx, c)| {
                Variant::new(product_id, c.key().clone(), now + Duration::milliseconds(idx as i64))
            })
            .collect()
    }

    #[test]
    fn unmatched_combinations_are_unavailable() {
        let (_, options) = size_and_color();
        let reconciliation = reconcile_snapshot(&options, &[]);
        assert_eq!(reconciliation.combinations.len(), 4);
        assert_eq!(reconciliation.unmatched_count(), 4);
        assert!(reconciliation.combinations.iter().all(|c| !c.is_available));
        assert!(reconciliation.orphans.is_empty());
        assert!(reconciliation.warnings.is_empty());
    }

    #[test]
    fn availability_is_mirrored_from_the_linked_variant() {
        let (product_id, options) = size_and_color();
        let combinations = generate(&options);
        let mut variants = materialize_all(product_id, &combinations);
        variants[3].is_available = true;

        let reconciliation = reconcile(&combinations, &variants);
        assert_eq!(reconciliation.unmatched_count(), 0);
        assert_eq!(reconciliation.available_count(), 1);
        let available = reconciliation.combinations.iter().find(|c| c.is_available).unwrap();
        assert_eq!(available.label(), "M / Blue");
        assert_eq!(available.variant_id(), Some(variants[3].id));
    }

    #[test]
    fn subset_variant_does_not_match_superset_combination() {
        let (product_id, options) = size_and_color();
        let size = &options[0];
        let subset = Variant::new(
            product_id,
            CombinationKey::new([OptionPair::new(size.id, size.values[0].id)]),
            Utc::now(),
        );

        let combinations = generate(&options);
        assert!(!combinations.iter().any(|c| matches(&subset, c)));

        let reconciliation = reconcile(&combinations, std::slice::from_ref(&subset));
        assert_eq!(reconciliation.unmatched_count(), 4);
        assert_eq!(reconciliation.orphans, vec![subset]);
    }

    #[test]
    fn adding_an_option_orphans_existing_variants() {
        let (product_id, mut options) = size_and_color();
        let variants = materialize_all(product_id, &generate(&options));

        options.push(option(product_id, "Material", 2, &["Cotton"]));
        let reconciliation = reconcile_snapshot(&options, &variants);

        assert_eq!(reconciliation.combinations.len(), 4);
        assert!(reconciliation.combinations.iter().all(|c| c.key().len() == 3));
        assert_eq!(reconciliation.unmatched_count(), 4);
        assert_eq!(reconciliation.orphans.len(), 4);
    }

    #[test]
    fn deleting_a_value_orphans_its_variants() {
        let (product_id, mut options) = size_and_color();
        let variants = materialize_all(product_id, &generate(&options));

        let removed = options[1].values.remove(1);
        let reconciliation = reconcile_snapshot(&options, &variants);

        assert_eq!(reconciliation.combinations.len(), 2);
        assert_eq!(reconciliation.unmatched_count(), 0);
        assert_eq!(reconciliation.orphans.len(), 2);
        assert!(
            reconciliation
                .orphans
                .iter()
                .all(|v| v.key().value_for(options[1].id) == Some(removed.id))
        );
        assert!(
            reconciliation
                .warnings
                .iter()
                .all(|w| matches!(w, IntegrityWarning::UnknownValue { .. }))
        );
        assert_eq!(reconciliation.warnings.len(), 2);
    }

    #[test]
    fn reordering_options_keeps_every_match() {
        let (product_id, mut options) = size_and_color();
        let variants = materialize_all(product_id, &generate(&options));

        options.reverse();
        let reconciliation = reconcile_snapshot(&options, &variants);
        assert_eq!(reconciliation.unmatched_count(), 0);
        assert!(reconciliation.orphans.is_empty());
        assert_eq!(reconciliation.combinations[0].label(), "Red / S");
    }

    #[test]
    fn duplicate_variants_link_the_oldest() {
        let (product_id, options) = size_and_color();
        let combinations = generate(&options);
        let now = Utc::now();
        let older = Variant::new(product_id, combinations[0].key().clone(), now);
        let newer = Variant::new(
            product_id,
            combinations[0].key().clone(),
            now + Duration::seconds(1),
        );

        let reconciliation = reconcile(&combinations, &[newer.clone(), older.clone()]);
        assert_eq!(reconciliation.combinations[0].variant_id(), Some(older.id));
        assert_eq!(reconciliation.orphans, vec![newer.clone()]);
        assert_eq!(
            reconciliation.warnings,
            vec![IntegrityWarning::DuplicateVariant {
                variant_id: newer.id,
                kept: older.id,
            }]
        );
    }

    #[test]
    fn audit_reports_malformed_pairs() {
        let (product_id, options) = size_and_color();
        let size = &options[0];
        let color = &options[1];
        let stranger = OptionId::new();

        let variant = Variant::new(
            product_id,
            CombinationKey::new([
                OptionPair::new(size.id, color.values[0].id),
                OptionPair::new(stranger, OptionValueId::new()),
                OptionPair::new(color.id, color.values[0].id),
                OptionPair::new(color.id, color.values[1].id),
            ]),
            Utc::now(),
        );

        let warnings = audit_variants(&options, std::slice::from_ref(&variant));
        assert!(warnings.contains(&IntegrityWarning::ForeignValue {
            variant_id: variant.id,
            option_id: size.id,
            value_id: color.values[0].id,
            owner_id: color.id,
        }));
        assert!(warnings.contains(&IntegrityWarning::UnknownOption {
            variant_id: variant.id,
            option_id: stranger,
        }));
        assert!(warnings.contains(&IntegrityWarning::DuplicateOption {
            variant_id: variant.id,
            option_id: color.id,
        }));
        assert!(warnings.iter().all(|w| w.variant_id() == variant.id));

        let reconciliation = reconcile_snapshot(&options, &[variant]);
        assert_eq!(reconciliation.unmatched_count(), 4);
        assert_eq!(reconciliation.orphans.len(), 1);
    }

    #[test]
    fn warning_display_names_the_variant() {
        let variant_id = VariantId::new();
        let option_id = OptionId::new();
        let text = IntegrityWarning::UnknownOption {
            variant_id,
            option_id,
        }
        .to_string();
        assert!(text.contains(&variant_id.to_string()));
        assert!(text.contains(&option_id.to_string()));
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #![proptest_config(ProptestConfig {
                cases: 256,
                ..ProptestConfig::default()
            })]

            /// Property: reconcile is idempotent and agrees with the predicate.
            #[test]
            fn reconcile_is_idempotent(
                shape in prop::collection::vec(1usize..4, 1..4),
                keep in prop::collection::vec(any::<bool>(), 0..64),
            ) {
                let product_id = ProductId::new();
                let options: Vec<ProductOption> = shape
                    .iter()
                    .enumerate()
                    .map(|(idx, count)| {
                        let texts: Vec<String> = (0..*count).map(|v| format!("v{v}")).collect();
                        let refs: Vec<&str> = texts.iter().map(String::as_str).collect();
                        option(product_id, &format!("o{idx}"), idx as i32, &refs)
                    })
                    .collect();
                let combinations = generate(&options);
                let variants: Vec<Variant> = materialize_all(product_id, &combinations)
                    .into_iter()
                    .zip(keep.iter().chain(std::iter::repeat(&true)))
                    .filter(|(_, keep)| **keep)
                    .map(|(v, _)| v)
                    .collect();

                let first = reconcile(&combinations, &variants);
                let second = reconcile(&combinations, &variants);
                prop_assert_eq!(&first, &second);
                prop_assert_eq!(first.combinations.len() - first.unmatched_count(), variants.len());

                for rc in &first.combinations {
                    let expected = variants.iter().any(|v| matches(v, &rc.combination));
                    prop_assert_eq!(rc.is_matched(), expected);
                }
            }

            /// Property: a variant missing any one pair never matches, and is orphaned.
            #[test]
            fn subset_variants_never_match(
                shape in prop::collection::vec(1usize..4, 2..4),
                dropped in any::<prop::sample::Index>(),
            ) {
                let product_id = ProductId::new();
                let options: Vec<ProductOption> = shape
                    .iter()
                    .enumerate()
                    .map(|(idx, count)| {
                        let texts: Vec<String> = (0..*count).map(|v| format!("v{v}")).collect();
                        let refs: Vec<&str> = texts.iter().map(String::as_str).collect();
                        option(product_id, &format!("o{idx}"), idx as i32, &refs)
                    })
                    .collect();
                let combinations = generate(&options);
                let truncated: Vec<Variant> = combinations
                    .iter()
                    .map(|c| {
                        let mut pairs = c.key().pairs().to_vec();
                        pairs.remove(dropped.index(pairs.len()));
                        Variant::new(product_id, CombinationKey::new(pairs), Utc::now())
                    })
                    .collect();

                let reconciliation = reconcile(&combinations, &truncated);
                prop_assert_eq!(reconciliation.unmatched_count(), combinations.len());
                prop_assert_eq!(reconciliation.orphans.len(), truncated.len());
            }
        }
    }
}
