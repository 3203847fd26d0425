//! Combination identity and the cartesian-product generator.
//!
//! A combination maps every option that currently has values to exactly one of its
//! values. Identity is carried by [`CombinationKey`], a normalized sorted list of
//! `(option, value)` pairs, so two combinations are equal iff their pairs are equal as
//! sets, independent of option order.

use serde::{Deserialize, Serialize};

use catalog_core::{OptionId, OptionValueId};

use crate::option::ProductOption;

/// One `(option, value)` assignment.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct OptionPair {
    pub option_id: OptionId,
    pub value_id: OptionValueId,
}

impl OptionPair {
    pub fn new(option_id: OptionId, value_id: OptionValueId) -> Self {
        Self { option_id, value_id }
    }
}

/// Order-independent identity of a combination (and of the variant realizing it).
///
/// Pairs are kept sorted; duplicates are *not* collapsed, so a malformed set that
/// names the same option twice keeps its true length and can never compare equal to
/// a well-formed combination.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "Vec<OptionPair>", into = "Vec<OptionPair>")]
pub struct CombinationKey(Vec<OptionPair>);

impl CombinationKey {
    pub fn new(pairs: impl IntoIterator<Item = OptionPair>) -> Self {
        let mut pairs: Vec<OptionPair> = pairs.into_iter().collect();
        pairs.sort();
        Self(pairs)
    }

    pub fn pairs(&self) -> &[OptionPair] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn value_for(&self, option_id: OptionId) -> Option<OptionValueId> {
        self.0
            .iter()
            .find(|p| p.option_id == option_id)
            .map(|p| p.value_id)
    }

    pub fn contains(&self, pair: &OptionPair) -> bool {
        self.0.binary_search(pair).is_ok()
    }
}

impl From<Vec<OptionPair>> for CombinationKey {
    fn from(pairs: Vec<OptionPair>) -> Self {
        Self::new(pairs)
    }
}

impl From<CombinationKey> for Vec<OptionPair> {
    fn from(key: CombinationKey) -> Self {
        key.0
    }
}

/// Stable textual form (`option:value|option:value`, sorted by id).
///
/// Used as the persisted lookup column; matching itself always compares pairs.
impl core::fmt::Display for CombinationKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        for (idx, pair) in self.0.iter().enumerate() {
            if idx > 0 {
                f.write_str("|")?;
            }
            write!(f, "{}:{}", pair.option_id, pair.value_id)?;
        }
        Ok(())
    }
}

/// One entry of a combination, in option order, with display text resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CombinationEntry {
    pub option_id: OptionId,
    pub option_name: String,
    pub value_id: OptionValueId,
    pub value_text: String,
}

/// A derived, never-persisted combination of one value per option.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Combination {
    entries: Vec<CombinationEntry>,
    key: CombinationKey,
}

impl Combination {
    fn from_entries(entries: Vec<CombinationEntry>) -> Self {
        let key = CombinationKey::new(
            entries
                .iter()
                .map(|e| OptionPair::new(e.option_id, e.value_id)),
        );
        Self { entries, key }
    }

    /// Entries in the order the options were given to [`generate`].
    pub fn entries(&self) -> &[CombinationEntry] {
        &self.entries
    }

    pub fn key(&self) -> &CombinationKey {
        &self.key
    }

    pub fn value_for(&self, option_id: OptionId) -> Option<OptionValueId> {
        self.key.value_for(option_id)
    }

    /// Value texts joined with ` / `, e.g. `M / Blue`.
    pub fn label(&self) -> String {
        self.entries
            .iter()
            .map(|e| e.value_text.as_str())
            .collect::<Vec<_>>()
            .join(" / ")
    }
}

/// Compute the cartesian product of the values of `options`, in the given order.
///
/// The first option varies slowest and the last fastest. Options without values are
/// skipped; if no option has values the result is empty. The generator never caps its
/// output, see [`crate::limits`] for the caller-side guard.
pub fn generate(options: &[ProductOption]) -> Vec<Combination> {
    let populated: Vec<&ProductOption> = options.iter().filter(|o| o.has_values()).collect();
    if populated.is_empty() {
        return Vec::new();
    }

    let partials = populated
        .iter()
        .fold(vec![Vec::<CombinationEntry>::new()], |acc, option| {
            let mut next = Vec::with_capacity(acc.len() * option.values.len());
            for partial in &acc {
                for value in &option.values {
                    let mut extended = Vec::with_capacity(partial.len() + 1);
                    extended.extend_from_slice(partial);
                    extended.push(CombinationEntry {
                        option_id: option.id,
                        option_name: option.name.clone(),
                        value_id: value.id,
                        value_text: value.text.clone(),
                    });
                    next.push(extended);
                }
            }
            next
        });

    partials.into_iter().map(Combination::from_entries).collect()
}

/// Number of combinations [`generate`] would produce, without generating them.
///
/// Saturates at `usize::MAX`.
pub fn combination_count(options: &[ProductOption]) -> usize {
    let mut populated = options.iter().filter(|o| o.has_values()).peekable();
    if populated.peek().is_none() {
        return 0;
    }
    populated.fold(1usize, |acc, o| acc.saturating_mul(o.values.len()))
}

/// Human label for an arbitrary key, resolving names against `options`.
///
/// Follows option order where the option is known; pairs naming a removed option or
/// value fall back to their raw ids and are listed last. Used for orphaned variants,
/// which no longer correspond to a generated combination.
pub fn describe_key(options: &[ProductOption], key: &CombinationKey) -> String {
    let mut known: Vec<(usize, String)> = Vec::new();
    let mut unknown: Vec<String> = Vec::new();

    for pair in key.pairs() {
        let resolved = options
            .iter()
            .enumerate()
            .find(|(_, o)| o.id == pair.option_id)
            .and_then(|(idx, o)| o.value(pair.value_id).map(|v| (idx, v.text.clone())));
        match resolved {
            Some(entry) => known.push(entry),
            None => unknown.push(format!("{}:{}", pair.option_id, pair.value_id)),
        }
    }

    known.sort_by_key(|(idx, _)| *idx);
    known
        .into_iter()
        .map(|(_, text)| text)
        .chain(unknown)
        .collect::<Vec<_>>()
        .join(" / ")
}
