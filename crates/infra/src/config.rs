//! Configuration loading and representation.
//!
//! Everything is read from the environment:
//!
//! | Variable | Default | Meaning |
//! |----------|---------|---------|
//! | `CATALOG_COMBINATION_WARN_AT` | `250` | Warn when a product derives more combinations than this |
//! | `CATALOG_COMBINATION_MAX` | `5000` | Refuse to derive more combinations than this |
//! | `CATALOG_ORPHAN_POLICY` | `retain` | `retain` or `delete` orphans after option/value deletion |
//! | `CATALOG_BULK_MATERIALIZE` | `false` | "Enable all" materializes missing variants first |
//! | `DATABASE_URL` | unset | Postgres connection string; in-memory store when unset |

use std::fmt;
use std::str::FromStr;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use catalog_variants::CombinationLimits;

/// What happens to orphaned variants after an option or value is deleted.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrphanPolicy {
    /// Keep orphans and report them; nothing is deleted implicitly.
    #[default]
    Retain,
    /// Delete orphans right after the option/value deletion.
    Delete,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown orphan policy '{0}' (expected 'retain' or 'delete')")]
pub struct UnknownOrphanPolicy(pub String);

impl FromStr for OrphanPolicy {
    type Err = UnknownOrphanPolicy;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "retain" | "keep" => Ok(OrphanPolicy::Retain),
            "delete" | "prune" => Ok(OrphanPolicy::Delete),
            _ => Err(UnknownOrphanPolicy(s.to_string())),
        }
    }
}

impl fmt::Display for OrphanPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrphanPolicy::Retain => f.write_str("retain"),
            OrphanPolicy::Delete => f.write_str("delete"),
        }
    }
}

/// Behaviour knobs for [`crate::editor::VariantEditor`].
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditorConfig {
    pub limits: CombinationLimits,
    pub orphan_policy: OrphanPolicy,
    /// When set, "set all available" creates missing variants before enabling them.
    pub bulk_materialize: bool,
}

impl EditorConfig {
    /// Editor settings from the environment, ignoring `DATABASE_URL`.
    pub fn from_env() -> Result<Self> {
        CatalogConfig::from_env().map(|config| config.editor)
    }

    pub fn with_limits(mut self, limits: CombinationLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn with_orphan_policy(mut self, policy: OrphanPolicy) -> Self {
        self.orphan_policy = policy;
        self
    }

    pub fn with_bulk_materialize(mut self, enabled: bool) -> Self {
        self.bulk_materialize = enabled;
        self
    }
}

/// Process-wide configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CatalogConfig {
    pub database_url: Option<String>,
    pub editor: EditorConfig,
}

impl CatalogConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup (the environment in production).
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = CombinationLimits::default();

        let warn_at = parse_or("CATALOG_COMBINATION_WARN_AT", &lookup, defaults.warn_at)?;
        let max = parse_or("CATALOG_COMBINATION_MAX", &lookup, defaults.max)?;
        if warn_at > max {
            anyhow::bail!(
                "CATALOG_COMBINATION_WARN_AT ({warn_at}) must not exceed CATALOG_COMBINATION_MAX ({max})"
            );
        }

        let orphan_policy = match lookup("CATALOG_ORPHAN_POLICY") {
            Some(raw) => raw
                .parse::<OrphanPolicy>()
                .context("invalid CATALOG_ORPHAN_POLICY")?,
            None => OrphanPolicy::default(),
        };

        let bulk_materialize = match lookup("CATALOG_BULK_MATERIALIZE") {
            Some(raw) => parse_flag(&raw)
                .with_context(|| format!("invalid CATALOG_BULK_MATERIALIZE '{raw}'"))?,
            None => false,
        };

        let database_url = lookup("DATABASE_URL").filter(|url| !url.trim().is_empty());

        Ok(Self {
            database_url,
            editor: EditorConfig::default()
                .with_limits(CombinationLimits::new(warn_at, max))
                .with_orphan_policy(orphan_policy)
                .with_bulk_materialize(bulk_materialize),
        })
    }
}

fn parse_or<F>(key: &str, lookup: &F, default: usize) -> Result<usize>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<usize>()
            .with_context(|| format!("invalid {key} '{raw}'")),
        None => Ok(default),
    }
}

fn parse_flag(raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        other => anyhow::bail!("expected a boolean, got '{other}'"),
    }
}
