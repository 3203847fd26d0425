//! Editing session for one product's options and variants.
//!
//! [`VariantEditor`] holds the last observed snapshot of options and variants and the
//! reconciliation derived from it. Every write goes to the store as a request, and the
//! snapshot is reloaded and reconciled again only after the response is observed.
//!
//! Batch operations (generate, set-all-availability, prune) issue one request per row,
//! keep going past failed rows, and stop issuing new requests once their
//! [`CancellationToken`] is cancelled.
//!
//! If the reload after a write fails, the snapshot is marked stale and reloaded before
//! the next operation. A batch whose reload failed returns [`EditorError::Reload`] with
//! its reports.

use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use catalog_core::{DomainError, OptionId, OptionValueId, ProductId, VariantId};
use catalog_variants::option::{
    dense_positions, ensure_unique_option_name, find_option, find_value, validate_option_name,
    validate_value_text,
};
use catalog_variants::view::{GridError, GridFilter, GridView, ListView, project_grid, project_list};
use catalog_variants::{
    CombinationKey, LimitCheck, OptionValue, ProductOption, Reconciliation, ReconciledCombination,
    Variant, VariantDetails, VariantIntent, audit_variants, combination_count, describe_key,
    normalize_options, plan_bulk_availability, plan_details, plan_materialization, plan_toggle,
    reconcile_snapshot,
};

use crate::batch::{BatchFailure, BatchItem, BatchOperation, BatchReport};
use crate::config::{EditorConfig, OrphanPolicy};
use crate::store::{StoreError, VariantStore};

#[derive(Debug, Error)]
pub enum EditorError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Grid(#[from] GridError),

    /// A single write or load failed; `subject` names what to retry.
    #[error("failed to {subject}: {source}")]
    Store {
        subject: String,
        #[source]
        source: StoreError,
    },

    #[error("{count} combinations exceed the configured maximum of {max}")]
    TooManyCombinations { count: usize, max: usize },

    #[error("no current combination matches {0}")]
    UnknownCombination(String),

    #[error("option {0} does not belong to this product")]
    UnknownOption(OptionId),

    #[error("option value {0} does not belong to this product")]
    UnknownValue(OptionValueId),

    /// Batches ran but the reload afterwards failed.
    #[error("{}, then {source}", summarize(.reports))]
    Reload {
        reports: Vec<BatchReport>,
        #[source]
        source: Box<EditorError>,
    },
}

impl EditorError {
    fn reload(reports: Vec<BatchReport>, source: EditorError) -> Self {
        Self::Reload {
            reports,
            source: Box::new(source),
        }
    }

    /// Reports of batches that ran before a failed reload.
    pub fn batch_reports(&self) -> &[BatchReport] {
        match self {
            Self::Reload { reports, .. } => reports.as_slice(),
            _ => &[],
        }
    }
}

fn summarize(reports: &[BatchReport]) -> String {
    reports
        .iter()
        .map(BatchReport::summary)
        .collect::<Vec<_>>()
        .join("; ")
}

fn store_error(subject: impl Into<String>) -> impl FnOnce(StoreError) -> EditorError {
    let subject = subject.into();
    move |source| EditorError::Store { subject, source }
}

/// Result of "set all available/unavailable".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BulkAvailabilityOutcome {
    /// Present when missing variants were materialized first.
    pub materialized: Option<BatchReport>,
    pub updated: BatchReport,
}

pub struct VariantEditor<S> {
    product_id: ProductId,
    store: S,
    config: EditorConfig,
    options: Vec<ProductOption>,
    variants: Vec<Variant>,
    reconciliation: Reconciliation,
    limit: LimitCheck,
    stale: bool,
}

impl<S> std::fmt::Debug for VariantEditor<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VariantEditor")
            .field("product_id", &self.product_id)
            .field("options", &self.options.len())
            .field("variants", &self.variants.len())
            .field("limit", &self.limit)
            .field("stale", &self.stale)
            .finish()
    }
}

impl<S: VariantStore> VariantEditor<S> {
    /// Load the product's snapshot and reconcile it.
    #[instrument(skip(store, config), fields(product_id = %product_id), err)]
    pub async fn open(
        store: S,
        product_id: ProductId,
        config: EditorConfig,
    ) -> Result<Self, EditorError> {
        let mut editor = Self {
            product_id,
            store,
            config,
            options: Vec::new(),
            variants: Vec::new(),
            reconciliation: Reconciliation::default(),
            limit: LimitCheck::Within,
            stale: true,
        };
        editor.refresh().await?;
        Ok(editor)
    }

    pub fn product_id(&self) -> ProductId {
        self.product_id
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    /// Options in position order, values nested in position order.
    pub fn options(&self) -> &[ProductOption] {
        &self.options
    }

    pub fn variants(&self) -> &[Variant] {
        &self.variants
    }

    pub fn reconciliation(&self) -> &Reconciliation {
        &self.reconciliation
    }

    pub fn combinations(&self) -> &[ReconciledCombination] {
        &self.reconciliation.combinations
    }

    pub fn orphans(&self) -> &[Variant] {
        &self.reconciliation.orphans
    }

    pub fn limit_check(&self) -> LimitCheck {
        self.limit
    }

    /// True while a write may have landed without the snapshot being reloaded.
    pub fn is_stale(&self) -> bool {
        self.stale
    }

    pub fn list_view(&self) -> ListView {
        project_list(&self.reconciliation)
    }

    pub fn grid_view(&self, filter: &GridFilter) -> Result<GridView, EditorError> {
        Ok(project_grid(&self.options, &self.reconciliation, filter)?)
    }

    pub fn find(&self, key: &CombinationKey) -> Result<&ReconciledCombination, EditorError> {
        self.reconciliation
            .find(key)
            .ok_or_else(|| EditorError::UnknownCombination(describe_key(&self.options, key)))
    }

    /// Reload options and variants, then reconcile.
    pub async fn refresh(&mut self) -> Result<(), EditorError> {
        self.stale = true;
        let options = self
            .store
            .load_options(self.product_id)
            .await
            .map_err(store_error("load options"))?;
        self.options = normalize_options(options);
        self.reload_variants().await
    }

    /// Reload variants only. Enough after a variant write, unless the snapshot is
    /// stale, in which case everything is reloaded.
    pub async fn refresh_variants(&mut self) -> Result<(), EditorError> {
        if self.stale {
            return self.refresh().await;
        }
        self.stale = true;
        self.reload_variants().await
    }

    async fn reload_variants(&mut self) -> Result<(), EditorError> {
        self.variants = self
            .store
            .load_variants(self.product_id)
            .await
            .map_err(store_error("load variants"))?;
        self.recompute();
        self.stale = false;
        Ok(())
    }

    async fn ensure_fresh(&mut self) -> Result<(), EditorError> {
        if self.stale {
            debug!(product_id = %self.product_id, "snapshot stale; reloading first");
            self.refresh().await?;
        }
        Ok(())
    }

    fn recompute(&mut self) {
        let product_id = self.product_id;
        self.limit = self.config.limits.check(combination_count(&self.options));

        match self.limit {
            LimitCheck::Exceeded { count, max } => {
                warn!(%product_id, count, max, "combination count exceeds maximum; not generating");
                self.reconciliation = Reconciliation {
                    warnings: audit_variants(&self.options, &self.variants),
                    ..Reconciliation::default()
                };
            }
            LimitCheck::Warn { count, warn_at } => {
                warn!(%product_id, count, warn_at, "large number of combinations");
                self.reconciliation = reconcile_snapshot(&self.options, &self.variants);
            }
            LimitCheck::Within => {
                self.reconciliation = reconcile_snapshot(&self.options, &self.variants);
            }
        }

        for warning in &self.reconciliation.warnings {
            warn!(
                %product_id,
                variant_id = %warning.variant_id(),
                %warning,
                "variant integrity warning"
            );
        }
        debug!(
            %product_id,
            combinations = self.reconciliation.combinations.len(),
            unmatched = self.reconciliation.unmatched_count(),
            orphans = self.reconciliation.orphans.len(),
            "reconciled"
        );
    }

    #[instrument(skip(self), fields(product_id = %self.product_id), err)]
    pub async fn add_option(&mut self, name: &str) -> Result<ProductOption, EditorError> {
        let name = validate_option_name(name)?;
        self.ensure_fresh().await?;
        ensure_unique_option_name(&self.options, &name)?;
        let option = self
            .store
            .create_option(self.product_id, &name)
            .await
            .map_err(store_error(format!("create option '{name}'")))?;
        self.refresh().await?;
        Ok(option)
    }

    /// Delete an option and its values. Variants that used it become orphans, which
    /// are pruned right away under [`OrphanPolicy::Delete`].
    #[instrument(skip(self), fields(product_id = %self.product_id), err)]
    pub async fn remove_option(
        &mut self,
        option_id: OptionId,
    ) -> Result<Option<BatchReport>, EditorError> {
        self.ensure_fresh().await?;
        let name = find_option(&self.options, option_id)
            .map(|o| o.name.clone())
            .ok_or(EditorError::UnknownOption(option_id))?;
        self.store
            .delete_option(option_id)
            .await
            .map_err(store_error(format!("delete option '{name}'")))?;
        self.refresh().await?;
        self.apply_orphan_policy().await
    }

    #[instrument(skip(self), fields(product_id = %self.product_id), err)]
    pub async fn add_value(
        &mut self,
        option_id: OptionId,
        text: &str,
    ) -> Result<OptionValue, EditorError> {
        let text = validate_value_text(text)?;
        self.ensure_fresh().await?;
        let option =
            find_option(&self.options, option_id).ok_or(EditorError::UnknownOption(option_id))?;
        let subject = format!("add value '{text}' to option '{}'", option.name);
        let value = self
            .store
            .create_option_value(option_id, &text)
            .await
            .map_err(store_error(subject))?;
        self.refresh().await?;
        Ok(value)
    }

    #[instrument(skip(self), fields(product_id = %self.product_id), err)]
    pub async fn remove_value(
        &mut self,
        value_id: OptionValueId,
    ) -> Result<Option<BatchReport>, EditorError> {
        self.ensure_fresh().await?;
        let subject = find_value(&self.options, value_id)
            .map(|(option, value)| {
                format!("delete value '{}' of option '{}'", value.text, option.name)
            })
            .ok_or(EditorError::UnknownValue(value_id))?;
        self.store
            .delete_option_value(value_id)
            .await
            .map_err(store_error(subject))?;
        self.refresh().await?;
        self.apply_orphan_policy().await
    }

    /// `order` must list every option of the product exactly once.
    #[instrument(skip(self, order), fields(product_id = %self.product_id), err)]
    pub async fn reorder_options(&mut self, order: &[OptionId]) -> Result<(), EditorError> {
        self.ensure_fresh().await?;
        let positions = dense_positions(&self.options, order)?;
        self.store
            .set_option_positions(self.product_id, &positions)
            .await
            .map_err(store_error("reorder options"))?;
        self.refresh().await
    }

    /// `order` must list every value of the option exactly once.
    #[instrument(skip(self, order), fields(product_id = %self.product_id), err)]
    pub async fn reorder_values(
        &mut self,
        option_id: OptionId,
        order: &[OptionValueId],
    ) -> Result<(), EditorError> {
        self.ensure_fresh().await?;
        let option =
            find_option(&self.options, option_id).ok_or(EditorError::UnknownOption(option_id))?;
        let positions = dense_positions(&option.values, order)?;
        let subject = format!("reorder values of option '{}'", option.name);
        self.store
            .set_value_positions(option_id, &positions)
            .await
            .map_err(store_error(subject))?;
        self.refresh().await
    }

    /// Create a variant for every unmatched combination ("generate variants").
    ///
    /// Idempotent: with nothing unmatched the report is empty.
    #[instrument(skip(self, cancel), fields(product_id = %self.product_id), err)]
    pub async fn generate_variants(
        &mut self,
        cancel: &CancellationToken,
    ) -> Result<BatchReport, EditorError> {
        self.ensure_fresh().await?;
        if let LimitCheck::Exceeded { count, max } = self.limit {
            return Err(EditorError::TooManyCombinations { count, max });
        }

        let intents = plan_materialization(self.product_id, &self.reconciliation.combinations);
        let report = self
            .run_batch(BatchOperation::GenerateVariants, intents, cancel)
            .await;
        info!(product_id = %self.product_id, summary = %report.summary(), "batch finished");
        if let Err(source) = self.refresh_variants().await {
            return Err(EditorError::reload(vec![report], source));
        }
        Ok(report)
    }

    /// Flip availability of one matched combination. Returns the new flag.
    #[instrument(skip(self, key), fields(product_id = %self.product_id, key = %key), err)]
    pub async fn toggle_availability(&mut self, key: &CombinationKey) -> Result<bool, EditorError> {
        self.ensure_fresh().await?;
        let intent = plan_toggle(self.find(key)?)?;
        let is_available = matches!(
            intent,
            VariantIntent::SetAvailability {
                is_available: true,
                ..
            }
        );
        self.execute(&intent)
            .await
            .map_err(store_error(format!("toggle availability of '{}'", intent.label())))?;
        self.refresh_variants().await?;
        Ok(is_available)
    }

    /// Replace SKU, price override and image reference of one matched combination.
    #[instrument(skip(self, key, details), fields(product_id = %self.product_id, key = %key), err)]
    pub async fn edit_details(
        &mut self,
        key: &CombinationKey,
        details: VariantDetails,
    ) -> Result<(), EditorError> {
        self.ensure_fresh().await?;
        let intent = plan_details(self.find(key)?, details)?;
        self.execute(&intent)
            .await
            .map_err(store_error(format!("update details of '{}'", intent.label())))?;
        self.refresh_variants().await
    }

    /// Set availability on every matched variant.
    ///
    /// Unmatched combinations are skipped unless `bulk_materialize` is configured and
    /// `is_available` is true, in which case they are materialized first.
    #[instrument(skip(self, cancel), fields(product_id = %self.product_id), err)]
    pub async fn set_all_availability(
        &mut self,
        is_available: bool,
        cancel: &CancellationToken,
    ) -> Result<BulkAvailabilityOutcome, EditorError> {
        self.ensure_fresh().await?;
        let materialized = if is_available
            && self.config.bulk_materialize
            && self.reconciliation.unmatched_count() > 0
        {
            Some(self.generate_variants(cancel).await?)
        } else {
            None
        };

        let intents = plan_bulk_availability(&self.reconciliation.combinations, is_available);
        let updated = self
            .run_batch(BatchOperation::SetAvailability { is_available }, intents, cancel)
            .await;
        info!(product_id = %self.product_id, summary = %updated.summary(), "batch finished");
        if let Err(source) = self.refresh_variants().await {
            let mut reports: Vec<BatchReport> = materialized.into_iter().collect();
            reports.push(updated);
            return Err(EditorError::reload(reports, source));
        }

        Ok(BulkAvailabilityOutcome {
            materialized,
            updated,
        })
    }

    /// Delete every orphaned variant.
    #[instrument(skip(self, cancel), fields(product_id = %self.product_id), err)]
    pub async fn prune_orphans(
        &mut self,
        cancel: &CancellationToken,
    ) -> Result<BatchReport, EditorError> {
        self.ensure_fresh().await?;
        let mut report = BatchReport::new(BatchOperation::PruneOrphans);
        let items: Vec<BatchItem> = self
            .reconciliation
            .orphans
            .iter()
            .map(|variant| BatchItem {
                label: describe_key(&self.options, variant.key()),
                key: variant.key().clone(),
                variant_id: Some(variant.id),
            })
            .collect();

        for (idx, item) in items.iter().enumerate() {
            if cancel.is_cancelled() {
                report.skipped.extend_from_slice(&items[idx..]);
                break;
            }
            let Some(variant_id) = item.variant_id else {
                continue;
            };
            match self.store.delete_variant(variant_id).await {
                Ok(()) => report.succeeded.push(item.clone()),
                Err(error) => {
                    warn!(
                        %variant_id,
                        label = %item.label,
                        %error,
                        "failed to delete orphaned variant"
                    );
                    report.failed.push(BatchFailure {
                        item: item.clone(),
                        error,
                    });
                }
            }
        }

        info!(product_id = %self.product_id, summary = %report.summary(), "batch finished");
        if let Err(source) = self.refresh_variants().await {
            return Err(EditorError::reload(vec![report], source));
        }
        Ok(report)
    }

    async fn apply_orphan_policy(&mut self) -> Result<Option<BatchReport>, EditorError> {
        match self.config.orphan_policy {
            OrphanPolicy::Retain => {
                if !self.reconciliation.orphans.is_empty() {
                    debug!(
                        product_id = %self.product_id,
                        orphans = self.reconciliation.orphans.len(),
                        "retaining orphaned variants"
                    );
                }
                Ok(None)
            }
            OrphanPolicy::Delete => self.prune_orphans(&CancellationToken::new()).await.map(Some),
        }
    }

    async fn execute(&self, intent: &VariantIntent) -> Result<VariantId, StoreError> {
        match intent {
            VariantIntent::Create {
                product_id, key, ..
            } => self
                .store
                .create_variant(*product_id, key)
                .await
                .map(|variant| variant.id),
            VariantIntent::SetAvailability {
                variant_id,
                is_available,
                ..
            } => self
                .store
                .update_variant_availability(*variant_id, *is_available)
                .await
                .map(|()| *variant_id),
            VariantIntent::UpdateDetails {
                variant_id,
                details,
                ..
            } => self
                .store
                .update_variant_details(*variant_id, details)
                .await
                .map(|()| *variant_id),
        }
    }

    fn batch_item(&self, intent: &VariantIntent) -> BatchItem {
        let (key, variant_id) = match intent {
            VariantIntent::Create { key, .. } => (key.clone(), None),
            VariantIntent::SetAvailability { variant_id, .. }
            | VariantIntent::UpdateDetails { variant_id, .. } => (
                self.variants
                    .iter()
                    .find(|v| v.id == *variant_id)
                    .map(|v| v.key().clone())
                    .unwrap_or_else(|| CombinationKey::new(Vec::new())),
                Some(*variant_id),
            ),
        };
        BatchItem {
            label: intent.label().to_string(),
            key,
            variant_id,
        }
    }

    async fn run_batch(
        &self,
        operation: BatchOperation,
        intents: Vec<VariantIntent>,
        cancel: &CancellationToken,
    ) -> BatchReport {
        let mut report = BatchReport::new(operation);

        for (idx, intent) in intents.iter().enumerate() {
            if cancel.is_cancelled() {
                debug!(
                    product_id = %self.product_id,
                    remaining = intents.len() - idx,
                    "batch cancelled"
                );
                report
                    .skipped
                    .extend(intents[idx..].iter().map(|i| self.batch_item(i)));
                break;
            }

            let mut item = self.batch_item(intent);
            match self.execute(intent).await {
                Ok(variant_id) => {
                    item.variant_id = Some(variant_id);
                    report.succeeded.push(item);
                }
                Err(error) => {
                    warn!(
                        product_id = %self.product_id,
                        %operation,
                        label = %item.label,
                        %error,
                        "batch row failed"
                    );
                    report.failed.push(BatchFailure { item, error });
                }
            }
        }

        report
    }
}
