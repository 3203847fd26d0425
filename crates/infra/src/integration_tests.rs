//! Integration tests for the full editing pipeline.
//!
//! Tests: VariantEditor → VariantStore → generate → reconcile → list/grid views
//!
//! Verifies:
//! - Materialization creates exactly the missing variants and is idempotent
//! - Availability changes touch only the targeted variants
//! - Option and value edits re-derive combinations and orphan stale variants
//! - Products never see each other's options or variants

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tokio_util::sync::CancellationToken;

    use catalog_core::ProductId;
    use catalog_variants::view::{GridFilter, RowStatus};
    use catalog_variants::{CombinationKey, IntegrityWarning};

    use crate::config::EditorConfig;
    use crate::editor::VariantEditor;
    use crate::snapshot::{ProductSnapshot, import_snapshot};
    use crate::store::{InMemoryVariantStore, VariantStore};

    type Editor = VariantEditor<Arc<InMemoryVariantStore>>;

    async fn open(store: &Arc<InMemoryVariantStore>, product_id: ProductId) -> Editor {
        VariantEditor::open(store.clone(), product_id, EditorConfig::default())
            .await
            .unwrap()
    }

    /// Size:[S,M] x Color:[Red,Blue] on a fresh product.
    async fn tee_shirt() -> Editor {
        let store = Arc::new(InMemoryVariantStore::new());
        let mut editor = open(&store, ProductId::new()).await;
        let size = editor.add_option("Size").await.unwrap();
        editor.add_value(size.id, "S").await.unwrap();
        editor.add_value(size.id, "M").await.unwrap();
        let color = editor.add_option("Color").await.unwrap();
        editor.add_value(color.id, "Red").await.unwrap();
        editor.add_value(color.id, "Blue").await.unwrap();
        editor
    }

    fn key_of(editor: &Editor, label: &str) -> CombinationKey {
        editor
            .combinations()
            .iter()
            .find(|c| c.label() == label)
            .map(|c| c.key().clone())
            .unwrap()
    }

    #[tokio::test]
    async fn size_by_color_generates_four_combinations_in_order() {
        let editor = tee_shirt().await;
        let labels: Vec<String> = editor.combinations().iter().map(|c| c.label()).collect();
        assert_eq!(labels, vec!["S / Red", "S / Blue", "M / Red", "M / Blue"]);
        assert!(editor.combinations().iter().all(|c| !c.is_matched() && !c.is_available));
    }

    #[tokio::test]
    async fn materialize_then_toggle_one_variant() {
        let mut editor = tee_shirt().await;

        let report = editor.generate_variants(&CancellationToken::new()).await.unwrap();
        assert_eq!(report.succeeded.len(), 4);
        assert!(report.is_complete());
        assert_eq!(editor.variants().len(), 4);
        assert_eq!(editor.reconciliation().unmatched_count(), 0);
        assert!(editor.variants().iter().all(|v| !v.is_available));

        let m_blue = key_of(&editor, "M / Blue");
        assert!(editor.toggle_availability(&m_blue).await.unwrap());

        let available: Vec<String> = editor
            .combinations()
            .iter()
            .filter(|c| c.is_available)
            .map(|c| c.label())
            .collect();
        assert_eq!(available, vec!["M / Blue"]);
    }

    #[tokio::test]
    async fn generate_twice_creates_nothing_new() {
        let mut editor = tee_shirt().await;
        editor.generate_variants(&CancellationToken::new()).await.unwrap();
        let ids: Vec<_> = editor.variants().iter().map(|v| v.id).collect();

        let again = editor.generate_variants(&CancellationToken::new()).await.unwrap();
        assert_eq!(again.total(), 0);
        assert_eq!(again.summary(), "generate variants: nothing to do");
        let after: Vec<_> = editor.variants().iter().map(|v| v.id).collect();
        assert_eq!(ids, after);
    }

    #[tokio::test]
    async fn adding_a_single_value_option_unmatches_every_prior_variant() {
        let mut editor = tee_shirt().await;
        editor.generate_variants(&CancellationToken::new()).await.unwrap();

        let material = editor.add_option("Material").await.unwrap();
        editor.add_value(material.id, "Cotton").await.unwrap();

        assert_eq!(editor.combinations().len(), 4);
        assert!(editor.combinations().iter().all(|c| c.key().len() == 3));
        assert_eq!(editor.reconciliation().unmatched_count(), 4);
        assert_eq!(editor.orphans().len(), 4);

        // Regenerating creates four new variants; the old ones stay orphaned.
        let report = editor.generate_variants(&CancellationToken::new()).await.unwrap();
        assert_eq!(report.succeeded.len(), 4);
        assert_eq!(editor.variants().len(), 8);
        assert_eq!(editor.orphans().len(), 4);

        let pruned = editor.prune_orphans(&CancellationToken::new()).await.unwrap();
        assert_eq!(pruned.succeeded.len(), 4);
        assert_eq!(editor.variants().len(), 4);
        assert!(editor.orphans().is_empty());
    }

    #[tokio::test]
    async fn empty_option_is_skipped_until_it_gets_values() {
        let mut editor = tee_shirt().await;
        let fit = editor.add_option("Fit").await.unwrap();
        assert_eq!(editor.combinations().len(), 4);
        assert!(editor.combinations().iter().all(|c| c.key().value_for(fit.id).is_none()));

        editor.add_value(fit.id, "Slim").await.unwrap();
        editor.add_value(fit.id, "Regular").await.unwrap();
        assert_eq!(editor.combinations().len(), 8);
    }

    #[tokio::test]
    async fn deleting_a_value_orphans_its_variant() {
        let mut editor = tee_shirt().await;
        editor.generate_variants(&CancellationToken::new()).await.unwrap();

        let blue = editor.options()[1].values[1].id;
        let blue_variants: Vec<_> = editor
            .combinations()
            .iter()
            .filter(|c| c.label().ends_with("Blue"))
            .filter_map(|c| c.variant_id())
            .collect();

        let pruned = editor.remove_value(blue).await.unwrap();
        assert!(pruned.is_none(), "orphans are retained by default");

        assert_eq!(editor.combinations().len(), 2);
        let orphan_ids: Vec<_> = editor.orphans().iter().map(|v| v.id).collect();
        assert_eq!(orphan_ids.len(), 2);
        assert!(blue_variants.iter().all(|id| orphan_ids.contains(id)));
        assert!(
            editor
                .reconciliation()
                .warnings
                .iter()
                .all(|w| matches!(w, IntegrityWarning::UnknownValue { .. }))
        );
    }

    #[tokio::test]
    async fn bulk_enable_skips_unmatched_by_default() {
        let mut editor = tee_shirt().await;
        let s_red = key_of(&editor, "S / Red");
        editor.generate_variants(&CancellationToken::new()).await.unwrap();

        let color = editor.options()[1].id;
        editor.add_value(color, "Green").await.unwrap();
        assert_eq!(editor.reconciliation().unmatched_count(), 2);

        let outcome = editor
            .set_all_availability(true, &CancellationToken::new())
            .await
            .unwrap();
        assert!(outcome.materialized.is_none());
        assert_eq!(outcome.updated.succeeded.len(), 4);
        assert_eq!(editor.reconciliation().available_count(), 4);
        assert_eq!(editor.reconciliation().unmatched_count(), 2);

        // Toggling one back leaves siblings alone.
        assert!(!editor.toggle_availability(&s_red).await.unwrap());
        assert_eq!(editor.reconciliation().available_count(), 3);
    }

    #[tokio::test]
    async fn list_and_grid_views_agree() {
        let mut editor = tee_shirt().await;
        let s_blue = key_of(&editor, "S / Blue");
        editor.generate_variants(&CancellationToken::new()).await.unwrap();
        editor.toggle_availability(&s_blue).await.unwrap();

        let list = editor.list_view();
        assert_eq!(list.total(), 4);
        assert_eq!(list.generated, 4);
        assert_eq!(list.available, 1);
        assert_eq!(list.rows[1].status, RowStatus::Available);

        let grid = editor.grid_view(&GridFilter::new()).unwrap();
        let small = editor.options()[0].values[0].id;
        let blue = editor.options()[1].values[1].id;
        let cell = grid.cell(small, blue).unwrap();
        assert_eq!(cell.key, s_blue);
        assert!(cell.is_available);
        assert_eq!(
            grid.cells.iter().flatten().filter(|c| c.is_available).count(),
            list.available
        );
    }

    #[tokio::test]
    async fn products_are_isolated() {
        let store = Arc::new(InMemoryVariantStore::new());
        let mut first = open(&store, ProductId::new()).await;
        let mut second = open(&store, ProductId::new()).await;

        let size = first.add_option("Size").await.unwrap();
        first.add_value(size.id, "S").await.unwrap();
        first.generate_variants(&CancellationToken::new()).await.unwrap();

        let size = second.add_option("Size").await.unwrap();
        second.add_value(size.id, "XL").await.unwrap();
        second.refresh().await.unwrap();

        assert_eq!(second.combinations().len(), 1);
        assert!(second.variants().is_empty());
        assert!(second.orphans().is_empty());
        assert_eq!(first.variants().len(), 1);
    }

    #[tokio::test]
    async fn imported_snapshot_opens_in_the_editor() {
        let snapshot = ProductSnapshot::from_json(
            r#"{
                "options": [
                    { "name": "Size", "values": ["S", "M"] },
                    { "name": "Color", "values": ["Red", "Blue"] }
                ],
                "variants": [
                    { "values": { "Size": "M", "Color": "Blue" }, "is_available": true }
                ]
            }"#,
        )
        .unwrap();
        let store = Arc::new(InMemoryVariantStore::new());
        let product_id = import_snapshot(store.as_ref(), &snapshot).await.unwrap();

        let mut editor = open(&store, product_id).await;
        assert_eq!(editor.reconciliation().matched().count(), 1);
        assert_eq!(editor.reconciliation().available_count(), 1);

        editor.generate_variants(&CancellationToken::new()).await.unwrap();
        assert_eq!(store.load_variants(product_id).await.unwrap().len(), 4);
        assert_eq!(editor.reconciliation().available_count(), 1);
    }
}
