//! Plain-text rendering of the list, grid and orphan views.

use std::fmt::Write;

use catalog_variants::view::{GridView, ListView, RowStatus};
use catalog_variants::{ProductOption, Variant, describe_key};

fn status(status: RowStatus) -> &'static str {
    match status {
        RowStatus::NotGenerated => "not generated",
        RowStatus::Available => "available",
        RowStatus::Unavailable => "unavailable",
    }
}

fn price(cents: u64) -> String {
    format!("{}.{:02}", cents / 100, cents % 100)
}

pub fn list(view: &ListView) -> String {
    let width = view
        .rows
        .iter()
        .map(|r| r.label.chars().count())
        .max()
        .unwrap_or(0)
        .max("combination".len());

    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:<width$}  {:<13}  {:<16}  {:>10}  image",
        "combination", "status", "sku", "price"
    );
    for row in &view.rows {
        let _ = writeln!(
            out,
            "{:<width$}  {:<13}  {:<16}  {:>10}  {}",
            row.label,
            status(row.status),
            row.sku.as_deref().unwrap_or("-"),
            row.price.map(price).unwrap_or_else(|| "-".to_string()),
            row.image_ref.as_deref().unwrap_or("-"),
        );
    }
    let _ = writeln!(
        out,
        "{} combinations, {} generated, {} available, {} orphaned",
        view.total(),
        view.generated,
        view.available,
        view.orphaned
    );
    out
}

/// `[x]` available, `[ ]` unavailable, ` - ` not generated.
pub fn grid(view: &GridView) -> String {
    let mut out = String::new();
    for (name, text) in &view.fixed {
        let _ = writeln!(out, "{name} = {text}");
    }

    let row_width = view
        .rows
        .values
        .iter()
        .map(|(_, text)| text.chars().count())
        .max()
        .unwrap_or(0)
        .max(view.rows.option_name.chars().count());
    let column_widths: Vec<usize> = view
        .columns
        .values
        .iter()
        .map(|(_, text)| text.chars().count().max(3))
        .collect();

    let _ = write!(out, "{:<row_width$}", view.rows.option_name);
    for ((_, text), width) in view.columns.values.iter().zip(column_widths.iter().copied()) {
        let _ = write!(out, "  {text:^width$}");
    }
    out.push('\n');

    for ((_, text), cells) in view.rows.values.iter().zip(&view.cells) {
        let _ = write!(out, "{text:<row_width$}");
        for (cell, width) in cells.iter().zip(column_widths.iter().copied()) {
            let mark = match (cell.is_generated(), cell.is_available) {
                (false, _) => " - ",
                (true, true) => "[x]",
                (true, false) => "[ ]",
            };
            let _ = write!(out, "  {mark:^width$}");
        }
        out.push('\n');
    }
    out
}

pub fn orphans(options: &[ProductOption], orphans: &[Variant]) -> String {
    if orphans.is_empty() {
        return "no orphaned variants\n".to_string();
    }
    let mut out = String::new();
    for variant in orphans {
        let _ = writeln!(
            out,
            "{}  {}  {}",
            variant.id,
            describe_key(options, variant.key()),
            if variant.is_available { "available" } else { "unavailable" }
        );
    }
    out
}
