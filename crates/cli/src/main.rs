//! catalog CLI - inspect and edit a product's option/variant matrix
//!
//! The product is read either from a JSON snapshot (loaded into an in-memory store)
//! or from Postgres (`--database-url`/`DATABASE_URL` plus `--product`).

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use catalog_core::ProductId;
use catalog_infra::{
    BatchReport, CatalogConfig, EditorError, InMemoryVariantStore, PostgresVariantStore, ProductSnapshot,
    VariantEditor, VariantStore, import_snapshot,
};
use catalog_variants::view::GridFilter;
use catalog_variants::{CombinationKey, OptionPair};

mod render;

type Editor = VariantEditor<Arc<dyn VariantStore>>;

/// catalog - option/variant combination editor
#[derive(Parser)]
#[command(name = "catalog")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(flatten)]
    source: SourceArgs,

    /// Print machine-readable JSON instead of text
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct SourceArgs {
    /// Load the product from a JSON snapshot into an in-memory store (wins over a database)
    #[arg(long)]
    snapshot: Option<PathBuf>,

    /// Postgres connection string
    #[arg(long, env = "DATABASE_URL", hide_env_values = true)]
    database_url: Option<String>,

    /// Product to open (required with a database)
    #[arg(long)]
    product: Option<ProductId>,

    /// Apply the schema before opening the product
    #[arg(long, requires = "database_url")]
    migrate: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Show every combination with its variant status
    List,

    /// Show the two-axis grid
    Grid {
        /// Fix an option outside the grid axes, e.g. `--fix Material=Cotton`
        #[arg(long = "fix", value_name = "OPTION=VALUE", value_parser = parse_assignment)]
        fixed: Vec<(String, String)>,
    },

    /// Create variants for every combination that has none
    Generate,

    /// Flip availability of one combination, e.g. `toggle Size=M Color=Blue`
    Toggle {
        #[arg(value_name = "OPTION=VALUE", required = true, value_parser = parse_assignment)]
        values: Vec<(String, String)>,
    },

    /// Mark every generated variant available (or unavailable)
    SetAll {
        #[arg(long)]
        unavailable: bool,
    },

    /// List orphaned variants
    Orphans {
        /// Delete them
        #[arg(long)]
        prune: bool,
    },
}

fn parse_assignment(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((name, value)) if !name.trim().is_empty() && !value.trim().is_empty() => {
            Ok((name.trim().to_string(), value.trim().to_string()))
        }
        _ => Err(format!("expected OPTION=VALUE, got '{raw}'")),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    catalog_observability::init();
    let cli = Cli::parse();

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupted; finishing in-flight request");
            on_interrupt.cancel();
        }
    });

    let mut editor = open_editor(&cli.source).await?;
    run(&mut editor, cli.command, cli.json, &cancel).await
}

async fn open_editor(source: &SourceArgs) -> Result<Editor> {
    let config = CatalogConfig::from_env()?;

    let (store, product_id): (Arc<dyn VariantStore>, ProductId) = match &source.snapshot {
        Some(path) => {
            let json = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read snapshot {}", path.display()))?;
            let snapshot = ProductSnapshot::from_json(&json)
                .with_context(|| format!("invalid snapshot {}", path.display()))?;
            let store: Arc<dyn VariantStore> = Arc::new(InMemoryVariantStore::new());
            let product_id = import_snapshot(store.as_ref(), &snapshot)
                .await
                .context("failed to import snapshot")?;
            (store, product_id)
        }
        None => {
            let url = source
                .database_url
                .clone()
                .or(config.database_url.clone())
                .context("either --snapshot or --database-url/DATABASE_URL is required")?;
            let product_id = source
                .product
                .context("--product is required when reading from a database")?;
            let pool = sqlx::PgPool::connect(&url)
                .await
                .context("failed to connect to Postgres")?;
            let store = PostgresVariantStore::new(pool);
            if source.migrate {
                store.migrate().await.context("failed to apply schema")?;
                info!("schema applied");
            }
            (Arc::new(store) as Arc<dyn VariantStore>, product_id)
        }
    };

    VariantEditor::open(store, product_id, config.editor)
        .await
        .context("failed to open product")
}

async fn run(
    editor: &mut Editor,
    command: Commands,
    json: bool,
    cancel: &CancellationToken,
) -> Result<()> {
    match command {
        Commands::List => {
            let view = editor.list_view();
            if json {
                println!("{}", serde_json::to_string_pretty(&view)?);
            } else {
                print!("{}", render::list(&view));
                for warning in &editor.reconciliation().warnings {
                    println!("warning: {warning}");
                }
            }
        }
        Commands::Grid { fixed } => {
            let filter = grid_filter(editor, &fixed)?;
            let view = editor.grid_view(&filter)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&view)?);
            } else {
                print!("{}", render::grid(&view));
            }
        }
        Commands::Generate => {
            let report = editor
                .generate_variants(cancel)
                .await
                .inspect_err(|e| print_carried_reports(e, json))?;
            print_report(&report, json)?;
        }
        Commands::Toggle { values } => {
            let key = combination_key(editor, &values)?;
            let label = editor.find(&key)?.label();
            let is_available = editor.toggle_availability(&key).await?;
            let state = if is_available { "available" } else { "unavailable" };
            if json {
                println!("{}", serde_json::json!({ "label": label, "is_available": is_available }));
            } else {
                println!("{label}: now {state}");
            }
        }
        Commands::SetAll { unavailable } => {
            let outcome = editor
                .set_all_availability(!unavailable, cancel)
                .await
                .inspect_err(|e| print_carried_reports(e, json))?;
            if let Some(materialized) = &outcome.materialized {
                print_report(materialized, json)?;
            }
            print_report(&outcome.updated, json)?;
        }
        Commands::Orphans { prune } => {
            if prune {
                let report = editor
                    .prune_orphans(cancel)
                    .await
                    .inspect_err(|e| print_carried_reports(e, json))?;
                print_report(&report, json)?;
            } else if json {
                println!("{}", serde_json::to_string_pretty(editor.orphans())?);
            } else {
                print!("{}", render::orphans(editor.options(), editor.orphans()));
            }
        }
    }
    Ok(())
}

fn print_report(report: &BatchReport, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
    } else {
        for notice in report.notices() {
            println!("{notice}");
        }
    }
    if !report.failed.is_empty() {
        bail!("{}", report.summary());
    }
    Ok(())
}

/// Batches that ran before a failed reload still print their rows.
fn print_carried_reports(error: &EditorError, json: bool) {
    for report in error.batch_reports() {
        if let Err(failed) = print_report(report, json) {
            warn!(%failed, "batch had failures");
        }
    }
}

fn grid_filter(editor: &Editor, fixed: &[(String, String)]) -> Result<GridFilter> {
    let mut filter = GridFilter::new();
    for (name, text) in fixed {
        let pair = resolve(editor, name, text)?;
        filter = filter.fix(pair.option_id, pair.value_id);
    }
    Ok(filter)
}

fn combination_key(editor: &Editor, values: &[(String, String)]) -> Result<CombinationKey> {
    let pairs = values
        .iter()
        .map(|(name, text)| resolve(editor, name, text))
        .collect::<Result<Vec<_>>>()?;
    Ok(CombinationKey::new(pairs))
}

/// Option by name and value by text, both case-insensitive.
fn resolve(editor: &Editor, name: &str, text: &str) -> Result<OptionPair> {
    let option = editor
        .options()
        .iter()
        .find(|o| o.name.eq_ignore_ascii_case(name))
        .with_context(|| format!("no option named '{name}'"))?;
    let value = option
        .values
        .iter()
        .find(|v| v.text.eq_ignore_ascii_case(text))
        .with_context(|| format!("option '{}' has no value '{text}'", option.name))?;
    Ok(OptionPair::new(option.id, value.id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn assignments_are_split_on_the_first_equals() {
        assert_eq!(
            parse_assignment(" Size = M "),
            Ok(("Size".to_string(), "M".to_string()))
        );
        assert_eq!(
            parse_assignment("Note=a=b"),
            Ok(("Note".to_string(), "a=b".to_string()))
        );
        assert!(parse_assignment("Size").is_err());
        assert!(parse_assignment("=M").is_err());
    }

    #[test]
    fn grid_fix_flags_parse() {
        let cli = Cli::try_parse_from([
            "catalog",
            "--snapshot",
            "tee.json",
            "grid",
            "--fix",
            "Material=Cotton",
        ])
        .unwrap();
        match cli.command {
            Commands::Grid { fixed } => {
                assert_eq!(fixed, vec![("Material".to_string(), "Cotton".to_string())])
            }
            _ => panic!("expected grid"),
        }
    }
}
