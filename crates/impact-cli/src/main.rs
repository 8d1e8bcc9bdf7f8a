use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use impact_config::ImpactConfig;
use impact_index::{
    build_index, open_store, BuildOptions, BuildSummary, HierarchyRecord, MethodRefRecord,
    QueryEngine, QueryOptions, QuerySummary,
};
use serde::Serialize;

#[derive(Parser)]
#[command(
    name = "impact",
    version,
    about = "Virtual-dispatch impact index over compiled JVM archives"
)]
struct Cli {
    /// TOML config file (defaults to $IMPACT_CONFIG)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Index store directory (overrides config and $IMPACT_STORE_DIR)
    #[arg(long, global = true)]
    store: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Index every archive under a directory, replacing the existing store
    Build(BuildArgs),
    /// List call sites of METHOD whose target is CLASS or a subtype of it
    Query(QueryArgs),
    /// Show the recorded supertypes of a class
    Class(ClassArgs),
}

#[derive(Args)]
struct BuildArgs {
    /// Directory to search for archives
    root: PathBuf,
    /// Emit JSON suitable for CI
    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct QueryArgs {
    /// Class that would receive the override (binary or internal name)
    class: String,
    /// Method name
    method: String,
    /// Emit JSON suitable for CI
    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct ClassArgs {
    /// Class name (binary or internal name)
    class: String,
    /// Emit JSON suitable for CI
    #[arg(long)]
    json: bool,
}

fn main() {
    let cli = Cli::parse();
    let exit_code = match run(cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{:#}", err);
            2
        }
    };

    std::process::exit(exit_code);
}

fn run(cli: Cli) -> Result<i32> {
    let (config, unknown_keys) =
        ImpactConfig::resolve(cli.config.as_deref(), cli.store.as_deref())
            .context("failed to load configuration")?;
    impact_config::init_tracing(&config.logging);
    for key in &unknown_keys {
        tracing::warn!(target: "impact.config", key = %key, "ignoring unknown config key");
    }

    match cli.command {
        Command::Build(args) => {
            if !args.root.is_dir() {
                anyhow::bail!("{} is not a directory", args.root.display());
            }
            let options = BuildOptions::from_config(&config);
            let summary = build_index(&args.root, &options)
                .with_context(|| format!("failed to build index from {}", args.root.display()))?;
            let report = BuildReport {
                root: args.root,
                store: options.store_dir,
                summary,
            };
            print_output(&report, args.json)?;
            Ok(0)
        }
        Command::Query(args) => {
            let store_dir = config.store.path();
            let reader = open_store(&store_dir)
                .with_context(|| format!("failed to open index at {}", store_dir.display()))?;
            let engine = QueryEngine::new(&reader, QueryOptions::from(config.query));

            let mut sites = engine.query(&args.class, &args.method)?;
            let mut matches = Vec::new();
            for site in sites.by_ref() {
                let site = site.context("index is corrupt")?;
                if !args.json {
                    println!("{site}");
                }
                matches.push(site);
            }
            let report = QueryReport {
                matches,
                summary: sites.summary(),
            };
            print_output(&report, args.json)?;
            Ok(0)
        }
        Command::Class(args) => {
            let store_dir = config.store.path();
            let reader = open_store(&store_dir)
                .with_context(|| format!("failed to open index at {}", store_dir.display()))?;
            let engine = QueryEngine::new(&reader, QueryOptions::from(config.query));
            let records = engine.find_class(&args.class)?;
            print_output(&ClassReport { records }, args.json)?;
            Ok(0)
        }
    }
}

#[derive(Serialize)]
struct BuildReport {
    root: PathBuf,
    store: PathBuf,
    #[serde(flatten)]
    summary: BuildSummary,
}

#[derive(Serialize)]
struct QueryReport {
    matches: Vec<MethodRefRecord>,
    summary: QuerySummary,
}

#[derive(Serialize)]
struct ClassReport {
    records: Vec<HierarchyRecord>,
}

fn print_output<T: Serialize + 'static>(value: &T, json: bool) -> Result<()> {
    if json {
        let out = serde_json::to_string_pretty(value)?;
        println!("{out}");
        return Ok(());
    }

    // Human output for the report types. Everything else falls back to pretty JSON.
    let any = value as &dyn std::any::Any;
    if let Some(report) = any.downcast_ref::<BuildReport>() {
        let summary = &report.summary;
        println!("indexed: {}", report.root.display());
        println!("  store: {}", report.store.display());
        println!("  archives: {}", summary.archives);
        println!("  classes: {}", summary.classes);
        println!("  method_refs: {}", summary.method_refs);
        println!("  failures: {}", summary.failures.len());
        for failure in &summary.failures {
            println!("    {}: {}", failure.archive.display(), failure.error);
        }
        println!("  store_bytes: {}", summary.store_bytes);
        println!("  elapsed_ms: {}", summary.elapsed.as_millis());
    } else if let Some(report) = any.downcast_ref::<QueryReport>() {
        // Matches are streamed while the query runs.
        let summary = &report.summary;
        println!("summary:");
        println!("  scanned: {}", summary.scanned);
        println!("  matches: {}", summary.matched);
        println!("  budget_exhausted: {}", summary.budget_exhausted);
        println!("  elapsed_ms: {}", summary.elapsed.as_millis());
    } else if let Some(report) = any.downcast_ref::<ClassReport>() {
        if report.records.is_empty() {
            println!("class not found in index");
        }
        for record in &report.records {
            println!("{} ({})", record.class_name, record.archive_path);
            if let Some(super_class) = &record.super_class {
                println!("  extends: {super_class}");
            }
            if !record.interfaces.is_empty() {
                println!("  implements: {}", record.interfaces.join(", "));
            }
        }
    } else {
        let out = serde_json::to_string_pretty(value)?;
        println!("{out}");
    }
    Ok(())
}
