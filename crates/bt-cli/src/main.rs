//! `bt` - behavior tree document runner.
//!
//! Single binary that provides:
//! - `bt run` - load a tree and tick it
//! - `bt check` - validate a document, optionally clearing stale variable names
//! - `bt fmt` - rewrite a document in canonical form
//! - `bt nodes` - list the registered node classes
//! - `bt init` - write a default project configuration

mod config;

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};

use bt_asset::{AssetContext, BehaviorTreeAsset, FsLoader, LoadedTree, TreeDocument};
use bt_core::{GlobalBlackboard, TaskStatus};
use bt_runtime::{BindMode, NodeRegistry};
use bt_tools::JsonLinesSink;

use config::{RuntimeConfig, CONFIG_PATH};

#[derive(Parser)]
#[command(name = "bt")]
#[command(about = "Behavior tree document runner", version)]
struct Cli {
    /// Project root directory
    #[arg(short, long, global = true)]
    project: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load a tree and tick it until its turn completes
    Run {
        /// Document path, relative to the asset root
        asset: String,

        /// Tick limit (defaults to max_ticks from the config)
        #[arg(long)]
        ticks: Option<u64>,

        /// Print status trace events as JSON lines
        #[arg(long)]
        trace: bool,
    },

    /// Validate a document
    Check {
        /// Document path, relative to the asset root
        asset: String,

        /// Write the document back with stale variable names cleared
        #[arg(long)]
        fix: bool,
    },

    /// Print a document in canonical form
    Fmt {
        /// Document path, relative to the asset root
        asset: String,

        /// Rewrite the file instead of printing
        #[arg(long)]
        write: bool,
    },

    /// List registered node classes
    Nodes,

    /// Initialize a new project
    Init,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if cli.verbose {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new("info")
        }
    });

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    // Find project root
    let project_root = match cli.project {
        Some(root) => root,
        None => std::env::current_dir().context("Failed to get current directory")?,
    };

    match cli.command {
        Commands::Run {
            asset,
            ticks,
            trace,
        } => run_tree(&project_root, &asset, ticks, trace),
        Commands::Check { asset, fix } => check_tree(&project_root, &asset, fix),
        Commands::Fmt { asset, write } => format_tree(&project_root, &asset, write),
        Commands::Nodes => list_nodes(),
        Commands::Init => init_project(&project_root),
    }
}

fn load_config(project_root: &Path) -> Result<RuntimeConfig> {
    let mut config = RuntimeConfig::load_from_project(project_root)?;
    config.resolve_paths(project_root);
    Ok(config)
}

fn seed_globals(config: &RuntimeConfig) -> GlobalBlackboard {
    let globals = GlobalBlackboard::process();
    for (key, value) in &config.globals {
        globals.set(key.clone(), value.clone());
    }
    globals
}

fn run_tree(project_root: &Path, asset: &str, ticks: Option<u64>, trace: bool) -> Result<()> {
    let config = load_config(project_root)?;
    tracing::info!(root = %config.asset_root.display(), asset, "Loading tree");

    let registry = NodeRegistry::with_builtins();
    let loader = FsLoader::new(&config.asset_root);
    let ctx = AssetContext::new(&registry, &loader, seed_globals(&config))
        .with_mode(config.mode.into())
        .with_max_depth(config.max_reference_depth);

    let LoadedTree { mut tree, report } = BehaviorTreeAsset::open(&loader, asset)
        .and_then(|mut document| document.instantiate(&ctx))
        .with_context(|| format!("Failed to load tree {asset}"))?;
    for warning in &report.warnings {
        tracing::warn!(%warning, "Load warning");
    }

    if trace || config.trace {
        tree.set_trace_sink(Box::new(JsonLinesSink::new(std::io::stdout())));
    }

    let limit = ticks.unwrap_or(config.max_ticks);
    let mut status = TaskStatus::None;
    while tree.tick_count() < limit {
        status = tree.tick();
        if tree.is_inert() {
            break;
        }
    }

    tracing::info!(ticks = tree.tick_count(), %status, "Run finished");
    println!("{status}");
    Ok(())
}

fn check_tree(project_root: &Path, asset: &str, fix: bool) -> Result<()> {
    let config = load_config(project_root)?;
    let registry = NodeRegistry::with_builtins();
    let loader = FsLoader::new(&config.asset_root);

    // Structure and stale names, without touching references.
    let mut document = BehaviorTreeAsset::open(&loader, asset)
        .with_context(|| format!("Failed to read {asset}"))?;
    let edit = AssetContext::new(&registry, &loader, seed_globals(&config))
        .with_mode(BindMode::EditTime);
    let LoadedTree { mut tree, report } = document
        .instantiate(&edit)
        .with_context(|| format!("{asset} is not a valid tree document"))?;

    // Reference resolution needs a live read.
    let live = AssetContext::new(&registry, &loader, GlobalBlackboard::new())
        .with_max_depth(config.max_reference_depth);
    let references = BehaviorTreeAsset::new(document.document())
        .instantiate(&live)
        .with_context(|| format!("{asset} is not a valid tree document"))?
        .report;

    println!("{asset}: {} tasks", tree.len());
    for name in &report.cleared {
        println!("  stale variable name: {name}");
    }
    for warning in &references.warnings {
        println!("  {warning}");
    }

    if fix && document.is_dirty() {
        document.store(&mut tree)?;
        let path = loader.resolve(asset)?;
        std::fs::write(&path, document.document())
            .with_context(|| format!("Failed to write {}", path.display()))?;
        document.mark_clean();
        println!("  cleared {} stale name(s)", report.cleared.len());
        tracing::info!(path = %path.display(), "Document rewritten");
    } else if !report.cleared.is_empty() {
        bail!("{} stale variable name(s); rerun with --fix", report.cleared.len());
    }

    if !references.warnings.is_empty() {
        bail!("{} unresolved reference(s)", references.warnings.len());
    }
    Ok(())
}

fn format_tree(project_root: &Path, asset: &str, write: bool) -> Result<()> {
    let config = load_config(project_root)?;
    let loader = FsLoader::new(&config.asset_root);
    let path = loader.resolve(asset)?;

    let source = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let formatted = TreeDocument::from_xml(&source)
        .and_then(|document| document.to_xml())
        .with_context(|| format!("{asset} is not a valid tree document"))?;

    if write {
        if formatted != source {
            std::fs::write(&path, &formatted)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            tracing::info!(path = %path.display(), "Document formatted");
        }
    } else {
        println!("{formatted}");
    }
    Ok(())
}

fn list_nodes() -> Result<()> {
    let registry = NodeRegistry::with_builtins();
    for name in registry.class_names() {
        println!("{name}");
    }
    Ok(())
}

fn init_project(project_root: &Path) -> Result<()> {
    let config_path = project_root.join(CONFIG_PATH);
    if let Some(dir) = config_path.parent() {
        std::fs::create_dir_all(dir)?;
    }
    if !config_path.exists() {
        let default_config = r#"# Behavior tree runner configuration

asset_root: trees
max_ticks: 100
max_reference_depth: 8

# live: bind variables and load references; edit: clear stale names only
mode: live
trace: false

globals: {}
"#;
        std::fs::write(&config_path, default_config)?;
    }

    let config = load_config(project_root)?;
    std::fs::create_dir_all(&config.asset_root)?;

    println!("Initialized behavior tree project at {}", project_root.display());
    println!();
    println!("Created:");
    println!("  {CONFIG_PATH} - runner configuration");
    println!("  {} - tree documents", config.asset_root.display());
    println!();
    println!("Next steps:");
    println!("  1. Save a tree document under the asset root");
    println!("  2. Run: bt run <document>");

    Ok(())
}
