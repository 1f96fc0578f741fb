//! Print the units found under one or more roots and their load order
//!
//! Usage:
//!   component-plan --root <dir> [--root <dir>...] [--ignore <pattern>...]
//!   component-plan --config loader.toml [--load]
//!
//! Without `--load` nothing is loaded; the order is computed only. With
//! `--load` a full pass runs against a loader that just logs each name.

use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};

use component_loader::packaging::LoadPlan;
use component_loader::utils::init_logging_from_config;
use component_loader::{Loader, LoaderConfig, LoggingConfig, PackagingManager};

#[derive(Parser, Debug)]
#[command(name = "component-plan", about = "Show discovered units and their load order")]
struct Args {
    /// Configuration file (.toml or .json)
    #[arg(long, short)]
    config: Option<PathBuf>,

    /// Root unit directory; may be repeated, overrides configured roots
    #[arg(long = "root", short)]
    roots: Vec<PathBuf>,

    /// Unit name pattern to ignore; may be repeated
    #[arg(long = "ignore")]
    ignored_units: Vec<String>,

    /// Module loaded first in every unit that has it
    #[arg(long)]
    base_component: Option<String>,

    /// Run a full load pass instead of only planning
    #[arg(long)]
    load: bool,

    /// Log filter (e.g. "debug"); RUST_LOG takes precedence
    #[arg(long)]
    log_filter: Option<String>,
}

/// Loader that only logs what it is asked to load
struct LoggingLoader;

impl Loader for LoggingLoader {
    type Handle = ();

    fn load(&self, name: &str) -> anyhow::Result<()> {
        info!(name, "load");
        Ok(())
    }
}

fn build_config(args: &Args) -> anyhow::Result<LoaderConfig> {
    let mut config = match &args.config {
        Some(path) => LoaderConfig::from_file(path)?,
        None => LoaderConfig::default(),
    };

    if !args.roots.is_empty() {
        config.roots = args.roots.clone();
    }
    config.ignored_units.extend(args.ignored_units.iter().cloned());
    if args.base_component.is_some() {
        config.base_component = args.base_component.clone();
    }
    if args.log_filter.is_some() {
        let logging = config.logging.get_or_insert_with(LoggingConfig::default);
        logging.filter = args.log_filter.clone();
    }

    anyhow::ensure!(
        !config.roots.is_empty(),
        "No roots given; pass --root or a config file with roots"
    );
    Ok(config)
}

fn print_plan(plan: &LoadPlan) {
    for root in &plan.roots {
        println!("{}", root.root.display());
        for unit in root.table.iter() {
            println!("  {}", unit.name);
            for module in &unit.modules {
                println!("    - {}", module);
            }
        }
    }

    println!();
    println!("Load order:");
    for (position, unit) in plan.order.iter().enumerate() {
        println!("  {:>3}. {}", position + 1, unit);
    }
}

fn run(args: &Args) -> anyhow::Result<()> {
    let config = build_config(args)?;
    init_logging_from_config(config.logging.as_ref());

    let manager = PackagingManager::new(config, LoggingLoader)?;

    if args.load {
        manager.load_components()?;
        println!("Loaded {} units:", manager.loaded_units().len());
        for unit in manager.loaded_units() {
            println!("  {}", unit);
        }
    } else {
        print_plan(&manager.plan()?);
    }

    Ok(())
}

fn main() -> ExitCode {
    let args = Args::parse();

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
