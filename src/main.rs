use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use branchrl::agent::{DqnAgent, LossExport};
use branchrl::config::AppConfig;
use branchrl::env::SearchEnv;
use branchrl::solver::KnapsackInstance;
use branchrl::training::Trainer;

/// Train a branching-control agent on a knapsack instance.
#[derive(Parser)]
#[command(name = "branchrl", about = "Learned branching for branch-and-bound")]
struct Cli {
    /// Path to TOML configuration file
    #[arg(long, default_value = "branchrl.toml")]
    config: PathBuf,

    /// Override number of training epochs
    #[arg(long)]
    epochs: Option<usize>,

    /// Override the per-episode decision-cycle cap
    #[arg(long)]
    iteration_cap: Option<usize>,

    /// Override the built-in instance to train on
    #[arg(long)]
    instance: Option<String>,

    /// Override the artifact output directory
    #[arg(long)]
    out_dir: Option<PathBuf>,

    /// Fix the run seed for reproducibility
    #[arg(long)]
    seed: Option<u64>,

    /// Verbose logging
    #[arg(long, short)]
    verbose: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();

    let mut config = AppConfig::load_or_default(&cli.config)
        .with_context(|| format!("loading config from {}", cli.config.display()))?;

    if let Some(epochs) = cli.epochs {
        config.training.epochs = epochs;
    }
    if let Some(iteration_cap) = cli.iteration_cap {
        config.training.iteration_cap = iteration_cap;
    }
    if let Some(instance) = cli.instance {
        config.instance = instance;
    }
    if let Some(out_dir) = cli.out_dir {
        config.export.out_dir = out_dir;
    }
    if let Some(seed) = cli.seed {
        config.seed = Some(seed);
    }
    config.validate().context("validating configuration")?;

    std::fs::create_dir_all(&config.export.out_dir)
        .with_context(|| format!("creating {}", config.export.out_dir.display()))?;

    let instance =
        KnapsackInstance::by_name(&config.instance).context("resolving instance")?;
    log::info!(
        "training on instance '{}' ({} items, {} knapsacks)",
        config.instance,
        instance.num_items(),
        instance.num_knapsacks()
    );

    let mut env = SearchEnv::new(
        instance,
        config.search.clone(),
        &config.export,
        config.seed,
    );
    let mut agent = DqnAgent::new(config.dqn.clone(), config.seed).with_loss_export(LossExport {
        dir: config.export.out_dir.clone(),
        interval: config.export.loss_flush_interval,
    });
    let trainer = Trainer::new(config.training.clone(), &config.export);

    let report = trainer.train(&mut agent, &mut env)?;
    println!(
        "Finished {} epochs; best mean reward {:.2}; artifacts in {}",
        report.epochs_run,
        report.best_mean_reward,
        config.export.out_dir.display()
    );
    Ok(())
}
