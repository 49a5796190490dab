use anyhow::{Result, bail};
use callchain::app::{self, Plugins};
use callchain::cli::Cli;
use callchain::config::AppConfig;
use clap::Parser;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let mut config = AppConfig::load(&cli.config)?;
    if let Some(output_dir) = cli.output_dir.clone() {
        config.output.dir = output_dir;
    }
    if let Some(threads) = cli.threads {
        config.pool.threads = threads;
    }

    let provider = cli.store_provider()?;
    let outcome = app::run(&config, provider, Plugins::default())?;

    if !outcome.summary.succeeded() {
        for failed in &outcome.summary.failed {
            tracing::error!(task = failed.as_deref().unwrap_or("<follow-up>"), "failed task");
        }
        bail!(
            "{} of {} task(s) failed; successful artifacts kept in {}",
            outcome.summary.failed.len(),
            outcome.summary.tasks_run,
            outcome.out_dir.display()
        );
    }

    println!(
        "rendered {} task(s) across {} wave(s) into {}",
        outcome.summary.tasks_run,
        outcome.summary.waves,
        outcome.out_dir.display()
    );
    Ok(())
}
