//! Orchestration: wires configuration, store, registries and the scheduler
//! into one run.

pub mod report;
pub mod scheduler;
pub mod task;

use crate::config::AppConfig;
use crate::domain::extended::ExtendedDataResolver;
use crate::domain::ledger::{DisabledLedger, MultiCallLedger};
use crate::domain::multi_impl::{DispatchIndex, MultiImplRegistry};
use crate::domain::ports::{ExtendedDataProducer, ExtendedDataSupplement, StoreProvider};
use crate::domain::render::AnnotationIndex;
use anyhow::{Context as _, Result, ensure};
use scheduler::{RunContext, RunSummary, WaveScheduler};
use std::fs;
use std::path::PathBuf;

/// Programmatically registered extension points. The CLI runs without any;
/// library consumers register their own.
#[derive(Default)]
pub struct Plugins {
    pub producers: Vec<Box<dyn ExtendedDataProducer>>,
    pub supplements: Vec<Box<dyn ExtendedDataSupplement>>,
}

#[derive(Debug)]
pub struct RunOutcome {
    pub summary: RunSummary,
    pub out_dir: PathBuf,
}

/// Execute every configured root task, wave by wave, and write the run-level
/// reports. Produced artifacts are retained even when tasks failed; the
/// mapping file is only written for fully successful runs.
pub fn run(config: &AppConfig, provider: Box<dyn StoreProvider>, plugins: Plugins) -> Result<RunOutcome> {
    config.validate()?;

    let main_store = provider
        .open_store()
        .context("failed to open the main store connection")?;

    let first_wave = task::build_root_tasks(&config.entry_methods, main_store.as_ref())?;
    ensure!(
        !first_wave.is_empty(),
        "the configured entry methods produced no runnable tasks"
    );

    let dispatch = if config.output.multi_impl_in_place {
        None
    } else {
        Some(
            DispatchIndex::load(main_store.as_ref())
                .context("failed to load dispatch-point index")?,
        )
    };
    let resolver = ExtendedDataResolver::load(
        main_store.as_ref(),
        plugins.producers,
        plugins.supplements,
    )
    .context("failed to initialize extended-data resolution")?;
    let annotations = if config.output.show_annotations {
        AnnotationIndex::from_annotations(
            main_store
                .load_annotations()
                .context("failed to load method annotations")?,
        )
    } else {
        AnnotationIndex::default()
    };
    drop(main_store);

    let out_dir = config.output.dir.clone();
    fs::create_dir_all(&out_dir)
        .with_context(|| format!("failed to create output directory {}", out_dir.display()))?;

    let ctx = RunContext {
        provider,
        filter: config.call_filter(),
        options: config.render_options(),
        annotations,
        resolver,
        dispatch,
        registry: MultiImplRegistry::new(),
        disabled: DisabledLedger::new(),
        multi_call: MultiCallLedger::new(),
        written: Default::default(),
        mapping: Default::default(),
        failures: Default::default(),
        out_dir: out_dir.clone(),
    };

    let mut wave_scheduler = WaveScheduler::new(config.pool.threads);
    let summary = wave_scheduler.run(&ctx, first_wave)?;

    report::write_notice_files(&ctx.multi_call, &ctx.disabled, &out_dir)?;
    if summary.succeeded() {
        report::write_mapping_file(&ctx.mapping, &out_dir)?;
    } else {
        tracing::error!(
            failed = summary.failed.len(),
            "run finished with failed tasks; skipping the mapping file"
        );
    }

    Ok(RunOutcome { summary, out_dir })
}
