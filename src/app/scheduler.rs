//! Staged concurrent execution of root tasks.
//!
//! Tasks of one wave run on a bounded worker pool and the wave boundary is a
//! hard barrier: dispatch points discovered in wave N must all be known
//! before wave N+1's task set is computed. The pool may grow between waves
//! (never shrink), bounded by the configured maximum.

use crate::app::task::{self, RootTask};
use crate::domain::error::TaskError;
use crate::domain::extended::ExtendedDataResolver;
use crate::domain::filter::CallFilter;
use crate::domain::ledger::{DisabledLedger, MultiCallLedger};
use crate::domain::method;
use crate::domain::multi_impl::{DispatchIndex, MultiImplRegistry};
use crate::domain::ports::{GraphStore, StoreProvider};
use crate::domain::render::{self, AnnotationIndex, RenderOptions};
use crate::domain::traversal::TraversalEngine;
use anyhow::Result;
use crossbeam_channel::Receiver;
use dashmap::{DashMap, DashSet};
use std::fs::{self, File};
use std::io::{BufWriter, Write as _};
use std::path::PathBuf;
use std::sync::Mutex;

/// Everything a worker needs, shared read-only across the pool except for the
/// concurrently-mutated registries (which provide their own atomicity).
pub struct RunContext {
    pub provider: Box<dyn StoreProvider>,
    pub filter: CallFilter,
    pub options: RenderOptions,
    pub annotations: AnnotationIndex,
    pub resolver: ExtendedDataResolver,
    /// `None` expands dispatch points inline instead of deferring them.
    pub dispatch: Option<DispatchIndex>,
    pub registry: MultiImplRegistry,
    pub disabled: DisabledLedger,
    pub multi_call: MultiCallLedger,
    /// Artifact paths already produced this run; duplicate tasks are skipped.
    pub written: DashSet<PathBuf>,
    /// Configured task text -> artifact path.
    pub mapping: DashMap<String, PathBuf>,
    /// Origin text of failed tasks; `None` for synthetic follow-up tasks.
    pub failures: Mutex<Vec<Option<String>>>,
    pub out_dir: PathBuf,
}

impl RunContext {
    fn record_failure(&self, origin_text: Option<String>) {
        self.failures.lock().unwrap().push(origin_text);
    }

    pub fn failed_tasks(&self) -> Vec<Option<String>> {
        self.failures.lock().unwrap().clone()
    }
}

#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub waves: usize,
    pub tasks_run: usize,
    pub failed: Vec<Option<String>>,
}

impl RunSummary {
    pub fn succeeded(&self) -> bool {
        self.failed.is_empty()
    }
}

pub struct WaveScheduler {
    pool_size: usize,
    max_pool: usize,
}

impl WaveScheduler {
    pub fn new(max_pool: usize) -> Self {
        Self {
            pool_size: 0,
            max_pool: max_pool.max(1),
        }
    }

    /// Run wave 1 and every follow-up wave until a drain yields nothing new.
    pub fn run(&mut self, ctx: &RunContext, first_wave: Vec<RootTask>) -> Result<RunSummary> {
        let mut wave = first_wave;
        let mut summary = RunSummary::default();

        while !wave.is_empty() {
            summary.waves += 1;
            summary.tasks_run += wave.len();
            self.pool_size = self.pool_size.max(wave.len().min(self.max_pool));
            tracing::info!(
                wave = summary.waves,
                tasks = wave.len(),
                workers = self.pool_size,
                "starting wave"
            );

            self.run_wave(ctx, wave);

            // Barrier passed; expand the dispatch points found this wave.
            let store = ctx.provider.open_store()?;
            wave = ctx
                .registry
                .drain_wave_tasks(store.as_ref())?
                .into_iter()
                .map(RootTask::from_follow_up)
                .collect();
        }

        tracing::info!(waves = summary.waves, tasks = summary.tasks_run, "all waves finished");
        summary.failed = ctx.failed_tasks();
        Ok(summary)
    }

    /// Execute one wave and wait for every task. The channel is bounded by
    /// the pool size, so submission applies backpressure once the pool is
    /// saturated.
    fn run_wave(&self, ctx: &RunContext, tasks: Vec<RootTask>) {
        let (tx, rx) = crossbeam_channel::bounded::<RootTask>(self.pool_size);

        std::thread::scope(|scope| {
            for worker in 0..self.pool_size {
                let rx = rx.clone();
                scope.spawn(move || worker_loop(ctx, worker, rx));
            }
            drop(rx);

            for task in tasks {
                let origin_text = task.origin_text.clone();
                if tx.send(task).is_err() {
                    // Every worker exited before taking work (e.g. no store
                    // connection could be opened).
                    ctx.record_failure(origin_text);
                }
            }
            drop(tx);
        });
    }
}

fn worker_loop(ctx: &RunContext, worker: usize, rx: Receiver<RootTask>) {
    let store = match ctx.provider.open_store() {
        Ok(store) => store,
        Err(err) => {
            tracing::error!(worker, error = %format!("{err:#}"), "failed to open a store connection");
            return;
        }
    };

    for task in rx.iter() {
        let origin_text = task.origin_text.clone();
        match execute_task(ctx, store.as_ref(), &task) {
            Ok(()) => {}
            Err(err) => {
                tracing::error!(
                    worker,
                    task = origin_text.as_deref().unwrap_or("<follow-up>"),
                    error = %err,
                    "task failed"
                );
                ctx.record_failure(origin_text);
            }
        }
    }
}

/// Execute one root task to completion: resolve the entry, derive the
/// artifact path, dedup, and walk.
pub fn execute_task(
    ctx: &RunContext,
    store: &dyn GraphStore,
    task: &RootTask,
) -> Result<(), TaskError> {
    let artifact_dir = match &task.save_subdir {
        Some(subdir) => ctx.out_dir.join(subdir),
        None => ctx.out_dir.clone(),
    };

    let Some(root) = task::resolve_root(store, &ctx.filter, task)? else {
        // An unresolved entry point is a reportable outcome, not a defect.
        fs::create_dir_all(&artifact_dir)?;
        let marker = artifact_dir.join(render::empty_artifact_name(
            method::simple_class_of(&task.class_name),
            &task.target_label(),
        ));
        File::create(&marker)?;
        tracing::warn!(marker = %marker.display(), "wrote empty marker artifact");
        return Ok(());
    };

    tracing::info!(
        root = %root.full_method,
        hash = %root.method_hash,
        "resolved entry method"
    );

    let base_name = render::artifact_base_name(
        method::simple_class_of_method(&root.full_method),
        method::method_name(&root.full_method),
        &root.method_hash,
    );
    let artifact_path =
        artifact_dir.join(render::artifact_file_name(&base_name, task.line_window.as_ref()));

    if let Some(origin_text) = &task.origin_text {
        ctx.mapping.insert(origin_text.clone(), artifact_path.clone());
    }

    if !ctx.written.insert(artifact_path.clone()) {
        tracing::info!(
            artifact = %artifact_path.display(),
            "artifact already produced this run, skipping"
        );
        return Ok(());
    }

    fs::create_dir_all(&artifact_dir)?;
    let file = File::create(&artifact_path)?;
    let mut out = BufWriter::new(file);

    let engine = TraversalEngine {
        store,
        filter: &ctx.filter,
        options: &ctx.options,
        annotations: &ctx.annotations,
        resolver: &ctx.resolver,
        dispatch: ctx.dispatch.as_ref(),
        registry: &ctx.registry,
        disabled: &ctx.disabled,
        multi_call: &ctx.multi_call,
    };
    let stats = engine.walk(&root, task.line_window.as_ref(), &mut out)?;
    out.flush()?;

    tracing::info!(
        artifact = %artifact_path.display(),
        lines = stats.rendered_lines,
        "task finished"
    );
    Ok(())
}
