//! Root-task specifications: parsing the configured entry list and resolving
//! entries into concrete method identities.

use crate::domain::error::TaskError;
use crate::domain::filter::CallFilter;
use crate::domain::method;
use crate::domain::multi_impl::FollowUpTask;
use crate::domain::ports::{GraphStore, MethodId};
use crate::domain::edge::LineWindow;
use anyhow::{Context as _, Result, bail};
use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;

static LINE_WINDOW_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+)-(\d+)$").expect("line-window pattern is valid"));

/// What a root task points at within its class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RootTarget {
    /// Method-name(-with-args) prefix, e.g. `test1` or `test1(java.lang.String)`
    Method(String),
    /// A source line inside the wanted method
    Line(u32),
}

/// One unit of scheduled work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RootTask {
    /// Originating configuration text; `None` for synthetic follow-up tasks
    /// and whole-class expansions.
    pub origin_text: Option<String>,
    /// Simple or fully qualified class name
    pub class_name: String,
    pub target: RootTarget,
    /// Depth-0 caller-line restriction
    pub line_window: Option<LineWindow>,
    /// Subdirectory for multi-impl follow-up artifacts
    pub save_subdir: Option<String>,
}

impl RootTask {
    pub fn from_follow_up(follow_up: FollowUpTask) -> Self {
        Self {
            origin_text: None,
            class_name: follow_up.class_name,
            target: RootTarget::Method(follow_up.method_with_args),
            line_window: None,
            save_subdir: Some(follow_up.save_subdir),
        }
    }

    /// Label used in the empty marker artifact name.
    pub fn target_label(&self) -> String {
        match &self.target {
            RootTarget::Method(name) => name.clone(),
            RootTarget::Line(line) => line.to_string(),
        }
    }
}

/// One parsed configuration entry.
#[derive(Debug, Clone, PartialEq, Eq)]
enum TaskEntry {
    /// Bare class name: every caller method of the class becomes a task.
    WholeClass { class_name: String },
    Single(RootTask),
}

/// Parse one entry. Accepted forms:
/// `Class`, `Class:method`, `Class:lineNumber`, the latter two optionally
/// followed by ` start-end` restricting depth-0 caller lines.
fn parse_task_entry(text: &str) -> Result<TaskEntry> {
    let text = text.trim();
    if !text.contains(' ') && !text.contains(':') {
        if text.is_empty() {
            bail!("empty task entry");
        }
        return Ok(TaskEntry::WholeClass {
            class_name: text.to_string(),
        });
    }

    let (left, window) = match text.split_once(' ') {
        None => (text, None),
        Some((left, right)) => {
            let captures = LINE_WINDOW_RE.captures(right.trim()).with_context(|| {
                format!("invalid line window in {text:?}, expected `start-end` with positive numbers")
            })?;
            let start: u32 = captures[1].parse()?;
            let end: u32 = captures[2].parse()?;
            if start == 0 || end == 0 {
                bail!("line window bounds must be positive in {text:?}");
            }
            if start > end {
                bail!("line window start exceeds end in {text:?}");
            }
            (left, Some(LineWindow { start, end }))
        }
    };

    let Some((class_name, target_text)) = left.split_once(':') else {
        bail!(
            "invalid task entry {text:?}, expected `Class`, `Class:method` or `Class:lineNumber`"
        );
    };
    if class_name.trim().is_empty() || target_text.trim().is_empty() {
        bail!("task entry {text:?} has an empty class or target");
    }

    let target = match target_text.parse::<u32>() {
        Ok(line) if line > 0 => RootTarget::Line(line),
        Ok(_) => bail!("line number must be positive in {text:?}"),
        Err(_) => RootTarget::Method(target_text.to_string()),
    };

    Ok(TaskEntry::Single(RootTask {
        origin_text: Some(text.to_string()),
        class_name: class_name.to_string(),
        target,
        line_window: window,
        save_subdir: None,
    }))
}

/// Parse and expand the configured entry list into the first wave's tasks.
/// Whole-class entries are expanded through the store; duplicate entries and
/// entries for already-expanded classes are collapsed with a warning.
pub fn build_root_tasks(entries: &[String], store: &dyn GraphStore) -> Result<Vec<RootTask>> {
    let mut expanded_classes: HashSet<String> = HashSet::new();
    let mut seen_entries: HashSet<String> = HashSet::new();
    let mut tasks = Vec::new();

    for entry in entries {
        if !seen_entries.insert(entry.trim().to_string()) {
            tracing::warn!(entry = %entry, "duplicate task entry, skipping");
            continue;
        }
        match parse_task_entry(entry)? {
            TaskEntry::WholeClass { class_name } => {
                if !expanded_classes.insert(class_name.clone()) {
                    tracing::warn!(class = %class_name, "class already expanded, skipping");
                    continue;
                }
                let methods = store
                    .class_methods(&class_name)
                    .with_context(|| format!("failed to list methods of {class_name}"))?;
                if methods.is_empty() {
                    tracing::warn!(class = %class_name, "class has no caller methods");
                }
                for full_method in methods {
                    tasks.push(RootTask {
                        origin_text: None,
                        class_name: class_name.clone(),
                        target: RootTarget::Method(
                            method::method_with_args(&full_method).to_string(),
                        ),
                        line_window: None,
                        save_subdir: None,
                    });
                }
            }
            TaskEntry::Single(task) => {
                if expanded_classes.contains(&task.class_name) {
                    tracing::warn!(
                        entry = %entry,
                        "class already expanded as a whole, skipping explicit entry"
                    );
                    continue;
                }
                tasks.push(task);
            }
        }
    }

    Ok(tasks)
}

/// Locate the concrete root method of a task. `Ok(None)` means the entry
/// could not be found, which is a reportable outcome (empty marker artifact),
/// not a failure.
pub fn resolve_root(
    store: &dyn GraphStore,
    filter: &CallFilter,
    task: &RootTask,
) -> Result<Option<MethodId>, TaskError> {
    match &task.target {
        RootTarget::Method(prefix) => {
            let candidates = store
                .find_entry_methods(&task.class_name, prefix)
                .map_err(TaskError::Store)?;
            let mut kept: Vec<MethodId> = candidates
                .into_iter()
                .filter(|candidate| {
                    !filter.is_entry_ignored(method::method_with_args(&candidate.full_method))
                })
                .collect();
            match kept.len() {
                0 => {
                    tracing::warn!(
                        class = %task.class_name,
                        method = %prefix,
                        "entry method not found in the call table"
                    );
                    Ok(None)
                }
                1 => Ok(Some(kept.remove(0))),
                _ => Err(TaskError::AmbiguousEntry {
                    class: task.class_name.clone(),
                    method: prefix.clone(),
                    candidates: kept.into_iter().map(|m| m.full_method).collect(),
                }),
            }
        }
        RootTarget::Line(line) => {
            let found = store
                .find_method_by_line(&task.class_name, *line)
                .map_err(TaskError::Store)?;
            if found.is_none() {
                tracing::warn!(
                    class = %task.class_name,
                    line,
                    "no method contains the requested line"
                );
            }
            Ok(found)
        }
    }
}
