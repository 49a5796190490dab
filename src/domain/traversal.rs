//! The cursor-driven, explicit-stack depth-first walker over the store-backed
//! call graph.
//!
//! The graph is never held in memory: each step issues one bounded store
//! query (`next_edge`) keyed by the current frame's method hash and a
//! monotonic call-id cursor, so memory stays bounded by path depth rather
//! than subtree size and every frame is resumable after a deeper return.

use crate::domain::edge::LineWindow;
use crate::domain::error::TaskError;
use crate::domain::extended::ExtendedDataResolver;
use crate::domain::filter::CallFilter;
use crate::domain::ledger::{DisabledLedger, MultiCallLedger};
use crate::domain::method;
use crate::domain::multi_impl::{DispatchIndex, MultiImplRegistry};
use crate::domain::ports::{GraphStore, MethodId};
use crate::domain::render::{self, AnnotationIndex, RenderOptions};
use std::collections::HashSet;
use std::io::Write;

const PROGRESS_LINE_INTERVAL: u64 = 1000;

/// Call ids start at 1; a fresh cursor sits below every real id.
const CURSOR_START: i64 = 0;

/// One live stack frame: the method whose children are being enumerated and
/// the last-considered call id for it. Frames are mutated in place when a
/// depth is re-entered for a new caller context.
#[derive(Debug, Clone)]
pub struct TraversalNode {
    pub method_hash: String,
    pub cursor: i64,
}

impl TraversalNode {
    fn new(method_hash: &str) -> Self {
        Self {
            method_hash: method_hash.to_string(),
            cursor: CURSOR_START,
        }
    }

    fn reset(&mut self, method_hash: &str) {
        self.method_hash.clear();
        self.method_hash.push_str(method_hash);
        self.cursor = CURSOR_START;
    }
}

/// Path-membership cycle check: scan the live stack from `current_depth` down
/// to the root inclusive and return the depth of the first (deepest) frame
/// whose method hash matches the candidate. Frames beyond `current_depth` are
/// stale leftovers of earlier branches and are never consulted.
pub fn find_cycle(
    stack: &[TraversalNode],
    current_depth: usize,
    candidate_hash: &str,
) -> Option<usize> {
    (0..=current_depth)
        .rev()
        .find(|&depth| stack[depth].method_hash == candidate_hash)
}

#[derive(Debug, Clone, Copy, Default)]
pub struct WalkStats {
    /// Lines written to the sink, root line included.
    pub rendered_lines: u64,
}

/// Walks the downward call chain of one root method and renders it to a sink.
pub struct TraversalEngine<'a> {
    pub store: &'a dyn GraphStore,
    pub filter: &'a CallFilter,
    pub options: &'a RenderOptions,
    pub annotations: &'a AnnotationIndex,
    pub resolver: &'a ExtendedDataResolver,
    /// Dispatch points to defer to a later wave; `None` expands them inline.
    pub dispatch: Option<&'a DispatchIndex>,
    pub registry: &'a MultiImplRegistry,
    pub disabled: &'a DisabledLedger,
    pub multi_call: &'a MultiCallLedger,
}

impl TraversalEngine<'_> {
    /// Render the full chain below `root`, the root line first. The optional
    /// line window restricts direct children (depth 0) only.
    pub fn walk(
        &self,
        root: &MethodId,
        window: Option<&LineWindow>,
        out: &mut dyn Write,
    ) -> Result<WalkStats, TaskError> {
        let mut stack = vec![TraversalNode::new(&root.method_hash)];
        let mut depth = 0usize;
        let mut stats = WalkStats::default();

        // Per-depth rendered-label sets for duplicate suppression. A frame's
        // set is created anew on every descent into that depth and dropped on
        // backtrack; the root set lives for the whole walk.
        let mut seen: Vec<Option<HashSet<String>>> = Vec::new();
        if self.options.dedup_callee_in_caller {
            seen.push(Some(HashSet::new()));
        }

        out.write_all(root.full_method.as_bytes())?;
        out.write_all(b"\n")?;
        stats.rendered_lines = 1;

        loop {
            let frame_window = if depth == 0 { window } else { None };
            let edge = {
                let node = &stack[depth];
                self.store
                    .next_edge(&node.method_hash, node.cursor, frame_window)
                    .map_err(TaskError::Store)?
            };

            let Some(edge) = edge else {
                if depth == 0 {
                    return Ok(stats);
                }
                if self.options.dedup_callee_in_caller {
                    seen[depth] = None;
                }
                depth -= 1;
                continue;
            };

            // Advance immediately so re-entry after a deeper return resumes
            // behind this sibling.
            stack[depth].cursor = edge.call_id;

            if !edge.enabled {
                self.disabled.record(&edge);
                continue;
            }
            if self.filter.should_skip(&edge) {
                continue;
            }

            let dispatch_kind = self
                .dispatch
                .and_then(|index| index.kind_of(&edge.callee_method_hash));

            let mut label = render::callee_label(&edge, self.options.detail);
            if self.options.show_annotations
                && let Some(suffix) = self.annotations.suffix(&edge.callee_method_hash)
            {
                label.push_str(suffix);
            }

            if let Some(kind) = dispatch_kind {
                // Rendered as a leaf carrying a cross reference to the
                // artifact a later wave will produce for this dispatch point.
                // Must derive the same name a follow-up task derives for it.
                let base_name = render::artifact_base_name(
                    method::simple_class_of_method(&edge.callee_full_method),
                    method::method_name(&edge.callee_full_method),
                    &edge.callee_method_hash,
                );
                render::append_extended_data(
                    &mut label,
                    &crate::domain::edge::ExtendedData::new(
                        render::JUMP_DATA_TYPE,
                        base_name.clone(),
                    ),
                );
                if self
                    .registry
                    .record(&edge.callee_method_hash, kind, &base_name)
                {
                    tracing::info!(
                        dispatch = %edge.callee_method_hash,
                        kind = ?kind,
                        "deferred dispatch point to next wave"
                    );
                }
            } else if let Some(data) = self.resolver.resolve(self.store, &edge)? {
                render::append_extended_data(&mut label, &data);
            }

            if self.options.dedup_callee_in_caller
                && let Some(frame_seen) = seen[depth].as_mut()
                && !frame_seen.insert(label.clone())
            {
                tracing::debug!(depth, label = %label, "suppressing duplicate callee");
                continue;
            }

            let cycle = find_cycle(&stack, depth, &edge.callee_method_hash);

            let mut line = render::level_prefix(depth + 1);
            if self.options.show_caller_line {
                line.push_str(&render::caller_location(&edge));
            }
            line.push_str(&label);
            if let Some(ancestor) = cycle {
                line.push_str(&render::cycle_marker(ancestor));
            }
            line.push('\n');
            out.write_all(line.as_bytes())?;

            stats.rendered_lines += 1;
            if stats.rendered_lines % PROGRESS_LINE_INTERVAL == 0 {
                tracing::info!(
                    root = %root.full_method,
                    lines = stats.rendered_lines,
                    "call chain still growing"
                );
            }

            self.multi_call.record(&edge);

            if dispatch_kind.is_some() {
                continue;
            }
            if let Some(ancestor) = cycle {
                tracing::debug!(
                    callee = %edge.callee_full_method,
                    ancestor,
                    "cycle closed, not descending"
                );
                continue;
            }

            depth += 1;
            if depth == stack.len() {
                stack.push(TraversalNode::new(&edge.callee_method_hash));
            } else {
                stack[depth].reset(&edge.callee_method_hash);
            }
            if self.options.dedup_callee_in_caller {
                while seen.len() <= depth {
                    seen.push(None);
                }
                seen[depth] = Some(HashSet::new());
            }
        }
    }
}
