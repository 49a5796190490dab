use crate::domain::edge::CallEdge;
use crate::domain::method;

/// Ignore rules applied while walking the call chain.
///
/// `support_ignore` gates the per-edge rules; the entry-method prefixes are
/// always active since they disambiguate root resolution.
#[derive(Debug, Clone, Default)]
pub struct CallFilter {
    pub support_ignore: bool,
    /// Entry methods whose name-with-args starts with one of these are
    /// dropped from root resolution.
    pub entry_method_prefixes: Vec<String>,
    /// Callee full methods (class + method + args) starting with one of these
    /// are skipped.
    pub full_method_prefixes: Vec<String>,
    /// Callee classes containing one of these keywords are skipped.
    pub class_keywords: Vec<String>,
    /// Callee method names (with args) starting with one of these are skipped.
    pub method_prefixes: Vec<String>,
}

impl CallFilter {
    /// Whether an edge accepted from the store should be silently skipped
    /// (cursor advances, no rendering, no descent).
    pub fn should_skip(&self, edge: &CallEdge) -> bool {
        if !self.support_ignore {
            return false;
        }

        let callee = edge.callee_full_method.as_str();
        if self
            .full_method_prefixes
            .iter()
            .any(|p| callee.starts_with(p.as_str()))
        {
            tracing::debug!(callee, "skipping callee by full-method prefix");
            return true;
        }

        let callee_class = method::full_class_of(callee);
        if self
            .class_keywords
            .iter()
            .any(|k| callee_class.contains(k.as_str()))
        {
            tracing::debug!(callee, "skipping callee by class keyword");
            return true;
        }

        // A Runnable/Callable constructor wired to run()/call() stays even when
        // the bare method name is on the ignore list.
        if !edge.call_type.is_construct_to_run() {
            let with_args = method::method_with_args(callee);
            if self
                .method_prefixes
                .iter()
                .any(|p| with_args.starts_with(p.as_str()))
            {
                tracing::debug!(callee, "skipping callee by method prefix");
                return true;
            }
        }

        false
    }

    pub fn is_entry_ignored(&self, method_with_args: &str) -> bool {
        self.entry_method_prefixes
            .iter()
            .any(|p| method_with_args.starts_with(p.as_str()))
    }
}
