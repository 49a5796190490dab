//! Line rendering for call-chain documents and artifact naming.

use crate::domain::edge::{CallEdge, ExtendedData, LineWindow};
use crate::domain::error::TaskError;
use crate::domain::method;
use serde::Deserialize;
use std::collections::HashMap;

/// Marker introducing an extended-data suffix on a rendered line.
pub const EXTENDED_DATA_FLAG: &str = "!extended_data!";

/// Separator between the data type and the data value of a rendered suffix.
/// Data types must never contain it.
pub const DATA_SEPARATOR: char = '@';

/// Reserved data type used by the engine for dispatch-point cross references.
/// External producers are not allowed to emit it.
pub const JUMP_DATA_TYPE: &str = "jump_multi_impl";

/// How much of the callee identity a rendered line shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OutputDetail {
    /// Full class + method + argument types
    #[default]
    Full,
    /// Full class + method name
    Medium,
    /// Simple class + method name
    Simple,
}

#[derive(Debug, Clone, Default)]
pub struct RenderOptions {
    pub detail: OutputDetail,
    pub show_caller_line: bool,
    pub show_annotations: bool,
    pub dedup_callee_in_caller: bool,
}

/// Rendered annotation suffixes, preloaded once per run and keyed by method
/// hash. Methods without annotations are simply absent.
#[derive(Debug, Default)]
pub struct AnnotationIndex {
    suffixes: HashMap<String, String>,
}

impl AnnotationIndex {
    /// Build from raw annotation names. TAB and the data separator inside an
    /// annotation name would break line parsing, so they are replaced.
    pub fn from_annotations(raw: HashMap<String, Vec<String>>) -> Self {
        let mut suffixes = HashMap::with_capacity(raw.len());
        for (hash, names) in raw {
            let mut suffix = String::new();
            for name in names {
                let mut clean = name.replace('\t', " ");
                if clean.contains(DATA_SEPARATOR) {
                    tracing::warn!(annotation = %clean, "annotation contains the separator, replacing");
                    clean = clean.replace(DATA_SEPARATOR, "＠");
                }
                suffix.push(DATA_SEPARATOR);
                suffix.push_str(&clean);
            }
            if !suffix.is_empty() {
                suffixes.insert(hash, suffix);
            }
        }
        Self { suffixes }
    }

    pub fn suffix(&self, method_hash: &str) -> Option<&str> {
        self.suffixes.get(method_hash).map(String::as_str)
    }
}

/// Level prefix of a rendered edge line, e.g. `(2)# `.
pub fn level_prefix(level: usize) -> String {
    format!("({level})# ")
}

/// Caller-location annotation, e.g. `(Service1Impl:29)` followed by a TAB.
pub fn caller_location(edge: &CallEdge) -> String {
    format!(
        "({}:{})\t",
        edge.caller_class_name,
        edge.caller_line_number.unwrap_or(0)
    )
}

/// Callee label per the configured detail level.
pub fn callee_label(edge: &CallEdge, detail: OutputDetail) -> String {
    let callee = edge.callee_full_method.as_str();
    match detail {
        OutputDetail::Full => callee.to_string(),
        OutputDetail::Medium => format!(
            "{}:{}",
            method::full_class_of(callee),
            method::method_name(callee)
        ),
        OutputDetail::Simple => {
            format!("{}:{}", edge.callee_class_name, method::method_name(callee))
        }
    }
}

/// Cycle-back marker appended when the callee closes a loop over the live path.
pub fn cycle_marker(ancestor_depth: usize) -> String {
    format!(" [CYCLE->{ancestor_depth}]")
}

/// Append a resolved extended-data suffix. The data is assumed validated.
pub fn append_extended_data(label: &mut String, data: &ExtendedData) {
    label.push_str(EXTENDED_DATA_FLAG);
    label.push_str(&data.data_type);
    label.push(DATA_SEPARATOR);
    label.push_str(&data.data_value);
}

/// Reject data types that would break line parsing or collide with the
/// dispatch-point cross-reference marker.
pub fn validate_extended_data(data: &ExtendedData, allow_reserved: bool) -> Result<(), TaskError> {
    if data.data_type.contains(DATA_SEPARATOR) {
        return Err(TaskError::InvalidDataType(data.data_type.clone()));
    }
    if !allow_reserved && data.data_type == JUMP_DATA_TYPE {
        return Err(TaskError::ReservedDataType(data.data_type.clone()));
    }
    Ok(())
}

/// Base name of the artifact produced for a method:
/// `SimpleClass@methodName@methodHash`. Doubles as the subdirectory name for
/// a dispatch point's follow-up artifacts.
pub fn artifact_base_name(class_name: &str, method_name: &str, method_hash: &str) -> String {
    format!("{class_name}@{method_name}@{method_hash}")
}

/// File name of one call-chain artifact, with the optional line-window suffix.
pub fn artifact_file_name(base_name: &str, window: Option<&LineWindow>) -> String {
    match window {
        Some(w) => format!("{base_name}@{}-{}.txt", w.start, w.end),
        None => format!("{base_name}.txt"),
    }
}

/// File name of the empty marker artifact written when an entry method could
/// not be located.
pub fn empty_artifact_name(class_name: &str, target: &str) -> String {
    format!("{class_name}@{target}@empty.txt")
}
